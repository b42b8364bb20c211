use clap::Parser;
use vidget_lib::cli::{self, Cli};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let args = Cli::parse();
    if let Err(err) = cli::run(args).await {
        eprintln!("vidget: {:#}", err);
        std::process::exit(1);
    }
}
