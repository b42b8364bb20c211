pub mod error;
pub mod events;
pub mod filename;
pub mod http_client;
pub mod queue;
pub mod redirect;
pub mod registry;
pub mod scheduler;
pub mod transfer;
