use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use vidget_core::core::events::Metadata;

static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

const DEFAULT_EXTENSION: &str = "mp4";
const MAX_STEM_CHARS: usize = 200;

/// Turns arbitrary text into a single path component: no separators, no
/// reserved characters, no leading dots.
pub fn sanitize_path_component(name: &str) -> String {
    let name: String = name.nfc().filter(|c| !c.is_control()).collect();
    let name = WS_RE.replace_all(name.trim(), " ");

    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            other => other,
        })
        .collect();

    let cleaned = cleaned
        .trim_start_matches(['.', ' '])
        .trim_end_matches([' ', '.']);

    truncate_stem(cleaned)
}

fn truncate_stem(name: &str) -> String {
    if name.chars().count() <= MAX_STEM_CHARS {
        return name.to_string();
    }
    let path = Path::new(name);
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) => {
            let stem: String = stem.to_string_lossy().chars().take(MAX_STEM_CHARS).collect();
            format!("{}.{}", stem.trim_end(), ext.to_string_lossy())
        }
        _ => name.chars().take(MAX_STEM_CHARS).collect(),
    }
}

fn has_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|e| !e.is_empty())
}

/// Caller-supplied `filename` metadata wins, then the URL's last path segment
/// when it carries an extension, then a synthesized name.
pub fn resolve_filename(url: &str, metadata: &Metadata) -> String {
    if let Some(requested) = metadata.get("filename") {
        let name = sanitize_path_component(requested);
        if !name.is_empty() {
            return name;
        }
    }
    filename_from_url(url).unwrap_or_else(synthesize_filename)
}

pub fn filename_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());
    let name = sanitize_path_component(&decoded);
    if name.is_empty() || !has_extension(&name) {
        return None;
    }
    Some(name)
}

pub fn synthesize_filename() -> String {
    let token = rand::random::<u32>() & 0x00ff_ffff;
    format!(
        "video_{}_{:06x}.{}",
        chrono::Utc::now().timestamp_millis(),
        token,
        DEFAULT_EXTENSION
    )
}

/// First of `name`, `stem (1).ext`, `stem (2).ext`, ... under `dir` that
/// `is_taken` rejects.
pub fn dedupe_path(dir: &Path, name: &str, is_taken: impl Fn(&Path) -> bool) -> PathBuf {
    let candidate = dir.join(name);
    if !is_taken(&candidate) {
        return candidate;
    }

    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());

    let mut n = 1u32;
    loop {
        let numbered = match &ext {
            Some(ext) => format!("{} ({}).{}", stem, n, ext),
            None => format!("{} ({})", stem, n),
        };
        let candidate = dir.join(numbered);
        if !is_taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
