use sha2::{Digest, Sha256};
use url::Url;

const MAX_STEM_LEN: usize = 80;

/// Filename used when a request does not name one: `{slug}--{short_hash(url)}.md`,
/// where the slug comes from the last URL path segment, or the host.
pub fn default_filename(url: &str) -> String {
    let stem = url_stem(url).unwrap_or_else(|| "untitled".to_string());
    let sanitized = sanitize_stem(&stem);
    let hash = short_hash(url);
    format!("{sanitized}--{hash}.md")
}

/// Trims the name and appends `.md` unless it already ends with it.
pub fn ensure_markdown_extension(filename: &str) -> String {
    let trimmed = filename.trim();
    if trimmed.to_ascii_lowercase().ends_with(".md") {
        trimmed.to_string()
    } else {
        format!("{trimmed}.md")
    }
}

/// Filename for a request: the requested one if it is not blank, otherwise the
/// URL-derived default.
pub fn resolve_filename(requested: Option<&str>, url: &str) -> String {
    match requested.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => ensure_markdown_extension(name),
        None => default_filename(url),
    }
}

/// Makes a filename safe to create inside an output directory.
pub fn safe_filename(filename: &str) -> String {
    let name = ensure_markdown_extension(filename);
    let stem = &name[..name.len() - 3];
    format!("{}.md", sanitize_stem(stem))
}

fn url_stem(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(ToOwned::to_owned);
    segment
        .or_else(|| parsed.host_str().map(ToOwned::to_owned))
        .map(|s| s.trim_end_matches(".md").to_string())
}

fn sanitize_stem(input: &str) -> String {
    let cleaned: String = input
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim_matches(&['_', ' ', '.'][..]);
    if cleaned.is_empty() {
        return "untitled".to_string();
    }

    // Collapse runs of underscores.
    let mut compacted = String::with_capacity(cleaned.len());
    let mut prev_underscore = false;
    for c in cleaned.chars() {
        if c == '_' && prev_underscore {
            continue;
        }
        prev_underscore = c == '_';
        compacted.push(c);
    }

    if compacted.len() > MAX_STEM_LEN {
        let mut cut = MAX_STEM_LEN;
        while !compacted.is_char_boundary(cut) {
            cut -= 1;
        }
        compacted.truncate(cut);
    }
    if is_reserved_windows_name(&compacted) {
        compacted.push('_');
    }
    compacted
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}
