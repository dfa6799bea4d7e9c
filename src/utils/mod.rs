use regex::Regex;
use std::sync::OnceLock;
use url::Url;

fn url_id_regex() -> &'static Regex {
    static URL_ID: OnceLock<Regex> = OnceLock::new();
    URL_ID.get_or_init(|| {
        Regex::new(
            r#"(?:youtube\.com/(?:[^/]+/.+/|(?:v|e(?:mbed)?|shorts|live)/|.*[?&]v=)|youtu\.be/)([^"&?/\s]{11})"#,
        )
        .expect("valid video id regex")
    })
}

fn bare_id_regex() -> &'static Regex {
    static BARE_ID: OnceLock<Regex> = OnceLock::new();
    BARE_ID.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("valid bare id regex"))
}

fn numeric_entity_regex() -> &'static Regex {
    static ENTITY: OnceLock<Regex> = OnceLock::new();
    ENTITY.get_or_init(|| Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").expect("valid entity regex"))
}

/// Extract an 11-character video id from a bare id or a YouTube URL
pub fn extract_video_id(input: &str) -> Option<String> {
    let input = input.trim();
    if bare_id_regex().is_match(input) {
        return Some(input.to_string());
    }

    url_id_regex()
        .captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|id| bare_id_regex().is_match(id))
}

/// Decode the HTML entities that appear in caption markup
pub fn decode_html_entities(text: &str) -> String {
    let named = text
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ");

    numeric_entity_regex()
        .replace_all(&named, |caps: &regex::Captures| {
            let raw = &caps[1];
            let code = match raw.strip_prefix('x') {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => raw.parse::<u32>().ok(),
            };
            code.and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Collapse runs of whitespace into single spaces
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max_chars` characters on a char boundary
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Format milliseconds in human-readable format
pub fn format_elapsed(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else {
        format!("{:.1}s", ms as f64 / 1000.0)
    }
}

/// Check if the input looks like a URL rather than a bare id
pub fn is_url(input: &str) -> bool {
    Url::parse(input.trim())
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Check the external extractor and report what is missing
pub async fn check_dependencies(program: &str) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available(program).await {
        missing.push(format!("{} - required by the subprocess strategy", program));
    }

    missing
}

/// Check if a command is available in PATH
pub async fn check_command_available(command: &str) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg("--version")
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}
