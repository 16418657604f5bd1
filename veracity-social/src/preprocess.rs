//! Noise reduction applied to scraped text before it reaches the oracle.
use regex::Regex;
use std::sync::LazyLock;

pub const LINK_PLACEHOLDER: &str = "[LINK]";

static MARKDOWN_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").expect("valid regex"));
static URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://\S+").expect("valid regex"));
static EMPHASIS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[*_~`]").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static EMOJI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\x{1F600}-\x{1F64F}\x{1F300}-\x{1F5FF}\x{1F680}-\x{1F6FF}\x{2600}-\x{26FF}\x{2700}-\x{27BF}]")
        .expect("valid regex")
});
// Brackets stay so the link placeholder survives.
static NON_BASIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[^\w\s.,!?;:()'"\[\]-]"#).expect("valid regex"));

fn collapse(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Reddit markdown: links to their label, URLs to a placeholder, emphasis
/// characters removed, whitespace collapsed.
///
/// ```
/// use veracity_social::preprocess::clean_markdown;
///
/// let out = clean_markdown("**Read** [this](https://x.test/a) or https://y.test/b\n\nnow");
/// assert_eq!(out, "Read this or [LINK] now");
/// ```
pub fn clean_markdown(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let text = MARKDOWN_LINK.replace_all(text, "$1");
    let text = URL.replace_all(&text, LINK_PLACEHOLDER);
    let text = EMPHASIS.replace_all(&text, "");
    collapse(&text)
}

/// Video text: URLs to a placeholder, emoji and non-basic punctuation
/// removed, whitespace collapsed.
pub fn clean_video_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let text = URL.replace_all(text, LINK_PLACEHOLDER);
    let text = EMOJI.replace_all(&text, "");
    let text = NON_BASIC.replace_all(&text, "");
    collapse(&text)
}
