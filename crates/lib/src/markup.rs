//! Restricted markup for model replies: only bold spans survive.

use regex::Regex;
use std::sync::OnceLock;

static BOLD: OnceLock<Regex> = OnceLock::new();
static BOLD_TAG: OnceLock<Regex> = OnceLock::new();

fn bold_pattern() -> &'static Regex {
    BOLD.get_or_init(|| Regex::new(r"\*\*(.*?)\*\*").expect("static bold pattern"))
}

fn bold_tag_pattern() -> &'static Regex {
    BOLD_TAG.get_or_init(|| Regex::new(r"</?b>").expect("static tag pattern"))
}

/// Rewrite every `**x**` into `<b>x</b>` (shortest match, single line) and trim surrounding whitespace.
pub fn render_bold(text: &str) -> String {
    bold_pattern()
        .replace_all(text, "<b>$1</b>")
        .trim()
        .to_string()
}

/// Remove `<b>` and `</b>` tags, for displays that cannot render them.
pub fn strip_tags(text: &str) -> String {
    bold_tag_pattern().replace_all(text, "").into_owned()
}
