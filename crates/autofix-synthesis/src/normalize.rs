//! Response normalization
//!
//! Models wrap code in markdown fences and surround it with prose no matter
//! how firmly the prompt asks them not to. Everything handed to the sandbox
//! goes through [`normalize_source`] first.

use once_cell::sync::Lazy;
use regex::Regex;

static FENCED_BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[\w+#.-]*[ \t]*\r?\n(.*?)```").expect("valid fenced block regex")
});

/// Strip code-fence markup and surrounding whitespace from a model response
///
/// - A complete fenced block (language-tagged or bare) anywhere in the
///   response: its body is returned; prose around it is dropped. When there
///   are several blocks the first one wins.
/// - An opening fence with no closing fence: the fence line is removed.
/// - A single-line ```` ```code``` ```` span: the backticks are removed.
/// - Anything else: returned trimmed.
#[must_use]
pub fn normalize_source(raw: &str) -> String {
    if let Some(body) = FENCED_BLOCK_RE.captures(raw).and_then(|caps| caps.get(1)) {
        return body.as_str().trim().to_string();
    }

    let mut body = raw.trim();
    if let Some(rest) = body.strip_prefix("```") {
        body = match rest.split_once('\n') {
            Some((tag, tail)) if is_language_tag(tag) => tail,
            _ => rest,
        };
    }
    body = body.strip_suffix("```").unwrap_or(body);
    body.trim().to_string()
}

fn is_language_tag(tag: &str) -> bool {
    tag.trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '#' | '.' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bare_code_passes_through() {
        assert_eq!(normalize_source("print(1/0)"), "print(1/0)");
        assert_eq!(normalize_source("\n\n  x = 1\nprint(x)\n\n"), "x = 1\nprint(x)");
    }

    #[test]
    fn language_tagged_fence_is_removed() {
        let raw = "```python\ndef add(a, b):\n    return a + b\n\nprint(add(1, 2))\n```";
        assert_eq!(
            normalize_source(raw),
            "def add(a, b):\n    return a + b\n\nprint(add(1, 2))"
        );
    }

    #[test]
    fn bare_fence_is_removed() {
        assert_eq!(normalize_source("```\nprint('hi')\n```\n"), "print('hi')");
    }

    #[test]
    fn prose_around_the_block_is_dropped() {
        let raw = concat!(
            "Here is a basic Flask server:\n\n",
            "```python\nfrom flask import Flask\napp = Flask(__name__)\n```\n\n",
            "Install it with:\n\n",
            "```\npip install flask\n```\n",
        );
        assert_eq!(
            normalize_source(raw),
            "from flask import Flask\napp = Flask(__name__)"
        );
    }

    #[test]
    fn unterminated_fence_is_stripped() {
        assert_eq!(normalize_source("```py\nprint(2)\n"), "print(2)");
    }

    #[test]
    fn single_line_fence_is_stripped() {
        assert_eq!(normalize_source("```print(3)```"), "print(3)");
    }

    #[test]
    fn crlf_fences_are_handled() {
        assert_eq!(normalize_source("```python\r\nprint(4)\r\n```"), "print(4)");
    }

    #[test]
    fn whitespace_only_is_empty() {
        assert_eq!(normalize_source("  \n\t "), "");
        assert_eq!(normalize_source("```\n```"), "");
    }
}
