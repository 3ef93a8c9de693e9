//! The safe-string pass shared by the URL decoder and the response shaper.
//!
//! JSON-stringifying a string and then stripping the outer quotes escapes
//! embedded quotes, newlines, and control characters in one step, without
//! hand-rolling an escaper. It is applied to decoded modifier fragments
//! (§4.1) and to every header value / status message / string body that
//! leaves the service (§4.8).
use once_cell::sync::Lazy;

/// `JSON.stringify(s).slice(1, -1)`, morally: escape `s` the way a JSON
/// string literal would, then drop the surrounding quotes. JSON-escaping
/// turns embedded quotes into `\"` and newlines into the two-character
/// sequence `\n`; the remaining backslash-quote pairs are then dropped so no
/// literal `"` survives into a header value or status line.
pub fn stringify_strip(s: &str) -> String {
    let quoted = serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string());
    let stripped = quoted
        .strip_prefix('"')
        .and_then(|q| q.strip_suffix('"'))
        .unwrap_or(&quoted);
    stripped.replace("\\\"", "")
}

static SANITIZER: Lazy<ammonia::Builder<'static>> = Lazy::new(|| {
    let mut builder = ammonia::Builder::default();
    // Error bodies are plain text; no markup is ever intentional, so strip
    // every tag rather than maintaining an allow-list.
    builder.tags(std::collections::HashSet::new());
    builder
});

/// Run the HTML cross-site-scripting sanitizer over a string body.
pub fn sanitize_body(s: &str) -> String {
    SANITIZER.clean(s).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_quotes_and_newlines() {
        let out = stringify_strip("hello \"world\"\nagain");
        assert!(!out.contains('"'));
        assert!(!out.contains('\n'));
    }

    #[test]
    fn sanitizer_drops_script_tags() {
        let out = sanitize_body("<script>alert(1)</script>hi");
        assert!(!out.to_lowercase().contains("<script>"));
        assert!(out.contains("hi"));
    }
}
