pub const DOCTYPE_MARKER: &str = "<!DOCTYPE html>";
pub const HTML_MARKER: &str = "<html";

const FENCE: &str = "```";

/// Isolates an HTML document from raw model output.
///
/// A fence wrapping the whole reply is removed first, then anything before
/// the first `<!DOCTYPE html>` (or, failing that, the first `<html`) is
/// dropped. Text with no marker comes back trimmed but otherwise untouched.
pub fn extract_html(raw: &str) -> String {
    let text = raw.trim();
    if text.is_empty() {
        return String::new();
    }
    let text = unwrap_code_fence(text).unwrap_or(text);

    if let Some(idx) = text.find(DOCTYPE_MARKER) {
        return text[idx..].trim().to_string();
    }
    if let Some(idx) = text.find(HTML_MARKER) {
        return text[idx..].trim().to_string();
    }
    text.to_string()
}

/// Inner content of a reply that is exactly one fenced block, optionally
/// tagged `html` (any case). Returns `None` when the text is not fenced on
/// both ends.
pub(crate) fn unwrap_code_fence(text: &str) -> Option<&str> {
    let mut body = text.strip_prefix(FENCE)?.strip_suffix(FENCE)?;
    if body
        .get(..4)
        .map(|tag| tag.eq_ignore_ascii_case("html"))
        .unwrap_or(false)
    {
        body = &body[4..];
    }
    let body = body.strip_prefix('\n').unwrap_or(body);
    let body = body.strip_suffix('\n').unwrap_or(body);
    Some(body.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fence_is_unwrapped_before_marker_search() {
        let raw = "```html\n<!DOCTYPE html><html></html>\n```";
        assert_eq!(extract_html(raw), "<!DOCTYPE html><html></html>");
    }

    #[test]
    fn untagged_and_uppercase_fences_unwrap() {
        assert_eq!(extract_html("```\n<html></html>\n```"), "<html></html>");
        assert_eq!(
            extract_html("```HTML\n<!DOCTYPE html><p>hi</p>```"),
            "<!DOCTYPE html><p>hi</p>"
        );
    }

    #[test]
    fn commentary_outside_fence_is_dropped_by_marker() {
        let raw = "Sure! Here is your page:\n```html\n<!DOCTYPE html>\n<html><body>Acme</body></html>\n```\nEnjoy.";
        assert_eq!(
            extract_html(raw),
            "<!DOCTYPE html>\n<html><body>Acme</body></html>\n```\nEnjoy."
        );
    }

    #[test]
    fn doctype_wins_over_html_tag() {
        let raw = "<html lang=\"en\"> stray\n<!DOCTYPE html><html></html>";
        assert_eq!(extract_html(raw), "<!DOCTYPE html><html></html>");
    }

    #[test]
    fn html_tag_is_used_without_doctype() {
        assert_eq!(
            extract_html("blah blah <html>foo</html>"),
            "<html>foo</html>"
        );
    }

    #[test]
    fn text_without_marker_passes_through() {
        assert_eq!(extract_html("just some text"), "just some text");
        assert_eq!(extract_html("  padded text \n"), "padded text");
    }

    #[test]
    fn empty_input_yields_empty() {
        assert_eq!(extract_html(""), "");
        assert_eq!(extract_html(" \n\t "), "");
    }

    #[test]
    fn extraction_is_idempotent_once_marker_found() {
        let samples = [
            "```html\n<!DOCTYPE html><html></html>\n```",
            "Here you go: <!DOCTYPE html>\n<html><body>Hi</body></html>  ",
            "blah blah <html>foo</html>",
            "<!DOCTYPE html><html><body>```</body></html>",
        ];
        for raw in samples {
            let once = extract_html(raw);
            assert_eq!(extract_html(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn fence_needs_both_ends() {
        assert_eq!(unwrap_code_fence("```"), None);
        assert_eq!(unwrap_code_fence("````"), None);
        assert_eq!(unwrap_code_fence("```html\n<p>open"), None);
        assert_eq!(unwrap_code_fence("``````"), Some(""));
        assert_eq!(extract_html("```html\n<p>open"), "```html\n<p>open");
    }

    #[test]
    fn fence_tag_check_handles_multibyte_text() {
        assert_eq!(unwrap_code_fence("```é\n```"), Some("é"));
    }
}
