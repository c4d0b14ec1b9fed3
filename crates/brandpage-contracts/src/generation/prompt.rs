use std::borrow::Cow;

use serde_json::Value;

use crate::profile::BrandProfile;

pub const TAILWIND_CDN_LINK: &str = r#"<link href="https://cdn.jsdelivr.net/npm/tailwindcss@2.2.19/dist/tailwind.min.css" rel="stylesheet">"#;
pub const LOGO_PLACEHOLDER: &str = "N/A";

/// Renders the landing-page instruction prompt for a profile.
pub fn build_prompt(profile: &BrandProfile) -> String {
    let payload = serde_json::to_value(profile).unwrap_or(Value::Null);
    build_prompt_from_payload(&payload)
}

/// Renders the prompt for whatever a client submitted as its profile.
///
/// The payload is embedded as two-space indented JSON in the order the client
/// sent its keys; nothing is type-checked, so any value renders. The logo
/// value is repeated verbatim on its own line (even a multi-megabyte data
/// URI) so the model can copy it into an `<img>` tag.
pub fn build_prompt_from_payload(payload: &Value) -> String {
    let profile_json = serde_json::to_string_pretty(payload).unwrap_or_else(|_| "{}".to_string());
    let logo = logo_text(payload.get("logoUrl"));

    format!(
        "
You are an expert Tailwind CSS web designer.

Create a modern, responsive landing page using **only Tailwind CSS utility classes** (no inline styles or <style> tags) for the following brand:

{profile_json}

Use the following Tailwind CDN link inside <head> of the HTML document:
{TAILWIND_CDN_LINK}

Use the provided logo if available (base64 or URL): {logo}.

Return a complete HTML document starting with <!DOCTYPE html>.
Do not include markdown or explanations — only raw HTML output.
"
    )
    .trim()
    .to_string()
}

/// Empty, `false`, zero and null logos fall back to the placeholder.
fn logo_text(value: Option<&Value>) -> Cow<'_, str> {
    match value {
        Some(Value::String(text)) if !text.is_empty() => Cow::Borrowed(text.as_str()),
        Some(Value::Bool(true)) => Cow::Borrowed("true"),
        Some(Value::Number(number)) if number.as_f64() != Some(0.0) => {
            Cow::Owned(number.to_string())
        }
        Some(other @ (Value::Array(_) | Value::Object(_))) => Cow::Owned(other.to_string()),
        _ => Cow::Borrowed(LOGO_PLACEHOLDER),
    }
}
