mod enhance;
mod extract;
mod prompt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use enhance::{build_enhance_prompt, clean_enhanced_text, field_label};
pub use extract::{extract_html, DOCTYPE_MARKER, HTML_MARKER};
pub use prompt::{build_prompt, build_prompt_from_payload, LOGO_PLACEHOLDER, TAILWIND_CDN_LINK};

pub const ERROR_PLACEHOLDER_HTML: &str = "<h1>⚠️ Error generating content</h1>";
pub const FAILURE_PROMPT: &str = "Failed due to backend error.";

/// One `generate` request after the server rendered its prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub payload: Value,
    pub prompt: String,
}

impl GenerationRequest {
    /// `None` when the event carried no profile at all; every other payload,
    /// however malformed, renders a prompt.
    pub fn from_payload(payload: Value) -> Option<Self> {
        if payload.is_null() {
            return None;
        }
        let prompt = build_prompt_from_payload(&payload);
        Some(Self { payload, prompt })
    }

    /// The submitted company name when it is a string, for logging.
    pub fn company_name(&self) -> &str {
        self.payload
            .get("companyName")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

/// Payload of a `generatedCode` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub html: String,
    pub prompt: String,
}

impl GenerationResult {
    pub fn new(html: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            prompt: prompt.into(),
        }
    }

    pub fn failed() -> Self {
        Self::new(ERROR_PLACEHOLDER_HTML, FAILURE_PROMPT)
    }

    pub fn is_failure(&self) -> bool {
        self.html == ERROR_PLACEHOLDER_HTML && self.prompt == FAILURE_PROMPT
    }
}
