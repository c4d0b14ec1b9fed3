use brandpage_contracts::generation::{build_enhance_prompt, clean_enhanced_text};
use serde::{Deserialize, Serialize};

use crate::generation::{GenerationError, TextGenerator};

pub const ENHANCE_PATH: &str = "/api/enhance";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhanceRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub field: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhanceResponse {
    pub enhanced: String,
}

/// Rewrites one profile field with the model. Blank input is returned as is
/// without a provider call, and an unusable reply keeps the original text.
pub fn enhance_text(
    generator: &dyn TextGenerator,
    request: &EnhanceRequest,
) -> Result<String, GenerationError> {
    if request.text.trim().is_empty() {
        return Ok(request.text.clone());
    }
    let raw = generator.generate(&build_enhance_prompt(&request.text, &request.field))?;
    Ok(clean_enhanced_text(&raw).unwrap_or_else(|| request.text.clone()))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Canned {
        reply: Result<&'static str, ()>,
        calls: AtomicUsize,
    }

    impl TextGenerator for Canned {
        fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(prompt.contains("company description"));
            self.reply
                .map(str::to_string)
                .map_err(|_| GenerationError::Transport("offline".to_string()))
        }
    }

    fn request(text: &str) -> EnhanceRequest {
        EnhanceRequest {
            text: text.to_string(),
            field: "description".to_string(),
        }
    }

    #[test]
    fn reply_is_cleaned() {
        let generator = Canned {
            reply: Ok("\"We craft durable shoes for runners.\""),
            calls: AtomicUsize::new(0),
        };
        let enhanced = enhance_text(&generator, &request("we sell shoes")).unwrap();
        assert_eq!(enhanced, "We craft durable shoes for runners.");
    }

    #[test]
    fn blank_text_skips_provider() {
        let generator = Canned {
            reply: Ok("ignored"),
            calls: AtomicUsize::new(0),
        };
        assert_eq!(enhance_text(&generator, &request("  ")).unwrap(), "  ");
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn empty_reply_keeps_original() {
        let generator = Canned {
            reply: Ok("   "),
            calls: AtomicUsize::new(0),
        };
        assert_eq!(
            enhance_text(&generator, &request("we sell shoes")).unwrap(),
            "we sell shoes"
        );
    }

    #[test]
    fn provider_failure_propagates() {
        let generator = Canned {
            reply: Err(()),
            calls: AtomicUsize::new(0),
        };
        assert!(enhance_text(&generator, &request("we sell shoes")).is_err());
    }
}
