use super::extract::unwrap_code_fence;

pub fn field_label(field: &str) -> String {
    match field {
        "companyName" => "company name".to_string(),
        "description" => "company description".to_string(),
        "targetAudience" => "target audience".to_string(),
        "industry" => "industry".to_string(),
        other => other.trim().to_string(),
    }
}

/// Prompt for rewriting a single profile field.
pub fn build_enhance_prompt(text: &str, field: &str) -> String {
    let label = field_label(field);
    let length_hint = if field == "companyName" {
        "Return only the improved name, at most five words."
    } else {
        "Keep it under three sentences."
    };
    format!(
        "You are a brand copywriter polishing input for a landing page generator.\n\
         Improve the following {label} so it reads clearly and professionally while keeping its meaning. \
         {length_hint}\n\
         Reply with the improved text only: no quotes, no markdown, no explanations.\n\n\
         {text}",
        text = text.trim()
    )
}

/// Normalizes a model's reply to an enhance prompt. `None` means the reply
/// was unusable and the caller should keep the original text.
pub fn clean_enhanced_text(raw: &str) -> Option<String> {
    let text = raw.trim();
    let text = unwrap_code_fence(text).unwrap_or(text);
    let text = strip_matching_quotes(text).trim();
    if text.is_empty() {
        return None;
    }
    Some(text.to_string())
}

fn strip_matching_quotes(text: &str) -> &str {
    for (open, close) in [('"', '"'), ('\'', '\''), ('“', '”')] {
        if let Some(inner) = text
            .strip_prefix(open)
            .and_then(|rest| rest.strip_suffix(close))
        {
            return inner;
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_field_and_embeds_text() {
        let prompt = build_enhance_prompt("  we sell shoes ", "description");
        assert!(prompt.contains("Improve the following company description"));
        assert!(prompt.ends_with("\n\nwe sell shoes"));
        assert!(prompt.contains("Keep it under three sentences."));
    }

    #[test]
    fn company_name_prompt_asks_for_short_reply() {
        let prompt = build_enhance_prompt("Acme", "companyName");
        assert!(prompt.contains("company name"));
        assert!(prompt.contains("at most five words"));
    }

    #[test]
    fn unknown_fields_use_raw_name() {
        assert_eq!(field_label("tagline"), "tagline");
    }

    #[test]
    fn cleanup_strips_fences_and_quotes() {
        assert_eq!(
            clean_enhanced_text("\"Acme Solutions\"\n"),
            Some("Acme Solutions".to_string())
        );
        assert_eq!(
            clean_enhanced_text("```\nWe craft footwear.\n```"),
            Some("We craft footwear.".to_string())
        );
        assert_eq!(
            clean_enhanced_text("“Acme”"),
            Some("Acme".to_string())
        );
        assert_eq!(clean_enhanced_text("  "), None);
        assert_eq!(clean_enhanced_text("\"\""), None);
    }
}
