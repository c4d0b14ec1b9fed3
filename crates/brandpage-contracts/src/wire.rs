use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::generation::GenerationResult;
use crate::profile::BrandProfile;

pub const GENERATE_EVENT: &str = "generate";
pub const GENERATED_CODE_EVENT: &str = "generatedCode";

/// One realtime text frame: `{"event": "...", "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    pub fn generate(profile: &BrandProfile) -> anyhow::Result<Self> {
        Ok(Self::new(GENERATE_EVENT, serde_json::to_value(profile)?))
    }

    pub fn generated_code(result: &GenerationResult) -> anyhow::Result<Self> {
        Ok(Self::new(GENERATED_CODE_EVENT, serde_json::to_value(result)?))
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_text(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn is(&self, event: &str) -> bool {
        self.event == event
    }

    pub fn into_generation_result(self) -> anyhow::Result<GenerationResult> {
        if !self.is(GENERATED_CODE_EVENT) {
            anyhow::bail!("expected {GENERATED_CODE_EVENT} event, got {}", self.event);
        }
        Ok(serde_json::from_value(self.data)?)
    }
}
