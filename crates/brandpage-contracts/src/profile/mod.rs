mod logo;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use logo::{logo_data_uri, read_logo, MAX_LOGO_BYTES};

pub const DEFAULT_PRIMARY_COLOR: &str = "#3B82F6";
pub const SOCIAL_PLATFORMS: &[&str] = &["website", "twitter", "linkedin", "instagram"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileError {
    #[error("{field} is required")]
    Required { field: &'static str },
    #[error("primary color '{0}' is not a hex color")]
    InvalidColor(String),
    #[error("unknown social platform '{0}' (expected one of website, twitter, linkedin, instagram)")]
    UnknownSocialPlatform(String),
    #[error("logo is {bytes} bytes; max 2MB logo")]
    LogoTooLarge { bytes: usize },
    #[error("logo is not a recognized image format")]
    UnsupportedLogo,
}

/// Brand description submitted by a client.
///
/// Field order and camelCase names match what browser clients send, and the
/// serialized form is embedded verbatim in the generation prompt. Keys the
/// client sent that are not modeled here are kept in `extra` and serialized
/// after the known fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandProfile {
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_primary_color")]
    pub primary_color: String,
    #[serde(default)]
    pub social_links: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_audience: Option<String>,
    #[serde(default)]
    pub logo_url: String,
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl Default for BrandProfile {
    fn default() -> Self {
        Self {
            company_name: String::new(),
            description: String::new(),
            primary_color: default_primary_color(),
            social_links: IndexMap::new(),
            industry: None,
            target_audience: None,
            logo_url: String::new(),
            extra: IndexMap::new(),
        }
    }
}

impl BrandProfile {
    pub fn new(company_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            company_name: company_name.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    /// Reads a profile from an arbitrary JSON payload. Missing fields take
    /// their defaults; only payloads that are not objects (or carry badly
    /// typed known fields) are rejected.
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    pub fn set_social_link(
        &mut self,
        platform: &str,
        url: impl Into<String>,
    ) -> Result<(), ProfileError> {
        let platform = platform.trim().to_ascii_lowercase();
        if !SOCIAL_PLATFORMS.contains(&platform.as_str()) {
            return Err(ProfileError::UnknownSocialPlatform(platform));
        }
        let url = url.into();
        if url.trim().is_empty() {
            self.social_links.shift_remove(&platform);
        } else {
            self.social_links.insert(platform, url.trim().to_string());
        }
        Ok(())
    }

    /// Client-side checks run before a profile is submitted.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.company_name.trim().is_empty() {
            return Err(ProfileError::Required {
                field: "companyName",
            });
        }
        if self.description.trim().is_empty() {
            return Err(ProfileError::Required {
                field: "description",
            });
        }
        if !is_hex_color(&self.primary_color) {
            return Err(ProfileError::InvalidColor(self.primary_color.clone()));
        }
        if let Some(platform) = self
            .social_links
            .keys()
            .find(|platform| !SOCIAL_PLATFORMS.contains(&platform.as_str()))
        {
            return Err(ProfileError::UnknownSocialPlatform(platform.clone()));
        }
        Ok(())
    }
}

pub fn is_hex_color(raw: &str) -> bool {
    let Some(digits) = raw.trim().strip_prefix('#') else {
        return false;
    };
    matches!(digits.len(), 3 | 6) && digits.chars().all(|ch| ch.is_ascii_hexdigit())
}

fn default_primary_color() -> String {
    DEFAULT_PRIMARY_COLOR.to_string()
}
