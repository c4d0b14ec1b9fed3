use std::path::Path;

use anyhow::Context;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use super::ProfileError;

pub const MAX_LOGO_BYTES: usize = 2 * 1024 * 1024;

/// Encodes raw logo bytes as a `data:` URI suitable for `logoUrl`.
///
/// The MIME type is sniffed from the bytes; `fallback_mime` (usually derived
/// from a file extension) covers formats without magic bytes such as SVG.
pub fn logo_data_uri(bytes: &[u8], fallback_mime: Option<&str>) -> Result<String, ProfileError> {
    if bytes.len() > MAX_LOGO_BYTES {
        return Err(ProfileError::LogoTooLarge { bytes: bytes.len() });
    }
    let mime = match image::guess_format(bytes) {
        Ok(format) => format.to_mime_type(),
        Err(_) => fallback_mime.ok_or(ProfileError::UnsupportedLogo)?,
    };
    Ok(format!("data:{mime};base64,{}", BASE64.encode(bytes)))
}

pub fn read_logo(path: &Path) -> anyhow::Result<String> {
    let size = std::fs::metadata(path)
        .with_context(|| format!("failed reading {}", path.display()))?
        .len();
    if size > MAX_LOGO_BYTES as u64 {
        return Err(ProfileError::LogoTooLarge {
            bytes: usize::try_from(size).unwrap_or(usize::MAX),
        }
        .into());
    }
    let bytes = std::fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
    Ok(logo_data_uri(&bytes, mime_for_extension(path))?)
}

fn mime_for_extension(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "svg" => Some("image/svg+xml"),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "ico" => Some("image/x-icon"),
        _ => None,
    }
}
