use base64::engine::general_purpose::{STANDARD as BASE64, URL_SAFE as BASE64_URL_SAFE};
use base64::Engine as _;

use crate::error::{EngineError, EngineResult};

pub const DEFAULT_UPLOAD_MIME: &str = "image/jpeg";
pub const DEFAULT_GENERATED_MIME: &str = "image/png";

/// Raw image bytes plus the media type they travel with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImagePayload {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// Wraps raw bytes, sniffing the media type from magic bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> EngineResult<Self> {
        if bytes.is_empty() {
            return Err(EngineError::InvalidImage("image is empty".to_string()));
        }
        let mime_type = sniff_mime(&bytes).unwrap_or(DEFAULT_UPLOAD_MIME);
        Ok(Self::new(bytes, mime_type))
    }

    /// Decodes the text-safe transport form: bare base64 or a `data:` URI.
    pub fn from_transport_text(text: &str) -> EngineResult<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(EngineError::InvalidImage("image text is empty".to_string()));
        }
        let (declared_mime, data) = match trimmed.strip_prefix("data:") {
            Some(rest) => {
                let (header, data) = rest.split_once(',').ok_or_else(|| {
                    EngineError::InvalidImage("data URI is missing its payload".to_string())
                })?;
                let mut fields = header.split(';');
                let mime = fields.next().unwrap_or_default().trim();
                if !fields.any(|field| field.trim().eq_ignore_ascii_case("base64")) {
                    return Err(EngineError::InvalidImage(
                        "data URI is not base64 encoded".to_string(),
                    ));
                }
                (Some(mime).filter(|value| !value.is_empty()), data)
            }
            None => (None, trimmed),
        };
        let bytes = decode_base64(data)
            .map_err(|err| EngineError::InvalidImage(format!("base64 decode failed: {err}")))?;
        if bytes.is_empty() {
            return Err(EngineError::InvalidImage("image is empty".to_string()));
        }
        let mime_type = declared_mime
            .map(str::to_string)
            .or_else(|| sniff_mime(&bytes).map(str::to_string))
            .unwrap_or_else(|| DEFAULT_UPLOAD_MIME.to_string());
        Ok(Self { bytes, mime_type })
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}

/// Decodes base64 text, ignoring embedded whitespace and accepting the
/// URL-safe alphabet.
pub fn decode_base64(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    BASE64
        .decode(compact.as_bytes())
        .or_else(|_| BASE64_URL_SAFE.decode(compact.as_bytes()))
}

pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes)
        .ok()
        .map(|format| format.to_mime_type())
}
