use fixit_contracts::catalog::{illustration_prompt, ILLUSTRATION_ASPECT_RATIO};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::codec::{decode_base64, ImagePayload, DEFAULT_GENERATED_MIME};
use crate::gateway::{inline_image_part, inline_images, text_part, user_content, ModelGateway};

#[derive(Debug, Clone, Copy)]
pub struct IllustrationRequest<'a> {
    pub object_name: &'a str,
    pub step_instruction: &'a str,
    pub ideal_view: &'a str,
    /// The user's own photo, sent ahead of the prompt to anchor the scene.
    pub reference: Option<&'a ImagePayload>,
}

/// Generated image, or why there is none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Illustration {
    pub image: Option<ImagePayload>,
    pub fallback_reason: Option<String>,
}

impl Illustration {
    fn none(reason: impl Into<String>) -> Self {
        Self {
            image: None,
            fallback_reason: Some(reason.into()),
        }
    }

    pub fn data_uri(&self) -> Option<String> {
        self.image.as_ref().map(ImagePayload::to_data_uri)
    }
}

pub(crate) fn illustration_payload(request: &IllustrationRequest<'_>) -> Value {
    let mut parts = Vec::new();
    if let Some(reference) = request.reference {
        parts.push(inline_image_part(reference));
    }
    parts.push(text_part(&illustration_prompt(
        request.object_name,
        request.step_instruction,
        request.ideal_view,
    )));
    json!({
        "contents": user_content(parts),
        "generationConfig": {
            "responseModalities": ["TEXT", "IMAGE"],
            "imageConfig": { "aspectRatio": ILLUSTRATION_ASPECT_RATIO },
        },
    })
}

/// Calls the billed image tier. An enhancement only: every failure becomes
/// "no image".
pub fn generate_step_image(
    gateway: &ModelGateway,
    request: &IllustrationRequest<'_>,
) -> Illustration {
    let capability = match gateway.image_gen() {
        Ok(capability) => capability,
        Err(err) => {
            warn!(error = %err, "step illustration unavailable");
            return Illustration::none(err.to_string());
        }
    };
    let response = match capability.generate(&illustration_payload(request)) {
        Ok(response) => response,
        Err(err) => {
            warn!(error = %err, "step illustration failed");
            return Illustration::none(err.to_string());
        }
    };

    let inlines = inline_images(&response);
    if inlines.is_empty() {
        info!(object = request.object_name, "image model returned no inline image");
        return Illustration::none("image model returned no inline image");
    }
    let mut decoded = None;
    for inline in inlines {
        match decode_base64(&inline.data) {
            Ok(bytes) if !bytes.is_empty() => {
                decoded = Some((bytes, inline));
                break;
            }
            Ok(_) => debug!("skipping empty inline image"),
            Err(err) => warn!(error = %err, "skipping inline image with invalid base64"),
        }
    }
    let Some((bytes, inline)) = decoded else {
        return Illustration::none("no inline image payload could be decoded");
    };
    let mime_type = inline
        .mime_type
        .unwrap_or_else(|| DEFAULT_GENERATED_MIME.to_string());
    info!(object = request.object_name, mime_type = %mime_type, bytes = bytes.len(), "step illustration ready");
    Illustration {
        image: Some(ImagePayload::new(bytes, mime_type)),
        fallback_reason: None,
    }
}
