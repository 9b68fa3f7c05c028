use fixit_contracts::catalog::{troubleshoot_prompt, TROUBLESHOOT_EMPTY_REPLY, TROUBLESHOOT_FALLBACK};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::codec::ImagePayload;
use crate::gateway::{inline_image_part, response_text, text_part, user_content, ModelGateway};

/// Advice for a user stuck mid-repair. `text` is always displayable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advice {
    pub text: String,
    pub fallback_reason: Option<String>,
}

impl Advice {
    fn fallback(reason: String) -> Self {
        Self {
            text: TROUBLESHOOT_FALLBACK.to_string(),
            fallback_reason: Some(reason),
        }
    }
}

pub(crate) fn troubleshoot_payload(
    image: &ImagePayload,
    object_name: &str,
    step_index: usize,
    step_text: &str,
) -> Value {
    json!({
        "contents": user_content(vec![
            inline_image_part(image),
            text_part(&troubleshoot_prompt(object_name, step_index, step_text)),
        ]),
    })
}

/// `step_index` is zero-based.
pub fn troubleshoot(
    gateway: &ModelGateway,
    image: &ImagePayload,
    object_name: &str,
    step_index: usize,
    step_text: &str,
) -> Advice {
    let outcome = gateway.vision().and_then(|capability| {
        capability.generate(&troubleshoot_payload(image, object_name, step_index, step_text))
    });
    match outcome {
        Ok(response) => {
            let text = response_text(&response);
            if text.is_empty() {
                info!(step = step_index + 1, "troubleshoot reply was empty");
                return Advice {
                    text: TROUBLESHOOT_EMPTY_REPLY.to_string(),
                    fallback_reason: None,
                };
            }
            info!(step = step_index + 1, chars = text.len(), "troubleshoot advice ready");
            Advice {
                text,
                fallback_reason: None,
            }
        }
        Err(err) => {
            warn!(step = step_index + 1, error = %err, "troubleshoot failed");
            Advice::fallback(err.to_string())
        }
    }
}
