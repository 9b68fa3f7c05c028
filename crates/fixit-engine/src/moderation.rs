use fixit_contracts::catalog::{moderation_prompt, moderation_response_schema};
use fixit_contracts::ModerationResult;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::codec::ImagePayload;
use crate::error::EngineError;
use crate::gateway::{inline_image_part, response_text, text_part, user_content, ModelGateway};

/// Moderation decision plus, when the check could not run, why it passed
/// by default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModerationVerdict {
    pub result: ModerationResult,
    pub fallback_reason: Option<String>,
}

pub(crate) fn moderation_payload(image: &ImagePayload) -> Value {
    json!({
        "contents": user_content(vec![
            inline_image_part(image),
            text_part(&moderation_prompt()),
        ]),
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": moderation_response_schema(),
        },
    })
}

fn run_check(gateway: &ModelGateway, image: &ImagePayload) -> Result<ModerationResult, EngineError> {
    let response = gateway.vision()?.generate(&moderation_payload(image))?;
    ModerationResult::from_model_json(&response_text(&response)).map_err(EngineError::ModelResponse)
}

/// Screens a photo before public sharing. Fails open: a broken check never
/// blocks the user.
pub fn moderate_image(gateway: &ModelGateway, image: &ImagePayload) -> ModerationVerdict {
    match run_check(gateway, image) {
        Ok(result) => {
            info!(safe = result.safe, "moderation decided");
            ModerationVerdict {
                result,
                fallback_reason: None,
            }
        }
        Err(err) => {
            warn!(error = %err, "moderation check failed; allowing image");
            ModerationVerdict {
                result: ModerationResult::fail_open(),
                fallback_reason: Some(err.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{gateway_with, settings_with, text_response, ScriptedConnector};

    fn photo() -> ImagePayload {
        ImagePayload::new(b"selfie".to_vec(), "image/png")
    }

    #[test]
    fn rejection_carries_reason() {
        let (gateway, scripts) = gateway_with(
            vec![Ok(text_response(r#"{"safe": false, "reason": " Graphic gore "}"#))],
            vec![],
            vec![],
        );
        let verdict = moderate_image(&gateway, &photo());
        assert_eq!(
            verdict.result,
            ModerationResult {
                safe: false,
                reason: Some("Graphic gore".to_string()),
            }
        );
        assert_eq!(verdict.fallback_reason, None);

        let payload = &scripts.vision.requests()[0].1;
        assert_eq!(
            payload["generationConfig"]["responseSchema"]["required"],
            json!(["safe"])
        );
        let prompt = payload["contents"][0]["parts"][1]["text"]
            .as_str()
            .unwrap_or_default();
        assert!(prompt.contains("nudity"));
    }

    #[test]
    fn safe_image_passes_without_reason() {
        let (gateway, _) = gateway_with(
            vec![Ok(text_response(r#"{"safe": true, "reason": "looks fine"}"#))],
            vec![],
            vec![],
        );
        let verdict = moderate_image(&gateway, &photo());
        assert_eq!(verdict.result, ModerationResult::fail_open());
    }

    #[test]
    fn malformed_or_failed_checks_fail_open() {
        let (gateway, _) = gateway_with(
            vec![
                Ok(text_response("I think it is fine")),
                Ok(text_response("")),
                Err("connection reset".to_string()),
            ],
            vec![],
            vec![],
        );
        for _ in 0..3 {
            let verdict = moderate_image(&gateway, &photo());
            assert!(verdict.result.safe);
            assert_eq!(verdict.result.reason, None);
            assert!(verdict.fallback_reason.is_some());
        }
    }

    #[test]
    fn missing_credential_fails_open() {
        let gateway = ModelGateway::with_connector(settings_with(&[]), ScriptedConnector::default());
        let verdict = moderate_image(&gateway, &photo());
        assert!(verdict.result.safe);
        assert!(verdict
            .fallback_reason
            .as_deref()
            .unwrap_or_default()
            .contains("GEMINI_API_KEY"));
    }
}
