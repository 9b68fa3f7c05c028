use std::thread;

use chrono::Utc;
use fixit_contracts::catalog::IDEAL_VIEW_STEP;
use fixit_contracts::{RepairDraft, RepairStep};
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::analyze_image;
use crate::codec::ImagePayload;
use crate::error::EngineResult;
use crate::gateway::ModelGateway;
use crate::illustration::{generate_step_image, Illustration, IllustrationRequest};
use crate::manual::find_manual;

/// Analysis first, then the best-effort enrichments. Only the analysis can
/// fail the draft; every other shortfall is recorded in `warnings`.
pub fn prepare_draft(
    gateway: &ModelGateway,
    photo: &ImagePayload,
    user_text: &str,
) -> EngineResult<RepairDraft> {
    let mut analysis = analyze_image(gateway, photo, user_text)?;
    let mut warnings = Vec::new();

    let manual = find_manual(gateway, &analysis.object_name);
    if let Some(reason) = &manual.fallback_reason {
        warnings.push(format!("manual search: {reason}"));
    }

    let ideal_view = generate_step_image(
        gateway,
        &IllustrationRequest {
            object_name: &analysis.object_name,
            step_instruction: IDEAL_VIEW_STEP,
            ideal_view: &analysis.ideal_view_instruction,
            reference: Some(photo),
        },
    );
    if let Some(reason) = &ideal_view.fallback_reason {
        warnings.push(format!("ideal view image: {reason}"));
    }

    let step_images = illustrate_steps(
        gateway,
        photo,
        &analysis.object_name,
        &analysis.ideal_view_instruction,
        &analysis.steps,
    );
    for (step, illustration) in analysis.steps.iter_mut().zip(step_images) {
        if let Some(reason) = &illustration.fallback_reason {
            warnings.push(format!("step {} image: {reason}", step.step_number));
        }
        step.generated_image_url = illustration.data_uri();
    }

    let draft = RepairDraft {
        repair_id: Uuid::new_v4().to_string(),
        timestamp: Utc::now().timestamp_millis(),
        is_public: false,
        is_successful: None,
        user_photo_url: photo.to_data_uri(),
        ideal_view_image_url: ideal_view.data_uri(),
        manual_url: manual.url,
        analysis,
        warnings,
    };
    if draft.warnings.is_empty() {
        info!(repair_id = %draft.repair_id, "repair draft ready");
    } else {
        warn!(
            repair_id = %draft.repair_id,
            warnings = draft.warnings.len(),
            "repair draft ready with missing enrichments"
        );
    }
    Ok(draft)
}

/// One image call per step, all in flight at once. Results come back in
/// step order.
fn illustrate_steps(
    gateway: &ModelGateway,
    photo: &ImagePayload,
    object_name: &str,
    ideal_view: &str,
    steps: &[RepairStep],
) -> Vec<Illustration> {
    thread::scope(|scope| {
        let handles: Vec<_> = steps
            .iter()
            .map(|step| {
                let request = IllustrationRequest {
                    object_name,
                    step_instruction: &step.instruction,
                    ideal_view,
                    reference: Some(photo),
                };
                scope.spawn(move || generate_step_image(gateway, &request))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle.join().unwrap_or_else(|_| Illustration {
                    image: None,
                    fallback_reason: Some("illustration worker panicked".to_string()),
                })
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;
    use serde_json::json;

    use super::*;
    use crate::error::EngineError;
    use crate::testing::{gateway_with, grounded_response, image_response, text_response};

    fn photo() -> ImagePayload {
        ImagePayload::new(b"user-photo".to_vec(), "image/jpeg")
    }

    fn analysis_body() -> String {
        json!({
            "status": "ok",
            "objectName": "IKEA Poang chair",
            "category": "furniture",
            "issueType": "Wobbly armrest",
            "toolsNeeded": true,
            "idealViewInstruction": "Side view of the armrest joint",
            "steps": [
                {"stepNumber": 1, "instruction": "Gather tools: hex key", "visualDescription": "Hex key"},
                {"stepNumber": 2, "instruction": "Tighten the armrest bolts", "visualDescription": "Bolts"},
                {"stepNumber": 3, "instruction": "Test the chair", "visualDescription": "Sitting"},
            ],
        })
        .to_string()
    }

    #[test]
    fn draft_combines_every_enrichment() -> anyhow::Result<()> {
        let image = BASE64.encode(b"png");
        let (gateway, scripts) = gateway_with(
            vec![Ok(text_response(&analysis_body()))],
            (0..4)
                .map(|_| Ok(image_response(Some("image/png"), &image)))
                .collect(),
            vec![Ok(grounded_response(&["https://ikea.test/poang.pdf"], ""))],
        );
        let draft = prepare_draft(&gateway, &photo(), "armrest wobbles")?;

        assert!(!draft.repair_id.is_empty());
        assert!(draft.timestamp > 0);
        assert!(!draft.is_public);
        assert_eq!(draft.is_successful, None);
        assert_eq!(draft.user_photo_url, photo().to_data_uri());
        assert_eq!(draft.manual_url.as_deref(), Some("https://ikea.test/poang.pdf"));
        let expected = format!("data:image/png;base64,{image}");
        assert_eq!(draft.ideal_view_image_url.as_deref(), Some(expected.as_str()));
        assert!(draft
            .analysis
            .steps
            .iter()
            .all(|step| step.generated_image_url.as_deref() == Some(expected.as_str())));
        assert!(draft.warnings.is_empty());

        let prompts: Vec<String> = scripts
            .image_gen
            .requests()
            .iter()
            .map(|(_, payload)| {
                payload["contents"][0]["parts"][1]["text"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string()
            })
            .collect();
        assert_eq!(prompts.len(), 4);
        assert!(prompts[0].contains("Action: Overview for setup."));

        let serialized = serde_json::to_value(&draft)?;
        assert_eq!(serialized["objectName"], json!("IKEA Poang chair"));
        assert_eq!(serialized["isSuccessful"], json!(null));
        assert!(serialized.get("warnings").is_none());
        Ok(())
    }

    #[test]
    fn auxiliary_failures_become_warnings() -> anyhow::Result<()> {
        let (gateway, _) = gateway_with(
            vec![Ok(text_response(&analysis_body()))],
            vec![],
            vec![Err("Gemini request failed (429): quota".to_string())],
        );
        let draft = prepare_draft(&gateway, &photo(), "")?;
        assert_eq!(draft.manual_url, None);
        assert_eq!(draft.ideal_view_image_url, None);
        assert!(draft
            .analysis
            .steps
            .iter()
            .all(|step| step.generated_image_url.is_none()));
        assert_eq!(draft.warnings.len(), 5);
        assert!(draft.warnings[0].starts_with("manual search: transport error"));
        assert!(draft.warnings[1].starts_with("ideal view image:"));
        assert!(draft.warnings[2].starts_with("step 1 image:"));
        Ok(())
    }

    #[test]
    fn analysis_failure_aborts_the_draft() {
        let (gateway, scripts) = gateway_with(
            vec![Ok(text_response("not json"))],
            vec![],
            vec![],
        );
        let err = prepare_draft(&gateway, &photo(), "").unwrap_err();
        assert!(matches!(err, EngineError::ModelResponse(_)));
        assert!(scripts.search.requests().is_empty());
        assert!(scripts.image_gen.requests().is_empty());
    }
}
