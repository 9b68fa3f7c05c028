use fixit_contracts::catalog::{analysis_prompt, analysis_response_schema};
use fixit_contracts::RepairAnalysis;
use serde_json::{json, Value};
use tracing::info;

use crate::codec::ImagePayload;
use crate::error::{EngineError, EngineResult};
use crate::gateway::{
    block_reason, inline_image_part, response_text, text_part, user_content, ModelGateway,
};

pub(crate) fn analysis_payload(image: &ImagePayload, user_text: &str) -> Value {
    json!({
        "contents": user_content(vec![
            inline_image_part(image),
            text_part(&analysis_prompt(user_text)),
        ]),
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": analysis_response_schema(),
        },
    })
}

/// Diagnoses the photographed object. The only operation allowed to fail
/// visibly: every error reaches the caller.
pub fn analyze_image(
    gateway: &ModelGateway,
    image: &ImagePayload,
    user_text: &str,
) -> EngineResult<RepairAnalysis> {
    let capability = gateway.vision()?;
    let response = capability.generate(&analysis_payload(image, user_text))?;
    let text = response_text(&response);
    if text.is_empty() {
        let detail = block_reason(&response)
            .map(|reason| format!(" (blocked: {reason})"))
            .unwrap_or_default();
        return Err(EngineError::ModelResponse(format!(
            "vision model returned no analysis text{detail}"
        )));
    }
    let analysis = RepairAnalysis::from_model_json(&text).map_err(EngineError::ModelResponse)?;
    info!(
        object = %analysis.object_name,
        status = analysis.status.as_str(),
        steps = analysis.steps.len(),
        "analysis complete"
    );
    Ok(analysis)
}
