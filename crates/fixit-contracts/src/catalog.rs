//! Fixed prompt templates and structured-output schemas for every model call.

use serde_json::{json, Value};

use crate::analysis::{RepairCategory, RepairStatus, MAX_STEPS, MIN_STEPS};

pub const TROUBLESHOOT_FALLBACK: &str = "I'm having trouble analyzing the live feed. Please double-check your tools and the instruction text.";
pub const TROUBLESHOOT_EMPTY_REPLY: &str =
    "Check all connections and try the step again carefully.";
pub const ILLUSTRATION_ASPECT_RATIO: &str = "1:1";
pub const IDEAL_VIEW_STEP: &str = "Overview for setup";
pub const MODERATION_REJECT_CRITERIA: &[&str] = &["nudity", "violence", "gore", "hate symbols"];

pub fn analysis_prompt(user_text: &str) -> String {
    let user_context = user_text.trim();
    let user_line = if user_context.is_empty() {
        String::new()
    } else {
        format!("User context: \"{user_context}\"\n")
    };
    format!(
        "You are a repair diagnostic AI. Analyze this image and return valid JSON following the provided schema.\n\
{user_line}\n\
TASKS:\n\
1. Identify the object (brand/model if visible)\n\
2. Identify the defect or issue\n\
3. Check if repair is safe for non-experts\n\
4. Determine if external tools are required\n\
5. Plan {MIN_STEPS}-{MAX_STEPS} repair steps\n\
\n\
SAFETY RULES:\n\
- If electrical with exposed wiring -> status: \"unsafe\"\n\
- If gas appliance -> status: \"unsafe\"\n\
- If spring-loaded/high tension -> add warning in safetyWarning\n\
\n\
STEP 1 RULES:\n\
- If toolsNeeded=true: Step 1 = \"Gather tools: [list]\"\n\
- If toolsNeeded=false: Step 1 = immediate action\n\
Number steps from 1 in execution order. Limit steps to {MIN_STEPS}-{MAX_STEPS}. Be specific."
    )
}

pub fn analysis_response_schema() -> Value {
    let statuses: Vec<&str> = RepairStatus::ALL.iter().map(|s| s.as_str()).collect();
    let categories: Vec<&str> = RepairCategory::ALL.iter().map(|c| c.as_str()).collect();
    json!({
        "type": "OBJECT",
        "properties": {
            "status": {"type": "STRING", "enum": statuses},
            "objectName": {"type": "STRING"},
            "category": {"type": "STRING", "enum": categories},
            "issueType": {"type": "STRING"},
            "safetyWarning": {"type": "STRING", "nullable": true},
            "toolsNeeded": {"type": "BOOLEAN"},
            "idealViewInstruction": {"type": "STRING"},
            "steps": {
                "type": "ARRAY",
                "minItems": MIN_STEPS,
                "maxItems": MAX_STEPS,
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "stepNumber": {"type": "INTEGER"},
                        "instruction": {"type": "STRING"},
                        "visualDescription": {"type": "STRING"},
                    },
                    "required": ["stepNumber", "instruction", "visualDescription"],
                    "propertyOrdering": ["stepNumber", "instruction", "visualDescription"],
                },
            },
        },
        "required": [
            "status",
            "objectName",
            "category",
            "issueType",
            "toolsNeeded",
            "idealViewInstruction",
            "steps",
        ],
        "propertyOrdering": [
            "status",
            "objectName",
            "category",
            "issueType",
            "safetyWarning",
            "toolsNeeded",
            "idealViewInstruction",
            "steps",
        ],
    })
}

pub fn illustration_prompt(object_name: &str, step_instruction: &str, ideal_view: &str) -> String {
    format!(
        "Professional technical repair manual photograph. Object: {}. Scene: {}. Action: {}. \
High-quality studio lighting, sharp focus on repair area, neutral background, no text overlays, \
realistic photographic style.",
        object_name.trim(),
        ideal_view.trim(),
        step_instruction.trim()
    )
}

/// `step_index` is zero-based; the prompt speaks in 1-based step numbers.
pub fn troubleshoot_prompt(object_name: &str, step_index: usize, step_text: &str) -> String {
    format!(
        "The user is repairing a {} and is currently at Step {}: \"{}\". They have provided a photo \
of their current state because they are \"stuck\". Analyze the photo, identify common pitfalls at \
this stage, and provide encouraging, expert troubleshooting advice with concrete next actions. \
Keep it under 100 words.",
        object_name.trim(),
        step_index + 1,
        step_text.trim()
    )
}

pub fn moderation_prompt() -> String {
    format!(
        "Analyze this image for safety before it is posted publicly. REJECT if: {}. \
Return JSON: {{ \"safe\": boolean, \"reason\": string | null }}. \
Only give a reason when the image is rejected.",
        MODERATION_REJECT_CRITERIA.join(", ")
    )
}

pub fn moderation_response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "safe": {"type": "BOOLEAN"},
            "reason": {"type": "STRING", "nullable": true},
        },
        "required": ["safe"],
        "propertyOrdering": ["safe", "reason"],
    })
}
