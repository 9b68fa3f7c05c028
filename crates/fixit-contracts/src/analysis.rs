use serde::{Deserialize, Serialize};

pub const MIN_STEPS: usize = 3;
pub const MAX_STEPS: usize = 5;

// Matched anywhere in the lowercased instruction.
const TOOL_GATHERING_PHRASES: &[&str] = &[
    "gather",
    "collect",
    "grab",
    "tool",
    "prepare",
    "have ready",
    "you will need",
    "you'll need",
    "supplies",
    "materials",
    "equipment",
    "assemble",
];
// Matched as whole words only, so "forget" does not count as "get".
const TOOL_GATHERING_WORDS: &[&str] = &["get", "fetch", "need"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepairStatus {
    Ok,
    Unsafe,
    Unclear,
}

impl RepairStatus {
    pub const ALL: [RepairStatus; 3] = [Self::Ok, Self::Unsafe, Self::Unclear];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Unsafe => "unsafe",
            Self::Unclear => "unclear",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepairCategory {
    Electronics,
    Plumbing,
    Appliance,
    Furniture,
    Other,
}

impl RepairCategory {
    pub const ALL: [RepairCategory; 5] = [
        Self::Electronics,
        Self::Plumbing,
        Self::Appliance,
        Self::Furniture,
        Self::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Electronics => "electronics",
            Self::Plumbing => "plumbing",
            Self::Appliance => "appliance",
            Self::Furniture => "furniture",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairStep {
    pub step_number: u32,
    pub instruction: String,
    pub visual_description: String,
    /// Filled by the draft pipeline; never requested from the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairAnalysis {
    pub status: RepairStatus,
    pub object_name: String,
    pub category: RepairCategory,
    pub issue_type: String,
    #[serde(default)]
    pub safety_warning: Option<String>,
    pub tools_needed: bool,
    pub ideal_view_instruction: String,
    pub steps: Vec<RepairStep>,
}

impl RepairAnalysis {
    /// Parses the structured-output text returned by the vision model.
    ///
    /// The result is either a fully valid analysis or a description of the
    /// first violation found; nothing partially valid escapes.
    pub fn from_model_json(text: &str) -> Result<Self, String> {
        let body = strip_code_fence(text);
        if body.is_empty() {
            return Err("model returned an empty analysis".to_string());
        }
        let mut analysis: RepairAnalysis = serde_json::from_str(&body)
            .map_err(|err| format!("analysis JSON did not match the schema: {err}"))?;
        analysis.normalize();
        analysis.validate()?;
        Ok(analysis)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.object_name.trim().is_empty() {
            return Err("objectName is empty".to_string());
        }
        if self.issue_type.trim().is_empty() {
            return Err("issueType is empty".to_string());
        }
        let count = self.steps.len();
        if !(MIN_STEPS..=MAX_STEPS).contains(&count) {
            return Err(format!(
                "expected {MIN_STEPS}-{MAX_STEPS} steps, model returned {count}"
            ));
        }
        for (idx, step) in self.steps.iter().enumerate() {
            let expected = idx as u32 + 1;
            if step.step_number != expected {
                return Err(format!(
                    "step at position {expected} is numbered {}",
                    step.step_number
                ));
            }
            if step.instruction.trim().is_empty() {
                return Err(format!("step {expected} has an empty instruction"));
            }
        }
        if self.tools_needed && !reads_as_tool_gathering(&self.steps[0].instruction) {
            return Err(format!(
                "toolsNeeded is true but step 1 is not a tool-gathering step: {:?}",
                self.steps[0].instruction
            ));
        }
        Ok(())
    }

    fn normalize(&mut self) {
        self.object_name = self.object_name.trim().to_string();
        self.issue_type = self.issue_type.trim().to_string();
        self.ideal_view_instruction = self.ideal_view_instruction.trim().to_string();
        self.safety_warning = self
            .safety_warning
            .take()
            .map(|warning| warning.trim().to_string())
            .filter(|warning| !warning.is_empty());
        for step in &mut self.steps {
            step.instruction = step.instruction.trim().to_string();
            step.visual_description = step.visual_description.trim().to_string();
            step.generated_image_url = None;
        }
    }
}

pub fn reads_as_tool_gathering(instruction: &str) -> bool {
    let lowered = instruction.to_ascii_lowercase();
    if TOOL_GATHERING_PHRASES
        .iter()
        .any(|phrase| lowered.contains(phrase))
    {
        return true;
    }
    lowered
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|word| TOOL_GATHERING_WORDS.contains(&word))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationResult {
    pub safe: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

impl ModerationResult {
    pub fn fail_open() -> Self {
        Self {
            safe: true,
            reason: None,
        }
    }

    pub fn from_model_json(text: &str) -> Result<Self, String> {
        let body = strip_code_fence(text);
        if body.is_empty() {
            return Err("model returned an empty moderation decision".to_string());
        }
        let parsed: ModerationResult = serde_json::from_str(&body)
            .map_err(|err| format!("moderation JSON did not match the schema: {err}"))?;
        Ok(parsed.normalized())
    }

    fn normalized(self) -> Self {
        if self.safe {
            return Self::fail_open();
        }
        Self {
            safe: false,
            reason: self
                .reason
                .map(|reason| reason.trim().to_string())
                .filter(|reason| !reason.is_empty()),
        }
    }
}

pub fn strip_code_fence(text: &str) -> String {
    let raw = text.trim();
    if !(raw.starts_with("```") && raw.ends_with("```")) {
        return raw.to_string();
    }
    let lines: Vec<&str> = raw.lines().collect();
    if lines.len() < 2 {
        return raw.to_string();
    }
    let mut body = lines[1..lines.len() - 1].join("\n").trim().to_string();
    if body.to_ascii_lowercase().starts_with("json") {
        body = body[4..].trim().to_string();
    }
    body
}
