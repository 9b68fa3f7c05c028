//! Gemini models the gateway may bind to, keyed by capability.

pub const CAPABILITY_VISION: &str = "vision";
pub const CAPABILITY_IMAGE: &str = "image";
pub const CAPABILITY_SEARCH: &str = "search";

struct KnownModel {
    name: &'static str,
    capabilities: &'static [&'static str],
}

// The first model listed for a capability is that tier's default.
const KNOWN_MODELS: &[KnownModel] = &[
    KnownModel {
        name: "gemini-2.5-flash",
        capabilities: &[CAPABILITY_VISION, CAPABILITY_SEARCH],
    },
    KnownModel {
        name: "gemini-2.5-flash-image",
        capabilities: &[CAPABILITY_IMAGE],
    },
    KnownModel {
        name: "gemini-2.5-pro",
        capabilities: &[CAPABILITY_VISION, CAPABILITY_SEARCH],
    },
    KnownModel {
        name: "gemini-3-flash-preview",
        capabilities: &[CAPABILITY_VISION, CAPABILITY_SEARCH],
    },
    KnownModel {
        name: "gemini-3-pro-preview",
        capabilities: &[CAPABILITY_VISION, CAPABILITY_SEARCH],
    },
    KnownModel {
        name: "gemini-3-pro-image-preview",
        capabilities: &[CAPABILITY_IMAGE],
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: String,
    /// Set when a requested model was rejected in favour of the default.
    pub fallback_reason: Option<String>,
}

pub fn default_model(capability: &str) -> Option<&'static str> {
    KNOWN_MODELS
        .iter()
        .find(|model| model.capabilities.contains(&capability))
        .map(|model| model.name)
}

/// Honors `requested` when it names a known model with `capability`,
/// otherwise falls back to the capability's default. A `models/` prefix is
/// accepted; blank requests count as unspecified.
pub fn select_model(requested: Option<&str>, capability: &str) -> Result<ModelSelection, String> {
    let requested = requested
        .map(|value| value.trim().trim_start_matches("models/"))
        .filter(|value| !value.is_empty());
    if let Some(name) = requested {
        let known = KNOWN_MODELS
            .iter()
            .any(|model| model.name == name && model.capabilities.contains(&capability));
        if known {
            return Ok(ModelSelection {
                model: name.to_string(),
                fallback_reason: None,
            });
        }
    }
    let Some(default) = default_model(capability) else {
        return Err(format!("No models available for capability '{capability}'."));
    };
    Ok(ModelSelection {
        model: default.to_string(),
        fallback_reason: requested.map(|name| {
            format!("Requested model '{name}' unavailable for capability '{capability}'.")
        }),
    })
}
