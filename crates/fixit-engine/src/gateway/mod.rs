//! Capability handles for the three external model tiers.
//!
//! A [`ModelGateway`] is built once per process and passed by reference to
//! every orchestrator. Each tier's handle is constructed on first use from
//! that tier's own credential and then cached, read-only, for the lifetime of
//! the gateway.

mod payload;
mod transport;

use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};

use fixit_contracts::models::{
    select_model, CAPABILITY_IMAGE, CAPABILITY_SEARCH, CAPABILITY_VISION,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{error_chain_text, EngineError, EngineResult};
use crate::settings::Settings;

pub use payload::{
    block_reason, grounding_uris, inline_image_part, inline_images, response_text, text_part,
    user_content, InlineImage,
};
pub use transport::{ContentTransport, GeminiHttpTransport, HttpConnector};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Free tier: text and vision.
    Vision,
    /// Billed tier: image generation.
    ImageGen,
    /// Grounded search.
    Search,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vision => "vision",
            Self::ImageGen => "image_gen",
            Self::Search => "search",
        }
    }

    pub fn capability(self) -> &'static str {
        match self {
            Self::Vision => CAPABILITY_VISION,
            Self::ImageGen => CAPABILITY_IMAGE,
            Self::Search => CAPABILITY_SEARCH,
        }
    }

    pub fn credential_env(self) -> &'static str {
        match self {
            Self::Vision => "GEMINI_API_KEY",
            Self::ImageGen => "GEMINI_IMAGE_API_KEY",
            Self::Search => "GEMINI_SEARCH_API_KEY",
        }
    }

    pub fn is_billed(self) -> bool {
        matches!(self, Self::ImageGen)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds an authenticated transport for one tier.
pub trait Connector: Send + Sync {
    fn connect(&self, tier: Tier, credential: &str) -> anyhow::Result<Arc<dyn ContentTransport>>;
}

/// An authenticated handle bound to one tier and one model.
#[derive(Clone)]
pub struct Capability {
    tier: Tier,
    model: String,
    transport: Arc<dyn ContentTransport>,
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("tier", &self.tier)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl Capability {
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn generate(&self, payload: &Value) -> EngineResult<Value> {
        debug!(tier = %self.tier, model = %self.model, "generateContent request");
        self.transport
            .generate_content(&self.model, payload)
            .map_err(|err| EngineError::Transport(error_chain_text(&err, 600)))
    }
}

pub struct ModelGateway {
    settings: Settings,
    connector: Box<dyn Connector>,
    vision: OnceLock<Capability>,
    image_gen: OnceLock<Capability>,
    search: OnceLock<Capability>,
    init_lock: Mutex<()>,
}

impl fmt::Debug for ModelGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelGateway")
            .field("api_base", &self.settings.api_base)
            .field("vision", &self.vision.get())
            .field("image_gen", &self.image_gen.get())
            .field("search", &self.search.get())
            .finish_non_exhaustive()
    }
}

impl ModelGateway {
    pub fn new(settings: Settings) -> Self {
        let connector = HttpConnector::from_settings(&settings);
        Self::with_connector(settings, connector)
    }

    pub fn with_connector(settings: Settings, connector: impl Connector + 'static) -> Self {
        Self {
            settings,
            connector: Box::new(connector),
            vision: OnceLock::new(),
            image_gen: OnceLock::new(),
            search: OnceLock::new(),
            init_lock: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn vision(&self) -> EngineResult<&Capability> {
        self.capability(Tier::Vision)
    }

    pub fn image_gen(&self) -> EngineResult<&Capability> {
        self.capability(Tier::ImageGen)
    }

    pub fn search(&self) -> EngineResult<&Capability> {
        self.capability(Tier::Search)
    }

    pub fn capability(&self, tier: Tier) -> EngineResult<&Capability> {
        let slot = self.slot(tier);
        if let Some(capability) = slot.get() {
            return Ok(capability);
        }
        let _guard = self.init_lock.lock().map_err(|_| {
            EngineError::Configuration("capability init lock poisoned".to_string())
        })?;
        if let Some(capability) = slot.get() {
            return Ok(capability);
        }
        let capability = self.build(tier)?;
        info!(tier = %tier, model = %capability.model, billed = tier.is_billed(), "capability ready");
        Ok(slot.get_or_init(|| capability))
    }

    fn slot(&self, tier: Tier) -> &OnceLock<Capability> {
        match tier {
            Tier::Vision => &self.vision,
            Tier::ImageGen => &self.image_gen,
            Tier::Search => &self.search,
        }
    }

    fn build(&self, tier: Tier) -> EngineResult<Capability> {
        let Some(credential) = self.settings.credential_for(tier) else {
            return Err(EngineError::Configuration(format!(
                "{} not set for the {tier} tier",
                tier.credential_env()
            )));
        };
        validate_credential(tier, credential)?;

        let selection = select_model(self.settings.requested_model(tier), tier.capability())
            .map_err(EngineError::Configuration)?;
        if let Some(reason) = &selection.fallback_reason {
            warn!(tier = %tier, model = %selection.model, "{reason}");
        }

        let transport = self.connector.connect(tier, credential).map_err(|err| {
            EngineError::Configuration(format!(
                "could not build {tier} client: {}",
                error_chain_text(&err, 300)
            ))
        })?;
        Ok(Capability {
            tier,
            model: selection.model,
            transport,
        })
    }
}

fn validate_credential(tier: Tier, credential: &str) -> EngineResult<()> {
    if credential.trim().is_empty() {
        return Err(EngineError::Configuration(format!(
            "{} is blank",
            tier.credential_env()
        )));
    }
    if credential
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || !c.is_ascii())
    {
        return Err(EngineError::Configuration(format!(
            "{} contains characters that cannot appear in an API key",
            tier.credential_env()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::thread;

    use serde_json::json;

    use super::*;
    use crate::testing::{gateway_with, settings_with, ScriptedConnector};

    #[test]
    fn handles_are_built_once_and_cached() -> anyhow::Result<()> {
        let (gateway, scripts) = gateway_with(vec![], vec![], vec![]);
        let first = gateway.vision()? as *const Capability;
        let second = gateway.vision()? as *const Capability;
        assert_eq!(first, second);
        assert_eq!(scripts.connects.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.vision()?.model(), "gemini-2.5-flash");
        Ok(())
    }

    #[test]
    fn concurrent_first_use_constructs_a_single_handle() {
        let (gateway, scripts) = gateway_with(vec![], vec![], vec![]);
        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    assert!(gateway.search().is_ok());
                });
            }
        });
        assert_eq!(scripts.connects.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn each_tier_connects_with_its_own_credential() -> anyhow::Result<()> {
        let (gateway, scripts) = gateway_with(vec![], vec![], vec![]);
        gateway.vision()?;
        gateway.image_gen()?;
        gateway.search()?;
        let seen = scripts.credentials.lock().map_err(|_| anyhow::anyhow!("poisoned"))?;
        assert_eq!(
            seen.as_slice(),
            &[
                (Tier::Vision, "free-key".to_string()),
                (Tier::ImageGen, "billed-key".to_string()),
                (Tier::Search, "search-key".to_string()),
            ]
        );
        Ok(())
    }

    #[test]
    fn missing_billed_credential_is_a_configuration_error() {
        let settings = settings_with(&[("GEMINI_API_KEY", "free-key")]);
        let gateway = ModelGateway::with_connector(settings, ScriptedConnector::default());
        let err = gateway.image_gen().unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
        assert!(err.to_string().contains("GEMINI_IMAGE_API_KEY"));
        assert!(gateway.vision().is_ok());
    }

    #[test]
    fn malformed_credential_is_rejected_before_connecting() {
        let settings = settings_with(&[("GEMINI_API_KEY", "free key with spaces")]);
        let connector = ScriptedConnector::default();
        let connects = connector.connects.clone();
        let gateway = ModelGateway::with_connector(settings, connector);
        assert!(matches!(
            gateway.vision(),
            Err(EngineError::Configuration(_))
        ));
        assert_eq!(connects.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unknown_model_override_falls_back_to_tier_default() -> anyhow::Result<()> {
        let settings = settings_with(&[
            ("GEMINI_API_KEY", "free-key"),
            ("FIXIT_VISION_MODEL", "gemini-2.5-flash-image"),
        ]);
        let gateway = ModelGateway::with_connector(settings, ScriptedConnector::default());
        assert_eq!(gateway.vision()?.model(), "gemini-2.5-flash");
        Ok(())
    }

    #[test]
    fn transport_failures_surface_as_transport_errors() {
        let (gateway, _scripts) =
            gateway_with(vec![Err("HTTP 429 quota exhausted".to_string())], vec![], vec![]);
        let err = gateway
            .vision()
            .and_then(|capability| capability.generate(&json!({})))
            .unwrap_err();
        assert!(matches!(err, EngineError::Transport(ref message) if message.contains("429")));
    }
}
