use std::collections::HashMap;
use std::env;
use std::path::Path;

use tracing::{debug, warn};

use crate::gateway::Tier;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_REQUEST_TIMEOUT_S: f64 = 90.0;
const DEFAULT_TRANSPORT_RETRIES: usize = 0;

/// Process configuration: one credential per tier plus transport knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub vision_api_key: Option<String>,
    pub image_api_key: Option<String>,
    pub search_api_key: Option<String>,
    pub api_base: String,
    pub vision_model: Option<String>,
    pub image_model: Option<String>,
    pub search_model: Option<String>,
    pub request_timeout_s: f64,
    pub transport_retries: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Settings {
    /// Reads the environment, filling gaps from a `.env` file when present.
    /// Variables already set in the environment win over the file.
    pub fn load(env_file: Option<&Path>) -> Self {
        let file_vars = env_file.map(parse_dotenv).unwrap_or_default();
        Self::from_lookup(|key| {
            env::var(key)
                .ok()
                .filter(|value| !value.trim().is_empty())
                .or_else(|| file_vars.get(key).cloned())
        })
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let first = |keys: &[&str]| -> Option<String> {
            keys.iter().find_map(|key| {
                lookup(key)
                    .map(|value| value.trim().to_string())
                    .filter(|value| !value.is_empty())
            })
        };

        Self {
            vision_api_key: first(&["GEMINI_API_KEY", "GOOGLE_API_KEY"]),
            image_api_key: first(&["GEMINI_IMAGE_API_KEY"]),
            search_api_key: first(&["GEMINI_SEARCH_API_KEY"]),
            api_base: first(&["GEMINI_API_BASE"])
                .map(|value| value.trim_end_matches('/').to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            vision_model: first(&["FIXIT_VISION_MODEL"]),
            image_model: first(&["FIXIT_IMAGE_MODEL"]),
            search_model: first(&["FIXIT_SEARCH_MODEL"]),
            request_timeout_s: parse_clamped_f64(
                first(&["FIXIT_REQUEST_TIMEOUT_SECS"]),
                DEFAULT_REQUEST_TIMEOUT_S,
                5.0,
                300.0,
            ),
            transport_retries: parse_clamped_f64(
                first(&["FIXIT_TRANSPORT_RETRIES"]),
                DEFAULT_TRANSPORT_RETRIES as f64,
                0.0,
                4.0,
            )
            .round() as usize,
        }
    }

    /// The billed image tier never borrows a free-tier credential; search
    /// shares the free vision credential when it has none of its own.
    pub fn credential_for(&self, tier: Tier) -> Option<&str> {
        match tier {
            Tier::Vision => self.vision_api_key.as_deref(),
            Tier::ImageGen => self.image_api_key.as_deref(),
            Tier::Search => self
                .search_api_key
                .as_deref()
                .or(self.vision_api_key.as_deref()),
        }
    }

    pub fn requested_model(&self, tier: Tier) -> Option<&str> {
        match tier {
            Tier::Vision => self.vision_model.as_deref(),
            Tier::ImageGen => self.image_model.as_deref(),
            Tier::Search => self.search_model.as_deref(),
        }
    }
}

fn parse_clamped_f64(raw: Option<String>, default: f64, min: f64, max: f64) -> f64 {
    raw.and_then(|value| value.parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(default)
        .clamp(min, max)
}

/// Variables from a `.env` file without touching the process environment.
/// A missing file yields nothing; unparseable lines are skipped.
pub fn parse_dotenv(path: &Path) -> HashMap<String, String> {
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(err) => {
            debug!(path = %path.display(), error = %err, "no usable .env file");
            return HashMap::new();
        }
    };
    let mut vars = HashMap::new();
    for item in iter {
        match item {
            Ok((key, value)) => {
                vars.insert(key, value);
            }
            Err(err) => warn!(path = %path.display(), error = %err, "skipping .env line"),
        }
    }
    vars
}
