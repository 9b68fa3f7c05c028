//! In-process stand-ins for the HTTP transport.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail};
use serde_json::{json, Value};

use crate::gateway::{Connector, ContentTransport, ModelGateway, Tier};
use crate::settings::Settings;

pub(crate) type Reply = Result<Value, String>;

#[derive(Default)]
pub(crate) struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<(String, Value)>>,
}

impl ScriptedTransport {
    pub(crate) fn push(&self, reply: Reply) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    pub(crate) fn requests(&self) -> Vec<(String, Value)> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

impl ContentTransport for ScriptedTransport {
    fn generate_content(&self, model: &str, payload: &Value) -> anyhow::Result<Value> {
        self.requests
            .lock()
            .map_err(|_| anyhow!("requests lock poisoned"))?
            .push((model.to_string(), payload.clone()));
        let next = self
            .replies
            .lock()
            .map_err(|_| anyhow!("replies lock poisoned"))?
            .pop_front();
        match next {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(anyhow!(message)),
            None => bail!("no scripted reply left"),
        }
    }
}

#[derive(Clone, Default)]
pub(crate) struct ScriptedConnector {
    pub vision: Arc<ScriptedTransport>,
    pub image_gen: Arc<ScriptedTransport>,
    pub search: Arc<ScriptedTransport>,
    pub connects: Arc<AtomicUsize>,
    pub credentials: Arc<Mutex<Vec<(Tier, String)>>>,
}

impl Connector for ScriptedConnector {
    fn connect(&self, tier: Tier, credential: &str) -> anyhow::Result<Arc<dyn ContentTransport>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.credentials
            .lock()
            .map_err(|_| anyhow!("credentials lock poisoned"))?
            .push((tier, credential.to_string()));
        let transport: Arc<dyn ContentTransport> = match tier {
            Tier::Vision => self.vision.clone(),
            Tier::ImageGen => self.image_gen.clone(),
            Tier::Search => self.search.clone(),
        };
        Ok(transport)
    }
}

pub(crate) fn settings_with(pairs: &[(&str, &str)]) -> Settings {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    Settings::from_lookup(|key| map.get(key).cloned())
}

/// Gateway with all three credentials set and scripted replies per tier.
pub(crate) fn gateway_with(
    vision: Vec<Reply>,
    image_gen: Vec<Reply>,
    search: Vec<Reply>,
) -> (ModelGateway, ScriptedConnector) {
    let connector = ScriptedConnector::default();
    for reply in vision {
        connector.vision.push(reply);
    }
    for reply in image_gen {
        connector.image_gen.push(reply);
    }
    for reply in search {
        connector.search.push(reply);
    }
    let settings = settings_with(&[
        ("GEMINI_API_KEY", "free-key"),
        ("GEMINI_IMAGE_API_KEY", "billed-key"),
        ("GEMINI_SEARCH_API_KEY", "search-key"),
    ]);
    (
        ModelGateway::with_connector(settings, connector.clone()),
        connector,
    )
}

pub(crate) fn text_response(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP",
        }],
    })
}

pub(crate) fn grounded_response(uris: &[&str], text: &str) -> Value {
    let chunks: Vec<Value> = uris
        .iter()
        .map(|uri| json!({"web": {"uri": uri, "title": "source"}}))
        .collect();
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "groundingMetadata": {"groundingChunks": chunks},
        }],
    })
}

pub(crate) fn image_response(mime_type: Option<&str>, data: &str) -> Value {
    let mut inline = json!({"data": data});
    if let Some(mime_type) = mime_type {
        inline["mimeType"] = json!(mime_type);
    }
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [
                {"text": "Here is the illustration."},
                {"inlineData": inline},
            ]},
        }],
    })
}
