use serde_json::{json, Value};

use crate::codec::ImagePayload;

pub fn inline_image_part(image: &ImagePayload) -> Value {
    json!({
        "inlineData": {
            "mimeType": image.mime_type,
            "data": image.to_base64(),
        }
    })
}

pub fn text_part(text: &str) -> Value {
    json!({ "text": text })
}

pub fn user_content(parts: Vec<Value>) -> Value {
    json!([{ "role": "user", "parts": parts }])
}

fn first_candidate(response: &Value) -> Option<&Value> {
    response
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
}

fn candidate_parts(response: &Value) -> Vec<Value> {
    first_candidate(response)
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Concatenated text parts of the first candidate, skipping thought parts.
pub fn response_text(response: &Value) -> String {
    let mut out = String::new();
    for part in candidate_parts(response) {
        if part.get("thought").and_then(Value::as_bool).unwrap_or(false) {
            continue;
        }
        if let Some(text) = part.get("text").and_then(Value::as_str) {
            out.push_str(text);
        }
    }
    out.trim().to_string()
}

/// Web URIs from the first candidate's grounding chunks, in response order.
pub fn grounding_uris(response: &Value) -> Vec<String> {
    first_candidate(response)
        .and_then(|candidate| candidate.get("groundingMetadata"))
        .and_then(|metadata| metadata.get("groundingChunks"))
        .and_then(Value::as_array)
        .map(|chunks| {
            chunks
                .iter()
                .filter_map(|chunk| {
                    chunk
                        .get("web")
                        .and_then(|web| web.get("uri"))
                        .and_then(Value::as_str)
                        .map(str::trim)
                        .filter(|uri| !uri.is_empty())
                        .map(str::to_string)
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Inline payload exactly as the API reported it: base64 text plus an
/// optional media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub data: String,
    pub mime_type: Option<String>,
}

pub fn inline_images(response: &Value) -> Vec<InlineImage> {
    let mut out = Vec::new();
    for part in candidate_parts(response) {
        let Some(inline) = part
            .get("inlineData")
            .or_else(|| part.get("inline_data"))
            .and_then(Value::as_object)
        else {
            continue;
        };
        let data = inline
            .get("data")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if data.is_empty() {
            continue;
        }
        let mime_type = inline
            .get("mimeType")
            .or_else(|| inline.get("mime_type"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        out.push(InlineImage {
            data: data.to_string(),
            mime_type,
        });
    }
    out
}

/// Why the API refused to answer, when it says so.
pub fn block_reason(response: &Value) -> Option<String> {
    if let Some(reason) = response
        .get("promptFeedback")
        .and_then(|feedback| feedback.get("blockReason"))
        .and_then(Value::as_str)
    {
        return Some(reason.to_string());
    }
    first_candidate(response)
        .and_then(|candidate| candidate.get("finishReason"))
        .and_then(Value::as_str)
        .filter(|reason| !matches!(*reason, "STOP" | "MAX_TOKENS"))
        .map(str::to_string)
}
