use std::collections::HashSet;
use std::sync::LazyLock;

use fixit_contracts::{manual_search_cascade, ManualQueryKind, ManualSearchQuery};
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::gateway::{grounding_uris, response_text, text_part, user_content, ModelGateway};

static URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://[^\s)]+").unwrap());

/// Outcome of the manual cascade. `url` is `None` both when every query came
/// back empty and when a failure cut the cascade short; the latter also sets
/// `fallback_reason`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualLookup {
    pub url: Option<String>,
    pub source: Option<ManualQueryKind>,
    pub fallback_reason: Option<String>,
}

impl ManualLookup {
    fn found(url: String, source: ManualQueryKind) -> Self {
        Self {
            url: Some(url),
            source: Some(source),
            fallback_reason: None,
        }
    }

    fn not_found() -> Self {
        Self {
            url: None,
            source: None,
            fallback_reason: None,
        }
    }

    fn unavailable(reason: String) -> Self {
        Self {
            url: None,
            source: None,
            fallback_reason: Some(reason),
        }
    }
}

pub(crate) fn search_payload(query: &ManualSearchQuery) -> Value {
    json!({
        "contents": user_content(vec![text_part(&query.prompt_text)]),
        "tools": [{ "google_search": {} }],
    })
}

/// `http(s)://` tokens in free text; each match stops at whitespace or `)`.
pub fn extract_text_urls(text: &str) -> Vec<String> {
    URL_RE
        .find_iter(text)
        .map(|found| found.as_str().to_string())
        .collect()
}

/// Grounding URIs first, then text URLs, deduplicated by exact text while
/// keeping first-seen order.
pub fn merge_candidates(grounding: Vec<String>, text_urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for candidate in grounding.into_iter().chain(text_urls) {
        if seen.insert(candidate.clone()) {
            out.push(candidate);
        }
    }
    out
}

pub fn collect_candidates(response: &Value) -> Vec<String> {
    merge_candidates(
        grounding_uris(response),
        extract_text_urls(&response_text(response)),
    )
}

pub fn pick_candidate(candidates: &[String], prefer_pdf: bool) -> Option<String> {
    if prefer_pdf {
        return candidates
            .iter()
            .find(|candidate| candidate.to_ascii_lowercase().contains(".pdf"))
            .cloned();
    }
    candidates.first().cloned()
}

/// Runs the search cascade in order, stopping at the first query that yields
/// a pick. Best effort: failures end the cascade with no result.
pub fn find_manual(gateway: &ModelGateway, object_name: &str) -> ManualLookup {
    let capability = match gateway.search() {
        Ok(capability) => capability,
        Err(err) => {
            warn!(error = %err, "manual search unavailable");
            return ManualLookup::unavailable(err.to_string());
        }
    };

    for query in manual_search_cascade(object_name) {
        let response = match capability.generate(&search_payload(&query)) {
            Ok(response) => response,
            Err(err) => {
                warn!(query = query.kind.as_str(), error = %err, "manual search failed");
                return ManualLookup::unavailable(err.to_string());
            }
        };
        let candidates = collect_candidates(&response);
        match pick_candidate(&candidates, query.prefer_pdf) {
            Some(url) => {
                info!(query = query.kind.as_str(), url = %url, "manual found");
                return ManualLookup::found(url, query.kind);
            }
            None => debug!(
                query = query.kind.as_str(),
                candidates = candidates.len(),
                "no usable manual candidate"
            ),
        }
    }

    info!(object = object_name, "no manual found");
    ManualLookup::not_found()
}
