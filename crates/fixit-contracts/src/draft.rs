use serde::Serialize;

use crate::analysis::RepairAnalysis;

/// Repair document assembled from one analysis run, ready for an outer
/// persistence layer. Step illustrations live on `analysis.steps`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairDraft {
    pub repair_id: String,
    pub timestamp: i64,
    pub is_public: bool,
    pub is_successful: Option<bool>,
    pub user_photo_url: String,
    pub ideal_view_image_url: Option<String>,
    pub manual_url: Option<String>,
    #[serde(flatten)]
    pub analysis: RepairAnalysis,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}
