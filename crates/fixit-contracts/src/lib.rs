pub mod analysis;
pub mod catalog;
pub mod draft;
pub mod manual;
pub mod models;

pub use analysis::{ModerationResult, RepairAnalysis, RepairCategory, RepairStatus, RepairStep};
pub use draft::RepairDraft;
pub use manual::{manual_search_cascade, ManualQueryKind, ManualSearchQuery};
