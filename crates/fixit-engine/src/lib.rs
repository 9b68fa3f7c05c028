//! Repair orchestration core: diagnoses a photographed object, finds its
//! manual, illustrates repair steps, and advises or moderates along the way.
//!
//! Every operation takes a [`ModelGateway`]. Only [`analyze_image`] (and the
//! draft pipeline built on it) returns errors; the auxiliary operations
//! degrade to documented defaults and say why in a `fallback_reason`.

pub mod analysis;
pub mod codec;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod illustration;
pub mod manual;
pub mod moderation;
pub mod pipeline;
pub mod settings;
pub mod troubleshoot;

#[cfg(test)]
mod testing;

pub use analysis::analyze_image;
pub use codec::ImagePayload;
pub use engine::RepairPlanner;
pub use error::{EngineError, EngineResult};
pub use gateway::{Capability, Connector, ContentTransport, ModelGateway, Tier};
pub use illustration::{generate_step_image, Illustration, IllustrationRequest};
pub use manual::{find_manual, ManualLookup};
pub use moderation::{moderate_image, ModerationVerdict};
pub use pipeline::prepare_draft;
pub use settings::Settings;
pub use troubleshoot::{troubleshoot, Advice};
