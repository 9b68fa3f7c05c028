use fixit_contracts::{RepairAnalysis, RepairDraft};

use crate::analysis::analyze_image;
use crate::codec::ImagePayload;
use crate::error::EngineResult;
use crate::gateway::ModelGateway;
use crate::illustration::{generate_step_image, Illustration, IllustrationRequest};
use crate::manual::{find_manual, ManualLookup};
use crate::moderation::{moderate_image, ModerationVerdict};
use crate::pipeline::prepare_draft;
use crate::settings::Settings;
use crate::troubleshoot::{troubleshoot, Advice};

/// Entry point for hosts: owns the gateway and exposes each operation.
#[derive(Debug)]
pub struct RepairPlanner {
    gateway: ModelGateway,
}

impl RepairPlanner {
    pub fn new(settings: Settings) -> Self {
        Self::with_gateway(ModelGateway::new(settings))
    }

    pub fn with_gateway(gateway: ModelGateway) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &ModelGateway {
        &self.gateway
    }

    pub fn analyze(&self, image: &ImagePayload, user_text: &str) -> EngineResult<RepairAnalysis> {
        analyze_image(&self.gateway, image, user_text)
    }

    pub fn find_manual(&self, object_name: &str) -> ManualLookup {
        find_manual(&self.gateway, object_name)
    }

    pub fn illustrate(&self, request: &IllustrationRequest<'_>) -> Illustration {
        generate_step_image(&self.gateway, request)
    }

    pub fn troubleshoot(
        &self,
        image: &ImagePayload,
        object_name: &str,
        step_index: usize,
        step_text: &str,
    ) -> Advice {
        troubleshoot(&self.gateway, image, object_name, step_index, step_text)
    }

    pub fn moderate(&self, image: &ImagePayload) -> ModerationVerdict {
        moderate_image(&self.gateway, image)
    }

    pub fn prepare(&self, photo: &ImagePayload, user_text: &str) -> EngineResult<RepairDraft> {
        prepare_draft(&self.gateway, photo, user_text)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::testing::{gateway_with, text_response};

    #[test]
    fn operations_share_one_cached_vision_handle() -> anyhow::Result<()> {
        let (gateway, scripts) = gateway_with(
            vec![
                Ok(text_response("Check the washer.")),
                Ok(text_response(r#"{"safe": true}"#)),
            ],
            vec![],
            vec![],
        );
        let planner = RepairPlanner::with_gateway(gateway);
        let photo = ImagePayload::new(b"frame".to_vec(), "image/jpeg");

        let advice = planner.troubleshoot(&photo, "Faucet", 0, "Shut off the water");
        assert_eq!(advice.text, "Check the washer.");
        assert!(planner.moderate(&photo).result.safe);
        assert_eq!(scripts.connects.load(Ordering::SeqCst), 1);
        assert_eq!(planner.gateway().vision()?.model(), "gemini-2.5-flash");
        Ok(())
    }
}
