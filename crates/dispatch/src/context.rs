use agora_bus::Coordinator;
use serde::Serialize;
use std::sync::Arc;

use crate::enrich::EnrichmentPipeline;
use crate::evaluator::DispatchContext;

/// Structured context handed to the downstream text generator. Absent
/// blocks are omitted rather than rendered empty.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversationContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordination: Option<String>,
}

impl ConversationContext {
    pub fn is_empty(&self) -> bool {
        self.enrichment.is_none() && self.coordination.is_none()
    }

    /// Deterministic flattening: enrichment first, coordination digest last.
    pub fn render(&self) -> String {
        let mut blocks: Vec<&str> = Vec::new();
        if let Some(enrichment) = &self.enrichment {
            blocks.push(enrichment);
        }
        if let Some(coordination) = &self.coordination {
            blocks.push(coordination);
        }
        blocks.join("\n\n")
    }
}

/// Builds the merged context object for one turn. Never fails: a failed
/// sub-step just omits its block.
pub struct ContextAssembler {
    pipeline: EnrichmentPipeline,
    coordinator: Arc<Coordinator>,
}

impl ContextAssembler {
    pub fn new(pipeline: EnrichmentPipeline, coordinator: Arc<Coordinator>) -> Self {
        Self {
            pipeline,
            coordinator,
        }
    }

    pub async fn build(&self, ctx: &DispatchContext) -> ConversationContext {
        let enrichment = self.pipeline.enrich(ctx).await;
        let coordination = self.coordinator.build_coordination_context(&ctx.persona);
        ConversationContext {
            enrichment: (!enrichment.is_empty()).then_some(enrichment),
            coordination: (!coordination.is_empty()).then_some(coordination),
        }
    }
}
