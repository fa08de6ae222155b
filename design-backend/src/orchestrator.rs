//! Three-stage pipeline: interpret the request, design the model, emit the
//! visualization code.

use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

use azure_ai::{ImageAnalyzer, TextGenerator};

use crate::designer::DesignerAgent;
use crate::interpreter::InterpreterAgent;
use crate::model::Model;
use crate::renderer::RendererAgent;

/// Complete result of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct DesignResponse {
    pub requirements: Value,
    pub model_data: Model,
    pub code: String,
    pub original_prompt: String,
    pub sketch_analysis_performed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u128>,
}

pub struct AgentOrchestrator<G, V> {
    interpreter: InterpreterAgent<G, V>,
    designer: DesignerAgent<G>,
    renderer: RendererAgent<G>,
}

impl<G, V> AgentOrchestrator<G, V>
where
    G: TextGenerator + Clone,
    V: ImageAnalyzer,
{
    pub fn new(chat: G, vision: V) -> Self {
        Self {
            interpreter: InterpreterAgent::new(chat.clone(), vision),
            designer: DesignerAgent::new(chat.clone()),
            renderer: RendererAgent::new(chat),
        }
    }

    /// Run the pipeline end to end. Any stage failure aborts the run; the
    /// error carries the failing stage's label.
    pub async fn process_design_request(
        &self,
        prompt: &str,
        sketch_data: Option<&str>,
    ) -> anyhow::Result<DesignResponse> {
        info!("Orchestrator starting design request");

        let interpretation = self.interpreter.execute(prompt, sketch_data).await?;
        let model = self.designer.design(&interpretation.requirements).await?;
        let code = self.renderer.emit(&model, prompt).await?;

        Ok(DesignResponse {
            requirements: interpretation.requirements,
            model_data: model,
            code,
            original_prompt: prompt.to_string(),
            sketch_analysis_performed: interpretation.sketch_analysis.is_some(),
            processing_time_ms: None,
        })
    }

    /// Same pipeline, with wall-clock timing attached to the response and
    /// failures logged with their elapsed time before being rethrown.
    pub async fn process_design_request_traced(
        &self,
        prompt: &str,
        sketch_data: Option<&str>,
    ) -> anyhow::Result<DesignResponse> {
        let started = Instant::now();

        match self.process_design_request(prompt, sketch_data).await {
            Ok(mut response) => {
                let elapsed = started.elapsed().as_millis();
                info!("Design request completed in {}ms", elapsed);
                response.processing_time_ms = Some(elapsed);
                Ok(response)
            }
            Err(e) => {
                error!(
                    "Design request failed after {}ms: {:#}",
                    started.elapsed().as_millis(),
                    e
                );
                Err(e)
            }
        }
    }
}
