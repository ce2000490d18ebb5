use async_trait::async_trait;
use shortreel_core::chunker::chunk_script;
use shortreel_core::stage::Stage;
use shortreel_core::stage_data::{ReferenceData, ScriptData};

use super::{StageContext, StageHandler, StageOutput};
use crate::collaborators::ScriptRequest;
use crate::config::Credential;
use crate::error::{AtStage, PipelineError};

/// Writes the narration, splits it into timed chunks and derives metadata.
pub struct ScriptHandler;

#[async_trait]
impl StageHandler for ScriptHandler {
    fn stage(&self) -> Stage {
        Stage::Script
    }

    fn required_credentials(&self) -> &'static [Credential] {
        &[Credential::TextApiKey]
    }

    async fn execute(&self, ctx: &StageContext<'_>) -> Result<StageOutput, PipelineError> {
        let api_key = ctx.credential(Credential::TextApiKey)?;
        let reference = ctx
            .project
            .stage_data
            .get::<ReferenceData>()
            .at_stage(Stage::Script)?;

        let request = ScriptRequest {
            persona: ctx.profile.persona.clone(),
            theme: ctx.project.theme.clone(),
            reference_transcript: reference.map(|r| r.transcript),
        };
        let script = ctx
            .services
            .scripts
            .generate_script(&request, api_key)
            .await
            .at_stage(Stage::Script)?;

        let chunks = chunk_script(&script.narration, &ctx.config.chunking).at_stage(Stage::Script)?;
        if chunks.is_empty() {
            return Err(PipelineError::Validation {
                stage: Stage::Script,
                message: "generated narration is empty".to_string(),
            });
        }

        let metadata = ctx
            .services
            .scripts
            .generate_metadata(&script.narration, api_key)
            .await
            .at_stage(Stage::Script)?;
        let title = metadata.title.trim().to_string();

        tracing::debug!(
            project_id = %ctx.project.id,
            chunks = chunks.len(),
            prompts = script.visual_prompts.len(),
            "Script generated"
        );

        let output = StageOutput::advance(&ScriptData {
            narration: script.narration,
            chunks,
            visual_prompts: script.visual_prompts,
            metadata,
        })?;
        Ok(if title.is_empty() {
            output
        } else {
            output.with_title(title)
        })
    }
}
