use async_trait::async_trait;
use shortreel_core::stage::Stage;
use shortreel_core::stage_data::ReferenceData;
use shortreel_db::Project;

use super::{StageContext, StageHandler, StageOutput};
use crate::config::Credential;
use crate::error::{AtStage, PipelineError};

/// Extracts a transcript of the reference material and holds it for review.
pub struct ReferenceHandler;

#[async_trait]
impl StageHandler for ReferenceHandler {
    fn stage(&self) -> Stage {
        Stage::Reference
    }

    fn required_credentials(&self) -> &'static [Credential] {
        &[Credential::TranscriptToken]
    }

    fn is_applicable(&self, project: &Project) -> bool {
        project.reference_source.is_some()
    }

    async fn execute(&self, ctx: &StageContext<'_>) -> Result<StageOutput, PipelineError> {
        let Some(source) = ctx.project.reference_source.as_deref() else {
            return Err(PipelineError::Validation {
                stage: Stage::Reference,
                message: "no reference source".to_string(),
            });
        };
        let token = ctx.credential(Credential::TranscriptToken)?;

        let transcript = ctx
            .services
            .transcripts
            .extract(source, token)
            .await
            .at_stage(Stage::Reference)?;
        if transcript.text.trim().is_empty() {
            return Err(PipelineError::Validation {
                stage: Stage::Reference,
                message: format!("transcript for '{source}' is empty"),
            });
        }

        StageOutput::review(&ReferenceData {
            source: source.to_string(),
            transcript: transcript.text,
            provenance: transcript.provenance,
        })
    }
}
