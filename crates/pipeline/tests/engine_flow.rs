mod common;

use assert_matches::assert_matches;
use shortreel_core::stage::{ProjectStatus, Stage};
use shortreel_core::stage_data::{RenderData, ScriptData};
use shortreel_db::ProjectStore;
use shortreel_events::event_types;
use shortreel_pipeline::collaborators::BlobStore;
use shortreel_pipeline::{Credential, Credentials, PipelineError, RunOutcome};

use common::{full_config, harness, new_project};

#[tokio::test]
async fn reference_review_gate_then_full_run() {
    let h = harness(full_config());
    let project = h.engine.create_project(new_project(Some("yt:abc"))).await.unwrap();
    let id = project.id;

    let outcomes = h.engine.run_until_blocked(id).await.unwrap();
    assert_eq!(outcomes, vec![RunOutcome::AwaitingReview { stage: Stage::Reference }]);

    // Waiting for review is not re-entered.
    assert_eq!(
        h.engine.run(id).await.unwrap(),
        RunOutcome::AwaitingReview { stage: Stage::Reference }
    );
    assert_eq!(h.fakes.count("transcript"), 1);

    let approved = h.engine.approve(id).await.unwrap();
    assert_eq!(approved.current_stage, Stage::Script);
    assert_eq!(approved.status, ProjectStatus::Ready);

    let outcomes = h.engine.run_until_blocked(id).await.unwrap();
    assert_eq!(
        outcomes,
        vec![
            RunOutcome::Advanced { from: Stage::Script, to: Stage::Audio },
            RunOutcome::Advanced { from: Stage::Audio, to: Stage::AudioCompress },
            RunOutcome::Advanced { from: Stage::AudioCompress, to: Stage::Subtitles },
            RunOutcome::Advanced { from: Stage::Subtitles, to: Stage::Images },
            RunOutcome::Advanced { from: Stage::Images, to: Stage::Render },
            RunOutcome::Advanced { from: Stage::Render, to: Stage::Done },
            RunOutcome::Completed,
        ]
    );

    let done = h.engine.get(id).await.unwrap();
    assert_eq!(done.current_stage, Stage::Done);
    assert_eq!(done.title, "Life of a star");
    assert!(done.lease.is_none());
    assert_eq!(done.stage_data.len(), 7);

    let render: RenderData = done.stage_data.require().unwrap();
    assert!((render.duration_secs - 3.0).abs() < 1e-6);
    assert_eq!(h.blobs.get(&render.key).await.unwrap(), b"video".to_vec());
}

#[tokio::test]
async fn reference_is_skipped_without_source() {
    let h = harness(full_config());
    let mut events = h.events.subscribe();
    let id = h.engine.create_project(new_project(None)).await.unwrap().id;

    assert_eq!(
        h.engine.run(id).await.unwrap(),
        RunOutcome::Skipped { from: Stage::Reference, to: Stage::Script }
    );
    let project = h.engine.get(id).await.unwrap();
    assert_eq!(project.current_stage, Stage::Script);
    assert!(project.stage_data.is_empty());
    assert!(h.fakes.calls().is_empty());

    let seen: Vec<String> = std::iter::from_fn(|| events.try_recv().ok())
        .map(|e| e.event_type)
        .collect();
    assert_eq!(
        seen,
        vec![
            event_types::PROJECT_CREATED,
            event_types::STAGE_STARTED,
            event_types::STAGE_SKIPPED,
        ]
    );
}

#[tokio::test]
async fn failed_stage_is_retried_from_persisted_data() {
    let h = harness(full_config());
    let id = h.engine.create_project(new_project(None)).await.unwrap().id;
    h.fakes.fail_speech(Some("voice service overloaded".to_string()));

    let outcomes = h.engine.run_until_blocked(id).await.unwrap();
    assert_matches!(
        outcomes.last(),
        Some(RunOutcome::Failed { stage: Stage::Audio, message })
            if message == "AUDIO failed: remote API error (503): voice service overloaded"
    );

    let failed = h.engine.get(id).await.unwrap();
    assert_eq!(failed.status, ProjectStatus::Error);
    assert_eq!(failed.current_stage, Stage::Audio);
    assert!(failed.lease.is_none());
    let script: ScriptData = failed.stage_data.require().unwrap();

    h.fakes.fail_speech(None);
    assert_eq!(
        h.engine.run(id).await.unwrap(),
        RunOutcome::Advanced { from: Stage::Audio, to: Stage::AudioCompress }
    );

    let recovered = h.engine.get(id).await.unwrap();
    assert_eq!(recovered.status, ProjectStatus::Ready);
    assert_eq!(recovered.error_message, None);
    assert_eq!(recovered.stage_data.require::<ScriptData>().unwrap(), script);
    assert_eq!(h.fakes.count("script"), 1);
    assert_eq!(h.fakes.count("speech"), 2);
}

#[tokio::test]
async fn long_failure_messages_are_truncated() {
    let h = harness(full_config());
    let id = h.engine.create_project(new_project(None)).await.unwrap().id;
    h.fakes.fail_speech(Some("x".repeat(2_000)));

    h.engine.run_until_blocked(id).await.unwrap();

    let message = h.engine.get(id).await.unwrap().error_message.unwrap();
    assert_eq!(message.chars().count(), 500);
    assert!(message.starts_with("AUDIO failed: "));
    assert!(message.ends_with('…'));
}

#[tokio::test]
async fn missing_credential_fails_before_any_call() {
    let mut config = full_config();
    config.credentials = Credentials::new().with(Credential::TextApiKey, "text");
    let h = harness(config);
    let id = h.engine.create_project(new_project(None)).await.unwrap().id;

    let outcomes = h.engine.run_until_blocked(id).await.unwrap();
    assert_matches!(
        outcomes.last(),
        Some(RunOutcome::Failed { stage: Stage::Audio, message })
            if message == "AUDIO failed: missing configuration: SPEECH_API_KEY"
    );
    assert_eq!(h.fakes.count("speech"), 0);

    let project = h.engine.get(id).await.unwrap();
    assert_eq!(project.status, ProjectStatus::Error);
    assert!(!project.stage_data.contains(Stage::Audio));
}

#[tokio::test]
async fn unknown_channel_is_a_configuration_failure() {
    let h = harness(full_config());
    let mut input = new_project(Some("yt:abc"));
    input.channel_id = "cooking".to_string();
    let id = h.engine.create_project(input).await.unwrap().id;

    assert_matches!(
        h.engine.run(id).await.unwrap(),
        RunOutcome::Failed { stage: Stage::Reference, message }
            if message.contains("channel profile 'cooking'")
    );
    assert!(h.fakes.calls().is_empty());
}

#[tokio::test]
async fn concurrent_run_is_rejected_while_leased() {
    let h = harness(full_config());
    let id = h.engine.create_project(new_project(None)).await.unwrap().id;
    h.engine.run(id).await.unwrap();
    h.engine.run(id).await.unwrap();
    assert_eq!(h.engine.get(id).await.unwrap().current_stage, Stage::Audio);

    h.fakes.gate_speech();
    let engine = h.engine.clone();
    let first = tokio::spawn(async move { engine.run(id).await });
    h.fakes.speech_started.notified().await;

    let leased = h.store.get(id).await.unwrap().unwrap();
    assert_eq!(leased.status, ProjectStatus::Processing);
    assert_matches!(h.engine.run(id).await, Err(PipelineError::Busy(busy)) if busy == id);

    h.fakes.speech_release.notify_one();
    assert_eq!(
        first.await.unwrap().unwrap(),
        RunOutcome::Advanced { from: Stage::Audio, to: Stage::AudioCompress }
    );
    assert_eq!(h.fakes.count("speech"), 1);
}

#[tokio::test]
async fn done_and_review_guards() {
    let h = harness(full_config());
    let id = h.engine.create_project(new_project(None)).await.unwrap().id;

    assert_matches!(h.engine.approve(id).await, Err(PipelineError::Conflict(_)));

    h.engine.run_until_blocked(id).await.unwrap();
    let before = h.engine.get(id).await.unwrap();
    assert_eq!(h.engine.run(id).await.unwrap(), RunOutcome::Completed);
    assert_eq!(h.engine.get(id).await.unwrap(), before);
}

#[tokio::test]
async fn create_rejects_blank_input_and_unknown_ids() {
    let h = harness(full_config());
    let mut input = new_project(None);
    input.theme = "  ".to_string();
    assert_matches!(
        h.engine.create_project(input).await,
        Err(PipelineError::InvalidInput(_))
    );

    let missing = uuid::Uuid::now_v7();
    assert_matches!(h.engine.run(missing).await, Err(PipelineError::NotFound(_)));
    assert_matches!(h.engine.delete(missing).await, Err(PipelineError::NotFound(_)));
}

#[tokio::test]
async fn delete_removes_project_and_blobs() {
    let h = harness(full_config());
    let id = h.engine.create_project(new_project(None)).await.unwrap().id;
    let other = h.engine.create_project(new_project(None)).await.unwrap().id;
    for project in [id, other] {
        for _ in 0..3 {
            h.engine.run(project).await.unwrap();
        }
    }
    let audio_key = format!("{id}/audio.wav");
    assert!(h.blobs.get(&audio_key).await.is_ok());

    h.engine.delete(id).await.unwrap();

    assert_matches!(h.engine.get(id).await, Err(PipelineError::NotFound(_)));
    assert!(h.blobs.get(&audio_key).await.is_err());
    assert!(h.blobs.get(&format!("{other}/audio.wav")).await.is_ok());
    assert_eq!(h.engine.list().await.unwrap().len(), 1);
}
