//! Writes every bus event to the tracing log.

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::bus::PipelineEvent;

/// Background service logging pipeline events.
pub struct EventLogger;

impl EventLogger {
    /// Run until `cancel` fires or the bus is dropped. Returns the number of
    /// events logged.
    pub async fn run(
        mut receiver: broadcast::Receiver<PipelineEvent>,
        cancel: CancellationToken,
    ) -> u64 {
        let mut logged = 0;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Event logger shutting down");
                    break;
                }
                received = receiver.recv() => match received {
                    Ok(event) => {
                        Self::log(&event);
                        logged += 1;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Event logger lagged, some events were not logged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Event bus closed, event logger shutting down");
                        break;
                    }
                }
            }
        }
        logged
    }

    fn log(event: &PipelineEvent) {
        let project_id = event.project_id.map(|id| id.to_string()).unwrap_or_default();
        let stage = event.stage.map(|s| s.name()).unwrap_or_default();
        if event.event_type == crate::bus::event_types::STAGE_FAILED {
            tracing::warn!(
                event_type = %event.event_type,
                project_id = %project_id,
                stage,
                payload = %event.payload,
                "Pipeline event"
            );
        } else {
            tracing::info!(
                event_type = %event.event_type,
                project_id = %project_id,
                stage,
                payload = %event.payload,
                "Pipeline event"
            );
        }
    }
}
