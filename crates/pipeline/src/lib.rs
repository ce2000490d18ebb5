//! Stage handlers, collaborator contracts and the engine that drives a
//! project through the fixed stage order.

pub mod blob;
pub mod collaborators;
pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod media;
pub mod profiles;
pub mod transcript;

pub use collaborators::Collaborators;
pub use config::{Credential, Credentials, EngineConfig, PollingConfig};
pub use engine::{PipelineEngine, RunOutcome};
pub use error::{CollaboratorError, PipelineError};
pub use handlers::{HandlerRegistry, StageContext, StageHandler, StageOutput};
