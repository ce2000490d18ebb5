//! Channel profiles loaded from a JSON file.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use shortreel_core::profile::ChannelProfile;

use crate::collaborators::ProfileProvider;
use crate::error::CollaboratorError;

/// Serves profiles from a JSON array read once at startup.
#[derive(Debug, Default)]
pub struct JsonFileProfileProvider {
    profiles: HashMap<String, ChannelProfile>,
}

impl JsonFileProfileProvider {
    /// Load profiles from `path`. A missing file yields an empty provider.
    pub async fn load(path: &Path) -> Result<Self, CollaboratorError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Profiles file not found, no channels configured");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        let profiles: Vec<ChannelProfile> = serde_json::from_slice(&bytes).map_err(|e| {
            CollaboratorError::InvalidResponse(format!("{}: {e}", path.display()))
        })?;
        tracing::info!(path = %path.display(), count = profiles.len(), "Channel profiles loaded");
        Ok(Self::from_profiles(profiles))
    }

    pub fn from_profiles(profiles: impl IntoIterator<Item = ChannelProfile>) -> Self {
        Self {
            profiles: profiles
                .into_iter()
                .map(|p| (p.channel_id.clone(), p))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[async_trait]
impl ProfileProvider for JsonFileProfileProvider {
    async fn profile(&self, channel_id: &str) -> Result<Option<ChannelProfile>, CollaboratorError> {
        Ok(self.profiles.get(channel_id).cloned())
    }
}
