//! Connection profile repository.
//!
//! Repositories hand out snapshots and announce changes through a
//! `watch` channel carrying a revision counter.

use crate::error::SessionError;
use crate::models::{ConnectionProfile, ProfileId};

use parking_lot::RwLock;
use tokio::sync::watch;

/// CRUD access to saved connection profiles.
pub trait ProfileRepository: Send + Sync {
    /// All profiles ordered by name.
    fn list(&self) -> Result<Vec<ConnectionProfile>, SessionError>;

    /// Look up a single profile.
    fn get(&self, id: ProfileId) -> Result<Option<ConnectionProfile>, SessionError> {
        Ok(self.list()?.into_iter().find(|p| p.id == id))
    }

    /// Add a new profile. Fails if the id already exists.
    fn insert(&self, profile: &ConnectionProfile) -> Result<(), SessionError>;

    /// Replace an existing profile. Fails if the id is unknown.
    fn update(&self, profile: &ConnectionProfile) -> Result<(), SessionError>;

    /// Remove a profile. Removing an unknown id succeeds.
    fn delete(&self, id: ProfileId) -> Result<(), SessionError>;

    /// Receiver that changes whenever the stored profiles change.
    fn subscribe(&self) -> watch::Receiver<u64>;
}

/// Sort profiles by name, case-insensitively, then by id for stability.
pub(crate) fn sort_by_name(profiles: &mut [ConnectionProfile]) {
    profiles.sort_by(|a, b| {
        a.name.to_lowercase().cmp(&b.name.to_lowercase()).then_with(|| a.id.cmp(&b.id))
    });
}

/// In-memory profile repository.
#[derive(Debug)]
pub struct MemoryProfileRepository {
    profiles: RwLock<Vec<ConnectionProfile>>,
    revision: watch::Sender<u64>,
}

impl Default for MemoryProfileRepository {
    fn default() -> Self {
        Self { profiles: RwLock::new(Vec::new()), revision: watch::Sender::new(0) }
    }
}

impl MemoryProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a repository pre-filled with profiles.
    pub fn with_profiles(profiles: Vec<ConnectionProfile>) -> Self {
        let repo = Self::default();
        *repo.profiles.write() = profiles;
        repo
    }

    fn notify(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }
}

impl ProfileRepository for MemoryProfileRepository {
    fn list(&self) -> Result<Vec<ConnectionProfile>, SessionError> {
        let mut profiles = self.profiles.read().clone();
        sort_by_name(&mut profiles);
        Ok(profiles)
    }

    fn insert(&self, profile: &ConnectionProfile) -> Result<(), SessionError> {
        {
            let mut profiles = self.profiles.write();
            if profiles.iter().any(|p| p.id == profile.id) {
                return Err(SessionError::storage(
                    format!("Connection {} already exists", profile.id),
                    None,
                ));
            }
            profiles.push(profile.clone());
        }
        self.notify();
        Ok(())
    }

    fn update(&self, profile: &ConnectionProfile) -> Result<(), SessionError> {
        {
            let mut profiles = self.profiles.write();
            let slot = profiles.iter_mut().find(|p| p.id == profile.id).ok_or_else(|| {
                SessionError::storage(format!("Connection {} not found", profile.id), None)
            })?;
            *slot = profile.clone();
        }
        self.notify();
        Ok(())
    }

    fn delete(&self, id: ProfileId) -> Result<(), SessionError> {
        let removed = {
            let mut profiles = self.profiles.write();
            let before = profiles.len();
            profiles.retain(|p| p.id != id);
            profiles.len() != before
        };
        if removed {
            self.notify();
        }
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}
