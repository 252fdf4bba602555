//! Configuration shared between a control thread and the frame thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::AmbientOcclusionConfig;

struct Shared {
    config: RwLock<AmbientOcclusionConfig>,
    generation: AtomicU64,
}

/// Cloneable handle to an [`AmbientOcclusionConfig`].
///
/// Edits are applied under the write lock and bump a generation counter. The
/// frame thread picks up a consistent snapshot at the frame boundary with
/// [`snapshot_if_changed`](Self::snapshot_if_changed).
#[derive(Clone)]
pub struct ConfigHandle {
    shared: Arc<Shared>,
}

impl Default for ConfigHandle {
    fn default() -> Self {
        Self::new(AmbientOcclusionConfig::default())
    }
}

impl std::fmt::Debug for ConfigHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigHandle")
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}

impl ConfigHandle {
    pub fn new(config: AmbientOcclusionConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config: RwLock::new(config),
                generation: AtomicU64::new(1),
            }),
        }
    }

    /// Edits the configuration in place.
    pub fn update<R>(&self, f: impl FnOnce(&mut AmbientOcclusionConfig) -> R) -> R {
        let mut guard = self
            .shared
            .config
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let result = f(&mut guard);
        self.shared.generation.fetch_add(1, Ordering::AcqRel);
        result
    }

    /// Replaces the configuration.
    pub fn set(&self, config: AmbientOcclusionConfig) {
        self.update(|current| *current = config);
    }

    /// A copy of the current configuration.
    pub fn snapshot(&self) -> AmbientOcclusionConfig {
        self.shared
            .config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::Acquire)
    }

    /// Returns a snapshot if the configuration changed since `last_generation`,
    /// and advances `last_generation`.
    pub fn snapshot_if_changed(&self, last_generation: &mut u64) -> Option<AmbientOcclusionConfig> {
        let guard = self
            .shared
            .config
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let generation = self.generation();
        if generation == *last_generation {
            return None;
        }
        *last_generation = generation;
        Some(guard.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_if_changed() {
        let handle = ConfigHandle::default();
        let mut seen = 0;
        assert!(handle.snapshot_if_changed(&mut seen).is_some());
        assert!(handle.snapshot_if_changed(&mut seen).is_none());

        handle.update(|c| c.num_samples = 11);
        let snapshot = handle.snapshot_if_changed(&mut seen).unwrap();
        assert_eq!(snapshot.num_samples, 11);
        assert!(handle.snapshot_if_changed(&mut seen).is_none());
    }

    #[test]
    fn test_edits_from_another_thread() {
        let handle = ConfigHandle::default();
        let remote = handle.clone();
        std::thread::spawn(move || {
            remote.update(|c| {
                c.radius = 0.75;
                c.blur_radius = 6;
            });
        })
        .join()
        .unwrap();
        let config = handle.snapshot();
        assert_eq!(config.radius, 0.75);
        assert_eq!(config.blur_radius, 6);
        assert_eq!(handle.generation(), 2);
    }
}
