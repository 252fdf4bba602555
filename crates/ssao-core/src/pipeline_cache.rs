//! Process-wide, build-once cache of the effect's pipelines.

use std::sync::OnceLock;

/// One of the render passes the effect records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    Occlusion,
    HorizontalBlur,
    VerticalBlur,
    MipGeneration,
    Gather,
    BuildNormals,
    DebugOverlay,
}

/// Fixed-function state a pass pipeline is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineState {
    /// Only the RGB channels are written.
    pub write_rgb_only: bool,
    /// Source-alpha blending over the destination.
    pub alpha_blend: bool,
}

impl PassKind {
    pub const COUNT: usize = 7;

    pub const ALL: [PassKind; Self::COUNT] = [
        PassKind::Occlusion,
        PassKind::HorizontalBlur,
        PassKind::VerticalBlur,
        PassKind::MipGeneration,
        PassKind::Gather,
        PassKind::BuildNormals,
        PassKind::DebugOverlay,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn label(self) -> &'static str {
        match self {
            PassKind::Occlusion => "SSAO Make Occlusion",
            PassKind::HorizontalBlur => "SSAO Horizontal Blur",
            PassKind::VerticalBlur => "SSAO Vertical Blur",
            PassKind::MipGeneration => "SSAO Depth Mips",
            PassKind::Gather => "SSAO Gather",
            PassKind::BuildNormals => "SSAO Build Normals",
            PassKind::DebugOverlay => "SSAO Debug Overlay",
        }
    }

    pub const fn pipeline_state(self) -> PipelineState {
        PipelineState {
            write_rgb_only: true,
            alpha_blend: matches!(self, PassKind::DebugOverlay),
        }
    }
}

/// Lazily built pipelines keyed by [`PassKind`].
///
/// Each slot is built at most once, even under concurrent first use; later
/// calls return the same instance.
pub struct PipelineCache<P> {
    slots: [OnceLock<P>; PassKind::COUNT],
}

impl<P> Default for PipelineCache<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> PipelineCache<P> {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| OnceLock::new()),
        }
    }

    /// Returns the pipeline for `kind`, building it with `build` on first use.
    pub fn get_or_create(&self, kind: PassKind, build: impl FnOnce(PassKind) -> P) -> &P {
        self.slots[kind.index()].get_or_init(|| {
            log::debug!("building pipeline '{}'", kind.label());
            build(kind)
        })
    }

    /// Returns the pipeline for `kind` if it has been built.
    pub fn get(&self, kind: PassKind) -> Option<&P> {
        self.slots[kind.index()].get()
    }

    pub fn built_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.get().is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_builds_once() {
        let cache = PipelineCache::new();
        let mut calls = 0;
        let first = *cache.get_or_create(PassKind::Occlusion, |_| {
            calls += 1;
            11
        });
        let second = *cache.get_or_create(PassKind::Occlusion, |_| 22);
        assert_eq!(first, 11);
        assert_eq!(second, 11);
        assert_eq!(calls, 1);
        assert_eq!(cache.built_count(), 1);
        assert!(cache.get(PassKind::Gather).is_none());
    }

    #[test]
    fn test_concurrent_first_use() {
        let cache = Arc::new(PipelineCache::<usize>::new());
        let builds = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let builds = Arc::clone(&builds);
                std::thread::spawn(move || {
                    *cache.get_or_create(PassKind::VerticalBlur, |_| {
                        builds.fetch_add(1, Ordering::SeqCst);
                        42
                    })
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 42);
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_pipeline_state() {
        for kind in PassKind::ALL {
            let state = kind.pipeline_state();
            assert!(state.write_rgb_only);
            assert_eq!(state.alpha_blend, kind == PassKind::DebugOverlay);
        }
        assert_eq!(PassKind::ALL[PassKind::Gather.index()], PassKind::Gather);
    }
}
