//! Lifecycle of the intermediate occlusion render targets.
//!
//! Targets are allocated lazily on first access and dropped together whenever
//! the source linear-depth buffer changes identity or size. They are never
//! resized in place.

use glam::UVec2;

/// Identity of the source linear-depth texture, assigned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SourceDepthId(pub u64);

/// Pixel format family of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetFormat {
    /// Single 8-bit channel, used for occlusion values.
    Occlusion,
    /// Packed three-channel normal.
    PackedNormal,
}

/// Sampling filter of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetFilter {
    Linear,
    Nearest,
}

/// Description of a render target to allocate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetDesc {
    pub label: &'static str,
    pub size: UVec2,
    pub format: TargetFormat,
    pub filter: TargetFilter,
}

/// Creates render targets for the manager.
pub trait TargetAllocator {
    type Target;

    fn create_target(&self, desc: &TargetDesc) -> Self::Target;
}

/// The targets one frame of the effect renders into.
pub struct FrameTargets<'a, T> {
    pub occlusion: Option<&'a T>,
    pub occlusion_blurred: Option<&'a T>,
    pub normal: Option<&'a T>,
}

struct Allocated<T> {
    desc: TargetDesc,
    target: T,
}

struct OcclusionPair<T> {
    occlusion: Allocated<T>,
    blurred: Allocated<T>,
}

fn create_occlusion_pair<A: TargetAllocator>(
    allocator: &A,
    size: UVec2,
) -> OcclusionPair<A::Target> {
    let occlusion = TargetDesc {
        label: "SSAO Occlusion Target",
        size: size.max(UVec2::ONE),
        format: TargetFormat::Occlusion,
        filter: TargetFilter::Linear,
    };
    let blurred = TargetDesc {
        label: "SSAO Occlusion Blurred Target",
        ..occlusion
    };
    OcclusionPair {
        occlusion: Allocated {
            desc: occlusion,
            target: allocator.create_target(&occlusion),
        },
        blurred: Allocated {
            desc: blurred,
            target: allocator.create_target(&blurred),
        },
    }
}

fn create_normals<A: TargetAllocator>(
    allocator: &A,
    size: UVec2,
    level: u32,
) -> Allocated<A::Target> {
    let desc = TargetDesc {
        label: "SSAO Normal Target",
        size: (size >> level).max(UVec2::ONE),
        format: TargetFormat::PackedNormal,
        filter: TargetFilter::Nearest,
    };
    log::debug!(
        "allocating SSAO normals at level {level}: {}x{}",
        desc.size.x,
        desc.size.y
    );
    Allocated {
        desc,
        target: allocator.create_target(&desc),
    }
}

/// Owns the occlusion, blurred-occlusion and normal targets.
pub struct RenderTargetManager<T> {
    source_depth: Option<SourceDepthId>,
    frame_size: UVec2,
    occlusion: Option<OcclusionPair<T>>,
    normal: Option<Allocated<T>>,
    normal_level: Option<u32>,
    allocation_count: u32,
}

impl<T> Default for RenderTargetManager<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RenderTargetManager<T> {
    /// Creates an empty manager. Nothing is allocated until first access.
    pub fn new() -> Self {
        Self {
            source_depth: None,
            frame_size: UVec2::ZERO,
            occlusion: None,
            normal: None,
            normal_level: None,
            allocation_count: 0,
        }
    }

    /// Tracks the source linear-depth texture.
    ///
    /// Returns `true` and drops every owned target when the identity or the
    /// size differs from the last call.
    pub fn update_linear_depth(&mut self, source: SourceDepthId, size: UVec2) -> bool {
        let mut reset = false;
        if self.source_depth != Some(source) {
            self.source_depth = Some(source);
            reset = true;
        }
        if self.frame_size != size {
            self.frame_size = size;
            reset = true;
        }
        if reset {
            log::debug!(
                "linear depth {:?} at {}x{}: releasing occlusion targets",
                source,
                size.x,
                size.y
            );
            self.clear();
        }
        reset
    }

    /// Drops every owned target.
    pub fn clear(&mut self) {
        self.occlusion = None;
        self.normal = None;
        self.normal_level = None;
    }

    /// Allocates the occlusion and blurred-occlusion targets at the full frame size.
    pub fn allocate<A: TargetAllocator<Target = T>>(&mut self, allocator: &A) {
        self.occlusion = Some(create_occlusion_pair(allocator, self.frame_size));
        self.allocation_count += 2;
    }

    /// Allocates the normal target at `frame_size >> level`.
    pub fn allocate_normals<A: TargetAllocator<Target = T>>(&mut self, allocator: &A, level: u32) {
        let level = level.min(31);
        self.normal = Some(create_normals(allocator, self.frame_size, level));
        self.normal_level = Some(level);
        self.allocation_count += 1;
    }

    fn occlusion_pair<A: TargetAllocator<Target = T>>(
        &mut self,
        allocator: &A,
    ) -> &OcclusionPair<T> {
        let size = self.frame_size;
        let count = &mut self.allocation_count;
        self.occlusion.get_or_insert_with(|| {
            *count += 2;
            create_occlusion_pair(allocator, size)
        })
    }

    fn normal_target<A: TargetAllocator<Target = T>>(
        &mut self,
        allocator: &A,
        level: u32,
    ) -> &Allocated<T> {
        let level = level.min(31);
        if self.normal_level != Some(level) {
            self.normal = None;
        }
        let size = self.frame_size;
        let count = &mut self.allocation_count;
        let normal_level = &mut self.normal_level;
        self.normal.get_or_insert_with(|| {
            *count += 1;
            *normal_level = Some(level);
            create_normals(allocator, size, level)
        })
    }

    /// The occlusion target, allocated on first use.
    pub fn occlusion<A: TargetAllocator<Target = T>>(&mut self, allocator: &A) -> &T {
        &self.occlusion_pair(allocator).occlusion.target
    }

    /// The blurred-occlusion target, allocated on first use.
    pub fn occlusion_blurred<A: TargetAllocator<Target = T>>(&mut self, allocator: &A) -> &T {
        &self.occlusion_pair(allocator).blurred.target
    }

    /// The normal target at the given resolution level, reallocated when the level changes.
    pub fn normal<A: TargetAllocator<Target = T>>(&mut self, allocator: &A, level: u32) -> &T {
        &self.normal_target(allocator, level).target
    }

    /// Ensures every target a frame needs exists and returns them together.
    pub fn frame_targets<A: TargetAllocator<Target = T>>(
        &mut self,
        allocator: &A,
        normal_level: Option<u32>,
    ) -> FrameTargets<'_, T> {
        if let Some(level) = normal_level {
            self.normal_target(allocator, level);
        }
        self.occlusion_pair(allocator);
        let pair = self.occlusion.as_ref();
        FrameTargets {
            occlusion: pair.map(|p| &p.occlusion.target),
            occlusion_blurred: pair.map(|p| &p.blurred.target),
            normal: normal_level.and(self.normal.as_ref()).map(|n| &n.target),
        }
    }

    /// The occlusion target if it is currently allocated.
    pub fn get_occlusion(&self) -> Option<&T> {
        self.occlusion.as_ref().map(|p| &p.occlusion.target)
    }

    /// The blurred-occlusion target if it is currently allocated.
    pub fn get_occlusion_blurred(&self) -> Option<&T> {
        self.occlusion.as_ref().map(|p| &p.blurred.target)
    }

    /// The normal target if it is currently allocated.
    pub fn get_normal(&self) -> Option<&T> {
        self.normal.as_ref().map(|a| &a.target)
    }

    /// Description of the current normal target.
    pub fn normal_desc(&self) -> Option<&TargetDesc> {
        self.normal.as_ref().map(|a| &a.desc)
    }

    /// Description of the current occlusion target.
    pub fn occlusion_desc(&self) -> Option<&TargetDesc> {
        self.occlusion.as_ref().map(|p| &p.occlusion.desc)
    }

    pub fn source_depth(&self) -> Option<SourceDepthId> {
        self.source_depth
    }

    /// Size of the source depth buffer.
    pub fn source_frame_size(&self) -> UVec2 {
        self.frame_size
    }

    /// Resolution level the normal target was last built for.
    pub fn normal_level(&self) -> Option<u32> {
        self.normal_level
    }

    /// Number of targets created so far.
    pub fn allocation_count(&self) -> u32 {
        self.allocation_count
    }
}
