//! Render pipelines of the occlusion passes.
//!
//! Pipelines are built on first use and cached per [`ShaderVariant`]. One
//! [`SsaoPipelines`] is meant to be shared as `Arc<SsaoPipelines>` between
//! every effect and overlay rendering on the same device.

use ssao_core::{EstimatorMode, PassKind, PipelineCache, PipelineState, SplitMode};

use crate::error::RenderResult;
use crate::shader::{ShaderBuilder, OBSCURANCE_WGSL};

/// Format of the occlusion and blurred-occlusion targets.
pub const OCCLUSION_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;

/// Format of the linear depth inputs and their mip chains.
pub const LINEAR_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;

/// Compile-time variant of the pass shaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderVariant {
    pub estimator: EstimatorMode,
    pub split: SplitMode,
}

impl ShaderVariant {
    const COUNT: usize = 4;

    const ALL: [ShaderVariant; Self::COUNT] = [
        ShaderVariant {
            estimator: EstimatorMode::HorizonBased,
            split: SplitMode::Single,
        },
        ShaderVariant {
            estimator: EstimatorMode::HorizonBased,
            split: SplitMode::Quad,
        },
        ShaderVariant {
            estimator: EstimatorMode::DistanceBased,
            split: SplitMode::Single,
        },
        ShaderVariant {
            estimator: EstimatorMode::DistanceBased,
            split: SplitMode::Quad,
        },
    ];

    fn index(self) -> usize {
        let estimator = match self.estimator {
            EstimatorMode::HorizonBased => 0,
            EstimatorMode::DistanceBased => 1,
        };
        let split = match self.split {
            SplitMode::Single => 0,
            SplitMode::Quad => 1,
        };
        estimator * 2 + split
    }
}

/// A render pipeline with the layout of its single bind group.
pub struct GpuPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

/// The pass pipelines for one device.
pub struct SsaoPipelines {
    caches: [PipelineCache<GpuPipeline>; ShaderVariant::COUNT],
    sources: Vec<String>,
    normal_format: wgpu::TextureFormat,
    overlay_format: wgpu::TextureFormat,
}

impl SsaoPipelines {
    /// Assembles every shader variant and creates an empty pipeline cache.
    /// `overlay_format` is the format of the color target the debug overlay
    /// draws into.
    pub fn new(device: &wgpu::Device, overlay_format: wgpu::TextureFormat) -> RenderResult<Self> {
        let normal_format = if device
            .features()
            .contains(wgpu::Features::RG11B10UFLOAT_RENDERABLE)
        {
            wgpu::TextureFormat::Rg11b10Ufloat
        } else {
            wgpu::TextureFormat::Rgb10a2Unorm
        };
        log::debug!("SSAO normal buffer format: {normal_format:?}");

        let mut sources = Vec::with_capacity(ShaderVariant::COUNT * PassKind::COUNT);
        for variant in ShaderVariant::ALL {
            for kind in PassKind::ALL {
                sources.push(shader_builder(kind, variant).combined_source()?);
            }
        }

        Ok(Self {
            caches: std::array::from_fn(|_| PipelineCache::new()),
            sources,
            normal_format,
            overlay_format,
        })
    }

    /// Format of the packed normal buffer on this device.
    pub fn normal_format(&self) -> wgpu::TextureFormat {
        self.normal_format
    }

    pub fn overlay_format(&self) -> wgpu::TextureFormat {
        self.overlay_format
    }

    /// Returns the pipeline of a pass, building it on first use.
    pub fn get(
        &self,
        device: &wgpu::Device,
        kind: PassKind,
        variant: ShaderVariant,
    ) -> &GpuPipeline {
        self.caches[variant.index()].get_or_create(kind, |kind| self.create(device, kind, variant))
    }

    /// Number of pipelines built so far across all variants.
    pub fn built_count(&self) -> usize {
        self.caches.iter().map(PipelineCache::built_count).sum()
    }

    fn target_format(&self, kind: PassKind) -> wgpu::TextureFormat {
        match kind {
            PassKind::Occlusion
            | PassKind::Gather
            | PassKind::HorizontalBlur
            | PassKind::VerticalBlur => OCCLUSION_FORMAT,
            PassKind::MipGeneration => LINEAR_DEPTH_FORMAT,
            PassKind::BuildNormals => self.normal_format,
            PassKind::DebugOverlay => self.overlay_format,
        }
    }

    fn create(&self, device: &wgpu::Device, kind: PassKind, variant: ShaderVariant) -> GpuPipeline {
        let source = &self.sources[variant.index() * PassKind::COUNT + kind.index()];
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(kind.label()),
            source: wgpu::ShaderSource::Wgsl(source.as_str().into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(kind.label()),
            entries: &layout_entries(kind),
        });

        let pipeline = create_fullscreen_pipeline(
            device,
            kind.label(),
            &module,
            &bind_group_layout,
            self.target_format(kind),
            kind.pipeline_state(),
        );

        GpuPipeline {
            pipeline,
            bind_group_layout,
        }
    }
}

/// Shader of a pass with the variant constants declared.
pub fn shader_builder(kind: PassKind, variant: ShaderVariant) -> ShaderBuilder {
    let body = match kind {
        PassKind::Occlusion => include_str!("shaders/make_occlusion.wgsl"),
        PassKind::HorizontalBlur | PassKind::VerticalBlur => {
            include_str!("shaders/bilateral_blur.wgsl")
        }
        PassKind::MipGeneration => include_str!("shaders/mip_depth.wgsl"),
        PassKind::Gather => include_str!("shaders/gather.wgsl"),
        PassKind::BuildNormals => include_str!("shaders/build_normals.wgsl"),
        PassKind::DebugOverlay => include_str!("shaders/debug_occlusion.wgsl"),
    };
    let builder = match kind {
        PassKind::Occlusion | PassKind::DebugOverlay => {
            ShaderBuilder::new().with_include(OBSCURANCE_WGSL)
        }
        _ => ShaderBuilder::new(),
    };
    builder
        .with_constant(
            "DISTANCE_BASED",
            variant.estimator == EstimatorMode::DistanceBased,
        )
        .with_constant("SPLIT_QUAD", variant.split == SplitMode::Quad)
        .with_constant(
            "NEAREST_DEPTH_MIPS",
            variant.estimator.uses_nearest_depth_mips(),
        )
        .with_constant("BLUR_HORIZONTAL", kind == PassKind::HorizontalBlur)
        .with_body(body)
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn texture_entry(binding: u32, filterable: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

/// Bind group 0 layout of each pass. Binding numbers match the WGSL sources.
pub fn layout_entries(kind: PassKind) -> Vec<wgpu::BindGroupLayoutEntry> {
    match kind {
        // frame transform, ao params, frame params, depth, normals
        PassKind::Occlusion => vec![
            uniform_entry(0),
            uniform_entry(1),
            uniform_entry(2),
            texture_entry(3, false),
            texture_entry(4, false),
        ],
        // frame transform, ao params, blur params, occlusion, depth, sampler
        PassKind::HorizontalBlur | PassKind::VerticalBlur => vec![
            uniform_entry(0),
            uniform_entry(1),
            uniform_entry(2),
            texture_entry(3, true),
            texture_entry(4, false),
            sampler_entry(5),
        ],
        PassKind::MipGeneration => vec![texture_entry(0, false)],
        PassKind::Gather => vec![uniform_entry(0), texture_entry(1, false)],
        PassKind::BuildNormals => vec![uniform_entry(0), uniform_entry(1), texture_entry(2, false)],
        // frame transform, ao params, debug params, depth
        PassKind::DebugOverlay => vec![
            uniform_entry(0),
            uniform_entry(1),
            uniform_entry(2),
            texture_entry(3, false),
        ],
    }
}

/// Color target state for a pass: RGB writes only, alpha blending where requested.
pub fn color_target(format: wgpu::TextureFormat, state: PipelineState) -> wgpu::ColorTargetState {
    wgpu::ColorTargetState {
        format,
        blend: state.alpha_blend.then_some(wgpu::BlendState::ALPHA_BLENDING),
        write_mask: if state.write_rgb_only {
            wgpu::ColorWrites::COLOR
        } else {
            wgpu::ColorWrites::ALL
        },
    }
}

fn create_fullscreen_pipeline(
    device: &wgpu::Device,
    label: &str,
    module: &wgpu::ShaderModule,
    bind_group_layout: &wgpu::BindGroupLayout,
    format: wgpu::TextureFormat,
    state: PipelineState,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[bind_group_layout],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_main"),
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some("fs_main"),
            targets: &[Some(color_target(format, state))],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
