//! The ambient occlusion effect.
//!
//! [`AmbientOcclusionEffect`] owns the parameter model, the uniform buffers
//! and the render targets, and records the passes of a [`FramePlan`] into the
//! host's command encoder.

use std::sync::Arc;
use std::time::Instant;

use glam::UVec2;
use ssao_core::sequence;
use ssao_core::{
    AmbientOcclusionConfig, ConfigChanges, ConfigHandle, DepthSource, FramePlan, FrameSetup,
    FrameTimings, ParameterBlock, ParameterModel, PassDesc, PassKind, RenderTargetManager,
    SourceDepthId, TargetSlot, TimingReport, Viewport, MAX_SPLITS,
};
use ssao_core::{AoParameters, BlurParameters, FrameParameters};

use crate::error::{RenderError, RenderResult};
use crate::pipelines::{GpuPipeline, ShaderVariant, SsaoPipelines, LINEAR_DEPTH_FORMAT};
use crate::targets::{create_fallback_normal, RenderTarget, WgpuTargetAllocator};
use crate::timer::GpuTimer;

/// Full- and half-resolution linear depth of the current frame.
///
/// Both textures must be `R32Float` with `TEXTURE_BINDING`; textures with
/// more than one mip level also need `RENDER_ATTACHMENT` so the effect can
/// fill their mip chain.
#[derive(Clone, Copy)]
pub struct LinearDepthInput<'a> {
    pub id: SourceDepthId,
    pub full: &'a wgpu::Texture,
    pub half: &'a wgpu::Texture,
}

impl LinearDepthInput<'_> {
    pub fn size(&self) -> UVec2 {
        UVec2::new(self.full.width(), self.full.height())
    }

    /// The depth texture for a depth source.
    pub fn texture(&self, source: DepthSource) -> &wgpu::Texture {
        match source {
            DepthSource::Full => self.full,
            DepthSource::Half => self.half,
        }
    }
}

/// Per-frame inputs of the effect.
#[derive(Clone, Copy)]
pub struct EffectInputs<'a> {
    /// Uniform buffer holding a [`ssao_core::FrameTransform`].
    pub frame_transform: &'a wgpu::Buffer,
    pub linear_depth: LinearDepthInput<'a>,
    /// Region of the source frame to process.
    pub viewport: Viewport,
}

/// Outcome of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Rendered,
    /// The configuration has the effect switched off.
    Disabled,
    /// The viewport has no pixels at the configured resolution level.
    EmptyViewport,
}

/// What [`AmbientOcclusionEffect::run`] recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    pub status: FrameStatus,
    /// Number of render passes recorded, mip levels included.
    pub passes_recorded: usize,
    /// Whether the render targets were released because the depth input changed.
    pub targets_reset: bool,
    pub occlusion_viewport: Viewport,
}

impl FrameReport {
    fn skipped(status: FrameStatus, targets_reset: bool) -> Self {
        Self {
            status,
            passes_recorded: 0,
            targets_reset,
            occlusion_viewport: Viewport::default(),
        }
    }

    pub fn is_rendered(&self) -> bool {
        self.status == FrameStatus::Rendered
    }
}

/// Geometry of the last rendered frame, used by the debug overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderedFrame {
    pub occlusion_viewport: Viewport,
    pub occlusion_depth: DepthSource,
    pub source_viewport: Viewport,
}

fn create_uniform_buffer<T: bytemuck::Pod>(
    device: &wgpu::Device,
    label: &str,
    value: &T,
) -> wgpu::Buffer {
    use wgpu::util::DeviceExt;

    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::bytes_of(value),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

/// Writes a block to its buffer if it was edited since the last upload.
pub(crate) fn upload_block<T: bytemuck::Pod>(
    queue: &wgpu::Queue,
    buffer: &wgpu::Buffer,
    block: &ParameterBlock<T>,
    uploaded: &mut u64,
) {
    if block.version() != *uploaded {
        queue.write_buffer(buffer, 0, bytemuck::bytes_of(block.get()));
        *uploaded = block.version();
    }
}

struct UniformBuffers {
    ao: wgpu::Buffer,
    frames: Vec<wgpu::Buffer>,
    hblur: wgpu::Buffer,
    vblur: wgpu::Buffer,
    ao_version: u64,
    frame_versions: Vec<u64>,
    hblur_version: u64,
    vblur_version: u64,
}

impl UniformBuffers {
    fn new(device: &wgpu::Device) -> Self {
        let frames = (0..MAX_SPLITS)
            .map(|i| {
                create_uniform_buffer(
                    device,
                    &format!("SSAO Frame Parameters {i}"),
                    &FrameParameters::default(),
                )
            })
            .collect();
        Self {
            ao: create_uniform_buffer(device, "SSAO Parameters", &AoParameters::default()),
            frames,
            hblur: create_uniform_buffer(
                device,
                "SSAO Horizontal Blur Parameters",
                &BlurParameters::default(),
            ),
            vblur: create_uniform_buffer(
                device,
                "SSAO Vertical Blur Parameters",
                &BlurParameters::default(),
            ),
            ao_version: 0,
            frame_versions: vec![0; MAX_SPLITS],
            hblur_version: 0,
            vblur_version: 0,
        }
    }

    fn upload(&mut self, queue: &wgpu::Queue, model: &ParameterModel) {
        upload_block(queue, &self.ao, model.ao_parameters(), &mut self.ao_version);
        for ((block, buffer), version) in model
            .frame_parameters()
            .iter()
            .zip(&self.frames)
            .zip(&mut self.frame_versions)
        {
            upload_block(queue, buffer, block, version);
        }
        upload_block(queue, &self.hblur, model.hblur_parameters(), &mut self.hblur_version);
        upload_block(queue, &self.vblur, model.vblur_parameters(), &mut self.vblur_version);
    }
}

fn validate_inputs(inputs: &EffectInputs<'_>) -> RenderResult<()> {
    let depth = &inputs.linear_depth;
    for (name, texture) in [("full", depth.full), ("half", depth.half)] {
        if texture.format() != LINEAR_DEPTH_FORMAT {
            return Err(RenderError::InvalidInput(format!(
                "{name} linear depth must be {LINEAR_DEPTH_FORMAT:?}, got {:?}",
                texture.format()
            )));
        }
        let usage = texture.usage();
        if !usage.contains(wgpu::TextureUsages::TEXTURE_BINDING) {
            return Err(RenderError::InvalidInput(format!(
                "{name} linear depth is missing TEXTURE_BINDING usage"
            )));
        }
        if texture.mip_level_count() > 1
            && !usage.contains(wgpu::TextureUsages::RENDER_ATTACHMENT)
        {
            return Err(RenderError::InvalidInput(format!(
                "{name} linear depth has mips but no RENDER_ATTACHMENT usage"
            )));
        }
    }

    let source = Viewport::from_size(depth.size());
    if !source.contains(&inputs.viewport) {
        return Err(RenderError::InvalidInput(format!(
            "viewport {:?} exceeds the {}x{} linear depth",
            inputs.viewport, source.width, source.height
        )));
    }
    Ok(())
}

/// Records the passes of one frame.
struct PassRecorder<'a> {
    device: &'a wgpu::Device,
    pipelines: &'a SsaoPipelines,
    buffers: &'a UniformBuffers,
    variant: ShaderVariant,
    inputs: &'a EffectInputs<'a>,
    occlusion: &'a RenderTarget,
    blurred: &'a RenderTarget,
    normal: &'a RenderTarget,
}

impl PassRecorder<'_> {
    fn target(&self, slot: TargetSlot) -> &RenderTarget {
        match slot {
            TargetSlot::Occlusion => self.occlusion,
            TargetSlot::OcclusionBlurred => self.blurred,
            // the depth mip chain is never a bound input
            TargetSlot::Normal | TargetSlot::OcclusionDepthMips => self.normal,
        }
    }

    fn depth_view(&self, source: DepthSource) -> wgpu::TextureView {
        self.inputs
            .linear_depth
            .texture(source)
            .create_view(&wgpu::TextureViewDescriptor::default())
    }

    fn bind_group(&self, pass: &PassDesc, pipeline: &GpuPipeline) -> wgpu::BindGroup {
        let frame_transform = self.inputs.frame_transform.as_entire_binding();
        let ao = self.buffers.ao.as_entire_binding();
        let input = self.target(pass.input.unwrap_or(TargetSlot::Occlusion));
        let full_depth = self.depth_view(DepthSource::Full);
        let depth = self.depth_view(pass.depth);

        let resources: Vec<wgpu::BindingResource<'_>> = match pass.kind {
            PassKind::Occlusion => vec![
                frame_transform,
                ao,
                self.buffers.frames[pass.split].as_entire_binding(),
                wgpu::BindingResource::TextureView(&depth),
                wgpu::BindingResource::TextureView(&self.normal.view),
            ],
            PassKind::HorizontalBlur | PassKind::VerticalBlur => {
                let blur = if pass.kind == PassKind::HorizontalBlur {
                    &self.buffers.hblur
                } else {
                    &self.buffers.vblur
                };
                vec![
                    frame_transform,
                    ao,
                    blur.as_entire_binding(),
                    wgpu::BindingResource::TextureView(&input.view),
                    wgpu::BindingResource::TextureView(&full_depth),
                    wgpu::BindingResource::Sampler(&input.sampler),
                ]
            }
            PassKind::Gather => vec![
                self.buffers.frames[0].as_entire_binding(),
                wgpu::BindingResource::TextureView(&input.view),
            ],
            PassKind::BuildNormals => vec![
                frame_transform,
                ao,
                wgpu::BindingResource::TextureView(&depth),
            ],
            // mip levels and the overlay bind their own resources
            PassKind::MipGeneration | PassKind::DebugOverlay => Vec::new(),
        };

        let entries: Vec<wgpu::BindGroupEntry<'_>> = resources
            .into_iter()
            .enumerate()
            .map(|(binding, resource)| wgpu::BindGroupEntry {
                binding: binding as u32,
                resource,
            })
            .collect();

        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(pass.kind.label()),
            layout: &pipeline.bind_group_layout,
            entries: &entries,
        })
    }

    /// Records one plan entry. Returns the number of render passes it took.
    fn record(&self, encoder: &mut wgpu::CommandEncoder, pass: &PassDesc) -> usize {
        let pipeline = self.pipelines.get(self.device, pass.kind, self.variant);
        if pass.kind == PassKind::MipGeneration {
            return self.record_mips(encoder, pass, pipeline);
        }

        // odd quadrants of a one-pixel-wide viewport are empty
        if pass.viewport.is_empty() {
            return 0;
        }
        let bind_group = self.bind_group(pass, pipeline);
        let target = self.target(pass.target);
        draw_fullscreen(
            encoder,
            pass.kind.label(),
            &target.view,
            pass.viewport,
            pass.clear,
            pipeline,
            &bind_group,
        );
        1
    }

    fn record_mips(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        pass: &PassDesc,
        pipeline: &GpuPipeline,
    ) -> usize {
        let texture = self.inputs.linear_depth.texture(pass.depth);
        let levels = texture.mip_level_count();
        for level in 1..levels {
            let source = texture.create_view(&wgpu::TextureViewDescriptor {
                label: Some("SSAO Depth Mip Source"),
                base_mip_level: level - 1,
                mip_level_count: Some(1),
                ..Default::default()
            });
            let destination = texture.create_view(&wgpu::TextureViewDescriptor {
                label: Some("SSAO Depth Mip Destination"),
                base_mip_level: level,
                mip_level_count: Some(1),
                ..Default::default()
            });
            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(pass.kind.label()),
                layout: &pipeline.bind_group_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&source),
                }],
            });
            let width = (texture.width() >> level).max(1);
            let height = (texture.height() >> level).max(1);
            draw_fullscreen(
                encoder,
                pass.kind.label(),
                &destination,
                Viewport::new(0, 0, width, height),
                None,
                pipeline,
                &bind_group,
            );
        }
        levels.saturating_sub(1) as usize
    }
}

/// Draws the fullscreen triangle into `viewport` of `view`.
pub(crate) fn draw_fullscreen(
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    view: &wgpu::TextureView,
    viewport: Viewport,
    clear: Option<f64>,
    pipeline: &GpuPipeline,
    bind_group: &wgpu::BindGroup,
) {
    let load = clear.map_or(wgpu::LoadOp::Load, |value| {
        wgpu::LoadOp::Clear(wgpu::Color {
            r: value,
            g: value,
            b: value,
            a: value,
        })
    });
    let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            resolve_target: None,
            ops: wgpu::Operations {
                load,
                store: wgpu::StoreOp::Store,
            },
            depth_slice: None,
        })],
        depth_stencil_attachment: None,
        ..Default::default()
    });

    render_pass.set_viewport(
        viewport.x as f32,
        viewport.y as f32,
        viewport.width as f32,
        viewport.height as f32,
        0.0,
        1.0,
    );
    render_pass.set_pipeline(&pipeline.pipeline);
    render_pass.set_bind_group(0, bind_group, &[]);
    render_pass.draw(0..3, 0..1);
}

/// Screen-space ambient occlusion over a linear depth buffer.
pub struct AmbientOcclusionEffect {
    pipelines: Arc<SsaoPipelines>,
    model: ParameterModel,
    targets: RenderTargetManager<RenderTarget>,
    buffers: UniformBuffers,
    fallback_normal: RenderTarget,
    timer: Option<GpuTimer>,
    timings: FrameTimings,
    frame_index: u32,
    config_generation: u64,
    last_frame: Option<RenderedFrame>,
}

impl AmbientOcclusionEffect {
    /// Creates the effect with the default configuration applied.
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, pipelines: Arc<SsaoPipelines>) -> Self {
        let mut model = ParameterModel::new();
        model.configure(&AmbientOcclusionConfig::default());
        log::info!("created SSAO effect");

        Self {
            pipelines,
            model,
            targets: RenderTargetManager::new(),
            buffers: UniformBuffers::new(device),
            fallback_normal: create_fallback_normal(device, queue),
            timer: GpuTimer::new(device),
            timings: FrameTimings::default(),
            frame_index: 0,
            config_generation: 0,
            last_frame: None,
        }
    }

    /// Applies a configuration. Only changed fields are rewritten.
    ///
    /// An invalid configuration is rejected and the previous one stays active.
    pub fn configure(&mut self, config: &AmbientOcclusionConfig) -> RenderResult<ConfigChanges> {
        if let Err(e) = config.validate() {
            log::warn!("rejected SSAO configuration: {e}");
            return Err(e.into());
        }
        let changes = self.model.configure(config);
        if changes.split || changes.samples {
            self.frame_index = 0;
        }
        if changes.any() {
            log::debug!("SSAO configuration changed: {changes:?}");
        }
        Ok(changes)
    }

    /// Applies the configuration of a shared handle if it changed since the
    /// last sync. Returns `Ok(None)` when nothing changed.
    pub fn sync_config(&mut self, handle: &ConfigHandle) -> RenderResult<Option<ConfigChanges>> {
        match handle.snapshot_if_changed(&mut self.config_generation) {
            Some(config) => self.configure(&config).map(Some),
            None => Ok(None),
        }
    }

    fn variant(&self) -> ShaderVariant {
        ShaderVariant {
            estimator: self.model.estimator(),
            split: self.model.split(),
        }
    }

    /// Records the effect's passes into `encoder`.
    ///
    /// Invalid inputs fail before anything is recorded. A disabled effect or
    /// an empty viewport skips the frame.
    pub fn run(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        inputs: &EffectInputs<'_>,
    ) -> RenderResult<FrameReport> {
        let start = Instant::now();
        let Some(config) = self.model.applied().cloned() else {
            return Ok(FrameReport::skipped(FrameStatus::Disabled, false));
        };
        if !config.enabled {
            return Ok(FrameReport::skipped(FrameStatus::Disabled, false));
        }

        validate_inputs(inputs)?;

        let depth = &inputs.linear_depth;
        let source_size = depth.size();
        let targets_reset = self.targets.update_linear_depth(depth.id, source_size);
        if targets_reset {
            self.model.set_source_frame_size(source_size);
        }

        let plan = FramePlan::build(&FrameSetup {
            source_viewport: inputs.viewport,
            source_size,
            resolution_level: config.resolution_level,
            split: config.split,
        });
        if plan.is_empty() {
            log::warn!(
                "SSAO viewport {:?} is empty at resolution level {}, skipping frame",
                inputs.viewport,
                config.resolution_level
            );
            return Ok(FrameReport::skipped(FrameStatus::EmptyViewport, targets_reset));
        }

        self.model.prepare_frame(self.frame_index, plan.occlusion_viewport);
        self.frame_index = if config.temporal_rotation {
            sequence::next_frame_index(
                self.frame_index,
                self.model.sample_angles().len(),
                config.split.split_count(),
            )
        } else {
            0
        };
        self.buffers.upload(queue, &self.model);

        let variant = self.variant();
        let allocator = WgpuTargetAllocator {
            device,
            normal_format: self.pipelines.normal_format(),
        };
        let frame_targets = self.targets.frame_targets(&allocator, plan.normal_level);
        let (Some(occlusion), Some(blurred)) =
            (frame_targets.occlusion, frame_targets.occlusion_blurred)
        else {
            return Err(RenderError::Validation(
                "occlusion targets were not allocated".into(),
            ));
        };

        let recorder = PassRecorder {
            device,
            pipelines: &self.pipelines,
            buffers: &self.buffers,
            variant,
            inputs,
            occlusion,
            blurred,
            normal: frame_targets.normal.unwrap_or(&self.fallback_normal),
        };

        if let Some(timer) = &self.timer {
            timer.begin(encoder);
        }
        let passes_recorded = plan
            .passes
            .iter()
            .map(|pass| recorder.record(encoder, pass))
            .sum();
        if let Some(timer) = &mut self.timer {
            timer.end(encoder);
        }

        self.last_frame = Some(RenderedFrame {
            occlusion_viewport: plan.occlusion_viewport,
            occlusion_depth: plan.occlusion_depth,
            source_viewport: inputs.viewport,
        });
        self.timings
            .record_batch(start.elapsed().as_secs_f64() * 1000.0);

        Ok(FrameReport {
            status: FrameStatus::Rendered,
            passes_recorded,
            targets_reset,
            occlusion_viewport: plan.occlusion_viewport,
        })
    }

    /// Reads back finished GPU timings. Call after submitting the encoder
    /// passed to [`run`](Self::run).
    pub fn collect_timings(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        if let Some(timer) = &mut self.timer {
            for ms in timer.collect(device, queue) {
                self.timings.record_gpu(ms);
            }
        }
    }

    /// Averaged GPU and batch timings.
    pub fn timings(&self) -> TimingReport {
        self.timings.report()
    }

    /// The render targets; the final occlusion is in the occlusion target.
    pub fn targets(&self) -> &RenderTargetManager<RenderTarget> {
        &self.targets
    }

    /// View of the final occlusion, once a frame has been rendered.
    pub fn occlusion_view(&self) -> Option<&wgpu::TextureView> {
        self.targets.get_occlusion().map(|target| &target.view)
    }

    pub fn parameters(&self) -> &ParameterModel {
        &self.model
    }

    /// Uniform buffer holding the current [`AoParameters`].
    pub fn parameters_buffer(&self) -> &wgpu::Buffer {
        &self.buffers.ao
    }

    pub fn pipelines(&self) -> &Arc<SsaoPipelines> {
        &self.pipelines
    }

    /// Geometry of the last rendered frame.
    pub fn last_frame(&self) -> Option<RenderedFrame> {
        self.last_frame
    }

    pub(crate) fn shader_variant(&self) -> ShaderVariant {
        self.variant()
    }
}
