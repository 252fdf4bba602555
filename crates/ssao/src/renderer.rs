//! The effect bundled with its overlay and a shared configuration handle.

use std::sync::Arc;

use ssao_core::{ConfigHandle, DebugOcclusionConfig, TimingReport};
use ssao_render::{
    AmbientOcclusionEffect, DebugOverlay, EffectInputs, FrameReport, RenderResult, SsaoPipelines,
};

/// Ambient occlusion for one view.
///
/// Configuration edits made through [`config_handle`](Self::config_handle),
/// from any thread, are applied at the start of the next [`render`](Self::render).
pub struct AmbientOcclusion {
    config: ConfigHandle,
    effect: AmbientOcclusionEffect,
    overlay: DebugOverlay,
}

impl AmbientOcclusion {
    /// Creates the effect with its own pipelines. `overlay_format` is the
    /// color format the debug overlay draws into.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        overlay_format: wgpu::TextureFormat,
    ) -> RenderResult<Self> {
        let pipelines = Arc::new(SsaoPipelines::new(device, overlay_format)?);
        Ok(Self::with_pipelines(device, queue, pipelines))
    }

    /// Creates the effect on pipelines shared with other views.
    pub fn with_pipelines(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pipelines: Arc<SsaoPipelines>,
    ) -> Self {
        Self {
            config: ConfigHandle::default(),
            effect: AmbientOcclusionEffect::new(device, queue, Arc::clone(&pipelines)),
            overlay: DebugOverlay::new(device, pipelines),
        }
    }

    /// Handle for editing the configuration.
    pub fn config_handle(&self) -> ConfigHandle {
        self.config.clone()
    }

    pub fn set_debug_config(&mut self, config: &DebugOcclusionConfig) {
        self.overlay.configure(config);
    }

    /// Applies pending configuration edits and records the effect.
    ///
    /// An invalid pending edit fails this call without recording anything;
    /// later frames keep running with the last valid configuration.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        inputs: &EffectInputs<'_>,
    ) -> RenderResult<FrameReport> {
        self.effect.sync_config(&self.config)?;
        self.effect.run(device, queue, encoder, inputs)
    }

    /// Records the debug overlay over `target`. Returns whether it was drawn.
    pub fn render_debug(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        inputs: &EffectInputs<'_>,
        target: &wgpu::Texture,
    ) -> RenderResult<bool> {
        self.overlay
            .run(device, queue, encoder, &self.effect, inputs, target)
    }

    /// Reads back GPU timings once the frame's commands were submitted.
    pub fn collect_timings(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) -> TimingReport {
        self.effect.collect_timings(device, queue);
        self.effect.timings()
    }

    pub fn effect(&self) -> &AmbientOcclusionEffect {
        &self.effect
    }

    pub fn effect_mut(&mut self) -> &mut AmbientOcclusionEffect {
        &mut self.effect
    }

    pub fn overlay(&self) -> &DebugOverlay {
        &self.overlay
    }
}
