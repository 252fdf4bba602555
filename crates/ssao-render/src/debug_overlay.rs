//! Cursor overlay showing the raw occlusion of one pixel and its sampling disk.

use std::sync::Arc;

use ssao_core::plan::debug_texcoord_rect;
use ssao_core::{DebugOcclusionConfig, DebugParameters, ParameterBlock, PassKind, Viewport};
use wgpu::util::DeviceExt;

use crate::effect::{draw_fullscreen, upload_block, AmbientOcclusionEffect, EffectInputs};
use crate::error::{RenderError, RenderResult};
use crate::pipelines::SsaoPipelines;

/// Draws the debug overlay on top of a color target.
pub struct DebugOverlay {
    pipelines: Arc<SsaoPipelines>,
    config: DebugOcclusionConfig,
    params: ParameterBlock<DebugParameters>,
    buffer: wgpu::Buffer,
    uploaded: u64,
}

impl DebugOverlay {
    pub fn new(device: &wgpu::Device, pipelines: Arc<SsaoPipelines>) -> Self {
        let params = ParameterBlock::new(DebugParameters::default());
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("SSAO Debug Parameters"),
            contents: bytemuck::bytes_of(params.get()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        Self {
            pipelines,
            config: DebugOcclusionConfig::default(),
            params,
            buffer,
            uploaded: 0,
        }
    }

    /// Applies an overlay configuration. Returns whether anything changed.
    pub fn configure(&mut self, config: &DebugOcclusionConfig) -> bool {
        if self.config == *config {
            return false;
        }
        self.config = config.clone();
        true
    }

    pub fn config(&self) -> &DebugOcclusionConfig {
        &self.config
    }

    pub fn parameters(&self) -> &DebugParameters {
        self.params.get()
    }

    /// Draws the overlay into the `inputs.viewport` region of `target`.
    ///
    /// The cursor pixel's occlusion is estimated again from the occlusion
    /// depth, so the overlay shows the unblurred value. Returns `Ok(false)`
    /// without recording anything when the overlay is switched off or the
    /// effect has not rendered a frame yet.
    pub fn run(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        effect: &AmbientOcclusionEffect,
        inputs: &EffectInputs<'_>,
        target: &wgpu::Texture,
    ) -> RenderResult<bool> {
        if !self.config.show_cursor_pixel {
            return Ok(false);
        }
        let Some(frame) = effect.last_frame() else {
            return Ok(false);
        };

        if target.format() != self.pipelines.overlay_format() {
            return Err(RenderError::InvalidInput(format!(
                "overlay target is {:?}, pipelines were built for {:?}",
                target.format(),
                self.pipelines.overlay_format()
            )));
        }
        let target_size = glam::UVec2::new(target.width(), target.height());
        if !Viewport::from_size(target_size).contains(&frame.source_viewport) {
            return Err(RenderError::InvalidInput(format!(
                "viewport {:?} exceeds the {}x{} overlay target",
                frame.source_viewport, target_size.x, target_size.y
            )));
        }

        let depth = inputs.linear_depth.texture(frame.occlusion_depth);
        let depth_size = glam::UVec2::new(depth.width(), depth.height());
        let cursor = self.config.debug_cursor_texcoord;
        self.params.set(DebugParameters {
            pixel_info: [cursor.x, cursor.y, 0.0, 0.0],
            texcoord_rect: debug_texcoord_rect(frame.occlusion_viewport, depth_size).to_array(),
        });
        upload_block(queue, &self.buffer, &self.params, &mut self.uploaded);

        let pipeline = self
            .pipelines
            .get(device, PassKind::DebugOverlay, effect.shader_variant());
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(PassKind::DebugOverlay.label()),
            layout: &pipeline.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: inputs.frame_transform.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: effect.parameters_buffer().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&depth_view),
                },
            ],
        });

        let view = target.create_view(&wgpu::TextureViewDescriptor::default());
        draw_fullscreen(
            encoder,
            PassKind::DebugOverlay.label(),
            &view,
            frame.source_viewport,
            None,
            pipeline,
            &bind_group,
        );
        Ok(true)
    }
}
