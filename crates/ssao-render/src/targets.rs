//! wgpu allocation of the occlusion render targets.

use ssao_core::{TargetAllocator, TargetDesc, TargetFilter, TargetFormat};

use crate::pipelines::OCCLUSION_FORMAT;

/// A render target texture with its default view and sampler.
pub struct RenderTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

impl RenderTarget {
    pub fn size(&self) -> (u32, u32) {
        (self.texture.width(), self.texture.height())
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.texture.format()
    }
}

/// Creates [`RenderTarget`]s on a device.
pub struct WgpuTargetAllocator<'a> {
    pub device: &'a wgpu::Device,
    pub normal_format: wgpu::TextureFormat,
}

impl WgpuTargetAllocator<'_> {
    fn texture_format(&self, format: TargetFormat) -> wgpu::TextureFormat {
        match format {
            TargetFormat::Occlusion => OCCLUSION_FORMAT,
            TargetFormat::PackedNormal => self.normal_format,
        }
    }
}

impl TargetAllocator for WgpuTargetAllocator<'_> {
    type Target = RenderTarget;

    fn create_target(&self, desc: &TargetDesc) -> RenderTarget {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d {
                width: desc.size.x.max(1),
                height: desc.size.y.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.texture_format(desc.format),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let filter = match desc.filter {
            TargetFilter::Linear => wgpu::FilterMode::Linear,
            TargetFilter::Nearest => wgpu::FilterMode::Nearest,
        };
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(desc.label),
            mag_filter: filter,
            min_filter: filter,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        });

        RenderTarget {
            texture,
            view,
            sampler,
        }
    }
}

/// Creates the 1x1 normal texture bound when no normal buffer is built.
pub fn create_fallback_normal(device: &wgpu::Device, queue: &wgpu::Queue) -> RenderTarget {
    let desc = TargetDesc {
        label: "SSAO Fallback Normal",
        size: glam::UVec2::ONE,
        format: TargetFormat::PackedNormal,
        filter: TargetFilter::Nearest,
    };
    let allocator = WgpuTargetAllocator {
        device,
        normal_format: wgpu::TextureFormat::Rgba8Unorm,
    };
    let target = allocator.create_target(&desc);
    // facing the camera: (0, 0, 1) encoded
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &target.texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &[128, 128, 255, 255],
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4),
            rows_per_image: Some(1),
        },
        wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        },
    );
    target
}
