//! Headless occlusion rendering.
//!
//! Renders the occlusion of a linear depth image without a window and reads
//! the result back. Useful for integration tests and offline baking.

use std::sync::mpsc;

use glam::UVec2;
use pollster::FutureExt;
use ssao_core::{AmbientOcclusionConfig, FrameTransform, SourceDepthId, Viewport};
use ssao_render::{
    EffectInputs, FrameReport, LinearDepthInput, RenderError, RenderResult, LINEAR_DEPTH_FORMAT,
};
use wgpu::util::DeviceExt;

use crate::AmbientOcclusion;

/// A device and queue without a surface.
pub struct HeadlessContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl HeadlessContext {
    /// Requests a device on the best available adapter. Timestamp queries and
    /// `Rg11b10Ufloat` render targets are enabled when the adapter has them.
    pub fn new() -> RenderResult<Self> {
        Self::request().block_on()
    }

    async fn request() -> RenderResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..wgpu::InstanceDescriptor::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| RenderError::AdapterCreationFailed)?;

        let optional =
            wgpu::Features::TIMESTAMP_QUERY | wgpu::Features::RG11B10UFLOAT_RENDERABLE;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("ssao device (headless)"),
                required_features: adapter.features() & optional,
                ..Default::default()
            })
            .await?;

        log::info!("headless SSAO device on {}", adapter.get_info().name);
        Ok(Self { device, queue })
    }
}

/// Linear depth as positive view-space distances, row-major from the top-left.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthImage {
    size: UVec2,
    depth: Vec<f32>,
}

impl DepthImage {
    pub fn new(size: UVec2, depth: Vec<f32>) -> RenderResult<Self> {
        if size.x == 0 || size.y == 0 {
            return Err(RenderError::InvalidInput(format!(
                "depth image must not be empty, got {}x{}",
                size.x, size.y
            )));
        }
        let expected = size.x as usize * size.y as usize;
        if depth.len() != expected {
            return Err(RenderError::InvalidInput(format!(
                "depth image of {}x{} needs {expected} values, got {}",
                size.x,
                size.y,
                depth.len()
            )));
        }
        Ok(Self { size, depth })
    }

    /// An image at a constant distance.
    pub fn filled(size: UVec2, value: f32) -> RenderResult<Self> {
        Self::new(size, vec![value; size.x as usize * size.y as usize])
    }

    /// Builds an image from a function of the pixel position.
    pub fn from_fn(size: UVec2, f: impl Fn(u32, u32) -> f32) -> RenderResult<Self> {
        let depth = (0..size.y)
            .flat_map(|y| (0..size.x).map(move |x| (x, y)))
            .map(|(x, y)| f(x, y))
            .collect();
        Self::new(size, depth)
    }

    pub fn size(&self) -> UVec2 {
        self.size
    }

    pub fn depth(&self) -> &[f32] {
        &self.depth
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        let x = x.min(self.size.x - 1);
        let y = y.min(self.size.y - 1);
        self.depth[(y * self.size.x + x) as usize]
    }

    /// Half-resolution copy keeping the nearest distance of each 2x2 block.
    pub fn half(&self) -> Self {
        let size = (self.size / 2).max(UVec2::ONE);
        let depth = (0..size.y)
            .flat_map(|y| (0..size.x).map(move |x| (x, y)))
            .map(|(x, y)| {
                let (x, y) = (x * 2, y * 2);
                self.get(x, y)
                    .min(self.get(x + 1, y))
                    .min(self.get(x, y + 1))
                    .min(self.get(x + 1, y + 1))
            })
            .collect();
        Self { size, depth }
    }
}

/// The occlusion read back from a headless frame. 255 is unoccluded.
#[derive(Debug, Clone)]
pub struct OcclusionImage {
    pub size: UVec2,
    pub pixels: Vec<u8>,
    pub report: FrameReport,
}

impl OcclusionImage {
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.pixels[(y * self.size.x + x) as usize]
    }

    /// Mean visibility in `[0, 1]`.
    pub fn mean(&self) -> f32 {
        if self.pixels.is_empty() {
            return 1.0;
        }
        let sum: u64 = self.pixels.iter().map(|&p| u64::from(p)).sum();
        sum as f32 / (self.pixels.len() as f32 * 255.0)
    }
}

fn upload_depth(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    image: &DepthImage,
) -> wgpu::Texture {
    let size = image.size();
    let mip_level_count = u32::BITS - size.x.max(size.y).leading_zeros();
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: size.x,
            height: size.y,
            depth_or_array_layers: 1,
        },
        mip_level_count,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: LINEAR_DEPTH_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        bytemuck::cast_slice(image.depth()),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(size.x * 4),
            rows_per_image: Some(size.y),
        },
        wgpu::Extent3d {
            width: size.x,
            height: size.y,
            depth_or_array_layers: 1,
        },
    );
    texture
}

struct Readback {
    buffer: wgpu::Buffer,
    size: UVec2,
    padded_row: u32,
}

impl Readback {
    /// Copies an `R8Unorm` texture into a mappable buffer.
    fn copy(
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        texture: &wgpu::Texture,
    ) -> Self {
        let size = UVec2::new(texture.width(), texture.height());
        let padded_row = size
            .x
            .div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("SSAO Occlusion Readback"),
            size: u64::from(padded_row) * u64::from(size.y),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(size.y),
                },
            },
            wgpu::Extent3d {
                width: size.x,
                height: size.y,
                depth_or_array_layers: 1,
            },
        );
        Self {
            buffer,
            size,
            padded_row,
        }
    }

    fn read(self, device: &wgpu::Device) -> RenderResult<Vec<u8>> {
        let slice = self.buffer.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device
            .poll(wgpu::PollType::Wait)
            .map_err(|e| RenderError::Validation(e.to_string()))?;
        rx.recv()
            .map_err(|e| RenderError::Validation(e.to_string()))?
            .map_err(|e| RenderError::Validation(e.to_string()))?;

        let width = self.size.x as usize;
        let mut pixels = Vec::with_capacity(width * self.size.y as usize);
        {
            let data = slice.get_mapped_range();
            for row in data
                .chunks(self.padded_row as usize)
                .take(self.size.y as usize)
            {
                pixels.extend_from_slice(&row[..width]);
            }
        }
        self.buffer.unmap();
        Ok(pixels)
    }
}

/// Renders one frame of occlusion for all of `depth` seen through `transform`.
pub fn render_occlusion(
    context: &HeadlessContext,
    config: &AmbientOcclusionConfig,
    depth: &DepthImage,
    transform: &FrameTransform,
) -> RenderResult<OcclusionImage> {
    let viewport = Viewport::from_size(depth.size());
    render_occlusion_in(context, config, depth, transform, viewport)
}

/// Renders one frame of occlusion for the `viewport` region of `depth`.
///
/// The whole occlusion target is read back; pixels outside the viewport
/// hold whatever the passes left there.
pub fn render_occlusion_in(
    context: &HeadlessContext,
    config: &AmbientOcclusionConfig,
    depth: &DepthImage,
    transform: &FrameTransform,
    viewport: Viewport,
) -> RenderResult<OcclusionImage> {
    let device = &context.device;
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let result = record_and_read(context, config, depth, transform, viewport);
    if let Some(error) = device.pop_error_scope().block_on() {
        return Err(RenderError::Validation(error.to_string()));
    }
    result
}

fn record_and_read(
    context: &HeadlessContext,
    config: &AmbientOcclusionConfig,
    depth: &DepthImage,
    transform: &FrameTransform,
    viewport: Viewport,
) -> RenderResult<OcclusionImage> {
    let HeadlessContext { device, queue } = context;

    let full = upload_depth(device, queue, "SSAO Headless Full Depth", depth);
    let half = upload_depth(device, queue, "SSAO Headless Half Depth", &depth.half());
    let transform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("SSAO Headless Frame Transform"),
        contents: bytemuck::bytes_of(transform),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    });

    let mut ssao = AmbientOcclusion::new(device, queue, wgpu::TextureFormat::Rgba8Unorm)?;
    ssao.config_handle().set(config.clone());

    let inputs = EffectInputs {
        frame_transform: &transform_buffer,
        linear_depth: LinearDepthInput {
            id: SourceDepthId(1),
            full: &full,
            half: &half,
        },
        viewport,
    };

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("SSAO Headless Encoder"),
    });
    let report = ssao.render(device, queue, &mut encoder, &inputs)?;
    let readback = ssao
        .effect()
        .targets()
        .get_occlusion()
        .map(|target| Readback::copy(device, &mut encoder, &target.texture));
    queue.submit(Some(encoder.finish()));

    let timings = ssao.collect_timings(device, queue);
    log::debug!("headless SSAO frame: {report:?}, {timings:?}");

    let size = depth.size();
    let pixels = match readback {
        Some(readback) => readback.read(device)?,
        // nothing rendered: fully visible
        None => vec![u8::MAX; size.x as usize * size.y as usize],
    };
    Ok(OcclusionImage {
        size,
        pixels,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_image_rejects_bad_length() {
        assert!(DepthImage::new(UVec2::new(4, 4), vec![1.0; 15]).is_err());
        assert!(DepthImage::new(UVec2::new(0, 4), Vec::new()).is_err());
        assert!(DepthImage::filled(UVec2::new(4, 4), 1.0).is_ok());
    }

    #[test]
    fn test_half_keeps_nearest() {
        let image = DepthImage::from_fn(UVec2::new(4, 2), |x, y| (x + y * 4) as f32 + 1.0).unwrap();
        let half = image.half();
        assert_eq!(half.size(), UVec2::new(2, 1));
        assert_eq!(half.depth(), &[1.0, 3.0]);
    }

    #[test]
    fn test_half_of_odd_size() {
        let image = DepthImage::filled(UVec2::new(1, 3), 2.0).unwrap();
        let half = image.half();
        assert_eq!(half.size(), UVec2::new(1, 1));
        assert_eq!(half.get(0, 0), 2.0);
    }

    #[test]
    fn test_occlusion_mean() {
        let image = OcclusionImage {
            size: UVec2::new(2, 1),
            pixels: vec![255, 0],
            report: FrameReport {
                status: ssao_render::FrameStatus::Rendered,
                passes_recorded: 0,
                targets_reset: false,
                occlusion_viewport: Viewport::default(),
            },
        };
        assert!((image.mean() - 0.5).abs() < 1e-6);
        assert_eq!(image.get(1, 0), 0);
    }

    proptest::proptest! {
        #[test]
        fn prop_half_never_exceeds_source(w in 1u32..40, h in 1u32..40, seed in 0u32..1000) {
            let image = DepthImage::from_fn(UVec2::new(w, h), |x, y| {
                ((x * 31 + y * 17 + seed) % 97) as f32 + 0.5
            })
            .unwrap();
            let half = image.half();
            let min = image.depth().iter().copied().fold(f32::INFINITY, f32::min);
            proptest::prop_assert_eq!(half.size(), (UVec2::new(w, h) / 2).max(UVec2::ONE));
            for y in 0..half.size().y {
                for x in 0..half.size().x {
                    proptest::prop_assert!(half.get(x, y) <= image.get(x * 2, y * 2));
                    proptest::prop_assert!(half.get(x, y) >= min);
                }
            }
        }
    }
}
