// SPDX-License-Identifier: GPL-3.0-only

//! Frame texture cache
//!
//! Holds at most one live GPU texture wrapping the most recent frame. A new
//! frame with the same shape reuses the texture object (one upload, no
//! reallocation); a shape or format change releases the old texture before
//! the replacement is created, so GPU memory never accumulates across
//! frames. The CPU-side buffer is consumed by a single driver upload and
//! can be released by its owner as soon as `wrap` returns.

use crate::constants::shader_interface as iface;
use crate::errors::TextureError;
use crate::frame::{PixelBuffer, PixelFormat};
use crate::render::shader::EffectParams;
use tracing::debug;

/// The live texture and the bind group that exposes it to the pipeline
struct FrameTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
    format: PixelFormat,
}

/// Single-slot texture cache bound to one GPU device
pub(crate) struct TextureCache {
    sampler: wgpu::Sampler,
    params: wgpu::Buffer,
    current: Option<FrameTexture>,
    recreations: u64,
}

impl TextureCache {
    /// Create the cache against the device; sampling parameters are fixed
    /// here and never change per frame
    pub fn new(device: &wgpu::Device) -> Self {
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("viewfinder frame sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("viewfinder effect params"),
            size: std::mem::size_of::<EffectParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            sampler,
            params,
            current: None,
            recreations: 0,
        }
    }

    /// Wrap one delivered frame as the current texture
    ///
    /// On failure the previous texture state is left untouched so the
    /// render loop keeps repainting the last good frame.
    pub fn wrap(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        buffer: &PixelBuffer,
    ) -> Result<(), TextureError> {
        buffer.validate()?;

        if needs_recreation(self.shape(), buffer) {
            // Release before wrapping: the old texture and bind group drop
            // here, ahead of the replacement allocation.
            self.current = None;

            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("viewfinder frame texture"),
                size: wgpu::Extent3d {
                    width: buffer.width,
                    height: buffer.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: buffer.format.texture_format(),
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            });

            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("viewfinder frame bind group"),
                layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: iface::FRAME_TEXTURE_BINDING,
                        resource: wgpu::BindingResource::TextureView(&view),
                    },
                    wgpu::BindGroupEntry {
                        binding: iface::FRAME_SAMPLER_BINDING,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: iface::EFFECT_PARAMS_BINDING,
                        resource: self.params.as_entire_binding(),
                    },
                ],
            });

            self.recreations += 1;
            debug!(
                width = buffer.width,
                height = buffer.height,
                format = %buffer.format,
                recreations = self.recreations,
                "Frame texture created"
            );

            self.current = Some(FrameTexture {
                texture,
                bind_group,
                width: buffer.width,
                height: buffer.height,
                format: buffer.format,
            });
        }

        let entry = self
            .current
            .as_ref()
            .expect("current texture exists after recreation check");

        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &entry.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &buffer.data[..buffer.expected_len()],
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(buffer.stride),
                rows_per_image: None,
            },
            wgpu::Extent3d {
                width: buffer.width,
                height: buffer.height,
                depth_or_array_layers: 1,
            },
        );

        Ok(())
    }

    /// Write the time/effect uniforms for the next draw
    pub fn write_params(&self, queue: &wgpu::Queue, time: f32, effect_enabled: bool) {
        let params = EffectParams::new(time, effect_enabled);
        queue.write_buffer(&self.params, 0, bytemuck::bytes_of(&params));
    }

    /// The bind group for the current texture, if any frame has arrived
    pub fn bind_group(&self) -> Option<&wgpu::BindGroup> {
        self.current.as_ref().map(|entry| &entry.bind_group)
    }

    /// Source dimensions of the current texture
    pub fn source_size(&self) -> Option<(u32, u32)> {
        self.current.as_ref().map(|entry| (entry.width, entry.height))
    }

    /// Drop the live texture and bind group
    pub fn release(&mut self) {
        self.current = None;
    }

    fn shape(&self) -> Option<(u32, u32, PixelFormat)> {
        self.current
            .as_ref()
            .map(|entry| (entry.width, entry.height, entry.format))
    }
}

/// A frame forces a new texture when no texture is live or when its shape
/// or format differs from the live one
fn needs_recreation(current: Option<(u32, u32, PixelFormat)>, buffer: &PixelBuffer) -> bool {
    match current {
        Some((width, height, format)) => {
            width != buffer.width || height != buffer.height || format != buffer.format
        }
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(width: u32, height: u32, format: PixelFormat) -> PixelBuffer {
        let data = vec![0u8; (width * height * 4) as usize];
        PixelBuffer::new(width, height, format, data)
    }

    #[test]
    fn test_first_frame_allocates() {
        assert!(needs_recreation(None, &frame(640, 480, PixelFormat::Bgra8)));
    }

    #[test]
    fn test_same_shape_reuses_texture() {
        let current = Some((640, 480, PixelFormat::Bgra8));
        assert!(!needs_recreation(current, &frame(640, 480, PixelFormat::Bgra8)));
    }

    #[test]
    fn test_shape_change_recreates() {
        let current = Some((640, 480, PixelFormat::Bgra8));
        assert!(needs_recreation(current, &frame(1280, 720, PixelFormat::Bgra8)));
    }

    #[test]
    fn test_format_change_recreates() {
        let current = Some((640, 480, PixelFormat::Bgra8));
        assert!(needs_recreation(current, &frame(640, 480, PixelFormat::Rgba8)));
    }

    // Fold a stream of frames through the recreation predicate the way
    // `wrap` does, counting how many textures the stream would allocate.
    fn allocations_for(frames: &[PixelBuffer]) -> u64 {
        let mut live = None;
        let mut allocations = 0;
        for buffer in frames {
            if needs_recreation(live, buffer) {
                live = Some((buffer.width, buffer.height, buffer.format));
                allocations += 1;
            }
        }
        allocations
    }

    #[test]
    fn test_same_shape_stream_allocates_one_texture() {
        let frames: Vec<_> = (0..50).map(|_| frame(640, 480, PixelFormat::Bgra8)).collect();
        assert_eq!(allocations_for(&frames), 1);
    }

    #[test]
    fn test_shape_change_mid_stream_allocates_second_texture() {
        let mut frames: Vec<_> = (0..10).map(|_| frame(640, 480, PixelFormat::Bgra8)).collect();
        frames.extend((0..10).map(|_| frame(1280, 720, PixelFormat::Bgra8)));
        assert_eq!(allocations_for(&frames), 2);
    }
}
