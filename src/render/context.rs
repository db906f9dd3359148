// SPDX-License-Identifier: GPL-3.0-only

//! GPU context acquisition and the presentable display target
//!
//! One `GpuContext` per renderer: adapter, device, and queue picked against
//! the surface the preview will present to. `DisplayTarget` owns that
//! surface and its configuration, and is the only place reconfiguration
//! happens after a resize or a lost surface.

use std::sync::Arc;

use tracing::{debug, info};

use crate::errors::ContextError;

/// Shared handles to the GPU device and its submission queue
pub(crate) struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub adapter: wgpu::Adapter,
}

impl GpuContext {
    /// Request an adapter compatible with the surface and open a device on it
    pub async fn request(
        instance: &wgpu::Instance,
        surface: &wgpu::Surface<'static>,
        power_preference: wgpu::PowerPreference,
        label: &'static str,
    ) -> Result<Self, ContextError> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                force_fallback_adapter: false,
                compatible_surface: Some(surface),
            })
            .await
            .ok_or(ContextError::AdapterNotFound)?;

        let adapter_info = adapter.get_info();
        info!(
            name = %adapter_info.name,
            backend = ?adapter_info.backend,
            device_type = ?adapter_info.device_type,
            "Selected GPU adapter"
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some(label),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|err| ContextError::DeviceRequest(err.to_string()))?;

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter,
        })
    }
}

/// The surface the preview presents to, with its live configuration
pub(crate) struct DisplayTarget {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
}

impl DisplayTarget {
    /// Configure the surface for the given size and present mode
    pub fn new(
        device: &wgpu::Device,
        adapter: &wgpu::Adapter,
        surface: wgpu::Surface<'static>,
        width: u32,
        height: u32,
        present_mode: wgpu::PresentMode,
    ) -> Result<Self, ContextError> {
        let mut config = surface
            .get_default_config(adapter, width.max(1), height.max(1))
            .ok_or_else(|| {
                ContextError::SurfaceConfig("surface is incompatible with the adapter".into())
            })?;
        config.present_mode = present_mode;
        surface.configure(device, &config);

        info!(
            width = config.width,
            height = config.height,
            format = ?config.format,
            present_mode = ?config.present_mode,
            "Display target configured"
        );

        Ok(Self { surface, config })
    }

    /// Resize the drawable; zero-sized requests are ignored since a
    /// minimized window reports them transiently
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if width == 0 || height == 0 {
            debug!(width, height, "Ignoring zero-sized resize");
            return;
        }
        if width == self.config.width && height == self.config.height {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(device, &self.config);
        debug!(width, height, "Display target resized");
    }

    /// Reapply the current configuration, used after a lost surface
    pub fn reconfigure(&self, device: &wgpu::Device) {
        self.surface.configure(device, &self.config);
    }

    /// Acquire the next drawable texture
    pub fn acquire(&self) -> Result<wgpu::SurfaceTexture, wgpu::SurfaceError> {
        self.surface.get_current_texture()
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }
}
