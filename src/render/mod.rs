// SPDX-License-Identifier: GPL-3.0-only

//! Preview renderer
//!
//! The renderer owns every GPU-facing object: instance, device, surface,
//! pipeline, quad geometry, and the frame texture cache. It is driven from
//! one thread by the embedding display loop, once per refresh tick; frames
//! and the effect toggle arrive from other threads through the
//! [`PreviewHandle`](crate::bridge::PreviewHandle).

pub(crate) mod context;
pub mod geometry;
pub mod shader;
pub(crate) mod texture;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::bridge::{FrameBridge, PreviewHandle};
use crate::constants::timing;
use crate::errors::{ContextError, PreviewResult};
use context::{DisplayTarget, GpuContext};
use geometry::GeometryBuffers;
use shader::{ShaderProgram, ShaderSources};
use texture::TextureCache;

/// Drawable size in physical pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Startup options for the renderer
#[derive(Debug, Clone)]
pub struct RendererOptions {
    /// Adapter selection hint
    pub power_preference: wgpu::PowerPreference,
    /// Presentation mode; the default follows the display refresh
    pub present_mode: wgpu::PresentMode,
    /// Letterbox the frame instead of stretching it over the drawable
    pub preserve_aspect: bool,
    /// Debug label applied to the GPU device
    pub label: &'static str,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            power_preference: wgpu::PowerPreference::LowPower,
            present_mode: wgpu::PresentMode::AutoVsync,
            preserve_aspect: true,
            label: "viewfinder device",
        }
    }
}

/// Viewport rectangle in physical pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Fit `src` into `dst` preserving aspect ratio, centered with letterbox
/// bars on the constrained axis
pub fn aspect_fit(src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> Viewport {
    let full = Viewport {
        x: 0.0,
        y: 0.0,
        width: dst_w as f32,
        height: dst_h as f32,
    };
    if src_w == 0 || src_h == 0 {
        return full;
    }

    let scale = f32::min(
        dst_w as f32 / src_w as f32,
        dst_h as f32 / src_h as f32,
    );
    let width = src_w as f32 * scale;
    let height = src_h as f32 * scale;
    Viewport {
        x: (dst_w as f32 - width) / 2.0,
        y: (dst_h as f32 - height) / 2.0,
        width,
        height,
    }
}

/// Monotonic clock feeding the shader time uniform
///
/// Seeded when the renderer becomes ready, so the first tick measures a
/// real interval instead of time spent in startup.
pub(crate) struct FrameClock {
    last: Option<Instant>,
    elapsed: f32,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            last: None,
            elapsed: 0.0,
        }
    }

    /// Seed the clock; the next tick accumulates from here
    pub fn start_at(&mut self, now: Instant) {
        self.last = Some(now);
    }

    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    /// Advance by the interval since the previous tick and return the
    /// accumulated time in seconds
    pub fn tick_at(&mut self, now: Instant) -> f32 {
        if let Some(last) = self.last {
            self.elapsed += now.saturating_duration_since(last).as_secs_f32();
        }
        self.last = Some(now);
        self.elapsed
    }

    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    pub fn reset(&mut self) {
        self.last = None;
        self.elapsed = 0.0;
    }
}

/// Lifecycle state of the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RenderState {
    Ready,
    Rendering,
    TornDown,
}

/// Device-free lifecycle bookkeeping: state transitions, the frame clock,
/// and the presented-frame counter
///
/// Kept apart from the GPU resources so the teardown and render gating
/// rules are checkable without a device.
struct Lifecycle {
    state: RenderState,
    clock: FrameClock,
    frame_count: u64,
}

impl Lifecycle {
    fn ready() -> Self {
        let mut clock = FrameClock::new();
        clock.start();
        Self {
            state: RenderState::Ready,
            clock,
            frame_count: 0,
        }
    }

    /// Whether a new frame may start; moves `Ready` to `Rendering`
    fn begin_frame(&mut self) -> bool {
        match self.state {
            RenderState::TornDown => {
                debug!("render requested after teardown");
                false
            }
            RenderState::Rendering => {
                warn!("render pass re-entered, skipping");
                false
            }
            RenderState::Ready => {
                self.state = RenderState::Rendering;
                true
            }
        }
    }

    /// Return to `Ready` after a pass, unless teardown happened meanwhile
    fn end_frame(&mut self) {
        if self.state == RenderState::Rendering {
            self.state = RenderState::Ready;
        }
    }

    /// Count one presented frame
    fn frame_presented(&mut self) -> u64 {
        self.frame_count += 1;
        self.frame_count
    }

    /// First call moves to `TornDown` and returns true; every later call
    /// returns false so resources release exactly once
    fn begin_teardown(&mut self) -> bool {
        if self.state == RenderState::TornDown {
            return false;
        }
        self.clock.reset();
        self.state = RenderState::TornDown;
        true
    }
}

/// The live-preview renderer bound to one drawable surface
pub struct Renderer {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    target: Option<DisplayTarget>,
    shader: Option<ShaderProgram>,
    geometry: Option<GeometryBuffers>,
    textures: Option<TextureCache>,
    bridge: Arc<FrameBridge>,
    effect_enabled: Arc<AtomicBool>,
    lifecycle: Lifecycle,
    options: RendererOptions,
}

impl Renderer {
    /// Attach to a drawable and bring up the full GPU stack with the
    /// built-in shaders
    ///
    /// Blocks until the device is ready; any failure is fatal and the
    /// renderer is not created.
    pub fn attach(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        size: SurfaceSize,
        options: RendererOptions,
    ) -> PreviewResult<Self> {
        Self::attach_with_sources(target, size, options, &ShaderSources::builtin())
    }

    /// Attach with caller-provided shader sources
    pub fn attach_with_sources(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        size: SurfaceSize,
        options: RendererOptions,
        sources: &ShaderSources,
    ) -> PreviewResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let surface = instance
            .create_surface(target)
            .map_err(|e| ContextError::SurfaceCreation(e.to_string()))?;
        Self::init(&instance, surface, size, options, sources)
    }

    /// Attach to raw window and display handles
    ///
    /// # Safety
    ///
    /// The handles must stay valid for the lifetime of the renderer.
    pub unsafe fn attach_raw(
        raw_display_handle: raw_window_handle::RawDisplayHandle,
        raw_window_handle: raw_window_handle::RawWindowHandle,
        size: SurfaceSize,
        options: RendererOptions,
    ) -> PreviewResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let surface = unsafe {
            instance
                .create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                    raw_display_handle,
                    raw_window_handle,
                })
                .map_err(|e| ContextError::SurfaceCreation(e.to_string()))?
        };
        Self::init(&instance, surface, size, options, &ShaderSources::builtin())
    }

    fn init(
        instance: &wgpu::Instance,
        surface: wgpu::Surface<'static>,
        size: SurfaceSize,
        options: RendererOptions,
        sources: &ShaderSources,
    ) -> PreviewResult<Self> {
        let ctx = pollster::block_on(GpuContext::request(
            instance,
            &surface,
            options.power_preference,
            options.label,
        ))?;

        let target = DisplayTarget::new(
            &ctx.device,
            &ctx.adapter,
            surface,
            size.width,
            size.height,
            options.present_mode,
        )?;

        let shader = ShaderProgram::compile(&ctx.device, target.format(), sources)?;
        let geometry = GeometryBuffers::upload(&ctx.device);
        let textures = TextureCache::new(&ctx.device);

        info!(
            width = size.width,
            height = size.height,
            "Preview renderer ready"
        );

        Ok(Self {
            device: ctx.device,
            queue: ctx.queue,
            target: Some(target),
            shader: Some(shader),
            geometry: Some(geometry),
            textures: Some(textures),
            bridge: Arc::new(FrameBridge::new()),
            effect_enabled: Arc::new(AtomicBool::new(false)),
            lifecycle: Lifecycle::ready(),
            options,
        })
    }

    /// Handle for the capture and UI timelines
    pub fn handle(&self) -> PreviewHandle {
        PreviewHandle::new(Arc::clone(&self.bridge), Arc::clone(&self.effect_enabled))
    }

    /// Track a drawable resize; zero-sized requests are ignored
    pub fn resize(&mut self, size: SurfaceSize) {
        if let Some(target) = self.target.as_mut() {
            target.resize(&self.device, size.width, size.height);
        }
    }

    /// Draw one frame: bind the latest delivered frame if any, then paint
    /// the quad and present
    ///
    /// Called once per display refresh tick. A bad frame or a transiently
    /// unavailable surface skips the tick; both leave the renderer ready
    /// for the next one.
    pub fn render_frame(&mut self) -> PreviewResult<()> {
        if !self.lifecycle.begin_frame() {
            return Ok(());
        }
        let result = self.render_frame_inner();
        self.lifecycle.end_frame();
        result
    }

    fn render_frame_inner(&mut self) -> PreviewResult<()> {
        let (Some(target), Some(shader), Some(geometry), Some(textures)) = (
            self.target.as_ref(),
            self.shader.as_ref(),
            self.geometry.as_ref(),
            self.textures.as_mut(),
        ) else {
            return Ok(());
        };

        if let Some(buffer) = self.bridge.take_latest() {
            // A bad frame keeps the previous texture on screen.
            if let Err(err) = textures.wrap(
                &self.device,
                &self.queue,
                &shader.bind_group_layout,
                &buffer,
            ) {
                warn!(%err, "Skipping undisplayable frame");
            }
        }

        let time = self.lifecycle.clock.tick();
        let effect_enabled = self.effect_enabled.load(Ordering::Relaxed);
        textures.write_params(&self.queue, time, effect_enabled);

        let frame = match target.acquire() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost) | Err(wgpu::SurfaceError::Outdated) => {
                debug!("Surface lost, reconfiguring");
                target.reconfigure(&self.device);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                debug!("Surface acquire timed out, skipping tick");
                return Ok(());
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                return Err(ContextError::OutOfMemory.into());
            }
        };

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("viewfinder frame encoder"),
            });

        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("viewfinder preview pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            // Nothing to sample before the first frame arrives; the pass
            // still runs so the drawable clears to black.
            if let Some(bind_group) = textures.bind_group() {
                let (dst_w, dst_h) = target.size();
                let viewport = match (self.options.preserve_aspect, textures.source_size()) {
                    (true, Some((src_w, src_h))) => aspect_fit(src_w, src_h, dst_w, dst_h),
                    _ => Viewport {
                        x: 0.0,
                        y: 0.0,
                        width: dst_w as f32,
                        height: dst_h as f32,
                    },
                };
                rpass.set_viewport(
                    viewport.x,
                    viewport.y,
                    viewport.width,
                    viewport.height,
                    0.0,
                    1.0,
                );
                rpass.set_pipeline(&shader.pipeline);
                rpass.set_bind_group(0, bind_group, &[]);
                geometry.bind(&mut rpass);
                rpass.draw_indexed(0..geometry.index_count(), 0, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();

        let frames = self.lifecycle.frame_presented();
        if frames.is_multiple_of(timing::FRAME_LOG_INTERVAL) {
            debug!(
                frames,
                dropped = self.bridge.dropped_frames(),
                "Preview frames presented"
            );
        }

        Ok(())
    }

    /// Release every GPU resource and stop rendering
    ///
    /// Idempotent; later render or resize calls become no-ops. Pending GPU
    /// work is drained before the resources drop.
    pub fn teardown(&mut self) {
        if !self.lifecycle.begin_teardown() {
            return;
        }

        if let Some(mut textures) = self.textures.take() {
            textures.release();
        }
        self.geometry = None;
        self.shader = None;
        self.target = None;
        self.device.poll(wgpu::Maintain::Wait);

        info!(
            frames = self.lifecycle.frame_count,
            dropped = self.bridge.dropped_frames(),
            "Preview renderer torn down"
        );
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_aspect_fit_pillarboxes_wide_target() {
        let vp = aspect_fit(640, 480, 800, 480);
        assert_eq!(vp.width, 640.0);
        assert_eq!(vp.height, 480.0);
        assert_eq!(vp.x, 80.0);
        assert_eq!(vp.y, 0.0);
    }

    #[test]
    fn test_aspect_fit_letterboxes_tall_target() {
        let vp = aspect_fit(640, 480, 640, 640);
        assert_eq!(vp.width, 640.0);
        assert_eq!(vp.height, 480.0);
        assert_eq!(vp.x, 0.0);
        assert_eq!(vp.y, 80.0);
    }

    #[test]
    fn test_aspect_fit_preserves_ratio() {
        let vp = aspect_fit(1920, 1080, 500, 500);
        let src_ratio = 1920.0 / 1080.0;
        let fit_ratio = vp.width / vp.height;
        assert!((src_ratio - fit_ratio).abs() < 1e-4);
        assert!(vp.width <= 500.0 && vp.height <= 500.0);
    }

    #[test]
    fn test_aspect_fit_zero_source_fills_target() {
        let vp = aspect_fit(0, 0, 800, 600);
        assert_eq!(vp.width, 800.0);
        assert_eq!(vp.height, 600.0);
    }

    #[test]
    fn test_clock_accumulates_intervals() {
        let t0 = Instant::now();
        let step = Duration::from_secs_f64(1.0 / 60.0);

        let mut clock = FrameClock::new();
        clock.start_at(t0);
        clock.tick_at(t0 + step);
        clock.tick_at(t0 + 2 * step);
        let elapsed = clock.tick_at(t0 + 3 * step);

        assert!((elapsed - 0.05).abs() < 1e-3, "elapsed was {}", elapsed);
    }

    #[test]
    fn test_clock_first_tick_measures_from_start() {
        let t0 = Instant::now();
        let mut clock = FrameClock::new();
        clock.start_at(t0);
        let elapsed = clock.tick_at(t0 + Duration::from_millis(100));
        assert!((elapsed - 0.1).abs() < 1e-3);
    }

    #[test]
    fn test_teardown_releases_exactly_once() {
        let mut lifecycle = Lifecycle::ready();
        assert!(lifecycle.begin_teardown(), "first teardown must release");
        assert!(!lifecycle.begin_teardown(), "second teardown must not");
        assert!(!lifecycle.begin_teardown());
        assert_eq!(lifecycle.state, RenderState::TornDown);
    }

    #[test]
    fn test_no_frame_after_teardown() {
        let mut lifecycle = Lifecycle::ready();
        lifecycle.begin_teardown();
        assert!(!lifecycle.begin_frame());
    }

    #[test]
    fn test_frame_gating_blocks_reentry() {
        let mut lifecycle = Lifecycle::ready();
        assert!(lifecycle.begin_frame());
        assert!(!lifecycle.begin_frame(), "a pass in flight blocks another");
        lifecycle.end_frame();
        assert!(lifecycle.begin_frame());
    }

    #[test]
    fn test_teardown_during_frame_sticks() {
        let mut lifecycle = Lifecycle::ready();
        assert!(lifecycle.begin_frame());
        assert!(lifecycle.begin_teardown());
        lifecycle.end_frame();
        assert_eq!(lifecycle.state, RenderState::TornDown);
        assert!(!lifecycle.begin_frame());
    }

    #[test]
    fn test_toggle_write_reaches_next_frame_uniforms() {
        let bridge = Arc::new(FrameBridge::new());
        let flag = Arc::new(AtomicBool::new(false));
        let handle = PreviewHandle::new(bridge, Arc::clone(&flag));

        // The render pass derives its uniforms from the same atomic the
        // handle writes, so a toggle is visible on the very next frame.
        handle.set_effect_enabled(true);
        let params = shader::EffectParams::new(0.25, flag.load(Ordering::Relaxed));
        assert_eq!(params.show_effect, 1.0);

        handle.set_effect_enabled(false);
        let params = shader::EffectParams::new(0.5, flag.load(Ordering::Relaxed));
        assert_eq!(params.show_effect, 0.0);
    }

    #[test]
    fn test_clock_reset_clears_time() {
        let t0 = Instant::now();
        let mut clock = FrameClock::new();
        clock.start_at(t0);
        clock.tick_at(t0 + Duration::from_secs(1));
        clock.reset();
        clock.start_at(t0);
        let elapsed = clock.tick_at(t0 + Duration::from_millis(16));
        assert!(elapsed < 0.1);
    }
}
