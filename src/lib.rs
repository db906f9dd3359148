// SPDX-License-Identifier: GPL-3.0-only

//! Live camera preview renderer
//!
//! Turns a stream of CPU-side camera frames into a shaded quad presented on
//! a window surface every display refresh. The embedding application owns
//! the capture pipeline and the display loop; this crate owns everything in
//! between: the latest-wins frame bridge, the GPU context, the preview
//! shader pipeline, and the per-frame texture upload.
//!
//! Typical wiring:
//!
//! 1. Create a [`Renderer`] against the window with [`Renderer::attach`].
//! 2. Hand the [`PreviewHandle`] from [`Renderer::handle`] to the capture
//!    callback; it publishes each frame with [`PreviewHandle::publish`].
//! 3. Call [`Renderer::render_frame`] once per refresh tick.
//! 4. Call [`Renderer::teardown`] (or drop the renderer) when the preview
//!    closes.

pub mod bridge;
pub mod constants;
pub mod errors;
pub mod frame;
pub mod render;

pub use bridge::{FrameBridge, PreviewHandle};
pub use errors::{
    ContextError, PreviewError, PreviewResult, ShaderError, ShaderStageKind, TextureError,
};
pub use frame::{FrameData, MappedMemory, PixelBuffer, PixelFormat};
pub use render::shader::{EffectParams, ShaderSources};
pub use render::{Renderer, RendererOptions, SurfaceSize, Viewport, aspect_fit};
