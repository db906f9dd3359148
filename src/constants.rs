// SPDX-License-Identifier: GPL-3.0-only

//! Crate-wide constants

/// Shader interface names and slots
///
/// The renderer resolves these against the compiled shader modules at
/// startup; a missing member is a fatal error.
pub mod shader_interface {
    /// Vertex stage entry point
    pub const VERTEX_ENTRY_POINT: &str = "vs_main";

    /// Fragment stage entry point
    pub const FRAGMENT_ENTRY_POINT: &str = "fs_main";

    /// Vertex attribute location for the quad position (vec3)
    pub const POSITION_LOCATION: u32 = 0;

    /// Vertex attribute location for the texture coordinate (vec2)
    pub const TEX_COORD_LOCATION: u32 = 1;

    /// Bind group used by the preview pipeline
    pub const PREVIEW_BIND_GROUP: u32 = 0;

    /// Binding slot for the frame texture
    pub const FRAME_TEXTURE_BINDING: u32 = 0;

    /// Binding slot for the frame sampler
    pub const FRAME_SAMPLER_BINDING: u32 = 1;

    /// Binding slot for the time/effect uniform block
    pub const EFFECT_PARAMS_BINDING: u32 = 2;
}

/// Timing constants
pub mod timing {
    /// Frame counter modulo for periodic render-loop logging
    pub const FRAME_LOG_INTERVAL: u64 = 30;

    /// Dropped-frame counter modulo for periodic mailbox logging
    pub const DROP_LOG_INTERVAL: u64 = 60;
}
