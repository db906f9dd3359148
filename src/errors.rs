// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the preview renderer
//!
//! Startup errors (context, surface, shader) are fatal: the component cannot
//! function without them and nothing here retries them. Per-frame texture
//! errors are recoverable and only ever skip a single frame.

use std::fmt;

/// Result type alias using PreviewError
pub type PreviewResult<T> = Result<T, PreviewError>;

/// Top-level error type for the preview renderer
#[derive(Debug)]
pub enum PreviewError {
    /// GPU context / surface setup errors
    Context(ContextError),
    /// Shader compilation, linking, or interface errors
    Shader(ShaderError),
    /// Per-frame texture binding errors
    Texture(TextureError),
}

/// GPU context and surface errors
#[derive(Debug)]
pub enum ContextError {
    /// No suitable GPU adapter was found
    AdapterNotFound,
    /// Device creation failed
    DeviceRequest(String),
    /// Surface creation from the drawable failed
    SurfaceCreation(String),
    /// The surface cannot be configured against the selected adapter
    SurfaceConfig(String),
    /// The GPU ran out of memory while presenting
    OutOfMemory,
}

/// Shader stage identifier used in diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStageKind {
    Vertex,
    Fragment,
}

/// Shader compilation and linking errors
#[derive(Debug)]
pub enum ShaderError {
    /// A shader source asset could not be read
    AssetRead { name: String, reason: String },
    /// A stage failed to compile; `log` carries the compiler diagnostic
    Compile { stage: ShaderStageKind, log: String },
    /// The stages compiled but could not be linked into a pipeline
    Link { log: String },
    /// A stage is missing its entry point
    MissingEntryPoint {
        stage: ShaderStageKind,
        name: &'static str,
    },
    /// The vertex stage is missing a required attribute input
    MissingAttribute { name: &'static str, location: u32 },
    /// The fragment stage is missing a required resource binding
    MissingBinding {
        name: &'static str,
        group: u32,
        binding: u32,
    },
}

/// Per-frame texture binding errors (recoverable: skip the frame)
#[derive(Debug)]
pub enum TextureError {
    /// The frame has a zero dimension
    ZeroSized { width: u32, height: u32 },
    /// The row stride is smaller than one row of pixels
    StrideTooSmall { stride: u32, min: u32 },
    /// The backing slice is shorter than stride * height
    DataTooShort { expected: usize, actual: usize },
}

impl fmt::Display for PreviewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreviewError::Context(e) => write!(f, "Context error: {}", e),
            PreviewError::Shader(e) => write!(f, "Shader error: {}", e),
            PreviewError::Texture(e) => write!(f, "Texture error: {}", e),
        }
    }
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextError::AdapterNotFound => write!(f, "No suitable GPU adapter found"),
            ContextError::DeviceRequest(msg) => write!(f, "Device creation failed: {}", msg),
            ContextError::SurfaceCreation(msg) => write!(f, "Surface creation failed: {}", msg),
            ContextError::SurfaceConfig(msg) => write!(f, "Surface configuration failed: {}", msg),
            ContextError::OutOfMemory => write!(f, "GPU out of memory"),
        }
    }
}

impl fmt::Display for ShaderStageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStageKind::Vertex => write!(f, "vertex"),
            ShaderStageKind::Fragment => write!(f, "fragment"),
        }
    }
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::AssetRead { name, reason } => {
                write!(f, "Cannot read shader asset '{}': {}", name, reason)
            }
            ShaderError::Compile { stage, log } => {
                write!(f, "{} shader failed to compile:\n{}", stage, log)
            }
            ShaderError::Link { log } => write!(f, "Shader program failed to link: {}", log),
            ShaderError::MissingEntryPoint { stage, name } => {
                write!(f, "{} shader has no entry point '{}'", stage, name)
            }
            ShaderError::MissingAttribute { name, location } => {
                write!(
                    f,
                    "Vertex shader is missing attribute '{}' at location {}",
                    name, location
                )
            }
            ShaderError::MissingBinding {
                name,
                group,
                binding,
            } => {
                write!(
                    f,
                    "Fragment shader is missing binding '{}' at group {} binding {}",
                    name, group, binding
                )
            }
        }
    }
}

impl fmt::Display for TextureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextureError::ZeroSized { width, height } => {
                write!(f, "Frame has zero dimension ({}x{})", width, height)
            }
            TextureError::StrideTooSmall { stride, min } => {
                write!(f, "Row stride {} is below the minimum {}", stride, min)
            }
            TextureError::DataTooShort { expected, actual } => {
                write!(
                    f,
                    "Frame data is {} bytes, expected at least {}",
                    actual, expected
                )
            }
        }
    }
}

impl std::error::Error for PreviewError {}
impl std::error::Error for ContextError {}
impl std::error::Error for ShaderError {}
impl std::error::Error for TextureError {}

impl From<ContextError> for PreviewError {
    fn from(err: ContextError) -> Self {
        PreviewError::Context(err)
    }
}

impl From<ShaderError> for PreviewError {
    fn from(err: ShaderError) -> Self {
        PreviewError::Shader(err)
    }
}

impl From<TextureError> for PreviewError {
    fn from(err: TextureError) -> Self {
        PreviewError::Texture(err)
    }
}
