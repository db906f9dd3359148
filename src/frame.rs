// SPDX-License-Identifier: GPL-3.0-only

//! Pixel buffer types shared between the capture and render timelines

use crate::errors::TextureError;
use std::sync::Arc;

/// Externally mapped pixel memory
///
/// Capture subsystems that hand out locked/mapped buffers implement this to
/// keep the mapping alive for as long as any frame references it. The slice
/// must stay valid for the lifetime of the implementor.
pub trait MappedMemory: Send + Sync {
    fn as_slice(&self) -> &[u8];
}

/// Frame data storage - either pre-copied bytes or a zero-copy mapped buffer
///
/// This enum allows frames to be passed around without copying the underlying
/// pixel data. The `Mapped` variant keeps an externally mapped capture buffer
/// alive through reference counting; cloning either variant only bumps a
/// refcount.
#[derive(Clone)]
pub enum FrameData {
    /// Pre-copied bytes (file sources, tests, synthetic frames)
    Copied(Arc<[u8]>),
    /// Zero-copy mapped capture buffer - no data copy, just reference counting
    Mapped(Arc<dyn MappedMemory>),
}

impl FrameData {
    /// Create FrameData from a mapped capture buffer (zero-copy)
    pub fn from_mapped<M: MappedMemory + 'static>(mapped: M) -> Self {
        FrameData::Mapped(Arc::new(mapped))
    }

    /// Get the length of the frame data in bytes
    pub fn len(&self) -> usize {
        match self {
            FrameData::Copied(data) => data.len(),
            FrameData::Mapped(buf) => buf.as_slice().len(),
        }
    }

    /// Check if the frame data is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for FrameData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameData::Copied(data) => write!(f, "FrameData::Copied({} bytes)", data.len()),
            FrameData::Mapped(buf) => {
                write!(f, "FrameData::Mapped({} bytes)", buf.as_slice().len())
            }
        }
    }
}

impl AsRef<[u8]> for FrameData {
    fn as_ref(&self) -> &[u8] {
        match self {
            FrameData::Copied(data) => data.as_ref(),
            FrameData::Mapped(buf) => buf.as_slice(),
        }
    }
}

impl std::ops::Deref for FrameData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_ref()
    }
}

impl From<Vec<u8>> for FrameData {
    fn from(data: Vec<u8>) -> Self {
        FrameData::Copied(Arc::from(data))
    }
}

/// Pixel interchange format of a delivered frame
///
/// BGRA8 is the fixed camera interchange format; RGBA8 is accepted for
/// sources that already deliver native RGBA. Both sample as RGBA on the GPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Bgra8,
    Rgba8,
}

impl PixelFormat {
    /// Bytes per pixel for this format
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            PixelFormat::Bgra8 | PixelFormat::Rgba8 => 4,
        }
    }

    /// The GPU texture format this frame uploads into
    pub fn texture_format(&self) -> wgpu::TextureFormat {
        match self {
            PixelFormat::Bgra8 => wgpu::TextureFormat::Bgra8Unorm,
            PixelFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PixelFormat::Bgra8 => write!(f, "BGRA8"),
            PixelFormat::Rgba8 => write!(f, "RGBA8"),
        }
    }
}

/// One delivered camera frame
///
/// Owned by the capture subsystem until published; after publication the
/// renderer consumes the pixel data in a single upload and never retains the
/// CPU-side memory beyond that call.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    /// Row stride in bytes, including any capture-side padding
    pub stride: u32,
    pub format: PixelFormat,
    pub data: FrameData,
}

impl PixelBuffer {
    /// Create a buffer with a tightly packed stride
    pub fn new(width: u32, height: u32, format: PixelFormat, data: impl Into<FrameData>) -> Self {
        Self {
            width,
            height,
            stride: width * format.bytes_per_pixel(),
            format,
            data: data.into(),
        }
    }

    /// Create a buffer with an explicit row stride
    pub fn with_stride(
        width: u32,
        height: u32,
        stride: u32,
        format: PixelFormat,
        data: impl Into<FrameData>,
    ) -> Self {
        Self {
            width,
            height,
            stride,
            format,
            data: data.into(),
        }
    }

    /// Bytes the backing slice must hold for this frame
    pub fn expected_len(&self) -> usize {
        self.stride as usize * self.height as usize
    }

    /// Check that dimensions, stride, and data length agree
    pub fn validate(&self) -> Result<(), TextureError> {
        if self.width == 0 || self.height == 0 {
            return Err(TextureError::ZeroSized {
                width: self.width,
                height: self.height,
            });
        }
        let min_stride = self.width * self.format.bytes_per_pixel();
        if self.stride < min_stride {
            return Err(TextureError::StrideTooSmall {
                stride: self.stride,
                min: min_stride,
            });
        }
        let expected = self.expected_len();
        if self.data.len() < expected {
            return Err(TextureError::DataTooShort {
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba_frame(width: u32, height: u32) -> PixelBuffer {
        let data = vec![0u8; (width * height * 4) as usize];
        PixelBuffer::new(width, height, PixelFormat::Rgba8, data)
    }

    #[test]
    fn test_packed_stride() {
        let frame = rgba_frame(640, 480);
        assert_eq!(frame.stride, 640 * 4);
        assert_eq!(frame.expected_len(), 640 * 480 * 4);
        assert!(frame.validate().is_ok());
    }

    #[test]
    fn test_padded_stride() {
        let stride = 640 * 4 + 64;
        let data = vec![0u8; stride as usize * 480];
        let frame = PixelBuffer::with_stride(640, 480, stride, PixelFormat::Bgra8, data);
        assert!(frame.validate().is_ok());
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let frame = PixelBuffer::new(0, 480, PixelFormat::Bgra8, vec![]);
        assert!(matches!(
            frame.validate(),
            Err(TextureError::ZeroSized { .. })
        ));
    }

    #[test]
    fn test_short_data_rejected() {
        let data = vec![0u8; 16];
        let frame = PixelBuffer::new(640, 480, PixelFormat::Bgra8, data);
        assert!(matches!(
            frame.validate(),
            Err(TextureError::DataTooShort { .. })
        ));
    }

    #[test]
    fn test_stride_below_row_rejected() {
        let data = vec![0u8; 640 * 480 * 4];
        let frame = PixelBuffer::with_stride(640, 480, 640, PixelFormat::Rgba8, data);
        assert!(matches!(
            frame.validate(),
            Err(TextureError::StrideTooSmall { .. })
        ));
    }

    #[test]
    fn test_mapped_data_is_refcounted() {
        struct FakeMapping(Vec<u8>);
        impl MappedMemory for FakeMapping {
            fn as_slice(&self) -> &[u8] {
                &self.0
            }
        }

        let data = FrameData::from_mapped(FakeMapping(vec![7u8; 64]));
        let clone = data.clone();
        assert_eq!(data.len(), 64);
        assert_eq!(clone.as_ref(), data.as_ref());
    }
}
