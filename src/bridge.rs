// SPDX-License-Identifier: GPL-3.0-only

//! Latest-wins frame hand-off between the capture and render timelines
//!
//! The capture subsystem delivers frames on arbitrary threads; the renderer
//! consumes them once per display refresh. The two rates are independent, so
//! the bridge holds exactly one pending frame and a newer delivery replaces
//! an undrawn one. Dropping frames under a camera-faster-than-display load
//! is the intended freshness policy, not an error; nothing here ever blocks
//! the capture side on the render side or vice versa.

use crate::constants::timing;
use crate::frame::PixelBuffer;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::debug;

/// Single-slot mailbox holding the most recently delivered frame
pub struct FrameBridge {
    slot: Mutex<Option<PixelBuffer>>,
    published: AtomicU64,
    dropped: AtomicU64,
}

impl FrameBridge {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            published: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Replace the pending slot with `buffer`, discarding any undrawn frame
    ///
    /// Called from the capture timeline; returns immediately.
    pub fn publish(&self, buffer: PixelBuffer) {
        if let Ok(mut slot) = self.slot.lock() {
            if slot.replace(buffer).is_some() {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped.is_multiple_of(timing::DROP_LOG_INTERVAL) {
                    debug!(dropped, "Undrawn frames replaced before rendering");
                }
            }
        }
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    /// Remove and return the pending frame, leaving the slot empty
    ///
    /// Called from the render timeline once per refresh tick.
    pub fn take_latest(&self) -> Option<PixelBuffer> {
        self.slot.lock().ok().and_then(|mut slot| slot.take())
    }

    /// Total frames published since creation
    pub fn published_frames(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Frames that were superseded before being drawn
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for FrameBridge {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable handle for the capture and UI timelines
///
/// This is the only object those timelines touch; it never reaches GPU
/// state. Frame delivery callbacks forward to [`PreviewHandle::publish`] and
/// return, and the effect toggle takes effect on the next render pass
/// (last write wins; a one-frame-stale read is fine, a torn read cannot
/// happen).
#[derive(Clone)]
pub struct PreviewHandle {
    bridge: Arc<FrameBridge>,
    effect_enabled: Arc<AtomicBool>,
}

impl PreviewHandle {
    pub(crate) fn new(bridge: Arc<FrameBridge>, effect_enabled: Arc<AtomicBool>) -> Self {
        Self {
            bridge,
            effect_enabled,
        }
    }

    /// Forward one delivered frame to the renderer
    pub fn publish(&self, buffer: PixelBuffer) {
        self.bridge.publish(buffer);
    }

    /// Toggle the fragment-shader effect for subsequent frames
    pub fn set_effect_enabled(&self, enabled: bool) {
        self.effect_enabled.store(enabled, Ordering::Relaxed);
    }

    /// Current state of the effect toggle
    pub fn effect_enabled(&self) -> bool {
        self.effect_enabled.load(Ordering::Relaxed)
    }

    /// Frames that were superseded before being drawn
    pub fn dropped_frames(&self) -> u64 {
        self.bridge.dropped_frames()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PixelFormat;

    fn tagged_frame(tag: u8) -> PixelBuffer {
        PixelBuffer::new(1, 1, PixelFormat::Rgba8, vec![tag, 0, 0, 255])
    }

    fn tag_of(buffer: &PixelBuffer) -> u8 {
        buffer.data[0]
    }

    #[test]
    fn test_take_from_empty_slot() {
        let bridge = FrameBridge::new();
        assert!(bridge.take_latest().is_none());
    }

    #[test]
    fn test_latest_publish_wins() {
        let bridge = FrameBridge::new();
        bridge.publish(tagged_frame(1));
        bridge.publish(tagged_frame(2));
        bridge.publish(tagged_frame(3));

        let taken = bridge.take_latest().expect("slot should hold a frame");
        assert_eq!(tag_of(&taken), 3);
        assert!(bridge.take_latest().is_none(), "take must empty the slot");
        assert_eq!(bridge.dropped_frames(), 2);
        assert_eq!(bridge.published_frames(), 3);
    }

    #[test]
    fn test_publish_after_take() {
        let bridge = FrameBridge::new();
        bridge.publish(tagged_frame(1));
        assert_eq!(tag_of(&bridge.take_latest().unwrap()), 1);
        bridge.publish(tagged_frame(2));
        assert_eq!(tag_of(&bridge.take_latest().unwrap()), 2);
        assert_eq!(bridge.dropped_frames(), 0);
    }

    #[test]
    fn test_handle_effect_toggle() {
        let bridge = Arc::new(FrameBridge::new());
        let flag = Arc::new(AtomicBool::new(false));
        let handle = PreviewHandle::new(bridge, flag.clone());

        assert!(!handle.effect_enabled());
        handle.set_effect_enabled(true);
        assert!(flag.load(Ordering::Relaxed));
        handle.set_effect_enabled(false);
        assert!(!handle.effect_enabled());
    }
}
