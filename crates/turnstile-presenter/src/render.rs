//! Badge rendering collaborator.
//!
//! Turning an encoded payload into a scannable image is comparatively
//! expensive and entirely a UI concern, so it lives behind this seam. The
//! presenter guarantees the renderer is invoked at most once per rotation
//! window and never concurrently with itself.

/// A rendered badge ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedBadge {
    /// Window the badge encodes; lets the UI discard stale renders.
    pub window_start: u64,
    /// Opaque image bytes in whatever format the renderer produces.
    pub image: Vec<u8>,
}

/// Renders an encoded payload string into displayable image bytes.
///
/// Implementations may be CPU-heavy; the presenter offloads calls to a
/// blocking worker and never lets two renders overlap.
pub trait BadgeRenderer: Send + Sync + 'static {
    /// Render the encoded payload.
    fn render(&self, encoded: &str) -> Vec<u8>;
}
