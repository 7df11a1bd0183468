/// Busy indicator shown while a build runs.
pub trait Overlay: Send + Sync {
    fn show(&self);
    fn hide(&self);
}

/// Shows an overlay on creation and hides it exactly once when dropped.
///
/// Hold one for the whole build so every exit path, including `?` returns and
/// cancellation, releases the overlay.
#[must_use = "the overlay is hidden as soon as the guard is dropped"]
pub struct OverlayGuard<'a> {
    overlay: &'a dyn Overlay,
}

impl<'a> OverlayGuard<'a> {
    pub fn acquire(overlay: &'a dyn Overlay) -> Self {
        overlay.show();
        Self { overlay }
    }
}

impl Drop for OverlayGuard<'_> {
    fn drop(&mut self) {
        self.overlay.hide();
    }
}

/// Overlay that does nothing, for headless callers.
pub struct NoOverlay;

impl Overlay for NoOverlay {
    fn show(&self) {}
    fn hide(&self) {}
}
