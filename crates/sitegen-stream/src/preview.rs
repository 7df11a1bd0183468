use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Surface showing the latest generated page.
///
/// Every call replaces the whole document; there is no patching.
pub trait PreviewSurface: Send + Sync {
    fn replace_content(&self, html: &str);
}

#[derive(Default)]
struct BufferState {
    html: Option<String>,
    replacements: usize,
}

/// In-memory preview holding only the latest snapshot. Cloning shares it.
#[derive(Clone, Default)]
pub struct PreviewBuffer {
    state: Arc<Mutex<BufferState>>,
}

impl PreviewBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest snapshot, if any update has arrived.
    pub fn html(&self) -> Option<String> {
        self.lock().html.clone()
    }

    /// How many times the content was replaced.
    pub fn replacements(&self) -> usize {
        self.lock().replacements
    }

    fn lock(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PreviewSurface for PreviewBuffer {
    fn replace_content(&self, html: &str) {
        let mut state = self.lock();
        state.html = Some(html.to_string());
        state.replacements += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_overwrites_previous_snapshot() {
        let preview = PreviewBuffer::new();
        assert_eq!(preview.html(), None);
        preview.replace_content("<p>one</p>");
        preview.clone().replace_content("<p>two</p>");
        assert_eq!(preview.html().as_deref(), Some("<p>two</p>"));
        assert_eq!(preview.replacements(), 2);
    }
}
