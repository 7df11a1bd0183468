//! Terminal-backed collaborators for the assembler.
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use sitegen_stream::{
    ImageLoad, ImageLoadError, ImageLoader, Overlay, PreviewSurface, ProgressLog, ProgressSink,
};

/// Progress log that also prints each entry as it arrives.
pub struct TerminalLog {
    inner: ProgressLog,
    quiet: bool,
}

impl TerminalLog {
    pub fn new(loader: Arc<dyn ImageLoader>, quiet: bool) -> Self {
        Self {
            inner: ProgressLog::new(loader),
            quiet,
        }
    }

    pub fn log(&self) -> &ProgressLog {
        &self.inner
    }

    fn print(&self, line: &str) {
        if !self.quiet {
            let mut out = std::io::stdout().lock();
            let _ = writeln!(out, "{line}");
        }
    }
}

impl ProgressSink for TerminalLog {
    fn start_group(&self) {
        self.inner.start_group();
        self.print("──────── new build ────────");
    }

    fn append_line(&self, text: &str) {
        self.inner.append_line(text);
        self.print(&format!("  {text}"));
    }

    fn append_image(&self, description: &str, url: &str) -> ImageLoad {
        self.print(&format!("  [image] {description} <{url}>"));
        self.inner.append_image(description, url)
    }

    fn image_failed(&self, error: &ImageLoadError) {
        self.inner.image_failed(error);
    }
}

/// Preview that rewrites an HTML file on every snapshot.
///
/// Each write goes to a sibling temp file that is then renamed over the
/// target, so a browser reloading the file never sees half a document.
pub struct FilePreview {
    path: PathBuf,
    written: AtomicUsize,
}

impl FilePreview {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            written: AtomicUsize::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshots that reached the file.
    pub fn snapshots_written(&self) -> usize {
        self.written.load(Ordering::Relaxed)
    }

    fn write(&self, html: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".partial");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, html)?;
        std::fs::rename(&tmp, &self.path)
    }
}

impl PreviewSurface for FilePreview {
    fn replace_content(&self, html: &str) {
        match self.write(html) {
            Ok(()) => {
                self.written.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "failed to write preview");
            }
        }
    }
}

/// Status lines on stderr standing in for the progress overlay.
pub struct TerminalOverlay {
    quiet: bool,
}

impl TerminalOverlay {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl Overlay for TerminalOverlay {
    fn show(&self) {
        if !self.quiet {
            eprintln!("⏳ building page...");
        }
    }

    fn hide(&self) {
        if !self.quiet {
            eprintln!("⏹  build finished");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoImages;

    #[async_trait::async_trait]
    impl ImageLoader for NoImages {
        async fn load(&self, _url: &str) -> Result<(), ImageLoadError> {
            Ok(())
        }
    }

    #[test]
    fn file_preview_replaces_whole_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let preview = FilePreview::new(dir.path().join("nested").join("page.html"));
        preview.replace_content("<html><body>first</body></html>");
        preview.replace_content("<p>second</p>");
        let written = std::fs::read_to_string(preview.path()).expect("read");
        assert_eq!(written, "<p>second</p>");
        assert_eq!(preview.snapshots_written(), 2);
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("nested"))
            .expect("dir")
            .filter_map(Result::ok)
            .collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn failed_writes_are_not_counted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").expect("write");
        let preview = FilePreview::new(blocker.join("page.html"));
        preview.replace_content("<p>lost</p>");
        assert_eq!(preview.snapshots_written(), 0);
    }

    #[tokio::test]
    async fn terminal_log_keeps_entries_in_groups() {
        let log = TerminalLog::new(Arc::new(NoImages), true);
        log.start_group();
        log.append_line("🎯 Analyzing requirements...");
        log.append_image("hero", "/mnt/media_storage/generated/hero.png")
            .await
            .expect("loaded");
        let groups = log.log().groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].entries.len(), 2);
        assert_eq!(groups[0].lines(), vec!["🎯 Analyzing requirements..."]);
    }
}
