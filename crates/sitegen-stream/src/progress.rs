use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::BoxFuture;

use crate::errors::ImageLoadError;
use crate::image::ImageLoader;

/// Future returned by [`ProgressSink::append_image`]; resolves when the image
/// has loaded or failed.
pub type ImageLoad = BoxFuture<'static, Result<(), ImageLoadError>>;

/// Destination for progress output of a build.
pub trait ProgressSink: Send + Sync {
    /// Starts a new, empty message group. Later entries go into it.
    fn start_group(&self);
    /// Appends a text line to the current group.
    fn append_line(&self, text: &str);
    /// Appends an image to the current group and starts loading it.
    fn append_image(&self, description: &str, url: &str) -> ImageLoad;
    /// Called once an image is known to have failed, including loads the
    /// caller gave up on (a timeout drops the load future).
    fn image_failed(&self, _error: &ImageLoadError) {}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageStatus {
    Loading,
    Loaded,
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogEntry {
    Text(String),
    Image {
        description: String,
        url: String,
        status: ImageStatus,
    },
}

/// Entries belonging to one build submission.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageGroup {
    pub entries: Vec<LogEntry>,
}

impl MessageGroup {
    /// Text lines of the group in order, images skipped.
    pub fn lines(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|entry| match entry {
                LogEntry::Text(text) => Some(text.as_str()),
                LogEntry::Image { .. } => None,
            })
            .collect()
    }
}

/// In-memory progress log. Cloning shares the same log.
#[derive(Clone)]
pub struct ProgressLog {
    groups: Arc<Mutex<Vec<MessageGroup>>>,
    loader: Arc<dyn ImageLoader>,
}

impl ProgressLog {
    pub fn new(loader: Arc<dyn ImageLoader>) -> Self {
        Self {
            groups: Arc::new(Mutex::new(Vec::new())),
            loader,
        }
    }

    /// Snapshot of every group.
    pub fn groups(&self) -> Vec<MessageGroup> {
        self.lock().clone()
    }

    /// Snapshot of the group that receives new entries.
    pub fn current_group(&self) -> Option<MessageGroup> {
        self.lock().last().cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<MessageGroup>> {
        self.groups.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, entry: LogEntry) -> (usize, usize) {
        let mut groups = self.lock();
        if groups.is_empty() {
            groups.push(MessageGroup::default());
        }
        let group_idx = groups.len() - 1;
        let group = &mut groups[group_idx];
        group.entries.push(entry);
        (group_idx, group.entries.len() - 1)
    }
}

impl ProgressSink for ProgressLog {
    fn start_group(&self) {
        self.lock().push(MessageGroup::default());
    }

    fn append_line(&self, text: &str) {
        self.push(LogEntry::Text(text.to_string()));
    }

    fn append_image(&self, description: &str, url: &str) -> ImageLoad {
        let (group, entry) = self.push(LogEntry::Image {
            description: description.to_string(),
            url: url.to_string(),
            status: ImageStatus::Loading,
        });
        let loader = self.loader.clone();
        let url = url.to_string();
        let mut mark = StatusMark {
            groups: self.groups.clone(),
            group,
            entry,
            settled: false,
        };
        Box::pin(async move {
            let result = loader.load(&url).await;
            mark.settle(match &result {
                Ok(()) => ImageStatus::Loaded,
                Err(err) => ImageStatus::Failed(err.to_string()),
            });
            result
        })
    }

    fn image_failed(&self, error: &ImageLoadError) {
        let mut groups = self.lock();
        let status = groups
            .iter_mut()
            .rev()
            .flat_map(|group| group.entries.iter_mut().rev())
            .find_map(|entry| match entry {
                LogEntry::Image { url, status, .. } if url.as_str() == error.url() => Some(status),
                _ => None,
            });
        if let Some(status) = status {
            *status = ImageStatus::Failed(error.to_string());
        }
    }
}

/// Updates an image entry's status; marks it failed if the load future is
/// dropped before settling.
struct StatusMark {
    groups: Arc<Mutex<Vec<MessageGroup>>>,
    group: usize,
    entry: usize,
    settled: bool,
}

impl StatusMark {
    fn settle(&mut self, status: ImageStatus) {
        self.settled = true;
        let mut groups = self.groups.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(LogEntry::Image { status: slot, .. }) = groups
            .get_mut(self.group)
            .and_then(|g| g.entries.get_mut(self.entry))
        {
            *slot = status;
        }
    }
}

impl Drop for StatusMark {
    fn drop(&mut self) {
        if !self.settled {
            self.settle(ImageStatus::Failed("load abandoned".into()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ok200;

    #[async_trait::async_trait]
    impl ImageLoader for Ok200 {
        async fn load(&self, _url: &str) -> Result<(), ImageLoadError> {
            Ok(())
        }
    }

    struct Broken;

    #[async_trait::async_trait]
    impl ImageLoader for Broken {
        async fn load(&self, url: &str) -> Result<(), ImageLoadError> {
            Err(ImageLoadError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }

    #[test]
    fn lines_go_to_latest_group() {
        let log = ProgressLog::new(Arc::new(Ok200));
        log.append_line("before any group");
        log.start_group();
        log.append_line("a");
        log.append_line("b");
        let groups = log.groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].lines(), vec!["before any group"]);
        assert_eq!(groups[1].lines(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn image_status_follows_load_result() {
        let log = ProgressLog::new(Arc::new(Ok200));
        log.start_group();
        let load = log.append_image("hero", "/a.png");
        assert!(matches!(
            &log.current_group().expect("group").entries[0],
            LogEntry::Image { status: ImageStatus::Loading, .. }
        ));
        load.await.expect("loaded");
        assert!(matches!(
            &log.current_group().expect("group").entries[0],
            LogEntry::Image { status: ImageStatus::Loaded, .. }
        ));

        let broken = ProgressLog::new(Arc::new(Broken));
        let err = broken.append_image("x", "/x.png").await.expect_err("fails");
        assert!(matches!(err, ImageLoadError::Status { status: 404, .. }));
        assert!(matches!(
            &broken.current_group().expect("group").entries[0],
            LogEntry::Image { status: ImageStatus::Failed(_), .. }
        ));
    }

    #[test]
    fn reported_failure_replaces_abandoned_status() {
        let log = ProgressLog::new(Arc::new(Ok200));
        let _first = log.append_image("first", "/a.png");
        drop(log.append_image("slow", "/slow.png"));
        log.image_failed(&ImageLoadError::TimedOut {
            url: "/slow.png".into(),
            after: std::time::Duration::from_secs(30),
        });
        let group = log.current_group().expect("group");
        assert!(matches!(
            &group.entries[1],
            LogEntry::Image { status: ImageStatus::Failed(reason), .. } if reason.contains("timed out")
        ));
        assert!(matches!(
            &group.entries[0],
            LogEntry::Image { status: ImageStatus::Loading, .. }
        ));
    }

    #[test]
    fn dropped_load_marks_image_failed() {
        let log = ProgressLog::new(Arc::new(Ok200));
        drop(log.append_image("x", "/x.png"));
        assert!(matches!(
            &log.current_group().expect("group").entries[0],
            LogEntry::Image { status: ImageStatus::Failed(reason), .. } if reason == "load abandoned"
        ));
    }
}
