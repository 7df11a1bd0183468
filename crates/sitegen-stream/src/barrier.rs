use std::time::Duration;

use crate::errors::ImageLoadError;
use crate::progress::ImageLoad;

struct PendingImage {
    url: String,
    load: ImageLoad,
}

/// Single-slot ordering barrier for image loads.
///
/// At most one load is outstanding. `install` waits for the previous load
/// before taking its place, and `wait` drains the slot, so anything rendered
/// after a `wait` cannot overtake an image requested earlier.
pub struct ImageBarrier {
    pending: Option<PendingImage>,
    timeout: Duration,
}

impl ImageBarrier {
    pub fn new(timeout: Duration) -> Self {
        Self {
            pending: None,
            timeout,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Awaits the outstanding load, if any, and returns its outcome.
    ///
    /// A load that exceeds the timeout resolves as `ImageLoadError::TimedOut`.
    pub async fn wait(&mut self) -> Option<Result<(), ImageLoadError>> {
        let PendingImage { url, load } = self.pending.take()?;
        let outcome = match tokio::time::timeout(self.timeout, load).await {
            Ok(result) => result,
            Err(_) => Err(ImageLoadError::TimedOut {
                url,
                after: self.timeout,
            }),
        };
        Some(outcome)
    }

    /// Waits for the previous load, then makes `load` the outstanding one.
    ///
    /// Returns the outcome of the load that was replaced.
    pub async fn install(
        &mut self,
        url: impl Into<String>,
        load: ImageLoad,
    ) -> Option<Result<(), ImageLoadError>> {
        let previous = self.wait().await;
        self.pending = Some(PendingImage {
            url: url.into(),
            load,
        });
        previous
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn delayed(order: Arc<Mutex<Vec<&'static str>>>, name: &'static str, ms: u64) -> ImageLoad {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            order.lock().expect("order").push(name);
            Ok::<(), ImageLoadError>(())
        })
    }

    #[tokio::test(start_paused = true)]
    async fn install_waits_for_previous_load() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut barrier = ImageBarrier::new(Duration::from_secs(5));
        assert!(barrier.install("a", delayed(order.clone(), "a", 50)).await.is_none());
        let previous = barrier.install("b", delayed(order.clone(), "b", 10)).await;
        assert_eq!(previous, Some(Ok(())));
        assert_eq!(*order.lock().expect("order"), vec!["a"]);
        assert!(barrier.is_pending());
        assert_eq!(barrier.wait().await, Some(Ok(())));
        assert_eq!(*order.lock().expect("order"), vec!["a", "b"]);
        assert!(barrier.wait().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_load_times_out() {
        let mut barrier = ImageBarrier::new(Duration::from_millis(100));
        barrier
            .install("slow.png", Box::pin(futures::future::pending::<Result<(), ImageLoadError>>()))
            .await;
        let outcome = barrier.wait().await.expect("outcome");
        assert_eq!(
            outcome,
            Err(ImageLoadError::TimedOut {
                url: "slow.png".into(),
                after: Duration::from_millis(100)
            })
        );
        assert!(!barrier.is_pending());
    }
}
