//! Client-side assembler for the site generator's streaming build endpoint.
//!
//! The backend answers a build request with Server-Sent-Events frames. The
//! [`StreamAssembler`] decodes them incrementally and drives two outputs: an
//! ordered progress log grouped per build, and a preview surface that is
//! replaced wholesale on every HTML snapshot. Image loads are serialized
//! against later updates through a single-slot [`ImageBarrier`].
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use sitegen_stream::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), BuildError> {
//! let client = BuildClient::from_env()?;
//! let loader = HttpImageLoader::new(client.config().base_url.clone(), Duration::from_secs(30))?;
//! let preview = PreviewBuffer::new();
//! let log = ProgressLog::new(Arc::new(loader));
//! let assembler = StreamAssembler::new(Arc::new(preview.clone()), Arc::new(log.clone()));
//!
//! let (_abort, signal) = AbortHandle::pair();
//! client
//!     .build_page(&assembler, &NoOverlay, "A landing page for a bakery", signal)
//!     .await?;
//!
//! println!("{}", preview.html().unwrap_or_default());
//! # Ok(())
//! # }
//! ```

/// Stream assembler, cancellation handles and run report.
pub mod assembler;
/// Single-slot image ordering barrier.
pub mod barrier;
/// HTTP client for the build endpoint.
pub mod client;
/// Build client configuration.
pub mod config;
/// Error taxonomy.
pub mod errors;
/// Decoded stream events.
pub mod event;
/// Image loading.
pub mod image;
/// Progress log sink and in-memory log.
pub mod progress;
/// Logging initialization.
pub mod observability;
/// Busy overlay and its scoped guard.
pub mod overlay;
/// Common imports.
pub mod prelude;
/// Preview surface and in-memory preview.
pub mod preview;
/// SSE framing and payload decoding.
pub mod transport;

pub use assembler::{
    AbortHandle, AbortSignal, AssemblerOptions, AssemblerState, ConsumeReport, StreamAssembler,
};
pub use barrier::ImageBarrier;
pub use client::{BuildClient, ByteStream};
pub use config::BuildClientConfig;
pub use errors::{BuildError, FrameParseError, ImageLoadError};
pub use event::StreamEvent;
pub use image::{HttpImageLoader, ImageLoader};
pub use progress::{ImageLoad, ImageStatus, LogEntry, MessageGroup, ProgressLog, ProgressSink};
pub use observability::init_observability;
pub use overlay::{NoOverlay, Overlay, OverlayGuard};
pub use preview::{PreviewBuffer, PreviewSurface};
