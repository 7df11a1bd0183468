//! Common imports for typical usage.
pub use crate::{
    AbortHandle, AbortSignal, AssemblerOptions, BuildClient, BuildClientConfig, BuildError,
    ConsumeReport, HttpImageLoader, NoOverlay, Overlay, PreviewBuffer, PreviewSurface,
    ProgressLog, ProgressSink, StreamAssembler,
};
