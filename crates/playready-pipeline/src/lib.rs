#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Playback-readiness pipeline: job tracking, artifact probing, conversion
//! orchestration, and background MP4 prewarming.

pub mod orchestrator;
pub mod prewarm;
pub mod readiness;
pub mod registry;

#[cfg(test)]
mod test_support;

pub use orchestrator::{ConversionOrchestrator, OrchestratorSettings};
pub use prewarm::{PrewarmSettings, Prewarmer};
pub use readiness::{HlsProbe, MP4_READY_MIN_BYTES, probe_hls, probe_mp4};
pub use registry::{JobRegistry, JobSnapshot};
