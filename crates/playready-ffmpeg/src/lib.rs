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

//! `ffmpeg`/`ffprobe` backed implementation of the media converter port.
//!
//! Layout: `args.rs` (command lines), `progress.rs` (`-progress` parsing),
//! `process.rs` (subprocess plumbing), `converter.rs` (the port implementation).

pub mod args;
pub mod converter;
pub mod process;
pub mod progress;

pub use converter::{FfmpegConverter, FfmpegSettings};
pub use progress::ProgressTracker;
