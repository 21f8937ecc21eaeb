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

//! Filesystem media library and the growing-file reader.

pub mod catalog;
pub mod follow;

pub use catalog::FsCatalog;
pub use follow::{DEFAULT_POLL_INTERVAL, FollowError, FollowOptions, GrowingFileReader};
