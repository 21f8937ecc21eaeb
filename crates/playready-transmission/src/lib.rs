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

//! Transmission JSON-RPC transport and download-backend adapter.

pub mod backend;
pub mod client;

pub use backend::TransmissionBackend;
pub use client::{REQUEST_TIMEOUT, SESSION_HEADER, TransmissionClient};
