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

//! HTTP surface: conversion kickoff and status, range and growing-file
//! streaming, live remux, torrent control, health, and metrics.

pub mod http;
pub(crate) mod state;

#[cfg(test)]
mod test_support;

pub use http::router::{ApiDependencies, ApiServer};
