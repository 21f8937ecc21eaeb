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

//! Environment-driven configuration for the playready services.
//!
//! Layout: `model.rs` (typed settings), `loader.rs` (environment lookup),
//! `validate.rs` (parsing helpers), `defaults.rs` (fallback values).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use model::{
    AppConfig, ConversionConfig, LibraryConfig, LoggingSettings, PrewarmConfig, ServerConfig,
    TransmissionConfig,
};
pub use validate::env_flag_value;
