//! # apsdk Testkit
//!
//! Test utilities for apsdk.
//!
//! This crate provides:
//! - An in-memory platform simulator implementing `Transport`
//! - Platform fixtures wired to the simulator
//! - Property-based test generators using proptest
//! - Tracing setup for tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use apsdk_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn saves_player() {
//!     init_tracing();
//!     let (mock, platform) = mock_platform();
//!     // ... entity operations against `platform`
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod mock;

use tracing_subscriber::EnvFilter;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::init_tracing;
    pub use crate::mock::*;
}

pub use fixtures::*;
pub use generators::*;
pub use mock::*;

/// Installs a test subscriber that honours `RUST_LOG` and defaults to
/// `info`. Safe to call from every test.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
