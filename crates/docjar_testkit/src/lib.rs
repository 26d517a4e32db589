//! # docjar Testkit
//!
//! Test utilities for docjar.
//!
//! This crate provides:
//! - Coordinator fixtures over an in-memory store
//! - Property-based test generators using proptest
//! - A fault-injecting store driver
//! - A minimal two-phase commit driver
//! - Tracing setup for tests
//!
//! ## Usage
//!
//! ```rust
//! use docjar_testkit::prelude::*;
//!
//! with_coordinator(|t| {
//!     let alice = person("alice");
//!     let reference = t.insert(&alice).unwrap();
//!     assert!(t.load(&reference).unwrap().same(&alice));
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod driver;
pub mod faults;
pub mod fixtures;
pub mod generators;
pub mod logging;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::driver::*;
    pub use crate::faults::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
}

pub use driver::*;
pub use faults::*;
pub use fixtures::*;
pub use generators::*;
pub use logging::*;
