//! # docjar Store
//!
//! Document store driver contract and the in-memory driver for docjar.
//!
//! A store holds whole documents per collection and guarantees only that
//! a single-document write is atomic. Everything transactional lives
//! above this layer, in `docjar_core`.
//!
//! ## Design Principles
//!
//! - Drivers are blocking and take `&self`; they must be `Send + Sync`
//! - Queries are simple conjunctions of per-field conditions
//! - Drivers know nothing about serials, snapshots or containers
//!
//! ## Available Drivers
//!
//! - [`InMemoryStore`] - For testing and embedding
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use docjar_codec::doc;
//! use docjar_store::{CollectionHandle, Filter, InMemoryStore, Namespace};
//!
//! let handle = CollectionHandle::new(Arc::new(InMemoryStore::new()), Namespace::new("app", "people"));
//! handle.insert(doc! { "name" => "one" }).unwrap();
//! assert_eq!(handle.count(&Filter::new().eq("name", "one")).unwrap(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod filter;
mod memory;
mod namespace;

pub use backend::{CollectionHandle, DocumentStore};
pub use error::{StoreError, StoreResult};
pub use filter::{Condition, Filter, Projection};
pub use memory::InMemoryStore;
pub use namespace::Namespace;
