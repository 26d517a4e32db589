//! # docjar Core
//!
//! Transactional object-document coordination for docjar.
//!
//! The store below only guarantees atomic single-document writes. This
//! crate layers on top of it:
//!
//! - An identity map per transaction (one live object per reference)
//! - Deferred writes of changed objects, flushed before every read
//! - Optimistic conflict detection through per-document serials
//! - Compensating abort from pre-transaction snapshots
//! - Containers: dict-like, owner-scoped views over a collection
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use docjar_codec::doc;
//! use docjar_core::{ClassMapping, Container, Coordinator, PersistentObject, TransactionId, TransactionParticipant};
//! use docjar_store::InMemoryStore;
//!
//! let coordinator = Coordinator::new(Arc::new(InMemoryStore::new()));
//! let people = Container::builder(&coordinator, "people").all_items().build();
//!
//! let alice = PersistentObject::new(ClassMapping::new("Person", "people"), doc! { "name" => "Alice" });
//! people.set(Some("alice"), &alice).unwrap();
//! assert_eq!(people.keys().unwrap(), vec!["alice".to_string()]);
//!
//! alice.set("name", "Alice B.").unwrap();
//! let tx = TransactionId::new(1);
//! coordinator.commit(tx).unwrap();
//! coordinator.tpc_finish(tx).unwrap();
//! ```
//!
//! ## Limitations
//!
//! Abort replays snapshots. It is exact only if no other transaction
//! wrote the same documents between their first touch and the abort.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collection;
mod config;
mod error;
mod mapping;
mod object;
mod root;
mod transaction;
mod types;

pub use collection::{
    Container, ContainerBuilder, ContainerKind, FlushingCollection, Owner, DEFAULT_MAPPING_KEY,
    DEFAULT_PARENT_KEY, FOREIGN_OWNER_PREFIX,
};
pub use config::CoordinatorConfig;
pub use error::{ConflictError, CoreError, CoreResult};
pub use mapping::{DocumentMapper, StateReader, StateWriter};
pub use object::{
    AttributeValue, ClassMapping, Getter, LazyAttribute, ObjectBuilder, Parent, PersistentObject,
    Resolution, Setter,
};
pub use root::Root;
pub use transaction::{
    Coordinator, CoordinatorBuilder, JoinHook, TransactionParticipant, WeakCoordinator,
    SORT_KEY_NAME,
};
pub use types::{Serial, SortKey, TransactionId};
