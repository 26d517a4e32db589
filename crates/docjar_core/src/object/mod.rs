//! Persistent objects and the contained-object mix-in.
//!
//! A [`PersistentObject`] pairs a document-shaped state with the
//! bookkeeping the coordinator needs: its reference, serial, changed
//! and ghost flags. Objects placed in containers also carry a lazily
//! resolved name and parent ([`LazyAttribute`]).

mod contained;
mod persistent;

pub use contained::{AttributeValue, Getter, LazyAttribute, Parent, Resolution, Setter};
pub use persistent::{ClassMapping, ObjectBuilder, PersistentObject};
