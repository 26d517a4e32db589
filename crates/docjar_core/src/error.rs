//! Error types for docjar core.

use crate::types::Serial;
use docjar_codec::DocumentRef;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// A stored document changed since this transaction last saw it.
///
/// Surfaced to the transaction driver, which must abort and may retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "database conflict error (oid {reference}, class {type_name}, \
     start serial {start_serial}, current serial {current_serial})"
)]
pub struct ConflictError {
    /// The conflicting document.
    pub reference: DocumentRef,
    /// The type name of the in-memory object.
    pub type_name: String,
    /// The serial the object was loaded or last written with.
    pub start_serial: Serial,
    /// The serial currently in the store.
    pub current_serial: Serial,
}

/// Errors that can occur in docjar core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Store driver error.
    #[error("store error: {0}")]
    Store(#[from] docjar_store::StoreError),

    /// Document codec error.
    #[error("codec error: {0}")]
    Codec(#[from] docjar_codec::CodecError),

    /// Optimistic concurrency check failed.
    #[error(transparent)]
    Conflict(#[from] Box<ConflictError>),

    /// A lookup matched nothing.
    #[error("not found: {what}")]
    NotFound {
        /// What was looked up.
        what: String,
    },

    /// Insert was called on an object that already has a reference.
    #[error("object is already stored as {reference}")]
    AlreadyStored {
        /// The reference the object carries.
        reference: DocumentRef,
    },

    /// The operation needs a stored object but got a transient one.
    #[error("object of type {type_name} is not stored")]
    NotStored {
        /// Type name of the transient object.
        type_name: String,
    },

    /// A container key is already bound to a different object.
    #[error("key {key:?} is already bound to another object")]
    DuplicateKey {
        /// The colliding key.
        key: String,
    },

    /// A container key is empty or not text.
    #[error("invalid key: {message}")]
    InvalidKey {
        /// Why the key was rejected.
        message: String,
    },

    /// Historical states are not kept.
    #[error("no history is kept for {reference}")]
    UnsupportedHistory {
        /// The object whose history was requested.
        reference: DocumentRef,
    },

    /// An object, container or coordinator is not in a usable state.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of the state problem.
        message: String,
    },

    /// Operation not permitted for this object.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a conflict error.
    pub fn conflict(
        reference: DocumentRef,
        type_name: impl Into<String>,
        start_serial: Serial,
        current_serial: Serial,
    ) -> Self {
        Self::Conflict(Box::new(ConflictError {
            reference,
            type_name: type_name.into(),
            start_serial,
            current_serial,
        }))
    }

    /// Creates a not found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Creates a not stored error.
    pub fn not_stored(type_name: impl Into<String>) -> Self {
        Self::NotStored {
            type_name: type_name.into(),
        }
    }

    /// Creates a duplicate key error.
    pub fn duplicate_key(key: impl Into<String>) -> Self {
        Self::DuplicateKey { key: key.into() }
    }

    /// Creates an invalid key error.
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Creates an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns the conflict details if this is a conflict.
    #[must_use]
    pub fn as_conflict(&self) -> Option<&ConflictError> {
        match self {
            Self::Conflict(conflict) => Some(conflict),
            _ => None,
        }
    }

    /// Returns true if this is a conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docjar_codec::DocumentId;

    #[test]
    fn conflict_message() {
        let reference = DocumentRef::new("db", "things", DocumentId::from_bytes([0; 16]));
        let err = CoreError::conflict(reference, "Thing", Serial::new(1), Serial::new(2));
        assert!(err.is_conflict());
        assert_eq!(
            err.to_string(),
            "database conflict error (oid DocumentRef(things, \
             00000000-0000-0000-0000-000000000000, db), class Thing, \
             start serial 1, current serial 2)"
        );
        let conflict = err.as_conflict().unwrap();
        assert_eq!(conflict.start_serial, Serial::new(1));
        assert_eq!(conflict.current_serial, Serial::new(2));
    }

    #[test]
    fn store_errors_convert() {
        let err: CoreError = docjar_store::StoreError::unavailable("down").into();
        assert!(matches!(err, CoreError::Store(_)));
        assert!(!err.is_conflict());
    }
}
