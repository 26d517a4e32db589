//! Core type definitions for docjar.

use docjar_codec::Value;
use std::fmt;

/// Unique identifier for a transaction, as handed out by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Creates a new transaction ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

/// Version token of a stored object.
///
/// Every successful write stores a serial one greater than the last.
/// `ZERO` means "never stored"; the first stored version is `INITIAL`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Serial(pub u64);

impl Serial {
    /// The serial of an object that was never stored.
    pub const ZERO: Serial = Serial(0);

    /// The serial written by the first insert.
    pub const INITIAL: Serial = Serial(1);

    /// Creates a serial.
    #[must_use]
    pub const fn new(serial: u64) -> Self {
        Self(serial)
    }

    /// Returns the raw serial value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next serial.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Reads a serial stored in a document field. Anything that is not a
    /// non-negative integer reads as `ZERO`.
    #[must_use]
    pub fn from_value(value: Option<&Value>) -> Self {
        value
            .and_then(Value::as_integer)
            .and_then(|n| u64::try_from(n).ok())
            .map_or(Self::ZERO, Self)
    }

    /// The value stored in a document field.
    #[must_use]
    pub fn to_value(self) -> Value {
        Value::Integer(i64::try_from(self.0).unwrap_or(i64::MAX))
    }
}

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Orders transaction participants relative to each other.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SortKey {
    name: String,
    ordinal: u64,
}

impl SortKey {
    /// Creates a sort key.
    pub fn new(name: impl Into<String>, ordinal: u64) -> Self {
        Self {
            name: name.into(),
            ordinal,
        }
    }

    /// The participant name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The ordinal among participants with the same name.
    #[must_use]
    pub const fn ordinal(&self) -> u64 {
        self.ordinal
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.name, self.ordinal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_id_ordering() {
        assert!(TransactionId::new(1) < TransactionId::new(2));
        assert_eq!(format!("{}", TransactionId::new(7)), "txn:7");
    }

    #[test]
    fn serial_next() {
        assert_eq!(Serial::ZERO.next(), Serial::INITIAL);
        assert_eq!(Serial::new(5).next().as_u64(), 6);
    }

    #[test]
    fn serial_field_values() {
        assert_eq!(Serial::from_value(Some(&Value::Integer(3))), Serial::new(3));
        assert_eq!(Serial::from_value(Some(&Value::Integer(-1))), Serial::ZERO);
        assert_eq!(Serial::from_value(Some(&Value::from("3"))), Serial::ZERO);
        assert_eq!(Serial::from_value(None), Serial::ZERO);
        assert_eq!(Serial::new(4).to_value(), Value::Integer(4));
    }

    #[test]
    fn sort_key_orders_by_name_then_ordinal() {
        assert!(SortKey::new("a", 5) < SortKey::new("b", 0));
        assert!(SortKey::new("a", 0) < SortKey::new("a", 1));
        assert_eq!(SortKey::new("DocumentCoordinator", 0).to_string(), "(DocumentCoordinator, 0)");
    }
}
