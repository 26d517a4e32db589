//! Property-based test generators using proptest.
//!
//! Provides strategies for documents and for sequences of coordinator
//! operations.

use docjar_codec::{Document, DocumentId, Value};
use proptest::prelude::*;

/// Strategy for generating document ids.
pub fn document_id_strategy() -> impl Strategy<Value = DocumentId> {
    prop::array::uniform16(any::<u8>()).prop_map(DocumentId::from_bytes)
}

/// Strategy for generating field names that never clash with reserved
/// fields (`_id`, `_serial`, container keys).
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("f[a-z0-9]{0,7}").expect("Invalid regex")
}

/// Strategy for generating container keys.
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9-]{0,11}").expect("Invalid regex")
}

/// Strategy for generating scalar field values.
pub fn scalar_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        "[a-zA-Z0-9 ]{0,16}".prop_map(Value::Text),
        prop::collection::vec(any::<u8>(), 0..16).prop_map(Value::Bytes),
    ]
}

/// Strategy for generating flat object states.
pub fn state_strategy() -> impl Strategy<Value = Document> {
    prop::collection::vec((field_name_strategy(), scalar_value_strategy()), 0..6)
        .prop_map(|fields| fields.into_iter().collect())
}

/// One step of a transaction, as applied by a property test.
///
/// Indices pick among the objects alive at the time of the step, wrapping
/// around; steps on an empty pool are skipped.
#[derive(Debug, Clone)]
pub enum TransactionOp {
    /// Insert a new object with this state.
    Insert(Document),
    /// Set one field of an object.
    Set(usize, String, Value),
    /// Remove an object.
    Remove(usize),
    /// Flush registered objects.
    Flush,
}

/// Strategy for generating a single transaction step.
pub fn transaction_op_strategy() -> impl Strategy<Value = TransactionOp> {
    prop_oneof![
        2 => state_strategy().prop_map(TransactionOp::Insert),
        4 => (any::<usize>(), field_name_strategy(), scalar_value_strategy())
            .prop_map(|(i, field, value)| TransactionOp::Set(i, field, value)),
        1 => any::<usize>().prop_map(TransactionOp::Remove),
        2 => Just(TransactionOp::Flush),
    ]
}

/// Strategy for generating a transaction of up to `max_len` steps.
pub fn transaction_strategy(max_len: usize) -> impl Strategy<Value = Vec<TransactionOp>> {
    prop::collection::vec(transaction_op_strategy(), 0..max_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn field_names_avoid_reserved_fields(name in field_name_strategy()) {
            prop_assert!(!name.starts_with('_'));
            prop_assert_ne!(name.as_str(), "key");
            prop_assert_ne!(name.as_str(), "parent");
        }

        #[test]
        fn states_carry_no_id(state in state_strategy()) {
            prop_assert!(state.id().is_none());
        }
    }
}
