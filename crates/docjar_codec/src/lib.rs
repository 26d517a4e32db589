//! # docjar Codec
//!
//! Document value model and canonical CBOR encoding for docjar.
//!
//! Every stored document is a [`Document`]: a string-keyed map of
//! [`Value`]s. Documents are persisted as canonical CBOR, so that:
//! - Identical documents produce identical bytes
//! - Field order never depends on how a document was built
//!
//! ## Canonical CBOR Rules
//!
//! - Map keys are text, sorted length-first then bytewise
//! - Integers use shortest encoding
//! - No floats
//! - No indefinite-length items
//! - Document ids use tag 37 (binary UUID)
//! - References to other documents use a private tag over
//!   `[database, collection, id]`
//!
//! ## Usage
//!
//! ```
//! use docjar_codec::{decode_document, doc, encode_document, DocumentId};
//!
//! let d = doc! { "_id" => DocumentId::new(), "name" => "first" };
//! let bytes = encode_document(&d).unwrap();
//! assert_eq!(decode_document(&bytes).unwrap(), d);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod document;
mod encoder;
mod error;
mod id;
mod value;

pub use decoder::{decode_document, from_cbor, CanonicalDecoder};
pub use document::{Document, ID_FIELD};
pub use encoder::{
    encode_document, to_canonical_cbor, CanonicalEncoder, TAG_DOCUMENT_REF, TAG_UUID,
};
pub use error::{CodecError, CodecResult};
pub use id::{DocumentId, DocumentRef};
pub use value::Value;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use proptest::prelude::*;

    fn arb_scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Integer),
            prop::collection::vec(any::<u8>(), 0..32).prop_map(Value::Bytes),
            "[a-zA-Z0-9 ]{0,16}".prop_map(Value::Text),
            any::<[u8; 16]>().prop_map(|b| Value::Id(DocumentId::from_bytes(b))),
            ("[a-z]{1,6}", "[a-z]{1,6}", any::<[u8; 16]>()).prop_map(|(db, c, b)| {
                Value::Ref(DocumentRef::new(db, c, DocumentId::from_bytes(b)))
            }),
        ]
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        arb_scalar().prop_recursive(3, 32, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                prop::collection::vec(("[a-z_]{1,8}", inner), 0..6)
                    .prop_map(|fields| Value::Document(fields.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn any_value_survives_encoding(value in arb_value()) {
            let bytes = to_canonical_cbor(&value).unwrap();
            prop_assert_eq!(from_cbor(&bytes).unwrap(), value);
        }

        #[test]
        fn encoding_is_deterministic(value in arb_value()) {
            prop_assert_eq!(to_canonical_cbor(&value).unwrap(), to_canonical_cbor(&value).unwrap());
        }
    }

    #[test]
    fn ref_inside_document_keeps_all_parts() {
        let target = DocumentRef::new("other_db", "folders", DocumentId::new());
        let d = doc! { "parent" => target.clone() };
        let decoded = decode_document(&encode_document(&d).unwrap()).unwrap();
        assert_eq!(decoded.get("parent").and_then(Value::as_reference), Some(&target));
    }
}
