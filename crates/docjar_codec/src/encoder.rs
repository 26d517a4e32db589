//! Canonical CBOR encoder.

use crate::document::Document;
use crate::error::CodecResult;
use crate::id::{DocumentId, DocumentRef};
use crate::value::Value;

/// CBOR tag for binary UUIDs (RFC 9562 registration).
pub const TAG_UUID: u64 = 37;

/// Private CBOR tag wrapping a `[database, collection, id]` reference.
pub const TAG_DOCUMENT_REF: u64 = 40_100;

/// Encode a value to canonical CBOR bytes.
///
/// This function produces deterministic output following the canonical
/// CBOR rules specified in RFC 8949 Section 4.2.1:
/// - Map keys are sorted by their encoded form (length-first, then bytewise)
/// - Integers use the shortest possible encoding
/// - No indefinite-length encoding
///
/// # Errors
///
/// Returns an error if the value cannot be encoded.
pub fn to_canonical_cbor(value: &Value) -> CodecResult<Vec<u8>> {
    let mut encoder = CanonicalEncoder::new();
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}

/// Encode a document to canonical CBOR bytes.
///
/// # Errors
///
/// Returns an error if the document cannot be encoded.
pub fn encode_document(document: &Document) -> CodecResult<Vec<u8>> {
    let mut encoder = CanonicalEncoder::new();
    encoder.encode_document(document)?;
    Ok(encoder.into_bytes())
}

/// A canonical CBOR encoder.
///
/// This encoder produces deterministic CBOR output suitable for
/// storing documents and comparing them bytewise.
pub struct CanonicalEncoder {
    buffer: Vec<u8>,
}

impl CanonicalEncoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Create a new encoder with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Encode a value.
    pub fn encode(&mut self, value: &Value) -> CodecResult<()> {
        match value {
            Value::Null => self.encode_null(),
            Value::Bool(b) => self.encode_bool(*b),
            Value::Integer(n) => self.encode_integer(*n),
            Value::Bytes(b) => self.encode_bytes(b),
            Value::Text(s) => self.encode_text(s),
            Value::Id(id) => self.encode_id(*id),
            Value::Ref(r) => self.encode_reference(r),
            Value::Array(arr) => return self.encode_array(arr),
            Value::Document(doc) => return self.encode_document(doc),
        }
        Ok(())
    }

    /// Encode a document as a CBOR map with text keys.
    pub fn encode_document(&mut self, document: &Document) -> CodecResult<()> {
        // Documents already hold their keys in canonical order, which for
        // text keys is exactly the order of their encoded form.
        self.encode_unsigned(5, document.len() as u64);
        for (key, value) in document.iter() {
            self.encode_text(key);
            self.encode(value)?;
        }
        Ok(())
    }

    /// Consume this encoder and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Get a reference to the encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    fn encode_null(&mut self) {
        self.buffer.push(0xf6);
    }

    fn encode_bool(&mut self, b: bool) {
        self.buffer.push(if b { 0xf5 } else { 0xf4 });
    }

    #[allow(clippy::cast_sign_loss)]
    fn encode_integer(&mut self, n: i64) {
        if n >= 0 {
            self.encode_unsigned(0, n as u64);
        } else {
            // CBOR negative integers encode -(n+1)
            let abs_minus_one = (-(n + 1)) as u64;
            self.encode_unsigned(1, abs_minus_one);
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn encode_unsigned(&mut self, major_type: u8, value: u64) {
        let mt = major_type << 5;

        if value < 24 {
            self.buffer.push(mt | (value as u8));
        } else if u8::try_from(value).is_ok() {
            self.buffer.push(mt | 24);
            self.buffer.push(value as u8);
        } else if u16::try_from(value).is_ok() {
            self.buffer.push(mt | 25);
            self.buffer.extend_from_slice(&(value as u16).to_be_bytes());
        } else if u32::try_from(value).is_ok() {
            self.buffer.push(mt | 26);
            self.buffer.extend_from_slice(&(value as u32).to_be_bytes());
        } else {
            self.buffer.push(mt | 27);
            self.buffer.extend_from_slice(&value.to_be_bytes());
        }
    }

    fn encode_bytes(&mut self, bytes: &[u8]) {
        self.encode_unsigned(2, bytes.len() as u64);
        self.buffer.extend_from_slice(bytes);
    }

    fn encode_text(&mut self, text: &str) {
        self.encode_unsigned(3, text.len() as u64);
        self.buffer.extend_from_slice(text.as_bytes());
    }

    fn encode_id(&mut self, id: DocumentId) {
        self.encode_unsigned(6, TAG_UUID);
        self.encode_bytes(id.as_bytes());
    }

    fn encode_reference(&mut self, reference: &DocumentRef) {
        self.encode_unsigned(6, TAG_DOCUMENT_REF);
        self.encode_unsigned(4, 3);
        self.encode_text(reference.database());
        self.encode_text(reference.collection());
        self.encode_id(reference.id());
    }

    fn encode_array(&mut self, arr: &[Value]) -> CodecResult<()> {
        self.encode_unsigned(4, arr.len() as u64);
        for item in arr {
            self.encode(item)?;
        }
        Ok(())
    }
}

impl Default for CanonicalEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn encode_null_and_bool() {
        assert_eq!(to_canonical_cbor(&Value::Null).unwrap(), vec![0xf6]);
        assert_eq!(to_canonical_cbor(&Value::Bool(false)).unwrap(), vec![0xf4]);
        assert_eq!(to_canonical_cbor(&Value::Bool(true)).unwrap(), vec![0xf5]);
    }

    #[test]
    fn encode_integers_use_shortest_form() {
        assert_eq!(to_canonical_cbor(&Value::Integer(23)).unwrap(), vec![0x17]);
        assert_eq!(
            to_canonical_cbor(&Value::Integer(24)).unwrap(),
            vec![0x18, 24]
        );
        assert_eq!(
            to_canonical_cbor(&Value::Integer(256)).unwrap(),
            vec![0x19, 0x01, 0x00]
        );
        assert_eq!(
            to_canonical_cbor(&Value::Integer(65536)).unwrap(),
            vec![0x1a, 0x00, 0x01, 0x00, 0x00]
        );
    }

    #[test]
    fn encode_negative_integers() {
        assert_eq!(to_canonical_cbor(&Value::Integer(-1)).unwrap(), vec![0x20]);
        assert_eq!(
            to_canonical_cbor(&Value::Integer(-100)).unwrap(),
            vec![0x38, 99]
        );
    }

    #[test]
    fn encode_text_and_bytes() {
        assert_eq!(
            to_canonical_cbor(&Value::Text("a".to_string())).unwrap(),
            vec![0x61, b'a']
        );
        assert_eq!(
            to_canonical_cbor(&Value::Bytes(vec![1, 2, 3])).unwrap(),
            vec![0x43, 1, 2, 3]
        );
    }

    #[test]
    fn encode_id_is_tagged_uuid() {
        let id = DocumentId::from_bytes([7; 16]);
        let bytes = to_canonical_cbor(&Value::Id(id)).unwrap();
        // tag 37 (0xd8 0x25), then a 16-byte string (0x50)
        assert_eq!(&bytes[..3], &[0xd8, 0x25, 0x50]);
        assert_eq!(&bytes[3..], &[7; 16]);
    }

    #[test]
    fn encode_reference_is_tagged_triple() {
        let r = DocumentRef::new("d", "c", DocumentId::from_bytes([0; 16]));
        let bytes = to_canonical_cbor(&Value::Ref(r)).unwrap();
        // tag header (0xd9 + two bytes), then array(3)
        assert_eq!(bytes[0], 0xd9);
        assert_eq!(bytes[3], 0x83);
        assert_eq!(&bytes[4..6], &[0x61, b'd']);
        assert_eq!(&bytes[6..8], &[0x61, b'c']);
    }

    #[test]
    fn encode_document_sorted() {
        let d = doc! { "bb" => 2i64, "a" => 1i64 };
        let bytes = encode_document(&d).unwrap();
        assert_eq!(bytes, vec![0xa2, 0x61, b'a', 0x01, 0x62, b'b', b'b', 0x02]);
    }

    #[test]
    fn deterministic_encoding() {
        let d1 = doc! { "z" => 1i64, "a" => 2i64 };
        let d2 = doc! { "a" => 2i64, "z" => 1i64 };
        assert_eq!(encode_document(&d1).unwrap(), encode_document(&d2).unwrap());
    }
}
