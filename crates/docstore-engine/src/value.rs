//! Deterministic serialization of indexed field values (§4.5): strings are
//! used as-is, numbers get a canonical sortable string, timestamps become
//! ISO-8601, object ids become hex, null/missing get a sentinel, booleans
//! become `"true"`/`"false"`, and anything else falls back to canonical
//! JSON. Grounded on `slate-engine/src/encoding/bson_value.rs`'s sortable
//! encoding, adapted to a string target since the index values here sit in
//! printable key bytes rather than raw sortable binary.

use bson::Bson;

/// Sentinel string for null or absent field values. Chosen to sort before
/// any canonical-JSON or identity-encoded string output (`" "` cannot
/// occur in a UTF-8 document field name or in serde_json's string output).
pub const NULL_SENTINEL: &str = "\u{0}null";

/// Encode an i64 so that lexicographic string ordering matches numeric
/// ordering: offset by `i64::MIN` so all values are non-negative, then
/// print as a fixed-width zero-padded decimal string.
fn canonical_i64(n: i64) -> String {
    let shifted = (n as i128) - (i64::MIN as i128);
    format!("{shifted:020}")
}

/// Same trick for f64, ordering by total order on the bit pattern (flip the
/// sign bit for positives, flip all bits for negatives) then rendering the
/// resulting u64 as a fixed-width hex string.
fn canonical_f64(f: f64) -> String {
    let bits = f.to_bits();
    let ordered = if bits & (1 << 63) != 0 {
        !bits
    } else {
        bits | (1 << 63)
    };
    format!("{ordered:016x}")
}

/// Serialize a single field value for use as an index key component (§4.5).
pub fn serialize_indexed_value(value: &Bson) -> String {
    match value {
        Bson::Null => NULL_SENTINEL.to_string(),
        Bson::String(s) => s.clone(),
        Bson::Boolean(b) => if *b { "true" } else { "false" }.to_string(),
        Bson::Int32(n) => canonical_i64(i64::from(*n)),
        Bson::Int64(n) => canonical_i64(*n),
        Bson::Double(f) => canonical_f64(*f),
        Bson::DateTime(dt) => dt
            .try_to_rfc3339_string()
            .unwrap_or_else(|_| canonical_i64(dt.timestamp_millis())),
        Bson::ObjectId(oid) => oid.to_hex(),
        other => canonical_json(other),
    }
}

fn canonical_json(value: &Bson) -> String {
    serde_json::to_value(value)
        .map(|v| v.to_string())
        .unwrap_or_default()
}

/// A type discriminant prefixed onto a serialized value before hashing it
/// into a record or index key, so that e.g. the string `"25"` and the
/// number `25` never collide.
pub fn type_discriminant(value: &Bson) -> u8 {
    match value {
        Bson::Null => 0,
        Bson::Boolean(_) => 1,
        Bson::Int32(_) | Bson::Int64(_) => 2,
        Bson::String(_) => 3,
        Bson::DateTime(_) => 4,
        Bson::ObjectId(_) => 5,
        Bson::Array(_) => 6,
        Bson::Document(_) => 7,
        Bson::Double(_) => 8,
        _ => 9,
    }
}

/// Encode a document's `_id` (or any scalar value standing in for one) into
/// an unambiguous byte string suitable as a key component: a type tag byte
/// followed by the serialized value's UTF-8 bytes.
pub fn encode_id(value: &Bson) -> Vec<u8> {
    let mut out = vec![type_discriminant(value)];
    out.extend_from_slice(serialize_indexed_value(value).as_bytes());
    out
}

/// Reverse of [`encode_id`] for the scalar id kinds the engine actually
/// stores (`_id` is never an array or document). Integers round-trip as
/// `Int64` and doubles as `Double` regardless of their original width —
/// downstream comparisons are numeric (§4.2) so this loses nothing callers
/// rely on.
pub fn decode_id(bytes: &[u8]) -> Option<Bson> {
    let (&tag, rest) = bytes.split_first()?;
    let s = std::str::from_utf8(rest).ok()?;
    Some(match tag {
        0 => Bson::Null,
        1 => Bson::Boolean(s == "true"),
        2 => Bson::Int64(decode_canonical_i64(s)?),
        3 => Bson::String(s.to_string()),
        4 => Bson::DateTime(bson::DateTime::parse_rfc3339_str(s).ok()?),
        5 => Bson::ObjectId(bson::oid::ObjectId::parse_str(s).ok()?),
        8 => Bson::Double(decode_canonical_f64(s)?),
        _ => return None,
    })
}

fn decode_canonical_i64(s: &str) -> Option<i64> {
    let shifted: i128 = s.parse().ok()?;
    i64::try_from(shifted + i64::MIN as i128).ok()
}

fn decode_canonical_f64(s: &str) -> Option<f64> {
    let ordered = u64::from_str_radix(s, 16).ok()?;
    let bits = if ordered & (1 << 63) != 0 {
        ordered & !(1 << 63)
    } else {
        !ordered
    };
    Some(f64::from_bits(bits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::oid::ObjectId;

    #[test]
    fn i64_ordering_is_preserved_as_strings() {
        let a = canonical_i64(-100);
        let b = canonical_i64(0);
        let c = canonical_i64(100);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn f64_ordering_is_preserved_as_strings() {
        let a = canonical_f64(-1.5);
        let b = canonical_f64(0.0);
        let c = canonical_f64(2.78);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn string_identity() {
        assert_eq!(serialize_indexed_value(&Bson::String("abc".into())), "abc");
    }

    #[test]
    fn booleans_become_literal_words() {
        assert_eq!(serialize_indexed_value(&Bson::Boolean(true)), "true");
        assert_eq!(serialize_indexed_value(&Bson::Boolean(false)), "false");
    }

    #[test]
    fn object_id_becomes_hex() {
        let oid = ObjectId::new();
        assert_eq!(serialize_indexed_value(&Bson::ObjectId(oid)), oid.to_hex());
    }

    #[test]
    fn null_uses_sentinel() {
        assert_eq!(serialize_indexed_value(&Bson::Null), NULL_SENTINEL);
    }

    #[test]
    fn different_types_have_distinct_ids() {
        let str_id = encode_id(&Bson::String("25".into()));
        let int_id = encode_id(&Bson::Int32(25));
        assert_ne!(str_id, int_id);
    }
}
