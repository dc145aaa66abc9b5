//! Value equality and ordering (§4.2). Equality is structural and
//! recursive; ordering is only defined within a kind's own comparable set
//! (numbers, strings, datetimes) — comparing across sets returns `None`.
//! Object ids compare by byte order, but only for sort tie-breaks, not
//! through the ordered filter operators.

use std::cmp::Ordering;

use bson::Bson;

pub fn values_equal(a: &Bson, b: &Bson) -> bool {
    match (a, b) {
        (Bson::Null, Bson::Null) => true,
        (Bson::Boolean(a), Bson::Boolean(b)) => a == b,
        (Bson::String(a), Bson::String(b)) => a == b,
        (Bson::ObjectId(a), Bson::ObjectId(b)) => a == b,
        (Bson::DateTime(a), Bson::DateTime(b)) => a == b,
        (a, b) if is_number(a) && is_number(b) => as_f64(a) == as_f64(b),
        (Bson::Array(a), Bson::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| values_equal(x, y))
        }
        (Bson::Document(a), Bson::Document(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|bv| values_equal(v, bv)))
        }
        _ => false,
    }
}

fn is_number(v: &Bson) -> bool {
    matches!(v, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_))
}

fn as_f64(v: &Bson) -> f64 {
    match v {
        Bson::Int32(n) => *n as f64,
        Bson::Int64(n) => *n as f64,
        Bson::Double(n) => *n,
        _ => unreachable!("as_f64 called on non-number"),
    }
}

/// Order two values, or `None` if they are not in the same comparable set.
pub fn compare_values(a: &Bson, b: &Bson) -> Option<Ordering> {
    match (a, b) {
        (a, b) if is_number(a) && is_number(b) => as_f64(a).partial_cmp(&as_f64(b)),
        (Bson::String(a), Bson::String(b)) => Some(a.cmp(b)),
        (Bson::DateTime(a), Bson::DateTime(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Total order used for sort tie-breaking across any BSON kinds,
/// including object ids (by byte order) — not exposed through the
/// ordered filter operators, only through the sort stage (§4.6).
pub fn compare_for_sort(a: &Bson, b: &Bson) -> Ordering {
    if let Some(ord) = compare_values(a, b) {
        return ord;
    }
    match (a, b) {
        (Bson::ObjectId(a), Bson::ObjectId(b)) => a.bytes().cmp(&b.bytes()),
        (Bson::Boolean(a), Bson::Boolean(b)) => a.cmp(b),
        (Bson::Null, Bson::Null) => Ordering::Equal,
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(v: &Bson) -> u8 {
    match v {
        Bson::Null => 0,
        Bson::Boolean(_) => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => 2,
        Bson::String(_) => 3,
        Bson::DateTime(_) => 4,
        Bson::ObjectId(_) => 5,
        Bson::Array(_) => 6,
        Bson::Document(_) => 7,
        _ => 8,
    }
}
