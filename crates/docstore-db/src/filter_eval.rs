//! Filter tree evaluation (§4.3). Grounded on
//! `slate-db/src/exec.rs`'s `matches_group`/`matches_node`/`matches_filter`
//! recursion style, adapted from flat `Record.fields` lookups to dotted
//! `bson::Document` path resolution with array fan-out.

use bson::Bson;

use docstore_query::{ElemMatchExpr, FieldCondition, FieldOp, FilterExpr, TypeTag};

use crate::compare::{compare_values, values_equal};
use crate::path::{resolve_path, Resolved};

pub fn matches(expr: &FilterExpr, doc: &bson::Document) -> bool {
    match expr {
        FilterExpr::And(children) => children.iter().all(|c| matches(c, doc)),
        FilterExpr::Or(children) => children.iter().any(|c| matches(c, doc)),
        FilterExpr::Nor(children) => !children.iter().any(|c| matches(c, doc)),
        FilterExpr::Not(inner) => !matches(inner, doc),
        FilterExpr::Field(cond) => matches_field(cond, doc),
    }
}

fn matches_field(cond: &FieldCondition, doc: &bson::Document) -> bool {
    let resolved = resolve_path(doc, &cond.path);
    cond.ops.iter().all(|op| matches_op(op, &resolved))
}

/// A resolved path yields zero, one, or many candidate values (array
/// fan-out). An operator matches the field if it matches any one of them,
/// matching how Mongo-style filters treat an array field as "matches if
/// any element matches" for most operators.
fn matches_op(op: &FieldOp, resolved: &Resolved<'_>) -> bool {
    match resolved {
        Resolved::Absent => matches_absent(op),
        Resolved::Value(v) => matches_value(op, v),
        Resolved::Many(vs) => vs.iter().any(|v| matches_value(op, v)),
    }
}

fn matches_absent(op: &FieldOp) -> bool {
    match op {
        FieldOp::Exists(expected) => !expected,
        FieldOp::Eq(Bson::Null) => true,
        FieldOp::Ne(v) => !matches!(v, Bson::Null),
        FieldOp::Nin(vs) => !vs.iter().any(|v| matches!(v, Bson::Null)),
        FieldOp::In(vs) => vs.iter().any(|v| matches!(v, Bson::Null)),
        _ => false,
    }
}

fn matches_value(op: &FieldOp, value: &Bson) -> bool {
    match op {
        FieldOp::Eq(literal) => eq_with_array_contains(value, literal),
        FieldOp::Ne(literal) => !eq_with_array_contains(value, literal),
        FieldOp::Gt(literal) => compare_values(value, literal) == Some(std::cmp::Ordering::Greater),
        FieldOp::Gte(literal) => matches!(
            compare_values(value, literal),
            Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
        ),
        FieldOp::Lt(literal) => compare_values(value, literal) == Some(std::cmp::Ordering::Less),
        FieldOp::Lte(literal) => matches!(
            compare_values(value, literal),
            Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
        ),
        FieldOp::In(options) => options.iter().any(|o| eq_with_array_contains(value, o)),
        FieldOp::Nin(options) => !options.iter().any(|o| eq_with_array_contains(value, o)),
        FieldOp::Exists(expected) => *expected,
        FieldOp::Type(tag) => tag.matches(value),
        FieldOp::Size(n) => match value {
            Bson::Array(items) => items.len() as i64 == *n,
            _ => false,
        },
        FieldOp::All(required) => match value {
            Bson::Array(items) => required
                .iter()
                .all(|r| items.iter().any(|v| values_equal(v, r))),
            _ => false,
        },
        FieldOp::ElemMatch(inner) => match value {
            Bson::Array(items) => items.iter().any(|item| elem_matches(inner, item)),
            _ => false,
        },
    }
}

/// Whether a single value matches an `$elemMatch`-shaped expression: either
/// operators applied directly to the value, or a sub-filter applied to it
/// as a document. Shared with `$pull`, which accepts the same dual shape
/// for its mapping argument (§4.4).
pub fn elem_matches(expr: &ElemMatchExpr, item: &Bson) -> bool {
    match expr {
        ElemMatchExpr::Value(ops) => {
            let resolved = Resolved::Value(item);
            ops.iter().all(|op| matches_op(op, &resolved))
        }
        ElemMatchExpr::Doc(filter) => match item.as_document() {
            Some(sub) => matches(filter, sub),
            None => false,
        },
    }
}

/// `$eq`/`$ne`/membership comparisons: if the document's value is an array
/// and the literal is not, match if any array element equals the literal
/// (the implicit array-contains rewrite); otherwise plain structural
/// equality.
fn eq_with_array_contains(value: &Bson, literal: &Bson) -> bool {
    match (value, literal) {
        (Bson::Array(items), Bson::Array(_)) => values_equal(value, literal) || {
            items.iter().any(|v| values_equal(v, literal))
        },
        (Bson::Array(items), _) => items.iter().any(|v| values_equal(v, literal)),
        _ => values_equal(value, literal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docstore_query::parse_filter;

    fn eval(filter_doc: bson::Document, target: bson::Document) -> bool {
        let expr = parse_filter(&filter_doc).unwrap();
        matches(&expr, &target)
    }

    #[test]
    fn implicit_eq_matches_scalar() {
        assert!(eval(doc! { "status": "active" }, doc! { "status": "active" }));
        assert!(!eval(doc! { "status": "active" }, doc! { "status": "inactive" }));
    }

    #[test]
    fn implicit_eq_against_array_is_contains() {
        assert!(eval(doc! { "tags": "rust" }, doc! { "tags": ["rust", "db"] }));
    }

    #[test]
    fn exists_false_matches_missing_field() {
        assert!(eval(doc! { "x": { "$exists": false } }, doc! { "y": 1 }));
        assert!(!eval(doc! { "x": { "$exists": false } }, doc! { "x": 1 }));
    }

    #[test]
    fn range_operators_compare_numbers() {
        assert!(eval(doc! { "age": { "$gt": 20, "$lte": 30 } }, doc! { "age": 25 }));
        assert!(!eval(doc! { "age": { "$gt": 20, "$lte": 30 } }, doc! { "age": 31 }));
    }

    #[test]
    fn in_matches_any_listed_value() {
        assert!(eval(doc! { "status": { "$in": ["a", "b"] } }, doc! { "status": "b" }));
        assert!(!eval(doc! { "status": { "$in": ["a", "b"] } }, doc! { "status": "c" }));
    }

    #[test]
    fn size_checks_array_length() {
        assert!(eval(doc! { "tags": { "$size": 2 } }, doc! { "tags": ["a", "b"] }));
        assert!(!eval(doc! { "tags": { "$size": 2 } }, doc! { "tags": ["a"] }));
    }

    #[test]
    fn all_requires_every_listed_element() {
        assert!(eval(
            doc! { "tags": { "$all": ["a", "b"] } },
            doc! { "tags": ["a", "b", "c"] }
        ));
        assert!(!eval(
            doc! { "tags": { "$all": ["a", "z"] } },
            doc! { "tags": ["a", "b"] }
        ));
    }

    #[test]
    fn elem_match_doc_form_checks_each_element() {
        assert!(eval(
            doc! { "items": { "$elemMatch": { "sku": "A", "qty": { "$gt": 1 } } } },
            doc! { "items": [ { "sku": "A", "qty": 5 }, { "sku": "B", "qty": 0 } ] }
        ));
        assert!(!eval(
            doc! { "items": { "$elemMatch": { "sku": "A", "qty": { "$gt": 10 } } } },
            doc! { "items": [ { "sku": "A", "qty": 5 } ] }
        ));
    }

    #[test]
    fn elem_match_value_form_checks_scalars() {
        assert!(eval(
            doc! { "scores": { "$elemMatch": { "$gt": 90 } } },
            doc! { "scores": [50, 95] }
        ));
    }

    #[test]
    fn nested_path_fan_out_over_documents() {
        assert!(eval(
            doc! { "items.sku": "A" },
            doc! { "items": [ { "sku": "A" }, { "sku": "B" } ] }
        ));
    }

    #[test]
    fn and_or_nor_not_combine() {
        assert!(eval(
            doc! { "$and": [ { "a": 1 }, { "b": 2 } ] },
            doc! { "a": 1, "b": 2 }
        ));
        assert!(eval(doc! { "$or": [ { "a": 1 }, { "a": 2 } ] }, doc! { "a": 2 }));
        assert!(eval(doc! { "$nor": [ { "a": 1 } ] }, doc! { "a": 2 }));
        assert!(eval(doc! { "$not": { "a": 1 } }, doc! { "a": 2 }));
    }
}
