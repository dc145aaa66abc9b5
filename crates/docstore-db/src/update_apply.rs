//! Update application (§4.4). `apply` is pure: it clones the input
//! document, applies every parsed operator in the order `UpdateExpr`
//! stored them (fixed group order, declaration order within a group), and
//! returns the result.

use bson::{Bson, Document};

use docstore_query::{PopDirection, PullPredicate, PushSort, PushSpec, UpdateExpr, UpdateOp};

use crate::compare::compare_for_sort;
use crate::filter_eval::elem_matches;
use crate::path::{resolve_path, set_path, unset_path, Resolved};

pub fn apply(expr: &UpdateExpr, doc: &Document) -> Document {
    let mut out = doc.clone();
    for op in &expr.ops {
        apply_one(op, &mut out);
    }
    out
}

/// `$setOnInsert` entries apply only on the synthesized insert path of an
/// upsert (§4.7); `apply` above skips them, and the write coordinator
/// calls this once after `apply` when (and only when) the update inserted
/// a new document.
pub fn apply_set_on_insert(expr: &UpdateExpr, doc: &mut Document) {
    for op in &expr.ops {
        if let UpdateOp::SetOnInsert(path, value) = op {
            if path != "_id" {
                set_path(doc, path, value.clone());
            }
        }
    }
}

/// `_id` is the key under which a document is stored and indexed (§3): no
/// update operator may change it, so any operator whose target path is
/// `_id` is silently dropped rather than applied.
fn touches_id(op: &UpdateOp) -> bool {
    match op {
        UpdateOp::Set(p, _)
        | UpdateOp::Unset(p)
        | UpdateOp::Inc(p, _)
        | UpdateOp::Mul(p, _)
        | UpdateOp::Min(p, _)
        | UpdateOp::Max(p, _)
        | UpdateOp::Pull(p, _)
        | UpdateOp::PullAll(p, _)
        | UpdateOp::Pop(p, _)
        | UpdateOp::AddToSet(p, _)
        | UpdateOp::SetOnInsert(p, _) => p == "_id",
        UpdateOp::Rename(from, to) => from == "_id" || to == "_id",
        UpdateOp::Push(spec) => spec.path == "_id",
    }
}

fn apply_one(op: &UpdateOp, doc: &mut Document) {
    if touches_id(op) {
        return;
    }
    match op {
        UpdateOp::Set(path, value) => set_path(doc, path, value.clone()),
        UpdateOp::Unset(path) => unset_path(doc, path),
        UpdateOp::Inc(path, delta) => apply_arith(doc, path, delta, |a, b| a + b),
        UpdateOp::Mul(path, factor) => apply_arith(doc, path, factor, |a, b| a * b),
        UpdateOp::Min(path, bound) => apply_bound(doc, path, bound, std::cmp::Ordering::Less),
        UpdateOp::Max(path, bound) => apply_bound(doc, path, bound, std::cmp::Ordering::Greater),
        UpdateOp::Rename(from, to) => apply_rename(doc, from, to),
        UpdateOp::Push(spec) => apply_push(doc, spec),
        UpdateOp::Pull(path, predicate) => apply_pull(doc, path, |v| pull_matches(predicate, v)),
        UpdateOp::PullAll(path, literals) => {
            apply_pull(doc, path, |v| literals.iter().any(|l| values_eq_loose(v, l)))
        }
        UpdateOp::Pop(path, direction) => apply_pop(doc, path, *direction),
        UpdateOp::AddToSet(path, values) => apply_add_to_set(doc, path, values),
        UpdateOp::SetOnInsert(_, _) => {}
    }
}

/// `$pull`'s argument is either a literal value to match elements against
/// structurally, or (when it's a mapping) a sub-filter — the same dual
/// shape `$elemMatch` accepts (§4.4).
fn pull_matches(predicate: &PullPredicate, v: &Bson) -> bool {
    match predicate {
        PullPredicate::Value(literal) => values_eq_loose(v, literal),
        PullPredicate::Match(expr) => elem_matches(expr, v),
    }
}

fn values_eq_loose(a: &Bson, b: &Bson) -> bool {
    crate::compare::values_equal(a, b)
}

fn as_f64(v: &Bson) -> Option<f64> {
    match v {
        Bson::Int32(n) => Some(*n as f64),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

/// Preserve integer-ness when both operands are integers; otherwise
/// produce a double. Mirrors how Mongo's `$inc`/`$mul` pick a result type.
fn arith_result(current: &Bson, operand: &Bson, f: impl Fn(f64, f64) -> f64) -> Bson {
    let result = f(as_f64(current).unwrap_or(0.0), as_f64(operand).unwrap_or(0.0));
    match (current, operand) {
        (Bson::Int32(_) | Bson::Int64(_), Bson::Int32(_) | Bson::Int64(_)) => {
            if matches!(current, Bson::Int64(_)) || matches!(operand, Bson::Int64(_)) {
                Bson::Int64(result as i64)
            } else {
                Bson::Int32(result as i32)
            }
        }
        _ => Bson::Double(result),
    }
}

fn apply_arith(doc: &mut Document, path: &str, operand: &Bson, f: impl Fn(f64, f64) -> f64) {
    let current = match resolve_path(doc, path) {
        Resolved::Value(v) => v.clone(),
        _ => Bson::Int32(0),
    };
    set_path(doc, path, arith_result(&current, operand, f));
}

fn apply_bound(doc: &mut Document, path: &str, bound: &Bson, favor: std::cmp::Ordering) {
    let replace = match resolve_path(doc, path) {
        Resolved::Value(current) => compare_for_sort(bound, current) == favor,
        _ => true,
    };
    if replace {
        set_path(doc, path, bound.clone());
    }
}

fn apply_rename(doc: &mut Document, from: &str, to: &str) {
    if let Resolved::Value(v) = resolve_path(doc, from) {
        let value = v.clone();
        unset_path(doc, from);
        set_path(doc, to, value);
    }
}

fn get_array(doc: &Document, path: &str) -> Vec<Bson> {
    match resolve_path(doc, path) {
        Resolved::Value(Bson::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}

fn apply_push(doc: &mut Document, spec: &PushSpec) {
    let mut items = get_array(doc, &spec.path);

    let insert_at = spec
        .position
        .map(|p| {
            if p < 0 {
                items.len().saturating_sub((-p) as usize)
            } else {
                (p as usize).min(items.len())
            }
        })
        .unwrap_or(items.len());

    for (i, v) in spec.values.iter().cloned().enumerate() {
        items.insert(insert_at + i, v);
    }

    if let Some(sort) = &spec.sort {
        sort_items(&mut items, sort);
    }

    if let Some(slice) = spec.slice {
        apply_slice(&mut items, slice);
    }

    set_path(doc, &spec.path, Bson::Array(items));
}

fn sort_items(items: &mut [Bson], sort: &PushSort) {
    match sort {
        PushSort::Scalar(dir) => items.sort_by(|a, b| {
            let ord = compare_for_sort(a, b);
            if *dir < 0 { ord.reverse() } else { ord }
        }),
        PushSort::Keys(keys) => items.sort_by(|a, b| {
            for (key, dir) in keys {
                let av = a.as_document().and_then(|d| d.get(key));
                let bv = b.as_document().and_then(|d| d.get(key));
                let ord = match (av, bv) {
                    (Some(av), Some(bv)) => compare_for_sort(av, bv),
                    (Some(_), None) => std::cmp::Ordering::Greater,
                    (None, Some(_)) => std::cmp::Ordering::Less,
                    (None, None) => std::cmp::Ordering::Equal,
                };
                let ord = if *dir < 0 { ord.reverse() } else { ord };
                if ord != std::cmp::Ordering::Equal {
                    return ord;
                }
            }
            std::cmp::Ordering::Equal
        }),
    }
}

fn apply_slice(items: &mut Vec<Bson>, slice: i64) {
    if slice >= 0 {
        items.truncate(slice as usize);
    } else {
        let keep = (-slice) as usize;
        let start = items.len().saturating_sub(keep);
        items.drain(..start);
    }
}

fn apply_pull(doc: &mut Document, path: &str, should_remove: impl Fn(&Bson) -> bool) {
    let mut items = get_array(doc, path);
    items.retain(|v| !should_remove(v));
    set_path(doc, path, Bson::Array(items));
}

fn apply_pop(doc: &mut Document, path: &str, direction: PopDirection) {
    let mut items = get_array(doc, path);
    match direction {
        PopDirection::First => {
            if !items.is_empty() {
                items.remove(0);
            }
        }
        PopDirection::Last => {
            items.pop();
        }
    }
    set_path(doc, path, Bson::Array(items));
}

fn apply_add_to_set(doc: &mut Document, path: &str, values: &[Bson]) {
    let mut items = get_array(doc, path);
    for v in values {
        if !items.iter().any(|existing| values_eq_loose(existing, v)) {
            items.push(v.clone());
        }
    }
    set_path(doc, path, Bson::Array(items));
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use docstore_query::parse_update;

    fn run(update_doc: bson::Document, target: bson::Document) -> bson::Document {
        let expr = parse_update(&update_doc).unwrap();
        apply(&expr, &target)
    }

    #[test]
    fn set_and_unset() {
        let out = run(doc! { "$set": { "a": 2 }, "$unset": { "b": "" } }, doc! { "a": 1, "b": 1 });
        assert_eq!(out, doc! { "a": 2 });
    }

    #[test]
    fn inc_on_missing_field_starts_at_zero() {
        let out = run(doc! { "$inc": { "n": 5 } }, doc! {});
        assert_eq!(out.get_i32("n").unwrap(), 5);
    }

    #[test]
    fn mul_multiplies_existing_value() {
        let out = run(doc! { "$mul": { "n": 3 } }, doc! { "n": 4 });
        assert_eq!(out.get_i32("n").unwrap(), 12);
    }

    #[test]
    fn min_only_replaces_when_smaller() {
        let out = run(doc! { "$min": { "n": 2 } }, doc! { "n": 5 });
        assert_eq!(out.get_i32("n").unwrap(), 2);
        let out = run(doc! { "$min": { "n": 10 } }, doc! { "n": 5 });
        assert_eq!(out.get_i32("n").unwrap(), 5);
    }

    #[test]
    fn rename_moves_value() {
        let out = run(doc! { "$rename": { "a": "b" } }, doc! { "a": 1 });
        assert_eq!(out, doc! { "b": 1 });
    }

    #[test]
    fn push_appends() {
        let out = run(doc! { "$push": { "tags": "x" } }, doc! { "tags": ["a"] });
        assert_eq!(out.get_array("tags").unwrap(), &vec![Bson::String("a".into()), Bson::String("x".into())]);
    }

    #[test]
    fn push_each_with_slice_keeps_last_n() {
        let out = run(
            doc! { "$push": { "scores": { "$each": [4, 5], "$slice": -3 } } },
            doc! { "scores": [1, 2, 3] },
        );
        assert_eq!(out.get_array("scores").unwrap().len(), 3);
    }

    #[test]
    fn pull_removes_matching_elements() {
        let out = run(doc! { "$pull": { "tags": "b" } }, doc! { "tags": ["a", "b", "c"] });
        assert_eq!(out.get_array("tags").unwrap(), &vec![Bson::String("a".into()), Bson::String("c".into())]);
    }

    #[test]
    fn pull_with_operator_mapping_matches_as_sub_filter() {
        let out = run(doc! { "$pull": { "scores": { "$gt": 5 } } }, doc! { "scores": [1, 6, 9, 3] });
        assert_eq!(out.get_array("scores").unwrap(), &vec![Bson::Int32(1), Bson::Int32(3)]);
    }

    #[test]
    fn pull_with_field_mapping_matches_sub_documents() {
        let out = run(
            doc! { "$pull": { "items": { "sku": "A" } } },
            doc! { "items": [ { "sku": "A" }, { "sku": "B" } ] },
        );
        assert_eq!(out.get_array("items").unwrap(), &vec![Bson::Document(doc! { "sku": "B" })]);
    }

    #[test]
    fn operators_targeting_id_are_ignored() {
        let out = run(doc! { "$set": { "_id": 99, "name": "b" } }, doc! { "_id": 1, "name": "a" });
        assert_eq!(out, doc! { "_id": 1, "name": "b" });

        let out = run(doc! { "$rename": { "_id": "alias" } }, doc! { "_id": 1 });
        assert_eq!(out, doc! { "_id": 1 });
    }

    #[test]
    fn pop_last_and_first() {
        let out = run(doc! { "$pop": { "tags": 1 } }, doc! { "tags": ["a", "b"] });
        assert_eq!(out.get_array("tags").unwrap(), &vec![Bson::String("a".into())]);
        let out = run(doc! { "$pop": { "tags": -1 } }, doc! { "tags": ["a", "b"] });
        assert_eq!(out.get_array("tags").unwrap(), &vec![Bson::String("b".into())]);
    }

    #[test]
    fn add_to_set_skips_duplicates() {
        let out = run(doc! { "$addToSet": { "tags": { "$each": ["a", "c"] } } }, doc! { "tags": ["a", "b"] });
        assert_eq!(out.get_array("tags").unwrap().len(), 3);
    }

    #[test]
    fn set_on_insert_is_skipped_by_plain_apply() {
        let out = run(doc! { "$set": { "a": 1 }, "$setOnInsert": { "b": 2 } }, doc! {});
        assert_eq!(out, doc! { "a": 1 });
    }

    #[test]
    fn group_order_is_fixed_not_declaration_order() {
        let expr = parse_update(&doc! { "$inc": { "n": 1 }, "$set": { "n": 10 } }).unwrap();
        let out = apply(&expr, &doc! { "n": 0 });
        assert_eq!(out.get_i32("n").unwrap(), 11);
    }
}
