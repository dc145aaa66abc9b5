use bson::Bson;

use crate::parse_filter::parse_elem_match;
use crate::update::{PopDirection, PullPredicate, PushSort, PushSpec, UpdateExpr, UpdateOp};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateParseError(pub String);

impl std::fmt::Display for UpdateParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "update parse error: {}", self.0)
    }
}

impl std::error::Error for UpdateParseError {}

/// Parse an update document into an [`UpdateExpr`] (§4.4). Operator groups
/// are gathered in the fixed order `$set, $unset, $inc, $mul, $min, $max,
/// $rename, $push, $pull, $pullAll, $pop, $addToSet, $setOnInsert`; entries
/// within a group keep the document's own field order.
pub fn parse_update(doc: &bson::Document) -> Result<UpdateExpr, UpdateParseError> {
    let mut ops = Vec::new();
    let mut seen_keys: Vec<&str> = Vec::new();

    if let Some(sub) = group(doc, "$set")? {
        for (path, value) in sub.iter() {
            ops.push(UpdateOp::Set(path.clone(), value.clone()));
        }
    }
    if let Some(sub) = group(doc, "$unset")? {
        for (path, _) in sub.iter() {
            ops.push(UpdateOp::Unset(path.clone()));
        }
    }
    if let Some(sub) = group(doc, "$inc")? {
        for (path, value) in sub.iter() {
            ops.push(UpdateOp::Inc(path.clone(), value.clone()));
        }
    }
    if let Some(sub) = group(doc, "$mul")? {
        for (path, value) in sub.iter() {
            ops.push(UpdateOp::Mul(path.clone(), value.clone()));
        }
    }
    if let Some(sub) = group(doc, "$min")? {
        for (path, value) in sub.iter() {
            ops.push(UpdateOp::Min(path.clone(), value.clone()));
        }
    }
    if let Some(sub) = group(doc, "$max")? {
        for (path, value) in sub.iter() {
            ops.push(UpdateOp::Max(path.clone(), value.clone()));
        }
    }
    if let Some(sub) = group(doc, "$rename")? {
        for (path, value) in sub.iter() {
            let target = value
                .as_str()
                .ok_or_else(|| UpdateParseError("$rename target must be a string".into()))?;
            ops.push(UpdateOp::Rename(path.clone(), target.to_string()));
        }
    }
    if let Some(sub) = group(doc, "$push")? {
        for (path, value) in sub.iter() {
            ops.push(UpdateOp::Push(parse_push_spec(path, value)?));
        }
    }
    if let Some(sub) = group(doc, "$pull")? {
        for (path, value) in sub.iter() {
            let predicate = match value {
                Bson::Document(inner) => PullPredicate::Match(
                    parse_elem_match(path, inner).map_err(|e| UpdateParseError(e.0))?,
                ),
                other => PullPredicate::Value(other.clone()),
            };
            ops.push(UpdateOp::Pull(path.clone(), predicate));
        }
    }
    if let Some(sub) = group(doc, "$pullAll")? {
        for (path, value) in sub.iter() {
            let arr = value
                .as_array()
                .ok_or_else(|| UpdateParseError("$pullAll value must be an array".into()))?;
            ops.push(UpdateOp::PullAll(path.clone(), arr.to_vec()));
        }
    }
    if let Some(sub) = group(doc, "$pop")? {
        for (path, value) in sub.iter() {
            let n = value
                .as_i64()
                .or_else(|| value.as_i32().map(i64::from))
                .ok_or_else(|| UpdateParseError("$pop value must be 1 or -1".into()))?;
            let direction = match n {
                1 => PopDirection::Last,
                -1 => PopDirection::First,
                _ => return Err(UpdateParseError("$pop value must be 1 or -1".into())),
            };
            ops.push(UpdateOp::Pop(path.clone(), direction));
        }
    }
    if let Some(sub) = group(doc, "$addToSet")? {
        for (path, value) in sub.iter() {
            let values = match value {
                Bson::Document(inner) if inner.contains_key("$each") => {
                    let each = inner.get_array("$each").map_err(|_| {
                        UpdateParseError("$addToSet $each value must be an array".into())
                    })?;
                    each.to_vec()
                }
                other => vec![other.clone()],
            };
            ops.push(UpdateOp::AddToSet(path.clone(), values));
        }
    }
    if let Some(sub) = group(doc, "$setOnInsert")? {
        for (path, value) in sub.iter() {
            ops.push(UpdateOp::SetOnInsert(path.clone(), value.clone()));
        }
    }

    for key in doc.keys() {
        if key.starts_with('$') {
            seen_keys.push(key.as_str());
        } else {
            return Err(UpdateParseError(format!(
                "update document entries must be operator groups, found bare field: {key}"
            )));
        }
    }
    const KNOWN: &[&str] = &[
        "$set",
        "$unset",
        "$inc",
        "$mul",
        "$min",
        "$max",
        "$rename",
        "$push",
        "$pull",
        "$pullAll",
        "$pop",
        "$addToSet",
        "$setOnInsert",
    ];
    for key in seen_keys {
        if !KNOWN.contains(&key) {
            return Err(UpdateParseError(format!("unknown update operator: {key}")));
        }
    }

    Ok(UpdateExpr { ops })
}

fn group<'a>(
    doc: &'a bson::Document,
    key: &str,
) -> Result<Option<&'a bson::Document>, UpdateParseError> {
    match doc.get(key) {
        None => Ok(None),
        Some(Bson::Document(sub)) => Ok(Some(sub)),
        Some(_) => Err(UpdateParseError(format!("{key} value must be a document"))),
    }
}

fn parse_push_spec(path: &str, value: &Bson) -> Result<PushSpec, UpdateParseError> {
    let Bson::Document(mods) = value else {
        return Ok(PushSpec {
            path: path.to_string(),
            values: vec![value.clone()],
            position: None,
            slice: None,
            sort: None,
        });
    };

    if !mods.contains_key("$each") {
        return Ok(PushSpec {
            path: path.to_string(),
            values: vec![value.clone()],
            position: None,
            slice: None,
            sort: None,
        });
    }

    let values = mods
        .get_array("$each")
        .map_err(|_| UpdateParseError("$push $each value must be an array".into()))?
        .to_vec();

    let position = match mods.get("$position") {
        None => None,
        Some(v) => Some(
            v.as_i64()
                .or_else(|| v.as_i32().map(i64::from))
                .ok_or_else(|| UpdateParseError("$position value must be an integer".into()))?,
        ),
    };

    let slice = match mods.get("$slice") {
        None => None,
        Some(v) => Some(
            v.as_i64()
                .or_else(|| v.as_i32().map(i64::from))
                .ok_or_else(|| UpdateParseError("$slice value must be an integer".into()))?,
        ),
    };

    let sort = match mods.get("$sort") {
        None => None,
        Some(Bson::Int32(n)) => Some(PushSort::Scalar(*n)),
        Some(Bson::Int64(n)) => Some(PushSort::Scalar(*n as i32)),
        Some(Bson::Document(keys)) => {
            let mut pairs = Vec::with_capacity(keys.len());
            for (k, v) in keys.iter() {
                let dir = v
                    .as_i32()
                    .or_else(|| v.as_i64().map(|n| n as i32))
                    .ok_or_else(|| UpdateParseError("$sort direction must be 1 or -1".into()))?;
                pairs.push((k.clone(), dir));
            }
            Some(PushSort::Keys(pairs))
        }
        Some(_) => return Err(UpdateParseError("$sort value must be 1, -1, or a document".into())),
    };

    Ok(PushSpec {
        path: path.to_string(),
        values,
        position,
        slice,
        sort,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn set_and_unset() {
        let expr = parse_update(&doc! { "$set": { "a": 1 }, "$unset": { "b": "" } }).unwrap();
        assert_eq!(expr.ops.len(), 2);
        assert!(matches!(expr.ops[0], UpdateOp::Set(ref p, _) if p == "a"));
        assert!(matches!(expr.ops[1], UpdateOp::Unset(ref p) if p == "b"));
    }

    #[test]
    fn group_order_is_fixed_regardless_of_doc_order() {
        let expr = parse_update(&doc! { "$inc": { "n": 1 }, "$set": { "a": 1 } }).unwrap();
        assert!(matches!(expr.ops[0], UpdateOp::Set(..)));
        assert!(matches!(expr.ops[1], UpdateOp::Inc(..)));
    }

    #[test]
    fn push_plain_value() {
        let expr = parse_update(&doc! { "$push": { "tags": "x" } }).unwrap();
        match &expr.ops[0] {
            UpdateOp::Push(spec) => {
                assert_eq!(spec.values, vec![Bson::String("x".into())]);
                assert!(spec.slice.is_none() && spec.position.is_none() && spec.sort.is_none());
            }
            other => panic!("expected Push, got {other:?}"),
        }
    }

    #[test]
    fn push_with_each_slice_sort() {
        let expr = parse_update(
            &doc! { "$push": { "scores": { "$each": [1, 2], "$slice": -5, "$sort": -1 } } },
        )
        .unwrap();
        match &expr.ops[0] {
            UpdateOp::Push(spec) => {
                assert_eq!(spec.values.len(), 2);
                assert_eq!(spec.slice, Some(-5));
                assert!(matches!(spec.sort, Some(PushSort::Scalar(-1))));
            }
            other => panic!("expected Push, got {other:?}"),
        }
    }

    #[test]
    fn add_to_set_with_each() {
        let expr = parse_update(&doc! { "$addToSet": { "tags": { "$each": ["a", "b"] } } }).unwrap();
        assert!(matches!(&expr.ops[0], UpdateOp::AddToSet(_, v) if v.len() == 2));
    }

    #[test]
    fn pop_requires_one_or_minus_one() {
        let err = parse_update(&doc! { "$pop": { "tags": 2 } }).unwrap_err();
        assert!(err.0.contains("$pop"));
    }

    #[test]
    fn bare_field_without_operator_errors() {
        let err = parse_update(&doc! { "a": 1 }).unwrap_err();
        assert!(err.0.contains("bare field"));
    }

    #[test]
    fn unknown_operator_errors() {
        let err = parse_update(&doc! { "$bogus": { "a": 1 } }).unwrap_err();
        assert!(err.0.contains("unknown update operator"));
    }
}
