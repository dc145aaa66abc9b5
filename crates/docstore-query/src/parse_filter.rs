use bson::Bson;

use crate::filter::{ElemMatchExpr, FieldCondition, FieldOp, FilterExpr, TypeTag};

/// Parse error for filter documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterParseError(pub String);

impl std::fmt::Display for FilterParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "filter parse error: {}", self.0)
    }
}

impl std::error::Error for FilterParseError {}

/// Parse a filter document into a [`FilterExpr`] tree (§4.3).
///
/// The empty document `{}` is not an error — it parses to an expression
/// that matches every document, matching the boundary case in §8
/// ("Empty filter on empty collection returns an empty list").
pub fn parse_filter(doc: &bson::Document) -> Result<FilterExpr, FilterParseError> {
    let mut children = Vec::new();

    for (key, value) in doc.iter() {
        match key.as_str() {
            "$and" => children.push(parse_logical_array(value, FilterExpr::And)?),
            "$or" => children.push(parse_logical_array(value, FilterExpr::Or)?),
            "$nor" => children.push(parse_logical_array(value, FilterExpr::Nor)?),
            "$not" => {
                let sub = value
                    .as_document()
                    .ok_or_else(|| FilterParseError("$not value must be a document".into()))?;
                children.push(FilterExpr::Not(Box::new(parse_filter(sub)?)));
            }
            k if k.starts_with('$') => {
                return Err(FilterParseError(format!("unknown top-level operator: {k}")));
            }
            _ => children.push(FilterExpr::Field(parse_field_condition(key, value)?)),
        }
    }

    match children.len() {
        0 => Ok(FilterExpr::always()),
        1 => Ok(children.pop().unwrap()),
        _ => Ok(FilterExpr::And(children)),
    }
}

fn parse_logical_array(
    value: &Bson,
    make: fn(Vec<FilterExpr>) -> FilterExpr,
) -> Result<FilterExpr, FilterParseError> {
    let arr = value
        .as_array()
        .ok_or_else(|| FilterParseError("$and/$or/$nor value must be an array".into()))?;

    let mut children = Vec::with_capacity(arr.len());
    for elem in arr {
        let sub = elem.as_document().ok_or_else(|| {
            FilterParseError("$and/$or/$nor array elements must be documents".into())
        })?;
        children.push(parse_filter(sub)?);
    }
    Ok(make(children))
}

/// Parse a single `path: sub` filter entry (§4.3 "Field entry semantics").
pub fn parse_field_condition(
    field: &str,
    value: &Bson,
) -> Result<FieldCondition, FilterParseError> {
    if let Bson::Document(sub) = value {
        if !sub.is_empty() && sub.keys().all(|k| k.starts_with('$')) {
            return Ok(FieldCondition {
                path: field.to_string(),
                ops: parse_operator_doc(field, sub)?,
            });
        }
    }

    // Literal: implicit `{ $eq: literal }` rewrite. The Eq evaluator decides
    // between array-contains and plain equality based on the shapes of `v`
    // and the literal at match time.
    Ok(FieldCondition {
        path: field.to_string(),
        ops: vec![FieldOp::Eq(value.clone())],
    })
}

fn parse_operator_doc(field: &str, doc: &bson::Document) -> Result<Vec<FieldOp>, FilterParseError> {
    let mut ops = Vec::with_capacity(doc.len());

    for (op_key, op_value) in doc.iter() {
        let op = match op_key.as_str() {
            "$eq" => FieldOp::Eq(op_value.clone()),
            "$ne" => FieldOp::Ne(op_value.clone()),
            "$gt" => FieldOp::Gt(op_value.clone()),
            "$gte" => FieldOp::Gte(op_value.clone()),
            "$lt" => FieldOp::Lt(op_value.clone()),
            "$lte" => FieldOp::Lte(op_value.clone()),
            "$in" => FieldOp::In(array_arg(op_key, op_value)?),
            "$nin" => FieldOp::Nin(array_arg(op_key, op_value)?),
            "$exists" => FieldOp::Exists(bool_arg(op_key, op_value)?),
            "$type" => {
                let s = op_value.as_str().ok_or_else(|| {
                    FilterParseError("$type value must be a string".into())
                })?;
                let tag = TypeTag::parse(s)
                    .ok_or_else(|| FilterParseError(format!("unknown $type tag: {s}")))?;
                FieldOp::Type(tag)
            }
            "$size" => {
                let n = op_value
                    .as_i64()
                    .or_else(|| op_value.as_i32().map(i64::from))
                    .ok_or_else(|| FilterParseError("$size value must be an integer".into()))?;
                FieldOp::Size(n)
            }
            "$all" => FieldOp::All(array_arg(op_key, op_value)?),
            "$elemMatch" => {
                let sub = op_value.as_document().ok_or_else(|| {
                    FilterParseError("$elemMatch value must be a document".into())
                })?;
                FieldOp::ElemMatch(parse_elem_match(field, sub)?)
            }
            k => return Err(FilterParseError(format!("unknown field operator: {k} on {field}"))),
        };
        ops.push(op);
    }

    if ops.is_empty() {
        return Err(FilterParseError("empty operator document".into()));
    }
    Ok(ops)
}

/// Parse an `$elemMatch`-shaped argument: operators applied directly to each
/// array element (all-`$`-keyed document) or a sub-filter applied to each
/// element as a document. `$pull`'s mapping argument (§4.4) reuses this.
pub(crate) fn parse_elem_match(field: &str, sub: &bson::Document) -> Result<ElemMatchExpr, FilterParseError> {
    if !sub.is_empty() && sub.keys().all(|k| k.starts_with('$')) {
        Ok(ElemMatchExpr::Value(parse_operator_doc(field, sub)?))
    } else {
        Ok(ElemMatchExpr::Doc(Box::new(parse_filter(sub)?)))
    }
}

fn array_arg(op: &str, value: &Bson) -> Result<Vec<Bson>, FilterParseError> {
    value
        .as_array()
        .map(|a| a.to_vec())
        .ok_or_else(|| FilterParseError(format!("{op} value must be an array")))
}

fn bool_arg(op: &str, value: &Bson) -> Result<bool, FilterParseError> {
    value
        .as_bool()
        .ok_or_else(|| FilterParseError(format!("{op} value must be a boolean")))
}
