use bson::Bson;

/// One of the `$type` tags recognized by the `$type` operator (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    String,
    Number,
    Boolean,
    Null,
    Array,
    Date,
    ObjectId,
    Object,
}

impl TypeTag {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "string" => TypeTag::String,
            "number" => TypeTag::Number,
            "boolean" => TypeTag::Boolean,
            "null" => TypeTag::Null,
            "array" => TypeTag::Array,
            "date" => TypeTag::Date,
            "objectId" => TypeTag::ObjectId,
            "object" => TypeTag::Object,
            _ => return None,
        })
    }

    pub fn matches(self, value: &Bson) -> bool {
        match (self, value) {
            (TypeTag::String, Bson::String(_)) => true,
            (TypeTag::Number, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) => true,
            (TypeTag::Boolean, Bson::Boolean(_)) => true,
            (TypeTag::Null, Bson::Null) => true,
            (TypeTag::Array, Bson::Array(_)) => true,
            (TypeTag::Date, Bson::DateTime(_)) => true,
            (TypeTag::ObjectId, Bson::ObjectId(_)) => true,
            (TypeTag::Object, Bson::Document(_)) => true,
            _ => false,
        }
    }
}

/// A single operator applied to the value a field path resolves to.
/// Multiple `FieldOp`s on the same path AND together (§4.3's "evaluate each
/// operator on v with AND").
#[derive(Debug, Clone)]
pub enum FieldOp {
    Eq(Bson),
    Ne(Bson),
    Gt(Bson),
    Gte(Bson),
    Lt(Bson),
    Lte(Bson),
    In(Vec<Bson>),
    Nin(Vec<Bson>),
    Exists(bool),
    Type(TypeTag),
    Size(i64),
    All(Vec<Bson>),
    ElemMatch(ElemMatchExpr),
}

/// `$elemMatch` accepts either operators applied directly to each array
/// element (`{ "$elemMatch": { "$gt": 5 } }`) or a sub-filter applied to
/// each element as if it were a document (`{ "$elemMatch": { "sku": "A" } }`).
#[derive(Debug, Clone)]
pub enum ElemMatchExpr {
    Value(Vec<FieldOp>),
    Doc(Box<FilterExpr>),
}

#[derive(Debug, Clone)]
pub struct FieldCondition {
    pub path: String,
    pub ops: Vec<FieldOp>,
}

/// A parsed filter expression tree (§4.3). Parsed once from a filter
/// document, then walked repeatedly against streamed candidates.
#[derive(Debug, Clone)]
pub enum FilterExpr {
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
    Nor(Vec<FilterExpr>),
    Not(Box<FilterExpr>),
    Field(FieldCondition),
}

impl FilterExpr {
    /// An `$and` over an empty list of sub-filters matches any document,
    /// and every top-level filter document is itself an implicit AND.
    pub fn always() -> Self {
        FilterExpr::And(Vec::new())
    }
}
