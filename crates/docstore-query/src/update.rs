use bson::Bson;

use crate::filter::ElemMatchExpr;

/// `$pull`'s argument (§4.4): a literal to match array elements against
/// structurally, or — when the argument is a mapping — a sub-filter
/// applied to each element, the same dual shape `$elemMatch` accepts.
#[derive(Debug, Clone)]
pub enum PullPredicate {
    Value(Bson),
    Match(ElemMatchExpr),
}

/// How a new value is merged into an existing array for `$push` (§4.4).
#[derive(Debug, Clone)]
pub struct PushSpec {
    pub path: String,
    /// Values to append, already unwrapped from `$each` if present.
    pub values: Vec<Bson>,
    pub position: Option<i64>,
    pub slice: Option<i64>,
    /// Sort sub-document or `1`/`-1` for a scalar-element sort.
    pub sort: Option<PushSort>,
}

#[derive(Debug, Clone)]
pub enum PushSort {
    Scalar(i32),
    Keys(Vec<(String, i32)>),
}

#[derive(Debug, Clone)]
pub enum PopDirection {
    First,
    Last,
}

/// One parsed update operator group entry. Groups apply in the order listed
/// in §4.4, and entries apply in declaration order within a group.
#[derive(Debug, Clone)]
pub enum UpdateOp {
    Set(String, Bson),
    Unset(String),
    Inc(String, Bson),
    Mul(String, Bson),
    Min(String, Bson),
    Max(String, Bson),
    Rename(String, String),
    Push(PushSpec),
    Pull(String, PullPredicate),
    PullAll(String, Vec<Bson>),
    Pop(String, PopDirection),
    AddToSet(String, Vec<Bson>),
    SetOnInsert(String, Bson),
}

/// A parsed update expression (§4.4): an ordered list of operator
/// applications, grouped by operator kind at parse time but stored flat so
/// `apply` can walk them once in §4.4's fixed group order.
#[derive(Debug, Clone, Default)]
pub struct UpdateExpr {
    pub ops: Vec<UpdateOp>,
}

impl UpdateExpr {
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
