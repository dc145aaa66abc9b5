//! Document-store query engine layered over a host KV substrate (§1).
//! Each module below implements one numbered section of the design:
//! path resolution and comparison (§4.1/§4.2), filter and update
//! application (§4.3/§4.4), index maintenance (§4.5), planning and
//! execution (§4.6), and the write coordinator that ties them together
//! into the collection surface callers see (§4.7/§6).

mod collection;
mod compare;
mod error;
mod exec;
mod filter_eval;
mod index;
mod path;
mod plan;
mod record;
mod update_apply;

pub use collection::{Collection, DeleteResult, InsertManyResult, InsertOneResult, UpdateResult};
pub use error::DbError;
pub use index::{IndexDelta, IndexManager};
pub use plan::{plan, IndexLookup, PlanNode};

pub use docstore_query::{
    parse_filter, parse_update, ElemMatchExpr, FieldCondition, FieldOp, FilterExpr, FilterParseError,
    Find, FindOptions, Projection, PullPredicate, Sort, SortDirection, SortKey, TypeTag, UpdateExpr,
    UpdateOp, UpdateParseError,
};
