//! Query planner (§4.6): pick at most one usable index for a filter,
//! falling back to a full collection scan. Grounded on
//! `slate-db/src/planner.rs`'s AND-priority index selection, scoped down
//! to a single consulted index with mandatory post-filter re-verification —
//! no OR index-merge, no indexed-sort pushdown, no covered projections.

use bson::Bson;

use docstore_engine::IndexSpec;
use docstore_query::{FieldCondition, FieldOp, FilterExpr};

/// How a chosen index should be scanned for candidate ids.
#[derive(Debug, Clone)]
pub enum IndexLookup {
    Eq(Bson),
    In(Vec<Bson>),
    Range {
        gt: Option<Bson>,
        gte: Option<Bson>,
        lt: Option<Bson>,
        lte: Option<Bson>,
    },
}

#[derive(Debug, Clone)]
pub enum PlanNode {
    /// Full scan over the collection's record range.
    Scan,
    /// Single-field index, consulted by exact match or by range.
    IndexScan { index: IndexSpec, lookup: IndexLookup },
    /// Compound index; only the leading field's exact-match value narrows
    /// the scan, the remaining predicates are checked during verification.
    Compound { index: IndexSpec, lead: IndexLookup },
}

/// Top-level field conditions a filter exposes for index selection — a
/// bare `Field`, or the `Field` children of its implicit top-level `And`.
/// Nested `$or`/`$not`/`$nor` groups never participate in index selection.
fn top_level_fields(filter: &FilterExpr) -> Vec<&FieldCondition> {
    match filter {
        FilterExpr::Field(cond) => vec![cond],
        FilterExpr::And(children) => children
            .iter()
            .filter_map(|c| match c {
                FilterExpr::Field(cond) => Some(cond),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn exact_match(cond: &FieldCondition) -> Option<IndexLookup> {
    cond.ops.iter().find_map(|op| match op {
        FieldOp::Eq(v) => Some(IndexLookup::Eq(v.clone())),
        FieldOp::In(vs) => Some(IndexLookup::In(vs.clone())),
        _ => None,
    })
}

fn range_match(cond: &FieldCondition) -> Option<IndexLookup> {
    let mut gt = None;
    let mut gte = None;
    let mut lt = None;
    let mut lte = None;
    let mut any = false;

    for op in &cond.ops {
        match op {
            FieldOp::Gt(v) => {
                gt = Some(v.clone());
                any = true;
            }
            FieldOp::Gte(v) => {
                gte = Some(v.clone());
                any = true;
            }
            FieldOp::Lt(v) => {
                lt = Some(v.clone());
                any = true;
            }
            FieldOp::Lte(v) => {
                lte = Some(v.clone());
                any = true;
            }
            _ => {}
        }
    }

    any.then_some(IndexLookup::Range { gt, gte, lt, lte })
}

fn lookup_for(cond: &FieldCondition) -> Option<IndexLookup> {
    exact_match(cond).or_else(|| range_match(cond))
}

/// Build a plan for `filter` against the collection's declared `indexes`
/// (§4.6's index selection). Indexes are tried in the order given; the
/// first one whose leading field is usable wins.
pub fn plan(filter: &FilterExpr, indexes: &[IndexSpec]) -> PlanNode {
    let conds = top_level_fields(filter);

    for index in indexes {
        let Some((lead_path, _)) = index.fields.first() else { continue };
        let Some(lead_cond) = conds.iter().find(|c| &c.path == lead_path) else { continue };

        if index.fields.len() == 1 {
            if let Some(lookup) = lookup_for(lead_cond) {
                return PlanNode::IndexScan { index: index.clone(), lookup };
            }
            continue;
        }

        let Some(lead_lookup) = exact_match(lead_cond) else { continue };
        let rest_covered = index.fields[1..]
            .iter()
            .all(|(path, _)| conds.iter().any(|c| &c.path == path));
        if rest_covered {
            return PlanNode::Compound { index: index.clone(), lead: lead_lookup };
        }
    }

    PlanNode::Scan
}
