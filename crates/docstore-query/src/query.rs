use crate::filter::FilterExpr;
use crate::projection::Projection;
use crate::sort::Sort;

/// Options accepted by `find` (§4.6), beyond the filter itself.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub sort: Option<Sort>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub projection: Option<Projection>,
}

#[derive(Debug, Clone)]
pub struct Find {
    pub filter: FilterExpr,
    pub options: FindOptions,
}
