// Aggregate stage plan
//
// `AGG_GROUP_KEYS` is both the grouping key and the non-aggregate select
// list of the agg stage. Adding a key to it changes the grouping granularity.

use crate::schema::{column, event_date_type};
use datafusion::dataframe::DataFrame;
use datafusion::error::Result;
use datafusion::functions::datetime::expr_fn::date_trunc;
use datafusion::functions_aggregate::expr_fn::count;
use datafusion::logical_expr::{cast, ident, lit, Expr, SortExpr};

/// One grouping key of the agg stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKey {
    /// Group by the clean column as is
    Column(&'static str),
    /// Group by the clean timestamp column truncated to its UTC day
    Day(&'static str),
}

impl GroupKey {
    pub fn name(&self) -> &'static str {
        match self {
            GroupKey::Column(name) | GroupKey::Day(name) => *name,
        }
    }

    fn expr(&self) -> Expr {
        match self {
            GroupKey::Column(name) => ident(*name),
            GroupKey::Day(name) => cast(date_trunc(lit("day"), ident(*name)), event_date_type()),
        }
    }
}

pub const AGG_GROUP_KEYS: &[GroupKey] = &[
    GroupKey::Column(column::EVENT_TYPE),
    GroupKey::Column(column::REPO_ID),
    GroupKey::Column(column::REPO_NAME),
    GroupKey::Column(column::REPO_URL),
    GroupKey::Day(column::EVENT_DATE),
];

/// Output order of the agg stage.
pub const AGG_SORT_KEYS: &[&str] = &[
    column::EVENT_DATE,
    column::EVENT_TYPE,
    column::REPO_ID,
    column::REPO_NAME,
    column::REPO_URL,
];

/// Group the clean stage by `AGG_GROUP_KEYS` and count rows per group.
pub fn aggregate_plan(clean: DataFrame) -> Result<DataFrame> {
    let keyed = clean.select(
        AGG_GROUP_KEYS
            .iter()
            .map(|key| key.expr().alias(key.name()))
            .collect::<Vec<_>>(),
    )?;

    let group_by = AGG_GROUP_KEYS.iter().map(|key| ident(key.name())).collect();
    let counted = keyed.aggregate(group_by, vec![count(lit(1)).alias(column::EVENT_COUNT)])?;

    let order: Vec<SortExpr> = AGG_SORT_KEYS
        .iter()
        .map(|name| ident(*name).sort(true, false))
        .collect();
    counted.sort(order)
}
