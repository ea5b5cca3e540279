// Clean stage projection
//
// Each clean column names the nested path it is read from in the raw
// records. A path the raw schema cannot satisfy projects a typed null, and
// values that fail to convert become null, so the clean stage keeps one row
// per raw row.

use crate::schema::{clean_schema, column};
use arrow::compute::can_cast_types;
use arrow::datatypes::{DataType, Schema};
use datafusion::common::ScalarValue;
use datafusion::error::Result;
use datafusion::functions::core::expr_fn::get_field;
use datafusion::logical_expr::{ident, lit, try_cast, Expr};
use tracing::debug;

/// A clean column and the raw path it is projected from.
#[derive(Debug, Clone, Copy)]
pub struct CleanColumn {
    pub name: &'static str,
    pub path: &'static [&'static str],
}

/// Clean columns in output order.
pub const CLEAN_COLUMNS: &[CleanColumn] = &[
    CleanColumn { name: column::EVENT_ID, path: &["id"] },
    CleanColumn { name: column::USER_ID, path: &["actor", "id"] },
    CleanColumn { name: column::USER_NAME, path: &["actor", "login"] },
    CleanColumn { name: column::USER_DISPLAY_NAME, path: &["actor", "display_login"] },
    CleanColumn { name: column::EVENT_TYPE, path: &["type"] },
    CleanColumn { name: column::REPO_ID, path: &["repo", "id"] },
    CleanColumn { name: column::REPO_NAME, path: &["repo", "name"] },
    CleanColumn { name: column::REPO_URL, path: &["repo", "url"] },
    CleanColumn { name: column::EVENT_DATE, path: &["created_at"] },
];

/// Projection list turning a raw table with `raw_schema` into the clean stage.
pub fn clean_projection(raw_schema: &Schema) -> Result<Vec<Expr>> {
    let target = clean_schema();
    CLEAN_COLUMNS
        .iter()
        .map(|col| {
            let data_type = target.field_with_name(col.name)?.data_type();
            project_column(raw_schema, col, data_type)
        })
        .collect()
}

fn project_column(raw_schema: &Schema, col: &CleanColumn, target: &DataType) -> Result<Expr> {
    let expr = match resolve_path(raw_schema, col.path) {
        Some((expr, source)) if can_cast_types(&source, target) => try_cast(expr, target.clone()),
        resolved => {
            debug!(
                column = col.name,
                path = %col.path.join("."),
                found = resolved.is_some(),
                "Raw path unavailable, projecting nulls"
            );
            lit(ScalarValue::try_from(target)?)
        }
    };
    Ok(expr.alias(col.name))
}

/// Walk `path` through nested struct fields. Returns the access expression
/// and the leaf type, or `None` when a segment is missing or its parent is
/// not a struct.
fn resolve_path(schema: &Schema, path: &[&str]) -> Option<(Expr, DataType)> {
    let (first, rest) = path.split_first()?;
    let field = schema.field_with_name(first).ok()?;
    let mut expr = ident(*first);
    let mut data_type = field.data_type().clone();

    for name in rest {
        let DataType::Struct(children) = &data_type else {
            return None;
        };
        let (_, child) = children.find(name)?;
        let child_type = child.data_type().clone();
        expr = get_field(expr, *name);
        data_type = child_type;
    }

    Some((expr, data_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::{Field, Fields};

    fn raw_schema() -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::Utf8, true),
            Field::new(
                "actor",
                DataType::Struct(Fields::from(vec![
                    Field::new("id", DataType::Int64, true),
                    Field::new("login", DataType::Utf8, true),
                ])),
                true,
            ),
            Field::new("repo", DataType::Utf8, true),
        ])
    }

    #[test]
    fn test_resolve_nested_path() {
        let schema = raw_schema();
        let (_, leaf) = resolve_path(&schema, &["actor", "id"]).unwrap();
        assert_eq!(leaf, DataType::Int64);
        assert!(resolve_path(&schema, &["actor", "display_login"]).is_none());
        // parent is not a struct
        assert!(resolve_path(&schema, &["repo", "id"]).is_none());
        assert!(resolve_path(&schema, &["created_at"]).is_none());
    }

    #[test]
    fn test_projection_covers_every_clean_column() {
        let exprs = clean_projection(&raw_schema()).unwrap();
        let names: Vec<String> = exprs.iter().map(|e| e.schema_name().to_string()).collect();
        let expected: Vec<&str> = CLEAN_COLUMNS.iter().map(|c| c.name).collect();
        assert_eq!(names, expected);
    }
}
