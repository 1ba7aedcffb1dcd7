//! INSERT statement projection.

use pg_query::{protobuf::*, NodeEnum};

use super::Expr;

/// Column list and VALUES rows of an INSERT statement.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertQuery {
    pub columns: Vec<std::string::String>,
    pub rows: Vec<Vec<Expr>>,
}

impl InsertQuery {
    pub fn from_stmt(stmt: &InsertStmt) -> Self {
        let columns = stmt
            .cols
            .iter()
            .filter_map(|col| match &col.node {
                Some(NodeEnum::ResTarget(target)) => Some(target.name.clone()),
                _ => None,
            })
            .collect();

        let mut rows = vec![];
        if let Some(select) = stmt.select_stmt.as_deref() {
            if let Some(NodeEnum::SelectStmt(select)) = &select.node {
                for list in &select.values_lists {
                    if let Some(NodeEnum::List(list)) = &list.node {
                        rows.push(list.items.iter().map(Expr::from_node).collect());
                    }
                }
            }
        }

        Self { columns, rows }
    }

    /// Value of the column in the first VALUES row.
    pub fn first_row_value(&self, column: usize) -> Option<&Expr> {
        self.rows.first().and_then(|row| row.get(column))
    }
}
