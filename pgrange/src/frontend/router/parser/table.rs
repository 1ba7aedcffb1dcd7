//! Table references in a FROM clause.

use pg_query::{protobuf::*, NodeEnum};

/// Names of all tables referenced by the FROM clause,
/// including both sides of joins. Subqueries are opaque.
pub fn table_names(from_clause: &[Node]) -> Vec<std::string::String> {
    let mut tables = vec![];

    for node in from_clause {
        collect(node, &mut tables);
    }

    tables
}

fn collect(node: &Node, tables: &mut Vec<std::string::String>) {
    match &node.node {
        Some(NodeEnum::RangeVar(table)) => tables.push(table.relname.clone()),

        Some(NodeEnum::JoinExpr(join)) => {
            if let Some(ref left) = join.larg {
                collect(left, tables);
            }
            if let Some(ref right) = join.rarg {
                collect(right, tables);
            }
        }

        _ => (),
    }
}
