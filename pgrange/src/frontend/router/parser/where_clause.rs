//! WHERE clause of a SELECT/UPDATE query, reduced to the
//! boolean/comparison subtree the router understands.

use pg_query::{
    protobuf::{a_const::Val, *},
    NodeEnum,
};

/// Expression tree inspected by the router. Anything the router
/// can't route by collapses to `Other`.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Conjunction; routing is left-biased.
    And(Vec<Expr>),
    /// Binary comparison, any operator.
    Comparison(Box<Expr>, Box<Expr>),
    /// Column reference, unqualified name.
    Column(std::string::String),
    /// Literal value, as sharding key bytes.
    Value(Vec<u8>),
    /// Value list, e.g. the right side of IN.
    Tuple(Vec<Expr>),
    Other,
}

impl Expr {
    pub fn from_node(node: &Node) -> Expr {
        match &node.node {
            Some(NodeEnum::BoolExpr(expr)) if expr.boolop() == BoolExprType::AndExpr => {
                Expr::And(expr.args.iter().map(Expr::from_node).collect())
            }

            Some(NodeEnum::AExpr(expr)) => {
                let left = expr
                    .lexpr
                    .as_deref()
                    .map(Expr::from_node)
                    .unwrap_or(Expr::Other);
                let right = expr
                    .rexpr
                    .as_deref()
                    .map(Expr::from_node)
                    .unwrap_or(Expr::Other);
                Expr::Comparison(Box::new(left), Box::new(right))
            }

            Some(NodeEnum::ColumnRef(column)) => {
                match column.fields.last().map(|field| &field.node) {
                    Some(Some(NodeEnum::String(name))) => Expr::Column(name.sval.clone()),
                    _ => Expr::Other,
                }
            }

            Some(NodeEnum::AConst(value)) => match value_bytes(value) {
                Some(bytes) => Expr::Value(bytes),
                None => Expr::Other,
            },

            Some(NodeEnum::List(list)) => {
                Expr::Tuple(list.items.iter().map(Expr::from_node).collect())
            }

            // Literals are often wrapped in casts, e.g. '10'::bigint.
            Some(NodeEnum::TypeCast(cast)) => cast
                .arg
                .as_deref()
                .map(Expr::from_node)
                .unwrap_or(Expr::Other),

            _ => Expr::Other,
        }
    }
}

/// Sharding key bytes of a literal.
fn value_bytes(value: &AConst) -> Option<Vec<u8>> {
    if value.isnull {
        return None;
    }

    match value.val.as_ref() {
        Some(Val::Ival(i)) => Some(i.ival.to_string().into_bytes()),
        Some(Val::Fval(f)) => Some(f.fval.clone().into_bytes()),
        Some(Val::Sval(s)) => Some(s.sval.clone().into_bytes()),
        Some(Val::Boolval(b)) => Some(if b.boolval { b"true".to_vec() } else { b"false".to_vec() }),
        _ => None,
    }
}
