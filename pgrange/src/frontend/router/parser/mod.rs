//! Query parser adapter.
//!
//! Reduces the pg_query AST to the statement shapes the router
//! inspects: a tagged statement sum and a small expression tree
//! for WHERE clauses and VALUES projections.

pub mod error;
pub mod insert;
pub mod table;
pub mod where_clause;

pub use error::Error;
pub use insert::InsertQuery;
pub use where_clause::Expr;

use pg_query::NodeEnum;
use tracing::{debug, trace};

use table::table_names;

/// Parsed statement, as far as routing is concerned.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(SelectQuery),
    Insert(InsertQuery),
    Update(UpdateQuery),
    Ddl,
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub tables: Vec<String>,
    pub where_clause: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateQuery {
    pub where_clause: Option<Expr>,
}

/// Parser state for one client connection. Holds the last
/// successfully parsed statement and its raw text.
#[derive(Debug, Default)]
pub struct QueryParser {
    statement: Option<Statement>,
    plain: String,
}

impl QueryParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a query, replacing any previously held statement.
    /// A parse failure clears the held statement.
    pub fn parse(&mut self, query: &str) -> Result<&Statement, Error> {
        self.statement = None;
        self.plain = query.to_string();

        let result = pg_query::parse(query).map_err(Error::PgQuery)?;
        trace!("{:#?}", result.protobuf);

        let statement = match result.protobuf.stmts.first().and_then(|raw| raw.stmt.as_ref()) {
            Some(root) => Self::convert(root),
            None => Statement::Other,
        };

        debug!("parsed {:?}", discriminant_name(&statement));

        Ok(self.statement.insert(statement))
    }

    /// Last parsed statement, if any.
    pub fn statement(&self) -> Option<&Statement> {
        self.statement.as_ref()
    }

    /// Raw text of the last parse attempt.
    pub fn plain(&self) -> &str {
        &self.plain
    }

    fn convert(root: &pg_query::protobuf::Node) -> Statement {
        match &root.node {
            Some(NodeEnum::SelectStmt(stmt)) => Statement::Select(SelectQuery {
                tables: table_names(&stmt.from_clause),
                where_clause: stmt.where_clause.as_deref().map(Expr::from_node),
            }),

            Some(NodeEnum::InsertStmt(stmt)) => Statement::Insert(InsertQuery::from_stmt(stmt)),

            Some(NodeEnum::UpdateStmt(stmt)) => Statement::Update(UpdateQuery {
                where_clause: stmt.where_clause.as_deref().map(Expr::from_node),
            }),

            Some(
                NodeEnum::CreateStmt(_)
                | NodeEnum::CreateTableAsStmt(_)
                | NodeEnum::CreateSchemaStmt(_)
                | NodeEnum::CreateSeqStmt(_)
                | NodeEnum::IndexStmt(_)
                | NodeEnum::AlterTableStmt(_)
                | NodeEnum::RenameStmt(_)
                | NodeEnum::DropStmt(_)
                | NodeEnum::TruncateStmt(_),
            ) => Statement::Ddl,

            _ => Statement::Other,
        }
    }
}

fn discriminant_name(statement: &Statement) -> &'static str {
    match statement {
        Statement::Select(_) => "SELECT",
        Statement::Insert(_) => "INSERT",
        Statement::Update(_) => "UPDATE",
        Statement::Ddl => "DDL",
        Statement::Other => "other",
    }
}
