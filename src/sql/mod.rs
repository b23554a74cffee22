//! SQL dump import: CREATE TABLE and foreign key statements to a diagram graph.

mod dialect;
mod import;
mod lexer;
mod parser;
mod types;

pub use dialect::Dialect;
pub use import::{parse_sql, SqlImport};
pub use parser::SqlParseError;
