//! Which flavour of SQL a dump was written in.

/// Dialects the importer distinguishes. `Auto` sniffs the dump first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    #[default]
    Auto,
    Generic,
    PostgreSQL,
    MySQL,
}

impl Dialect {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "generic" | "sql" => Some(Self::Generic),
            "postgres" | "postgresql" | "pg" => Some(Self::PostgreSQL),
            "mysql" | "mariadb" => Some(Self::MySQL),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Generic => "generic",
            Self::PostgreSQL => "postgresql",
            Self::MySQL => "mysql",
        }
    }

    /// Guesses from dump headers first, then from dialect-only syntax.
    pub fn detect(content: &str) -> Self {
        let lower = content.to_lowercase();

        let postgres_header = ["postgresql database dump", "pg_dump"];
        let mysql_header = ["mysql dump", "mysqldump", "mariadb dump"];
        if postgres_header.iter().any(|h| lower.contains(h)) {
            return Self::PostgreSQL;
        }
        if mysql_header.iter().any(|h| lower.contains(h)) {
            return Self::MySQL;
        }

        let postgres_syntax = ["serial", "::", "timestamptz", "jsonb", "alter table only"];
        let mysql_syntax = ["auto_increment", "engine=", "`", "unsigned", "tinyint"];
        if postgres_syntax.iter().any(|s| lower.contains(s)) {
            return Self::PostgreSQL;
        }
        if mysql_syntax.iter().any(|s| lower.contains(s)) {
            return Self::MySQL;
        }
        Self::Generic
    }

    pub fn resolve(self, content: &str) -> Self {
        match self {
            Self::Auto => Self::detect(content),
            other => other,
        }
    }
}
