//! Normalizes dialect-specific column types to the type names the diagram uses.

use super::Dialect;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedType {
    pub data_type: String,
    /// The type itself implies auto-increment (`SERIAL` and friends).
    pub auto_increment: bool,
}

impl MappedType {
    fn plain(data_type: impl Into<String>) -> Self {
        Self {
            data_type: data_type.into(),
            auto_increment: false,
        }
    }

    fn serial(data_type: &str) -> Self {
        Self {
            data_type: data_type.to_string(),
            auto_increment: true,
        }
    }
}

/// Types whose length/precision arguments are worth keeping.
const SIZED: &[&str] = &["VARCHAR", "CHAR", "DECIMAL", "NUMERIC", "BINARY", "VARBINARY", "BIT"];

/// Maps a raw SQL type such as `character varying(40)` to `VARCHAR(40)`.
pub fn map_type(raw: &str, dialect: Dialect) -> MappedType {
    let raw = raw.trim();
    // Trailing modifiers after the argument list (`UNSIGNED`, `WITH TIME ZONE`) are dropped.
    let (base, args) = match raw.find('(') {
        Some(i) => {
            let end = raw[i..].find(')').map_or(raw.len(), |j| i + j + 1);
            (raw[..i].trim(), Some(&raw[i..end]))
        }
        None => (raw, None),
    };
    let base = base.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();

    let mut mapped = match dialect {
        Dialect::PostgreSQL => map_postgres(&base),
        Dialect::MySQL => map_mysql(&base, args),
        _ => map_generic(&base),
    };
    if let Some(args) = args {
        if SIZED.contains(&mapped.data_type.as_str()) {
            mapped.data_type.push_str(&args.replace(' ', ""));
        }
    }
    mapped
}

fn map_postgres(base: &str) -> MappedType {
    match base {
        "serial" | "serial4" => MappedType::serial("INT"),
        "bigserial" | "serial8" => MappedType::serial("BIGINT"),
        "smallserial" | "serial2" => MappedType::serial("SMALLINT"),
        "int4" => MappedType::plain("INT"),
        "int8" => MappedType::plain("BIGINT"),
        "int2" => MappedType::plain("SMALLINT"),
        "float4" => MappedType::plain("FLOAT"),
        "float8" => MappedType::plain("DOUBLE"),
        "timestamptz" | "timestamp with time zone" | "timestamp without time zone" => MappedType::plain("TIMESTAMP"),
        "timetz" | "time with time zone" | "time without time zone" => MappedType::plain("TIME"),
        "jsonb" => MappedType::plain("JSON"),
        "bytea" => MappedType::plain("BYTEA"),
        "interval" => MappedType::plain("INTERVAL"),
        other => map_generic(other),
    }
}

fn map_mysql(base: &str, args: Option<&str>) -> MappedType {
    match base {
        "tinyint" if args.is_some_and(|a| a.replace(' ', "") == "(1)") => MappedType::plain("BOOLEAN"),
        "tinyint" => MappedType::plain("TINYINT"),
        "mediumint" => MappedType::plain("MEDIUMINT"),
        "longtext" | "mediumtext" | "tinytext" => MappedType::plain("TEXT"),
        "longblob" | "mediumblob" | "tinyblob" => MappedType::plain("BLOB"),
        "enum" | "set" => MappedType::plain("ENUM"),
        "year" => MappedType::plain("YEAR"),
        other => map_generic(other),
    }
}

fn map_generic(base: &str) -> MappedType {
    let name = match base {
        "int" | "integer" => "INT",
        "bigint" => "BIGINT",
        "smallint" => "SMALLINT",
        "real" | "float" => "FLOAT",
        "double" | "double precision" => "DOUBLE",
        "decimal" | "numeric" => "DECIMAL",
        "varchar" | "character varying" | "nvarchar" => "VARCHAR",
        "char" | "character" | "nchar" => "CHAR",
        "text" | "clob" => "TEXT",
        "timestamp" | "datetime" => "TIMESTAMP",
        "date" => "DATE",
        "time" => "TIME",
        "boolean" | "bool" => "BOOLEAN",
        "blob" => "BLOB",
        "binary" => "BINARY",
        "varbinary" => "VARBINARY",
        "uuid" => "UUID",
        "json" => "JSON",
        other => return MappedType::plain(other.to_uppercase()),
    };
    MappedType::plain(name)
}
