//! Parser for CREATE TABLE and ALTER TABLE ... FOREIGN KEY statements.

use thiserror::Error;

use super::dialect::Dialect;
use super::lexer::{Lexer, Token};
use super::types::map_type;
use crate::model::ReferentialAction;

#[derive(Debug, Error)]
pub enum SqlParseError {
    #[error("Unexpected token: {0:?}")]
    UnexpectedToken(Token),
    #[error("Unexpected end of input")]
    UnexpectedEof,
    #[error("No CREATE TABLE statements found")]
    NoTables,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: String,
    pub pk: bool,
    pub nn: bool,
    pub uq: bool,
    pub ai: bool,
    pub default_value: String,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyDef {
    pub columns: Vec<String>,
    pub table: String,
    /// Referenced columns; empty means the referenced table's primary key.
    pub referenced: Vec<String>,
    pub on_delete: ReferentialAction,
    pub on_update: ReferentialAction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableDef {
    pub name: String,
    pub comment: String,
    pub columns: Vec<ColumnDef>,
    pub unique_sets: Vec<Vec<String>>,
    pub foreign_keys: Vec<ForeignKeyDef>,
}

impl TableDef {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Parsed DDL in statement order.
#[derive(Debug, Clone, PartialEq)]
pub struct Ddl {
    pub tables: Vec<TableDef>,
    /// Foreign keys added by `ALTER TABLE`, keyed by table name.
    pub altered: Vec<(String, ForeignKeyDef)>,
}

pub fn parse_ddl(input: &str, dialect: Dialect) -> Result<Ddl, SqlParseError> {
    let dialect = dialect.resolve(input);
    let tokens = Lexer::new(input).tokenize();
    Parser::new(tokens, dialect).parse()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    dialect: Dialect,
}

impl Parser {
    fn new(tokens: Vec<Token>, dialect: Dialect) -> Self {
        Self { tokens, pos: 0, dialect }
    }

    fn current(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    /// Advances past `token` if it is current.
    fn eat(&mut self, token: &Token) -> bool {
        if self.current() == token {
            self.advance();
            return true;
        }
        false
    }

    fn ident(&mut self) -> Option<String> {
        match self.current() {
            Token::Ident(name) => {
                let name = name.clone();
                self.advance();
                Some(name)
            }
            _ => None,
        }
    }

    /// `name` or `schema.name`; the schema part is dropped.
    fn qualified_name(&mut self) -> Option<String> {
        let mut name = self.ident()?;
        while self.eat(&Token::Dot) {
            name = self.ident()?;
        }
        Some(name)
    }

    fn parse(&mut self) -> Result<Ddl, SqlParseError> {
        let mut ddl = Ddl {
            tables: Vec::new(),
            altered: Vec::new(),
        };

        while self.current() != &Token::Eof {
            match self.current() {
                Token::Create => {
                    self.advance();
                    while !matches!(self.current(), Token::Table | Token::Semicolon | Token::Eof) {
                        // TEMPORARY, UNLOGGED, OR REPLACE ...
                        if matches!(self.current(), Token::Ident(_)) && self.pos_is_modifier() {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                    if self.eat(&Token::Table) {
                        if self.eat(&Token::If) {
                            self.eat(&Token::Not);
                            self.eat(&Token::Exists);
                        }
                        if let Some(table) = self.parse_create_table()? {
                            ddl.tables.push(table);
                        }
                    } else {
                        self.skip_statement();
                    }
                }
                Token::Alter => {
                    if let Some(altered) = self.parse_alter_table()? {
                        ddl.altered.push(altered);
                    }
                }
                _ => self.skip_statement(),
            }
        }

        if ddl.tables.is_empty() {
            return Err(SqlParseError::NoTables);
        }
        Ok(ddl)
    }

    fn pos_is_modifier(&self) -> bool {
        match self.current() {
            Token::Ident(word) => matches!(
                word.to_ascii_uppercase().as_str(),
                "TEMPORARY" | "TEMP" | "UNLOGGED" | "GLOBAL" | "LOCAL"
            ),
            _ => false,
        }
    }

    fn parse_create_table(&mut self) -> Result<Option<TableDef>, SqlParseError> {
        let Some(name) = self.qualified_name() else {
            self.skip_statement();
            return Ok(None);
        };
        if !self.eat(&Token::LParen) {
            // CREATE TABLE ... AS SELECT, LIKE, PARTITION OF
            self.skip_statement();
            return Ok(None);
        }

        let mut table = TableDef {
            name,
            comment: String::new(),
            columns: Vec::new(),
            unique_sets: Vec::new(),
            foreign_keys: Vec::new(),
        };
        let mut primary_key: Vec<String> = Vec::new();

        loop {
            match self.current() {
                Token::RParen => {
                    self.advance();
                    break;
                }
                Token::Eof => return Err(SqlParseError::UnexpectedEof),
                Token::Comma => self.advance(),
                Token::Constraint => {
                    self.advance();
                    self.ident();
                }
                Token::Primary => {
                    self.advance();
                    self.eat(&Token::Key);
                    primary_key.extend(self.parse_column_list());
                }
                Token::Foreign => {
                    if let Some(fk) = self.parse_foreign_key()? {
                        table.foreign_keys.push(fk);
                    }
                }
                Token::Unique => {
                    self.advance();
                    self.eat(&Token::Key);
                    // MySQL allows an index name here.
                    self.ident();
                    let columns = self.parse_column_list();
                    if !columns.is_empty() {
                        table.unique_sets.push(columns);
                    }
                }
                Token::Index | Token::Key => self.skip_until(&[Token::Comma, Token::RParen]),
                Token::Check => {
                    self.advance();
                    self.skip_parenthesized();
                }
                Token::Ident(_) => {
                    if let Some((column, reference)) = self.parse_column()? {
                        if column.uq {
                            table.unique_sets.push(vec![column.name.clone()]);
                        }
                        if let Some(fk) = reference {
                            table.foreign_keys.push(fk);
                        }
                        table.columns.push(column);
                    }
                }
                _ => self.advance(),
            }
        }

        self.parse_table_options(&mut table);

        for column in &mut table.columns {
            if primary_key.contains(&column.name) {
                column.pk = true;
            }
            if column.pk {
                column.nn = true;
            }
        }
        for set in &table.unique_sets {
            if let [only] = set.as_slice() {
                if let Some(column) = table.columns.iter_mut().find(|c| &c.name == only) {
                    column.uq = true;
                }
            }
        }
        Ok(Some(table))
    }

    /// Reads trailing options up to `;`, keeping a MySQL table `COMMENT`.
    fn parse_table_options(&mut self, table: &mut TableDef) {
        while !matches!(self.current(), Token::Semicolon | Token::Eof) {
            if self.eat(&Token::Comment) {
                self.eat(&Token::Eq);
                match self.current() {
                    Token::Str(text) => table.comment = text.clone(),
                    _ => continue,
                }
            }
            self.advance();
        }
        self.eat(&Token::Semicolon);
    }

    fn parse_column(&mut self) -> Result<Option<(ColumnDef, Option<ForeignKeyDef>)>, SqlParseError> {
        let Some(name) = self.ident() else {
            return Ok(None);
        };
        let raw_type = self.parse_raw_type();
        if raw_type.is_empty() {
            self.skip_until(&[Token::Comma, Token::RParen]);
            return Ok(None);
        }
        let mapped = map_type(&raw_type, self.dialect);

        let mut column = ColumnDef {
            name,
            data_type: mapped.data_type,
            pk: false,
            nn: false,
            uq: false,
            ai: mapped.auto_increment,
            default_value: String::new(),
            comment: String::new(),
        };
        let mut reference = None;

        loop {
            match self.current() {
                Token::Comma | Token::RParen | Token::Eof => break,
                Token::Primary => {
                    self.advance();
                    self.eat(&Token::Key);
                    column.pk = true;
                }
                Token::Not => {
                    self.advance();
                    if self.eat(&Token::Null) {
                        column.nn = true;
                    }
                }
                Token::Unique => {
                    self.advance();
                    self.eat(&Token::Key);
                    column.uq = true;
                }
                Token::Default => {
                    self.advance();
                    column.default_value = self.parse_default_value();
                }
                Token::AutoIncrement => {
                    self.advance();
                    column.ai = true;
                }
                Token::Comment => {
                    self.advance();
                    if let Token::Str(text) = self.current() {
                        column.comment = text.clone();
                        self.advance();
                    }
                }
                Token::References => {
                    self.advance();
                    let (table, referenced) = self.parse_reference()?;
                    let (on_delete, on_update) = self.parse_actions();
                    reference = Some(ForeignKeyDef {
                        columns: vec![column.name.clone()],
                        table,
                        referenced,
                        on_delete,
                        on_update,
                    });
                }
                Token::Check => {
                    self.advance();
                    self.skip_parenthesized();
                }
                Token::Constraint => {
                    self.advance();
                    self.ident();
                }
                Token::LParen => self.skip_parenthesized(),
                _ => self.advance(),
            }
        }

        Ok(Some((column, reference)))
    }

    /// Collects the type words and their argument list, e.g. `double precision`
    /// or `numeric(10,2)`.
    fn parse_raw_type(&mut self) -> String {
        let mut raw = String::new();
        let mut depth = 0usize;

        loop {
            let part = match self.current() {
                Token::Ident(word) if depth == 0 && is_column_clause(word) => break,
                Token::Ident(word) => {
                    if depth == 0 && raw.ends_with(|c: char| c.is_alphanumeric() || c == ')') {
                        raw.push(' ');
                    }
                    word.clone()
                }
                Token::LParen => {
                    depth += 1;
                    "(".to_string()
                }
                Token::RParen if depth > 0 => {
                    depth -= 1;
                    ")".to_string()
                }
                Token::Num(n) if depth > 0 => n.clone(),
                Token::Str(s) if depth > 0 => format!("'{}'", s),
                Token::Comma if depth > 0 => ",".to_string(),
                _ => break,
            };
            raw.push_str(&part);
            self.advance();
        }
        raw
    }

    fn parse_default_value(&mut self) -> String {
        let value = match self.current() {
            Token::Str(s) => s.clone(),
            Token::Num(n) => n.clone(),
            Token::Null => "NULL".to_string(),
            Token::Ident(word) => {
                let mut value = word.clone();
                self.advance();
                if self.current() == &Token::LParen {
                    self.advance();
                    value.push('(');
                    value.push_str(&self.collect_until_paren());
                    value.push(')');
                }
                return value;
            }
            Token::LParen => {
                self.advance();
                return format!("({})", self.collect_until_paren());
            }
            _ => return String::new(),
        };
        self.advance();
        value
    }

    /// Joins tokens up to the matching `)`, which is consumed.
    fn collect_until_paren(&mut self) -> String {
        let mut parts = Vec::new();
        let mut depth = 1;

        loop {
            let part = match self.current() {
                Token::Eof => break,
                Token::LParen => {
                    depth += 1;
                    "(".to_string()
                }
                Token::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        break;
                    }
                    ")".to_string()
                }
                Token::Ident(s) | Token::Num(s) => s.clone(),
                Token::Str(s) => format!("'{}'", s),
                Token::Comma => ",".to_string(),
                _ => {
                    self.advance();
                    continue;
                }
            };
            parts.push(part);
            self.advance();
        }
        parts.join(" ")
    }

    /// `table [(col, ...)]` after REFERENCES.
    fn parse_reference(&mut self) -> Result<(String, Vec<String>), SqlParseError> {
        match self.current() {
            Token::Ident(_) => {}
            Token::Eof => return Err(SqlParseError::UnexpectedEof),
            other => return Err(SqlParseError::UnexpectedToken(other.clone())),
        }
        let table = self.qualified_name().ok_or(SqlParseError::UnexpectedEof)?;
        let referenced = self.parse_column_list();
        Ok((table, referenced))
    }

    fn parse_actions(&mut self) -> (ReferentialAction, ReferentialAction) {
        let mut on_delete = ReferentialAction::NoAction;
        let mut on_update = ReferentialAction::NoAction;

        while self.current() == &Token::On {
            self.advance();
            let slot = match self.current() {
                Token::Delete => &mut on_delete,
                Token::Update => &mut on_update,
                _ => break,
            };
            self.advance();

            *slot = match self.current() {
                Token::Cascade => ReferentialAction::Cascade,
                Token::Restrict => ReferentialAction::Restrict,
                Token::Set => {
                    self.advance();
                    match self.current() {
                        Token::Null => ReferentialAction::SetNull,
                        Token::Default => ReferentialAction::SetDefault,
                        _ => continue,
                    }
                }
                Token::No => {
                    self.advance();
                    if self.current() != &Token::Action {
                        continue;
                    }
                    ReferentialAction::NoAction
                }
                _ => continue,
            };
            self.advance();
        }
        (on_delete, on_update)
    }

    /// `FOREIGN KEY (cols) REFERENCES table (cols) [ON ...]`; the cursor is on FOREIGN.
    fn parse_foreign_key(&mut self) -> Result<Option<ForeignKeyDef>, SqlParseError> {
        self.advance();
        if !self.eat(&Token::Key) {
            return Ok(None);
        }
        // Optional index name (MySQL).
        self.ident();
        let columns = self.parse_column_list();
        if !self.eat(&Token::References) {
            return Ok(None);
        }
        let (table, referenced) = self.parse_reference()?;
        let (on_delete, on_update) = self.parse_actions();

        Ok(Some(ForeignKeyDef {
            columns,
            table,
            referenced,
            on_delete,
            on_update,
        }))
    }

    fn parse_column_list(&mut self) -> Vec<String> {
        let mut columns = Vec::new();
        if !self.eat(&Token::LParen) {
            return columns;
        }
        loop {
            match self.current() {
                Token::Ident(name) => {
                    columns.push(name.clone());
                    self.advance();
                }
                Token::RParen => {
                    self.advance();
                    break;
                }
                Token::Eof => break,
                // Prefix lengths and sort orders: `name(10) DESC`
                Token::LParen => self.skip_parenthesized(),
                _ => self.advance(),
            }
        }
        columns
    }

    /// `ALTER TABLE [ONLY] t ADD [CONSTRAINT name] FOREIGN KEY ...`
    fn parse_alter_table(&mut self) -> Result<Option<(String, ForeignKeyDef)>, SqlParseError> {
        self.advance();
        if !self.eat(&Token::Table) {
            self.skip_statement();
            return Ok(None);
        }
        self.eat(&Token::Only);
        let Some(table) = self.qualified_name() else {
            self.skip_statement();
            return Ok(None);
        };
        if !self.eat(&Token::Add) {
            self.skip_statement();
            return Ok(None);
        }
        if self.eat(&Token::Constraint) {
            self.ident();
        }
        if self.current() != &Token::Foreign {
            self.skip_statement();
            return Ok(None);
        }

        let fk = self.parse_foreign_key()?;
        self.skip_statement();
        Ok(fk.map(|fk| (table, fk)))
    }

    fn skip_parenthesized(&mut self) {
        if !self.eat(&Token::LParen) {
            self.advance();
            return;
        }
        let mut depth = 1;
        while depth > 0 {
            match self.current() {
                Token::LParen => depth += 1,
                Token::RParen => depth -= 1,
                Token::Eof => break,
                _ => {}
            }
            self.advance();
        }
    }

    fn skip_statement(&mut self) {
        while !matches!(self.current(), Token::Semicolon | Token::Eof) {
            self.advance();
        }
        self.eat(&Token::Semicolon);
    }

    fn skip_until(&mut self, tokens: &[Token]) {
        while !tokens.contains(self.current()) && self.current() != &Token::Eof {
            if self.current() == &Token::LParen {
                self.skip_parenthesized();
            } else {
                self.advance();
            }
        }
    }
}

/// Words that end a column's type and start its clauses.
fn is_column_clause(word: &str) -> bool {
    matches!(
        word.to_ascii_uppercase().as_str(),
        "COLLATE" | "GENERATED" | "CHARSET"
    )
}
