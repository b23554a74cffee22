//! Tokenizer for the subset of SQL DDL the importer reads.

use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    Create,
    Alter,
    Add,
    Table,
    Only,
    Primary,
    Key,
    Foreign,
    References,
    Not,
    Null,
    Unique,
    Default,
    On,
    Delete,
    Update,
    Cascade,
    Restrict,
    Set,
    No,
    Action,
    Constraint,
    Index,
    If,
    Exists,
    AutoIncrement,
    Comment,
    Check,

    Ident(String),
    Str(String),
    Num(String),

    LParen,
    RParen,
    Comma,
    Semicolon,
    Dot,
    Eq,

    Eof,
}

fn keyword(word: &str) -> Option<Token> {
    let token = match word.to_ascii_uppercase().as_str() {
        "CREATE" => Token::Create,
        "ALTER" => Token::Alter,
        "ADD" => Token::Add,
        "TABLE" => Token::Table,
        "ONLY" => Token::Only,
        "PRIMARY" => Token::Primary,
        "KEY" => Token::Key,
        "FOREIGN" => Token::Foreign,
        "REFERENCES" => Token::References,
        "NOT" => Token::Not,
        "NULL" => Token::Null,
        "UNIQUE" => Token::Unique,
        "DEFAULT" => Token::Default,
        "ON" => Token::On,
        "DELETE" => Token::Delete,
        "UPDATE" => Token::Update,
        "CASCADE" => Token::Cascade,
        "RESTRICT" => Token::Restrict,
        "SET" => Token::Set,
        "NO" => Token::No,
        "ACTION" => Token::Action,
        "CONSTRAINT" => Token::Constraint,
        "INDEX" => Token::Index,
        "IF" => Token::If,
        "EXISTS" => Token::Exists,
        "AUTO_INCREMENT" | "AUTOINCREMENT" => Token::AutoIncrement,
        "COMMENT" => Token::Comment,
        "CHECK" => Token::Check,
        _ => return None,
    };
    Some(token)
}

pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    current: Option<char>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        let mut chars = input.chars().peekable();
        let current = chars.next();
        Self { chars, current }
    }

    fn bump(&mut self) {
        self.current = self.chars.next();
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn take_while(&mut self, mut keep: impl FnMut(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.current.filter(|&c| keep(c)) {
            out.push(c);
            self.bump();
        }
        out
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.current {
            self.bump();
            if c == '\n' {
                break;
            }
        }
    }

    /// Skips a `/* ... */` comment; the cursor is on the opening `/`.
    fn skip_block(&mut self) {
        self.bump();
        self.bump();
        while let Some(c) = self.current {
            self.bump();
            if c == '*' && self.current == Some('/') {
                self.bump();
                break;
            }
        }
    }

    /// Reads text up to `close`; a doubled `close` stands for itself.
    /// Backslash escapes apply only inside string literals.
    fn read_delimited(&mut self, close: char, escapes: bool) -> String {
        self.bump();
        let mut out = String::new();
        while let Some(c) = self.current {
            if c == close {
                if self.peek() == Some(close) {
                    out.push(c);
                    self.bump();
                    self.bump();
                    continue;
                }
                self.bump();
                break;
            }
            if escapes && c == '\\' {
                self.bump();
                if let Some(escaped) = self.current {
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                    self.bump();
                }
                continue;
            }
            out.push(c);
            self.bump();
        }
        out
    }

    fn read_number(&mut self) -> String {
        let mut num = String::new();
        if self.current == Some('-') {
            num.push('-');
            self.bump();
        }
        let mut seen_dot = false;
        num.push_str(&self.take_while(|c| {
            if c == '.' && !seen_dot {
                seen_dot = true;
                return true;
            }
            c.is_ascii_digit()
        }));
        num
    }

    pub fn next_token(&mut self) -> Token {
        loop {
            let Some(c) = self.current else {
                return Token::Eof;
            };

            let token = match c {
                c if c.is_whitespace() => {
                    self.bump();
                    continue;
                }
                '-' if self.peek() == Some('-') => {
                    self.skip_line();
                    continue;
                }
                '#' => {
                    self.skip_line();
                    continue;
                }
                '/' if self.peek() == Some('*') => {
                    self.skip_block();
                    continue;
                }
                '-' if self.peek().is_some_and(|n| n.is_ascii_digit()) => Token::Num(self.read_number()),
                c if c.is_ascii_digit() => Token::Num(self.read_number()),
                '"' => Token::Ident(self.read_delimited('"', false)),
                '`' => Token::Ident(self.read_delimited('`', false)),
                '[' => Token::Ident(self.read_delimited(']', false)),
                '\'' => Token::Str(self.read_delimited('\'', true)),
                c if c.is_alphabetic() || c == '_' => {
                    let word = self.take_while(|c| c.is_alphanumeric() || c == '_' || c == '$');
                    keyword(&word).unwrap_or(Token::Ident(word))
                }
                single => {
                    self.bump();
                    match single {
                        '(' => Token::LParen,
                        ')' => Token::RParen,
                        ',' => Token::Comma,
                        ';' => Token::Semicolon,
                        '.' => Token::Dot,
                        '=' => Token::Eq,
                        _ => continue,
                    }
                }
            };
            return token;
        }
    }

    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token == Token::Eof;
            tokens.push(token);
            if done {
                return tokens;
            }
        }
    }
}
