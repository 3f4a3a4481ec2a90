//! Statement tokenizer and parser.
//!
//! Keywords are case-insensitive and identifiers are upper-cased. Values are
//! single-quoted text (case preserved, `''` escapes a quote), bare integers,
//! or bare words, which become upper-cased text. A trailing `;` is optional.

use crate::statement::{KeyFilter, Statement};
use arbor_common::{ArborError, Column, ColumnType, Result, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    /// Bare word or number, as typed.
    Word(String),
    /// Single-quoted literal with quotes removed.
    Quoted(String),
    LParen,
    RParen,
    Comma,
    Equals,
    Star,
}

impl Token {
    fn display_name(&self) -> String {
        match self {
            Token::Word(w) => format!("'{}'", w),
            Token::Quoted(s) => format!("string '{}'", s),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Equals => "'='".to_string(),
            Token::Star => "'*'".to_string(),
        }
    }
}

fn malformed(message: impl Into<String>) -> ArborError {
    ArborError::MalformedStatement(message.into())
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' | ')' | ',' | '=' | '*' => {
                chars.next();
                tokens.push(match c {
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    ',' => Token::Comma,
                    '=' => Token::Equals,
                    _ => Token::Star,
                });
            }
            ';' => {
                chars.next();
                if chars.any(|c| !c.is_whitespace()) {
                    return Err(malformed("unexpected input after ';'"));
                }
            }
            '\'' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some('\'') if chars.peek() == Some(&'\'') => {
                            chars.next();
                            text.push('\'');
                        }
                        Some('\'') => break,
                        Some(c) => text.push(c),
                        None => return Err(malformed("unterminated string literal")),
                    }
                }
                tokens.push(Token::Quoted(text));
            }
            _ => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || "(),=*;'".contains(c) {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
        }
    }
    Ok(tokens)
}

/// Parses one statement.
pub fn parse(input: &str) -> Result<Statement> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let statement = parser.statement()?;
    match parser.peek() {
        None => Ok(statement),
        Some(token) => Err(malformed(format!(
            "unexpected {} after {}",
            token.display_name(),
            statement.kind()
        ))),
    }
}

fn is_identifier(word: &str) -> bool {
    let mut chars = word.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn statement(&mut self) -> Result<Statement> {
        let Some(Token::Word(word)) = self.peek().cloned() else {
            return Err(malformed("expected a statement"));
        };
        self.advance();

        match word.to_uppercase().as_str() {
            "CREATE" => {
                if self.consume_keyword("DATABASE") {
                    Ok(Statement::CreateDatabase {
                        name: self.expect_identifier()?,
                    })
                } else if self.consume_keyword("TABLE") {
                    self.create_table()
                } else {
                    Err(malformed("expected DATABASE or TABLE after CREATE"))
                }
            }
            "USE" => Ok(Statement::Use {
                name: self.expect_identifier()?,
            }),
            "INSERT" => self.insert(),
            "UPDATE" => self.update(),
            "SELECT" => self.select(),
            "DELETE" => {
                self.expect_keyword("FROM")?;
                let table = self.expect_identifier()?;
                let filter = self.filter()?;
                Ok(Statement::Delete { table, filter })
            }
            "SHOW" => {
                if self.consume_keyword("DATABASES") {
                    Ok(Statement::ShowDatabases)
                } else if self.consume_keyword("TABLES") {
                    Ok(Statement::ShowTables)
                } else {
                    Err(malformed("expected DATABASES or TABLES after SHOW"))
                }
            }
            "HELP" => Ok(Statement::Help),
            "LOGIN" => {
                let user = self.expect_raw("user name")?;
                let password = self.expect_raw("password")?;
                Ok(Statement::Login { user, password })
            }
            "EXIT" | "QUIT" => Ok(Statement::Exit),
            other => Err(malformed(format!("unknown statement {}", other))),
        }
    }

    fn create_table(&mut self) -> Result<Statement> {
        let name = self.expect_identifier()?;
        self.expect_token(Token::LParen)?;
        let mut columns = Vec::new();
        loop {
            let column = self.expect_identifier()?;
            let type_name = self.expect_identifier()?;
            let column_type = ColumnType::from_keyword(&type_name)
                .ok_or_else(|| malformed(format!("unknown column type {}", type_name)))?;
            columns.push(Column::new(column, column_type));
            if !self.consume_token(Token::Comma) {
                break;
            }
        }
        self.expect_token(Token::RParen)?;
        Ok(Statement::CreateTable { name, columns })
    }

    fn insert(&mut self) -> Result<Statement> {
        self.expect_keyword("INTO")?;
        let table = self.expect_identifier()?;

        self.expect_token(Token::LParen)?;
        let mut columns = vec![self.expect_identifier()?];
        while self.consume_token(Token::Comma) {
            let column = self.expect_identifier()?;
            if columns.contains(&column) {
                return Err(malformed(format!("column {} listed twice", column)));
            }
            columns.push(column);
        }
        self.expect_token(Token::RParen)?;

        self.expect_keyword("VALUES")?;
        self.expect_token(Token::LParen)?;
        let mut values = vec![self.expect_value()?];
        while self.consume_token(Token::Comma) {
            values.push(self.expect_value()?);
        }
        self.expect_token(Token::RParen)?;

        if columns.len() != values.len() {
            return Err(malformed(format!(
                "{} columns but {} values",
                columns.len(),
                values.len()
            )));
        }
        Ok(Statement::Insert {
            table,
            columns,
            values,
        })
    }

    fn update(&mut self) -> Result<Statement> {
        let table = self.expect_identifier()?;
        self.expect_keyword("SET")?;

        let mut assignments = Vec::new();
        while !self.check_keyword("WHERE") {
            let column = self.expect_identifier()?;
            if assignments.iter().any(|(assigned, _)| assigned == &column) {
                return Err(malformed(format!("column {} assigned twice", column)));
            }
            self.expect_token(Token::Equals)?;
            assignments.push((column, self.expect_value()?));
            self.consume_token(Token::Comma);
            if self.peek().is_none() {
                return Err(malformed("UPDATE requires a WHERE clause"));
            }
        }
        if assignments.is_empty() {
            return Err(malformed("UPDATE requires at least one assignment"));
        }

        let filter = self.filter()?;
        Ok(Statement::Update {
            table,
            assignments,
            filter,
        })
    }

    fn select(&mut self) -> Result<Statement> {
        self.expect_token(Token::Star)?;
        self.expect_keyword("FROM")?;
        let table = self.expect_identifier()?;
        let filter = if self.check_keyword("WHERE") {
            Some(self.filter()?)
        } else {
            None
        };
        Ok(Statement::Select { table, filter })
    }

    /// `WHERE <column> = <integer>`
    fn filter(&mut self) -> Result<KeyFilter> {
        self.expect_keyword("WHERE")?;
        let column = self.expect_identifier()?;
        self.expect_token(Token::Equals)?;
        match self.expect_value()? {
            Value::Integer(key) => Ok(KeyFilter { column, key }),
            Value::Text(text) => Err(malformed(format!("invalid key value {}", text))),
        }
    }

    // ==================== Helper methods ====================

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn current_token_name(&self) -> String {
        self.peek()
            .map_or("end of input".to_string(), Token::display_name)
    }

    fn check_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword))
    }

    fn consume_keyword(&mut self, keyword: &str) -> bool {
        if self.check_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        if self.consume_keyword(keyword) {
            Ok(())
        } else {
            Err(malformed(format!(
                "expected {}, found {}",
                keyword,
                self.current_token_name()
            )))
        }
    }

    fn consume_token(&mut self, token: Token) -> bool {
        if self.peek() == Some(&token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_token(&mut self, token: Token) -> Result<()> {
        if self.consume_token(token.clone()) {
            Ok(())
        } else {
            Err(malformed(format!(
                "expected {}, found {}",
                token.display_name(),
                self.current_token_name()
            )))
        }
    }

    /// Upper-cased bare word matching `[A-Za-z_][A-Za-z0-9_]*`.
    fn expect_identifier(&mut self) -> Result<String> {
        match self.peek() {
            Some(Token::Word(w)) if is_identifier(w) => {
                let name = w.to_uppercase();
                self.advance();
                Ok(name)
            }
            _ => Err(malformed(format!(
                "expected identifier, found {}",
                self.current_token_name()
            ))),
        }
    }

    fn expect_value(&mut self) -> Result<Value> {
        let value = match self.peek() {
            Some(Token::Quoted(text)) => Value::Text(text.clone()),
            Some(Token::Word(w)) => match w.parse::<i64>() {
                Ok(n) => Value::Integer(n),
                Err(_) => Value::Text(w.to_uppercase()),
            },
            _ => {
                return Err(malformed(format!(
                    "expected value, found {}",
                    self.current_token_name()
                )))
            }
        };
        self.advance();
        Ok(value)
    }

    /// Word or quoted literal exactly as typed.
    fn expect_raw(&mut self, what: &str) -> Result<String> {
        match self.peek() {
            Some(Token::Word(text) | Token::Quoted(text)) => {
                let text = text.clone();
                self.advance();
                Ok(text)
            }
            _ => Err(malformed(format!(
                "expected {}, found {}",
                what,
                self.current_token_name()
            ))),
        }
    }
}
