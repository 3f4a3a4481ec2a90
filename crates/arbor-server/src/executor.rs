//! Runs parsed statements against the catalog and renders text responses.

use crate::parser;
use crate::statement::{KeyFilter, Statement};
use crate::users::UserStore;
use arbor_common::{ArborError, ErrorKind, Result};
use arbor_storage::{Catalog, Record, Schema, Session};
use std::sync::Arc;
use tracing::{debug, error};

const HELP: &[&str] = &[
    "CREATE DATABASE <name>;                      create database blog;",
    "USE <name>;                                  use blog;",
    "CREATE TABLE <name> (<col> INT|STRING, ...); create table user (id int, name string);",
    "INSERT INTO <t> (<col>, ...) VALUES (...);   insert into user (id, name) values (1, 'ann');",
    "SELECT * FROM <t> [WHERE <key> = <n>];       select * from user where id = 1;",
    "UPDATE <t> SET <col> = <v>, ... WHERE <key> = <n>; update user set name = 'bo' where id = 1;",
    "DELETE FROM <t> WHERE <key> = <n>;           delete from user where id = 1;",
    "SHOW DATABASES; SHOW TABLES;",
    "LOGIN <user> <password>;",
    "EXIT;",
];

/// Lines sent back for one request. The transport appends the `END` line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    lines: Vec<String>,
    close: bool,
}

impl Response {
    pub fn new(lines: Vec<String>) -> Self {
        Self {
            lines,
            close: false,
        }
    }

    pub fn line(line: impl Into<String>) -> Self {
        Self::new(vec![line.into()])
    }

    pub fn error(err: &ArborError) -> Self {
        Self::line(format!("ERROR: {}", err))
    }

    /// Final response before the server closes the connection.
    pub fn closing(line: impl Into<String>) -> Self {
        Self {
            lines: vec![line.into()],
            close: true,
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_closing(&self) -> bool {
        self.close
    }
}

/// Per-connection state: selected database and logged-in user.
#[derive(Debug, Default)]
pub struct ClientState {
    pub session: Session,
    user: Option<String>,
}

impl ClientState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }
}

/// Shared statement executor.
pub struct Executor {
    catalog: Arc<Catalog>,
    users: UserStore,
    require_auth: bool,
}

impl Executor {
    pub fn new(catalog: Arc<Catalog>, users: UserStore, require_auth: bool) -> Self {
        Self {
            catalog,
            users,
            require_auth,
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Parses and runs one request line. Failures become an `ERROR:` line.
    pub fn execute_line(&self, client: &mut ClientState, line: &str) -> Response {
        if line.trim().is_empty() {
            return Response::default();
        }
        match parser::parse(line).and_then(|statement| self.execute(client, statement)) {
            Ok(response) => response,
            Err(err) => {
                match err.kind() {
                    ErrorKind::IoFailure | ErrorKind::Internal => {
                        error!(error = %err, "statement failed");
                    }
                    _ => debug!(error = %err, "statement rejected"),
                }
                Response::error(&err)
            }
        }
    }

    /// Runs a parsed statement.
    pub fn execute(&self, client: &mut ClientState, statement: Statement) -> Result<Response> {
        if self.require_auth && client.user.is_none() && !statement.is_unauthenticated() {
            return Err(ArborError::AuthenticationRequired);
        }
        debug!(statement = statement.kind(), user = ?client.user, "executing");

        let catalog = &self.catalog;
        let session = &mut client.session;
        match statement {
            Statement::CreateDatabase { name } => {
                catalog.create_database(session, &name)?;
                Ok(Response::line(format!("Database {} created", name)))
            }
            Statement::Use { name } => {
                catalog.use_database(session, &name)?;
                Ok(Response::line(format!("Database changed to {}", name)))
            }
            Statement::CreateTable { name, columns } => {
                catalog.create_table(session, &name, Schema::new(columns)?)?;
                Ok(Response::line(format!("Table {} created", name)))
            }
            Statement::Insert {
                table,
                columns,
                values,
            } => {
                let record: Record = columns.into_iter().zip(values).collect();
                catalog.insert(session, &table, record)?;
                Ok(Response::line("1 row inserted"))
            }
            Statement::Update {
                table,
                assignments,
                filter,
            } => {
                let key = self.primary_key(session, &table, &filter)?;
                let mut record: Record = assignments.into_iter().collect();
                record.set(filter.column, key);
                let updated = catalog.update(session, &table, record)?;
                Ok(Response::line(if updated {
                    "1 row updated"
                } else {
                    "0 rows updated"
                }))
            }
            Statement::Select { table, filter } => {
                let mut rows: Vec<(i64, Record)> = match filter {
                    Some(filter) => {
                        let key = self.primary_key(session, &table, &filter)?;
                        catalog
                            .select(session, &table, key)?
                            .map(|record| (key, record))
                            .into_iter()
                            .collect()
                    }
                    None => catalog.select_all(session, &table)?.into_iter().collect(),
                };
                rows.sort_by_key(|(key, _)| *key);
                Ok(render_rows(rows))
            }
            Statement::Delete { table, filter } => {
                let key = self.primary_key(session, &table, &filter)?;
                let deleted = catalog.delete(session, &table, key)?;
                Ok(Response::line(if deleted {
                    "1 row deleted"
                } else {
                    "0 rows deleted"
                }))
            }
            Statement::ShowDatabases => Ok(Response::new(catalog.databases())),
            Statement::ShowTables => Ok(Response::new(catalog.tables(session)?)),
            Statement::Help => Ok(Response::new(HELP.iter().map(|l| l.to_string()).collect())),
            Statement::Login { user, password } => {
                self.users.authenticate(&user, &password)?;
                let response = Response::line(format!("Logged in as {}", user));
                client.user = Some(user);
                Ok(response)
            }
            Statement::Exit => Ok(Response::closing("BYE")),
        }
    }

    /// Checks that a `WHERE` clause names the table's primary key.
    fn primary_key(&self, session: &Session, table: &str, filter: &KeyFilter) -> Result<i64> {
        let table = self.catalog.table(session, table)?;
        let primary = &table.schema().primary_key().name;
        if &filter.column != primary {
            return Err(ArborError::MalformedStatement(format!(
                "WHERE must name the primary key {}, not {}",
                primary, filter.column
            )));
        }
        Ok(filter.key)
    }
}

fn render_rows(rows: Vec<(i64, Record)>) -> Response {
    let count = rows.len();
    let mut lines: Vec<String> = rows.iter().map(|(_, record)| record.to_string()).collect();
    lines.push(match count {
        1 => "(1 row)".to_string(),
        n => format!("({} rows)", n),
    });
    Response::new(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_common::StorageConfig;
    use tempfile::{tempdir, TempDir};

    fn executor(require_auth: bool) -> (TempDir, Executor) {
        let dir = tempdir().unwrap();
        let config = StorageConfig {
            data_dir: dir.path().join("data"),
            ..StorageConfig::default()
        };
        let catalog = Arc::new(Catalog::new(&config).unwrap());
        let users = UserStore::open(&dir.path().join("users.txt")).unwrap();
        (dir, Executor::new(catalog, users, require_auth))
    }

    fn run(executor: &Executor, client: &mut ClientState, line: &str) -> Vec<String> {
        executor.execute_line(client, line).lines().to_vec()
    }

    #[test]
    fn test_full_session() {
        let (_dir, executor) = executor(false);
        let mut client = ClientState::new();

        assert_eq!(run(&executor, &mut client, "create database blog;"), ["Database BLOG created"]);
        assert_eq!(
            run(&executor, &mut client, "create table user (id int, name string, age int);"),
            ["Table USER created"]
        );
        assert_eq!(
            run(&executor, &mut client, "insert into user (id, name, age) values (2, 'bo', 40);"),
            ["1 row inserted"]
        );
        run(&executor, &mut client, "insert into user (id, name, age) values (1, 'ann', 30);");

        assert_eq!(
            run(&executor, &mut client, "select * from user;"),
            [
                "{AGE: 30, ID: 1, NAME: 'ann'}",
                "{AGE: 40, ID: 2, NAME: 'bo'}",
                "(2 rows)"
            ]
        );
        assert_eq!(
            run(&executor, &mut client, "update user set name = 'al' where id = 1;"),
            ["1 row updated"]
        );
        assert_eq!(
            run(&executor, &mut client, "select * from user where id = 1;"),
            ["{ID: 1, NAME: 'al'}", "(1 row)"]
        );
        assert_eq!(
            run(&executor, &mut client, "update user set name = 'zz' where id = 9;"),
            ["0 rows updated"]
        );
        assert_eq!(run(&executor, &mut client, "delete from user where id = 1;"), ["1 row deleted"]);
        assert_eq!(run(&executor, &mut client, "select * from user where id = 1;"), ["(0 rows)"]);
        assert_eq!(run(&executor, &mut client, "show tables;"), ["USER"]);
        assert_eq!(run(&executor, &mut client, "show databases;"), ["BLOG"]);
    }

    #[test]
    fn test_errors_become_error_lines() {
        let (_dir, executor) = executor(false);
        let mut client = ClientState::new();

        assert_eq!(
            run(&executor, &mut client, "select * from user;"),
            ["ERROR: No database selected"]
        );
        assert_eq!(
            run(&executor, &mut client, "use nowhere;"),
            ["ERROR: Database not found: NOWHERE"]
        );
        run(&executor, &mut client, "create database d;");
        run(&executor, &mut client, "create table t (id int, age int);");
        assert_eq!(
            run(&executor, &mut client, "insert into t (id, age) values (1, 'old');"),
            ["ERROR: Type mismatch for column AGE: expected INT, got STRING"]
        );
        let lines = run(&executor, &mut client, "select * from t where age = 3;");
        assert!(lines[0].starts_with("ERROR: Malformed statement"), "{:?}", lines);
        let lines = run(&executor, &mut client, "create table s (name string);");
        assert!(lines[0].starts_with("ERROR: Invalid schema"), "{:?}", lines);
    }

    #[test]
    fn test_empty_line_has_no_output() {
        let (_dir, executor) = executor(false);
        let response = executor.execute_line(&mut ClientState::new(), "   ");
        assert!(response.lines().is_empty());
        assert!(!response.is_closing());
    }

    #[test]
    fn test_exit_closes() {
        let (_dir, executor) = executor(false);
        let response = executor.execute_line(&mut ClientState::new(), "exit;");
        assert_eq!(response.lines(), ["BYE"]);
        assert!(response.is_closing());
    }

    #[test]
    fn test_authentication_gate() {
        let (_dir, executor) = executor(true);
        let mut client = ClientState::new();

        assert_eq!(
            run(&executor, &mut client, "show databases;"),
            ["ERROR: Authentication required"]
        );
        assert_eq!(run(&executor, &mut client, "help;").len(), HELP.len());
        assert_eq!(
            run(&executor, &mut client, "login root nope;"),
            ["ERROR: Authentication failed for user root"]
        );
        assert_eq!(client.user(), None);

        assert_eq!(run(&executor, &mut client, "login root 1234;"), ["Logged in as root"]);
        assert_eq!(client.user(), Some("root"));
        assert!(run(&executor, &mut client, "show databases;").is_empty());
    }
}
