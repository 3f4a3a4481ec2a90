//! End-to-end tests over TCP.

use std::sync::Arc;

use arbor_common::{ServerConfig, StorageConfig};
use arbor_server::{unescape_line, Executor, Server, UserStore, END_MARKER};
use arbor_storage::{read_rows, Catalog};
use tempfile::{tempdir, TempDir};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

// =============================================================================
// Test harness
// =============================================================================

struct TestServer {
    _dir: TempDir,
    addr: std::net::SocketAddr,
    data_dir: std::path::PathBuf,
}

async fn start(config: ServerConfig) -> TestServer {
    let dir = tempdir().unwrap();
    let storage = StorageConfig {
        data_dir: dir.path().join("data"),
        ..StorageConfig::default()
    };
    let catalog = Arc::new(Catalog::new(&storage).unwrap());
    let users = UserStore::open(&dir.path().join("users.txt")).unwrap();
    let executor = Arc::new(Executor::new(catalog, users, config.require_auth));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server = Server::new(listener, executor, &config);
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.serve());

    TestServer {
        _dir: dir,
        addr,
        data_dir: storage.data_dir,
    }
}

struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(server: &TestServer) -> Self {
        let stream = TcpStream::connect(server.addr).await.unwrap();
        let (read, writer) = stream.into_split();
        Self {
            reader: BufReader::new(read),
            writer,
        }
    }

    /// Reads lines up to the end marker. `None` when the server closed first.
    async fn read_response(&mut self) -> Option<Vec<String>> {
        let mut lines = Vec::new();
        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line).await.unwrap() == 0 {
                return None;
            }
            let line = line.trim_end().to_string();
            if line == END_MARKER {
                return Some(lines);
            }
            lines.push(unescape_line(&line).to_string());
        }
    }

    async fn send(&mut self, request: &str) -> Vec<String> {
        self.writer
            .write_all(format!("{}\n", request).as_bytes())
            .await
            .unwrap();
        self.read_response().await.expect("server closed connection")
    }

    /// True once the server has hung up (EOF or reset).
    async fn is_closed(&mut self) -> bool {
        let mut line = String::new();
        matches!(self.reader.read_line(&mut line).await, Ok(0) | Err(_))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_statement_round_trip() {
    let server = start(ServerConfig::default()).await;
    let mut client = Client::connect(&server).await;

    assert_eq!(client.send("create database d;").await, ["Database D created"]);
    assert_eq!(client.send("create table t (id int, name string);").await, ["Table T created"]);
    assert_eq!(
        client.send("insert into t (id, name) values (1, 'a');").await,
        ["1 row inserted"]
    );
    assert_eq!(
        client.send("select * from t where id = 1;").await,
        ["{ID: 1, NAME: 'a'}", "(1 row)"]
    );

    let csv = server.data_dir.join("D").join("T.csv");
    assert_eq!(read_rows(&csv).unwrap().len(), 1);

    assert_eq!(client.send("delete from t where id = 1;").await, ["1 row deleted"]);
    assert_eq!(client.send("select * from t where id = 1;").await, ["(0 rows)"]);
    assert!(read_rows(&csv).unwrap().is_empty());
}

#[tokio::test]
async fn test_errors_keep_connection_open() {
    let server = start(ServerConfig::default()).await;
    let mut client = Client::connect(&server).await;

    let lines = client.send("frobnicate;").await;
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("ERROR: Malformed statement"), "{:?}", lines);

    assert_eq!(client.send("use nope;").await, ["ERROR: Database not found: NOPE"]);
    assert!(client.send("").await.is_empty());
    assert_eq!(client.send("show databases;").await, Vec::<String>::new());
}

#[tokio::test]
async fn test_exit_closes_connection() {
    let server = start(ServerConfig::default()).await;
    let mut client = Client::connect(&server).await;

    assert_eq!(client.send("exit;").await, ["BYE"]);
    assert!(client.is_closed().await);
}

#[tokio::test]
async fn test_sessions_select_databases_independently() {
    let server = start(ServerConfig::default()).await;
    let mut a = Client::connect(&server).await;
    let mut b = Client::connect(&server).await;

    a.send("create database one;").await;
    b.send("create database two;").await;
    a.send("create table t (id int);").await;

    assert_eq!(a.send("show tables;").await, ["T"]);
    assert!(b.send("show tables;").await.is_empty());
    assert_eq!(
        b.send("select * from t;").await,
        ["ERROR: Table not found: T"]
    );
}

#[tokio::test]
async fn test_connection_limit() {
    let config = ServerConfig {
        max_connections: 1,
        ..ServerConfig::default()
    };
    let server = start(config).await;
    let mut first = Client::connect(&server).await;
    assert!(first.send("help;").await.len() > 1);

    let mut second = Client::connect(&server).await;
    assert_eq!(
        second.read_response().await,
        Some(vec!["ERROR: too many connections".to_string()])
    );
    assert!(second.is_closed().await);

    // The first session is unaffected.
    assert_eq!(first.send("show databases;").await, Vec::<String>::new());
}

#[tokio::test]
async fn test_long_line_is_rejected() {
    let config = ServerConfig {
        max_line_length: 32,
        ..ServerConfig::default()
    };
    let server = start(config).await;
    let mut client = Client::connect(&server).await;

    let request = format!("select * from {};", "X".repeat(64));
    let lines = client.send(&request).await;
    assert_eq!(lines, ["ERROR: line exceeds 32 bytes"]);
    assert!(client.is_closed().await);
}

#[tokio::test]
async fn test_login_required() {
    let config = ServerConfig {
        require_auth: true,
        ..ServerConfig::default()
    };
    let server = start(config).await;
    let mut client = Client::connect(&server).await;

    assert_eq!(
        client.send("create database d;").await,
        ["ERROR: Authentication required"]
    );
    assert_eq!(client.send("login root 1234;").await, ["Logged in as root"]);
    assert_eq!(client.send("create database d;").await, ["Database D created"]);
}

#[tokio::test]
async fn test_end_named_database_keeps_replies_in_step() {
    let server = start(ServerConfig::default()).await;
    let mut client = Client::connect(&server).await;

    assert_eq!(client.send("create database end;").await, ["Database END created"]);
    assert_eq!(client.send("show databases;").await, ["END"]);
    assert_eq!(client.send("create table t (id int);").await, ["Table T created"]);
    assert_eq!(client.send("show tables;").await, ["T"]);
}

#[tokio::test]
async fn test_names_cannot_leave_data_dir() {
    let server = start(ServerConfig::default()).await;
    let mut client = Client::connect(&server).await;

    let lines = client.send("create database ../escape;").await;
    assert!(lines[0].starts_with("ERROR: Malformed statement"), "{:?}", lines);
    let lines = client.send("create database /tmp/x;").await;
    assert!(lines[0].starts_with("ERROR: Malformed statement"), "{:?}", lines);

    let outside = server.data_dir.parent().unwrap().join("ESCAPE");
    assert!(!outside.exists());
    assert!(client.send("show databases;").await.is_empty());
}
