//! Wire protocol integration tests.
//!
//! These tests speak the PostgreSQL v3 protocol directly over a TCP socket
//! against a server running on an ephemeral port, so the whole stack
//! (session, parser, executor, heap, buffer pool, page files) is exercised
//! end to end without an external client binary.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use chalkdb::config::Config;
use chalkdb::executor::Executor;
use chalkdb::heap::HeapStorage;
use chalkdb::server::Server;
use chalkdb::storage::{BufferPool, PageFiles};

const PROTOCOL_VERSION: i32 = 196608; // 3.0

/// One backend message: type byte and payload (length prefix stripped).
type Msg = (u8, Vec<u8>);

struct TestServer {
    addr: SocketAddr,
    _dir: TempDir,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let files = PageFiles::new(dir.path());
        files.init().await.unwrap();
        let pool = Arc::new(BufferPool::new(files.clone(), 64));
        let heap = HeapStorage::new(files, pool);
        let executor = Arc::new(Executor::new(heap));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Server::new(listener, executor, &Config::default());
        let handle = tokio::spawn(async move {
            let _ = server.serve().await;
        });

        Self {
            addr,
            _dir: dir,
            handle,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct Client {
    stream: TcpStream,
}

impl Client {
    /// Connects and completes the startup handshake.
    async fn connect(addr: SocketAddr) -> Self {
        let mut stream = TcpStream::connect(addr).await.unwrap();

        let body = b"user\0test\0database\0testdb\0\0";
        let mut packet = Vec::new();
        packet.extend_from_slice(&(8 + body.len() as i32).to_be_bytes());
        packet.extend_from_slice(&PROTOCOL_VERSION.to_be_bytes());
        packet.extend_from_slice(body);
        stream.write_all(&packet).await.unwrap();

        let mut client = Self { stream };
        let messages = client.read_until_ready().await;

        // Acceptance order: AuthenticationOk, ParameterStatus*, BackendKeyData,
        // ReadyForQuery.
        assert_eq!(messages.first().unwrap().0, b'R');
        let key_pos = messages.iter().position(|(t, _)| *t == b'K').unwrap();
        let param_positions: Vec<_> = messages
            .iter()
            .enumerate()
            .filter(|(_, (t, _))| *t == b'S')
            .map(|(i, _)| i)
            .collect();
        assert!(!param_positions.is_empty());
        assert!(param_positions.iter().all(|&p| p < key_pos));
        assert_eq!(messages.last().unwrap().0, b'Z');

        client
    }

    async fn read_message(&mut self) -> Msg {
        let ty = self.stream.read_u8().await.unwrap();
        let len = self.stream.read_i32().await.unwrap();
        let mut payload = vec![0u8; (len - 4) as usize];
        self.stream.read_exact(&mut payload).await.unwrap();
        (ty, payload)
    }

    async fn read_until_ready(&mut self) -> Vec<Msg> {
        let mut messages = Vec::new();
        loop {
            let message = self.read_message().await;
            let done = message.0 == b'Z';
            messages.push(message);
            if done {
                return messages;
            }
        }
    }

    /// Sends one simple query and reads every response up to ReadyForQuery.
    async fn query(&mut self, sql: &str) -> Vec<Msg> {
        let mut frame = vec![b'Q'];
        frame.extend_from_slice(&(4 + sql.len() as i32 + 1).to_be_bytes());
        frame.extend_from_slice(sql.as_bytes());
        frame.push(0);
        self.stream.write_all(&frame).await.unwrap();
        self.read_until_ready().await
    }

    /// Sends Terminate and verifies the server closes the connection.
    async fn terminate(mut self) {
        let mut frame = vec![b'X'];
        frame.extend_from_slice(&4i32.to_be_bytes());
        self.stream.write_all(&frame).await.unwrap();

        let mut buf = [0u8; 1];
        let n = self.stream.read(&mut buf).await.unwrap_or(0);
        assert_eq!(n, 0, "server should close after Terminate");
    }
}

// === Response parsing helpers ===

fn command_tag(messages: &[Msg]) -> Option<String> {
    messages.iter().find(|(t, _)| *t == b'C').map(|(_, payload)| {
        let end = payload.iter().position(|&b| b == 0).unwrap();
        String::from_utf8(payload[..end].to_vec()).unwrap()
    })
}

/// Parses RowDescription into (name, type_oid, type_size) triples.
fn row_description(messages: &[Msg]) -> Vec<(String, i32, i16)> {
    let Some((_, payload)) = messages.iter().find(|(t, _)| *t == b'T') else {
        return Vec::new();
    };
    let count = i16::from_be_bytes([payload[0], payload[1]]);
    let mut fields = Vec::new();
    let mut pos = 2;
    for _ in 0..count {
        let end = pos + payload[pos..].iter().position(|&b| b == 0).unwrap();
        let name = String::from_utf8(payload[pos..end].to_vec()).unwrap();
        pos = end + 1;
        pos += 6; // table oid + column id
        let type_oid = i32::from_be_bytes(payload[pos..pos + 4].try_into().unwrap());
        pos += 4;
        let type_size = i16::from_be_bytes([payload[pos], payload[pos + 1]]);
        pos += 2;
        pos += 6; // type modifier + format code
        fields.push((name, type_oid, type_size));
    }
    fields
}

/// Parses every DataRow into text fields (None = NULL).
fn data_rows(messages: &[Msg]) -> Vec<Vec<Option<String>>> {
    messages
        .iter()
        .filter(|(t, _)| *t == b'D')
        .map(|(_, payload)| {
            let count = i16::from_be_bytes([payload[0], payload[1]]);
            let mut pos = 2;
            let mut row = Vec::new();
            for _ in 0..count {
                let len = i32::from_be_bytes(payload[pos..pos + 4].try_into().unwrap());
                pos += 4;
                if len < 0 {
                    row.push(None);
                } else {
                    let bytes = &payload[pos..pos + len as usize];
                    row.push(Some(String::from_utf8(bytes.to_vec()).unwrap()));
                    pos += len as usize;
                }
            }
            row
        })
        .collect()
}

/// Parses the first ErrorResponse into a field-code map.
fn error_fields(messages: &[Msg]) -> Option<HashMap<u8, String>> {
    let (_, payload) = messages.iter().find(|(t, _)| *t == b'E')?;
    let mut fields = HashMap::new();
    let mut pos = 0;
    while pos < payload.len() && payload[pos] != 0 {
        let code = payload[pos];
        pos += 1;
        let end = pos + payload[pos..].iter().position(|&b| b == 0).unwrap();
        fields.insert(code, String::from_utf8(payload[pos..end].to_vec()).unwrap());
        pos = end + 1;
    }
    Some(fields)
}

// === Scenarios ===

#[tokio::test(flavor = "multi_thread")]
async fn test_s1_literal_select() {
    let server = TestServer::spawn().await;
    let mut client = Client::connect(server.addr).await;

    let messages = client.query("SELECT 1").await;

    let fields = row_description(&messages);
    assert_eq!(fields, vec![("?column?".to_string(), 23, 4)]);
    assert_eq!(data_rows(&messages), vec![vec![Some("1".to_string())]]);
    assert_eq!(command_tag(&messages).as_deref(), Some("SELECT 1"));

    client.terminate().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_s2_create_insert_select() {
    let server = TestServer::spawn().await;
    let mut client = Client::connect(server.addr).await;

    let messages = client
        .query("CREATE TABLE users (id INTEGER, name VARCHAR(255))")
        .await;
    assert_eq!(command_tag(&messages).as_deref(), Some("CREATE TABLE"));

    let messages = client.query("INSERT INTO users VALUES (1, 'John')").await;
    assert_eq!(command_tag(&messages).as_deref(), Some("INSERT 0 1"));

    let messages = client.query("SELECT * FROM users").await;
    let fields = row_description(&messages);
    assert_eq!(
        fields,
        vec![
            ("id".to_string(), 23, 4),
            ("name".to_string(), 1043, -1),
        ]
    );
    assert_eq!(
        data_rows(&messages),
        vec![vec![Some("1".to_string()), Some("John".to_string())]]
    );
    assert_eq!(command_tag(&messages).as_deref(), Some("SELECT 1"));

    client.terminate().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_s3_type_mismatch_keeps_session_alive() {
    let server = TestServer::spawn().await;
    let mut client = Client::connect(server.addr).await;

    client
        .query("CREATE TABLE users (id INTEGER, name VARCHAR(255))")
        .await;

    let messages = client
        .query("INSERT INTO users VALUES ('nope', 'John')")
        .await;
    let fields = error_fields(&messages).unwrap();
    assert_eq!(fields[&b'S'], "ERROR");
    assert_eq!(fields[&b'C'], "22P02");
    assert!(fields[&b'M'].contains("id"));
    assert!(fields[&b'M'].contains("integer"));
    assert_eq!(fields[&b'c'], "id");
    assert_eq!(messages.last().unwrap().0, b'Z');

    // The session continues after a non-fatal error.
    let messages = client.query("SELECT 1").await;
    assert_eq!(command_tag(&messages).as_deref(), Some("SELECT 1"));

    client.terminate().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_s4_unknown_relation() {
    let server = TestServer::spawn().await;
    let mut client = Client::connect(server.addr).await;

    let messages = client.query("SELECT * FROM ghost").await;
    let fields = error_fields(&messages).unwrap();
    assert_eq!(fields[&b'C'], "42P01");
    assert_eq!(fields[&b'M'], "relation \"ghost\" does not exist");
    assert_eq!(fields[&b't'], "ghost");

    client.terminate().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_s6_bad_protocol_version() {
    let server = TestServer::spawn().await;
    let mut stream = TcpStream::connect(server.addr).await.unwrap();

    let mut packet = Vec::new();
    packet.extend_from_slice(&8i32.to_be_bytes());
    packet.extend_from_slice(&0xFFFF_FFFFu32.to_be_bytes());
    stream.write_all(&packet).await.unwrap();

    // One FATAL ErrorResponse, then the server closes.
    let ty = stream.read_u8().await.unwrap();
    assert_eq!(ty, b'E');
    let len = stream.read_i32().await.unwrap();
    let mut payload = vec![0u8; (len - 4) as usize];
    stream.read_exact(&mut payload).await.unwrap();

    let fields = error_fields(&[(b'E', payload)]).unwrap();
    assert_eq!(fields[&b'S'], "FATAL");
    assert_eq!(fields[&b'C'], "08P01");
    assert!(fields[&b'M'].contains("unsupported frontend protocol"));

    let mut buf = [0u8; 1];
    let n = stream.read(&mut buf).await.unwrap_or(0);
    assert_eq!(n, 0, "server should close after FATAL");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_ssl_request_rejected_then_startup_succeeds() {
    let server = TestServer::spawn().await;
    let mut stream = TcpStream::connect(server.addr).await.unwrap();

    // SSLRequest gets a bare 'N'.
    let mut packet = Vec::new();
    packet.extend_from_slice(&8i32.to_be_bytes());
    packet.extend_from_slice(&80877103i32.to_be_bytes());
    stream.write_all(&packet).await.unwrap();
    assert_eq!(stream.read_u8().await.unwrap(), b'N');

    // Then a normal startup on the same socket.
    let body = b"user\0test\0\0";
    let mut packet = Vec::new();
    packet.extend_from_slice(&(8 + body.len() as i32).to_be_bytes());
    packet.extend_from_slice(&PROTOCOL_VERSION.to_be_bytes());
    packet.extend_from_slice(body);
    stream.write_all(&packet).await.unwrap();

    let mut client = Client { stream };
    let messages = client.read_until_ready().await;
    assert_eq!(messages.first().unwrap().0, b'R');

    let messages = client.query("SELECT 42").await;
    assert_eq!(data_rows(&messages), vec![vec![Some("42".to_string())]]);
    client.terminate().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_syntax_error_and_empty_query() {
    let server = TestServer::spawn().await;
    let mut client = Client::connect(server.addr).await;

    let messages = client.query("SELEC 1").await;
    let fields = error_fields(&messages).unwrap();
    assert_eq!(fields[&b'C'], "42601");

    let messages = client.query("").await;
    let fields = error_fields(&messages).unwrap();
    assert_eq!(fields[&b'C'], "42601");
    assert_eq!(fields[&b'M'], "Empty query");

    client.terminate().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unsupported_frame_type_is_nonfatal() {
    let server = TestServer::spawn().await;
    let mut client = Client::connect(server.addr).await;

    // Extended-protocol Parse message: not supported, session survives.
    let mut frame = vec![b'P'];
    let body = b"\0SELECT 1\0\0\0";
    frame.extend_from_slice(&(4 + body.len() as i32).to_be_bytes());
    frame.extend_from_slice(body);
    client.stream.write_all(&frame).await.unwrap();

    let messages = client.read_until_ready().await;
    let fields = error_fields(&messages).unwrap();
    assert_eq!(fields[&b'C'], "0A000");

    let messages = client.query("SELECT 1").await;
    assert_eq!(command_tag(&messages).as_deref(), Some("SELECT 1"));
    client.terminate().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_boolean_and_null_rendering() {
    let server = TestServer::spawn().await;
    let mut client = Client::connect(server.addr).await;

    client
        .query("CREATE TABLE flags (id INTEGER, ok BOOLEAN)")
        .await;
    client.query("INSERT INTO flags VALUES (1, true)").await;
    client.query("INSERT INTO flags VALUES (2, false)").await;

    let messages = client.query("SELECT * FROM flags").await;
    assert_eq!(
        data_rows(&messages),
        vec![
            vec![Some("1".to_string()), Some("t".to_string())],
            vec![Some("2".to_string()), Some("f".to_string())],
        ]
    );

    let fields = row_description(&messages);
    assert_eq!(fields[1], ("ok".to_string(), 16, 1));

    client.terminate().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_update_through_wire() {
    let server = TestServer::spawn().await;
    let mut client = Client::connect(server.addr).await;

    client
        .query("CREATE TABLE users (id INTEGER, name VARCHAR(255))")
        .await;
    client.query("INSERT INTO users VALUES (1, 'ada')").await;
    client.query("INSERT INTO users VALUES (2, 'bob')").await;

    let messages = client
        .query("UPDATE users SET name = 'zoe' WHERE id = 2")
        .await;
    assert_eq!(command_tag(&messages).as_deref(), Some("UPDATE 1"));

    let messages = client.query("SELECT name FROM users WHERE id = 2").await;
    assert_eq!(data_rows(&messages), vec![vec![Some("zoe".to_string())]]);

    client.terminate().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rows_visible_across_connections() {
    let server = TestServer::spawn().await;

    let mut writer = Client::connect(server.addr).await;
    writer
        .query("CREATE TABLE shared (id INTEGER, note TEXT)")
        .await;
    writer.query("INSERT INTO shared VALUES (1, 'hello')").await;

    // A second connection sees the row as soon as the insert returned.
    let mut reader = Client::connect(server.addr).await;
    let messages = reader.query("SELECT note FROM shared").await;
    assert_eq!(data_rows(&messages), vec![vec![Some("hello".to_string())]]);

    writer.terminate().await;
    reader.terminate().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_parallel_connections() {
    let server = TestServer::spawn().await;

    let mut handles = Vec::new();
    for i in 0..4 {
        let addr = server.addr;
        handles.push(tokio::spawn(async move {
            let mut client = Client::connect(addr).await;
            let table = format!("t{}", i);
            client
                .query(&format!("CREATE TABLE {} (id INTEGER)", table))
                .await;
            for j in 0..10 {
                let messages = client
                    .query(&format!("INSERT INTO {} VALUES ({})", table, j))
                    .await;
                assert_eq!(command_tag(&messages).as_deref(), Some("INSERT 0 1"));
            }
            let messages = client.query(&format!("SELECT * FROM {}", table)).await;
            assert_eq!(data_rows(&messages).len(), 10);
            client.terminate().await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
}
