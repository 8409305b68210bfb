use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use mysqlite::Listener;

fn fixture_db(dir: &tempfile::TempDir) -> PathBuf {
    let path = dir.path().join("fixture.db");
    let setup = rusqlite::Connection::open(&path).unwrap();
    setup
        .execute_batch(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
             INSERT INTO users VALUES (1, 'ada');
             INSERT INTO users VALUES (2, 'brian');",
        )
        .unwrap();
    path
}

fn start_server() -> (tempfile::TempDir, SocketAddr) {
    static LOGGER: std::sync::Once = std::sync::Once::new();
    LOGGER.call_once(|| {
        let logger = dakv_logger::set_logger_level(false, None);
        std::mem::forget(logger);
    });

    let dir = tempfile::tempdir().unwrap();
    let path = fixture_db(&dir);
    let mut listener = Listener::bind("127.0.0.1:0", path).unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || listener.accept());
    (dir, addr)
}

struct Client {
    stream: TcpStream,
}

impl Client {
    fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        Client { stream }
    }

    fn read_packet(&mut self) -> (u8, Vec<u8>) {
        let mut header = [0; 4];
        self.stream.read_exact(&mut header).unwrap();
        let length =
            (header[0] as usize) | (header[1] as usize) << 8 | (header[2] as usize) << 16;
        let mut payload = vec![0; length];
        self.stream.read_exact(payload.as_mut_slice()).unwrap();
        (header[3], payload)
    }

    fn write_packet(&mut self, sequence: u8, payload: &[u8]) {
        let mut frame = vec![
            payload.len() as u8,
            (payload.len() >> 8) as u8,
            (payload.len() >> 16) as u8,
            sequence,
        ];
        frame.extend_from_slice(payload);
        self.stream.write_all(frame.as_slice()).unwrap();
    }

    /// Consume the greeting and answer it; the server accepts anything.
    fn handshake(&mut self, username: &str) {
        let (sequence, greeting) = self.read_packet();
        assert_eq!(sequence, 0);
        assert_eq!(greeting[0], 10, "protocol version");
        assert!(greeting[1..].starts_with(b"4.1.25-SQLite\0"));

        // PROTOCOL_41 | SECURE_CONNECTION, empty scramble, no database
        let mut response = vec![];
        response.extend_from_slice(&0x00008200u32.to_le_bytes());
        response.extend_from_slice(&0u32.to_le_bytes());
        response.push(33);
        response.extend_from_slice(&[0; 23]);
        response.extend_from_slice(username.as_bytes());
        response.push(0);
        response.push(0); // auth-response length

        self.write_packet(1, response.as_slice());

        let (sequence, ack) = self.read_packet();
        assert_eq!(sequence, 2);
        assert_eq!(ack[0], 0x00, "handshake ack should be OK");
    }

    fn query(&mut self, sql: &str) {
        let mut payload = vec![0x03];
        payload.extend_from_slice(sql.as_bytes());
        self.write_packet(0, payload.as_slice());
    }

    fn is_eof(payload: &[u8]) -> bool {
        payload.len() == 5 && payload[0] == 0xfe
    }

    /// Read a full result set, returning column-definition payloads and
    /// row payloads.
    fn read_result_set(&mut self) -> (Vec<Vec<u8>>, Vec<Vec<u8>>) {
        let (_, count) = self.read_packet();
        let columns = count[0] as usize;

        let mut definitions = vec![];
        for _ in 0..columns {
            definitions.push(self.read_packet().1);
        }
        let (_, eof) = self.read_packet();
        assert!(Self::is_eof(eof.as_slice()));

        let mut rows = vec![];
        loop {
            let (_, payload) = self.read_packet();
            if Self::is_eof(payload.as_slice()) {
                break;
            }
            rows.push(payload);
        }
        (definitions, rows)
    }
}

/// Decode the length-encoded cells of one text-protocol row.
fn parse_row(payload: &[u8]) -> Vec<Option<String>> {
    let mut cells = vec![];
    let mut pos = 0;
    while pos < payload.len() {
        match payload[pos] {
            0xfb => {
                cells.push(None);
                pos += 1;
            }
            length if length < 0xfb => {
                let length = length as usize;
                pos += 1;
                cells.push(Some(
                    String::from_utf8_lossy(&payload[pos..pos + length]).into_owned(),
                ));
                pos += length;
            }
            0xfc => {
                let length = u16::from_le_bytes([payload[pos + 1], payload[pos + 2]]) as usize;
                pos += 3;
                cells.push(Some(
                    String::from_utf8_lossy(&payload[pos..pos + length]).into_owned(),
                ));
                pos += length;
            }
            other => panic!("unexpected cell prefix {:#x}", other),
        }
    }
    cells
}

#[test]
fn test_ping() {
    let (_dir, addr) = start_server();
    let mut client = Client::connect(addr);
    client.handshake("root");

    // the literal PING frame
    client.stream.write_all(&[0x01, 0x00, 0x00, 0x00, 0x0e]).unwrap();
    let (sequence, payload) = client.read_packet();
    assert_eq!(sequence, 0x01);
    assert_eq!(payload[0], 0x00);
    // affected rows, last insert id, status AUTOCOMMIT, no warnings
    assert_eq!(payload.as_slice(), &[0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00]);
}

#[test]
fn test_show_databases() {
    let (_dir, addr) = start_server();
    let mut client = Client::connect(addr);
    client.handshake("root");

    client.query("SHOW DATABASES");
    let (definitions, rows) = client.read_result_set();

    assert_eq!(definitions.len(), 1);
    let needle = b"Database";
    assert!(definitions[0]
        .windows(needle.len())
        .any(|window| window == needle));

    assert_eq!(rows.len(), 1);
    assert_eq!(parse_row(rows[0].as_slice()), vec![Some("main".to_string())]);
}

#[test]
fn test_select_rows() {
    let (_dir, addr) = start_server();
    let mut client = Client::connect(addr);
    client.handshake("root");

    client.query("SELECT id, name FROM users ORDER BY id");
    let (definitions, rows) = client.read_result_set();
    assert_eq!(definitions.len(), 2);
    assert_eq!(rows.len(), 2);
    assert_eq!(
        parse_row(rows[0].as_slice()),
        vec![Some("1".to_string()), Some("ada".to_string())]
    );
    assert_eq!(
        parse_row(rows[1].as_slice()),
        vec![Some("2".to_string()), Some("brian".to_string())]
    );
}

#[test]
fn test_show_create_table() {
    let (_dir, addr) = start_server();
    let mut client = Client::connect(addr);
    client.handshake("root");

    client.query("SHOW CREATE TABLE users");
    let (definitions, rows) = client.read_result_set();
    assert_eq!(definitions.len(), 2);
    assert_eq!(rows.len(), 1);

    let cells = parse_row(rows[0].as_slice());
    assert_eq!(cells[0].as_deref(), Some("users"));
    let definition = cells[1].as_deref().unwrap();
    assert!(definition.contains("id int(21) NOT NULL AUTO_INCREMENT"));
    assert!(definition.contains("name varchar(65535) NOT NULL"));
    assert!(definition.contains("PRIMARY KEY (id)"));
    assert!(definition.ends_with(") ENGINE=SQLite"));
}

#[test]
fn test_insert_refused() {
    let (_dir, addr) = start_server();
    let mut client = Client::connect(addr);
    client.handshake("root");

    client.query("INSERT INTO users VALUES (3, 'eve')");
    let (sequence, payload) = client.read_packet();
    assert_eq!(sequence, 1);
    assert_eq!(payload[0], 0xff);
    let code = u16::from_le_bytes([payload[1], payload[2]]);
    assert_eq!(code, 1044);
    assert_eq!(payload[3], b'#');
    assert_eq!(&payload[4..9], b"42000");
    let message = String::from_utf8_lossy(&payload[9..]);
    assert!(message.contains("Access denied"));
}

#[test]
fn test_unknown_command() {
    let (_dir, addr) = start_server();
    let mut client = Client::connect(addr);
    client.handshake("root");

    client.write_packet(0, &[0x99]);
    let (_, payload) = client.read_packet();
    assert_eq!(payload[0], 0xff);
    let code = u16::from_le_bytes([payload[1], payload[2]]);
    assert_eq!(code, 1235);
    let message = String::from_utf8_lossy(&payload[3..]);
    assert!(message.contains("UNKNOWN"));
}

#[test]
fn test_set_swallowed_and_engine_error() {
    let (_dir, addr) = start_server();
    let mut client = Client::connect(addr);
    client.handshake("root");

    client.query("SET NAMES utf8");
    let (_, payload) = client.read_packet();
    assert_eq!(payload[0], 0x00);

    client.query("SELECT broken FROM nowhere");
    let (_, payload) = client.read_packet();
    assert_eq!(payload[0], 0xff);
    let code = u16::from_le_bytes([payload[1], payload[2]]);
    assert_eq!(code, 1064);

    // the command loop survives an engine error
    client.query("SHOW DATABASES");
    let (_, rows) = client.read_result_set();
    assert_eq!(rows.len(), 1);
}

#[test]
fn test_processlist() {
    let (_dir, addr) = start_server();
    let mut alice = Client::connect(addr);
    alice.handshake("alice_pl");
    let mut bob = Client::connect(addr);
    bob.handshake("bob_pl");

    // non-FULL: only the requester's own connections
    alice.query("SHOW PROCESSLIST");
    let (definitions, rows) = alice.read_result_set();
    assert_eq!(definitions.len(), 8);
    let users: Vec<Option<String>> = rows
        .iter()
        .map(|row| parse_row(row.as_slice())[1].clone())
        .collect();
    assert_eq!(users, vec![Some("alice_pl".to_string())]);

    // FULL: everyone, including bob
    alice.query("SHOW FULL PROCESSLIST");
    let (_, rows) = alice.read_result_set();
    let users: Vec<Option<String>> = rows
        .iter()
        .map(|row| parse_row(row.as_slice())[1].clone())
        .collect();
    assert!(users.contains(&Some("alice_pl".to_string())));
    assert!(users.contains(&Some("bob_pl".to_string())));

    // closing bob releases his slot
    bob.write_packet(0, &[0x01]);
    drop(bob);

    let mut gone = false;
    for _ in 0..50 {
        alice.query("SHOW FULL PROCESSLIST");
        let (_, rows) = alice.read_result_set();
        let users: Vec<Option<String>> = rows
            .iter()
            .map(|row| parse_row(row.as_slice())[1].clone())
            .collect();
        if !users.contains(&Some("bob_pl".to_string())) {
            gone = true;
            break;
        }
        thread::sleep(Duration::from_millis(100));
    }
    assert!(gone, "bob's process-table slot was never released");
}

#[test]
fn test_init_db() {
    let (_dir, addr) = start_server();
    let mut client = Client::connect(addr);
    client.handshake("root");

    // INIT_DB main -> OK
    client.write_packet(0, b"\x02main");
    let (_, payload) = client.read_packet();
    assert_eq!(payload[0], 0x00);

    // INIT_DB other -> access denied
    client.write_packet(0, b"\x02other");
    let (_, payload) = client.read_packet();
    assert_eq!(payload[0], 0xff);
    assert_eq!(u16::from_le_bytes([payload[1], payload[2]]), 1044);
    let message = String::from_utf8_lossy(&payload[9..]);
    assert!(message.contains("to database 'other'"));
}
