//! TCP round trips against a live server on the loopback interface.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use serde_json::json;
use slowctl::config::ServerConfig;
use slowctl::protocol::ProtocolBridge;
use slowctl::server::{LISTEN_BACKLOG, Server, ServerHandle};

use crate::mock_nodes::{Bench, bench};

const TIMEOUT: Duration = Duration::from_secs(5);

fn start(config: ServerConfig) -> (Bench, ServerHandle) {
    let b = bench();
    let server = Server::bind(&config, ProtocolBridge::for_tree(b.tree.clone())).unwrap();
    (b, server.spawn().unwrap())
}

struct Client {
    writer: TcpStream,
    reader: BufReader<TcpStream>,
}

impl Client {
    fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(TIMEOUT)).unwrap();
        Self {
            writer: stream.try_clone().unwrap(),
            reader: BufReader::new(stream),
        }
    }

    fn send(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).unwrap();
    }

    fn reply(&mut self) -> String {
        let mut line = String::new();
        self.reader.read_line(&mut line).unwrap();
        assert!(line.ends_with('\n'), "reply must carry the terminator: {line:?}");
        line.pop();
        line
    }

    fn query(&mut self, line: &str) -> String {
        self.send(format!("{line}\n").as_bytes());
        self.reply()
    }
}

#[test]
fn batched_line_returns_last_reply() {
    let (b, server) = start(ServerConfig::loopback());
    let mut client = Client::connect(server.local_addr());

    assert_eq!(client.query(":SRC1:OUTPUT ON;:SRC1:FREQ?;"), "1000");
    assert_eq!(b.output.writes(), vec![json!("ON")]);

    server.shutdown().unwrap();
}

#[test]
fn every_line_gets_exactly_one_reply() {
    let (_b, server) = start(ServerConfig::loopback());
    let mut client = Client::connect(server.local_addr());

    // A write produces an empty reply; two lines in one segment, two replies.
    client.send(b":SRC1:AMPL 2\n:SRC1:AMPL?\n");
    assert_eq!(client.reply(), "");
    assert_eq!(client.reply(), "2");

    server.shutdown().unwrap();
}

#[test]
fn line_split_across_segments() {
    let (_b, server) = start(ServerConfig::loopback());
    let mut client = Client::connect(server.local_addr());

    client.send(b"*ID");
    std::thread::sleep(Duration::from_millis(20));
    client.send(b"N?\r\n");
    assert_eq!(client.reply(), "BENCH,1");

    server.shutdown().unwrap();
}

#[test]
fn sessions_are_independent() {
    let (_b, server) = start(ServerConfig::loopback());
    let mut a = Client::connect(server.local_addr());
    let mut b = Client::connect(server.local_addr());

    a.query(":SRC1:OUTPUT ON");
    b.query(":GAUGE:HEATER?");
    // Relative addresses resolve against each client's own last path.
    assert_eq!(a.query("FREQ?"), "1000");
    assert_eq!(b.query("PRESSURE?"), "1.5E-6");

    server.shutdown().unwrap();
}

#[test]
fn invalid_utf8_closes_only_that_connection() {
    let (_b, server) = start(ServerConfig::loopback());
    let mut bad = Client::connect(server.local_addr());
    let mut good = Client::connect(server.local_addr());

    bad.send(&[0xff, 0xfe, b'\n']);
    let mut rest = Vec::new();
    // EOF (or a reset) and no reply bytes.
    let _ = bad.reader.read_to_end(&mut rest);
    assert!(rest.is_empty());

    assert_eq!(good.query("*IDN?"), "BENCH,1");
    let mut late = Client::connect(server.local_addr());
    assert_eq!(late.query(":SRC1:FREQ?"), "1000");

    server.shutdown().unwrap();
}

#[test]
fn over_long_line_gets_empty_reply() {
    let (_b, server) = start(ServerConfig::loopback());
    let mut client = Client::connect(server.local_addr());

    let mut long = vec![b'A'; slowctl::protocol::framer::MAX_LINE_LEN + 10];
    long.push(b'\n');
    client.send(&long);
    assert_eq!(client.reply(), "");
    assert_eq!(client.query("*IDN?"), "BENCH,1");

    server.shutdown().unwrap();
}

#[test]
fn custom_terminator() {
    let config = ServerConfig {
        line_terminator: "\r".into(),
        ..ServerConfig::loopback()
    };
    let (_b, server) = start(config);
    let mut client = Client::connect(server.local_addr());

    client.send(b"*IDN?\r");
    let mut buf = [0u8; 8];
    client.reader.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"BENCH,1\r");

    server.shutdown().unwrap();
}

#[test]
fn shutdown_closes_open_connections() {
    let (_b, server) = start(ServerConfig::loopback());
    let mut client = Client::connect(server.local_addr());
    assert_eq!(client.query("*IDN?"), "BENCH,1");

    server.shutdown().unwrap();

    let mut rest = Vec::new();
    let _ = client.reader.read_to_end(&mut rest);
    assert!(rest.is_empty());
}

#[test]
fn backlog_caps_unaccepted_connections() {
    const ATTEMPTS: usize = 40;

    // Bound but never run: nothing drains the accept queue.
    let b = bench();
    let server = Server::bind(
        &ServerConfig::loopback(),
        ProtocolBridge::for_tree(b.tree.clone()),
    )
    .unwrap();
    let addr = server.local_addr().unwrap();

    let mut held = Vec::new();
    for _ in 0..ATTEMPTS {
        if let Ok(stream) = TcpStream::connect_timeout(&addr, Duration::from_millis(200)) {
            held.push(stream);
        }
    }

    assert!(!held.is_empty());
    assert!(
        held.len() < ATTEMPTS,
        "{} connections completed with backlog {}",
        held.len(),
        LISTEN_BACKLOG
    );
    drop(server);
}
