use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use super::{Error, Session};

fn tcp_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let connected = TcpStream::connect(addr).unwrap();
    let (accepted, _) = listener.accept().unwrap();
    (connected, accepted)
}

fn session_pair() -> (Session, Session) {
    let (a, b) = tcp_pair();
    let client = Session::client(
        Box::new(a.try_clone().unwrap()),
        Box::new(a.try_clone().unwrap()),
        a,
    );
    let server = Session::server(
        Box::new(b.try_clone().unwrap()),
        Box::new(b.try_clone().unwrap()),
        b,
    );
    (client, server)
}

#[test]
fn substream_round_trip() {
    let (client, server) = session_pair();

    let mut opened = client.open_stream().unwrap();
    opened.write_all(b"hello").unwrap();

    let mut accepted = server.accept_stream().unwrap().unwrap();
    let mut buf = [0u8; 5];
    accepted.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"hello");

    accepted.write_all(b"world").unwrap();
    opened.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"world");

    opened.close();
    accepted.close();
    client.close();
    server.close();
}

#[test]
fn substreams_do_not_block_each_other() {
    let (client, server) = session_pair();

    let bulk: Vec<u8> = (0..(1 << 20)).map(|i| (i % 251) as u8).collect();

    let mut first = client.open_stream().unwrap();
    first.write_all(&bulk).unwrap();

    let mut second = client.open_stream().unwrap();
    second.write_all(b"ping").unwrap();

    let unread = server.accept_stream().unwrap().unwrap();

    // the second substream is fully usable while the first sits unread
    let mut accepted_second = server.accept_stream().unwrap().unwrap();
    let mut buf = [0u8; 4];
    accepted_second.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"ping");

    let mut accepted_first = unread;
    let mut received = vec![0u8; bulk.len()];
    accepted_first.read_exact(&mut received).unwrap();
    assert_eq!(received, bulk);

    client.close();
    server.close();
}

#[test]
fn half_close_keeps_the_reverse_direction_flowing() {
    let (client, server) = session_pair();

    let mut opened = client.open_stream().unwrap();
    opened.write_all(b"request").unwrap();
    opened.close_write().unwrap();

    let mut accepted = server.accept_stream().unwrap().unwrap();
    let mut request = Vec::new();
    accepted.read_to_end(&mut request).unwrap();
    assert_eq!(request, b"request");

    // the peer saw our fin but its own direction still works
    accepted.write_all(b"response").unwrap();
    accepted.close_write().unwrap();

    let mut response = Vec::new();
    opened.read_to_end(&mut response).unwrap();
    assert_eq!(response, b"response");

    client.close();
    server.close();
}

#[test]
fn close_wakes_a_blocked_accept_with_clean_eof() {
    let (client, server) = session_pair();

    let acceptor = thread::spawn(move || server.accept_stream());

    thread::sleep(Duration::from_millis(50));
    client.close();

    match acceptor.join().unwrap() {
        Ok(None) => {}
        other => panic!("expected clean eof, got {:?}", other.map(|s| s.map(|st| st.id()))),
    }
}

#[test]
fn peer_socket_eof_is_a_clean_shutdown() {
    let (a, b) = tcp_pair();
    let server = Session::server(
        Box::new(b.try_clone().unwrap()),
        Box::new(b.try_clone().unwrap()),
        b,
    );

    drop(a);

    match server.accept_stream() {
        Ok(None) => {}
        other => panic!("expected clean eof, got {:?}", other.map(|s| s.map(|st| st.id()))),
    }
    assert!(server.is_closed());
}

#[test]
fn garbage_on_the_wire_surfaces_as_a_session_error() {
    let (mut a, b) = tcp_pair();
    let server = Session::server(
        Box::new(b.try_clone().unwrap()),
        Box::new(b.try_clone().unwrap()),
        b,
    );

    a.write_all(&[0xff, 0, 0, 0, 0, 0, 0]).unwrap();

    match server.accept_stream() {
        Err(Error::Session(reason)) => assert!(reason.contains("unknown frame type")),
        other => panic!("expected session error, got {:?}", other.map(|s| s.map(|st| st.id()))),
    }
}

#[test]
fn open_after_close_fails() {
    let (client, server) = session_pair();
    client.close();

    match client.open_stream() {
        Err(Error::Closed) => {}
        other => panic!("expected closed, got {:?}", other.map(|s| s.id())),
    }
    assert!(client.is_closed());
    server.close();
}

#[test]
fn full_close_aborts_a_peer_still_sending() {
    let (client, server) = session_pair();

    let opened = client.open_stream().unwrap();
    let mut accepted = server.accept_stream().unwrap().unwrap();

    // reader goes away while the peer could still be writing
    opened.close();
    thread::sleep(Duration::from_millis(100));

    let result = accepted.write_all(b"into the void");
    assert!(result.is_err());

    client.close();
    server.close();
}
