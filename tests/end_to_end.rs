use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::thread;
use std::time::Duration;

use lrcp::wire::{decode, encode_ack, encode_close, encode_connect, encode_data, Decoded, Message};

fn spawn_server() -> SocketAddr {
    let listener = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    thread::spawn(move || {
        let _ = lrcp::serve(addr);
    });
    thread::sleep(Duration::from_millis(50));
    addr
}

fn client() -> UdpSocket {
    let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    socket.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    socket
}

#[test]
fn escaped_bytes_round_trip() {
    let server = spawn_server();
    let client = client();

    client.send_to(&encode_connect(2), server).unwrap();
    let mut buf = [0u8; 1024];
    let (n, _) = client.recv_from(&mut buf).unwrap();
    assert_eq!(decode(&buf[..n]), Decoded::Valid(Message::Ack { session: 2, length: 0 }));

    // `/data/2/0/a\/b\\c\n/` delivers the 6 bytes `a/b\c\n` to the application.
    client
        .send_to(&encode_data(2, 0, b"a/b\\c\n"), server)
        .unwrap();

    let (n, _) = client.recv_from(&mut buf).unwrap();
    assert_eq!(decode(&buf[..n]), Decoded::Valid(Message::Ack { session: 2, length: 6 }));

    let (n, _) = client.recv_from(&mut buf).unwrap();
    let Decoded::Valid(Message::Data { session, pos, data }) = decode(&buf[..n]) else {
        panic!("expected a data reply");
    };
    assert_eq!(session, 2);
    assert_eq!(pos, 0);
    assert_eq!(data, b"c\\b/a\n");
}

#[test]
fn out_of_order_data_does_not_advance_past_gap() {
    let server = spawn_server();
    let client = client();

    client.send_to(&encode_connect(3), server).unwrap();
    let mut buf = [0u8; 1024];
    client.recv_from(&mut buf).unwrap();

    client
        .send_to(&encode_data(3, 5, b"world\n"), server)
        .unwrap();
    let (n, _) = client.recv_from(&mut buf).unwrap();
    assert_eq!(decode(&buf[..n]), Decoded::Valid(Message::Ack { session: 3, length: 0 }));
}

#[test]
fn ack_beyond_sent_bytes_closes_session() {
    let server = spawn_server();
    let client = client();

    client.send_to(&encode_connect(6), server).unwrap();
    let mut buf = [0u8; 1024];
    client.recv_from(&mut buf).unwrap(); // initial ack

    client.send_to(&encode_data(6, 0, b"olleh\n"), server).unwrap();
    client.recv_from(&mut buf).unwrap(); // ack of data
    client.recv_from(&mut buf).unwrap(); // reversed line back

    client.send_to(&encode_ack(6, 7), server).unwrap();
    let (n, _) = client.recv_from(&mut buf).unwrap();
    assert_eq!(decode(&buf[..n]), Decoded::Valid(Message::Close { session: 6 }));
}

#[test]
fn retransmission_repeats_unacked_data() {
    let server = spawn_server();
    let client = client();
    client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

    client.send_to(&encode_connect(5), server).unwrap();
    let mut buf = [0u8; 1024];
    client.recv_from(&mut buf).unwrap(); // initial ack

    client.send_to(&encode_data(5, 0, b"olleh\n"), server).unwrap();
    client.recv_from(&mut buf).unwrap(); // ack of data

    let (n, _) = client.recv_from(&mut buf).unwrap();
    let first = buf[..n].to_vec();
    assert_eq!(
        decode(&first),
        Decoded::Valid(Message::Data { session: 5, pos: 0, data: b"hello\n".to_vec() })
    );

    // Never ack it: the server must retransmit the identical datagram.
    let (n, _) = client.recv_from(&mut buf).unwrap();
    assert_eq!(&buf[..n], first.as_slice());

    client.send_to(&encode_close(5), server).unwrap();
}

#[test]
fn duplicate_ack_does_not_trigger_retransmit() {
    let server = spawn_server();
    let client = client();

    client.send_to(&encode_connect(4), server).unwrap();
    let mut buf = [0u8; 1024];
    client.recv_from(&mut buf).unwrap();

    client.send_to(&encode_data(4, 0, b"olleh\n"), server).unwrap();
    client.recv_from(&mut buf).unwrap(); // ack
    client.recv_from(&mut buf).unwrap(); // reversed data

    client.send_to(&encode_ack(4, 6), server).unwrap();
    client.send_to(&encode_ack(4, 6), server).unwrap();

    client.set_read_timeout(Some(Duration::from_millis(500))).unwrap();
    let err = client.recv_from(&mut buf).unwrap_err();
    assert!(matches!(
        err.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    ));

    client.send_to(&encode_close(4), server).unwrap();
}
