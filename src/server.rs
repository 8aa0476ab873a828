//! The server driver: binds the datagram port, dispatches inbound
//! datagrams to the right session, runs the per-session timers, and
//! garbage-collects expired sessions. Single-threaded, per spec.md §5:
//! one loop owns the socket and the session table for its whole lifetime,
//! so ingress and timer ticks can never race on a session's state.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use crate::err::Error;
use crate::session::Tick;
use crate::table::Table;
use crate::wire::{self, Decoded, Message, SessionId};

/// How often the driver wakes up to check retransmission/expiry timers,
/// independent of inbound traffic.
const TICK_INTERVAL: Duration = Duration::from_millis(200);

/// Runs the LRCP server on `bind_addr` until the process is terminated.
pub fn serve(bind_addr: SocketAddr) -> Result<(), Error> {
    let socket = UdpSocket::bind(bind_addr).map_err(|source| Error::Bind {
        addr: bind_addr,
        source,
    })?;
    socket.set_read_timeout(Some(TICK_INTERVAL))?;
    log::info!("lrcp: listening on {bind_addr}");

    let mut table = Table::new();
    // One byte larger than the cap: an overlong datagram must still read as
    // overlong so `wire::decode` rejects it, instead of silently truncating
    // to a well-formed-looking MAX_DATAGRAM-byte prefix.
    let mut buf = vec![0u8; wire::MAX_DATAGRAM + 1];

    loop {
        run_ticks(&socket, &mut table);

        match socket.recv_from(&mut buf) {
            Ok((n, peer)) => handle_datagram(&socket, &mut table, &buf[..n], peer),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {}
            Err(e) => return Err(Error::Io(e)),
        }
    }
}

fn handle_datagram(socket: &UdpSocket, table: &mut Table, datagram: &[u8], peer: SocketAddr) {
    let message = match wire::decode(datagram) {
        Decoded::Valid(message) => message,
        Decoded::Invalid => {
            log::debug!("dropping malformed datagram from {peer} ({} bytes)", datagram.len());
            return;
        }
    };

    for reply in dispatch(table, message, peer) {
        send(socket, peer, &reply);
    }
}

fn dispatch(table: &mut Table, message: Message, peer: SocketAddr) -> Vec<Message> {
    match message {
        Message::Connect { session } => {
            let (s, created) = table.get_or_create(session, peer);
            if created {
                log::info!("session {session} connected from {peer}");
            }
            s.peer = peer;
            log::debug!("session {session}: connect, recv_len={}", s.recv_len());
            s.on_connect()
        }
        Message::Data { session, pos, data } => match table.get_mut(session) {
            None => vec![wire::close_message(session)],
            Some(s) => {
                s.peer = peer;
                s.on_data(pos, &data)
            }
        },
        Message::Ack { session, length } => match table.get_mut(session) {
            None => vec![wire::close_message(session)],
            Some(s) => {
                s.peer = peer;
                let (messages, close_locally) = s.on_ack(length);
                if close_locally {
                    log::warn!("session {session} closed locally: ack of {length} exceeds bytes sent");
                    table.remove(session);
                }
                messages
            }
        },
        Message::Close { session } => {
            if let Some(mut s) = table.remove(session) {
                let _ = s.on_close();
                log::info!("session {session} closed by peer");
            }
            vec![wire::close_message(session)]
        }
    }
}

fn run_ticks(socket: &UdpSocket, table: &mut Table) {
    let mut expired: Vec<SessionId> = Vec::new();

    for (&id, session) in table.iter_mut() {
        match session.on_tick() {
            Tick::Alive(messages) => {
                let peer = session.peer;
                for message in messages {
                    send(socket, peer, &message);
                }
            }
            Tick::Expired => expired.push(id),
        }
    }

    for id in expired {
        table.remove(id);
        log::info!("session {id} expired");
    }
}

fn send(socket: &UdpSocket, peer: SocketAddr, message: &Message) {
    let bytes = wire::encode(message);
    if let Err(e) = socket.send_to(&bytes, peer) {
        log::warn!("send to {peer} failed: {e}");
    }
}
