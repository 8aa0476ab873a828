//! Per-session reliability state machine: receive-side byte counter,
//! send-side buffer and counters, retransmission and expiry timers.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::app;
use crate::wire::{self, Message, SessionId};

pub const SESSION_TIMEOUT: Duration = Duration::from_secs(60);
pub const RETRANSMISSION_INTERVAL: Duration = Duration::from_secs(3);

/// Outcome of a tick: either the session is still alive (with zero or more
/// messages to send), or it has expired and must be dropped without reply.
pub enum Tick {
    Alive(Vec<Message>),
    Expired,
}

#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub peer: SocketAddr,

    recv_len: usize,
    recv_buf: Vec<u8>,
    app_consumed: usize,

    send_buf: Vec<u8>,
    acked_len: usize,
    sent_len: usize,

    deadline: Instant,
    retrans_due: Instant,

    pub closed: bool,
}

impl Session {
    pub fn new(id: SessionId, peer: SocketAddr) -> Self {
        let now = Instant::now();
        Session {
            id,
            peer,
            recv_len: 0,
            recv_buf: Vec::new(),
            app_consumed: 0,
            send_buf: Vec::new(),
            acked_len: 0,
            sent_len: 0,
            deadline: now + SESSION_TIMEOUT,
            retrans_due: now + RETRANSMISSION_INTERVAL,
            closed: false,
        }
    }

    pub fn recv_len(&self) -> usize {
        self.recv_len
    }

    fn refresh_deadline(&mut self) {
        self.deadline = Instant::now() + SESSION_TIMEOUT;
    }

    /// `connect` for an id that already has an open session: re-ack,
    /// never reset counters.
    pub fn on_connect(&mut self) -> Vec<Message> {
        self.refresh_deadline();
        vec![wire::ack_message(self.id, self.recv_len as u32)]
    }

    pub fn on_data(&mut self, pos: u32, payload: &[u8]) -> Vec<Message> {
        self.refresh_deadline();
        let pos = pos as usize;

        if pos > self.recv_len {
            // Peer skipped ahead; no reordering buffer, discard and re-ack.
            return vec![wire::ack_message(self.id, self.recv_len as u32)];
        }

        if pos < self.recv_len {
            let skip = self.recv_len - pos;
            if payload.len() > skip {
                self.recv_buf.extend_from_slice(&payload[skip..]);
                self.recv_len = self.recv_buf.len();
            }
            // else: pure duplicate, nothing to append.
        } else {
            self.recv_buf.extend_from_slice(payload);
            self.recv_len = self.recv_buf.len();
        }

        app::run(self);

        vec![wire::ack_message(self.id, self.recv_len as u32)]
    }

    /// Returns `(messages, close_locally)`. `close_locally` means the
    /// caller must remove the session from the table after sending.
    pub fn on_ack(&mut self, length: u32) -> (Vec<Message>, bool) {
        self.refresh_deadline();
        let length = length as usize;

        if length > self.send_buf.len() {
            self.closed = true;
            return (vec![wire::close_message(self.id)], true);
        }

        if length <= self.acked_len {
            return (Vec::new(), false);
        }

        self.acked_len = length;
        if self.acked_len < self.sent_len {
            self.retrans_due = Instant::now();
        }
        // acked_len == sent_len == send_buf.len(): nothing left to send,
        // `should_transmit` below naturally stops firing retransmissions.
        (Vec::new(), false)
    }

    pub fn on_close(&mut self) -> Message {
        self.closed = true;
        wire::close_message(self.id)
    }

    fn should_transmit(&self) -> bool {
        self.acked_len < self.sent_len || self.sent_len < self.send_buf.len()
    }

    pub fn on_tick(&mut self) -> Tick {
        let now = Instant::now();
        if now >= self.deadline {
            return Tick::Expired;
        }

        let mut messages = Vec::new();
        if now >= self.retrans_due && self.should_transmit() {
            let payload = &self.send_buf[self.acked_len..];
            for (pos, chunk) in wire::chunk_for_send(self.id, self.acked_len as u32, payload) {
                messages.push(Message::Data {
                    session: self.id,
                    pos,
                    data: chunk,
                });
            }
            self.sent_len = self.send_buf.len();
            self.retrans_due = now + RETRANSMISSION_INTERVAL;
        }
        Tick::Alive(messages)
    }

    /// Appends application-produced bytes to the outbound stream and
    /// requests an immediate retransmission pass.
    pub(crate) fn queue_send(&mut self, data: &[u8]) {
        self.send_buf.extend_from_slice(data);
        self.retrans_due = Instant::now();
    }

    pub(crate) fn recv_window(&self) -> &[u8] {
        &self.recv_buf[self.app_consumed..self.recv_len]
    }

    pub(crate) fn advance_app_consumed(&mut self, n: usize) {
        self.app_consumed += n;
    }

    #[cfg(test)]
    pub(crate) fn send_buf_for_test(&self) -> &[u8] {
        &self.send_buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn peer() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 9999)
    }

    #[test]
    fn connect_reacks_without_resetting_counters() {
        let mut s = Session::new(1, peer());
        s.on_data(0, b"hello\n");
        assert_eq!(s.recv_len(), 6);
        let msgs = s.on_connect();
        assert_eq!(msgs, vec![wire::ack_message(1, 6)]);
        assert_eq!(s.recv_len(), 6);
    }

    #[test]
    fn out_of_order_data_is_discarded() {
        let mut s = Session::new(3, peer());
        let msgs = s.on_data(5, b"world\n");
        assert_eq!(msgs, vec![wire::ack_message(3, 0)]);
        assert_eq!(s.recv_len(), 0);
    }

    #[test]
    fn duplicate_data_reacks_without_advancing() {
        let mut s = Session::new(4, peer());
        s.on_data(0, b"hi\n");
        assert_eq!(s.recv_len(), 3);
        s.on_data(0, b"hi\n");
        assert_eq!(s.recv_len(), 3);
    }

    #[test]
    fn partial_overlap_extends_frontier() {
        let mut s = Session::new(5, peer());
        s.on_data(0, b"ab");
        assert_eq!(s.recv_len(), 2);
        // peer resends "ab" plus new bytes "cd\n"
        s.on_data(0, b"abcd\n");
        assert_eq!(s.recv_len(), 5);
    }

    #[test]
    fn ack_beyond_sent_closes_locally() {
        let mut s = Session::new(6, peer());
        s.queue_send(b"olleh\n");
        let (msgs, close) = s.on_ack(7);
        assert!(close);
        assert!(s.closed);
        assert_eq!(msgs, vec![wire::close_message(6)]);
    }

    #[test]
    fn duplicate_ack_is_idempotent() {
        let mut s = Session::new(7, peer());
        s.queue_send(b"olleh\n");
        let _ = s.on_tick(); // marks sent_len
        let (msgs1, close1) = s.on_ack(6);
        let (msgs2, close2) = s.on_ack(6);
        assert!(msgs1.is_empty() && msgs2.is_empty());
        assert!(!close1 && !close2);
    }

    #[test]
    fn retransmits_unacked_tail_on_tick() {
        let mut s = Session::new(8, peer());
        s.queue_send(b"olleh\n");
        match s.on_tick() {
            Tick::Alive(msgs) => assert_eq!(
                msgs,
                vec![Message::Data {
                    session: 8,
                    pos: 0,
                    data: b"olleh\n".to_vec()
                }]
            ),
            Tick::Expired => panic!("should not expire immediately"),
        }
    }
}
