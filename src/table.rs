//! The session table: a mapping from session id to [`Session`] state. The
//! server driver is its only owner; see `server.rs` for how ingress and
//! timer ticks each get an exclusive mutation context per event (spec's
//! single-threaded cooperative model, §5).

use std::collections::HashMap;
use std::net::SocketAddr;

use crate::session::Session;
use crate::wire::SessionId;

#[derive(Debug, Default)]
pub struct Table {
    sessions: HashMap<SessionId, Session>,
}

impl Table {
    pub fn new() -> Self {
        Table {
            sessions: HashMap::new(),
        }
    }

    /// Returns the existing session for `id`, or creates and returns a
    /// fresh one bound to `peer`. Only `connect` may create a session.
    pub fn get_or_create(&mut self, id: SessionId, peer: SocketAddr) -> (&mut Session, bool) {
        let mut created = false;
        let session = self.sessions.entry(id).or_insert_with(|| {
            created = true;
            Session::new(id, peer)
        });
        (session, created)
    }

    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    pub fn remove(&mut self, id: SessionId) -> Option<Session> {
        self.sessions.remove(&id)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&SessionId, &mut Session)> {
        self.sessions.iter_mut()
    }
}
