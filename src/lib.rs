//! LRCP: a reliable, session-oriented protocol layered atop an unreliable
//! datagram transport. Reassembles a per-session ordered byte stream from
//! the peer, delivers whole lines to the application (which reverses each
//! one), and retransmits the reversed lines back despite packet loss,
//! reordering, and duplication.

mod app;
mod err;
mod server;
mod session;
mod table;
pub mod wire;

pub use err::Error;
pub use server::serve;
pub use session::{RETRANSMISSION_INTERVAL, SESSION_TIMEOUT};
pub use wire::{Message, SessionId};
