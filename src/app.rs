//! The application loop: a pure byte-stream transformer that turns
//! contiguous received bytes into outbound reversed lines. Makes no use of
//! the peer address and performs no I/O of its own.

use crate::session::Session;

/// Scans the session's newly-contiguous received bytes for complete lines,
/// reverses each one (the bytes before the terminating `\n`), and appends
/// the reversed line plus `\n` to the session's send buffer. Partial,
/// unterminated lines are left buffered for the next call. Returns `true`
/// if at least one line was produced.
pub fn run(session: &mut Session) -> bool {
    let mut produced = false;
    let mut consumed = 0;

    loop {
        let window = session.recv_window();
        let Some(newline) = window[consumed..].iter().position(|&b| b == b'\n') else {
            break;
        };
        let line_end = consumed + newline;
        let mut reversed: Vec<u8> = window[consumed..line_end].to_vec();
        reversed.reverse();
        reversed.push(b'\n');
        session.queue_send(&reversed);
        consumed = line_end + 1;
        produced = true;
    }

    if consumed > 0 {
        session.advance_app_consumed(consumed);
    }
    produced
}
