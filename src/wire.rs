//! LRCP message framing: encoding, escaping and decoding of the four
//! message kinds onto a single datagram payload.

/// Maximum datagram payload, including delimiters and escaping.
pub const MAX_DATAGRAM: usize = 1000;

/// Largest valid session id, `2^31 - 1`.
pub const SESSION_ID_MAX: u32 = (1 << 31) - 1;

pub type SessionId = u32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Connect {
        session: SessionId,
    },
    Data {
        session: SessionId,
        pos: u32,
        data: Vec<u8>,
    },
    Ack {
        session: SessionId,
        length: u32,
    },
    Close {
        session: SessionId,
    },
}

/// Result of decoding a single datagram. Invalid messages carry no further
/// information: the driver only ever drops them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Valid(Message),
    Invalid,
}

/// Splits `body` (the datagram payload with its outer `/` delimiters
/// already stripped) into its `/`-delimited fields, unescaping `\\` and
/// `\/` within each field. Returns `None` on a trailing backslash or an
/// escape of anything other than `\` or `/`.
fn split_fields(body: &[u8]) -> Option<Vec<Vec<u8>>> {
    let mut fields = Vec::new();
    let mut current = Vec::new();
    let mut i = 0;
    while i < body.len() {
        match body[i] {
            b'\\' => match body.get(i + 1) {
                Some(b'\\') => {
                    current.push(b'\\');
                    i += 2;
                }
                Some(b'/') => {
                    current.push(b'/');
                    i += 2;
                }
                _ => return None,
            },
            b'/' => {
                fields.push(std::mem::take(&mut current));
                i += 1;
            }
            b => {
                current.push(b);
                i += 1;
            }
        }
    }
    fields.push(current);
    Some(fields)
}

/// Parses an ASCII decimal integer in `[0, SESSION_ID_MAX]`. Leading signs,
/// non-digit bytes, and leading zeros beyond a single `0` are rejected.
fn parse_uint(field: &[u8]) -> Option<u32> {
    if field.is_empty() || !field.iter().all(u8::is_ascii_digit) {
        return None;
    }
    if field.len() > 1 && field[0] == b'0' {
        return None;
    }
    let text = std::str::from_utf8(field).ok()?;
    let value: u64 = text.parse().ok()?;
    if value > SESSION_ID_MAX as u64 {
        return None;
    }
    Some(value as u32)
}

pub fn decode(datagram: &[u8]) -> Decoded {
    if datagram.len() < 2
        || datagram.len() > MAX_DATAGRAM
        || datagram[0] != b'/'
        || datagram[datagram.len() - 1] != b'/'
    {
        return Decoded::Invalid;
    }
    let body = &datagram[1..datagram.len() - 1];
    let Some(fields) = split_fields(body) else {
        return Decoded::Invalid;
    };

    let message = match fields.first().map(Vec::as_slice) {
        Some(b"connect") if fields.len() == 2 => parse_uint(&fields[1]).map(|session| Message::Connect { session }),
        Some(b"close") if fields.len() == 2 => parse_uint(&fields[1]).map(|session| Message::Close { session }),
        Some(b"ack") if fields.len() == 3 => {
            let session = parse_uint(&fields[1]);
            let length = parse_uint(&fields[2]);
            session.zip(length).map(|(session, length)| Message::Ack { session, length })
        }
        Some(b"data") if fields.len() == 4 => {
            let session = parse_uint(&fields[1]);
            let pos = parse_uint(&fields[2]);
            session.zip(pos).map(|(session, pos)| Message::Data {
                session,
                pos,
                data: fields[3].clone(),
            })
        }
        _ => None,
    };

    match message {
        Some(message) => Decoded::Valid(message),
        None => Decoded::Invalid,
    }
}

/// Escapes `\` and `/` for use inside a `data` message's DATA field.
fn escape(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for &b in data {
        if b == b'\\' || b == b'/' {
            out.push(b'\\');
        }
        out.push(b);
    }
    out
}

pub fn ack_message(session: SessionId, length: u32) -> Message {
    Message::Ack { session, length }
}

pub fn close_message(session: SessionId) -> Message {
    Message::Close { session }
}

/// Encodes any decoded/constructed [`Message`] back onto the wire.
pub fn encode(message: &Message) -> Vec<u8> {
    match message {
        Message::Connect { session } => encode_connect(*session),
        Message::Data { session, pos, data } => encode_data(*session, *pos, data),
        Message::Ack { session, length } => encode_ack(*session, *length),
        Message::Close { session } => encode_close(*session),
    }
}

pub fn encode_connect(session: SessionId) -> Vec<u8> {
    format!("/connect/{session}/").into_bytes()
}

pub fn encode_ack(session: SessionId, length: u32) -> Vec<u8> {
    format!("/ack/{session}/{length}/").into_bytes()
}

pub fn encode_close(session: SessionId) -> Vec<u8> {
    format!("/close/{session}/").into_bytes()
}

pub fn encode_data(session: SessionId, pos: u32, data: &[u8]) -> Vec<u8> {
    let mut out = format!("/data/{session}/{pos}/").into_bytes();
    out.extend(escape(data));
    out.push(b'/');
    out
}

/// Splits `payload` into `(pos, chunk)` pairs such that
/// `encode_data(session, pos, chunk).len() <= MAX_DATAGRAM` for every
/// chunk, regardless of how much escaping the chunk's bytes require.
/// Chunks are returned in ascending `pos` order starting at `start_pos`.
pub fn chunk_for_send(session: SessionId, start_pos: u32, payload: &[u8]) -> Vec<(u32, Vec<u8>)> {
    let mut chunks = Vec::new();
    let mut offset = 0usize;
    let mut pos = start_pos;

    while offset < payload.len() {
        let header_len = format!("/data/{session}/{pos}/").len();
        let budget = MAX_DATAGRAM.saturating_sub(header_len + 1);

        let mut used = 0usize;
        let mut raw_len = 0usize;
        while offset + raw_len < payload.len() {
            let cost = match payload[offset + raw_len] {
                b'\\' | b'/' => 2,
                _ => 1,
            };
            if used + cost > budget {
                break;
            }
            used += cost;
            raw_len += 1;
        }
        // Budget always has room for at least one (possibly escaped) byte
        // given MAX_DATAGRAM and realistic session ids; guard against a
        // pathological header anyway rather than looping forever.
        if raw_len == 0 {
            raw_len = 1;
        }

        let chunk = payload[offset..offset + raw_len].to_vec();
        chunks.push((pos, chunk));
        pos = pos.wrapping_add(raw_len as u32);
        offset += raw_len;
    }

    chunks
}
