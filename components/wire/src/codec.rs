use std::convert::TryFrom;

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use smr::{Command, Operation, ProposeReply};

use crate::WireError;

/// Tag of a propose request.
pub const PROPOSE: u8 = 0;

/// tag, command id, op, key, value, timestamp.
pub const PROPOSE_LEN: usize = 1 + 4 + 1 + 8 + 8 + 8;

/// ok, command id, value, timestamp.
pub const REPLY_LEN: usize = 1 + 4 + 8 + 8;

/// Propose is a client request to execute one command.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Propose {
    pub command_id: i32,
    pub command: Command,

    /// client side timestamp, opaque to the server.
    pub timestamp: i64,
}

impl Propose {
    pub fn new(command_id: i32, command: Command) -> Propose {
        Propose {
            command_id,
            command,
            timestamp: 0,
        }
    }
}

fn decode_propose(src: &mut BytesMut) -> Result<Option<Propose>, WireError> {
    let tag = match src.first() {
        Some(t) => *t,
        None => return Ok(None),
    };
    if tag != PROPOSE {
        return Err(WireError::BadTag(tag));
    }

    if src.len() < PROPOSE_LEN {
        src.reserve(PROPOSE_LEN - src.len());
        return Ok(None);
    }

    let mut buf = src.split_to(PROPOSE_LEN);
    buf.advance(1);

    let command_id = buf.get_i32_le();
    let code = buf.get_u8();
    let op = Operation::try_from(code).map_err(WireError::BadOp)?;
    let key = buf.get_i64_le();
    let value = buf.get_i64_le();
    let timestamp = buf.get_i64_le();

    Ok(Some(Propose {
        command_id,
        command: Command::of(op, key, value),
        timestamp,
    }))
}

fn encode_propose(p: &Propose, dst: &mut BytesMut) {
    dst.reserve(PROPOSE_LEN);
    dst.put_u8(PROPOSE);
    dst.put_i32_le(p.command_id);
    dst.put_u8(p.command.op.into());
    dst.put_i64_le(p.command.key);
    dst.put_i64_le(p.command.value);
    dst.put_i64_le(p.timestamp);
}

fn decode_reply(src: &mut BytesMut) -> Option<ProposeReply> {
    if src.len() < REPLY_LEN {
        src.reserve(REPLY_LEN - src.len());
        return None;
    }

    let mut buf = src.split_to(REPLY_LEN);
    Some(ProposeReply {
        ok: buf.get_u8() != 0,
        command_id: buf.get_i32_le(),
        value: buf.get_i64_le(),
        timestamp: buf.get_i64_le(),
    })
}

fn encode_reply(r: &ProposeReply, dst: &mut BytesMut) {
    dst.reserve(REPLY_LEN);
    dst.put_u8(r.ok as u8);
    dst.put_i32_le(r.command_id);
    dst.put_i64_le(r.value);
    dst.put_i64_le(r.timestamp);
}

/// ProposeCodec is the server side codec: it reads proposals and writes replies.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProposeCodec;

impl Decoder for ProposeCodec {
    type Item = Propose;
    type Error = WireError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Propose>, WireError> {
        decode_propose(src)
    }
}

impl Encoder<ProposeReply> for ProposeCodec {
    type Error = WireError;

    fn encode(&mut self, item: ProposeReply, dst: &mut BytesMut) -> Result<(), WireError> {
        encode_reply(&item, dst);
        Ok(())
    }
}

/// ClientCodec writes proposals and reads replies.
#[derive(Clone, Copy, Debug, Default)]
pub struct ClientCodec;

impl Decoder for ClientCodec {
    type Item = ProposeReply;
    type Error = WireError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<ProposeReply>, WireError> {
        Ok(decode_reply(src))
    }
}

impl Encoder<Propose> for ClientCodec {
    type Error = WireError;

    fn encode(&mut self, item: Propose, dst: &mut BytesMut) -> Result<(), WireError> {
        encode_propose(&item, dst);
        Ok(())
    }
}
