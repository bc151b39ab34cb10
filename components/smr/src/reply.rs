use std::time::Instant;

use slog::{debug, Logger};
use tokio::sync::mpsc::UnboundedSender;

use crate::command::Value;

/// ProposeReply is sent back to a client once its command is executed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProposeReply {
    pub ok: bool,
    pub command_id: i32,
    pub value: Value,
    /// nanoseconds elapsed between receiving the proposal and replying to it.
    pub timestamp: i64,
}

/// ReplyTx is the reply half of a client connection. The connection owns the
/// receiving end; instances only hold clones of the sender.
pub type ReplyTx = UnboundedSender<ProposeReply>;

/// ClientProposal is a pending client of one command in an instance.
#[derive(Clone, Debug)]
pub struct ClientProposal {
    pub command_id: i32,
    pub reply: ReplyTx,
    pub start: Instant,
}

impl ClientProposal {
    pub fn new(command_id: i32, reply: ReplyTx) -> ClientProposal {
        ClientProposal {
            command_id,
            reply,
            start: Instant::now(),
        }
    }

    /// send_reply delivers `value` without waiting. A gone client is not an error.
    pub fn send_reply(&self, value: Value, logger: &Logger) {
        let elapsed = self.start.elapsed().as_nanos() as i64;
        let r = ProposeReply {
            ok: true,
            command_id: self.command_id,
            value,
            timestamp: elapsed,
        };

        if self.reply.send(r).is_err() {
            debug!(logger, "client gone, reply dropped"; "command_id" => self.command_id);
        }
    }
}
