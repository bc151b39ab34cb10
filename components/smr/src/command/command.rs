use std::convert::TryFrom;

use derive_more::Display;

pub type Key = i64;
pub type Value = i64;

/// NIL is what a read of an absent key, or an unsupported operation, returns.
pub const NIL: Value = 0;

/// Operation is the verb of a command. The numeric value is the on-wire op code.
///
/// The set is shared by all workloads; what an operation means, and which
/// operations conflict, is decided by the active `Workload`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Operation {
    None = 0,
    Put = 1,
    Get = 2,
    Increment = 3,
    Read = 4,
    FastRead = 5,
    Create = 6,
    Like = 7,
    Post = 8,
}

impl Default for Operation {
    fn default() -> Self {
        Operation::None
    }
}

impl TryFrom<u8> for Operation {
    type Error = u8;

    /// try_from returns the unknown op code as error.
    fn try_from(code: u8) -> Result<Self, Self::Error> {
        let op = match code {
            0 => Operation::None,
            1 => Operation::Put,
            2 => Operation::Get,
            3 => Operation::Increment,
            4 => Operation::Read,
            5 => Operation::FastRead,
            6 => Operation::Create,
            7 => Operation::Like,
            8 => Operation::Post,
            _ => return Err(code),
        };
        Ok(op)
    }
}

impl From<Operation> for u8 {
    fn from(op: Operation) -> u8 {
        op as u8
    }
}

/// Command is the unit a client asks to execute.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Display)]
#[display(fmt = "{:?}({}, {})", op, key, value)]
pub struct Command {
    pub op: Operation,
    pub key: Key,
    pub value: Value,
}

impl Command {
    pub fn of(op: Operation, key: Key, value: Value) -> Command {
        Command { op, key, value }
    }
}

impl From<(Operation, Key, Value)> for Command {
    fn from(t: (Operation, Key, Value)) -> Command {
        Command::of(t.0, t.1, t.2)
    }
}
