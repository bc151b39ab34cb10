use crate::command::{Command, Operation, Value, NIL};
use crate::workload::State;

/// Workload selects the command semantics of a deployment: which operations
/// conflict and how a command is applied to `State`.
///
/// It is chosen once when a replica is built and must not change while it runs.
/// For every workload `conflict` is symmetric, and two commands it reports as
/// non-conflicting produce the same `State` in either execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, enum_utils::FromStr)]
#[enumeration(case_insensitive)]
pub enum Workload {
    /// Plain key-value store: Put and Get.
    Generic,
    /// Inventory counters: Increment, Read, FastRead and Create.
    Inventory,
    /// Social "likes": Post, Like, Read and FastRead.
    Social,
}

impl Default for Workload {
    fn default() -> Self {
        Workload::Generic
    }
}

impl Workload {
    /// conflict checks if the execution order of two commands matters.
    pub fn conflict(&self, a: &Command, b: &Command) -> bool {
        if a.key != b.key {
            return false;
        }

        match self {
            Workload::Generic => generic_conflict(a.op, b.op),
            Workload::Inventory => inventory_conflict(a.op, b.op),
            Workload::Social => social_conflict(a.op, b.op),
        }
    }

    /// conflict_batch checks if any command in `a` conflicts with any in `b`.
    pub fn conflict_batch(&self, a: &[Command], b: &[Command]) -> bool {
        a.iter().any(|x| b.iter().any(|y| self.conflict(x, y)))
    }

    /// execute applies `cmd` to `st` and returns the value to report to the client.
    pub fn execute(&self, cmd: &Command, st: &mut State) -> Value {
        match self {
            Workload::Generic => generic_execute(cmd, st),
            Workload::Inventory => inventory_execute(cmd, st),
            Workload::Social => social_execute(cmd, st),
        }
    }
}

// A get conflicts with every put on the same key; gets commute.
fn generic_conflict(a: Operation, b: Operation) -> bool {
    use Operation::*;
    match (a, b) {
        (Put, Put) | (Put, Get) | (Get, Put) => true,
        _ => false,
    }
}

fn generic_execute(cmd: &Command, st: &mut State) -> Value {
    match cmd.op {
        Operation::Put => {
            st.store.insert(cmd.key, cmd.value);
            cmd.value
        }
        Operation::Get => st.get(cmd.key),
        _ => NIL,
    }
}

// Increments commute with each other. A strong read must be ordered against
// increments, and a create overwrites the counter.
fn inventory_conflict(a: Operation, b: Operation) -> bool {
    use Operation::*;
    match (a, b) {
        (Read, Increment) | (Increment, Read) => true,
        (Create, Create) | (Create, Increment) | (Create, Read) => true,
        (Increment, Create) | (Read, Create) => true,
        _ => false,
    }
}

fn inventory_execute(cmd: &Command, st: &mut State) -> Value {
    match cmd.op {
        Operation::Increment => {
            let v = st.store.entry(cmd.key).or_insert(NIL);
            *v = v.wrapping_add(cmd.value);
            *v
        }
        Operation::Create => {
            st.store.insert(cmd.key, cmd.value);
            cmd.value
        }
        Operation::Read | Operation::FastRead => st.get(cmd.key),
        _ => NIL,
    }
}

// Likes commute with each other; a strong read must be ordered against them.
// A post resets the like set, so it is ordered against everything but fast reads.
fn social_conflict(a: Operation, b: Operation) -> bool {
    use Operation::*;
    match (a, b) {
        (Like, Read) | (Read, Like) => true,
        (Post, Post) | (Post, Like) | (Post, Read) => true,
        (Like, Post) | (Read, Post) => true,
        _ => false,
    }
}

fn social_execute(cmd: &Command, st: &mut State) -> Value {
    match cmd.op {
        Operation::Post => {
            st.store.insert(cmd.key, cmd.value);
            st.likes.insert(cmd.key, Default::default());
            cmd.value
        }
        Operation::Like => {
            let likes = st.likes.entry(cmd.key).or_default();
            likes.insert(cmd.value);
            likes.len() as Value
        }
        Operation::Read | Operation::FastRead => st.like_count(cmd.key),
        _ => NIL,
    }
}
