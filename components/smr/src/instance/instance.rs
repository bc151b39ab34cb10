use derive_more::Display;

use crate::command::Command;
use crate::reply::ClientProposal;

pub type ReplicaId = i64;
pub type InstanceIdx = i64;
pub type Seq = i64;

/// NO_DEP marks a dependency slot that depends on nothing at that replica.
pub const NO_DEP: InstanceIdx = -1;

/// InstanceId addresses one slot of the instance space: the `idx`-th instance
/// proposed by replica `replica_id`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display(fmt = "({}, {})", replica_id, idx)]
pub struct InstanceId {
    pub replica_id: ReplicaId,
    pub idx: InstanceIdx,
}

impl<A: Into<ReplicaId> + Copy, B: Into<InstanceIdx> + Copy> From<(A, B)> for InstanceId {
    fn from(t: (A, B)) -> InstanceId {
        InstanceId {
            replica_id: t.0.into(),
            idx: t.1.into(),
        }
    }
}

impl<A: Into<ReplicaId> + Copy, B: Into<InstanceIdx> + Copy> From<&(A, B)> for InstanceId {
    fn from(t: &(A, B)) -> InstanceId {
        InstanceId {
            replica_id: t.0.into(),
            idx: t.1.into(),
        }
    }
}

/// InstanceStatus only moves forward: an instance is committed by the
/// agreement protocol and executed by the executor, exactly once each.
/// `Na` is the status of a slot that does not exist yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InstanceStatus {
    Na,
    PreAccepted,
    Accepted,
    Committed,
    Executed,
}

impl Default for InstanceStatus {
    fn default() -> Self {
        InstanceStatus::Na
    }
}

/// Instance is one slot of the replicated log: a batch of commands agreed on
/// as a unit, plus the attributes that order it against other instances.
#[derive(Clone, Debug, Default)]
pub struct Instance {
    pub instance_id: InstanceId,
    pub cmds: Vec<Command>,

    /// seq breaks ties inside a strongly connected component.
    pub seq: Seq,

    /// deps[i] is the highest instance index at replica i this instance
    /// depends on, or `NO_DEP`.
    pub deps: Vec<InstanceIdx>,

    pub status: InstanceStatus,

    /// pending is set only on the replica that received the commands from
    /// clients. pending[i] waits for the result of cmds[i].
    pub pending: Option<Vec<ClientProposal>>,
}

impl Instance {
    pub fn of<T: Into<InstanceId>>(iid: T, cmds: &[Command], seq: Seq, deps: &[InstanceIdx]) -> Instance {
        Instance {
            instance_id: iid.into(),
            cmds: cmds.into(),
            seq,
            deps: deps.into(),
            status: InstanceStatus::PreAccepted,
            pending: None,
        }
    }

    /// lead returns the first command, the one that decides which dependency
    /// edges of this instance are followed during execution.
    pub fn lead(&self) -> Option<&Command> {
        self.cmds.first()
    }

    pub fn is_committed(&self) -> bool {
        self.status >= InstanceStatus::Committed
    }
}
