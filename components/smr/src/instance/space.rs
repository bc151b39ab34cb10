use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::instance::{
    Instance, InstanceId, InstanceIdx, InstanceStatus, ReplicaId, Seq, SpaceError, NO_DEP,
};

/// Slot holds an instance that may not have arrived yet. The status channel
/// exists as soon as anyone waits on the slot, so waiters are woken when the
/// instance is created and on every status transition.
struct Slot {
    inst: Option<Instance>,
    status: watch::Sender<InstanceStatus>,
}

impl Slot {
    fn new() -> Slot {
        let (tx, _) = watch::channel(InstanceStatus::Na);
        Slot {
            inst: None,
            status: tx,
        }
    }
}

/// Log is the instance log of one replica. Only slots that hold an instance
/// or have been waited on are kept.
struct Log {
    slots: BTreeMap<InstanceIdx, Slot>,

    /// every instance at or below exec_up_to is executed.
    exec_up_to: InstanceIdx,
    max_idx: InstanceIdx,
}

impl Log {
    fn new() -> Log {
        Log {
            slots: BTreeMap::new(),
            exec_up_to: NO_DEP,
            max_idx: NO_DEP,
        }
    }

    fn slot_mut(&mut self, idx: InstanceIdx) -> &mut Slot {
        self.slots.entry(idx).or_insert_with(Slot::new)
    }

    fn inst(&self, idx: InstanceIdx) -> Option<&Instance> {
        self.slots.get(&idx)?.inst.as_ref()
    }

    fn inst_mut(&mut self, idx: InstanceIdx) -> Option<(&mut Instance, &watch::Sender<InstanceStatus>)> {
        let slot = self.slots.get_mut(&idx)?;
        let inst = slot.inst.as_mut()?;
        Some((inst, &slot.status))
    }

    fn advance_exec_up_to(&mut self) {
        while let Some(inst) = self.inst(self.exec_up_to + 1) {
            if inst.status != InstanceStatus::Executed {
                break;
            }
            self.exec_up_to += 1;
        }
    }
}

/// InstanceSpace is the instance logs of all replicas, indexed by
/// (replica_id, idx).
///
/// Slots are created at most once and never removed. The agreement protocol
/// creates instances and moves them up to `Committed`; only the executor moves
/// them to `Executed`.
pub struct InstanceSpace {
    n_replicas: usize,
    logs: Vec<Mutex<Log>>,
}

impl InstanceSpace {
    pub fn new(n_replicas: usize) -> InstanceSpace {
        InstanceSpace {
            n_replicas,
            logs: (0..n_replicas).map(|_| Mutex::new(Log::new())).collect(),
        }
    }

    pub fn n_replicas(&self) -> usize {
        self.n_replicas
    }

    fn log(&self, rid: ReplicaId) -> Result<MutexGuard<'_, Log>, SpaceError> {
        if rid < 0 || rid as usize >= self.n_replicas {
            return Err(SpaceError::ReplicaNotFound(rid));
        }
        // a poisoned log only means a panic elsewhere; its data is still consistent.
        Ok(self.logs[rid as usize]
            .lock()
            .unwrap_or_else(PoisonError::into_inner))
    }

    fn log_of(&self, iid: InstanceId) -> Result<MutexGuard<'_, Log>, SpaceError> {
        if iid.idx < 0 {
            return Err(SpaceError::InvalidId(iid));
        }
        self.log(iid.replica_id)
    }

    fn check_deps(&self, iid: InstanceId, deps: &[InstanceIdx]) -> Result<(), SpaceError> {
        if deps.len() != self.n_replicas {
            return Err(SpaceError::BadDeps(iid, self.n_replicas, deps.len()));
        }
        Ok(())
    }

    /// insert creates the slot of `inst.instance_id`.
    pub fn insert(&self, inst: Instance) -> Result<(), SpaceError> {
        let iid = inst.instance_id;

        if inst.cmds.is_empty() {
            return Err(SpaceError::EmptyBatch(iid));
        }
        self.check_deps(iid, &inst.deps)?;

        let status = inst.status;
        if status == InstanceStatus::Na || status == InstanceStatus::Executed {
            return Err(SpaceError::BadStatus(iid, status));
        }

        let mut log = self.log_of(iid)?;
        let slot = log.slot_mut(iid.idx);
        if slot.inst.is_some() {
            return Err(SpaceError::Existed(iid));
        }

        slot.inst = Some(inst);
        slot.status.send_replace(status);

        if iid.idx > log.max_idx {
            log.max_idx = iid.idx;
        }
        Ok(())
    }

    /// accept updates the provisional attributes of an instance.
    pub fn accept(&self, iid: InstanceId, seq: Seq, deps: &[InstanceIdx]) -> Result<(), SpaceError> {
        self.update(iid, InstanceStatus::Accepted, seq, deps)
    }

    /// commit fixes the attributes of an instance. After this its
    /// cmds, seq and deps never change.
    pub fn commit(&self, iid: InstanceId, seq: Seq, deps: &[InstanceIdx]) -> Result<(), SpaceError> {
        self.update(iid, InstanceStatus::Committed, seq, deps)
    }

    fn update(
        &self,
        iid: InstanceId,
        to: InstanceStatus,
        seq: Seq,
        deps: &[InstanceIdx],
    ) -> Result<(), SpaceError> {
        self.check_deps(iid, deps)?;

        let mut log = self.log_of(iid)?;
        let (inst, tx) = log.inst_mut(iid.idx).ok_or(SpaceError::NotFound(iid))?;

        if inst.status >= InstanceStatus::Committed {
            return Err(SpaceError::Immutable(iid));
        }
        if to < inst.status {
            return Err(SpaceError::StatusRegression(iid, inst.status, to));
        }

        inst.seq = seq;
        inst.deps = deps.into();
        inst.status = to;
        tx.send_replace(to);
        Ok(())
    }

    /// mark_executed is called by the executor once all commands of a committed
    /// instance are applied. It also moves the execution watermark forward.
    pub(crate) fn mark_executed(&self, iid: InstanceId) -> Result<(), SpaceError> {
        let mut log = self.log_of(iid)?;

        {
            let (inst, tx) = log.inst_mut(iid.idx).ok_or(SpaceError::NotFound(iid))?;
            if inst.status != InstanceStatus::Committed {
                return Err(SpaceError::BadStatus(iid, inst.status));
            }
            inst.status = InstanceStatus::Executed;
            // clients are answered at most once; release their channels.
            inst.pending = None;
            tx.send_replace(InstanceStatus::Executed);
        }

        log.advance_exec_up_to();
        Ok(())
    }

    /// get returns a snapshot of an instance.
    pub fn get(&self, iid: InstanceId) -> Result<Option<Instance>, SpaceError> {
        let log = self.log_of(iid)?;
        Ok(log.inst(iid.idx).cloned())
    }

    pub fn status(&self, iid: InstanceId) -> Result<InstanceStatus, SpaceError> {
        let log = self.log_of(iid)?;
        Ok(log.inst(iid.idx).map(|x| x.status).unwrap_or_default())
    }

    /// exec_up_to returns the execution watermark of a replica, `NO_DEP` if
    /// nothing is executed.
    pub fn exec_up_to(&self, rid: ReplicaId) -> Result<InstanceIdx, SpaceError> {
        Ok(self.log(rid)?.exec_up_to)
    }

    /// max_idx returns the highest index created at a replica, `NO_DEP` if none.
    pub fn max_idx(&self, rid: ReplicaId) -> Result<InstanceIdx, SpaceError> {
        Ok(self.log(rid)?.max_idx)
    }

    /// next_idx returns the index a new instance of replica `rid` gets.
    pub fn next_idx(&self, rid: ReplicaId) -> Result<InstanceIdx, SpaceError> {
        Ok(self.max_idx(rid)? + 1)
    }

    /// wait_status blocks until the instance exists with a status no less than
    /// `at_least`, and returns a snapshot of it.
    ///
    /// There is no timeout: it waits forever for an instance that never comes.
    pub async fn wait_status(
        &self,
        iid: InstanceId,
        at_least: InstanceStatus,
    ) -> Result<Instance, SpaceError> {
        let mut rx = {
            let mut log = self.log_of(iid)?;
            log.slot_mut(iid.idx).status.subscribe()
        };

        loop {
            let st = *rx.borrow_and_update();
            if st >= at_least {
                if let Some(inst) = self.get(iid)? {
                    return Ok(inst);
                }
            }

            // the sender lives as long as the slot, which is never removed.
            if rx.changed().await.is_err() {
                return Err(SpaceError::NotFound(iid));
            }
        }
    }
}
