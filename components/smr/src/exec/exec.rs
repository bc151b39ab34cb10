use std::sync::{Arc, Mutex, PoisonError};

use slog::{debug, o, trace, warn, Logger};

use crate::command::Command;
use crate::exec::tarjan::Tarjan;
use crate::exec::ExecError;
use crate::instance::{
    Instance, InstanceId, InstanceIdx, InstanceSpace, InstanceStatus, ReplicaId, SpaceError,
};
use crate::workload::{State, Workload};

/// Frame is one instance on the depth-first walk, with a cursor over the
/// dependency slots still to examine.
struct Frame {
    inst: Instance,
    lead: Command,

    // discovery stack depth before this instance was pushed.
    base: usize,

    replica: usize,
    next: Option<InstanceIdx>,

    // the unvisited dependency the walk descended into from this frame.
    child: Option<InstanceId>,
}

impl Frame {
    fn enter(tarjan: &mut Tarjan, inst: Instance) -> Result<Frame, ExecError> {
        let iid = inst.instance_id;
        let lead = *inst.lead().ok_or(SpaceError::EmptyBatch(iid))?;
        let base = tarjan.visit(iid);

        Ok(Frame {
            inst,
            lead,
            base,
            replica: 0,
            next: None,
            child: None,
        })
    }

    fn iid(&self) -> InstanceId {
        self.inst.instance_id
    }

    /// next_candidate returns the next instance this frame may depend on.
    ///
    /// For every replica r it yields the indexes from the execution watermark
    /// of r + 1 through deps[r]. Anything at or below the watermark is already
    /// executed and imposes no order.
    fn next_candidate(&mut self, space: &InstanceSpace) -> Result<Option<InstanceId>, SpaceError> {
        while self.replica < self.inst.deps.len() {
            let rid = self.replica as ReplicaId;
            let idx = match self.next {
                Some(idx) => idx,
                None => space.exec_up_to(rid)? + 1,
            };

            if idx <= self.inst.deps[self.replica] {
                self.next = Some(idx + 1);
                return Ok(Some((rid, idx).into()));
            }

            self.replica += 1;
            self.next = None;
        }

        Ok(None)
    }
}

/// Executor turns committed instances into a deterministic execution order and
/// applies them to `State`.
///
/// Committed instances and their conflicting dependencies form a graph. Every
/// strongly connected component of it is executed as one unit, ordered by
/// `seq`. Since every replica finds the same components and the same seqs, all
/// replicas execute conflicting commands in the same order.
///
/// Only one discovery runs at a time: the run lock is held for a whole
/// discovery-and-apply cycle, and `State` is only touched while holding it.
pub struct Executor {
    space: Arc<InstanceSpace>,
    workload: Workload,
    state: Mutex<State>,
    run: tokio::sync::Mutex<Tarjan>,

    /// reply to clients after execution.
    dreply: bool,

    logger: Logger,
}

impl Executor {
    pub fn new(space: Arc<InstanceSpace>, workload: Workload, logger: &Logger) -> Executor {
        Executor {
            space,
            workload,
            state: Mutex::new(State::new()),
            run: tokio::sync::Mutex::new(Tarjan::default()),
            dreply: true,
            logger: logger.new(o!("module" => "exec")),
        }
    }

    pub fn with_dreply(mut self, dreply: bool) -> Executor {
        self.dreply = dreply;
        self
    }

    pub fn space(&self) -> &Arc<InstanceSpace> {
        &self.space
    }

    pub fn workload(&self) -> Workload {
        self.workload
    }

    /// state returns a snapshot of the applied state.
    pub fn state(&self) -> State {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// execute_command executes the instance `iid`, along with every instance
    /// it has to be executed after or together with.
    ///
    /// It returns Ok(false) if the instance does not exist or is not committed
    /// yet; the caller should try again later. It returns Ok(true) once the
    /// instance is executed, at once if it already was.
    ///
    /// It blocks while a conflicting dependency has not arrived or is not
    /// committed, with no timeout. Dropping the future while it blocks is
    /// safe: components applied so far stay executed.
    pub async fn execute_command(&self, iid: InstanceId) -> Result<bool, ExecError> {
        match self.space.status(iid)? {
            InstanceStatus::Executed => return Ok(true),
            InstanceStatus::Committed => {}
            _ => return Ok(false),
        }

        let mut tarjan = self.run.lock().await;
        // a cancelled run leaves its scratch behind.
        tarjan.reset();

        // another run may have executed it while we waited for the lock.
        let inst = match self.space.get(iid)? {
            Some(inst) => inst,
            None => return Ok(false),
        };
        if inst.status == InstanceStatus::Executed {
            return Ok(true);
        }

        let rst = self.find_scc(&mut tarjan, inst).await;
        tarjan.reset();
        rst?;

        Ok(true)
    }

    async fn find_scc(&self, tarjan: &mut Tarjan, root: Instance) -> Result<(), ExecError> {
        let root_id = root.instance_id;
        let root = Frame::enter(tarjan, root)?;
        let base = root.base;

        let mut frames = vec![root];
        let rst = self.strong_connect(tarjan, &mut frames).await;

        if let Err(e) = &rst {
            warn!(self.logger, "abort discovery"; "root" => %root_id, "error" => %e);
            tarjan.unwind(base);
        }
        rst
    }

    /// strong_connect is Tarjan's algorithm with an explicit frame stack.
    /// Only edges between instances whose lead commands conflict are followed.
    async fn strong_connect(
        &self,
        tarjan: &mut Tarjan,
        frames: &mut Vec<Frame>,
    ) -> Result<(), ExecError> {
        loop {
            let top = match frames.last_mut() {
                Some(top) => top,
                None => return Ok(()),
            };
            let v = top.iid();
            let lead = top.lead;

            if let Some(child) = top.child.take() {
                let low = tarjan.get(child).low;
                tarjan.lower(v, low);
            }

            let w = match top.next_candidate(&self.space)? {
                Some(w) => w,
                None => {
                    frames.pop();
                    if tarjan.is_root(v) {
                        let component = tarjan.pop_component(v);
                        self.apply(component)?;
                    }
                    continue;
                }
            };

            if w == v {
                continue;
            }

            let w_inst = match self.wait_committed(w).await? {
                Some(inst) => inst,
                None => continue,
            };

            let w_lead = *w_inst.lead().ok_or(SpaceError::EmptyBatch(w))?;
            if !self.workload.conflict(&lead, &w_lead) {
                trace!(self.logger, "skip non-conflicting dep"; "from" => %v, "to" => %w);
                continue;
            }

            if !tarjan.is_visited(w) {
                if let Some(top) = frames.last_mut() {
                    top.child = Some(w);
                }
                frames.push(Frame::enter(tarjan, w_inst)?);
            } else if tarjan.is_on_stack(w) {
                let order = tarjan.get(w).order;
                tarjan.lower(v, order);
            }
        }
    }

    /// wait_committed waits for a dependency to arrive and commit. It returns
    /// None if the dependency is already executed.
    async fn wait_committed(&self, iid: InstanceId) -> Result<Option<Instance>, ExecError> {
        if self.space.status(iid)? == InstanceStatus::Na {
            debug!(self.logger, "wait for dep to arrive"; "iid" => %iid);
        }

        let inst = self
            .space
            .wait_status(iid, InstanceStatus::PreAccepted)
            .await?;

        let inst = match inst.status {
            InstanceStatus::Executed => return Ok(None),
            InstanceStatus::Committed => inst,
            st => {
                debug!(self.logger, "wait for dep to commit"; "iid" => %iid, "status" => ?st);
                self.space
                    .wait_status(iid, InstanceStatus::Committed)
                    .await?
            }
        };

        if inst.status == InstanceStatus::Executed {
            return Ok(None);
        }
        Ok(Some(inst))
    }

    /// apply executes a strongly connected component in seq order. Equal seqs
    /// are ordered by instance id so that every replica picks the same order.
    fn apply(&self, component: Vec<InstanceId>) -> Result<(), ExecError> {
        let mut insts = Vec::with_capacity(component.len());
        for iid in component {
            let inst = self.space.get(iid)?.ok_or(SpaceError::NotFound(iid))?;
            insts.push(inst);
        }
        insts.sort_by_key(|x| (x.seq, x.instance_id));

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        for inst in insts.iter() {
            for (i, cmd) in inst.cmds.iter().enumerate() {
                let val = self.workload.execute(cmd, &mut state);

                if !self.dreply {
                    continue;
                }
                if let Some(p) = inst.pending.as_ref().and_then(|ps| ps.get(i)) {
                    p.send_reply(val, &self.logger);
                }
            }

            self.space.mark_executed(inst.instance_id)?;
            debug!(self.logger, "executed";
                   "iid" => %inst.instance_id,
                   "seq" => inst.seq,
                   "n_cmds" => inst.cmds.len(),
                   "scc_size" => insts.len());
        }

        Ok(())
    }
}
