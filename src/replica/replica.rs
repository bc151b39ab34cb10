use std::sync::Arc;
use std::time::Duration;

use futures::future::FutureExt;
use futures::Future;
use slog::{debug, error, info, o, Logger};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::Notify;

use smr::{
    ClientProposal, Command, Executor, Instance, InstanceId, InstanceIdx, InstanceSpace,
    ReplicaId, Seq, NIL, NO_DEP,
};

use crate::conf::ReplicaConf;
use crate::replica::ReplicaError;

/// Proposal is a client command waiting to be put into an instance.
#[derive(Debug)]
pub struct Proposal {
    pub client: ClientProposal,
    pub cmd: Command,
}

impl Proposal {
    pub fn new(client: ClientProposal, cmd: Command) -> Proposal {
        Proposal { client, cmd }
    }
}

/// Replica drives one replica of the instance space: it batches client
/// proposals into its own instances and keeps executing whatever is committed.
///
/// It commits its own instances on its own: the attributes are computed from
/// the local view of the instance space, as a pre-accept would, and committed
/// unchanged. Instances of other replicas are fed to `space()` by whatever
/// agreement protocol runs in front of it.
pub struct Replica {
    replica_id: ReplicaId,
    max_batch: usize,
    exec_interval: Duration,

    /// reply once executed, instead of once committed.
    dreply: bool,

    space: Arc<InstanceSpace>,
    executor: Arc<Executor>,

    proposals: UnboundedSender<Proposal>,

    /// wakes up the exec loop when an instance is committed.
    committed: Notify,

    logger: Logger,
}

impl Replica {
    /// new creates a replica and the receiving end of its proposal queue, which
    /// is to be handed to `batch_loop`.
    pub fn new(conf: &ReplicaConf, logger: &Logger) -> (Replica, UnboundedReceiver<Proposal>) {
        let logger = logger.new(o!("replica_id" => conf.replica_id));

        let space = Arc::new(InstanceSpace::new(conf.n_replicas));
        let executor =
            Executor::new(space.clone(), conf.workload, &logger).with_dreply(conf.dreply);

        let (tx, rx) = unbounded_channel();

        let r = Replica {
            replica_id: conf.replica_id,
            max_batch: conf.max_batch,
            exec_interval: conf.exec_interval(),
            dreply: conf.dreply,
            space,
            executor: Arc::new(executor),
            proposals: tx,
            committed: Notify::new(),
            logger,
        };
        (r, rx)
    }

    pub fn replica_id(&self) -> ReplicaId {
        self.replica_id
    }

    pub fn space(&self) -> &Arc<InstanceSpace> {
        &self.space
    }

    pub fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    /// propose queues a client command. It fails only once the batch loop is gone.
    pub fn propose(&self, p: Proposal) -> Result<(), ReplicaError> {
        self.proposals.send(p).or(Err(ReplicaError::Closed))
    }

    /// local_attrs computes seq and deps of a batch from the instances this
    /// replica knows of.
    ///
    /// deps[q] is the highest not yet executed instance of replica q that has a
    /// command conflicting with the batch. seq is greater than the seq of every
    /// such instance.
    pub fn local_attrs(&self, cmds: &[Command]) -> Result<(Seq, Vec<InstanceIdx>), ReplicaError> {
        let workload = self.executor.workload();
        let n = self.space.n_replicas();

        let mut deps = vec![NO_DEP; n];
        let mut seq = 0;

        for (q, dep) in deps.iter_mut().enumerate() {
            let rid = q as ReplicaId;
            let lowest = self.space.exec_up_to(rid)? + 1;

            let mut idx = self.space.max_idx(rid)?;
            while idx >= lowest {
                if let Some(inst) = self.space.get((rid, idx).into())? {
                    if workload.conflict_batch(&inst.cmds, cmds) {
                        *dep = idx;
                        seq = seq.max(inst.seq);
                        break;
                    }
                }
                idx -= 1;
            }
        }

        Ok((seq + 1, deps))
    }

    /// commit_batch puts a batch of proposals into the next instance of this
    /// replica and commits it.
    ///
    /// Only the batch loop calls it, so instance indexes of this replica are
    /// allocated one at a time.
    pub fn commit_batch(&self, batch: Vec<Proposal>) -> Result<InstanceId, ReplicaError> {
        let idx = self.space.next_idx(self.replica_id)?;
        let iid = InstanceId::from((self.replica_id, idx));

        let cmds: Vec<Command> = batch.iter().map(|p| p.cmd).collect();
        let clients: Vec<ClientProposal> = batch.into_iter().map(|p| p.client).collect();

        let (seq, deps) = self.local_attrs(&cmds)?;

        let mut inst = Instance::of(iid, &cmds, seq, &deps);
        let answer_now = if self.dreply {
            inst.pending = Some(clients);
            vec![]
        } else {
            clients
        };

        self.space.insert(inst)?;
        self.space.commit(iid, seq, &deps)?;
        self.committed.notify_one();

        for c in answer_now.iter() {
            c.send_reply(NIL, &self.logger);
        }

        debug!(self.logger, "committed";
               "iid" => %iid,
               "seq" => seq,
               "deps" => ?deps,
               "n_cmds" => cmds.len());
        Ok(iid)
    }

    /// batch_loop takes every queued proposal, up to `max_batch` at a time, into
    /// a new instance. It returns when `signal` fires.
    pub async fn batch_loop<F>(self: Arc<Self>, mut rx: UnboundedReceiver<Proposal>, signal: F)
    where
        F: Future + Send,
    {
        // impl Unpin
        let mut sig = signal.boxed();

        loop {
            let first = tokio::select! {
                _v = (&mut sig) => {
                    break;
                },
                p = rx.recv() => p,
            };

            let first = match first {
                Some(p) => p,
                None => break,
            };

            let mut batch = vec![first];
            while batch.len() < self.max_batch {
                match rx.try_recv() {
                    Ok(p) => batch.push(p),
                    Err(_) => break,
                }
            }

            if let Err(e) = self.commit_batch(batch) {
                error!(self.logger, "commit batch"; "error" => %e);
            }
        }

        info!(self.logger, "batch loop stopped");
    }

    /// execute_ready executes, for every replica, the committed instances right
    /// above the execution watermark. It returns whether any watermark moved.
    pub async fn execute_ready(&self) -> Result<bool, ReplicaError> {
        let mut progressed = false;

        for q in 0..self.space.n_replicas() {
            let rid = q as ReplicaId;
            let from = self.space.exec_up_to(rid)?;
            let to = self.space.max_idx(rid)?;

            for idx in from + 1..=to {
                let done = self.executor.execute_command((rid, idx).into()).await?;
                if !done {
                    break;
                }
            }

            if self.space.exec_up_to(rid)? > from {
                progressed = true;
            }
        }

        Ok(progressed)
    }

    /// exec_loop keeps executing committed instances. When nothing can be
    /// executed it sleeps for `exec_interval` or until an instance is committed.
    pub async fn exec_loop<F>(self: Arc<Self>, signal: F)
    where
        F: Future + Send,
    {
        let mut sig = signal.boxed();

        loop {
            let rst = tokio::select! {
                _v = (&mut sig) => {
                    break;
                },
                rst = self.execute_ready() => rst,
            };

            let progressed = match rst {
                Ok(p) => p,
                Err(e) => {
                    error!(self.logger, "execute"; "error" => %e);
                    false
                }
            };
            if progressed {
                continue;
            }

            tokio::select! {
                _v = (&mut sig) => {
                    break;
                },
                _ = self.committed.notified() => {},
                _ = tokio::time::sleep(self.exec_interval) => {},
            }
        }

        info!(self.logger, "exec loop stopped");
    }
}
