use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use slog::{o, Discard, Logger};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::task::yield_now;

#[cfg(test)]
use pretty_assertions::assert_eq;

use crate::command::*;
use crate::exec::*;
use crate::instance::*;
use crate::reply::*;
use crate::workload::*;

fn new_executor(n_replicas: usize, workload: Workload) -> Arc<Executor> {
    let logger = Logger::root(Discard, o!());
    let space = Arc::new(InstanceSpace::new(n_replicas));
    Arc::new(Executor::new(space, workload, &logger))
}

/// with_clients makes `inst` wait for replies, one command id per command.
fn with_clients(mut inst: Instance, tx: &ReplyTx, command_ids: &[i32]) -> Instance {
    inst.pending = Some(
        command_ids
            .iter()
            .map(|id| ClientProposal::new(*id, tx.clone()))
            .collect(),
    );
    inst
}

fn drain(rx: &mut UnboundedReceiver<ProposeReply>) -> Vec<ProposeReply> {
    let mut rst = vec![];
    while let Ok(r) = rx.try_recv() {
        rst.push(r);
    }
    rst
}

fn replied(rx: &mut UnboundedReceiver<ProposeReply>) -> Vec<(i32, Value)> {
    drain(rx).iter().map(|r| (r.command_id, r.value)).collect()
}

fn status(e: &Executor, iid: (i64, i64)) -> InstanceStatus {
    e.space().status(iid.into()).unwrap()
}

#[tokio::test]
async fn test_execute_not_ready() {
    let e = new_executor(2, Workload::Generic);
    let sp = e.space();

    // not found
    assert_eq!(Ok(false), e.execute_command((0, 0).into()).await);

    sp.insert(inst!((0, 0), [(Put, 1, 1)], seq: 1, deps: [NO_DEP, NO_DEP]))
        .unwrap();
    assert_eq!(Ok(false), e.execute_command((0, 0).into()).await);

    sp.accept((0, 0).into(), 1, &[NO_DEP, NO_DEP]).unwrap();
    assert_eq!(Ok(false), e.execute_command((0, 0).into()).await);

    assert_eq!(State::new(), e.state());

    sp.commit((0, 0).into(), 1, &[NO_DEP, NO_DEP]).unwrap();
    assert_eq!(Ok(true), e.execute_command((0, 0).into()).await);
    assert_eq!(1, e.state().get(1));

    // replica out of range is a contract violation, not a scheduling signal.
    assert_eq!(
        Err(ExecError::Space(SpaceError::ReplicaNotFound(5))),
        e.execute_command((5, 0).into()).await
    );
}

#[tokio::test]
async fn test_execute_idempotent() {
    let e = new_executor(1, Workload::Inventory);
    let (tx, mut rx) = unbounded_channel();

    let inst = inst!((0, 0), [(Increment, 10, 5)], seq: 1, deps: [NO_DEP], status: Committed);
    e.space().insert(with_clients(inst, &tx, &[100])).unwrap();

    assert_eq!(Ok(true), e.execute_command((0, 0).into()).await);
    assert_eq!(vec![(100, 5)], replied(&mut rx));
    assert_eq!(5, e.state().get(10));

    let got = e.space().get((0, 0).into()).unwrap().unwrap();
    assert!(got.pending.is_none());

    assert_eq!(Ok(true), e.execute_command((0, 0).into()).await);
    assert_eq!(Vec::<(i32, Value)>::new(), replied(&mut rx));
    assert_eq!(5, e.state().get(10));
    assert_eq!(0, e.space().exec_up_to(0).unwrap());
}

/// Three mutually dependent puts on the same key, one per replica.
fn scenario_a(seqs: [Seq; 3]) -> Vec<Instance> {
    vec![
        inst!((0, 0), [(Put, 42, 0)], seq: seqs[0], deps: [NO_DEP, 0, 0], status: Committed),
        inst!((1, 0), [(Put, 42, 1)], seq: seqs[1], deps: [0, NO_DEP, 0], status: Committed),
        inst!((2, 0), [(Put, 42, 2)], seq: seqs[2], deps: [0, 0, NO_DEP], status: Committed),
    ]
}

#[tokio::test]
async fn test_execute_cycle_in_seq_order() {
    for root in 0..3 {
        let e = new_executor(3, Workload::Generic);
        let (tx, mut rx) = unbounded_channel();

        for (i, inst) in scenario_a([10, 20, 30]).into_iter().enumerate() {
            e.space().insert(with_clients(inst, &tx, &[i as i32])).unwrap();
        }

        assert_eq!(Ok(true), e.execute_command((root, 0).into()).await);

        for rid in 0..3 {
            assert_eq!(InstanceStatus::Executed, status(&e, (rid, 0)));
            assert_eq!(0, e.space().exec_up_to(rid).unwrap());
        }

        assert_eq!(vec![(0, 0), (1, 1), (2, 2)], replied(&mut rx), "root: {}", root);
        assert_eq!(2, e.state().get(42));
    }

    // seq, not replica id, decides the order inside a component
    let e = new_executor(3, Workload::Generic);
    let (tx, mut rx) = unbounded_channel();
    for (i, inst) in scenario_a([30, 10, 20]).into_iter().enumerate() {
        e.space().insert(with_clients(inst, &tx, &[i as i32])).unwrap();
    }

    assert_eq!(Ok(true), e.execute_command((1, 0).into()).await);
    assert_eq!(vec![(1, 1), (2, 2), (0, 0)], replied(&mut rx));
    assert_eq!(0, e.state().get(42));
}

#[tokio::test]
async fn test_execute_equal_seq_ordered_by_instance_id() {
    let e = new_executor(3, Workload::Generic);
    let (tx, mut rx) = unbounded_channel();
    for (i, inst) in scenario_a([5, 5, 5]).into_iter().enumerate() {
        e.space().insert(with_clients(inst, &tx, &[i as i32])).unwrap();
    }

    assert_eq!(Ok(true), e.execute_command((2, 0).into()).await);
    assert_eq!(vec![(0, 0), (1, 1), (2, 2)], replied(&mut rx));
}

#[tokio::test]
async fn test_execute_chain() {
    // (0, 2) → (0, 1) → (0, 0) → (1, 0)
    let e = new_executor(2, Workload::Generic);
    let (tx, mut rx) = unbounded_channel();
    let insts = vec![
        inst!((1, 0), [(Put, 1, 10)], seq: 1, deps: [NO_DEP, NO_DEP], status: Committed),
        inst!((0, 0), [(Put, 1, 20)], seq: 2, deps: [NO_DEP, 0], status: Committed),
        inst!((0, 1), [(Get, 1)], seq: 3, deps: [0, 0], status: Committed),
        inst!((0, 2), [(Put, 1, 30), (Get, 1)], seq: 4, deps: [1, 0], status: Committed),
    ];
    let ids = [&[1][..], &[2][..], &[3][..], &[4, 5][..]];
    for (inst, cids) in insts.into_iter().zip(ids.iter()) {
        e.space().insert(with_clients(inst, &tx, cids)).unwrap();
    }

    assert_eq!(Ok(true), e.execute_command((0, 2).into()).await);

    // every instance is its own component, executed dependencies first.
    assert_eq!(
        vec![(1, 10), (2, 20), (3, 20), (4, 30), (5, 30)],
        replied(&mut rx)
    );
    assert_eq!(2, e.space().exec_up_to(0).unwrap());
    assert_eq!(0, e.space().exec_up_to(1).unwrap());
}

#[tokio::test]
async fn test_execute_skips_non_conflicting_deps() {
    let e = new_executor(2, Workload::Generic);
    e.space()
        .insert(inst!((0, 0), [(Put, 1, 1)], seq: 1, deps: [NO_DEP, 0], status: Committed))
        .unwrap();
    e.space()
        .insert(inst!((1, 0), [(Put, 2, 2)], seq: 2, deps: [0, NO_DEP], status: Committed))
        .unwrap();

    assert_eq!(Ok(true), e.execute_command((0, 0).into()).await);

    assert_eq!(InstanceStatus::Executed, status(&e, (0, 0)));
    assert_eq!(InstanceStatus::Committed, status(&e, (1, 0)));
    assert_eq!(1, e.state().get(1));
    assert_eq!(NIL, e.state().get(2));

    assert_eq!(Ok(true), e.execute_command((1, 0).into()).await);
    assert_eq!(2, e.state().get(2));
}

#[tokio::test]
async fn test_execute_skips_executed_deps() {
    let e = new_executor(2, Workload::Generic);
    let sp = e.space();
    sp.insert(inst!((1, 0), [(Put, 1, 1)], seq: 1, deps: [NO_DEP, NO_DEP], status: Committed))
        .unwrap();
    sp.insert(inst!((1, 1), [(Put, 1, 2)], seq: 2, deps: [NO_DEP, 0], status: Committed))
        .unwrap();
    assert_eq!(Ok(true), e.execute_command((1, 1).into()).await);
    assert_eq!(1, sp.exec_up_to(1).unwrap());

    // depends on executed instances only
    sp.insert(inst!((0, 0), [(Put, 1, 3)], seq: 3, deps: [NO_DEP, 1], status: Committed))
        .unwrap();
    assert_eq!(Ok(true), e.execute_command((0, 0).into()).await);
    assert_eq!(3, e.state().get(1));
}

#[tokio::test]
async fn test_execute_waits_for_dep_to_commit() {
    let e = new_executor(2, Workload::Generic);
    let sp = e.space().clone();

    sp.insert(inst!((0, 0), [(Put, 1, 1)], seq: 2, deps: [NO_DEP, 0], status: Committed))
        .unwrap();
    sp.insert(inst!((1, 0), [(Put, 1, 2)], seq: 1, deps: [NO_DEP, NO_DEP]))
        .unwrap();

    let e2 = e.clone();
    let h = tokio::spawn(async move { e2.execute_command((0, 0).into()).await });

    for _ in 0..10 {
        yield_now().await;
    }
    assert_eq!(InstanceStatus::Committed, status(&e, (0, 0)));
    assert_eq!(NIL, e.state().get(1));

    // not ready calls do not queue up behind the blocked run.
    assert_eq!(Ok(false), e.execute_command((1, 0).into()).await);

    sp.accept((1, 0).into(), 1, &[NO_DEP, NO_DEP]).unwrap();
    for _ in 0..10 {
        yield_now().await;
    }
    assert_eq!(InstanceStatus::Committed, status(&e, (0, 0)));

    sp.commit((1, 0).into(), 1, &[NO_DEP, NO_DEP]).unwrap();

    assert_eq!(Ok(true), h.await.unwrap());
    assert_eq!(InstanceStatus::Executed, status(&e, (1, 0)));
    assert_eq!(InstanceStatus::Executed, status(&e, (0, 0)));
    assert_eq!(1, e.state().get(1));
}

#[tokio::test]
async fn test_execute_waits_for_dep_to_arrive() {
    let e = new_executor(2, Workload::Generic);
    let sp = e.space().clone();

    sp.insert(inst!((0, 0), [(Put, 1, 1)], seq: 1, deps: [NO_DEP, 1], status: Committed))
        .unwrap();

    let e2 = e.clone();
    let h = tokio::spawn(async move { e2.execute_command((0, 0).into()).await });

    for _ in 0..10 {
        yield_now().await;
    }
    assert_eq!(InstanceStatus::Committed, status(&e, (0, 0)));

    // (1, 1) arrives first, then (1, 0). Both conflict and both are waited for.
    sp.insert(inst!((1, 1), [(Put, 1, 3)], seq: 1, deps: [0, 0], status: Committed))
        .unwrap();
    for _ in 0..10 {
        yield_now().await;
    }
    assert_eq!(InstanceStatus::Committed, status(&e, (0, 0)));

    sp.insert(inst!((1, 0), [(Put, 1, 2)], seq: 0, deps: [NO_DEP, NO_DEP], status: Committed))
        .unwrap();

    assert_eq!(Ok(true), h.await.unwrap());
    for iid in [(0, 0), (1, 0), (1, 1)].iter() {
        assert_eq!(InstanceStatus::Executed, status(&e, *iid));
    }

    // (1, 0) first, then the component {(0, 0), (1, 1)} in order of (seq, id)
    assert_eq!(3, e.state().get(1));
    assert_eq!(0, sp.exec_up_to(0).unwrap());
    assert_eq!(1, sp.exec_up_to(1).unwrap());
}

#[tokio::test]
async fn test_execute_same_order_on_every_replica() {
    // a ← b ⇄ c ← d ← e on key 42; f writes another key.
    let insts = vec![
        inst!((0, 0), [(Put, 42, 1)], seq: 1, deps: [NO_DEP, NO_DEP, NO_DEP], status: Committed),
        inst!((1, 0), [(Put, 42, 2)], seq: 2, deps: [0, NO_DEP, 0], status: Committed),
        inst!((2, 0), [(Put, 42, 3)], seq: 2, deps: [0, 0, NO_DEP], status: Committed),
        inst!((0, 1), [(Put, 42, 4)], seq: 3, deps: [0, 0, 0], status: Committed),
        inst!((1, 1), [(Get, 42)], seq: 4, deps: [1, 0, 0], status: Committed),
        inst!((2, 1), [(Put, 7, 5)], seq: 1, deps: [NO_DEP, NO_DEP, 0], status: Committed),
    ];

    let mut rng = StdRng::seed_from_u64(42);
    let mut states = vec![];

    for _ in 0..20 {
        let e = new_executor(3, Workload::Generic);
        let (tx, mut rx) = unbounded_channel();

        let mut order: Vec<usize> = (0..insts.len()).collect();
        order.shuffle(&mut rng);

        let mut handles = vec![];
        for i in order.iter() {
            let inst = with_clients(insts[*i].clone(), &tx, &[*i as i32]);
            let iid = inst.instance_id;
            e.space().insert(inst).unwrap();

            let e2 = e.clone();
            handles.push(tokio::spawn(async move { e2.execute_command(iid).await }));
            yield_now().await;
        }

        for h in handles {
            assert_eq!(Ok(true), h.await.unwrap());
        }

        let on_42: Vec<(i32, Value)> = replied(&mut rx)
            .into_iter()
            .filter(|(cid, _)| *cid != 5)
            .collect();
        assert_eq!(vec![(0, 1), (1, 2), (2, 3), (3, 4), (4, 4)], on_42, "order: {:?}", order);

        states.push(e.state());
    }

    for st in states.iter() {
        assert_eq!(&states[0], st);
    }
    assert_eq!(4, states[0].get(42));
    assert_eq!(5, states[0].get(7));
}

#[tokio::test]
async fn test_execute_inventory_increments_commute() {
    // two concurrent increments, each depending on the other, and a read
    // ordered after both.
    for root in [(0, 0), (1, 0), (2, 0)].iter() {
        let e = new_executor(3, Workload::Inventory);
        let (tx, mut rx) = unbounded_channel();
        let sp = e.space();

        sp.insert(inst!((0, 0), [(Increment, 10, 5)], seq: 1, deps: [NO_DEP, 0, NO_DEP], status: Committed))
            .unwrap();
        sp.insert(inst!((1, 0), [(Increment, 10, 5)], seq: 1, deps: [0, NO_DEP, NO_DEP], status: Committed))
            .unwrap();
        let read = inst!((2, 0), [(Read, 10)], seq: 2, deps: [0, 0, NO_DEP], status: Committed);
        sp.insert(with_clients(read, &tx, &[7])).unwrap();

        assert_eq!(Ok(true), e.execute_command((*root).into()).await);
        assert_eq!(Ok(true), e.execute_command((2, 0).into()).await);

        assert_eq!(10, e.state().get(10));
        assert_eq!(vec![(7, 10)], replied(&mut rx));
    }
}

#[tokio::test]
async fn test_execute_social_likes() {
    let e = new_executor(2, Workload::Social);
    let (tx, mut rx) = unbounded_channel();
    let sp = e.space();

    let insts = vec![
        inst!((0, 0), [(Post, 7, 1)], seq: 1, deps: [NO_DEP, NO_DEP], status: Committed),
        inst!((1, 0), [(Like, 7, 1)], seq: 2, deps: [0, NO_DEP], status: Committed),
        inst!((1, 1), [(Like, 7, 2)], seq: 2, deps: [0, 0], status: Committed),
        inst!((0, 1), [(Read, 7)], seq: 3, deps: [0, 1], status: Committed),
    ];
    for (i, inst) in insts.into_iter().enumerate() {
        sp.insert(with_clients(inst, &tx, &[i as i32])).unwrap();
    }

    assert_eq!(Ok(true), e.execute_command((0, 1).into()).await);

    let replies = replied(&mut rx);
    assert_eq!((0, 1), replies[0]);
    assert_eq!(Some(&(3, 2)), replies.last());
    assert_eq!(2, e.state().like_count(7));
}

#[tokio::test]
async fn test_execute_without_dreply() {
    let logger = Logger::root(Discard, o!());
    let space = Arc::new(InstanceSpace::new(1));
    let e = Executor::new(space, Workload::Generic, &logger).with_dreply(false);
    let (tx, mut rx) = unbounded_channel();

    let inst = inst!((0, 0), [(Put, 1, 1)], seq: 1, deps: [NO_DEP], status: Committed);
    e.space().insert(with_clients(inst, &tx, &[1])).unwrap();

    assert_eq!(Ok(true), e.execute_command((0, 0).into()).await);
    assert_eq!(1, e.state().get(1));
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_execute_reply_to_gone_client() {
    let e = new_executor(1, Workload::Generic);
    let (tx, rx) = unbounded_channel();
    drop(rx);

    let inst = inst!((0, 0), [(Put, 1, 1)], seq: 1, deps: [NO_DEP], status: Committed);
    e.space().insert(with_clients(inst, &tx, &[1])).unwrap();

    assert_eq!(Ok(true), e.execute_command((0, 0).into()).await);
    assert_eq!(1, e.state().get(1));
}

#[tokio::test]
async fn test_execute_reply_fields() {
    let e = new_executor(1, Workload::Generic);
    let (tx, mut rx) = unbounded_channel();

    let inst = inst!((0, 0), [(Put, 3, 33), (Get, 3)], seq: 1, deps: [NO_DEP], status: Committed);
    e.space().insert(with_clients(inst, &tx, &[8, 9])).unwrap();

    assert_eq!(Ok(true), e.execute_command((0, 0).into()).await);
    let replies = drain(&mut rx);
    assert_eq!(2, replies.len());
    for (r, (cid, val)) in replies.iter().zip([(8, 33), (9, 33)].iter()) {
        assert!(r.ok);
        assert_eq!(*cid, r.command_id);
        assert_eq!(*val, r.value);
        assert!(r.timestamp >= 0);
    }
}
