use std::collections::{HashMap, HashSet};

use crate::instance::InstanceId;

/// Visit is the Tarjan bookkeeping of one instance. An order of 0 means unvisited.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Visit {
    pub(crate) order: u64,
    pub(crate) low: u64,
}

/// Tarjan holds the scratch state of one discovery run: visit orders,
/// low-links and the discovery stack.
///
/// It is shared by every frame of a run and must be `reset` when the run ends,
/// so that all instances read as unvisited at the start of the next one.
#[derive(Debug, Default)]
pub(crate) struct Tarjan {
    next_order: u64,
    visits: HashMap<InstanceId, Visit>,
    stack: Vec<InstanceId>,
    on_stack: HashSet<InstanceId>,
}

impl Tarjan {
    /// visit assigns the next order number to `iid` and pushes it onto the
    /// discovery stack. It returns the stack depth before the push.
    pub(crate) fn visit(&mut self, iid: InstanceId) -> usize {
        self.next_order += 1;
        let v = Visit {
            order: self.next_order,
            low: self.next_order,
        };
        self.visits.insert(iid, v);

        let base = self.stack.len();
        self.stack.push(iid);
        self.on_stack.insert(iid);
        base
    }

    pub(crate) fn get(&self, iid: InstanceId) -> Visit {
        self.visits.get(&iid).copied().unwrap_or_default()
    }

    pub(crate) fn is_visited(&self, iid: InstanceId) -> bool {
        self.get(iid).order != 0
    }

    pub(crate) fn is_on_stack(&self, iid: InstanceId) -> bool {
        self.on_stack.contains(&iid)
    }

    /// lower sets the low-link of `iid` to `to` if that is lower.
    pub(crate) fn lower(&mut self, iid: InstanceId, to: u64) {
        if let Some(v) = self.visits.get_mut(&iid) {
            if to < v.low {
                v.low = to;
            }
        }
    }

    /// is_root returns true if `iid` roots a strongly connected component.
    pub(crate) fn is_root(&self, iid: InstanceId) -> bool {
        let v = self.get(iid);
        v.order != 0 && v.low == v.order
    }

    /// pop_component pops the discovery stack down to and including `root`.
    pub(crate) fn pop_component(&mut self, root: InstanceId) -> Vec<InstanceId> {
        let pos = self
            .stack
            .iter()
            .rposition(|x| *x == root)
            .unwrap_or(self.stack.len());

        let component = self.stack.split_off(pos);
        for iid in component.iter() {
            self.on_stack.remove(iid);
        }
        component
    }

    /// unwind makes every instance pushed at or above `base` unvisited again
    /// and drops it from the stack. Used to abort a discovery.
    pub(crate) fn unwind(&mut self, base: usize) {
        let base = base.min(self.stack.len());
        for iid in self.stack.drain(base..) {
            self.visits.remove(&iid);
            self.on_stack.remove(&iid);
        }
    }

    pub(crate) fn reset(&mut self) {
        self.next_order = 0;
        self.visits.clear();
        self.stack.clear();
        self.on_stack.clear();
    }

    #[cfg(test)]
    pub(crate) fn stack_len(&self) -> usize {
        self.stack.len()
    }
}
