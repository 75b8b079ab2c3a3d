//! Full occurrence lists over the irredundant clauses, rebuilt per
//! inprocessing round. Unlike the watcher lists these index every literal of
//! every clause, which is what subsumption, elimination and blocked clause
//! detection need.

use crate::arena::CRef;
use crate::internal::Internal;
use crate::types::{LMap, Lit};

#[derive(Debug)]
pub(crate) struct Occs {
    lists: LMap<Vec<CRef>>,
}

impl Occs {
    /// Build occurrence lists over the current irredundant clauses.
    pub fn build(ip: &Internal) -> Self {
        let mut lists: LMap<Vec<CRef>> = LMap::new();
        // reserve both polarities of the highest variable
        if ip.num_vars() > 0 {
            let top = Lit::new(crate::types::Var::from_idx(ip.num_vars() - 1), false);
            lists.reserve_default(top);
        }
        let mut occs = Occs { lists };
        for &cr in &ip.clauses {
            if !ip.ca.get_ref(cr).garbage() {
                occs.add_clause(ip, cr);
            }
        }
        occs
    }

    pub fn add_clause(&mut self, ip: &Internal, cr: CRef) {
        for &l in ip.ca.get_ref(cr).lits() {
            self.lists.reserve_default(l);
            self.lists[l].push(cr);
        }
    }

    /// Occurrences of `l`, possibly still containing garbage references;
    /// callers filter with `ClauseRef::garbage`.
    pub fn get(&self, l: Lit) -> &[CRef] {
        if self.lists.has(l) {
            &self.lists[l]
        } else {
            &[]
        }
    }

    pub fn count(&self, l: Lit) -> usize {
        self.get(l).len()
    }

    /// Drop stale references of `l` eagerly.
    pub fn flush(&mut self, ip: &Internal, l: Lit) {
        if self.lists.has(l) {
            let ca = &ip.ca;
            self.lists[l].retain(|&cr| !ca.get_ref(cr).garbage());
        }
    }
}
