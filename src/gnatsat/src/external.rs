/***********************************************************************************[external.rs]
Copyright (c) 2021-2024, Ilona Prater

Permission is hereby granted, free of charge, to any person obtaining a copy of this software and
associated documentation files (the "Software"), to deal in the Software without restriction,
including without limitation the rights to use, copy, modify, merge, publish, distribute,
sublicense, and/or sell copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all copies or
substantial portions of the Software.

THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING BUT
NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT
OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.
**************************************************************************************************/

//! The external layer: translates between user visible literals (non-zero
//! `i32`) and the compacted internal variable space, owns the extension
//! stack, the frozen reference counts, assumption storage and the failed
//! set, and drives compaction and clause restoring for incremental use.

use crate::callbacks::{ClauseIterator, LearnSource, Learner, Terminator, WitnessIterator};
use crate::extend::ExtensionStack;
use crate::internal::{CompactEvent, Handles, Internal};
use crate::types::{lbool, Lit, Var};
use std::mem;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// State of an external variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EVar {
    /// Never referenced.
    Unused,
    /// Backed by an internal variable.
    Mapped(Var),
    /// Root-fixed and compacted away; the value of the positive literal.
    Fixed(lbool),
    /// Eliminated or substituted and compacted away; recovered through the
    /// extension stack, restored on reuse.
    Gone,
}

pub(crate) struct External {
    pub internal: Internal,

    /// Indexed by external variable, slot 0 unused.
    estate: Vec<EVar>,
    /// Frozen reference counts, indexed by external variable.
    frozen: Vec<u32>,
    /// Highest external variable referenced so far.
    pub max_var: i32,

    pub extend: ExtensionStack,

    /// Assumptions for the next solve, external encoding, in order.
    pub assumptions: Vec<i32>,
    /// Failed assumptions of the last unsatisfiable solve.
    failed: Vec<i32>,

    /// Model in external encoding after reconstruction, indexed by variable.
    vals: Vec<lbool>,

    pub terminator: Option<Box<dyn Terminator>>,
    pub learner: Option<Box<dyn Learner>>,
    pub source: Option<Box<dyn LearnSource>>,

    /// Clause currently being built through `add`.
    pub clause_buf: Vec<i32>,

    /// Irredundant clauses accepted so far (for reporting).
    pub num_original: u64,
}

impl External {
    pub fn new() -> Self {
        let flag = Arc::new(AtomicBool::new(false));
        External {
            internal: Internal::new(flag),
            estate: vec![EVar::Unused],
            frozen: vec![0],
            max_var: 0,
            extend: ExtensionStack::new(),
            assumptions: vec![],
            failed: vec![],
            vals: vec![],
            terminator: None,
            learner: None,
            source: None,
            clause_buf: vec![],
            num_original: 0,
        }
    }

    fn grow_to(&mut self, evar: i32) {
        debug_assert!(evar > 0);
        if evar > self.max_var {
            self.max_var = evar;
        }
        let idx = evar as usize;
        if idx >= self.estate.len() {
            self.estate.resize(idx + 1, EVar::Unused);
            self.frozen.resize(idx + 1, 0);
        }
    }

    /// Internal literal for an external literal, creating or restoring the
    /// variable if necessary.
    pub fn map_lit(&mut self, elit: i32) -> Lit {
        debug_assert!(elit != 0 && elit != i32::MIN);
        let evar = elit.abs();
        self.grow_to(evar);
        let v = match self.estate[evar as usize] {
            EVar::Mapped(v) => {
                if self.internal.flags[v].active() {
                    // a live variable may still be a witness on the
                    // extension stack (blocked clauses); reusing it makes
                    // those entries part of the formula again
                    if self.extend.is_witness(evar) {
                        self.restore_clauses_of(evar);
                    }
                    v
                } else {
                    // eliminated or substituted, but not yet compacted away
                    self.internal.reactivate(v);
                    self.restore_clauses_of(evar);
                    v
                }
            }
            EVar::Unused => {
                let v = self.internal.new_var(evar);
                self.estate[evar as usize] = EVar::Mapped(v);
                if self.frozen[evar as usize] > 0 {
                    self.internal.set_frozen(v, true);
                }
                v
            }
            EVar::Fixed(val) => {
                let v = self.internal.new_var(evar);
                self.estate[evar as usize] = EVar::Mapped(v);
                self.internal.force_root_value(v, val);
                v
            }
            EVar::Gone => {
                let v = self.internal.new_var(evar);
                self.estate[evar as usize] = EVar::Mapped(v);
                self.restore_clauses_of(evar);
                v
            }
        };
        if elit > 0 {
            v.pos_lit()
        } else {
            v.neg_lit()
        }
    }

    /// Peek without creating: the internal literal if currently mapped.
    fn peek_lit(&self, elit: i32) -> Option<Lit> {
        let evar = elit.abs() as usize;
        match self.estate.get(evar) {
            Some(&EVar::Mapped(v)) => Some(if elit > 0 { v.pos_lit() } else { v.neg_lit() }),
            _ => None,
        }
    }

    /// Move clauses whose witness mentions `evar` from the extension stack
    /// back into the solver. Referenced variables that are themselves gone
    /// get restored transitively through `map_lit`.
    fn restore_clauses_of(&mut self, evar: i32) {
        let old = mem::replace(&mut self.extend, ExtensionStack::new());
        let mut back: Vec<Vec<i32>> = vec![];
        for (witness, clause) in old.iter_forward() {
            if witness.iter().any(|l| l.abs() == evar) {
                back.push(clause.to_vec());
            } else {
                self.extend.push(witness, clause);
            }
        }
        for clause in back {
            self.internal.stats.restored += 1;
            let mut lits: Vec<Lit> = Vec::with_capacity(clause.len());
            for &e in &clause {
                lits.push(self.map_lit(e));
            }
            // restored clauses were deleted from the proof, certify them anew
            if !self.internal.add_derived(&mut lits, false) {
                return;
            }
        }
        self.internal.propagate_toplevel();
    }

    /*================================================================== add */

    /// One literal of clause input; zero finalises the clause.
    pub fn add(&mut self, elit: i32) {
        if elit != 0 {
            self.clause_buf.push(elit);
            return;
        }
        let buf = mem::replace(&mut self.clause_buf, vec![]);
        let mut lits: Vec<Lit> = Vec::with_capacity(buf.len());
        for &e in &buf {
            lits.push(self.map_lit(e));
        }
        self.num_original += 1;
        self.internal.add_input_clause(&mut lits);
        self.internal.propagate_toplevel();
        self.clause_buf = buf;
        self.clause_buf.clear();
    }

    pub fn assume(&mut self, elit: i32) {
        self.map_lit(elit); // make sure the variable exists and is live
        self.assumptions.push(elit);
    }

    pub fn reset_assumptions(&mut self) {
        self.assumptions.clear();
        self.failed.clear();
        self.internal.conflict.clear();
    }

    pub fn reserve(&mut self, min_max_var: i32) {
        for evar in 1..=min_max_var {
            self.map_lit(evar);
        }
    }

    /*================================================================ solve */

    /// Compact the internal variable range when enough of it became unused.
    fn consider_compact(&mut self) {
        if !self.internal.opts.compact || !self.internal.ok {
            return;
        }
        if self.internal.inactive_fraction() < self.internal.opts.compactlim {
            return;
        }
        if !self.internal.propagate_toplevel() {
            return;
        }
        self.internal.simplify_db();
        if !self.internal.ok {
            return;
        }
        let events = self.internal.compact();
        for (evar, event) in events {
            let idx = evar as usize;
            debug_assert!(idx < self.estate.len());
            self.estate[idx] = match event {
                CompactEvent::Mapped(v) => EVar::Mapped(v),
                CompactEvent::Fixed(val) => EVar::Fixed(val),
                CompactEvent::Gone => EVar::Gone,
            };
        }
    }

    /// Solve under the stored assumptions. Returns 10, 20 or 0 and clears
    /// the assumptions, like `solve`, `simplify` and `lookahead` do.
    pub fn solve(&mut self) -> i32 {
        self.failed.clear();
        self.vals.clear();

        self.consider_compact();

        // Install assumptions. An assumption whose variable was fixed and
        // compacted away is checked against its recorded value right here.
        self.internal.assumptions.clear();
        let assumptions = self.assumptions.clone();
        let mut precheck_failed: Option<i32> = None;
        for &elit in &assumptions {
            match self.estate[elit.abs() as usize] {
                EVar::Mapped(_) => {
                    let il = self.map_lit(elit);
                    self.internal.assumptions.push(il);
                }
                EVar::Fixed(val) => {
                    let value = val ^ (elit < 0);
                    if value == lbool::FALSE {
                        precheck_failed = Some(elit);
                        break;
                    }
                }
                EVar::Unused | EVar::Gone => {
                    // `assume` mapped it; only compact can unmap, and it
                    // leaves Fixed or Gone. Gone cannot happen for assumed
                    // variables, they are pinned during solving, but a stale
                    // assumption from a previous call could see it: restore.
                    let il = self.map_lit(elit);
                    self.internal.assumptions.push(il);
                }
            }
        }

        let status = if let Some(failed_lit) = precheck_failed {
            self.failed.push(failed_lit);
            20
        } else {
            let mut extend = mem::replace(&mut self.extend, ExtensionStack::new());
            let res = {
                let internal = &mut self.internal;
                let mut handles = Handles {
                    terminator: self
                        .terminator
                        .as_mut()
                        .map(|b| &mut **b as &mut dyn Terminator),
                    learner: self.learner.as_mut().map(|b| &mut **b as &mut dyn Learner),
                    source: self.source.as_mut().map(|b| &mut **b as &mut dyn LearnSource),
                };
                internal.solve(&mut extend, &mut handles)
            };
            self.extend = extend;

            if res == lbool::TRUE {
                self.build_model();
                10
            } else if res == lbool::FALSE {
                self.build_failed_set(&assumptions);
                20
            } else {
                0
            }
        };

        self.assumptions.clear();
        self.internal.assumptions.clear();
        self.internal.lim = Default::default();
        status
    }

    /// Preprocess only, same result and reset conventions as `solve`.
    pub fn simplify(&mut self, rounds: i64) -> i32 {
        self.failed.clear();
        self.vals.clear();
        self.consider_compact();
        self.internal.assumptions.clear();

        let mut extend = mem::replace(&mut self.extend, ExtensionStack::new());
        let res = {
            let internal = &mut self.internal;
            let mut handles = Handles {
                terminator: self
                    .terminator
                    .as_mut()
                    .map(|b| &mut **b as &mut dyn Terminator),
                learner: self.learner.as_mut().map(|b| &mut **b as &mut dyn Learner),
                source: self.source.as_mut().map(|b| &mut **b as &mut dyn LearnSource),
            };
            internal.preprocess_only(&mut extend, &mut handles, rounds)
        };
        self.extend = extend;

        let status = if res == lbool::TRUE {
            self.build_model();
            10
        } else if res == lbool::FALSE {
            20
        } else {
            0
        };
        self.assumptions.clear();
        self.internal.lim = Default::default();
        status
    }

    fn build_model(&mut self) {
        self.vals.clear();
        self.vals
            .resize(self.max_var as usize + 1, lbool::FALSE);
        for evar in 1..=self.max_var {
            let value = match self.estate[evar as usize] {
                EVar::Mapped(v) => {
                    let m = self.internal.model_value(v);
                    if m == lbool::UNDEF {
                        lbool::FALSE
                    } else {
                        m
                    }
                }
                EVar::Fixed(val) => val,
                EVar::Unused | EVar::Gone => lbool::FALSE,
            };
            self.vals[evar as usize] = value;
        }
        // replay the reconstruction stack newest first
        self.extend.extend_model(&mut self.vals);
    }

    fn build_failed_set(&mut self, assumptions: &[i32]) {
        self.failed.clear();
        for &elit in assumptions {
            if let Some(il) = self.peek_lit(elit) {
                if self.internal.conflict.has(!il) {
                    self.failed.push(elit);
                }
            }
        }
    }

    /*=============================================================== queries */

    /// Model value of `elit`: positive means true. Only meaningful right
    /// after a satisfiable solve.
    pub fn val(&self, elit: i32) -> i32 {
        let evar = elit.abs();
        let value = self
            .vals
            .get(evar as usize)
            .copied()
            .unwrap_or(lbool::FALSE);
        let value = value ^ (elit < 0);
        if value == lbool::TRUE {
            elit
        } else {
            -elit
        }
    }

    pub fn failed(&self, elit: i32) -> bool {
        self.failed.contains(&elit)
    }

    /// Root level implication status of `elit`: 1 implied, -1 negation
    /// implied, 0 open.
    pub fn fixed(&self, elit: i32) -> i32 {
        let evar = elit.abs() as usize;
        let value = match self.estate.get(evar) {
            Some(&EVar::Mapped(v)) => {
                let l = if elit > 0 { v.pos_lit() } else { v.neg_lit() };
                self.internal.fixed_lit(l)
            }
            Some(&EVar::Fixed(val)) => val ^ (elit < 0),
            _ => lbool::UNDEF,
        };
        if value == lbool::TRUE {
            1
        } else if value == lbool::FALSE {
            -1
        } else {
            0
        }
    }

    /*======================================================== freeze / phase */

    pub fn frozen(&self, elit: i32) -> bool {
        let evar = elit.abs() as usize;
        self.frozen.get(evar).map_or(false, |&c| c > 0)
    }

    pub fn freeze(&mut self, elit: i32) {
        let evar = elit.abs();
        self.grow_to(evar);
        self.frozen[evar as usize] += 1;
        if let Some(il) = self.peek_lit(elit) {
            self.internal.set_frozen(il.var(), true);
        }
    }

    pub fn melt(&mut self, elit: i32) {
        let evar = elit.abs() as usize;
        debug_assert!(self.frozen[evar] > 0, "melt without matching freeze");
        self.frozen[evar] -= 1;
        if self.frozen[evar] == 0 {
            if let Some(il) = self.peek_lit(elit) {
                self.internal.set_frozen(il.var(), false);
            }
        }
    }

    pub fn phase(&mut self, elit: i32) {
        let il = self.map_lit(elit);
        self.internal
            .set_forced_phase(il.var(), lbool::new(il.sign()));
    }

    pub fn unphase(&mut self, elit: i32) {
        let il = self.map_lit(elit);
        self.internal.set_forced_phase(il.var(), lbool::UNDEF);
    }

    /*============================================================ traversal */

    /// Visit the active irredundant clauses: root-satisfied clauses are
    /// omitted, root-falsified literals elided, frozen derived units
    /// included. An inconsistent solver traverses only the empty clause.
    pub fn traverse_clauses(&self, it: &mut dyn ClauseIterator) -> bool {
        if !self.internal.ok {
            return it.clause(&[]);
        }
        let mut ext: Vec<i32> = vec![];
        for &cr in &self.internal.clauses {
            let c = self.internal.ca.get_ref(cr);
            if c.garbage() || self.internal_root_satisfied(cr) {
                continue;
            }
            ext.clear();
            for &l in c.lits() {
                if self.internal.fixed_lit(l) == lbool::FALSE {
                    continue;
                }
                ext.push(self.internal.externalize(l));
            }
            if !it.clause(&ext) {
                return false;
            }
        }
        // frozen root units participate in the logical content
        for &l in self.internal.vars.root_units() {
            let e = self.internal.externalize(l);
            if self.frozen(e) {
                if !it.clause(&[e]) {
                    return false;
                }
            }
        }
        true
    }

    fn internal_root_satisfied(&self, cr: crate::arena::CRef) -> bool {
        self.internal
            .ca
            .get_ref(cr)
            .iter()
            .any(|&l| self.internal.fixed_lit(l) == lbool::TRUE)
    }

    pub fn traverse_witnesses_forward(&self, it: &mut dyn WitnessIterator) -> bool {
        for (witness, clause) in self.extend.iter_forward() {
            if !it.witness(clause, witness) {
                return false;
            }
        }
        true
    }

    pub fn traverse_witnesses_backward(&self, it: &mut dyn WitnessIterator) -> bool {
        for (witness, clause) in self.extend.iter_backward() {
            if !it.witness(clause, witness) {
                return false;
            }
        }
        true
    }

    /// Root units in external encoding, for `write_dimacs`.
    pub fn root_units_external(&self) -> Vec<i32> {
        if !self.internal.ok {
            return vec![];
        }
        self.internal
            .vars
            .root_units()
            .iter()
            .map(|&l| self.internal.externalize(l))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_add_and_solve_roundtrip() {
        let mut e = External::new();
        for &l in &[-1, 2, 0, 1, 2, 0, -1, -2, 0] {
            e.add(l);
        }
        assert_eq!(e.solve(), 10);
        assert_eq!(e.val(1), -1);
        assert_eq!(e.val(2), 2);
    }

    #[test]
    fn test_failed_assumption() {
        let mut e = External::new();
        for &l in &[-1, 2, 0, 1, 2, 0, -1, -2, 0] {
            e.add(l);
        }
        e.assume(1);
        assert_eq!(e.solve(), 20);
        assert!(e.failed(1));
        assert!(!e.failed(2));
        // assumptions are cleared on return
        assert_eq!(e.solve(), 10);
    }

    #[test]
    fn test_fixed_query() {
        let mut e = External::new();
        for &l in &[1, 0, -1, 2, 0] {
            e.add(l);
        }
        assert_eq!(e.fixed(1), 1);
        assert_eq!(e.fixed(-1), -1);
        assert_eq!(e.fixed(3), 0);
    }

    #[test]
    fn test_freeze_melt_refcounts() {
        let mut e = External::new();
        e.freeze(3);
        e.freeze(3);
        assert!(e.frozen(3));
        e.melt(3);
        assert!(e.frozen(3));
        e.melt(3);
        assert!(!e.frozen(3));
    }

    #[test]
    fn test_sparse_external_names() {
        let mut e = External::new();
        for &l in &[100, 2000, 0, -100, 2000, 0] {
            e.add(l);
        }
        assert_eq!(e.solve(), 10);
        assert_eq!(e.val(2000), 2000);
    }
}
