/***********************************************************************************[internal.rs]
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

//! The internal CDCL engine.
//!
//! Operates on the compacted internal variable space: trail, watcher lists,
//! clause arena, activity heap, phase saving, conflict analysis, restarts,
//! learned clause reduction and the inprocessing scheduler. Everything the
//! user sees in external encoding is translated by the `external` layer; the
//! engine only keeps the internal-to-external name table needed to emit
//! proof lines and learned clauses in external form.

use {
    crate::arena::{CRef, ClauseArena, ClauseRef, DeletePred, OccLists, OccListsData},
    crate::callbacks::{LearnSource, Learner, Terminator},
    crate::drat::Proof,
    crate::extend::ExtensionStack,
    crate::intmap::{Comparator, Heap, HeapData},
    crate::options::Options,
    crate::types::{lbool, LSet, Lit, VMap, Var},
    std::{
        cmp, mem,
        sync::atomic::{AtomicBool, Ordering},
        sync::Arc,
    },
};

/// Per-solve callback handles, passed down from the external layer so the
/// engine never owns its callers.
pub(crate) struct Handles<'a> {
    pub terminator: Option<&'a mut dyn Terminator>,
    pub learner: Option<&'a mut dyn Learner>,
    pub source: Option<&'a mut dyn LearnSource>,
}

impl<'a> Handles<'a> {
    pub fn none() -> Self {
        Handles {
            terminator: None,
            learner: None,
            source: None,
        }
    }
}

/// Search statistics, all monotonically increasing.
#[derive(Debug, Default, Clone)]
pub struct Stats {
    pub solves: u64,
    pub conflicts: u64,
    pub decisions: u64,
    pub propagations: u64,
    pub restarts: u64,
    pub reductions: u64,
    pub compacts: u64,
    pub garbage_collections: u64,
    pub learned: u64,
    pub learned_units: u64,
    pub learned_literals: u64,
    pub minimized_literals: u64,
    pub fixed: u64,
    pub eliminated: u64,
    pub substituted: u64,
    pub restored: u64,
    pub blocked: u64,
    pub subsumed: u64,
    pub strengthened: u64,
    pub vivified: u64,
    pub probed: u64,
    pub failed_literals: u64,
    pub inprocessings: u64,
}

/// Search limits valid for a single solve call, reset afterwards.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub conflicts: i64,
    pub decisions: i64,
    pub preprocessing: i64,
    pub localsearch: i64,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            conflicts: -1,
            decisions: -1,
            preprocessing: 0,
            localsearch: 0,
        }
    }
}

/// Option values cached at the start of a solve call, so the hot loop never
/// consults the registry.
#[derive(Debug, Clone)]
pub(crate) struct SearchOpts {
    pub verbose: i32,
    pub luby: bool,
    pub lubybase: i64,
    pub restartint: i64,
    pub restartmargin: f64,
    pub reduceint: i64,
    pub reducefraction: f64,
    pub keepglue: u32,
    pub keepused: bool,
    pub ccmin: i32,
    pub minimize: bool,
    pub phasesaving: i32,
    pub initphase: bool,
    pub inprocessing: bool,
    pub inprocessint: i64,
    pub compact: bool,
    pub compactlim: f64,
    pub elim: bool,
    pub elimgrowth: i64,
    pub elimlim: i64,
    pub elimocclim: i64,
    pub elimrounds: i64,
    pub subsume: bool,
    pub subsumelim: i64,
    pub vivify: bool,
    pub vivifylim: i64,
    pub probe: bool,
    pub probelim: i64,
    pub decompose: bool,
    pub decomposelim: i64,
    pub block: bool,
    pub blocklim: i64,
}

impl SearchOpts {
    pub fn from_registry(opts: &Options) -> Self {
        SearchOpts {
            verbose: opts.get_i64("verbose") as i32,
            luby: opts.get_bool("luby"),
            lubybase: opts.get_i64("lubybase"),
            restartint: opts.get_i64("restartint"),
            restartmargin: opts.get("restartmargin"),
            reduceint: opts.get_i64("reduceint"),
            reducefraction: opts.get("reducefraction"),
            keepglue: opts.get_i64("keepglue") as u32,
            keepused: opts.get_bool("keepused"),
            ccmin: opts.get_i64("ccmin") as i32,
            minimize: opts.get_bool("minimize"),
            phasesaving: opts.get_i64("phasesaving") as i32,
            initphase: opts.get_bool("initphase"),
            inprocessing: opts.get_bool("inprocessing"),
            inprocessint: opts.get_i64("inprocessint"),
            compact: opts.get_bool("compact"),
            compactlim: opts.get("compactlim"),
            elim: opts.get_bool("elim"),
            elimgrowth: opts.get_i64("elimgrowth"),
            elimlim: opts.get_i64("elimlim"),
            elimocclim: opts.get_i64("elimocclim"),
            elimrounds: opts.get_i64("elimrounds"),
            subsume: opts.get_bool("subsume"),
            subsumelim: opts.get_i64("subsumelim"),
            vivify: opts.get_bool("vivify"),
            vivifylim: opts.get_i64("vivifylim"),
            probe: opts.get_bool("probe"),
            probelim: opts.get_i64("probelim"),
            decompose: opts.get_bool("decompose"),
            decomposelim: opts.get_i64("decomposelim"),
            block: opts.get_bool("block"),
            blocklim: opts.get_i64("blocklim"),
        }
    }
}

impl Default for SearchOpts {
    fn default() -> Self {
        SearchOpts::from_registry(&Options::default())
    }
}

/// Per-variable state flags.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct VarFlags {
    pub eliminated: bool,
    pub substituted: bool,
    pub frozen: bool,
}

impl VarFlags {
    #[inline(always)]
    pub fn active(&self) -> bool {
        !self.eliminated && !self.substituted
    }
}

#[derive(Debug, Clone, Copy)]
struct VarData {
    reason: CRef,
    level: i32,
}

impl Default for VarData {
    fn default() -> Self {
        Self {
            reason: CRef::UNDEF,
            level: 0,
        }
    }
}

impl VarData {
    #[inline(always)]
    fn new(reason: CRef, level: i32) -> Self {
        Self { reason, level }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Watcher {
    pub cref: CRef,
    pub blocker: Lit,
}

impl Watcher {
    const DUMMY: Watcher = Watcher {
        cref: CRef::UNDEF,
        blocker: Lit::UNDEF,
    };
    pub fn new(cref: CRef, blocker: Lit) -> Self {
        Self { cref, blocker }
    }
}

impl PartialEq for Watcher {
    #[inline(always)]
    fn eq(&self, rhs: &Self) -> bool {
        self.cref == rhs.cref
    }
}
impl Eq for Watcher {}

/// Predicate to test whether a clause has been removed from some literal's
/// watch list.
pub(crate) struct WatcherDeleted<'a> {
    ca: &'a ClauseArena,
}

impl<'a> DeletePred<Watcher> for WatcherDeleted<'a> {
    #[inline]
    fn deleted(&self, w: &Watcher) -> bool {
        self.ca.get_ref(w.cref).garbage()
    }
}

struct VarOrder<'a> {
    activity: &'a VMap<f64>,
}

impl<'a> Comparator<Var> for VarOrder<'a> {
    fn cmp(&self, lhs: &Var, rhs: &Var) -> cmp::Ordering {
        PartialOrd::partial_cmp(&self.activity[*rhs], &self.activity[*lhs]).expect("NaN activity")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
enum Seen {
    Undef,
    Source,
    Removable,
}

impl Default for Seen {
    #[inline]
    fn default() -> Self {
        Seen::Undef
    }
}

impl Seen {
    #[inline(always)]
    fn is_seen(&self) -> bool {
        *self != Seen::Undef
    }
}

/// The trail and everything indexed by assignment order.
pub(crate) struct AssignState {
    /// Activity score per variable.
    activity: VMap<f64>,
    /// Current assignment per variable.
    ass: VMap<lbool>,
    /// Reason and level per variable, only meaningful while assigned.
    vardata: VMap<VarData>,
    /// Amount to bump the next touched variable with.
    var_inc: f64,
    var_decay: f64,
    /// Assignment stack in assignment order.
    pub trail: Vec<Lit>,
    /// Separator indices for decision levels in `trail`.
    pub trail_lim: Vec<i32>,
}

impl AssignState {
    fn new() -> Self {
        Self {
            activity: VMap::new(),
            ass: VMap::new(),
            vardata: VMap::new(),
            var_inc: 1.0,
            var_decay: 0.95,
            trail: vec![],
            trail_lim: vec![],
        }
    }

    #[inline(always)]
    pub fn num_assigns(&self) -> u32 {
        self.trail.len() as u32
    }

    fn new_decision_level(&mut self) {
        let lvl = self.trail.len() as i32;
        self.trail_lim.push(lvl);
    }

    /// The level-0 prefix of the trail.
    pub fn root_units(&self) -> &[Lit] {
        let end = self
            .trail_lim
            .get(0)
            .map_or(self.trail.len(), |&x| x as usize);
        &self.trail[..end]
    }

    #[inline(always)]
    pub fn value(&self, x: Var) -> lbool {
        self.ass[x]
    }

    #[inline(always)]
    pub fn value_lit(&self, x: Lit) -> lbool {
        self.ass[x.var()] ^ !x.sign()
    }

    #[inline(always)]
    pub fn level(&self, x: Var) -> i32 {
        self.vardata[x].level
    }

    #[inline(always)]
    fn reason(&self, x: Var) -> CRef {
        self.vardata[x].reason
    }

    fn var_decay_activity(&mut self) {
        self.var_inc *= 1.0 / self.var_decay;
    }

    #[inline(always)]
    pub fn decision_level(&self) -> u32 {
        self.trail_lim.len() as u32
    }

    fn unchecked_enqueue(&mut self, p: Lit, from: CRef) {
        debug_assert_eq!(self.value_lit(p), lbool::UNDEF, "lit {:?} should be undef", p);
        self.ass[p.var()] = lbool::new(p.sign());
        self.vardata[p.var()] = VarData::new(from, self.decision_level() as i32);
        self.trail.push(p);
    }

    /// Bump a variable with the current increment, rescaling all activities
    /// when the increment overflows.
    fn var_bump_activity(&mut self, order_heap_data: &mut HeapData<Var>, v: Var) {
        self.activity[v] += self.var_inc;
        if self.activity[v] > 1e100 {
            for (_, x) in self.activity.iter_mut() {
                *x *= 1e-100;
            }
            self.var_inc *= 1e-100;
        }

        let mut order_heap = order_heap_data.promote(VarOrder {
            activity: &self.activity,
        });
        if order_heap.in_heap(v) {
            order_heap.decrease(v);
        }
    }
}

/// The internal solver.
pub(crate) struct Internal {
    /// If `false`, the clause set is unsatisfiable at the root; no search
    /// state may be trusted beyond that fact.
    pub ok: bool,

    pub(crate) vars: AssignState,
    watches_data: OccListsData<Lit, Watcher>,
    order_heap_data: HeapData<Var>,

    /// Saved phase per variable.
    phase: VMap<bool>,
    /// Forced phase override, set through the `phase` API call.
    forced: VMap<lbool>,
    pub(crate) flags: VMap<VarFlags>,
    next_var: Var,

    pub ca: ClauseArena,
    /// Irredundant clauses.
    pub clauses: Vec<CRef>,
    /// Redundant (learned) clauses.
    pub learnts: Vec<CRef>,

    qhead: i32,

    /// Assumptions for the current solve, internal encoding, in order.
    pub assumptions: Vec<Lit>,
    /// Final conflict clause over negated assumptions (the failed set).
    pub conflict: LSet,
    /// Model of the last satisfiable call, indexed by internal variable.
    pub model: Vec<lbool>,

    // analyze temporaries
    seen: VMap<Seen>,
    minimize_stack: Vec<Lit>,
    analyze_toclear: Vec<Lit>,
    /// Stamps per decision level, for glue computation.
    frames: Vec<u32>,
    frame_stamp: u32,

    // restart state (glue exponential moving averages)
    glue_fast: f64,
    glue_slow: f64,
    conflicts_at_restart: u64,

    // schedule marks, in conflicts
    next_reduce: u64,
    next_inprocess: u64,

    /// Number of top-level assignments at the last database simplification.
    simp_db_assigns: i32,

    pub(crate) opts: SearchOpts,
    pub lim: Limits,
    pub stats: Stats,

    terminate_flag: Arc<AtomicBool>,
    pub proof: Option<Proof>,

    /// Internal variable to external variable index (always positive).
    i2e: VMap<i32>,

    // scratch buffers
    tmp_learnt: Vec<Lit>,
    tmp_extern: Vec<i32>,
}

impl Internal {
    pub fn new(terminate_flag: Arc<AtomicBool>) -> Self {
        Self {
            ok: true,
            vars: AssignState::new(),
            watches_data: OccListsData::new(),
            order_heap_data: HeapData::new(),
            phase: VMap::new(),
            forced: VMap::new(),
            flags: VMap::new(),
            next_var: Var::from_idx(0),
            ca: ClauseArena::new(),
            clauses: vec![],
            learnts: vec![],
            qhead: 0,
            assumptions: vec![],
            conflict: LSet::new(),
            model: vec![],
            seen: VMap::new(),
            minimize_stack: vec![],
            analyze_toclear: vec![],
            frames: vec![],
            frame_stamp: 0,
            glue_fast: 0.0,
            glue_slow: 0.0,
            conflicts_at_restart: 0,
            next_reduce: 0,
            next_inprocess: 0,
            simp_db_assigns: -1,
            opts: SearchOpts::default(),
            lim: Limits::default(),
            stats: Stats::default(),
            terminate_flag,
            proof: None,
            i2e: VMap::new(),
            tmp_learnt: vec![],
            tmp_extern: vec![],
        }
    }

    /*================================================================ basics */

    #[inline(always)]
    pub fn num_vars(&self) -> u32 {
        self.next_var.idx()
    }

    /// Number of variables that are neither eliminated, substituted nor
    /// fixed at the root.
    pub fn num_active(&self) -> u32 {
        let mut n = 0;
        for idx in 0..self.num_vars() {
            let v = Var::from_idx(idx);
            if self.flags[v].active() && !(self.value(v) != lbool::UNDEF && self.level(v) == 0) {
                n += 1;
            }
        }
        n
    }

    /// Create a fresh internal variable backing external variable `ext`.
    pub fn new_var(&mut self, ext: i32) -> Var {
        debug_assert!(ext > 0);
        let v = self.next_var;
        self.next_var = Var::from_idx(v.idx() + 1);
        self.watches_data.init(v.neg_lit());
        self.watches_data.init(v.pos_lit());
        self.vars.ass.insert_default(v, lbool::UNDEF);
        self.vars.vardata.insert_default(v, VarData::default());
        self.vars.activity.insert_default(v, 0.0);
        self.seen.insert_default(v, Seen::Undef);
        self.phase.insert(v, self.opts.initphase, false);
        self.forced.insert_default(v, lbool::UNDEF);
        self.flags.insert_default(v, VarFlags::default());
        self.i2e.insert_default(v, ext);
        self.insert_var_order(v);
        v
    }

    #[inline(always)]
    pub fn value(&self, x: Var) -> lbool {
        self.vars.value(x)
    }

    #[inline(always)]
    pub fn value_lit(&self, x: Lit) -> lbool {
        self.vars.value_lit(x)
    }

    #[inline(always)]
    pub fn level(&self, x: Var) -> i32 {
        self.vars.level(x)
    }

    #[inline(always)]
    pub fn reason(&self, x: Var) -> CRef {
        self.vars.reason(x)
    }

    #[inline(always)]
    pub fn decision_level(&self) -> u32 {
        self.vars.decision_level()
    }

    /// Value of `l` if it is assigned at the root level, `UNDEF` otherwise.
    pub fn fixed_lit(&self, l: Lit) -> lbool {
        let mut res = self.value_lit(l);
        if res != lbool::UNDEF && self.level(l.var()) != 0 {
            res = lbool::UNDEF;
        }
        res
    }

    /// External form of an internal literal.
    #[inline]
    pub fn externalize(&self, l: Lit) -> i32 {
        let e = self.i2e[l.var()];
        if l.sign() {
            e
        } else {
            -e
        }
    }

    pub fn externalize_clause(&self, lits: &[Lit], out: &mut Vec<i32>) {
        out.clear();
        out.extend(lits.iter().map(|&l| self.externalize(l)));
    }

    pub fn set_frozen(&mut self, v: Var, frozen: bool) {
        self.flags[v].frozen = frozen;
    }

    pub fn set_forced_phase(&mut self, v: Var, ph: lbool) {
        self.forced[v] = ph;
    }

    pub fn terminate_flag(&self) -> Arc<AtomicBool> {
        self.terminate_flag.clone()
    }

    pub fn terminated_asynchronously(&self) -> bool {
        self.terminate_flag.load(Ordering::Relaxed)
    }

    fn stop_requested(&self, handles: &mut Handles) -> bool {
        if self.terminated_asynchronously() {
            return true;
        }
        match handles.terminator {
            Some(ref mut t) => t.terminate(),
            None => false,
        }
    }

    fn within_limits(&self, conflicts_at_entry: u64, decisions_at_entry: u64) -> bool {
        (self.lim.conflicts < 0
            || ((self.stats.conflicts - conflicts_at_entry) as i64) < self.lim.conflicts)
            && (self.lim.decisions < 0
                || ((self.stats.decisions - decisions_at_entry) as i64) < self.lim.decisions)
    }

    /*============================================================== watches */

    pub(crate) fn watches(&mut self) -> OccLists<Lit, Watcher, WatcherDeleted> {
        self.watches_data.promote(WatcherDeleted { ca: &self.ca })
    }

    pub fn attach_clause(&mut self, cr: CRef) {
        let (c0, c1) = {
            let c = self.ca.get_ref(cr);
            debug_assert!(c.size() > 1);
            (c[0], c[1])
        };
        self.watches()[!c0].push(Watcher::new(cr, c1));
        self.watches()[!c1].push(Watcher::new(cr, c0));
    }

    /// Detach a clause from the watcher lists. `strict` removes eagerly
    /// instead of marking the lists dirty.
    pub fn detach_clause(&mut self, cr: CRef, strict: bool) {
        let (c0, c1) = {
            let c = self.ca.get_ref(cr);
            debug_assert!(c.size() > 1);
            (c[0], c[1])
        };

        let mut watches = self.watches_data.promote(WatcherDeleted { ca: &self.ca });

        if strict {
            let pos = watches[!c0]
                .iter()
                .position(|x| x == &Watcher::new(cr, c1))
                .expect("watcher not found");
            watches[!c0].remove(pos);
            let pos = watches[!c1]
                .iter()
                .position(|x| x == &Watcher::new(cr, c0))
                .expect("watcher not found");
            watches[!c1].remove(pos);
        } else {
            watches.smudge(!c0);
            watches.smudge(!c1);
        }
    }

    /// Detach, mark garbage and emit the proof deletion for a clause.
    pub fn remove_clause(&mut self, cr: CRef) {
        if self.ca.get_ref(cr).size() > 1 {
            self.detach_clause(cr, false);
        }
        {
            let c = self.ca.get_ref(cr);
            // Don't leave reasons pointing at freed memory.
            if self.locked(c) {
                self.vars.vardata[c[0].var()].reason = CRef::UNDEF;
            }
        }
        if let Some(proof) = &mut self.proof {
            let mut ext = mem::replace(&mut self.tmp_extern, vec![]);
            ext.clear();
            {
                let c = self.ca.get_ref(cr);
                for &l in c.lits() {
                    let e = self.i2e[l.var()];
                    ext.push(if l.sign() { e } else { -e });
                }
            }
            proof.delete_clause(&ext);
            self.tmp_extern = ext;
        }
        self.ca.get_mut(cr).set_garbage(true);
        self.ca.free(cr);
    }

    pub fn satisfied(&self, c: ClauseRef) -> bool {
        c.iter().any(|&lit| self.value_lit(lit) == lbool::TRUE)
    }

    /// A clause is locked while it is the reason of its first literal.
    fn locked(&self, c: ClauseRef) -> bool {
        let reason = self.reason(c[0].var());
        self.value_lit(c[0]) == lbool::TRUE
            && reason != CRef::UNDEF
            && self.ca.get_ref(reason) == c
    }

    /*============================================================= ordering */

    fn order_heap(&mut self) -> Heap<Var, VarOrder> {
        self.order_heap_data.promote(VarOrder {
            activity: &self.vars.activity,
        })
    }

    pub(crate) fn insert_var_order(&mut self, x: Var) {
        let active = self.flags[x].active();
        if !self.order_heap().in_heap(x) && active {
            self.order_heap().insert(x);
        }
    }

    pub(crate) fn remove_var_order(&mut self, x: Var) {
        if self.order_heap().in_heap(x) {
            self.order_heap().remove(x);
        }
    }

    pub(crate) fn rebuild_order_heap(&mut self) {
        let mut vs = vec![];
        for v in (0..self.num_vars()).map(Var::from_idx) {
            if self.flags[v].active() && self.value(v) == lbool::UNDEF {
                vs.push(v);
            }
        }
        self.order_heap().build(&vs);
    }

    /// Pick the next decision literal: highest activity, phase from the
    /// forced override or the saved phase.
    fn pick_branch_lit(&mut self) -> Lit {
        let mut next = Var::UNDEF;
        while next == Var::UNDEF
            || self.value(next) != lbool::UNDEF
            || !self.flags[next].active()
        {
            let mut order_heap = self.order_heap();
            if order_heap.is_empty() {
                next = Var::UNDEF;
                break;
            } else {
                next = order_heap.remove_min();
            }
        }

        if next == Var::UNDEF {
            Lit::UNDEF
        } else if self.forced[next] != lbool::UNDEF {
            Lit::new(next, self.forced[next] == lbool::TRUE)
        } else {
            Lit::new(next, self.phase[next])
        }
    }

    /*=========================================================== enqueueing */

    pub(crate) fn new_decision_level(&mut self) {
        trace!("new decision level {}", 1 + self.decision_level());
        self.vars.new_decision_level();
    }

    pub(crate) fn unchecked_enqueue(&mut self, p: Lit, from: CRef) {
        self.vars.unchecked_enqueue(p, from);
    }

    /// Re-impose a root value recorded before a compact dropped the
    /// variable. The unit is already part of the emitted proof.
    pub fn force_root_value(&mut self, v: Var, value: lbool) {
        debug_assert_eq!(self.decision_level(), 0);
        debug_assert_eq!(self.value(v), lbool::UNDEF);
        debug_assert!(value != lbool::UNDEF);
        let p = Lit::new(v, value == lbool::TRUE);
        self.vars.unchecked_enqueue(p, CRef::UNDEF);
    }

    /// Enqueue a root-level unit and emit it as a derived proof line.
    pub fn learn_unit(&mut self, p: Lit) {
        debug_assert_eq!(self.decision_level(), 0);
        debug_assert_eq!(self.value_lit(p), lbool::UNDEF);
        if let Some(proof) = &mut self.proof {
            let e = self.i2e[p.var()];
            proof.add_derived_unit(if p.sign() { e } else { -e });
        }
        self.stats.fixed += 1;
        self.vars.unchecked_enqueue(p, CRef::UNDEF);
    }

    /*================================================================= add */

    /// Add an input clause at decision level 0; `add_derived` certifies a
    /// clause the solver derived itself.
    pub fn add_input_clause(&mut self, clause: &mut Vec<Lit>) -> bool {
        self.add_clause_internal(clause, false, false)
    }

    /// Add a derived clause; always emitted to the proof.
    pub fn add_derived(&mut self, clause: &mut Vec<Lit>, redundant: bool) -> bool {
        self.add_clause_internal(clause, redundant, true)
    }

    /// Add a clause at decision level 0, simplifying it first: duplicate
    /// literals and root-falsified literals are dropped, tautologies and
    /// root-satisfied clauses are ignored. Emits the resulting form to the
    /// proof when it is derived or when simplification changed an input
    /// clause. Does not propagate.
    ///
    /// Returns `false` iff the solver became inconsistent.
    fn add_clause_internal(&mut self, clause: &mut Vec<Lit>, redundant: bool, derived: bool) -> bool {
        debug_assert_eq!(self.decision_level(), 0, "add clause at non-zero decision level");
        if !self.ok {
            return false;
        }
        debug!("add toplevel clause {:?}", clause);

        let orig_len = clause.len();
        clause.sort_unstable();
        let mut last_lit = Lit::UNDEF;
        let mut j = 0;
        for i in 0..clause.len() {
            let lit_i = clause[i];
            let value = self.value_lit(lit_i);
            let lvl = self.level(lit_i.var());
            if (value == lbool::TRUE && lvl == 0) || lit_i == !last_lit {
                return true; // tautological or already satisfied at the root
            } else if !(value == lbool::FALSE && lvl == 0) && lit_i != last_lit {
                last_lit = lit_i;
                clause[j] = lit_i;
                j += 1;
            }
        }
        clause.resize(j, Lit::UNDEF);

        let changed = clause.len() != orig_len;

        if clause.is_empty() {
            if let Some(proof) = &mut self.proof {
                proof.add_empty_clause();
            }
            self.ok = false;
            return false;
        } else if clause.len() == 1 {
            if changed || derived {
                self.learn_unit(clause[0]);
            } else {
                // original input unit, no derivation to certify
                self.stats.fixed += 1;
                self.vars.unchecked_enqueue(clause[0], CRef::UNDEF);
            }
        } else {
            if changed || derived {
                if let Some(proof) = &mut self.proof {
                    let mut ext = mem::replace(&mut self.tmp_extern, vec![]);
                    ext.clear();
                    for &l in clause.iter() {
                        let e = self.i2e[l.var()];
                        ext.push(if l.sign() { e } else { -e });
                    }
                    proof.add_derived_clause(&ext);
                    self.tmp_extern = ext;
                }
            }
            let cr = self.ca.alloc(&clause, redundant, clause.len() as u32);
            if redundant {
                self.learnts.push(cr);
            } else {
                self.clauses.push(cr);
            }
            self.attach_clause(cr);
        }
        true
    }

    /// Propagate at the root. On conflict the solver becomes inconsistent
    /// and the empty clause is traced.
    pub fn propagate_toplevel(&mut self) -> bool {
        debug_assert_eq!(self.decision_level(), 0);
        if !self.ok {
            return false;
        }
        if self.propagate().is_some() {
            self.ok = false;
            if let Some(proof) = &mut self.proof {
                proof.add_empty_clause();
            }
        }
        self.ok
    }

    /*=========================================================== propagation */

    /// Propagate all enqueued facts. Returns the conflicting clause, if any.
    ///
    /// Post-condition: the propagation queue is empty, even on conflict.
    pub fn propagate(&mut self) -> Option<CRef> {
        let mut confl = None;
        let mut num_props: u32 = 0;

        while (self.qhead as usize) < self.vars.trail.len() {
            // `p` is the next enqueued fact to propagate.
            let p = self.vars.trail[self.qhead as usize];
            self.qhead += 1;
            let watches_data_ptr: *mut OccListsData<_, _> = &mut self.watches_data;
            let ws = self
                .watches_data
                .lookup_mut_pred(p, &WatcherDeleted { ca: &self.ca });
            let mut i: usize = 0;
            let mut j: usize = 0;
            let end: usize = ws.len();
            num_props += 1;
            'clauses: while i < end {
                // Try to avoid inspecting the clause:
                let blocker = ws[i].blocker;
                if self.vars.value_lit(blocker) == lbool::TRUE {
                    ws[j] = ws[i];
                    j += 1;
                    i += 1;
                    continue;
                }

                // Make sure the false literal is data[1]:
                let cr = ws[i].cref;
                let mut c = self.ca.get_mut(cr);
                let false_lit = !p;
                if c[0] == false_lit {
                    c[0] = c[1];
                    c[1] = false_lit;
                }
                debug_assert_eq!(c[1], false_lit);
                i += 1;

                // If the 0th watch is true the clause is already satisfied.
                let first = c[0];
                let w = Watcher::new(cr, first);
                if first != blocker && self.vars.value_lit(first) == lbool::TRUE {
                    ws[j] = w;
                    j += 1;
                    continue;
                }

                // Look for a new watch:
                for k in 2..c.size() {
                    if self.vars.value_lit(c[k]) != lbool::FALSE {
                        c[1] = c[k];
                        c[k] = false_lit;
                        // safe because `!c[1] != p`, so the lists are not aliased
                        debug_assert_ne!(!c[1], p);
                        unsafe { &mut (&mut (*watches_data_ptr))[!c[1]] }.push(w);
                        continue 'clauses;
                    }
                }

                // No new watch, the clause is unit under the assignment:
                ws[j] = w;
                j += 1;
                if self.vars.value_lit(first) == lbool::FALSE {
                    confl = Some(cr);
                    self.qhead = self.vars.trail.len() as i32;
                    // Copy the remaining watches:
                    while i < end {
                        ws[j] = ws[i];
                        j += 1;
                        i += 1;
                    }
                } else {
                    self.vars.unchecked_enqueue(first, cr);
                }
            }
            ws.resize(j, Watcher::DUMMY);
        }
        self.stats.propagations += num_props as u64;

        confl
    }

    /*======================================================== backtracking */

    /// Revert to the state at the given level, keeping all assignments at
    /// `level` but not beyond.
    pub fn cancel_until(&mut self, level: u32) {
        if self.decision_level() <= level {
            return;
        }
        let trail_lim_last = *self.vars.trail_lim.last().expect("trail_lim is empty") as usize;
        let trail_lim_level = self.vars.trail_lim[level as usize] as usize;
        for c in (trail_lim_level..self.vars.trail.len()).rev() {
            let x = self.vars.trail[c].var();
            self.vars.ass[x] = lbool::UNDEF;
            if self.opts.phasesaving > 1 || (self.opts.phasesaving == 1 && c > trail_lim_last) {
                self.phase[x] = self.vars.trail[c].sign();
            }
            self.insert_var_order(x);
        }
        self.qhead = trail_lim_level as i32;
        self.vars.trail.resize(trail_lim_level, Lit::UNDEF);
        self.vars.trail_lim.resize(level as usize, 0);
    }

    /*============================================================== analyze */

    /// An abstraction of the level of a variable.
    #[inline]
    fn abstract_level(&self, v: Var) -> u32 {
        1 << (self.level(v) & 31)
    }

    /// Analyze a conflict and produce the 1-UIP clause.
    ///
    /// Pre-conditions: the current decision level is above the root and the
    /// conflicting clause is falsified by the trail.
    ///
    /// Post-conditions: `out_learnt[0]` is the asserting literal and, for
    /// clauses of size > 1, `out_learnt[1]` has the greatest decision level
    /// among the remaining literals. Returns the backjump level.
    fn analyze(&mut self, confl: CRef, out_learnt: &mut Vec<Lit>) -> i32 {
        out_learnt.clear();
        out_learnt.push(Lit::UNDEF); // leave room for the asserting literal

        let conflict_level = self.decision_level() as i32;
        let mut path_c = 0;
        let mut p = Lit::UNDEF;
        let mut index = self.vars.trail.len();
        let mut cur = confl;
        let mut first = true;

        loop {
            // Mark the clause as used, and tighten its glue while we are here.
            if self.ca.get_ref(cur).redundant() {
                let glue = {
                    let lits = self.ca.get_ref(cur).lits();
                    glue_of(&mut self.frames, &mut self.frame_stamp, &self.vars, lits)
                };
                let mut c = self.ca.get_mut(cur);
                c.set_used(2);
                if glue < c.glue() {
                    c.set_glue(glue);
                }
            }

            let lits = {
                let c = self.ca.get_ref(cur);
                let lits = c.lits();
                // When resolving against the reason of `p`, its first
                // literal is `p` itself and cannot appear in the result.
                if first {
                    lits
                } else {
                    debug_assert_eq!(p.var(), lits[0].var());
                    &lits[1..]
                }
            };

            for &q in lits {
                let lvl = self.vars.level(q.var());
                debug_assert!(lvl <= conflict_level);
                if !self.seen[q.var()].is_seen() && lvl > 0 {
                    self.vars
                        .var_bump_activity(&mut self.order_heap_data, q.var());
                    self.seen[q.var()] = Seen::Source;
                    if lvl == conflict_level {
                        path_c += 1;
                    } else {
                        out_learnt.push(q);
                    }
                }
            }

            // Select the next trail literal to resolve on:
            while !self.seen[self.vars.trail[index - 1].var()].is_seen() {
                index -= 1;
            }
            p = self.vars.trail[index - 1];
            index -= 1;
            self.seen[p.var()] = Seen::Removable;
            path_c -= 1;
            first = false;

            if path_c <= 0 {
                break;
            }
            cur = self.vars.reason(p.var());
            debug_assert_ne!(cur, CRef::UNDEF, "resolved into a decision");
        }

        // Clean up the literals flagged `Removable` on the conflict level.
        index = self.vars.trail.len() - 1;
        loop {
            let q = self.vars.trail[index];
            if self.seen[q.var()] == Seen::Removable {
                self.seen[q.var()] = Seen::Undef;
            }
            if q == p {
                break;
            }
            index -= 1;
        }

        debug_assert!(self.value_lit(p) == lbool::TRUE);
        out_learnt[0] = !p;

        trace!("analyze-learnt: {:?} (before minimization)", &out_learnt);
        self.stats.learned_literals += out_learnt.len() as u64;

        if self.opts.minimize {
            self.minimize_conflict(out_learnt);
        }

        // Find the backjump level:
        let btlevel = if out_learnt.len() == 1 {
            0
        } else {
            let mut max_i = 1;
            let mut max_level = self.level(out_learnt[max_i].var());
            for i in 2..out_learnt.len() {
                let level = self.level(out_learnt[i].var());
                if level > max_level {
                    max_i = i;
                    max_level = level;
                }
            }
            out_learnt.swap(max_i, 1);
            self.level(out_learnt[1].var())
        };

        for &lit in &self.analyze_toclear {
            self.seen[lit.var()] = Seen::Undef;
        }
        debug_assert!(out_learnt.iter().all(|&l| self.value_lit(l) == lbool::FALSE));
        btlevel
    }

    fn minimize_conflict(&mut self, out_learnt: &mut Vec<Lit>) {
        self.analyze_toclear.clear();
        self.analyze_toclear.extend_from_slice(&out_learnt);
        let new_size = if self.opts.ccmin == 2 {
            let mut abstract_levels = 0;
            for a in out_learnt[1..].iter() {
                abstract_levels |= self.abstract_level(a.var())
            }

            let mut j = 1;
            for i in 1..out_learnt.len() {
                let lit = out_learnt[i];
                // only a propagated, redundant literal can be dropped
                if self.reason(lit.var()) == CRef::UNDEF
                    || !self.lit_redundant(lit, abstract_levels)
                {
                    out_learnt[j] = lit;
                    j += 1;
                }
            }
            j
        } else if self.opts.ccmin == 1 {
            let mut j = 1;
            for i in 1..out_learnt.len() {
                let lit = out_learnt[i];
                let x = lit.var();
                let reason = self.reason(x);

                let mut retain = true;
                if reason != CRef::UNDEF {
                    let c = self.ca.get_ref(reason);
                    retain = false;
                    for k in 1..c.size() {
                        let v = c[k].var();
                        if !self.seen[v].is_seen() && self.level(v) > 0 {
                            retain = true;
                            break;
                        }
                    }
                }
                if retain {
                    out_learnt[j] = lit;
                    j += 1;
                }
            }
            j
        } else {
            out_learnt.len()
        };

        self.stats.minimized_literals += (out_learnt.len() - new_size) as u64;
        out_learnt.truncate(new_size);
    }

    /// Can `p` be removed from the learnt clause? It can if it is implied by
    /// literals of level 0 exclusively or if resolving with its reason chain
    /// never leaves the levels of the clause.
    fn lit_redundant(&mut self, p: Lit, abstract_levels: u32) -> bool {
        self.minimize_stack.clear();
        self.minimize_stack.push(p);

        let top = self.analyze_toclear.len();

        while self.minimize_stack.len() > 0 {
            let q = *self.minimize_stack.last().unwrap();
            let cr = self.reason(q.var());
            debug_assert_ne!(cr, CRef::UNDEF);
            self.minimize_stack.pop();

            let c = self.ca.get_ref(cr);
            for &l in c.lits()[1..].iter() {
                // level 0 or already marked: skip
                if self.vars.level(l.var()) == 0 || self.seen[l.var()] == Seen::Source {
                    continue;
                }

                if self.reason(l.var()) != CRef::UNDEF
                    && (self.abstract_level(l.var()) & abstract_levels) != 0
                {
                    self.seen[l.var()] = Seen::Source;
                    self.minimize_stack.push(l);
                    self.analyze_toclear.push(l);
                } else {
                    // cannot remove `l`, cancel
                    for a in self.analyze_toclear[top..].iter() {
                        self.seen[a.var()] = Seen::Undef;
                    }
                    self.analyze_toclear.resize(top, Lit::UNDEF);
                    return false;
                }
            }
        }

        true
    }

    /// Express the final conflict in terms of assumptions: collect the
    /// (possibly empty) set of assumptions that led to the assignment of `p`
    /// into `self.conflict`.
    fn analyze_final(&mut self, p: Lit) {
        self.conflict.clear();
        self.conflict.insert(p);
        debug!("analyze_final lit={:?}", p);

        if self.decision_level() == 0 {
            return; // no assumptions involved
        }

        self.seen[p.var()] = Seen::Source;

        for &lit in self.vars.trail[self.vars.trail_lim[0] as usize..]
            .iter()
            .rev()
        {
            let x = lit.var();
            if self.seen[x].is_seen() {
                let reason = self.reason(x);
                if reason == CRef::UNDEF {
                    debug_assert!(self.level(x) > 0);
                    self.conflict.insert(!lit);
                } else {
                    let c = self.ca.get_ref(reason);
                    for j in 1..c.size() {
                        if self.vars.level(c[j].var()) > 0 {
                            self.seen[c[j].var()] = Seen::Source;
                        }
                    }
                }
                self.seen[x] = Seen::Undef;
            }
        }

        self.seen[p.var()] = Seen::Undef;
        debug_assert!(self.seen.iter().all(|(_, &s)| s == Seen::Undef));
    }

    /*============================================================== learning */

    /// Attach a learnt clause, backjump and propagate its asserting literal.
    fn add_learnt_and_backtrack(&mut self, btlevel: i32, handles: &mut Handles) {
        let learnt = mem::replace(&mut self.tmp_learnt, vec![]);

        // proof first: additions are emitted before the clause is usable
        if let Some(proof) = &mut self.proof {
            let mut ext = mem::replace(&mut self.tmp_extern, vec![]);
            ext.clear();
            for &l in learnt.iter() {
                let e = self.i2e[l.var()];
                ext.push(if l.sign() { e } else { -e });
            }
            proof.add_derived_clause(&ext);
            self.tmp_extern = ext;
        }

        // export through the learner callback, zero terminated
        if let Some(learner) = &mut handles.learner {
            if learner.learning(learnt.len()) {
                for &l in learnt.iter() {
                    let e = self.i2e[l.var()];
                    learner.learn(if l.sign() { e } else { -e });
                }
                learner.learn(0);
            }
        }

        self.cancel_until(btlevel as u32);

        self.stats.learned += 1;
        if learnt.len() == 1 {
            self.stats.learned_units += 1;
            self.stats.fixed += 1;
            self.vars.unchecked_enqueue(learnt[0], CRef::UNDEF);
        } else if learnt.is_empty() {
            self.ok = false;
        } else {
            let glue = glue_of(&mut self.frames, &mut self.frame_stamp, &self.vars, &learnt);
            let cr = self.ca.alloc(&learnt, true, glue);
            self.ca.get_mut(cr).set_used(2);
            self.learnts.push(cr);
            self.attach_clause(cr);
            self.vars.unchecked_enqueue(learnt[0], cr);

            // restart machinery learns from the glue stream
            self.glue_fast += (glue as f64 - self.glue_fast) / 32.0;
            self.glue_slow += (glue as f64 - self.glue_slow) / 8192.0;
        }

        self.tmp_learnt = learnt;
    }

    /*=============================================================== reduce */

    /// Discard a fraction of the redundant clauses: high glue first, recently
    /// used and locked clauses are protected, low glue tiers are kept.
    fn reduce(&mut self) {
        self.stats.reductions += 1;
        debug!("reduce.start ({} redundant)", self.learnts.len());

        {
            let ca = &self.ca;
            // worst candidates first: high glue, then large
            self.learnts.sort_unstable_by(|&x, &y| {
                let x = ca.get_ref(x);
                let y = ca.get_ref(y);
                (y.glue(), y.size()).cmp(&(x.glue(), x.size()))
            });
        }

        let target = (self.learnts.len() as f64 * self.opts.reducefraction) as usize;
        let keepglue = self.opts.keepglue;
        let keepused = self.opts.keepused;

        let mut removed = 0;
        let mut j = 0;
        for i in 0..self.learnts.len() {
            let cr = self.learnts[i];
            let (is_candidate, used) = {
                let c = self.ca.get_ref(cr);
                let cand = c.glue() > keepglue && c.size() > 2 && !self.locked(c);
                (cand, c.used())
            };
            let protect = keepused && used > 0;
            if used > 0 {
                let mut c = self.ca.get_mut(cr);
                let u = c.used();
                c.set_used(u - 1);
            }
            if is_candidate && !protect && removed < target {
                self.remove_clause(cr);
                removed += 1;
            } else {
                self.learnts[j] = cr;
                j += 1;
            }
        }
        self.learnts.truncate(j);

        debug!("reduce.done (deleted {})", removed);

        self.check_garbage();
    }

    /*=========================================================== simplify db */

    /// Remove satisfied clauses and strip root-falsified literals, at level 0.
    pub(crate) fn simplify_db(&mut self) -> bool {
        debug_assert_eq!(self.decision_level(), 0);

        if !self.ok || self.propagate().is_some() {
            self.ok = false;
            return false;
        }

        if self.vars.num_assigns() as i32 == self.simp_db_assigns {
            return true;
        }

        self.remove_satisfied(true);
        self.remove_satisfied(false);
        self.check_garbage();
        self.rebuild_order_heap();

        self.simp_db_assigns = self.vars.num_assigns() as i32;
        true
    }

    /// Shrink the given set to the non-satisfied clauses, stripping literals
    /// that are false at the root. Shrunken clauses are re-certified.
    fn remove_satisfied(&mut self, redundant: bool) {
        debug_assert_eq!(self.decision_level(), 0);
        let mut cs = mem::replace(
            if redundant {
                &mut self.learnts
            } else {
                &mut self.clauses
            },
            vec![],
        );
        cs.retain(|&cr| {
            let satisfied = self.satisfied(self.ca.get_ref(cr));
            if satisfied {
                self.remove_clause(cr);
            } else {
                let mut shaved: Vec<Lit> = vec![];
                {
                    let c = self.ca.get_ref(cr);
                    debug_assert_eq!(self.vars.value_lit(c[0]), lbool::UNDEF);
                    debug_assert_eq!(self.vars.value_lit(c[1]), lbool::UNDEF);
                    for k in 2..c.size() {
                        if self.vars.value_lit(c[k as u32]) == lbool::FALSE {
                            shaved.push(c[k as u32]);
                        }
                    }
                }
                if !shaved.is_empty() {
                    // emit the strengthened clause before dropping literals
                    if let Some(proof) = &mut self.proof {
                        let mut ext = mem::replace(&mut self.tmp_extern, vec![]);
                        ext.clear();
                        let mut old = vec![];
                        {
                            let c = self.ca.get_ref(cr);
                            for &l in c.lits() {
                                let e = self.i2e[l.var()];
                                let le = if l.sign() { e } else { -e };
                                old.push(le);
                                if !shaved.contains(&l) {
                                    ext.push(le);
                                }
                            }
                        }
                        proof.add_derived_clause(&ext);
                        proof.delete_clause(&old);
                        self.tmp_extern = ext;
                    }
                    let amount = {
                        let mut c = self.ca.get_mut(cr);
                        let mut k = 2;
                        let orig_size = c.size();
                        let mut end = c.size();
                        while k < end {
                            if shaved.contains(&c[k]) {
                                end -= 1;
                                c[k] = c[end];
                            } else {
                                k += 1;
                            }
                        }
                        c.shrink(end);
                        orig_size - end
                    };
                    self.ca.free_amount(amount as usize);
                }
            }
            !satisfied
        });
        let slot = if redundant {
            &mut self.learnts
        } else {
            &mut self.clauses
        };
        debug_assert!(slot.is_empty());
        *slot = cs;
    }

    /*=========================================================== gc / reloc */

    fn garbage_collect(&mut self) {
        let mut to = ClauseArena::with_start_cap(self.ca.len() - self.ca.wasted());
        self.reloc_all(&mut to);
        self.stats.garbage_collections += 1;
        debug!(
            "garbage collection {} -> {} literals",
            self.ca.len(),
            to.len()
        );
        self.ca = to;
    }

    pub(crate) fn check_garbage(&mut self) {
        if self.ca.wasted() as f64 > self.ca.len() as f64 * 0.2 {
            self.garbage_collect();
        }
    }

    fn reloc_all(&mut self, to: &mut ClauseArena) {
        macro_rules! is_removed {
            ($ca:expr, $cr:expr) => {
                $ca.get_ref($cr).garbage()
            };
        }
        // All watchers:
        self.watches().clean_all();
        for v in (0..self.num_vars()).map(Var::from_idx) {
            for s in 0..2 {
                let p = Lit::new(v, s != 0);
                for watch in &mut self.watches_data[p] {
                    self.ca.reloc(&mut watch.cref, to);
                }
            }
        }

        // All reasons:
        for &lit in &self.vars.trail {
            let v = lit.var();
            let reason = self.vars.reason(v);
            if reason != CRef::UNDEF {
                let cond = {
                    let c = self.ca.get_ref(reason);
                    c.reloced() || self.locked(c)
                };
                if cond {
                    debug_assert!(!is_removed!(self.ca, reason));
                    self.ca.reloc(&mut self.vars.vardata[v].reason, to);
                }
            }
        }

        // All clauses:
        for set in [&mut self.learnts, &mut self.clauses].iter_mut() {
            let mut j = 0;
            for i in 0..set.len() {
                let mut cr = set[i];
                if !is_removed!(self.ca, cr) {
                    self.ca.reloc(&mut cr, to);
                    set[j] = cr;
                    j += 1;
                }
            }
            set.truncate(j);
        }
    }

    /*=============================================================== search */

    fn should_restart(&self) -> bool {
        let since = self.stats.conflicts - self.conflicts_at_restart;
        if self.opts.luby {
            let interval =
                self.opts.lubybase as f64 * utils::luby(2.0, self.stats.restarts as i32);
            since as f64 >= interval
        } else {
            since >= self.opts.restartint as u64
                && self.glue_fast > self.opts.restartmargin * self.glue_slow
        }
    }

    fn restart(&mut self, handles: &mut Handles) {
        self.stats.restarts += 1;
        self.conflicts_at_restart = self.stats.conflicts;
        info!("search.restart({})", self.stats.restarts);
        self.cancel_until(0);
        self.import_clauses(handles);
    }

    /// Drain the pull-based learn source, at level 0.
    fn import_clauses(&mut self, handles: &mut Handles) {
        debug_assert_eq!(self.decision_level(), 0);
        let source = match handles.source {
            None => return,
            Some(ref mut s) => s,
        };
        let mut imported: Vec<Vec<i32>> = vec![];
        while source.has_next_clause() {
            imported.push(source.next_clause());
        }
        for ext_clause in imported {
            let mut lits: Vec<Lit> = Vec::with_capacity(ext_clause.len());
            let mut known = true;
            for &e in &ext_clause {
                debug_assert!(e != 0 && e != i32::MIN);
                match self.find_internal(e) {
                    Some(l) => lits.push(l),
                    None => {
                        // clauses over unknown variables are of no use here
                        known = false;
                        break;
                    }
                }
            }
            if known {
                if !self.add_derived(&mut lits, true) {
                    return;
                }
                if !self.propagate_toplevel() {
                    return;
                }
            }
        }
    }

    /// Internal literal of an external literal, if its variable is mapped.
    fn find_internal(&self, e: i32) -> Option<Lit> {
        let target = e.abs();
        for idx in 0..self.num_vars() {
            let v = Var::from_idx(idx);
            if self.i2e[v] == target && self.flags[v].active() {
                return Some(if e > 0 { v.pos_lit() } else { v.neg_lit() });
            }
        }
        None
    }

    /// The CDCL loop: propagate, analyze, learn, backjump, decide, restart,
    /// reduce, inprocess. Returns TRUE/FALSE/UNDEF for sat, unsat under the
    /// current assumptions, and limit/termination respectively.
    pub fn search(&mut self, extend: &mut ExtensionStack, handles: &mut Handles) -> lbool {
        debug_assert!(self.ok);
        let conflicts_at_entry = self.stats.conflicts;
        let decisions_at_entry = self.stats.decisions;

        loop {
            let confl = self.propagate();

            if let Some(confl) = confl {
                // conflict
                self.stats.conflicts += 1;
                if self.decision_level() == 0 {
                    if let Some(proof) = &mut self.proof {
                        proof.add_empty_clause();
                    }
                    self.ok = false;
                    return lbool::FALSE;
                }

                let mut learnt = mem::replace(&mut self.tmp_learnt, vec![]);
                let btlevel = self.analyze(confl, &mut learnt);
                self.tmp_learnt = learnt;
                self.add_learnt_and_backtrack(btlevel, handles);
                if !self.ok {
                    return lbool::FALSE;
                }

                self.vars.var_decay_activity();

                // checkpoint: conflict boundary
                if self.stop_requested(handles)
                    || !self.within_limits(conflicts_at_entry, decisions_at_entry)
                {
                    self.cancel_until(0);
                    return lbool::UNDEF;
                }
            } else {
                // no conflict
                if self.should_restart() {
                    // checkpoint: top of restart
                    if self.stop_requested(handles) {
                        self.cancel_until(0);
                        return lbool::UNDEF;
                    }
                    self.restart(handles);
                    if !self.ok {
                        return lbool::FALSE;
                    }
                }

                if self.decision_level() == 0 {
                    if !self.simplify_db() {
                        return lbool::FALSE;
                    }
                    if self.opts.inprocessing && self.stats.conflicts >= self.next_inprocess {
                        self.inprocess(extend, handles);
                        self.next_inprocess = self.stats.conflicts + self.opts.inprocessint as u64;
                        if !self.ok {
                            return lbool::FALSE;
                        }
                        if self.stop_requested(handles) {
                            self.cancel_until(0);
                            return lbool::UNDEF;
                        }
                        continue; // propagate whatever inprocessing enqueued
                    }
                }

                if self.stats.conflicts >= self.next_reduce {
                    self.reduce();
                    self.next_reduce = self.stats.conflicts
                        + self.opts.reduceint as u64 * (self.stats.reductions + 1);
                }

                // assumptions act as forced decisions below the real ones
                let mut next = Lit::UNDEF;
                while (self.decision_level() as usize) < self.assumptions.len() {
                    let p = self.assumptions[self.decision_level() as usize];
                    if self.value_lit(p) == lbool::TRUE {
                        // already satisfied, open a dummy level
                        self.new_decision_level();
                    } else if self.value_lit(p) == lbool::FALSE {
                        // the prefix is contradictory, compute the failed set
                        self.analyze_final(!p);
                        return lbool::FALSE;
                    } else {
                        next = p;
                        break;
                    }
                }

                if next == Lit::UNDEF {
                    next = self.pick_branch_lit();
                    if next == Lit::UNDEF {
                        // a full model
                        return lbool::TRUE;
                    }
                    self.stats.decisions += 1;
                    if !self.within_limits(conflicts_at_entry, decisions_at_entry) {
                        self.cancel_until(0);
                        return lbool::UNDEF;
                    }
                }

                debug_assert_ne!(next, Lit::UNDEF);
                self.new_decision_level();
                debug!("pick-next {:?}", next);
                self.vars.unchecked_enqueue(next, CRef::UNDEF);
            }
        }
    }

    /// Main solve entry of the engine, assumptions already installed.
    pub fn solve(&mut self, extend: &mut ExtensionStack, handles: &mut Handles) -> lbool {
        debug_assert_eq!(self.decision_level(), 0);
        self.model.clear();
        self.conflict.clear();
        self.terminate_flag.store(false, Ordering::SeqCst);
        if !self.ok {
            return lbool::FALSE;
        }

        self.stats.solves += 1;
        info!("search.start");

        if self.next_reduce == 0 {
            self.next_reduce = self.opts.reduceint as u64;
        }

        if !self.propagate_toplevel() {
            return lbool::FALSE;
        }

        // preprocessing rounds requested through `limit("preprocessing", n)`
        for _ in 0..self.lim.preprocessing.max(0) {
            self.inprocess(extend, handles);
            if !self.ok {
                return lbool::FALSE;
            }
            if self.stop_requested(handles) {
                return lbool::UNDEF;
            }
        }

        let status = self.search(extend, handles);

        if status == lbool::TRUE {
            // snapshot the model before unwinding the trail
            let num_vars = self.num_vars();
            self.model.resize(num_vars as usize, lbool::UNDEF);
            for i in 0..num_vars {
                self.model[i as usize] = self.value(Var::from_idx(i));
            }
        } else if status == lbool::FALSE && self.conflict.len() == 0 {
            // unsatisfiable regardless of assumptions
            self.ok = false;
        }

        self.cancel_until(0);
        debug!("res: {:?}", status);
        status
    }

    /// Preprocessing-only entry: runs the requested number of inprocessing
    /// rounds plus top-level propagation, but no search.
    pub fn preprocess_only(
        &mut self,
        extend: &mut ExtensionStack,
        handles: &mut Handles,
        rounds: i64,
    ) -> lbool {
        debug_assert_eq!(self.decision_level(), 0);
        self.model.clear();
        self.conflict.clear();
        if !self.ok {
            return lbool::FALSE;
        }
        if !self.propagate_toplevel() {
            return lbool::FALSE;
        }
        for _ in 0..rounds.max(0) {
            self.inprocess(extend, handles);
            if !self.ok {
                return lbool::FALSE;
            }
            if self.stop_requested(handles) {
                break;
            }
        }
        // decided already?
        if self.clauses.is_empty() && self.learnts.is_empty() {
            let all_assigned = (0..self.num_vars())
                .map(Var::from_idx)
                .filter(|&v| self.flags[v].active())
                .all(|v| self.value(v) != lbool::UNDEF);
            if all_assigned {
                let num_vars = self.num_vars();
                self.model.resize(num_vars as usize, lbool::UNDEF);
                for i in 0..num_vars {
                    self.model[i as usize] = self.value(Var::from_idx(i));
                }
                return lbool::TRUE;
            }
        }
        lbool::UNDEF
    }

    /*========================================================== inprocessing */

    /// One inprocessing round: subsumption, variable elimination, blocked
    /// clauses, equivalence substitution, vivification and probing, each
    /// behind its option and work budget, with termination checks between
    /// passes.
    pub fn inprocess(&mut self, extend: &mut ExtensionStack, handles: &mut Handles) {
        debug_assert_eq!(self.decision_level(), 0);
        if !self.ok {
            return;
        }
        self.stats.inprocessings += 1;
        debug!("inprocess.round {}", self.stats.inprocessings);

        macro_rules! pass {
            ($enabled:expr, $run:expr) => {
                if self.ok && $enabled {
                    $run;
                    if self.ok {
                        self.propagate_toplevel();
                    }
                    if self.terminated_asynchronously()
                        || match handles.terminator {
                            Some(ref mut t) => t.terminate(),
                            None => false,
                        }
                    {
                        return;
                    }
                }
            };
        }

        pass!(self.opts.subsume, crate::subsume::subsume_round(self));
        pass!(self.opts.decompose, crate::decompose::decompose_round(self, extend));
        pass!(self.opts.elim, crate::elim::elim_round(self, extend));
        pass!(self.opts.block, crate::block::block_round(self, extend));
        pass!(self.opts.vivify, crate::vivify::vivify_round(self));
        pass!(self.opts.probe, crate::probe::probe_round(self));

        if self.ok {
            self.simplify_db();
        }
    }

    /// Mark a variable as eliminated. It must be unassigned and absent from
    /// all remaining clauses.
    pub(crate) fn mark_eliminated(&mut self, v: Var) {
        debug_assert_eq!(self.value(v), lbool::UNDEF);
        self.flags[v].eliminated = true;
        self.stats.eliminated += 1;
        self.remove_var_order(v);
    }

    /// Mark a variable as substituted by an equivalent literal.
    pub(crate) fn mark_substituted(&mut self, v: Var) {
        debug_assert_eq!(self.value(v), lbool::UNDEF);
        self.flags[v].substituted = true;
        self.stats.substituted += 1;
        self.remove_var_order(v);
    }

    /// Whether a variable may be removed by elimination style reasoning:
    /// not frozen, not assumed, not assigned and still active.
    pub(crate) fn removable(&self, v: Var) -> bool {
        let f = self.flags[v];
        f.active()
            && !f.frozen
            && self.value(v) == lbool::UNDEF
            && !self.assumptions.iter().any(|a| a.var() == v)
    }

    /*=============================================================== compact */

    /// Fraction of internal variables without a remaining role.
    pub fn inactive_fraction(&self) -> f64 {
        let n = self.num_vars();
        if n == 0 {
            return 0.0;
        }
        let active = self.num_active();
        (n - active) as f64 / n as f64
    }

    /// Rebuild the internal variable space without eliminated, substituted
    /// and root-fixed variables. Returns per external variable what happened
    /// so the external layer can update its side of the map.
    ///
    /// Pre-condition: decision level 0, propagation complete, database
    /// simplified (no clause contains an assigned variable).
    pub fn compact(&mut self) -> Vec<(i32, CompactEvent)> {
        debug_assert_eq!(self.decision_level(), 0);
        debug_assert_eq!(self.qhead as usize, self.vars.trail.len());
        self.stats.compacts += 1;

        let old_n = self.num_vars();
        let mut events: Vec<(i32, CompactEvent)> = Vec::with_capacity(old_n as usize);
        let mut remap: VMap<Var> = VMap::new();
        let mut new_n = 0u32;

        for idx in 0..old_n {
            let v = Var::from_idx(idx);
            let ext = self.i2e[v];
            let flags = self.flags[v];
            remap.insert(v, Var::UNDEF, Var::UNDEF);
            if !flags.active() {
                events.push((ext, CompactEvent::Gone));
            } else if self.value(v) != lbool::UNDEF {
                debug_assert_eq!(self.level(v), 0);
                events.push((ext, CompactEvent::Fixed(self.value(v))));
            } else {
                let nv = Var::from_idx(new_n);
                new_n += 1;
                remap[v] = nv;
                events.push((ext, CompactEvent::Mapped(nv)));
            }
        }

        if new_n == old_n {
            // nothing to drop, keep the cheap path
            return events;
        }

        // renumber literals inside the arena
        let all: Vec<CRef> = self.clauses.iter().chain(self.learnts.iter()).copied().collect();
        for cr in all {
            let mut c = self.ca.get_mut(cr);
            for l in c.lits_mut() {
                let nv = remap[l.var()];
                debug_assert_ne!(nv, Var::UNDEF, "clause mentions a dropped variable");
                *l = Lit::new(nv, l.sign());
            }
        }

        // rebuild the per-variable tables
        let mut phase = VMap::new();
        let mut forced = VMap::new();
        let mut flags = VMap::new();
        let mut i2e = VMap::new();
        let mut activity = VMap::new();
        let mut ass = VMap::new();
        let mut vardata = VMap::new();
        let mut seen = VMap::new();
        self.watches_data.clear();

        for idx in 0..old_n {
            let v = Var::from_idx(idx);
            let nv = remap[v];
            if nv == Var::UNDEF {
                continue;
            }
            phase.insert(nv, self.phase[v], false);
            forced.insert_default(nv, self.forced[v]);
            flags.insert_default(nv, self.flags[v]);
            i2e.insert_default(nv, self.i2e[v]);
            activity.insert_default(nv, self.vars.activity[v]);
            ass.insert_default(nv, lbool::UNDEF);
            vardata.insert_default(nv, VarData::default());
            seen.insert_default(nv, Seen::Undef);
            self.watches_data.init(nv.pos_lit());
            self.watches_data.init(nv.neg_lit());
        }

        self.phase = phase;
        self.forced = forced;
        self.flags = flags;
        self.i2e = i2e;
        self.vars.activity = activity;
        self.vars.ass = ass;
        self.vars.vardata = vardata;
        self.seen = seen;
        self.vars.trail.clear();
        self.vars.trail_lim.clear();
        self.qhead = 0;
        self.next_var = Var::from_idx(new_n);
        self.simp_db_assigns = -1;

        // reattach everything
        self.order_heap_data = HeapData::new();
        for &cr in self.clauses.iter().chain(self.learnts.iter()) {
            debug_assert!(!self.ca.get_ref(cr).garbage());
        }
        let all: Vec<CRef> = self.clauses.iter().chain(self.learnts.iter()).copied().collect();
        for cr in all {
            self.attach_clause(cr);
        }
        self.rebuild_order_heap();

        info!("compact {} -> {} variables", old_n, new_n);
        events
    }

    /// Reactivate an external variable whose old image was eliminated or
    /// substituted but not yet compacted away.
    pub(crate) fn reactivate(&mut self, v: Var) {
        debug_assert!(!self.flags[v].active());
        self.flags[v].eliminated = false;
        self.flags[v].substituted = false;
        self.stats.restored += 1;
        self.insert_var_order(v);
    }

    /*=============================================================== model */

    pub fn model_value(&self, v: Var) -> lbool {
        self.model
            .get(v.idx() as usize)
            .copied()
            .unwrap_or(lbool::UNDEF)
    }
}

/// Glue (LBD) of a clause: the number of distinct decision levels among its
/// literals, computed with a stamp per level.
fn glue_of(frames: &mut Vec<u32>, frame_stamp: &mut u32, vars: &AssignState, lits: &[Lit]) -> u32 {
    *frame_stamp = frame_stamp.wrapping_add(1);
    if *frame_stamp == 0 {
        for f in frames.iter_mut() {
            *f = 0;
        }
        *frame_stamp = 1;
    }
    let stamp = *frame_stamp;
    let mut glue = 0;
    for &l in lits {
        let lvl = vars.level(l.var()) as usize;
        if lvl >= frames.len() {
            frames.resize(lvl + 1, 0);
        }
        if frames[lvl] != stamp {
            frames[lvl] = stamp;
            glue += 1;
        }
    }
    glue
}

/// What happened to an external variable's image during `compact`.
#[derive(Debug, Clone, Copy)]
pub(crate) enum CompactEvent {
    /// Still mapped, at a new internal index.
    Mapped(Var),
    /// Dropped; its positive literal has this root-level value.
    Fixed(lbool),
    /// Dropped; the value is recovered through the extension stack.
    Gone,
}

pub(crate) mod utils {
    /// Finite subsequences of the Luby sequence:
    ///
    /// > 0: 1
    /// > 1: 1 1 2
    /// > 2: 1 1 2 1 1 2 4
    pub fn luby(y: f64, mut x: i32) -> f64 {
        let mut size = 1;
        let mut seq = 0;
        while size < x + 1 {
            seq += 1;
            size = 2 * size + 1;
        }

        while size - 1 != x {
            size = (size - 1) >> 1;
            seq -= 1;
            x = x % size;
        }

        f64::powi(y, seq)
    }

    /// MiniSat style pseudo random double in [0, 1).
    #[allow(dead_code)]
    pub fn drand(seed: &mut f64) -> f64 {
        *seed *= 1389796.0;
        let q = (*seed / 2147483647.0) as i32;
        *seed -= q as f64 * 2147483647.0;
        *seed / 2147483647.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn new_internal() -> Internal {
        Internal::new(Arc::new(AtomicBool::new(false)))
    }

    #[test]
    fn test_luby_sequence() {
        let expect = [1.0, 1.0, 2.0, 1.0, 1.0, 2.0, 4.0];
        for (i, &e) in expect.iter().enumerate() {
            assert_eq!(utils::luby(2.0, i as i32), e);
        }
    }

    #[test]
    fn test_unit_propagation_chain() {
        let mut s = new_internal();
        let vars: Vec<Var> = (1..=3).map(|i| s.new_var(i)).collect();
        // (x1) (-x1 v x2) (-x2 v x3)
        let mut c = vec![vars[0].pos_lit()];
        assert!(s.add_input_clause(&mut c));
        let mut c = vec![vars[0].neg_lit(), vars[1].pos_lit()];
        assert!(s.add_input_clause(&mut c));
        let mut c = vec![vars[1].neg_lit(), vars[2].pos_lit()];
        assert!(s.add_input_clause(&mut c));
        assert!(s.propagate_toplevel());
        assert_eq!(s.value(vars[2]), lbool::TRUE);
    }

    #[test]
    fn test_conflicting_units_make_unsat() {
        let mut s = new_internal();
        let v = s.new_var(1);
        let mut c = vec![v.pos_lit()];
        assert!(s.add_input_clause(&mut c));
        let mut c = vec![v.neg_lit()];
        assert!(!s.add_input_clause(&mut c) || !s.propagate_toplevel());
        assert!(!s.ok);
    }

    #[test]
    fn test_tautology_is_dropped() {
        let mut s = new_internal();
        let v = s.new_var(1);
        let mut c = vec![v.pos_lit(), v.neg_lit()];
        assert!(s.add_input_clause(&mut c));
        assert_eq!(s.clauses.len(), 0);
        assert!(s.ok);
    }

    #[test]
    fn test_search_finds_model() {
        let mut s = new_internal();
        let x: Vec<Var> = (1..=2).map(|i| s.new_var(i)).collect();
        // (-x1 v x2) (x1 v x2) (-x1 v -x2)
        for lits in [
            vec![x[0].neg_lit(), x[1].pos_lit()],
            vec![x[0].pos_lit(), x[1].pos_lit()],
            vec![x[0].neg_lit(), x[1].neg_lit()],
        ]
        .iter()
        {
            let mut c = lits.clone();
            assert!(s.add_input_clause(&mut c));
        }
        s.opts.inprocessing = false; // keep both variables in the model
        let mut extend = ExtensionStack::new();
        let mut handles = Handles::none();
        let res = s.solve(&mut extend, &mut handles);
        assert_eq!(res, lbool::TRUE);
        assert_eq!(s.model_value(x[0]), lbool::FALSE);
        assert_eq!(s.model_value(x[1]), lbool::TRUE);
    }

    #[test]
    fn test_failed_assumptions() {
        let mut s = new_internal();
        let x: Vec<Var> = (1..=2).map(|i| s.new_var(i)).collect();
        for lits in [
            vec![x[0].neg_lit(), x[1].pos_lit()],
            vec![x[0].pos_lit(), x[1].pos_lit()],
            vec![x[0].neg_lit(), x[1].neg_lit()],
        ]
        .iter()
        {
            let mut c = lits.clone();
            assert!(s.add_input_clause(&mut c));
        }
        s.assumptions = vec![x[0].pos_lit()];
        let mut extend = ExtensionStack::new();
        let mut handles = Handles::none();
        let res = s.solve(&mut extend, &mut handles);
        assert_eq!(res, lbool::FALSE);
        // the failed set contains the negation of the assumption
        assert!(s.conflict.has(x[0].neg_lit()));
        assert!(s.ok, "still satisfiable without assumptions");
    }

    #[test]
    fn test_conflict_limit_returns_unknown() {
        let mut s = new_internal();
        // a small unsatisfiable pigeonhole-ish instance that needs conflicts
        let v: Vec<Var> = (1..=6).map(|i| s.new_var(i)).collect();
        let holes = [[0usize, 1], [2, 3], [4, 5]];
        for p in holes.iter() {
            let mut c = vec![v[p[0]].pos_lit(), v[p[1]].pos_lit()];
            assert!(s.add_input_clause(&mut c));
        }
        for h in 0..2 {
            for a in 0..3 {
                for b in (a + 1)..3 {
                    let mut c = vec![v[holes[a][h]].neg_lit(), v[holes[b][h]].neg_lit()];
                    assert!(s.add_input_clause(&mut c));
                }
            }
        }
        s.lim.conflicts = 0;
        s.opts.inprocessing = false; // only the search may decide this one
        let mut extend = ExtensionStack::new();
        let mut handles = Handles::none();
        let res = s.solve(&mut extend, &mut handles);
        assert_eq!(res, lbool::UNDEF);
    }
}
