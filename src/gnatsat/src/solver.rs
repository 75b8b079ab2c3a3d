/*************************************************************************************[solver.rs]
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

//! The solver facade.
//!
//! A thin, stateless surface over the external layer: it enforces the API
//! state machine, traces API calls when requested, and forwards everything
//! else. It holds no domain data beyond the current state.
//!
//! The state machine (states also reachable through `state`):
//!
//! ```text
//!     new                      INITIALIZING -> CONFIGURING
//!     set/configure/trace      CONFIGURING  -> CONFIGURING
//!     add (non zero)           VALID        -> ADDING
//!     add (zero)               VALID        -> UNKNOWN
//!     assume                   READY        -> UNKNOWN
//!     solve                    READY        -> (SOLVING) -> UNKNOWN
//!                                              | SATISFIED | UNSATISFIED
//!     terminate (async)        SOLVING      -> UNKNOWN
//!     drop                     VALID        -> DELETING
//! ```
//!
//! Every public operation asserts its precondition and aborts with an
//! "API contract violation" diagnostic when called from a forbidden state.

use crate::callbacks::{
    ClauseIterator, CollectClauses, LearnSource, Learner, Terminator, WitnessIterator,
};
use crate::cubes;
use crate::dimacs;
use crate::drat::{Proof, ProofFormat};
use crate::external::External;
use crate::internal::{Limits, SearchOpts, Stats};
use crate::options::{self, Options};
use crate::types::lbool;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// `solve` result for a satisfiable formula.
pub const SATISFIABLE: i32 = 10;
/// `solve` result under unsatisfiable constraints.
pub const UNSATISFIABLE: i32 = 20;
/// `solve` result when a limit was hit or the solver was terminated.
pub const UNKNOWN: i32 = 0;

/// API states. `READY`, `VALID` and `INVALID` are derived predicates on the
/// state, see [`State::ready`] and [`State::valid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Initializing,
    Configuring,
    Unknown,
    Adding,
    Solving,
    Satisfied,
    Unsatisfied,
    Deleting,
}

impl State {
    /// CONFIGURING | UNKNOWN | SATISFIED | UNSATISFIED
    pub fn ready(self) -> bool {
        matches!(
            self,
            State::Configuring | State::Unknown | State::Satisfied | State::Unsatisfied
        )
    }
    /// READY | ADDING
    pub fn valid(self) -> bool {
        self.ready() || self == State::Adding
    }
}

/// Snapshot of the headline search statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct Statistics {
    pub conflicts: i64,
    pub decisions: i64,
    pub propagations: i64,
    pub restarts: i64,
}

/// Cubes produced by [`Solver::generate_cubes`], plus the status observed
/// while generating (10/20 when the formula got decided, 0 otherwise).
#[derive(Debug)]
pub struct CubesWithStatus {
    pub status: i32,
    pub cubes: Vec<Vec<i32>>,
}

struct ApiTrace {
    out: Box<dyn Write>,
}

impl ApiTrace {
    fn line(&mut self, text: &str) {
        // the trace is flushed per call so that it survives an abort
        let _ = writeln!(self.out, "{}", text);
        let _ = self.out.flush();
    }
}

// Only the first constructed instance picks up the environment variable.
static ENV_TRACE_TAKEN: AtomicBool = AtomicBool::new(false);

/// The incremental SAT solver.
///
/// ```
/// use gnatsat::Solver;
/// let mut solver = Solver::new();
/// for &lit in &[-1, 2, 0, 1, 2, 0, -1, -2, 0] {
///     solver.add(lit);
/// }
/// assert_eq!(solver.solve(), 10);
/// assert_eq!(solver.val(2), 2);
/// ```
pub struct Solver {
    state: State,
    external: External,
    opts: Options,
    pending_limits: Limits,
    terminate_flag: Arc<AtomicBool>,
    trace: Option<ApiTrace>,
    started: Instant,
}

macro_rules! require {
    ($self:ident, $pred:expr, $call:expr) => {
        if !($pred) {
            panic!(
                "API contract violation: '{}' called in state {:?}",
                $call, $self.state
            );
        }
    };
}

macro_rules! require_valid_lit {
    ($self:ident, $lit:expr, $call:expr) => {
        require!($self, $lit != 0 && $lit != i32::MIN, $call);
    };
}

impl Solver {
    pub fn new() -> Self {
        let external = External::new();
        let terminate_flag = external.internal.terminate_flag();
        let mut solver = Solver {
            state: State::Initializing,
            external,
            opts: Options::new(),
            pending_limits: Limits::default(),
            terminate_flag,
            trace: None,
            started: Instant::now(),
        };
        if !ENV_TRACE_TAKEN.swap(true, Ordering::SeqCst) {
            if let Ok(path) = std::env::var("CADICAL_API_TRACE") {
                if let Ok(file) = File::create(&path) {
                    solver.trace = Some(ApiTrace {
                        out: Box::new(BufWriter::new(file)),
                    });
                }
            }
        }
        solver.trace_call("init");
        solver.state = State::Configuring;
        solver
    }

    /// Name of this library.
    pub fn signature() -> &'static str {
        concat!("gnatsat-", env!("CARGO_PKG_VERSION"))
    }

    /// Version string.
    pub fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn trace_call(&mut self, text: &str) {
        if let Some(trace) = &mut self.trace {
            trace.line(text);
        }
    }

    /// Record the call to a file in replayable form. The sink stays owned
    /// by the caller conceptually; it is only flushed, never closed early.
    pub fn trace_api_calls(&mut self, out: Box<dyn Write>) {
        require!(self, self.state.valid(), "trace_api_calls");
        self.trace = Some(ApiTrace { out });
        self.trace_call("init");
    }

    /// Leaving SATISFIED or UNSATISFIED clears the model / failed set.
    fn transition_to_unknown(&mut self) {
        if self.state == State::Satisfied || self.state == State::Unsatisfied {
            self.external.reset_assumptions();
        }
        self.state = State::Unknown;
    }

    /*================================================================ ipasir */

    /// Add a literal to the open clause, zero terminates the clause.
    pub fn add(&mut self, lit: i32) {
        self.trace_call(&format!("add {}", lit));
        require!(self, self.state.valid(), "add");
        require!(self, lit != i32::MIN, "add");
        if lit != 0 {
            if self.state != State::Adding {
                self.transition_to_unknown();
                self.state = State::Adding;
            }
            self.external.add(lit);
        } else {
            self.external.add(0);
            self.transition_to_unknown();
        }
    }

    /// Assume a literal for the next solve. Assumptions are reset when
    /// `solve`, `simplify` or `lookahead` return.
    pub fn assume(&mut self, lit: i32) {
        self.trace_call(&format!("assume {}", lit));
        require!(self, self.state.ready(), "assume");
        require_valid_lit!(self, lit, "assume");
        self.transition_to_unknown();
        self.external.assume(lit);
    }

    /// Solve the formula under the current assumptions. Returns 10
    /// (satisfiable), 20 (unsatisfiable) or 0 (limit or termination).
    pub fn solve(&mut self) -> i32 {
        self.trace_call("solve");
        require!(self, self.state.ready(), "solve");
        self.transition_to_unknown();
        self.state = State::Solving;
        self.install_options();
        let status = self.external.solve();
        self.state = match status {
            SATISFIABLE => State::Satisfied,
            UNSATISFIABLE => State::Unsatisfied,
            _ => State::Unknown,
        };
        self.pending_limits = Limits::default();
        status
    }

    /// Value of `lit` in the model: `lit` when true, `-lit` when false.
    pub fn val(&mut self, lit: i32) -> i32 {
        self.trace_call(&format!("val {}", lit));
        require!(self, self.state == State::Satisfied, "val");
        require_valid_lit!(self, lit, "val");
        self.external.val(lit)
    }

    /// Whether `lit` is in the failed assumption set (the core need not be
    /// minimal).
    pub fn failed(&mut self, lit: i32) -> bool {
        self.trace_call(&format!("failed {}", lit));
        require!(self, self.state == State::Unsatisfied, "failed");
        require_valid_lit!(self, lit, "failed");
        self.external.failed(lit)
    }

    /// Connect the termination callback; a second connect detaches the
    /// first.
    pub fn connect_terminator(&mut self, terminator: Box<dyn Terminator>) {
        require!(self, self.state.valid(), "connect_terminator");
        self.external.terminator = Some(terminator);
    }

    pub fn disconnect_terminator(&mut self) {
        require!(self, self.state.valid(), "disconnect_terminator");
        self.external.terminator = None;
    }

    /// Connect the learned-clause export callback.
    pub fn connect_learner(&mut self, learner: Box<dyn Learner>) {
        require!(self, self.state.valid(), "connect_learner");
        self.external.learner = Some(learner);
    }

    pub fn disconnect_learner(&mut self) {
        require!(self, self.state.valid(), "disconnect_learner");
        self.external.learner = None;
    }

    /// Connect a pull based source of external learned clauses.
    pub fn connect_learn_source(&mut self, source: Box<dyn LearnSource>) {
        require!(self, self.state.valid(), "connect_learn_source");
        self.external.source = Some(source);
    }

    pub fn disconnect_learn_source(&mut self) {
        require!(self, self.state.valid(), "disconnect_learn_source");
        self.external.source = None;
    }

    /// Headline counters.
    pub fn get_stats(&self) -> Statistics {
        let s = &self.external.internal.stats;
        Statistics {
            conflicts: s.conflicts as i64,
            decisions: s.decisions as i64,
            propagations: s.propagations as i64,
            restarts: s.restarts as i64,
        }
    }

    /*============================================================ splitting */

    /// Determine a good splitting literal; zero when the formula is decided
    /// (check `state` afterwards) or empty. Resets assumptions like `solve`.
    pub fn lookahead(&mut self) -> i32 {
        self.trace_call("lookahead");
        require!(self, self.state.ready(), "lookahead");
        self.transition_to_unknown();
        self.install_options();
        let lit = cubes::lookahead(&mut self.external.internal);
        let result = if lit == crate::types::Lit::UNDEF {
            0
        } else {
            self.external.internal.externalize(lit)
        };
        if !self.external.internal.ok {
            self.state = State::Unsatisfied;
        } else {
            self.state = State::Unknown;
        }
        self.external.reset_assumptions();
        result
    }

    /// Generate at most `max` disjoint cubes of depth at least `min_depth`
    /// for parallel splitting. Resets assumptions and the failed set.
    pub fn generate_cubes(&mut self, max: i32, min_depth: i32) -> CubesWithStatus {
        self.trace_call(&format!("generate_cubes {} {}", max, min_depth));
        require!(self, self.state.ready(), "generate_cubes");
        self.transition_to_unknown();
        self.install_options();
        let set = cubes::generate_cubes(
            &mut self.external.internal,
            max.max(1) as usize,
            min_depth.max(0) as usize,
        );
        self.state = match set.status {
            SATISFIABLE => State::Satisfied,
            UNSATISFIABLE => State::Unsatisfied,
            _ => State::Unknown,
        };
        if self.state == State::Satisfied {
            // the sat status came from saturated cubes, not from a model
            self.state = State::Unknown;
        }
        self.external.reset_assumptions();
        CubesWithStatus {
            status: set.status,
            cubes: set.cubes,
        }
    }

    /// Remove all assumptions, also clearing the failed set.
    pub fn reset_assumptions(&mut self) {
        self.trace_call("reset_assumptions");
        require!(self, self.state.ready(), "reset_assumptions");
        self.external.reset_assumptions();
        self.transition_to_unknown();
    }

    /*=========================================================== inspection */

    /// Current state of the solver.
    pub fn state(&self) -> State {
        self.state
    }

    /// Competition style status: 10 after satisfiable, 20 after
    /// unsatisfiable, 0 otherwise.
    pub fn status(&self) -> i32 {
        match self.state {
            State::Satisfied => SATISFIABLE,
            State::Unsatisfied => UNSATISFIABLE,
            _ => UNKNOWN,
        }
    }

    /// Maximum external variable index referenced so far.
    pub fn vars(&self) -> i32 {
        self.external.max_var
    }

    /// Initialize at least `min_max_var` variables up front.
    pub fn reserve(&mut self, min_max_var: i32) {
        self.trace_call(&format!("reserve {}", min_max_var));
        require!(self, self.state.ready(), "reserve");
        self.transition_to_unknown();
        self.external.reserve(min_max_var);
    }

    /// Number of active variables (neither eliminated nor fixed).
    pub fn active(&self) -> i32 {
        self.external.internal.num_active() as i32
    }

    /// Number of active redundant clauses.
    pub fn redundant(&self) -> i64 {
        self.external.internal.learnts.len() as i64
    }

    /// Number of active irredundant clauses.
    pub fn irredundant(&self) -> i64 {
        self.external.internal.clauses.len() as i64
    }

    /// Root level implication status of `lit`: 1 implied, -1 negation
    /// implied, 0 open.
    pub fn fixed(&self, lit: i32) -> i32 {
        require!(self, self.state.valid(), "fixed");
        require_valid_lit!(self, lit, "fixed");
        self.external.fixed(lit)
    }

    /*=========================================================== simplify */

    /// Run preprocessing only (default three rounds through `limit`),
    /// without CDCL search. Same result codes and resets as `solve`.
    pub fn simplify(&mut self, rounds: i32) -> i32 {
        self.trace_call(&format!("simplify {}", rounds));
        require!(self, self.state.ready(), "simplify");
        require!(self, rounds >= 0, "simplify");
        self.transition_to_unknown();
        self.state = State::Solving;
        self.install_options();
        let status = self.external.simplify(rounds as i64);
        self.state = match status {
            SATISFIABLE => State::Satisfied,
            UNSATISFIABLE => State::Unsatisfied,
            _ => State::Unknown,
        };
        self.pending_limits = Limits::default();
        status
    }

    /// Force termination asynchronously; safe from other threads and signal
    /// handlers. Only this flag is touched.
    pub fn terminate(&self) {
        self.terminate_flag.store(true, Ordering::Relaxed);
    }

    /*======================================================= freeze / phase */

    pub fn frozen(&self, lit: i32) -> bool {
        require!(self, self.state.valid(), "frozen");
        require_valid_lit!(self, lit, "frozen");
        self.external.frozen(lit)
    }

    /// Protect the variable of `lit` from being eliminated until molten.
    pub fn freeze(&mut self, lit: i32) {
        self.trace_call(&format!("freeze {}", lit));
        require!(self, self.state.valid(), "freeze");
        require_valid_lit!(self, lit, "freeze");
        self.external.freeze(lit);
    }

    pub fn melt(&mut self, lit: i32) {
        self.trace_call(&format!("melt {}", lit));
        require!(self, self.state.valid(), "melt");
        require_valid_lit!(self, lit, "melt");
        require!(self, self.external.frozen(lit), "melt");
        self.external.melt(lit);
    }

    /// Force the decision phase of the variable of `lit` towards `lit`.
    pub fn phase(&mut self, lit: i32) {
        self.trace_call(&format!("phase {}", lit));
        require!(self, self.state.valid(), "phase");
        require_valid_lit!(self, lit, "phase");
        self.external.phase(lit);
    }

    pub fn unphase(&mut self, lit: i32) {
        self.trace_call(&format!("unphase {}", lit));
        require!(self, self.state.valid(), "unphase");
        require_valid_lit!(self, lit, "unphase");
        self.external.unphase(lit);
    }

    /*=============================================================== options */

    pub fn is_valid_option(name: &str) -> bool {
        options::is_valid_option(name)
    }

    pub fn is_preprocessing_option(name: &str) -> bool {
        options::is_preprocessing_option(name)
    }

    pub fn is_valid_long_option(arg: &str) -> bool {
        options::is_valid_long_option(arg)
    }

    pub fn is_valid_configuration(name: &str) -> bool {
        options::is_valid_configuration(name)
    }

    /// Current value of option `name`, zero for unknown names.
    pub fn get(&self, name: &str) -> f64 {
        self.opts.get(name)
    }

    /// Set option `name`, clamping the value into its range. Only legal
    /// while configuring.
    pub fn set(&mut self, name: &str, val: f64) -> bool {
        self.trace_call(&format!("set {} {}", name, val));
        require!(self, self.state == State::Configuring, "set");
        self.opts.set(name, val)
    }

    /// Accept `--<name>`, `--no-<name>` and `--<name>=<val>` forms.
    pub fn set_long_option(&mut self, arg: &str) -> bool {
        self.trace_call(&format!("set_long_option {}", arg));
        require!(self, self.state == State::Configuring, "set_long_option");
        self.opts.set_long_option(arg)
    }

    /// Bulk-apply a named preset ("default", "plain", "sat", "unsat").
    pub fn configure(&mut self, preset: &str) -> bool {
        self.trace_call(&format!("configure {}", preset));
        require!(self, self.state == State::Configuring, "configure");
        self.opts.configure(preset)
    }

    /// Scale pre/inprocessing effort by `10^clamp(val, 0, 9)`.
    pub fn optimize(&mut self, val: i32) {
        self.trace_call(&format!("optimize {}", val));
        require!(self, self.state.ready(), "optimize");
        self.opts.optimize(val);
    }

    /// Set a search limit for the next `solve`: "conflicts", "decisions",
    /// "preprocessing" or "localsearch".
    pub fn limit(&mut self, name: &str, val: i32) -> bool {
        self.trace_call(&format!("limit {} {}", name, val));
        require!(self, self.state.ready(), "limit");
        match name {
            "conflicts" => self.pending_limits.conflicts = val as i64,
            "decisions" => self.pending_limits.decisions = val as i64,
            "preprocessing" => self.pending_limits.preprocessing = val.max(0) as i64,
            "localsearch" => self.pending_limits.localsearch = val.max(0) as i64,
            _ => return false,
        }
        true
    }

    pub fn is_valid_limit(name: &str) -> bool {
        matches!(
            name,
            "conflicts" | "decisions" | "preprocessing" | "localsearch"
        )
    }

    fn install_options(&mut self) {
        self.external.internal.opts = SearchOpts::from_registry(&self.opts);
        self.external.internal.lim = self.pending_limits;
    }

    /*================================================================ proofs */

    /// Trace a DRAT proof into a caller supplied sink. Must be enabled
    /// before clauses are added.
    pub fn trace_proof(&mut self, out: Box<dyn Write>) -> bool {
        self.trace_call("trace_proof");
        require!(self, self.state == State::Configuring, "trace_proof");
        let format = self.proof_format();
        self.external.internal.proof = Some(Proof::from_writer(out, format));
        true
    }

    /// Open `path` and trace a DRAT proof into it; the file is owned and
    /// closed by the solver.
    pub fn trace_proof_path(&mut self, path: &str) -> Result<(), String> {
        self.trace_call(&format!("trace_proof {}", path));
        require!(self, self.state == State::Configuring, "trace_proof");
        let format = self.proof_format();
        match Proof::from_path(path, format) {
            Ok(proof) => {
                self.external.internal.proof = Some(proof);
                Ok(())
            }
            Err(err) => Err(format!("could not open proof file '{}': {}", path, err)),
        }
    }

    fn proof_format(&self) -> ProofFormat {
        if self.opts.get_bool("binary") {
            ProofFormat::Binary
        } else {
            ProofFormat::Ascii
        }
    }

    /// Flush the proof trace file.
    pub fn flush_proof_trace(&mut self) {
        self.trace_call("flush_proof_trace");
        require!(self, self.state.valid(), "flush_proof_trace");
        if let Some(proof) = &mut self.external.internal.proof {
            proof.flush();
        }
    }

    /// Close the proof trace early. A sink failure anywhere during the run
    /// surfaces here.
    pub fn close_proof_trace(&mut self) -> Result<(), String> {
        self.trace_call("close_proof_trace");
        require!(self, self.state.valid(), "close_proof_trace");
        match self.external.internal.proof.take() {
            None => Ok(()),
            Some(proof) => proof.close().map_err(|e| e.to_string()),
        }
    }

    /*============================================================ reporting */

    /// Print statistics, `c ` prefixed.
    pub fn statistics(&self) {
        require!(self, self.state != State::Deleting, "statistics");
        let s: &Stats = &self.external.internal.stats;
        println!("c --- [ statistics ] ---");
        println!("c original:      {:12}", self.external.num_original);
        println!("c conflicts:     {:12}", s.conflicts);
        println!("c decisions:     {:12}", s.decisions);
        println!("c propagations:  {:12}", s.propagations);
        println!("c restarts:      {:12}", s.restarts);
        println!("c reductions:    {:12}", s.reductions);
        println!("c compacts:      {:12}", s.compacts);
        println!("c learned:       {:12}   ({} units)", s.learned, s.learned_units);
        println!(
            "c minimized:     {:12}   literals in learned clauses",
            s.minimized_literals
        );
        println!("c fixed:         {:12}", s.fixed);
        println!("c eliminated:    {:12}", s.eliminated);
        println!("c substituted:   {:12}", s.substituted);
        println!("c blocked:       {:12}", s.blocked);
        println!("c subsumed:      {:12}", s.subsumed);
        println!("c strengthened:  {:12}", s.strengthened);
        println!("c vivified:      {:12}", s.vivified);
        println!("c failed:        {:12}   literals probed {}", s.failed_literals, s.probed);
        println!("c restored:      {:12}", s.restored);
    }

    /// Print resource usage.
    pub fn resources(&self) {
        require!(self, self.state != State::Deleting, "resources");
        let elapsed = self.started.elapsed();
        println!("c --- [ resources ] ---");
        println!(
            "c total real time:  {:10}.{:02} s",
            elapsed.as_secs(),
            elapsed.subsec_millis() / 10
        );
        println!(
            "c clause arena:     {:10} bytes",
            self.external.internal.ca.len() * crate::arena::ClauseArena::UNIT_SIZE as usize
        );
        println!("c variables:        {:10}", self.vars());
    }

    /// Print the option table with current values.
    pub fn options(&self) {
        require!(self, self.state.valid(), "options");
        println!("c --- [ options ] ---");
        for (rec, val) in self.opts.iter() {
            println!(
                "c --{}={} ({}, default {})",
                rec.name, val, rec.category, rec.default
            );
        }
    }

    /// Print usage information for the long options.
    pub fn usage() {
        println!("c usage: --<name>, --no-<name> or --<name>=<value> with");
        for rec in options::OPTIONS.iter() {
            println!("c   --{:<16} {}", rec.name, rec.help);
        }
    }

    /// Print the known configuration presets.
    pub fn configurations() {
        for (name, forced) in options::CONFIGURATIONS.iter() {
            println!("c --{:<10} ({} forced options)", name, forced.len());
        }
    }

    /// Print build information.
    pub fn build(prefix: &str) {
        println!("{}{}", prefix, Self::signature());
        println!("{}compiled with rustc", prefix);
    }

    /*=========================================================== traversal */

    /// Visit all active irredundant clauses; `false` from the visitor
    /// aborts and is returned.
    pub fn traverse_clauses(&self, it: &mut dyn ClauseIterator) -> bool {
        require!(self, self.state.valid(), "traverse_clauses");
        self.external.traverse_clauses(it)
    }

    /// Visit the extension stack oldest entry first.
    pub fn traverse_witnesses_forward(&self, it: &mut dyn WitnessIterator) -> bool {
        require!(self, self.state.valid(), "traverse_witnesses_forward");
        self.external.traverse_witnesses_forward(it)
    }

    /// Visit the extension stack newest entry first.
    pub fn traverse_witnesses_backward(&self, it: &mut dyn WitnessIterator) -> bool {
        require!(self, self.state.valid(), "traverse_witnesses_backward");
        self.external.traverse_witnesses_backward(it)
    }

    /*=============================================================== dimacs */

    /// Read a DIMACS file. Returns the maximum variable, or a message
    /// describing the parse failure.
    pub fn read_dimacs(&mut self, path: &str, strict: i32) -> Result<i32, String> {
        require!(self, self.state.valid(), "read_dimacs");
        let file = File::open(path).map_err(|e| format!("could not open '{}': {}", path, e))?;
        let mut reader = BufReader::new(file);
        self.read_dimacs_from(&mut reader, strict)
    }

    /// Read DIMACS from an open reader.
    pub fn read_dimacs_from<R: BufRead>(
        &mut self,
        reader: &mut R,
        strict: i32,
    ) -> Result<i32, String> {
        require!(self, self.state.valid(), "read_dimacs");
        let external = &mut self.external;
        let summary = dimacs::parse(reader, strict, false, &mut |lit| external.add(lit))
            .map_err(|e| e.to_string())?;
        self.transition_to_unknown();
        Ok(summary.vars)
    }

    /// Read DIMACS or INCCNF; cubes of `a` lines land in `cubes`, zero
    /// terminated, and `incremental` reports which format was found.
    pub fn read_dimacs_incremental<R: BufRead>(
        &mut self,
        reader: &mut R,
        strict: i32,
        incremental: &mut bool,
        cubes: &mut Vec<i32>,
    ) -> Result<i32, String> {
        require!(self, self.state.valid(), "read_dimacs");
        let external = &mut self.external;
        let summary = dimacs::parse(reader, strict, true, &mut |lit| external.add(lit))
            .map_err(|e| e.to_string())?;
        *incremental = summary.incremental;
        cubes.extend_from_slice(&summary.cubes);
        self.transition_to_unknown();
        Ok(summary.vars)
    }

    /// Write the current irredundant clauses and derived units in DIMACS.
    /// `min_max_var` is a lower bound for the header variable count.
    pub fn write_dimacs(&self, path: &str, min_max_var: i32) -> Result<(), String> {
        require!(self, self.state.valid(), "write_dimacs");
        let file = File::create(path).map_err(|e| format!("could not write '{}': {}", path, e))?;
        let mut out = BufWriter::new(file);
        self.write_dimacs_to(&mut out, min_max_var)
            .map_err(|e| e.to_string())
    }

    /// Write DIMACS to an open writer.
    pub fn write_dimacs_to<W: Write>(&self, out: &mut W, min_max_var: i32) -> io::Result<()> {
        let mut clauses: Vec<Vec<i32>> = vec![];
        if !self.external.internal.ok {
            clauses.push(vec![]);
        } else {
            for unit in self.external.root_units_external() {
                clauses.push(vec![unit]);
            }
            let mut collect = CollectClauses::default();
            self.external.traverse_clauses(&mut collect);
            for clause in collect.clauses {
                // frozen units were already covered by the root units
                if clause.len() != 1 {
                    clauses.push(clause);
                }
            }
        }
        let max_var = self.external.max_var.max(min_max_var);
        dimacs::write(out, max_var, &clauses)
    }

    /// Write the extension stack, one `<witness> 0 <clause> 0` pair per
    /// line.
    pub fn write_extension(&self, path: &str) -> Result<(), String> {
        require!(self, self.state.valid(), "write_extension");
        let file = File::create(path).map_err(|e| format!("could not write '{}': {}", path, e))?;
        let mut out = BufWriter::new(file);
        for (witness, clause) in self.external.extend.iter_forward() {
            let mut line = String::new();
            for w in witness {
                line.push_str(&format!("{} ", w));
            }
            line.push_str("0 ");
            for c in clause {
                line.push_str(&format!("{} ", c));
            }
            line.push('0');
            writeln!(out, "{}", line).map_err(|e| e.to_string())?;
        }
        out.flush().map_err(|e| e.to_string())
    }

    /// Read a solution in competition format and check it satisfies the
    /// current irredundant clauses; for debugging and testing.
    pub fn read_solution(&mut self, path: &str) -> Result<(), String> {
        require!(self, self.state.valid(), "read_solution");
        let file = File::open(path).map_err(|e| format!("could not open '{}': {}", path, e))?;
        let mut reader = BufReader::new(file);
        let lits = dimacs::parse_solution(&mut reader).map_err(|e| e.to_string())?;
        let mut vals: Vec<lbool> = vec![lbool::UNDEF; (self.vars() + 1) as usize];
        for lit in lits {
            let idx = lit.unsigned_abs() as usize;
            if idx < vals.len() {
                vals[idx] = lbool::new(lit > 0);
            }
        }
        struct Check<'a> {
            vals: &'a [lbool],
            broken: Option<Vec<i32>>,
        }
        impl<'a> ClauseIterator for Check<'a> {
            fn clause(&mut self, clause: &[i32]) -> bool {
                let sat = clause.iter().any(|&l| {
                    let idx = l.unsigned_abs() as usize;
                    idx < self.vals.len() && (self.vals[idx] ^ (l < 0)) == lbool::TRUE
                });
                if !sat {
                    self.broken = Some(clause.to_vec());
                }
                sat
            }
        }
        let mut check = Check {
            vals: &vals,
            broken: None,
        };
        if self.external.traverse_clauses(&mut check) {
            Ok(())
        } else {
            Err(format!(
                "solution does not satisfy clause {:?}",
                check.broken.unwrap_or_default()
            ))
        }
    }
}

impl Default for Solver {
    fn default() -> Self {
        Solver::new()
    }
}

impl Drop for Solver {
    fn drop(&mut self) {
        self.state = State::Deleting;
        if let Some(proof) = self.external.internal.proof.take() {
            let _ = proof.close();
        }
        if let Some(trace) = &mut self.trace {
            trace.line("reset");
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_state_machine_happy_path() {
        let mut s = Solver::new();
        assert_eq!(s.state(), State::Configuring);
        s.add(1);
        assert_eq!(s.state(), State::Adding);
        s.add(0);
        assert_eq!(s.state(), State::Unknown);
        assert_eq!(s.solve(), SATISFIABLE);
        assert_eq!(s.state(), State::Satisfied);
        assert_eq!(s.status(), 10);
        s.assume(-1);
        assert_eq!(s.state(), State::Unknown);
        assert_eq!(s.solve(), UNSATISFIABLE);
        assert_eq!(s.state(), State::Unsatisfied);
    }

    #[test]
    #[should_panic(expected = "API contract violation")]
    fn test_val_outside_satisfied_aborts() {
        let mut s = Solver::new();
        s.add(1);
        s.add(0);
        s.val(1);
    }

    #[test]
    #[should_panic(expected = "API contract violation")]
    fn test_failed_outside_unsatisfied_aborts() {
        let mut s = Solver::new();
        s.add(1);
        s.add(0);
        s.solve();
        s.failed(1);
    }

    #[test]
    #[should_panic(expected = "API contract violation")]
    fn test_assume_while_adding_aborts() {
        let mut s = Solver::new();
        s.add(1);
        s.assume(2);
    }

    #[test]
    #[should_panic(expected = "API contract violation")]
    fn test_int_min_literal_aborts() {
        let mut s = Solver::new();
        s.add(i32::MIN);
    }

    #[test]
    #[should_panic(expected = "API contract violation")]
    fn test_set_after_adding_aborts() {
        let mut s = Solver::new();
        s.add(1);
        s.add(0);
        s.set("elim", 0.0);
    }

    #[test]
    #[should_panic(expected = "API contract violation")]
    fn test_melt_unfrozen_aborts() {
        let mut s = Solver::new();
        s.melt(1);
    }
}
