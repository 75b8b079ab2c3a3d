//! Callback capability surface.
//!
//! The solver holds at most one handle per role; connecting a second handle
//! detaches the first. All literals crossing these interfaces are external.

/// Polled regularly during search; returning `true` terminates the solver at
/// the next checkpoint (conflict, restart top, or between inprocessing
/// passes), which then unwinds to decision level 0 and reports status 0.
pub trait Terminator {
    fn terminate(&mut self) -> bool;
}

/// Receives learned clauses as they are derived.
///
/// `learning(size)` acts as a size filter; only if it returns `true` are the
/// individual literals delivered through `learn`, terminated by a zero.
pub trait Learner {
    fn learning(&mut self, size: usize) -> bool;
    fn learn(&mut self, lit: i32);
}

/// Pull based source of external learned clauses, drained at restart
/// boundaries. Clauses must be consequences of the formula.
pub trait LearnSource {
    fn has_next_clause(&mut self) -> bool;
    fn next_clause(&mut self) -> Vec<i32>;
}

/// Visitor for the active irredundant clauses. Returning `false` aborts the
/// traversal, which then also reports `false`.
pub trait ClauseIterator {
    fn clause(&mut self, clause: &[i32]) -> bool;
}

/// Visitor for the extension (reconstruction) stack: each entry is a clause
/// together with its witness cube. Returning `false` aborts.
pub trait WitnessIterator {
    fn witness(&mut self, clause: &[i32], witness: &[i32]) -> bool;
}

/// Closures act as terminators.
impl<F: FnMut() -> bool> Terminator for F {
    fn terminate(&mut self) -> bool {
        self()
    }
}

/// A `ClauseIterator` that copies every visited clause, mostly for tests and
/// for `write_dimacs`.
#[derive(Debug, Default)]
pub struct CollectClauses {
    pub clauses: Vec<Vec<i32>>,
}

impl ClauseIterator for CollectClauses {
    fn clause(&mut self, clause: &[i32]) -> bool {
        self.clauses.push(clause.to_vec());
        true
    }
}
