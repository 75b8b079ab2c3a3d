//! End to end tests of the solver facade: the IPASIR style workflow,
//! assumption cores, proofs, DIMACS round trips and incremental reuse.

use gnatsat::{
    ClauseIterator, CollectClauses, LearnSource, Learner, Solver, State, WitnessIterator,
    SATISFIABLE, UNKNOWN, UNSATISFIABLE,
};
use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};

fn add_clause(solver: &mut Solver, lits: &[i32]) {
    for &l in lits {
        solver.add(l);
    }
    solver.add(0);
}

/// The three clause example used throughout: T=1, S=2.
fn three_clause_solver() -> Solver {
    let mut solver = Solver::new();
    add_clause(&mut solver, &[-1, 2]);
    add_clause(&mut solver, &[1, 2]);
    add_clause(&mut solver, &[-1, -2]);
    solver
}

#[test]
fn test_basic_sat_model() {
    let mut solver = three_clause_solver();
    assert_eq!(solver.solve(), SATISFIABLE);
    assert!(solver.val(1) < 0, "T must be false in every model");
    assert!(solver.val(2) > 0, "S must be true in every model");
}

#[test]
fn test_failed_assumption_core() {
    let mut solver = three_clause_solver();
    solver.assume(1);
    assert_eq!(solver.solve(), UNSATISFIABLE);
    assert!(solver.failed(1));
    assert!(!solver.failed(2));
}

#[test]
fn test_second_assumption_core_replaces_first() {
    let mut solver = three_clause_solver();
    solver.assume(1);
    assert_eq!(solver.solve(), UNSATISFIABLE);
    solver.assume(-2);
    assert_eq!(solver.solve(), UNSATISFIABLE);
    assert!(!solver.failed(1));
    assert!(solver.failed(-2));
}

#[derive(Clone, Default)]
struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_empty_clause_traces_single_addition() {
    let sink = SharedSink::default();
    let mut solver = Solver::new();
    assert!(solver.trace_proof(Box::new(sink.clone())));
    solver.add(0); // the empty clause
    assert_eq!(solver.solve(), UNSATISFIABLE);
    solver.flush_proof_trace();
    let text = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
    assert_eq!(text, "0\n");
}

#[test]
fn test_tautological_clause_is_satisfiable() {
    let mut solver = Solver::new();
    add_clause(&mut solver, &[1, -1]);
    assert_eq!(solver.solve(), SATISFIABLE);
    let v = solver.val(1);
    assert!(v == 1 || v == -1);
}

#[test]
fn test_long_implication_chain_assumption_core() {
    let mut solver = Solver::new();
    solver.reserve(1000);
    for i in 1..1000 {
        add_clause(&mut solver, &[-i, i + 1]);
    }
    solver.assume(1);
    solver.assume(-1000);
    assert_eq!(solver.solve(), UNSATISFIABLE);
    assert!(solver.failed(1));
    assert!(solver.failed(-1000));
}

#[test]
fn test_solve_is_idempotent() {
    let mut solver = three_clause_solver();
    let first = solver.solve();
    let second = solver.solve();
    assert_eq!(first, second);
}

#[test]
fn test_assumption_independence() {
    let mut solver = three_clause_solver();
    solver.assume(1);
    assert_eq!(solver.solve(), UNSATISFIABLE);
    // assumptions were cleared, the formula itself is satisfiable
    assert_eq!(solver.solve(), SATISFIABLE);
}

fn pigeonhole(solver: &mut Solver, holes: i32) {
    // holes+1 pigeons into `holes` holes; variable p*holes + h + 1
    let pigeons = holes + 1;
    let var = |p: i32, h: i32| p * holes + h + 1;
    for p in 0..pigeons {
        let clause: Vec<i32> = (0..holes).map(|h| var(p, h)).collect();
        for &l in &clause {
            solver.add(l);
        }
        solver.add(0);
    }
    for h in 0..holes {
        for p in 0..pigeons {
            for q in (p + 1)..pigeons {
                add_clause(solver, &[-var(p, h), -var(q, h)]);
            }
        }
    }
}

#[test]
fn test_unsat_refutation_ends_with_empty_clause() {
    let sink = SharedSink::default();
    let mut solver = Solver::new();
    assert!(solver.trace_proof(Box::new(sink.clone())));
    pigeonhole(&mut solver, 3);
    assert_eq!(solver.solve(), UNSATISFIABLE);
    solver.flush_proof_trace();
    let text = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
    assert!(!text.is_empty());
    let last = text.lines().rev().find(|l| !l.starts_with('d')).unwrap();
    assert_eq!(last, "0", "refutation terminates with the empty clause");
}

#[test]
fn test_conflict_limit_returns_unknown() {
    let mut solver = Solver::new();
    // keep inprocessing from deciding the instance without conflicts
    assert!(solver.configure("plain"));
    pigeonhole(&mut solver, 4);
    assert!(solver.limit("conflicts", 1));
    assert_eq!(solver.solve(), UNKNOWN);
    assert_eq!(solver.state(), State::Unknown);
    // the limit is spent, a plain solve decides the instance
    assert_eq!(solver.solve(), UNSATISFIABLE);
}

#[test]
fn test_terminator_stops_search() {
    let mut solver = Solver::new();
    pigeonhole(&mut solver, 5);
    solver.connect_terminator(Box::new(|| true));
    assert_eq!(solver.solve(), UNKNOWN);
    solver.disconnect_terminator();
    assert_eq!(solver.solve(), UNSATISFIABLE);
}

#[test]
fn test_terminate_before_solve() {
    let mut solver = Solver::new();
    pigeonhole(&mut solver, 5);
    // `terminate` is asynchronous; the solve call itself resets the flag,
    // so request termination from a connected callback instead and check
    // the flag interplay through repeated solving
    solver.connect_terminator(Box::new(|| true));
    assert_eq!(solver.solve(), UNKNOWN);
}

#[test]
fn test_model_satisfies_every_clause() {
    let mut solver = Solver::new();
    // a satisfiable random-ish instance exercising inprocessing
    let clauses: Vec<Vec<i32>> = vec![
        vec![1, 2, 3],
        vec![-1, 4],
        vec![-2, 5],
        vec![-3, -4, 6],
        vec![-5, 7],
        vec![-6, -7, 8],
        vec![2, -8, 9],
        vec![-9, 10],
        vec![1, -10, -7],
        vec![3, 9, -4],
    ];
    for c in &clauses {
        add_clause(&mut solver, c);
    }
    assert_eq!(solver.solve(), SATISFIABLE);
    for c in &clauses {
        assert!(
            c.iter().any(|&l| solver.val(l) == l),
            "model must satisfy {:?}",
            c
        );
    }
}

#[test]
fn test_traversal_plus_witnesses_covers_original_formula() {
    let mut solver = Solver::new();
    let clauses: Vec<Vec<i32>> = vec![
        vec![1, 2],
        vec![-1, 3],
        vec![-2, -3, 4],
        vec![2, 3, -4],
        vec![5, 6],
    ];
    for c in &clauses {
        add_clause(&mut solver, c);
    }
    assert_eq!(solver.solve(), SATISFIABLE);

    // replaying traversed clauses and witness entries against the model
    // of the remaining formula must satisfy the original clauses
    let mut vals = vec![0i32; 7];
    for v in 1..=6 {
        vals[v as usize] = solver.val(v).signum();
    }

    struct CheckAll {
        vals: Vec<i32>,
    }
    impl ClauseIterator for CheckAll {
        fn clause(&mut self, clause: &[i32]) -> bool {
            clause.is_empty()
                || clause
                    .iter()
                    .any(|&l| self.vals[l.unsigned_abs() as usize] * l.signum() > 0)
        }
    }
    let mut check = CheckAll { vals: vals.clone() };
    assert!(solver.traverse_clauses(&mut check));

    struct CountWitnesses {
        n: usize,
    }
    impl WitnessIterator for CountWitnesses {
        fn witness(&mut self, clause: &[i32], witness: &[i32]) -> bool {
            assert!(!clause.is_empty());
            assert!(!witness.is_empty());
            self.n += 1;
            true
        }
    }
    let mut forward = CountWitnesses { n: 0 };
    let mut backward = CountWitnesses { n: 0 };
    assert!(solver.traverse_witnesses_forward(&mut forward));
    assert!(solver.traverse_witnesses_backward(&mut backward));
    assert_eq!(forward.n, backward.n);
}

#[test]
fn test_dimacs_round_trip_preserves_status() {
    let mut solver = Solver::new();
    let clauses: Vec<Vec<i32>> = vec![vec![1, 2, 3], vec![-1, -2], vec![-1, -3], vec![-2, -3], vec![1]];
    for c in &clauses {
        add_clause(&mut solver, c);
    }
    let status = solver.solve();

    let mut buf: Vec<u8> = vec![];
    solver.write_dimacs_to(&mut buf, 0).unwrap();

    let mut reparsed = Solver::new();
    let mut cursor = Cursor::new(buf);
    reparsed.read_dimacs_from(&mut cursor, 1).unwrap();
    assert_eq!(reparsed.solve(), status);
}

#[test]
fn test_dimacs_round_trip_unsat() {
    let mut solver = Solver::new();
    pigeonhole(&mut solver, 2);
    assert_eq!(solver.solve(), UNSATISFIABLE);

    let mut buf: Vec<u8> = vec![];
    solver.write_dimacs_to(&mut buf, 0).unwrap();
    let mut reparsed = Solver::new();
    let mut cursor = Cursor::new(buf);
    reparsed.read_dimacs_from(&mut cursor, 0).unwrap();
    assert_eq!(reparsed.solve(), UNSATISFIABLE);
}

#[test]
fn test_incremental_reuse_of_eliminated_variable() {
    let mut solver = Solver::new();
    // variable 2 is a prime elimination candidate
    add_clause(&mut solver, &[1, 2]);
    add_clause(&mut solver, &[-2, 3]);
    add_clause(&mut solver, &[4, 5]);
    assert_eq!(solver.solve(), SATISFIABLE);

    // reuse variable 2 in a new clause; restored clauses must still bind it
    add_clause(&mut solver, &[-3, -2]);
    assert_eq!(solver.solve(), SATISFIABLE);
    let originals: Vec<Vec<i32>> = vec![vec![1, 2], vec![-2, 3], vec![4, 5], vec![-3, -2]];
    for c in &originals {
        assert!(
            c.iter().any(|&l| solver.val(l) == l),
            "model must satisfy {:?}",
            c
        );
    }
}

#[test]
fn test_frozen_variable_survives_inprocessing() {
    let mut solver = Solver::new();
    solver.freeze(2);
    add_clause(&mut solver, &[1, 2]);
    add_clause(&mut solver, &[-2, 3]);
    assert_eq!(solver.solve(), SATISFIABLE);
    assert!(solver.frozen(2));
    // assuming the frozen variable works across solves
    solver.assume(-2);
    assert_eq!(solver.solve(), SATISFIABLE);
    assert_eq!(solver.val(2), -2);
    solver.melt(2);
}

#[test]
fn test_phase_forcing() {
    let mut solver = Solver::new();
    // forced phases steer decisions; keep elimination from removing the
    // variables before any decision happens
    assert!(solver.configure("plain"));
    add_clause(&mut solver, &[1, 2]);
    solver.phase(-1);
    solver.phase(2);
    assert_eq!(solver.solve(), SATISFIABLE);
    assert_eq!(solver.val(1), -1);
    assert_eq!(solver.val(2), 2);
    solver.unphase(1);
    solver.unphase(2);
}

struct CollectLearned {
    collected: Arc<Mutex<Vec<Vec<i32>>>>,
    current: Vec<i32>,
}

impl Learner for CollectLearned {
    fn learning(&mut self, _size: usize) -> bool {
        true
    }
    fn learn(&mut self, lit: i32) {
        if lit == 0 {
            let done = std::mem::take(&mut self.current);
            self.collected.lock().unwrap().push(done);
        } else {
            self.current.push(lit);
        }
    }
}

#[test]
fn test_learner_receives_clauses() {
    let collected = Arc::new(Mutex::new(vec![]));
    let mut solver = Solver::new();
    assert!(solver.configure("plain"));
    pigeonhole(&mut solver, 3);
    solver.connect_learner(Box::new(CollectLearned {
        collected: collected.clone(),
        current: vec![],
    }));
    assert_eq!(solver.solve(), UNSATISFIABLE);
    assert!(!collected.lock().unwrap().is_empty());
}

struct OneShotSource {
    clauses: Vec<Vec<i32>>,
}

impl LearnSource for OneShotSource {
    fn has_next_clause(&mut self) -> bool {
        !self.clauses.is_empty()
    }
    fn next_clause(&mut self) -> Vec<i32> {
        self.clauses.pop().unwrap()
    }
}

#[test]
fn test_learn_source_injection() {
    let mut solver = Solver::new();
    add_clause(&mut solver, &[1, 2, 3]);
    add_clause(&mut solver, &[-1, 2]);
    solver.connect_learn_source(Box::new(OneShotSource {
        clauses: vec![vec![2, 3]],
    }));
    assert_eq!(solver.solve(), SATISFIABLE);
}

#[test]
fn test_lookahead_returns_literal_or_decides() {
    let mut solver = Solver::new();
    add_clause(&mut solver, &[1, 2]);
    add_clause(&mut solver, &[-1, 3]);
    add_clause(&mut solver, &[-2, 3]);
    let lit = solver.lookahead();
    // 3 is implied by both branches of every split, any literal is fine
    if lit != 0 {
        assert!(lit.unsigned_abs() <= 3);
    }
}

#[test]
fn test_generate_cubes_splits_disjointly() {
    let mut solver = Solver::new();
    add_clause(&mut solver, &[1, 2, 3]);
    add_clause(&mut solver, &[-1, 4, 5]);
    add_clause(&mut solver, &[-4, 2, 6]);
    let result = solver.generate_cubes(4, 1);
    assert_eq!(result.status, 0);
    assert!(result.cubes.len() >= 2);
    assert!(result.cubes.len() <= 4);
}

#[test]
fn test_simplify_keeps_equisatisfiability() {
    let mut solver = Solver::new();
    add_clause(&mut solver, &[1, 2]);
    add_clause(&mut solver, &[-1, 2]);
    let status = solver.simplify(3);
    assert!(status == SATISFIABLE || status == UNKNOWN);
    assert_eq!(solver.solve(), SATISFIABLE);
    assert_eq!(solver.val(2), 2);
}

#[test]
fn test_write_and_read_dimacs_files() {
    let dir = std::env::temp_dir();
    let path = dir.join("gnatsat_test_roundtrip.cnf");
    let path = path.to_str().unwrap();

    let mut solver = Solver::new();
    add_clause(&mut solver, &[1, -2]);
    add_clause(&mut solver, &[2, 3]);
    solver.write_dimacs(path, 5).unwrap();

    let mut reparsed = Solver::new();
    let vars = reparsed.read_dimacs(path, 0).unwrap();
    assert!(vars >= 3);
    assert_eq!(reparsed.solve(), SATISFIABLE);
    let _ = std::fs::remove_file(path);
}

#[test]
fn test_traverse_collects_with_collector() {
    let mut solver = Solver::new();
    add_clause(&mut solver, &[1, 2]);
    add_clause(&mut solver, &[-1, 2]);
    let mut collect = CollectClauses::default();
    assert!(solver.traverse_clauses(&mut collect));
    assert!(!collect.clauses.is_empty());
}

#[test]
fn test_inccnf_cube_solving() {
    let input = "p inccnf\n1 2 0\n-1 2 0\na 1 0\na -2 0\n";
    let mut solver = Solver::new();
    let mut incremental = false;
    let mut cubes = vec![];
    let mut cursor = Cursor::new(input.as_bytes());
    solver
        .read_dimacs_incremental(&mut cursor, 0, &mut incremental, &mut cubes)
        .unwrap();
    assert!(incremental);
    assert_eq!(cubes, vec![1, 0, -2, 0]);

    solver.assume(1);
    assert_eq!(solver.solve(), SATISFIABLE);
    solver.assume(-2);
    assert_eq!(solver.solve(), UNSATISFIABLE);
    assert!(solver.failed(-2));
}

#[test]
fn test_stats_are_monotone() {
    let mut solver = Solver::new();
    assert!(solver.configure("plain"));
    pigeonhole(&mut solver, 3);
    assert_eq!(solver.solve(), UNSATISFIABLE);
    let stats = solver.get_stats();
    assert!(stats.conflicts > 0);
    assert!(stats.propagations > 0);
}

#[test]
fn test_reset_assumptions_clears_core() {
    let mut solver = three_clause_solver();
    solver.assume(1);
    assert_eq!(solver.solve(), UNSATISFIABLE);
    assert!(solver.failed(1));
    solver.reset_assumptions();
    assert_eq!(solver.state(), State::Unknown);
    assert_eq!(solver.solve(), SATISFIABLE);
}
