//! Blocked clause elimination.
//!
//! A clause `C` is blocked on one of its literals `l` if every resolvent of
//! `C` with a clause containing `!l` is tautological. Removing a blocked
//! clause preserves satisfiability; the witness entry `(l, C)` pushed onto
//! the extension stack repairs any model that happens to falsify `C`.

use crate::extend::ExtensionStack;
use crate::internal::Internal;
use crate::occur::Occs;
use crate::types::{lbool, Lit, Var};

/// Is the resolvent of `c` and `d` on `l` a tautology?
fn tautological_resolvent(c: &[Lit], d: &[Lit], l: Lit) -> bool {
    for &k in c {
        if k == l {
            continue;
        }
        if d.contains(&!k) {
            return true;
        }
    }
    false
}

/// One blocked clause elimination round.
pub(crate) fn block_round(ip: &mut Internal, extend: &mut ExtensionStack) {
    debug_assert_eq!(ip.decision_level(), 0);
    let mut steps = ip.opts.blocklim;
    let occs = Occs::build(ip);

    let mut blocked: Vec<(crate::arena::CRef, Lit)> = vec![];

    'lits: for idx in 0..ip.num_vars() {
        let v = Var::from_idx(idx);
        if !ip.removable(v) {
            continue;
        }
        for &l in &[v.pos_lit(), v.neg_lit()] {
            for &cr in occs.get(l) {
                if steps <= 0 {
                    break 'lits;
                }
                let c = ip.ca.get_ref(cr);
                if c.garbage() {
                    continue;
                }
                if c.lits().iter().any(|&x| ip.value_lit(x) != lbool::UNDEF) {
                    continue;
                }
                // a clause already scheduled stays scheduled
                if blocked.iter().any(|&(b, _)| b == cr) {
                    continue;
                }
                let mut is_blocked = true;
                for &dr in occs.get(!l) {
                    steps -= 1;
                    let d = ip.ca.get_ref(dr);
                    if d.garbage() {
                        continue;
                    }
                    if !tautological_resolvent(c.lits(), d.lits(), l) {
                        is_blocked = false;
                        break;
                    }
                }
                if is_blocked {
                    blocked.push((cr, l));
                }
            }
        }
    }

    // Blockedness is monotone under clause removal, so every clause found
    // blocked against the full database stays blocked while the batch is
    // removed.
    let mut ext_clause: Vec<i32> = vec![];
    for (cr, l) in blocked {
        if ip.ca.get_ref(cr).garbage() {
            continue;
        }
        let c: Vec<Lit> = ip.ca.get_ref(cr).lits().to_vec();
        ip.externalize_clause(&c, &mut ext_clause);
        extend.push(&[ip.externalize(l)], &ext_clause);
        ip.stats.blocked += 1;
        ip.remove_clause(cr);
        ip.clauses.retain(|&x| x != cr);
    }
    ip.check_garbage();
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::internal::Handles;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn internal_with(clauses: &[&[i32]]) -> Internal {
        let mut s = Internal::new(Arc::new(AtomicBool::new(false)));
        let max = clauses
            .iter()
            .flat_map(|c| c.iter())
            .map(|l| l.abs())
            .max()
            .unwrap_or(0);
        let vars: Vec<Var> = (1..=max).map(|i| s.new_var(i)).collect();
        for c in clauses {
            let mut lits: Vec<Lit> = c
                .iter()
                .map(|&l| {
                    let v = vars[(l.abs() - 1) as usize];
                    if l > 0 {
                        v.pos_lit()
                    } else {
                        v.neg_lit()
                    }
                })
                .collect();
            assert!(s.add_input_clause(&mut lits));
        }
        assert!(s.propagate_toplevel());
        s
    }

    #[test]
    fn test_pure_literal_clauses_are_blocked() {
        // variable 3 occurs only positively, so its clause is blocked on it
        let mut s = internal_with(&[&[1, 3], &[-1, 2], &[1, -2]]);
        let mut extend = ExtensionStack::new();
        block_round(&mut s, &mut extend);
        assert!(s.stats.blocked >= 1);
        let mut handles = Handles::none();
        let res = s.solve(&mut extend, &mut handles);
        assert_eq!(res, lbool::TRUE);
    }

    #[test]
    fn test_blocked_clause_detection() {
        // C = (1 2), D = (-1 -2): resolvent on 1 is (2 -2), tautological,
        // and there is no other clause with -1, so C is blocked on 1.
        let mut s = internal_with(&[&[1, 2], &[-1, -2]]);
        let mut extend = ExtensionStack::new();
        block_round(&mut s, &mut extend);
        assert!(s.stats.blocked >= 1);
    }
}
