//! Failed literal probing.
//!
//! A probe assumes a single literal at a fresh decision level and
//! propagates. If that hits a conflict the negation of the probe holds at
//! the root and is learned as a unit. Probes are taken from literals with
//! binary clause occurrences, where a failure is most likely.

use crate::arena::CRef;
use crate::internal::Internal;
use crate::types::{lbool, Lit, Var};

/// One probing round.
pub(crate) fn probe_round(ip: &mut Internal) {
    debug_assert_eq!(ip.decision_level(), 0);
    let mut steps = ip.opts.probelim;

    // probe literals whose negation occurs in a binary clause: those are
    // the roots of the binary implication graph
    let mut in_binary = vec![false; 2 * ip.num_vars() as usize];
    for &cr in &ip.clauses {
        let c = ip.ca.get_ref(cr);
        if c.garbage() || c.size() != 2 {
            continue;
        }
        in_binary[c[0].idx() as usize] = true;
        in_binary[c[1].idx() as usize] = true;
    }

    let mut probes: Vec<Lit> = vec![];
    for idx in 0..ip.num_vars() {
        let v = Var::from_idx(idx);
        if !ip.flags[v].active() || ip.value(v) != lbool::UNDEF {
            continue;
        }
        for &l in &[v.pos_lit(), v.neg_lit()] {
            if in_binary[(!l).idx() as usize] {
                probes.push(l);
            }
        }
    }

    for p in probes {
        if !ip.ok || steps <= 0 {
            break;
        }
        if ip.value_lit(p) != lbool::UNDEF {
            continue;
        }
        ip.stats.probed += 1;

        let trail_before = ip.vars.trail.len();
        ip.new_decision_level();
        ip.unchecked_enqueue(p, CRef::UNDEF);
        let confl = ip.propagate();
        steps -= (ip.vars.trail.len() - trail_before) as i64 + 1;
        ip.cancel_until(0);

        if confl.is_some() {
            ip.stats.failed_literals += 1;
            ip.learn_unit(!p);
            if !ip.propagate_toplevel() {
                // both polarities failed, the formula is unsatisfiable
                break;
            }
        }
    }
    ip.check_garbage();
}

#[cfg(test)]
mod test {
    use super::*;
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
    fn test_failed_literal_becomes_unit() {
        // assuming 1 propagates 2 and -2 through the binaries
        let mut s = internal_with(&[&[-1, 2], &[-1, -2], &[1, 3]]);
        probe_round(&mut s);
        assert!(s.stats.failed_literals >= 1);
        assert_eq!(s.fixed_lit(Var::from_idx(0).neg_lit()), lbool::TRUE);
    }

    #[test]
    fn test_probing_keeps_consistent_formula_intact() {
        let mut s = internal_with(&[&[-1, 2], &[-2, 3], &[1, -3]]);
        probe_round(&mut s);
        assert!(s.ok);
        assert_eq!(s.stats.failed_literals, 0);
    }
}
