//! Clause vivification.
//!
//! A candidate clause is temporarily detached, then its literals are assumed
//! false one at a time with propagation in between. Three things can happen
//! before the clause is exhausted: propagation hits a conflict (the assumed
//! prefix alone is contradictory, the clause shrinks to the prefix), a later
//! literal of the clause becomes true (the prefix plus that literal implies
//! the clause), or a later literal becomes false (it is redundant in the
//! clause). Any of these yields a strictly stronger clause.

use crate::arena::CRef;
use crate::internal::Internal;
use crate::types::{lbool, Lit};
use std::cmp;

enum Outcome {
    Unchanged,
    Shrunken(Vec<Lit>),
}

fn vivify_clause(ip: &mut Internal, lits: &[Lit], steps: &mut i64) -> Outcome {
    debug_assert_eq!(ip.decision_level(), 0);
    let mut prefix: Vec<Lit> = vec![];
    let mut shrunken = false;

    for (i, &l) in lits.iter().enumerate() {
        *steps -= (ip.vars.trail.len() / 16 + 1) as i64;
        match ip.value_lit(l) {
            v if v == lbool::TRUE => {
                // prefix implies l, the rest of the clause is redundant
                prefix.push(l);
                shrunken = shrunken || i + 1 != lits.len();
                break;
            }
            v if v == lbool::FALSE => {
                // l is falsified by the prefix alone and can be dropped
                shrunken = true;
                continue;
            }
            _ => {}
        }
        ip.new_decision_level();
        ip.unchecked_enqueue(!l, CRef::UNDEF);
        prefix.push(l);
        if ip.propagate().is_some() {
            // the prefix is contradictory, it subsumes the clause
            shrunken = shrunken || i + 1 != lits.len();
            break;
        }
    }

    ip.cancel_until(0);
    if shrunken && prefix.len() < lits.len() {
        Outcome::Shrunken(prefix)
    } else {
        Outcome::Unchanged
    }
}

/// One vivification round over the larger irredundant clauses.
pub(crate) fn vivify_round(ip: &mut Internal) {
    debug_assert_eq!(ip.decision_level(), 0);
    let mut steps = ip.opts.vivifylim;

    let mut candidates: Vec<CRef> = ip
        .clauses
        .iter()
        .copied()
        .filter(|&cr| {
            let c = ip.ca.get_ref(cr);
            !c.garbage() && c.size() >= 3
        })
        .collect();
    // longer clauses profit most from shrinking
    candidates.sort_unstable_by_key(|&cr| cmp::Reverse(ip.ca.get_ref(cr).size()));

    for cr in candidates {
        if !ip.ok || steps <= 0 {
            break;
        }
        if ip.ca.get_ref(cr).garbage() {
            continue;
        }
        let lits: Vec<Lit> = ip.ca.get_ref(cr).lits().to_vec();
        if lits.iter().any(|&l| ip.value_lit(l) != lbool::UNDEF) {
            continue; // root assigned, left for database simplification
        }

        // the clause must not propagate against itself while probing it
        ip.detach_clause(cr, true);

        match vivify_clause(ip, &lits, &mut steps) {
            Outcome::Unchanged => {
                ip.attach_clause(cr);
            }
            Outcome::Shrunken(mut shorter) => {
                ip.stats.vivified += 1;
                debug_assert!(!shorter.is_empty());
                if !ip.add_derived(&mut shorter, false) {
                    // derived the empty clause, formula is unsatisfiable
                    break;
                }
                // retire the old version without detaching it again
                let ext: Vec<i32> = lits.iter().map(|&l| ip.externalize(l)).collect();
                if let Some(proof) = &mut ip.proof {
                    proof.delete_clause(&ext);
                }
                ip.ca.get_mut(cr).set_garbage(true);
                ip.ca.free(cr);
                ip.clauses.retain(|&x| x != cr);
                if !ip.propagate_toplevel() {
                    break;
                }
            }
        }
    }
    ip.check_garbage();
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::Var;
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
    fn test_vivify_drops_implied_literal() {
        // (1 2) and (-1 3) make 3 implied once 1 and 2 are false, so the
        // clause (1 2 3) vivifies: assuming -1 -2 propagates nothing
        // against (1 2)? it conflicts, shrinking (1 2 3) to (1 2).
        let mut s = internal_with(&[&[1, 2], &[-1, 3], &[1, 2, 3]]);
        vivify_round(&mut s);
        assert!(s.stats.vivified >= 1);
        let live_sizes: Vec<u32> = s
            .clauses
            .iter()
            .filter(|&&cr| !s.ca.get_ref(cr).garbage())
            .map(|&cr| s.ca.get_ref(cr).size())
            .collect();
        assert!(!live_sizes.contains(&3));
    }

    #[test]
    fn test_vivify_keeps_irreducible_clause() {
        let mut s = internal_with(&[&[1, 2, 3], &[4, 5]]);
        vivify_round(&mut s);
        assert_eq!(s.stats.vivified, 0);
        let live = s
            .clauses
            .iter()
            .filter(|&&cr| !s.ca.get_ref(cr).garbage())
            .count();
        assert_eq!(live, 2);
    }
}
