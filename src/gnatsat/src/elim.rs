//! Bounded variable elimination.
//!
//! A variable is eliminated by replacing all clauses containing it with the
//! non-tautological resolvents of its positive and negative occurrences,
//! provided the clause count does not grow beyond the configured limit.
//! Every removed clause is pushed onto the extension stack with the literal
//! of the eliminated variable as witness so models extend back.

use crate::arena::CRef;
use crate::extend::ExtensionStack;
use crate::internal::Internal;
use crate::occur::Occs;
use crate::types::{Lit, Var};

/// Resolve `p` (containing `pivot`) against `n` (containing `!pivot`).
/// Returns `None` for tautological resolvents.
fn resolve(p: &[Lit], n: &[Lit], pivot: Lit) -> Option<Vec<Lit>> {
    let mut out: Vec<Lit> = Vec::with_capacity(p.len() + n.len() - 2);
    out.extend(p.iter().copied().filter(|&l| l != pivot));
    for &l in n.iter().filter(|&&l| l != !pivot) {
        if out.contains(&!l) {
            return None; // tautology
        }
        if !out.contains(&l) {
            out.push(l);
        }
    }
    Some(out)
}

/// Live occurrence clauses of `l`.
fn gather(ip: &Internal, occs: &Occs, l: Lit) -> Vec<CRef> {
    occs.get(l)
        .iter()
        .copied()
        .filter(|&cr| !ip.ca.get_ref(cr).garbage())
        .collect()
}

/// One bounded variable elimination round.
pub(crate) fn elim_round(ip: &mut Internal, extend: &mut ExtensionStack) {
    debug_assert_eq!(ip.decision_level(), 0);
    let mut steps = ip.opts.elimlim;
    let occlim = ip.opts.elimocclim as usize;
    let growth = ip.opts.elimgrowth as i64;

    for _ in 0..ip.opts.elimrounds {
        if !ip.ok || steps <= 0 {
            break;
        }
        let mut occs = Occs::build(ip);
        let mut eliminated_any = false;

        // cheap candidates first
        let mut candidates: Vec<Var> = (0..ip.num_vars())
            .map(Var::from_idx)
            .filter(|&v| ip.removable(v))
            .collect();
        candidates.sort_unstable_by_key(|&v| {
            occs.count(v.pos_lit()) + occs.count(v.neg_lit())
        });

        for v in candidates {
            if !ip.ok || steps <= 0 {
                break;
            }
            if !ip.removable(v) {
                continue;
            }
            let pivot = v.pos_lit();
            let pos = gather(ip, &occs, pivot);
            let neg = gather(ip, &occs, !pivot);
            if pos.len() + neg.len() > occlim {
                continue;
            }

            // count and collect the resolvents within the growth bound
            let before = (pos.len() + neg.len()) as i64;
            let mut resolvents: Vec<Vec<Lit>> = vec![];
            let mut too_many = false;
            'outer: for &pr in &pos {
                for &nr in &neg {
                    steps -= 1;
                    if steps <= 0 {
                        too_many = true;
                        break 'outer;
                    }
                    let p = ip.ca.get_ref(pr).lits();
                    let n = ip.ca.get_ref(nr).lits();
                    if let Some(r) = resolve(p, n, pivot) {
                        resolvents.push(r);
                        if resolvents.len() as i64 > before + growth {
                            too_many = true;
                            break 'outer;
                        }
                    }
                }
            }
            if too_many {
                continue;
            }

            // commit: record witnesses, certify resolvents, retire originals
            let mut ext_clause: Vec<i32> = vec![];
            for &cr in &pos {
                ip.externalize_clause(ip.ca.get_ref(cr).lits(), &mut ext_clause);
                extend.push(&[ip.externalize(pivot)], &ext_clause);
            }
            for &cr in &neg {
                ip.externalize_clause(ip.ca.get_ref(cr).lits(), &mut ext_clause);
                extend.push(&[ip.externalize(!pivot)], &ext_clause);
            }

            let stored_before = ip.clauses.len();
            for mut r in resolvents {
                if !ip.add_derived(&mut r, false) {
                    break;
                }
            }
            // later candidates must see the resolvents
            for i in stored_before..ip.clauses.len() {
                let cr = ip.clauses[i];
                occs.add_clause(ip, cr);
            }

            for &cr in pos.iter().chain(neg.iter()) {
                ip.remove_clause(cr);
            }
            ip.clauses
                .retain(|&cr| !pos.contains(&cr) && !neg.contains(&cr));
            for &l in &[pivot, !pivot] {
                occs.flush(ip, l);
            }

            ip.mark_eliminated(v);
            eliminated_any = true;

            if !ip.ok {
                break;
            }
            if ip.propagate().is_some() {
                ip.ok = false;
                if let Some(proof) = &mut ip.proof {
                    proof.add_empty_clause();
                }
                break;
            }
        }

        purge_learnts_of_inactive(ip);
        if !eliminated_any {
            break;
        }
    }
    ip.check_garbage();
}

/// Redundant clauses may still mention variables that were eliminated in
/// this round; they are no longer needed.
pub(crate) fn purge_learnts_of_inactive(ip: &mut Internal) {
    let mut stale: Vec<CRef> = vec![];
    for &cr in &ip.learnts {
        let c = ip.ca.get_ref(cr);
        if c.garbage() {
            continue;
        }
        if c.lits().iter().any(|&l| !ip.flags[l.var()].active()) {
            stale.push(cr);
        }
    }
    for cr in stale {
        ip.remove_clause(cr);
        ip.learnts.retain(|&x| x != cr);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::extend::ExtensionStack;
    use crate::internal::Handles;
    use crate::types::lbool;
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
    fn test_resolve_drops_pivot() {
        let a = Var::from_idx(0);
        let b = Var::from_idx(1);
        let c = Var::from_idx(2);
        let p = vec![a.pos_lit(), b.pos_lit()];
        let n = vec![a.neg_lit(), c.pos_lit()];
        let r = resolve(&p, &n, a.pos_lit()).unwrap();
        assert_eq!(r, vec![b.pos_lit(), c.pos_lit()]);
    }

    #[test]
    fn test_resolve_detects_tautology() {
        let a = Var::from_idx(0);
        let b = Var::from_idx(1);
        let p = vec![a.pos_lit(), b.pos_lit()];
        let n = vec![a.neg_lit(), b.neg_lit()];
        assert!(resolve(&p, &n, a.pos_lit()).is_none());
    }

    #[test]
    fn test_elimination_preserves_satisfiability() {
        // (1 2) (-1 3) (2 3 4): eliminating 1 leaves (2 3) and (2 3 4)
        let mut s = internal_with(&[&[1, 2], &[-1, 3], &[2, 3, 4]]);
        let mut extend = ExtensionStack::new();
        elim_round(&mut s, &mut extend);
        assert!(s.stats.eliminated >= 1);
        assert!(!extend.is_empty());
        let mut handles = Handles::none();
        let res = s.solve(&mut extend, &mut handles);
        assert_eq!(res, lbool::TRUE);
    }

    #[test]
    fn test_frozen_variable_is_not_eliminated() {
        let mut s = internal_with(&[&[1, 2], &[-1, 3]]);
        s.set_frozen(Var::from_idx(0), true);
        let mut extend = ExtensionStack::new();
        elim_round(&mut s, &mut extend);
        assert!(s.flags[Var::from_idx(0)].active());
    }
}
