//! Subsumption and self-subsuming resolution.
//!
//! A clause `C` subsumes `D` if every literal of `C` occurs in `D`; `D` is
//! then removed. If `C` matches `D` except that exactly one literal occurs
//! negated, resolving removes that literal from `D` (strengthening). A 64
//! bit variable signature filters candidate pairs before the quadratic
//! check, and the scan walks the occurrence list of the least frequent
//! literal of `C`.

use crate::arena::CRef;
use crate::internal::Internal;
use crate::occur::Occs;
use crate::types::{lbool, Lit};

/// Signature over the variables of a clause; if
/// `sig(C) & !sig(D) != 0` then `C` cannot subsume `D`.
#[inline]
fn signature(lits: &[Lit]) -> u64 {
    let mut sig = 0u64;
    for l in lits {
        sig |= 1u64 << (l.var().idx() % 64);
    }
    sig
}

/// Outcome of matching `C` against `D`.
enum Match {
    None,
    Subsumes,
    /// `C` self-subsumes `D`; the literal is the one to remove from `D`.
    Strengthens(Lit),
}

fn try_subsume(ip: &Internal, c: &[Lit], dr: CRef) -> Match {
    let d = ip.ca.get_ref(dr);
    let mut flipped = Lit::UNDEF;
    for &l in c {
        let mut found = false;
        for &k in d.lits() {
            if k == l {
                found = true;
                break;
            } else if k == !l && flipped == Lit::UNDEF {
                flipped = k;
                found = true;
                break;
            }
        }
        if !found {
            return Match::None;
        }
    }
    if flipped == Lit::UNDEF {
        Match::Subsumes
    } else {
        Match::Strengthens(flipped)
    }
}

/// One subsumption round over the irredundant clauses.
pub(crate) fn subsume_round(ip: &mut Internal) {
    debug_assert_eq!(ip.decision_level(), 0);
    let mut steps = ip.opts.subsumelim;
    let occs = Occs::build(ip);

    // signatures, indexed like the arena
    let mut candidates: Vec<CRef> = ip
        .clauses
        .iter()
        .copied()
        .filter(|&cr| !ip.ca.get_ref(cr).garbage())
        .collect();
    // small clauses subsume most, try them first
    candidates.sort_unstable_by_key(|&cr| ip.ca.get_ref(cr).size());

    for &cr in &candidates {
        if steps <= 0 || !ip.ok {
            break;
        }
        if ip.ca.get_ref(cr).garbage() {
            continue;
        }
        let c: Vec<Lit> = ip.ca.get_ref(cr).lits().to_vec();
        if c.iter().any(|&l| ip.value_lit(l) != lbool::UNDEF) {
            continue; // root assigned literal, cleaned up elsewhere
        }
        let sig = signature(&c);

        // walk the shortest occurrence list among the literals of `c`; the
        // negated list catches targets whose flipped literal is this one
        let min_lit = *c
            .iter()
            .min_by_key(|&&l| occs.count(l))
            .expect("non-empty clause");

        let mut subsumed: Vec<CRef> = vec![];
        let mut strengthened: Vec<(CRef, Lit)> = vec![];
        'scan: for &list_lit in &[min_lit, !min_lit] {
            for &dr in occs.get(list_lit) {
                if dr == cr {
                    continue;
                }
                let d = ip.ca.get_ref(dr);
                if d.garbage() || d.size() < c.len() as u32 {
                    continue;
                }
                steps -= 1;
                if steps <= 0 {
                    break 'scan;
                }
                if sig & !signature(d.lits()) != 0 {
                    continue;
                }
                match try_subsume(ip, &c, dr) {
                    Match::None => {}
                    Match::Subsumes => subsumed.push(dr),
                    Match::Strengthens(l) => strengthened.push((dr, l)),
                }
            }
        }

        for dr in subsumed {
            if ip.ca.get_ref(dr).garbage() {
                continue;
            }
            ip.stats.subsumed += 1;
            ip.remove_clause(dr);
            ip.clauses.retain(|&x| x != dr);
        }
        for (dr, drop_lit) in strengthened {
            if ip.ca.get_ref(dr).garbage() {
                continue;
            }
            strengthen_clause(ip, dr, drop_lit);
            if !ip.ok {
                return;
            }
        }
    }
    ip.check_garbage();
}

/// Remove `drop_lit` from `dr`: certify the shortened clause first, then
/// retire the old one. The shortened clause goes through the regular derived
/// clause path, which also strips root-falsified literals and turns the
/// result into a unit or the empty clause where appropriate.
pub(crate) fn strengthen_clause(ip: &mut Internal, dr: CRef, drop_lit: Lit) {
    let mut shorter: Vec<Lit> = ip
        .ca
        .get_ref(dr)
        .lits()
        .iter()
        .copied()
        .filter(|&l| l != drop_lit)
        .collect();
    debug_assert!(shorter.len() + 1 == ip.ca.get_ref(dr).size() as usize);
    ip.stats.strengthened += 1;

    let redundant = ip.ca.get_ref(dr).redundant();
    let ok = ip.add_derived(&mut shorter, redundant);
    ip.remove_clause(dr);
    ip.clauses.retain(|&x| x != dr);
    ip.learnts.retain(|&x| x != dr);
    if ok {
        ip.propagate_toplevel();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::extend::ExtensionStack;
    use crate::internal::Handles;
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
    fn test_subsumed_clause_is_removed() {
        let mut s = internal_with(&[&[1, 2], &[1, 2, 3], &[4, 5]]);
        subsume_round(&mut s);
        assert_eq!(s.stats.subsumed, 1);
        let live = s
            .clauses
            .iter()
            .filter(|&&cr| !s.ca.get_ref(cr).garbage())
            .count();
        assert_eq!(live, 2);
    }

    #[test]
    fn test_self_subsumption_strengthens() {
        // (1 2) and (-1 2 3): resolving on 1 gives (2 3) subsuming the
        // second clause, so it is strengthened to (2 3).
        let mut s = internal_with(&[&[1, 2], &[-1, 2, 3]]);
        subsume_round(&mut s);
        assert_eq!(s.stats.strengthened, 1);
        let sizes: Vec<u32> = s
            .clauses
            .iter()
            .filter(|&&cr| !s.ca.get_ref(cr).garbage())
            .map(|&cr| s.ca.get_ref(cr).size())
            .collect();
        assert!(sizes.contains(&2));
        assert!(!sizes.contains(&3));
    }

    #[test]
    fn test_strengthening_to_unit_propagates() {
        // (1) is not stored, so craft (1 2) and (-2 1): strengthening with
        // each other yields the unit (1).
        let mut s = internal_with(&[&[1, 2], &[1, -2]]);
        subsume_round(&mut s);
        let solved = {
            let mut extend = ExtensionStack::new();
            let mut handles = Handles::none();
            s.solve(&mut extend, &mut handles)
        };
        assert_eq!(solved, lbool::TRUE);
        assert_eq!(s.model[0], lbool::TRUE);
    }
}
