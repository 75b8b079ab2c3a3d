//! Equivalence substitution.
//!
//! Strongly connected components of the binary implication graph are
//! literal equivalence classes. Every member of a class is replaced by the
//! class representative throughout the clause database; substituted
//! variables leave the formula and get extension stack entries so their
//! values are recovered from the representative during reconstruction. A
//! component containing a literal and its negation makes the formula
//! unsatisfiable.

use crate::arena::CRef;
use crate::extend::ExtensionStack;
use crate::internal::Internal;
use crate::types::{lbool, LMap, Lit, VMap, Var};

/// Iterative Tarjan over the implication graph `!a -> b`, `!b -> a` of all
/// binary clauses. Returns the representative literal per literal.
fn find_representatives(ip: &Internal, steps: &mut i64) -> Option<LMap<Lit>> {
    let n_lits = 2 * ip.num_vars() as usize;

    // adjacency: out edges per literal
    let mut adj: Vec<Vec<Lit>> = vec![vec![]; n_lits];
    for &cr in ip.clauses.iter().chain(ip.learnts.iter()) {
        let c = ip.ca.get_ref(cr);
        if c.garbage() || c.size() != 2 {
            continue;
        }
        let (a, b) = (c[0], c[1]);
        if ip.value_lit(a) != lbool::UNDEF || ip.value_lit(b) != lbool::UNDEF {
            continue;
        }
        adj[(!a).idx() as usize].push(b);
        adj[(!b).idx() as usize].push(a);
        *steps -= 1;
    }

    let undef = u32::MAX;
    let mut index = vec![undef; n_lits];
    let mut lowlink = vec![undef; n_lits];
    let mut on_stack = vec![false; n_lits];
    let mut stack: Vec<u32> = vec![];
    let mut next_index = 0u32;
    let mut repr: LMap<Lit> = LMap::new();
    if n_lits > 0 {
        repr.reserve(Lit::from_idx(n_lits as u32 - 1), Lit::UNDEF);
    }

    // explicit DFS frames: (node, next child position)
    let mut frames: Vec<(u32, usize)> = vec![];

    for root in 0..n_lits as u32 {
        if index[root as usize] != undef {
            continue;
        }
        frames.push((root, 0));
        index[root as usize] = next_index;
        lowlink[root as usize] = next_index;
        next_index += 1;
        stack.push(root);
        on_stack[root as usize] = true;

        while !frames.is_empty() {
            *steps -= 1;
            if *steps <= 0 {
                return None;
            }
            let (v, child) = *frames.last().expect("frame stack is non-empty");
            if child < adj[v as usize].len() {
                let w = adj[v as usize][child].idx();
                frames.last_mut().expect("frame stack is non-empty").1 += 1;
                if index[w as usize] == undef {
                    index[w as usize] = next_index;
                    lowlink[w as usize] = next_index;
                    next_index += 1;
                    stack.push(w);
                    on_stack[w as usize] = true;
                    frames.push((w, 0));
                } else if on_stack[w as usize] {
                    lowlink[v as usize] = lowlink[v as usize].min(index[w as usize]);
                }
            } else {
                frames.pop();
                if let Some(&(p, _)) = frames.last() {
                    lowlink[p as usize] = lowlink[p as usize].min(lowlink[v as usize]);
                }
                if lowlink[v as usize] == index[v as usize] {
                    // pop the component, representative is the smallest index
                    let mut component: Vec<u32> = vec![];
                    loop {
                        let w = stack.pop().expect("tarjan stack underflow");
                        on_stack[w as usize] = false;
                        component.push(w);
                        if w == v {
                            break;
                        }
                    }
                    // prefer a representative whose variable must stay
                    let pick = component
                        .iter()
                        .copied()
                        .filter(|&w| !ip.removable(Lit::from_idx(w).var()))
                        .min()
                        .or_else(|| component.iter().copied().min())
                        .expect("non-empty component");
                    for &w in &component {
                        repr[Lit::from_idx(w)] = Lit::from_idx(pick);
                    }
                }
            }
        }
    }
    Some(repr)
}

/// One equivalence substitution round.
pub(crate) fn decompose_round(ip: &mut Internal, extend: &mut ExtensionStack) {
    debug_assert_eq!(ip.decision_level(), 0);
    let mut steps = ip.opts.decomposelim;
    let repr = match find_representatives(ip, &mut steps) {
        Some(r) => r,
        None => return, // budget exhausted
    };

    // a literal equivalent to its own negation is a contradiction
    for idx in 0..2 * ip.num_vars() {
        let l = Lit::from_idx(idx);
        if repr[l] != Lit::UNDEF && repr[l] == repr[!l] {
            let e = ip.externalize(!l);
            if let Some(proof) = &mut ip.proof {
                proof.add_derived_unit(e);
                proof.add_empty_clause();
            }
            ip.ok = false;
            return;
        }
    }

    // Substitution is restricted to removable variables: frozen or assumed
    // members of a class keep their literals, representatives are never
    // substituted (the representative of a class is not in `gone`).
    let mut gone: VMap<bool> = VMap::new();
    let mut gone_list: Vec<Var> = vec![];
    for idx in 0..ip.num_vars() {
        let v = Var::from_idx(idx);
        gone.reserve(v, false);
        let l = v.pos_lit();
        let r = repr[l];
        if r == Lit::UNDEF || r == l || r.var() == v {
            continue;
        }
        if !ip.removable(v) {
            continue;
        }
        gone[v] = true;
        gone_list.push(v);
    }
    if gone_list.is_empty() {
        return;
    }

    let image = |repr: &LMap<Lit>, gone: &VMap<bool>, l: Lit| -> Lit {
        if gone[l.var()] {
            repr[l]
        } else {
            l
        }
    };

    // rewrite every clause touching a substituted variable
    let all: Vec<CRef> = ip.clauses.iter().chain(ip.learnts.iter()).copied().collect();
    for cr in all {
        if !ip.ok {
            return;
        }
        let c = ip.ca.get_ref(cr);
        if c.garbage() {
            continue;
        }
        let touched = c.lits().iter().any(|&l| gone[l.var()]);
        if !touched {
            continue;
        }
        let redundant = c.redundant();
        let mut rewritten: Vec<Lit> = c
            .lits()
            .iter()
            .map(|&l| image(&repr, &gone, l))
            .collect();
        rewritten.sort_unstable();
        rewritten.dedup();
        let tautology = rewritten
            .windows(2)
            .any(|w| w[0].var() == w[1].var() && w[0] != w[1]);

        if !tautology {
            if !ip.add_derived(&mut rewritten, redundant) {
                return;
            }
        }
        ip.remove_clause(cr);
        ip.clauses.retain(|&x| x != cr);
        ip.learnts.retain(|&x| x != cr);
    }

    // record the equivalences for reconstruction and retire the variables
    for v in gone_list {
        let l = v.pos_lit();
        let r = repr[l];
        let el = ip.externalize(l);
        let er = ip.externalize(r);
        extend.push(&[el], &[el, -er]);
        extend.push(&[-el], &[-el, er]);
        ip.mark_substituted(v);
    }

    crate::elim::purge_learnts_of_inactive(ip);
    if ip.ok {
        if ip.propagate().is_some() {
            ip.ok = false;
            if let Some(proof) = &mut ip.proof {
                proof.add_empty_clause();
            }
        }
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
    fn test_equivalent_variables_are_merged() {
        // 1 <-> 2 plus a clause using both
        let mut s = internal_with(&[&[-1, 2], &[1, -2], &[1, 3], &[-2, 4]]);
        let mut extend = ExtensionStack::new();
        decompose_round(&mut s, &mut extend);
        assert_eq!(s.stats.substituted, 1);
        assert!(!extend.is_empty());
        let mut handles = Handles::none();
        let res = s.solve(&mut extend, &mut handles);
        assert_eq!(res, lbool::TRUE);
    }

    #[test]
    fn test_contradictory_cycle_is_unsat() {
        // 1 -> 2, 2 -> -1, -1 -> -2?, encode 1 <-> -1 through 2:
        // (−1 ∨ 2), (−2 ∨ −1), (1 ∨ 2), (−2 ∨ 1) gives 1 ≡ 2 ≡ −1
        let mut s = internal_with(&[&[-1, 2], &[-2, -1], &[1, 2], &[-2, 1]]);
        let mut extend = ExtensionStack::new();
        decompose_round(&mut s, &mut extend);
        // either decompose found the contradiction or propagation will
        let mut handles = Handles::none();
        let res = s.solve(&mut extend, &mut handles);
        assert_eq!(res, lbool::FALSE);
    }
}
