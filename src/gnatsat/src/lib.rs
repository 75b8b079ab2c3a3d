/****************************************************************************************[lib.rs]
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

//======== LOG ============

// stubs when logging is not enabled
#[cfg(not(feature = "logging"))]
#[macro_use]
pub(crate) mod log {
    macro_rules! trace {
        ($( $x:expr ),*) => {};
    }
    macro_rules! debug {
        ($( $x:expr ),*) => {};
    }
    macro_rules! info {
        ($( $x:expr ),*) => {};
    }
}

#[cfg(feature = "logging")]
#[macro_use]
pub extern crate log;

//======== PUBLIC INTERFACE ============

pub mod arena;
pub mod callbacks;
pub mod dimacs;
pub mod drat;
pub mod intmap;
pub mod options;
pub mod solver;
pub mod types;

mod block;
mod cubes;
mod decompose;
mod elim;
mod extend;
mod external;
mod internal;
mod occur;
mod probe;
mod subsume;
mod vivify;

pub use crate::{
    callbacks::{ClauseIterator, CollectClauses, LearnSource, Learner, Terminator, WitnessIterator},
    drat::{Proof, ProofFormat},
    internal::{Limits, Stats},
    options::{OptKind, OptRecord, Options},
    solver::{CubesWithStatus, Solver, State, Statistics, SATISFIABLE, UNKNOWN, UNSATISFIABLE},
    types::{lbool, Lit, Var},
};
