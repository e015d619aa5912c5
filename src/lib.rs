//! Minimum-cost assignment on square cost matrices.
//!
//! Given an `n` by `n` matrix of costs, [`solve`] pairs every row with a
//! distinct column so that the summed cost is minimal, and works on any
//! [`nalgebra`] square matrix with a signed scalar. The solver reduces a
//! working copy of the costs and grows a matching over the zero entries
//! with augmenting searches; whenever the matching stalls short of perfect,
//! it shifts the remaining costs through a minimum vertex cover and
//! searches again.
//!
//! ```
//! let costs = nalgebra::Matrix2::from_row_slice(&[1.0, 2.0, 2.0, 1.0]);
//!
//! let mut pairs = Vec::new();
//! let total = assignment::solve(&costs, &mut pairs)?;
//!
//! assert_eq!(pairs, [(0, 0), (1, 1)]);
//! assert_eq!(total, 2.0);
//! # Ok::<(), assignment::SolveError>(())
//! ```
//!
//! Floating point costs are compared against a small threshold when the
//! solver looks for zeroes; see [`solve_with_epsilon`] to control it. The
//! [`orlib`] module reads the OR-Library's published assignment instances
//! for end-to-end validation.

mod solver;

pub mod orlib;

pub use solver::{solve, solve_with_epsilon, Cost, SolveError, EPSILON};
