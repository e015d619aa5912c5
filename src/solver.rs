//! The solver core.
//!
//! Covering every zero of the reduced cost matrix is treated as a matching
//! problem: rows connect to columns wherever the reduced cost is zero, and
//! the matching grows one augmenting path at a time over that graph. When
//! no path is left, the labels of the stalled search give a minimum vertex
//! cover (König's theorem). Shifting the smallest uncovered value out of
//! the matrix then creates new zero edges and the search resumes.

use std::fmt::Debug;
use std::mem;

use log::{debug, trace};
use nalgebra::{DMatrix, Dim, RawStorage, SquareMatrix};
use num_traits::{Bounded, FromPrimitive, NumAssignOps, Signed};
use thiserror::Error;

/// Default threshold below which a reduced cost counts as exactly zero.
///
/// Repeated subtraction drifts, and the zero edges of the matching graph
/// must stay structurally stable across rounds. [`solve`] converts this
/// into the cost scalar; integers end up with a zero threshold, which makes
/// the comparison exact.
pub const EPSILON: f64 = 1e-6;

/// Failures detected while sizing and allocating the solver scratch state.
///
/// Both are raised before the algorithm touches the matrix; once scratch
/// construction succeeds the solve runs to completion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum SolveError {
    /// The dimension is so large that element counts no longer fit a `usize`.
    #[error("problem dimension too large for scratch index arithmetic")]
    ProblemTooLarge,
    /// A scratch buffer could not be allocated.
    #[error("scratch allocation failed")]
    NotEnoughMemory,
}

/// Scalar types usable as matrix costs.
///
/// Blanket-implemented for everything with the required arithmetic, which
/// covers `f64`, `f32` and the signed integers. Unsigned integers are
/// excluded: reduction and adjustment both subtract.
pub trait Cost:
    Copy + Signed + NumAssignOps + Bounded + FromPrimitive + PartialOrd + Debug + 'static
{
}

impl<T> Cost for T where
    T: Copy + Signed + NumAssignOps + Bounded + FromPrimitive + PartialOrd + Debug + 'static
{
}

/// Finds the minimum-cost perfect matching between rows and columns.
///
/// On success `pairs` holds the `n` matched `(row, column)` pairs in
/// ascending row order and the returned value is the matching's total cost,
/// summed over the original matrix. `pairs` is written only on success.
///
/// The comparison threshold is [`EPSILON`] converted into `T`; use
/// [`solve_with_epsilon`] to pick a different one.
pub fn solve<T, D, S>(
    costs: &SquareMatrix<T, D, S>,
    pairs: &mut Vec<(usize, usize)>,
) -> Result<T, SolveError>
where
    T: Cost,
    D: Dim,
    S: RawStorage<T, D, D>,
{
    let epsilon = T::from_f64(EPSILON).unwrap_or_else(T::zero);
    solve_with_epsilon(costs, epsilon, pairs)
}

/// [`solve`] with an explicit zero-snapping threshold.
pub fn solve_with_epsilon<T, D, S>(
    costs: &SquareMatrix<T, D, S>,
    epsilon: T,
    pairs: &mut Vec<(usize, usize)>,
) -> Result<T, SolveError>
where
    T: Cost,
    D: Dim,
    S: RawStorage<T, D, D>,
{
    let (n, _) = costs.shape();
    if n == 0 {
        pairs.clear();
        return Ok(T::zero());
    }

    let mut workspace = Workspace::new(costs, epsilon)?;

    workspace.reduce_rows();
    workspace.reduce_columns();
    workspace.seed_matching();

    loop {
        workspace.maximize_matching();
        let size = workspace.build_cover();
        debug!("maximum matching holds {size} of {n} rows");
        if size == n {
            break;
        }
        workspace.adjust_costs();
    }

    workspace.collect_pairs(pairs);
    let mut total = T::zero();
    for &(row, col) in pairs.iter() {
        total += costs[(row, col)];
    }
    Ok(total)
}

/// All the scratch state of one solve call.
///
/// Owned exclusively for the duration of the call; nothing here survives it
/// or is shared. Every buffer is acquired in [`Workspace::new`] so that the
/// two failure modes surface before the algorithm starts.
struct Workspace<T> {
    n: usize,
    epsilon: T,
    /// Working copy of the costs, kept nonnegative with a zero in every row
    /// and column after reduction.
    reduced: DMatrix<T>,
    /// Cell-level matching membership.
    matched: DMatrix<bool>,
    /// How many covering lines cross each cell: 0, 1 or 2.
    cover: DMatrix<u8>,
    row_matched: Vec<bool>,
    col_matched: Vec<bool>,
    /// Visitation marks of the current search round.
    row_labeled: Vec<bool>,
    col_labeled: Vec<bool>,
    /// For a labeled row, the column that discovered it; and vice versa.
    row_pred: Vec<Option<usize>>,
    col_pred: Vec<Option<usize>>,
}

impl<T: Cost> Workspace<T> {
    fn new<D, S>(costs: &SquareMatrix<T, D, S>, epsilon: T) -> Result<Self, SolveError>
    where
        D: Dim,
        S: RawStorage<T, D, D>,
    {
        let (n, _) = costs.shape();
        let cells = n.checked_mul(n).ok_or(SolveError::ProblemTooLarge)?;
        n.checked_mul(2).ok_or(SolveError::ProblemTooLarge)?;
        cells
            .checked_mul(mem::size_of::<T>())
            .ok_or(SolveError::ProblemTooLarge)?;

        let mut entries = Vec::new();
        entries
            .try_reserve_exact(cells)
            .map_err(|_| SolveError::NotEnoughMemory)?;
        // nalgebra backing stores are column-major
        for col in 0..n {
            for row in 0..n {
                entries.push(costs[(row, col)]);
            }
        }

        Ok(Workspace {
            n,
            epsilon,
            reduced: DMatrix::from_vec(n, n, entries),
            matched: DMatrix::from_vec(n, n, try_filled(false, cells)?),
            cover: DMatrix::from_vec(n, n, try_filled(0u8, cells)?),
            row_matched: try_filled(false, n)?,
            col_matched: try_filled(false, n)?,
            row_labeled: try_filled(false, n)?,
            col_labeled: try_filled(false, n)?,
            row_pred: try_filled(None, n)?,
            col_pred: try_filled(None, n)?,
        })
    }

    /// Subtract each row's minimum from the row, leaving a zero behind.
    ///
    /// The guard is on a nonzero minimum rather than a positive one, so
    /// rows with negative minima are lifted as well; every entry stays
    /// nonnegative for any real input.
    fn reduce_rows(&mut self) {
        for mut row in self.reduced.row_iter_mut() {
            let mut min = T::max_value();
            for &w in row.iter() {
                if w < min {
                    min = w;
                }
            }
            if !min.is_zero() {
                for w in row.iter_mut() {
                    *w = snap(*w - min, self.epsilon);
                }
            }
        }
    }

    /// Column-wise counterpart of [`Workspace::reduce_rows`].
    fn reduce_columns(&mut self) {
        for mut col in self.reduced.column_iter_mut() {
            let mut min = T::max_value();
            for &w in col.iter() {
                if w < min {
                    min = w;
                }
            }
            if !min.is_zero() {
                for w in col.iter_mut() {
                    *w = snap(*w - min, self.epsilon);
                }
            }
        }
    }

    /// Greedy first matching: each row takes its first zero on a free column.
    fn seed_matching(&mut self) {
        for row in 0..self.n {
            for col in 0..self.n {
                if self.reduced[(row, col)].is_zero() && !self.col_matched[col] {
                    self.matched[(row, col)] = true;
                    self.row_matched[row] = true;
                    self.col_matched[col] = true;
                    break;
                }
            }
        }
    }

    /// Grow the matching until no augmenting path is left.
    ///
    /// Labels and predecessors reset once per round and are then shared by
    /// every search root within it. A round that found no path therefore
    /// leaves the union of all alternating trees behind, which is the state
    /// [`Workspace::build_cover`] reads.
    fn maximize_matching(&mut self) {
        loop {
            self.row_labeled.fill(false);
            self.col_labeled.fill(false);
            self.row_pred.fill(None);
            self.col_pred.fill(None);

            let mut tail = None;
            for row in 0..self.n {
                if self.row_matched[row] {
                    continue;
                }
                let has_zero = (0..self.n).any(|col| self.reduced[(row, col)].is_zero());
                if !has_zero {
                    continue;
                }
                self.row_labeled[row] = true;
                if let Some(found) = self.search_row(row) {
                    tail = Some(found);
                    break;
                }
            }

            match tail {
                Some(col) => self.augment(col),
                None => return,
            }
        }
    }

    /// Row side of the alternating depth-first search: follow zero-cost
    /// edges outside the matching, in column order.
    fn search_row(&mut self, row: usize) -> Option<usize> {
        for col in 0..self.n {
            if self.reduced[(row, col)].is_zero()
                && !self.matched[(row, col)]
                && !self.col_labeled[col]
            {
                self.col_labeled[col] = true;
                self.col_pred[col] = Some(row);
                if let Some(tail) = self.search_column(col) {
                    return Some(tail);
                }
            }
        }
        None
    }

    /// Column side: a free column terminates the path; a matched column can
    /// only be left through its matching edge.
    fn search_column(&mut self, col: usize) -> Option<usize> {
        if !self.col_matched[col] {
            return Some(col);
        }
        for row in 0..self.n {
            if self.matched[(row, col)] && !self.row_labeled[row] {
                self.row_labeled[row] = true;
                self.row_pred[row] = Some(col);
                if let Some(tail) = self.search_row(row) {
                    return Some(tail);
                }
            }
        }
        None
    }

    /// Flip edge membership along the predecessor chain behind `tail`, then
    /// mark both endpoints matched. Grows the matching by exactly one.
    fn augment(&mut self, tail: usize) {
        trace!("augmenting path ends in column {tail}");
        self.col_matched[tail] = true;
        let mut col = tail;
        while let Some(row) = self.col_pred[col] {
            self.matched[(row, col)] = true;
            match self.row_pred[row] {
                Some(previous) => {
                    self.matched[(row, previous)] = false;
                    col = previous;
                }
                None => {
                    self.row_matched[row] = true;
                    break;
                }
            }
        }
    }

    /// König cover from the stalled search: unlabeled rows and labeled
    /// columns of matched pairs each cover their whole line. Returns the
    /// matching size.
    fn build_cover(&mut self) -> usize {
        self.cover.fill(0);
        let mut size = 0;
        for row in 0..self.n {
            for col in 0..self.n {
                if !self.matched[(row, col)] {
                    continue;
                }
                size += 1;
                if !self.row_labeled[row] {
                    for k in 0..self.n {
                        self.cover[(row, k)] += 1;
                    }
                }
                if self.col_labeled[col] {
                    for k in 0..self.n {
                        self.cover[(k, col)] += 1;
                    }
                }
            }
        }
        size
    }

    /// Shift reduced costs by the smallest uncovered value: uncovered cells
    /// go down and doubly covered cells go up, while singly covered cells
    /// keep their value. At least one new zero appears among the previously
    /// uncovered cells.
    fn adjust_costs(&mut self) {
        let mut delta = T::max_value();
        for col in 0..self.n {
            for row in 0..self.n {
                if self.cover[(row, col)] == 0 && self.reduced[(row, col)] < delta {
                    delta = self.reduced[(row, col)];
                }
            }
        }
        // a matching smaller than n always leaves uncovered cells
        debug_assert!(delta < T::max_value());
        debug!("shifting uncovered costs by {delta:?}");

        for col in 0..self.n {
            for row in 0..self.n {
                match self.cover[(row, col)] {
                    0 => {
                        let shifted = self.reduced[(row, col)] - delta;
                        self.reduced[(row, col)] = snap(shifted, self.epsilon);
                    }
                    2 => self.reduced[(row, col)] += delta,
                    _ => {}
                }
            }
        }
    }

    /// Matched pairs in ascending row order. Meaningful once the matching is
    /// perfect.
    fn collect_pairs(&self, pairs: &mut Vec<(usize, usize)>) {
        pairs.clear();
        for row in 0..self.n {
            for col in 0..self.n {
                if self.matched[(row, col)] {
                    pairs.push((row, col));
                }
            }
        }
    }
}

fn try_filled<U: Clone>(value: U, len: usize) -> Result<Vec<U>, SolveError> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| SolveError::NotEnoughMemory)?;
    buffer.resize(len, value);
    Ok(buffer)
}

fn snap<T: Cost>(value: T, epsilon: T) -> T {
    if value.abs() < epsilon {
        T::zero()
    } else {
        value
    }
}
