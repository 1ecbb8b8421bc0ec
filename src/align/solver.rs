//! The solution tree of a locally correct bottleneck matching.
//!
//! Every cell `(i, j)` of the grid picks a predecessor among `(i, j - 1)`,
//! `(i - 1, j - 1)` and `(i - 1, j)`, so the predecessor links form a tree
//! rooted at `(0, 0)`. Choosing a predecessor means comparing two candidate
//! paths by the largest cost between each candidate and the point where
//! their paths merge. Walking the paths cell by cell is quadratic, so we
//! keep shortcuts: every cell may point (upward and rightward) to an
//! ancestor further down, summarizing the maximum cost along the way. Dead
//! branches are pruned as the working boundary moves on, and the shortcuts
//! that pointed into them are extended past the pruned branching point.

use crate::{distance::CostMatrix, num::EPS};

use super::matching::Matching;

impl_typed_vec!(
    /// The cells of the grid, in row-major order.
    CellVec,
    /// An index into the cell arena; cell `(i, j)` has index `i * cols + j`.
    CellIdx,
    "c"
);

impl_typed_vec!(
    /// All shortcuts ever allocated. Detached shortcuts are never reused.
    ShortcutVec,
    /// An index into the shortcut arena.
    ShortcutIdx,
    "sc"
);

/// How a shortcut arrives at its target: through the target's up, right or
/// diagonal branch. The diagonal branch is split by the kind of shortcut
/// travelling through it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Arrival {
    Up = 0,
    Right = 1,
    DiagUp = 2,
    DiagRight = 3,
}

/// The two kinds of shortcut.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Dir {
    Up,
    Right,
}

#[derive(Clone, Debug)]
struct Shortcut {
    from: CellIdx,
    to: CellIdx,
    arrival: Arrival,
    /// The largest cost from `from` (inclusive) to `to` (exclusive).
    max: f64,
}

#[derive(Clone, Debug, Default)]
struct Cell {
    i: usize,
    j: usize,
    cost: f64,
    pred: Option<CellIdx>,
    up: Option<CellIdx>,
    diagonal: Option<CellIdx>,
    right: Option<CellIdx>,
    sc_up: Option<ShortcutIdx>,
    sc_right: Option<ShortcutIdx>,
    incoming: [Vec<ShortcutIdx>; 4],
}

impl Cell {
    fn out_degree(&self) -> usize {
        self.up.is_some() as usize + self.diagonal.is_some() as usize + self.right.is_some() as usize
    }

    fn shortcut(&self, dir: Dir) -> Option<ShortcutIdx> {
        match dir {
            Dir::Up => self.sc_up,
            Dir::Right => self.sc_right,
        }
    }

    fn shortcut_mut(&mut self, dir: Dir) -> &mut Option<ShortcutIdx> {
        match dir {
            Dir::Up => &mut self.sc_up,
            Dir::Right => &mut self.sc_right,
        }
    }
}

/// An incrementally filled solution tree over a cost matrix.
///
/// Cells are filled row by row (`i` outer, `j` inner); [`SolutionTree::step`]
/// fills one, [`SolutionTree::finish`] fills the rest.
#[derive(Debug)]
pub struct SolutionTree<'a> {
    costs: &'a CostMatrix,
    cells: CellVec<Cell>,
    shortcuts: ShortcutVec<Shortcut>,
    next_i: usize,
    next_j: usize,
    longest_walk: usize,
}

const ROOT: CellIdx = CellIdx(0);

impl<'a> SolutionTree<'a> {
    /// Creates a tree whose first row and column are straight paths from
    /// the origin.
    pub fn new(costs: &'a CostMatrix) -> Self {
        let (n, m) = (costs.rows(), costs.cols());
        let mut cells = CellVec::with_capacity(n * m);
        for i in 0..n {
            for j in 0..m {
                cells.push(Cell {
                    i,
                    j,
                    cost: costs.get(i, j),
                    ..Cell::default()
                });
            }
        }

        let mut tree = SolutionTree {
            costs,
            cells,
            shortcuts: ShortcutVec::default(),
            next_i: 1,
            next_j: 1,
            longest_walk: 0,
        };
        for i in 1..n {
            let (prev, cur) = (tree.idx(i - 1, 0), tree.idx(i, 0));
            tree.cells[cur].pred = Some(prev);
            tree.cells[prev].right = Some(cur);
        }
        for j in 1..m {
            let (prev, cur) = (tree.idx(0, j - 1), tree.idx(0, j));
            tree.cells[cur].pred = Some(prev);
            tree.cells[prev].up = Some(cur);
        }
        tree
    }

    fn idx(&self, i: usize, j: usize) -> CellIdx {
        CellIdx(i * self.costs.cols() + j)
    }

    /// Have all cells been filled?
    ///
    /// Grids with a single row or column are complete right after seeding.
    pub fn done(&self) -> bool {
        self.next_i >= self.costs.rows() || self.costs.cols() < 2
    }

    /// Fills the next cell, if there is one.
    pub fn step(&mut self) {
        if !self.done() {
            self.expand(self.next_i, self.next_j);
        }
    }

    /// Fills all remaining cells.
    pub fn finish(&mut self) {
        while !self.done() {
            self.expand(self.next_i, self.next_j);
        }
        if self.longest_walk > 3 {
            tracing::trace!(
                rows = self.costs.rows(),
                cols = self.costs.cols(),
                longest_walk = self.longest_walk,
                "long shortcut walk"
            );
        }
    }

    /// The predecessor of cell `(i, j)`, if it has been decided.
    pub fn pred(&self, i: usize, j: usize) -> Option<(usize, usize)> {
        self.cells[self.idx(i, j)].pred.map(|p| {
            let cell = &self.cells[p];
            (cell.i, cell.j)
        })
    }

    /// Backtracks from the far corner to the origin.
    ///
    /// Only meaningful once [`SolutionTree::done`] returns true.
    pub fn matching(&self) -> Matching {
        if self.cells.is_empty() {
            return Matching::default();
        }
        let mut cells = Vec::new();
        let mut cur = Some(CellIdx(self.cells.len() - 1));
        while let Some(c) = cur {
            cells.push((self.cells[c].i, self.cells[c].j));
            cur = self.cells[c].pred;
        }
        cells.reverse();
        Matching::from_cells(cells, self.costs)
    }

    fn on_working_boundary(&self, c: CellIdx) -> bool {
        let cell = &self.cells[c];
        if cell.j >= self.next_j {
            cell.i + 1 >= self.next_i
        } else {
            cell.i >= self.next_i
        }
    }

    fn add_shortcut(&mut self, from: CellIdx, to: CellIdx, arrival: Arrival, max: f64) -> ShortcutIdx {
        let sc = self.shortcuts.push(Shortcut {
            from,
            to,
            arrival,
            max,
        });
        self.cells[to].incoming[arrival as usize].push(sc);
        sc
    }

    /// A shortcut from `from` that continues along the `dir` shortcut of
    /// `via`, absorbing `from`'s own cost.
    fn chain_shortcut(&mut self, from: CellIdx, via: ShortcutIdx) -> ShortcutIdx {
        let Shortcut {
            to, arrival, max, ..
        } = self.shortcuts[via];
        let max = max.max(self.cells[from].cost);
        self.add_shortcut(from, to, arrival, max)
    }

    /// Makes sure `c` has a `dir` shortcut, creating it from its predecessor.
    ///
    /// `c` must not be the root.
    fn ensure_shortcut(&mut self, c: CellIdx, dir: Dir) {
        if self.cells[c].shortcut(dir).is_some() {
            return;
        }
        let Some(pred) = self.cells[c].pred else {
            return;
        };
        let direct = match dir {
            Dir::Up => Arrival::Right,
            Dir::Right => Arrival::Up,
        };
        let pred_sc = self.cells[pred].shortcut(dir);
        let sc = match pred_sc {
            Some(via) if pred != ROOT && self.cells[pred].out_degree() == 1 => {
                self.chain_shortcut(c, via)
            }
            _ => {
                let cost = self.cells[c].cost;
                self.add_shortcut(c, pred, direct, cost)
            }
        };
        *self.cells[c].shortcut_mut(dir) = Some(sc);
    }

    /// The `dir` shortcut for a cell that stepped diagonally from `diagonal`.
    fn diagonal_shortcut(&mut self, node: CellIdx, diagonal: CellIdx, dir: Dir) {
        let (branch, arrival) = match dir {
            Dir::Up => (self.cells[diagonal].up, Arrival::DiagUp),
            Dir::Right => (self.cells[diagonal].right, Arrival::DiagRight),
        };
        let sc = match (branch, self.cells[diagonal].shortcut(dir)) {
            (None, Some(via)) => self.chain_shortcut(node, via),
            _ => {
                let cost = self.cells[node].cost;
                self.add_shortcut(node, diagonal, arrival, cost)
            }
        };
        *self.cells[node].shortcut_mut(dir) = Some(sc);
    }

    fn expand(&mut self, i: usize, j: usize) {
        let node = self.idx(i, j);
        let down = self.idx(i, j - 1);
        let diagonal = self.idx(i - 1, j - 1);
        let left = self.idx(i - 1, j);

        let mut best = down;
        if self.better(diagonal, best) {
            best = diagonal;
        }
        if self.better(left, best) {
            best = left;
        }

        self.cells[node].pred = Some(best);
        if best == down {
            self.cells[best].up = Some(node);
        } else if best == diagonal {
            self.cells[best].diagonal = Some(node);
        } else {
            self.cells[best].right = Some(node);
        }

        self.ensure_shortcut(down, Dir::Up);
        self.ensure_shortcut(left, Dir::Right);

        if best == down {
            if let Some(via) = self.cells[down].sc_up {
                let sc = self.chain_shortcut(node, via);
                self.cells[node].sc_up = Some(sc);
            }
        } else if best == diagonal {
            self.diagonal_shortcut(node, diagonal, Dir::Right);
            self.diagonal_shortcut(node, diagonal, Dir::Up);
        } else if let Some(via) = self.cells[left].sc_right {
            let sc = self.chain_shortcut(node, via);
            self.cells[node].sc_right = Some(sc);
        }

        if self.cells[diagonal].out_degree() == 0 {
            self.prune(diagonal);
        }

        if self.next_j + 1 == self.costs.cols() {
            self.next_i += 1;
            self.next_j = 1;
        } else {
            self.next_j += 1;
        }
    }

    /// Removes the dead branch ending at `dead`, and fixes up the shortcuts
    /// that pointed into the branching cell it hung from.
    fn prune(&mut self, mut dead: CellIdx) {
        let Some(mut alive) = self.cells[dead].pred else {
            return;
        };
        while alive != ROOT && self.cells[alive].out_degree() == 1 {
            let cell = &mut self.cells[alive];
            cell.up = None;
            cell.diagonal = None;
            cell.right = None;
            dead = alive;
            match cell.pred {
                Some(p) => alive = p,
                None => return,
            }
        }

        let cell = &self.cells[alive];
        if cell.up == Some(dead) {
            self.cells[alive].up = None;
            let arrival = if self.cells[alive].diagonal.is_some() {
                Arrival::DiagUp
            } else {
                Arrival::Right
            };
            self.extend_incoming(alive, arrival, Dir::Up);
        } else if cell.diagonal == Some(dead) {
            self.cells[alive].diagonal = None;
            let cell = &self.cells[alive];
            match (cell.up.is_some(), cell.right.is_some()) {
                (true, true) => {}
                (true, false) => self.extend_incoming(alive, Arrival::Up, Dir::Right),
                (false, _) => self.extend_incoming(alive, Arrival::Right, Dir::Up),
            }
        } else if cell.right == Some(dead) {
            self.cells[alive].right = None;
            let arrival = if self.cells[alive].diagonal.is_some() {
                Arrival::DiagRight
            } else {
                Arrival::Up
            };
            self.extend_incoming(alive, arrival, Dir::Right);
        }
    }

    /// `alive` has stopped branching for the `dir` shortcuts arriving
    /// through `arrival`: extend them along `alive`'s own `dir` shortcut, or
    /// detach the ones whose source doesn't need them any more.
    fn extend_incoming(&mut self, alive: CellIdx, arrival: Arrival, dir: Dir) {
        let Some(with) = self.cells[alive].shortcut(dir) else {
            return;
        };
        let Shortcut {
            to: with_to,
            arrival: with_arrival,
            max: with_max,
            ..
        } = self.shortcuts[with];

        let incoming = std::mem::take(&mut self.cells[alive].incoming[arrival as usize]);
        for sc in incoming {
            let from = self.shortcuts[sc].from;
            if self.cells[from].out_degree() > 1 || self.on_working_boundary(from) {
                let s = &mut self.shortcuts[sc];
                s.to = with_to;
                s.arrival = with_arrival;
                s.max = s.max.max(with_max);
                self.cells[with_to].incoming[with_arrival as usize].push(sc);
            } else {
                *self.cells[from].shortcut_mut(dir) = None;
            }
        }
    }

    /// One step of a walk towards the root along `dir` shortcuts: returns
    /// the next cell and the largest cost passed on the way.
    fn walk(&self, c: CellIdx, dir: Dir) -> (CellIdx, f64) {
        let cell = &self.cells[c];
        if let Some(sc) = cell.shortcut(dir) {
            let sc = &self.shortcuts[sc];
            return (sc.to, sc.max);
        }
        // The root has no predecessor, but we never walk from it.
        let Some(pred) = cell.pred else {
            return (c, cell.cost);
        };
        match self.cells[pred].shortcut(dir) {
            Some(sc) if pred != ROOT => {
                let sc = &self.shortcuts[sc];
                (sc.to, cell.cost.max(sc.max))
            }
            _ => (pred, cell.cost),
        }
    }

    /// Is the path through `a` strictly cheaper than the path through `b`,
    /// measured from the point where they merge?
    fn better(&mut self, a: CellIdx, b: CellIdx) -> bool {
        let a_pred = self.cells[a].pred;
        let b_pred = self.cells[b].pred;
        if a_pred == Some(b) {
            return false;
        }
        if b_pred == Some(a) {
            return self.cells[b].cost > 0.0;
        }
        if a_pred == b_pred {
            return self.cells[a].cost < self.cells[b].cost;
        }

        let (mut wa, mut wb) = (a, b);
        let (mut max_a, mut max_b) = (0.0f64, 0.0f64);
        let mut steps = 0;
        while wa != wb {
            steps += 1;
            let (ca, cb) = (&self.cells[wa], &self.cells[wb]);
            if (ca.i, ca.j) > (cb.i, cb.j) {
                let (next, max) = self.walk(wa, Dir::Right);
                max_a = max_a.max(max);
                wa = next;
            } else {
                let (next, max) = self.walk(wb, Dir::Up);
                max_b = max_b.max(max);
                wb = next;
            }
        }
        self.longest_walk = self.longest_walk.max(steps);

        max_a < max_b - EPS
    }
}

/// Computes the locally correct bottleneck matching of a cost matrix.
pub fn solve(costs: &CostMatrix) -> Matching {
    let mut tree = SolutionTree::new(costs);
    tree.finish();
    tree.matching()
}
