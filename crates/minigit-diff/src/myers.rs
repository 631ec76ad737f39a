//! Myers' O(ND) shortest edit script.
//!
//! The edit graph has `prev` along the x axis and `curr` along the y axis.
//! Every layer `d` records the furthest x reached on each diagonal `k = x - y`
//! using exactly `d` insertions and deletions; the recorded layers are then
//! walked backwards from `(n, m)` to recover the script.

use std::ops::{Index, IndexMut};

/// What a single step of an edit script does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditKind {
    /// Both sequences advance; the items are equal.
    Equal,
    /// Only `curr` advances.
    Insert,
    /// Only `prev` advances.
    Delete,
}

/// One step of an edit script.
///
/// `old_index` and `new_index` are the positions in `prev` and `curr` where
/// the step starts. An insertion consumes `curr[new_index]`, a deletion
/// consumes `prev[old_index]`, an equal step consumes both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edit {
    /// Step kind.
    pub kind: EditKind,
    /// Position in the old sequence.
    pub old_index: usize,
    /// Position in the new sequence.
    pub new_index: usize,
}

impl Edit {
    fn new(kind: EditKind, old_index: isize, new_index: isize) -> Self {
        Self {
            kind,
            old_index: old_index as usize,
            new_index: new_index as usize,
        }
    }
}

/// A vector indexed by diagonals `-bound..=bound`.
#[derive(Debug, Clone)]
pub(crate) struct OffsetVec {
    data: Vec<isize>,
    offset: isize,
}

impl OffsetVec {
    pub(crate) fn new(bound: usize) -> Self {
        Self {
            data: vec![0; 2 * bound + 1],
            offset: bound as isize,
        }
    }

    fn slot(&self, k: isize) -> usize {
        (k + self.offset) as usize
    }
}

impl Index<isize> for OffsetVec {
    type Output = isize;

    fn index(&self, k: isize) -> &isize {
        &self.data[self.slot(k)]
    }
}

impl IndexMut<isize> for OffsetVec {
    fn index_mut(&mut self, k: isize) -> &mut isize {
        let slot = self.slot(k);
        &mut self.data[slot]
    }
}

/// Computes a shortest edit script turning `prev` into `curr`.
///
/// Runs in O((n + m) * D) time and space, where D is the edit distance.
pub fn shortest_edit<T: PartialEq>(prev: &[T], curr: &[T]) -> Vec<Edit> {
    let trace = trace(prev, curr);
    backtrack(&trace, prev.len(), curr.len())
}

/// Whether the furthest point on diagonal `k` at layer `d` is reached by an
/// insertion from diagonal `k + 1` rather than a deletion from `k - 1`.
fn from_above(v: &OffsetVec, k: isize, d: isize) -> bool {
    k == -d || (k != d && v[k - 1] < v[k + 1])
}

/// Runs the forward pass, returning the diagonal table as it stood at the
/// start of each layer up to and including the one that reaches `(n, m)`.
fn trace<T: PartialEq>(prev: &[T], curr: &[T]) -> Vec<OffsetVec> {
    let (n, m) = (prev.len() as isize, curr.len() as isize);
    let max = prev.len() + curr.len();

    // one spare slot on each side so `k + 1` is addressable at k = max
    let mut v = OffsetVec::new(max + 1);
    let mut trace = Vec::new();

    for d in 0..=max as isize {
        trace.push(v.clone());

        for k in (-d..=d).step_by(2) {
            let mut x = if from_above(&v, k, d) {
                v[k + 1]
            } else {
                v[k - 1] + 1
            };
            let mut y = x - k;

            while x < n && y < m && prev[x as usize] == curr[y as usize] {
                x += 1;
                y += 1;
            }
            v[k] = x;

            if x >= n && y >= m {
                return trace;
            }
        }
    }

    trace
}

fn backtrack(trace: &[OffsetVec], n: usize, m: usize) -> Vec<Edit> {
    let mut edits = Vec::new();
    let (mut x, mut y) = (n as isize, m as isize);

    for (d, v) in trace.iter().enumerate().rev() {
        let d = d as isize;
        let k = x - y;

        let prev_k = if from_above(v, k, d) { k + 1 } else { k - 1 };
        let prev_x = v[prev_k];
        let prev_y = prev_x - prev_k;

        while x > prev_x && y > prev_y {
            edits.push(Edit::new(EditKind::Equal, x - 1, y - 1));
            x -= 1;
            y -= 1;
        }

        if d > 0 {
            let kind = if x == prev_x {
                EditKind::Insert
            } else {
                EditKind::Delete
            };
            edits.push(Edit::new(kind, prev_x, prev_y));
        }

        x = prev_x;
        y = prev_y;
    }

    edits.reverse();
    edits
}
