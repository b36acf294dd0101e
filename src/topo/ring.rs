//! Ring topology: each rank sends to `rank + 1` and receives from `rank - 1` (mod N).

use serde::Serialize;

/// Ring neighbors of one rank. Computed once at startup and never changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RingTopology {
    pub rank: usize,
    pub size: usize,
    pub next: usize,
    pub prev: usize,
}

impl RingTopology {
    /// Resolve the neighbors of `rank` in a group of `size` processes.
    ///
    /// With `size == 1` the ring degenerates to a self-loop (`next == prev == rank`).
    /// A `size` of 0 is treated as 1 so the function stays total.
    pub fn resolve(rank: usize, size: usize) -> Self {
        let size = size.max(1);
        let rank = rank % size;
        Self {
            rank,
            size,
            next: (rank + 1) % size,
            prev: (rank + size - 1) % size,
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.size == 1
    }
}
