use tc_memory::Shape;

use crate::error::{KernelError, Result};

/// Coordinates of one work-item within a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkItem {
    /// Global (row, col) of the result element this item produces.
    pub global: (usize, usize),
    /// Index within the work-group, also the item's tile slot.
    pub local: usize,
    /// Linear work-group index.
    pub group: usize,
}

/// Partition of an `M x N` result index space into work-groups of shape
/// `1 x T`.
///
/// Each work-group owns one result row and `T` consecutive result columns, so
/// all of its items need the same row of the left operand and can share one
/// scratch tile of it. The inner dimension `K` is walked in blocks of `T`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkPartition {
    rows: usize,
    cols: usize,
    inner: usize,
    tile: usize,
}

impl WorkPartition {
    /// # Errors
    /// `ZeroTileSize`, `InnerNotDivisible` or `ColsNotDivisible` when `tile`
    /// does not evenly block the index space. There is no tail-tile path.
    pub fn new(rows: usize, cols: usize, inner: usize, tile: usize) -> Result<Self> {
        if tile == 0 {
            return Err(KernelError::ZeroTileSize);
        }
        if inner % tile != 0 {
            return Err(KernelError::InnerNotDivisible { inner, tile });
        }
        if cols % tile != 0 {
            return Err(KernelError::ColsNotDivisible { cols, tile });
        }
        Ok(WorkPartition {
            rows,
            cols,
            inner,
            tile,
        })
    }

    /// Partition for `C = A @ B` with `A: lhs` and `B: rhs`.
    pub fn for_matmul(lhs: Shape, rhs: Shape, tile: usize) -> Result<Self> {
        if lhs.cols() != rhs.rows() {
            return Err(KernelError::MatmulMismatch {
                m: lhs.rows(),
                k: lhs.cols(),
                k2: rhs.rows(),
                n: rhs.cols(),
            });
        }
        Self::new(lhs.rows(), rhs.cols(), lhs.cols(), tile)
    }

    /// Global extent `(M, N)`.
    pub fn global_range(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Work-group extent, always `(1, T)`.
    pub fn local_range(&self) -> (usize, usize) {
        (1, self.tile)
    }

    pub fn inner(&self) -> usize {
        self.inner
    }

    pub fn tile_size(&self) -> usize {
        self.tile
    }

    pub fn work_group_size(&self) -> usize {
        self.tile
    }

    pub fn work_group_count(&self) -> usize {
        self.rows * (self.cols / self.tile)
    }

    pub fn work_item_count(&self) -> usize {
        self.rows * self.cols
    }

    /// Number of inner-dimension blocks each item iterates over.
    pub fn blocks(&self) -> usize {
        self.inner / self.tile
    }

    /// Result row and first result column covered by `group`.
    pub fn group_origin(&self, group: usize) -> (usize, usize) {
        let groups_per_row = self.cols / self.tile;
        (group / groups_per_row, (group % groups_per_row) * self.tile)
    }

    /// # Panics
    /// Panics if `group` or `lane` is out of range.
    pub fn work_item(&self, group: usize, lane: usize) -> WorkItem {
        assert!(group < self.work_group_count(), "group {group} out of range");
        assert!(lane < self.tile, "lane {lane} out of range for tile {}", self.tile);
        let (row, col_base) = self.group_origin(group);
        WorkItem {
            global: (row, col_base + lane),
            local: lane,
            group,
        }
    }

    /// All work-items, group by group.
    pub fn work_items(&self) -> impl Iterator<Item = WorkItem> + '_ {
        (0..self.work_group_count())
            .flat_map(move |g| (0..self.tile).map(move |lane| self.work_item(g, lane)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_counts() {
        let p = WorkPartition::new(4, 32, 64, 16).unwrap();
        assert_eq!(p.global_range(), (4, 32));
        assert_eq!(p.local_range(), (1, 16));
        assert_eq!(p.work_group_count(), 8);
        assert_eq!(p.work_item_count(), 128);
        assert_eq!(p.blocks(), 4);
    }

    #[test]
    fn test_covers_every_coordinate_once() {
        let p = WorkPartition::new(3, 16, 8, 4).unwrap();
        let mut seen = HashSet::new();
        for item in p.work_items() {
            assert!(seen.insert(item.global), "duplicate {:?}", item.global);
            assert_eq!(item.global.1 % 4, item.local);
        }
        assert_eq!(seen.len(), 3 * 16);
    }

    #[test]
    fn test_group_shares_row() {
        let p = WorkPartition::new(2, 8, 4, 4).unwrap();
        assert_eq!(p.group_origin(0), (0, 0));
        assert_eq!(p.group_origin(1), (0, 4));
        assert_eq!(p.group_origin(2), (1, 0));
        let rows: HashSet<_> = (0..4).map(|lane| p.work_item(3, lane).global.0).collect();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_inner_not_divisible() {
        let err = WorkPartition::new(100, 100, 100, 16).unwrap_err();
        assert_eq!(err, KernelError::InnerNotDivisible { inner: 100, tile: 16 });
        assert!(err.is_configuration());
    }

    #[test]
    fn test_cols_not_divisible() {
        let err = WorkPartition::new(8, 12, 16, 8).unwrap_err();
        assert_eq!(err, KernelError::ColsNotDivisible { cols: 12, tile: 8 });
    }

    #[test]
    fn test_zero_tile() {
        assert_eq!(WorkPartition::new(4, 4, 4, 0).unwrap_err(), KernelError::ZeroTileSize);
    }

    #[test]
    fn test_for_matmul_mismatch() {
        let err = WorkPartition::for_matmul(Shape::new(2, 3), Shape::new(4, 2), 1).unwrap_err();
        assert_eq!(err, KernelError::MatmulMismatch { m: 2, k: 3, k2: 4, n: 2 });
    }

    #[test]
    #[should_panic]
    fn test_lane_out_of_range() {
        let p = WorkPartition::new(1, 4, 4, 4).unwrap();
        let _ = p.work_item(0, 4);
    }
}
