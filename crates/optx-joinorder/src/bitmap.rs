//! # Fixed-Width Bitmaps
//!
//! Node sets and edge sets are both represented as a single `u64`. Bit `i` stands for
//! node (or edge) `i`, so a join graph can hold at most [`CAPACITY`] relations and
//! [`CAPACITY`] join predicates. The limit is enforced when the graph is built; every
//! operation here assumes indexes below the capacity.
//!
//! The enumerator relies on two properties of the integer encoding:
//!
//! - Numeric order of two bitmaps is a total, deterministic order over sets.
//! - `(sub - mask) & mask` steps through the non-empty subsets of `mask` in ascending
//!   numeric order without allocating.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Sub};

/// Number of distinct elements a [`Bitmap`] can hold.
pub const CAPACITY: usize = 64;

/// A set of small integers backed by a single machine word.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Bitmap(u64);

impl Bitmap {
    pub const EMPTY: Bitmap = Bitmap(0);

    pub const fn from_bits(bits: u64) -> Self {
        Bitmap(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    /// The set `{index}`.
    pub fn singleton(index: usize) -> Self {
        debug_assert!(index < CAPACITY);
        Bitmap(1u64 << index)
    }

    /// The set `{0, 1, ..., len - 1}`.
    pub fn first_n(len: usize) -> Self {
        if len >= CAPACITY {
            Bitmap(u64::MAX)
        } else {
            Bitmap((1u64 << len) - 1)
        }
    }

    /// The set `{0, 1, ..., index}`.
    pub fn up_to(index: usize) -> Self {
        Self::first_n(index + 1)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn contains(self, index: usize) -> bool {
        index < CAPACITY && self.0 & (1u64 << index) != 0
    }

    pub fn insert(&mut self, index: usize) {
        self.0 |= 1u64 << index;
    }

    pub fn is_subset_of(self, other: Bitmap) -> bool {
        self.0 & other.0 == self.0
    }

    pub fn overlaps(self, other: Bitmap) -> bool {
        self.0 & other.0 != 0
    }

    /// True if one of the two sets contains the other.
    pub fn is_nested_with(self, other: Bitmap) -> bool {
        self.is_subset_of(other) || other.is_subset_of(self)
    }

    /// The set holding only the smallest element, or the empty set.
    pub fn lowest(self) -> Bitmap {
        Bitmap(self.0 & self.0.wrapping_neg())
    }

    pub fn lowest_index(self) -> Option<usize> {
        if self.is_empty() {
            None
        } else {
            Some(self.0.trailing_zeros() as usize)
        }
    }

    /// Every element less than or equal to the smallest element of `self`.
    ///
    /// This is the exclusion set a connected subgraph inherits from its seed node.
    pub fn up_to_lowest(self) -> Bitmap {
        match self.lowest_index() {
            Some(index) => Self::up_to(index),
            None => Bitmap::EMPTY,
        }
    }

    /// Elements in ascending order.
    pub fn iter(self) -> Iter {
        Iter { rest: self.0 }
    }

    /// Elements in descending order.
    pub fn iter_rev(self) -> IterRev {
        IterRev { rest: self.0 }
    }

    /// Non-empty subsets in ascending numeric order.
    pub fn subsets(self) -> Subsets {
        Subsets {
            mask: self.0,
            current: 0,
        }
    }
}

impl BitOr for Bitmap {
    type Output = Bitmap;

    fn bitor(self, rhs: Bitmap) -> Bitmap {
        Bitmap(self.0 | rhs.0)
    }
}

impl BitOrAssign for Bitmap {
    fn bitor_assign(&mut self, rhs: Bitmap) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Bitmap {
    type Output = Bitmap;

    fn bitand(self, rhs: Bitmap) -> Bitmap {
        Bitmap(self.0 & rhs.0)
    }
}

impl BitAndAssign for Bitmap {
    fn bitand_assign(&mut self, rhs: Bitmap) {
        self.0 &= rhs.0;
    }
}

/// Set difference.
impl Sub for Bitmap {
    type Output = Bitmap;

    fn sub(self, rhs: Bitmap) -> Bitmap {
        Bitmap(self.0 & !rhs.0)
    }
}

impl FromIterator<usize> for Bitmap {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut bitmap = Bitmap::EMPTY;
        for index in iter {
            bitmap.insert(index);
        }
        bitmap
    }
}

impl fmt::Display for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, index) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", index)?;
        }
        write!(f, "}}")
    }
}

pub struct Iter {
    rest: u64,
}

impl Iterator for Iter {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.rest == 0 {
            return None;
        }
        let index = self.rest.trailing_zeros() as usize;
        self.rest &= self.rest - 1;
        Some(index)
    }
}

pub struct IterRev {
    rest: u64,
}

impl Iterator for IterRev {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.rest == 0 {
            return None;
        }
        let index = 63 - self.rest.leading_zeros() as usize;
        self.rest &= !(1u64 << index);
        Some(index)
    }
}

pub struct Subsets {
    mask: u64,
    current: u64,
}

impl Iterator for Subsets {
    type Item = Bitmap;

    fn next(&mut self) -> Option<Bitmap> {
        self.current = self.current.wrapping_sub(self.mask) & self.mask;
        if self.current == 0 {
            None
        } else {
            Some(Bitmap(self.current))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_operations() {
        let a: Bitmap = [0, 2, 5].into_iter().collect();
        let b: Bitmap = [2, 3].into_iter().collect();
        assert_eq!((a | b).bits(), 0b101101);
        assert_eq!((a & b).bits(), 0b100);
        assert_eq!((a - b).bits(), 0b100001);
        assert!(a.overlaps(b));
        assert!(Bitmap::singleton(2).is_subset_of(a));
        assert!(!b.is_subset_of(a));
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn test_lowest_and_exclusion_prefix() {
        let s = Bitmap::from_bits(0b10100);
        assert_eq!(s.lowest().bits(), 0b100);
        assert_eq!(s.lowest_index(), Some(2));
        assert_eq!(s.up_to_lowest().bits(), 0b111);
        assert_eq!(Bitmap::EMPTY.lowest_index(), None);
        assert_eq!(Bitmap::up_to(63).bits(), u64::MAX);
    }

    #[test]
    fn test_iteration_order() {
        let s = Bitmap::from_bits(0b1011);
        assert_eq!(s.iter().collect::<Vec<_>>(), vec![0, 1, 3]);
        assert_eq!(s.iter_rev().collect::<Vec<_>>(), vec![3, 1, 0]);
        assert_eq!(Bitmap::singleton(63).iter_rev().next(), Some(63));
    }

    #[test]
    fn test_subsets_ascending() {
        let subsets: Vec<u64> = Bitmap::from_bits(0b1010).subsets().map(Bitmap::bits).collect();
        assert_eq!(subsets, vec![0b0010, 0b1000, 0b1010]);
        assert_eq!(Bitmap::EMPTY.subsets().count(), 0);
    }

    #[test]
    fn test_display() {
        assert_eq!(Bitmap::from_bits(17).to_string(), "{0, 4}");
        assert_eq!(Bitmap::EMPTY.to_string(), "{}");
    }
}
