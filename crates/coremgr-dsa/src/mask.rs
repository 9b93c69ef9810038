use alloc::vec::Vec;
use core::fmt;

use crate::corelist::format_core_list;
use crate::CoreId;

const WORD_BITS: usize = u64::BITS as usize;

/// Growable CPU bitset.
///
/// The in-memory form of every affinity mask the manager computes. Trailing zero
/// words are always trimmed so that two masks naming the same cores compare equal.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct CoreMask {
    words: Vec<u64>,
}

impl CoreMask {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `core`. Returns `true` if it was not already present.
    pub fn set(&mut self, core: CoreId) -> bool {
        let (word, bit) = (core / WORD_BITS, core % WORD_BITS);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        let was_set = self.words[word] & (1u64 << bit) != 0;
        self.words[word] |= 1 << bit;
        !was_set
    }

    /// Removes `core`. Returns `true` if it was present.
    pub fn clear(&mut self, core: CoreId) -> bool {
        let (word, bit) = (core / WORD_BITS, core % WORD_BITS);
        let Some(slot) = self.words.get_mut(word) else {
            return false;
        };
        let was_set = *slot & (1u64 << bit) != 0;
        *slot &= !(1u64 << bit);
        self.trim();
        was_set
    }

    pub fn contains(&self, core: CoreId) -> bool {
        self.words
            .get(core / WORD_BITS)
            .is_some_and(|w| w & (1u64 << (core % WORD_BITS)) != 0)
    }

    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Highest core in the mask.
    pub fn last(&self) -> Option<CoreId> {
        let top = self.words.len().checked_sub(1)?;
        let word = self.words[top];
        Some(top * WORD_BITS + (WORD_BITS - 1 - word.leading_zeros() as usize))
    }

    /// Iterates cores in ascending order.
    pub fn iter(&self) -> Cores<'_> {
        Cores {
            words: &self.words,
            index: 0,
            current: self.words.first().copied().unwrap_or(0),
        }
    }

    pub fn union_with(&mut self, other: &CoreMask) {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (dst, src) in self.words.iter_mut().zip(&other.words) {
            *dst |= *src;
        }
    }

    pub fn difference_with(&mut self, other: &CoreMask) {
        for (dst, src) in self.words.iter_mut().zip(&other.words) {
            *dst &= !*src;
        }
        self.trim();
    }

    pub fn to_vec(&self) -> Vec<CoreId> {
        self.iter().collect()
    }

    fn trim(&mut self) {
        while self.words.last() == Some(&0) {
            self.words.pop();
        }
    }
}

impl FromIterator<CoreId> for CoreMask {
    fn from_iter<I: IntoIterator<Item = CoreId>>(iter: I) -> Self {
        let mut mask = CoreMask::new();
        mask.extend(iter);
        mask
    }
}

impl Extend<CoreId> for CoreMask {
    fn extend<I: IntoIterator<Item = CoreId>>(&mut self, iter: I) {
        for core in iter {
            self.set(core);
        }
    }
}

impl<'a> IntoIterator for &'a CoreMask {
    type Item = CoreId;
    type IntoIter = Cores<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Ascending iterator over the cores of a [`CoreMask`].
pub struct Cores<'a> {
    words: &'a [u64],
    index: usize,
    current: u64,
}

impl Iterator for Cores<'_> {
    type Item = CoreId;

    fn next(&mut self) -> Option<CoreId> {
        while self.current == 0 {
            self.index += 1;
            self.current = *self.words.get(self.index)?;
        }
        let bit = self.current.trailing_zeros() as usize;
        self.current &= self.current - 1;
        Some(self.index * WORD_BITS + bit)
    }
}

/// Kernel cpulist form, e.g. `0-3,8`.
impl fmt::Display for CoreMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_core_list(self.iter()))
    }
}

impl fmt::Debug for CoreMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CoreMask({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_clear_contains() {
        let mut mask = CoreMask::new();
        assert!(mask.set(3));
        assert!(!mask.set(3));
        assert!(mask.set(130));
        assert!(mask.contains(3));
        assert!(mask.contains(130));
        assert!(!mask.contains(4));
        assert_eq!(mask.count(), 2);

        assert!(mask.clear(130));
        assert!(!mask.clear(130));
        assert!(!mask.clear(9000));
        assert_eq!(mask.to_vec(), vec![3]);
    }

    #[test]
    fn test_equality_ignores_cleared_high_words() {
        let mut a: CoreMask = [1, 200].into_iter().collect();
        a.clear(200);
        let b: CoreMask = [1].into_iter().collect();
        assert_eq!(a, b);

        let mut c = b.clone();
        c.clear(1);
        assert!(c.is_empty());
        assert_eq!(c, CoreMask::new());
    }

    #[test]
    fn test_iter_is_ascending() {
        let mask: CoreMask = [65, 0, 64, 7, 63].into_iter().collect();
        assert_eq!(mask.to_vec(), vec![0, 7, 63, 64, 65]);
        assert_eq!(mask.last(), Some(65));
        assert_eq!(CoreMask::new().last(), None);
        assert_eq!(CoreMask::new().iter().next(), None);
    }

    #[test]
    fn test_union_and_difference() {
        let mut a: CoreMask = [0, 1, 2].into_iter().collect();
        let b: CoreMask = [2, 3, 100].into_iter().collect();
        a.union_with(&b);
        assert_eq!(a.to_vec(), vec![0, 1, 2, 3, 100]);

        a.difference_with(&b);
        assert_eq!(a.to_vec(), vec![0, 1]);
    }

    #[test]
    fn test_display() {
        let mask: CoreMask = [0, 1, 2, 3, 8].into_iter().collect();
        assert_eq!(mask.to_string(), "0-3,8");
        assert_eq!(format!("{mask:?}"), "CoreMask(0-3,8)");
        assert_eq!(CoreMask::new().to_string(), "");
    }
}
