//! Implements a merge tree to merge an arbitrary number of sorted runs.
//! Genericized in order to build arbitrary merge trees.
//!
//! The merge is stable: when two heads compare equal, the one from the source given earlier to
//! build() is yielded first. The shuffle relies on this to keep the values of one key in the
//! order the map tasks produced them.

use std::cmp::Ordering;
use std::iter;

use crate::sort::{default_generic_compare, Comparer};

type Source<'a, T> = Box<dyn Iterator<Item = T> + 'a>;

/// See module description.
/// This type uses dynamic instead of static dispatch because it realizes an arbitrary structure
/// and can therefore not work with a single type signature.
pub struct ShardMergeIterator<'a, T> {
    left: iter::Fuse<Source<'a, T>>,
    right: iter::Fuse<Source<'a, T>>,

    left_peeked: Option<T>,
    right_peeked: Option<T>,

    cmp: Comparer<T>,
}

impl<'a, T: 'a> Iterator for ShardMergeIterator<'a, T> {
    type Item = T;
    fn next(&mut self) -> Option<Self::Item> {
        // fill up
        if self.left_peeked.is_none() {
            self.left_peeked = self.left.next();
        }
        if self.right_peeked.is_none() {
            self.right_peeked = self.right.next();
        }

        // Consume peeked values
        match (&self.left_peeked, &self.right_peeked) {
            (None, None) => None,
            (Some(_), None) => self.left_peeked.take(),
            (None, Some(_)) => self.right_peeked.take(),
            (Some(l), Some(r)) => {
                if (self.cmp)(l, r) != Ordering::Greater {
                    self.left_peeked.take()
                } else {
                    self.right_peeked.take()
                }
            }
        }
    }
}

impl<'a, T: Ord + 'a> ShardMergeIterator<'a, T> {
    /// Builds a merge tree over sources ordered by T's natural order.
    pub fn build<It, ItIt>(sources: ItIt) -> ShardMergeIterator<'a, T>
    where
        It: Iterator<Item = T> + 'a,
        ItIt: IntoIterator<Item = It>,
    {
        ShardMergeIterator::build_with(sources, default_generic_compare)
    }
}

impl<'a, T: 'a> ShardMergeIterator<'a, T> {
    fn node(left: Source<'a, T>, right: Source<'a, T>, cmp: Comparer<T>) -> Self {
        ShardMergeIterator {
            left: left.fuse(),
            right: right.fuse(),
            left_peeked: None,
            right_peeked: None,
            cmp,
        }
    }

    /// Takes multiple sorted iterators and generates one ShardMergeIterator
    /// (yes, iterator over a collection of iterators) ordered by `cmp`.
    pub fn build_with<It, ItIt>(sources: ItIt, cmp: Comparer<T>) -> ShardMergeIterator<'a, T>
    where
        It: Iterator<Item = T> + 'a,
        ItIt: IntoIterator<Item = It>,
    {
        let mut merged: Vec<ShardMergeIterator<'a, T>> = Vec::new();
        let mut sources = sources.into_iter();

        // Initial merging: Merge pairs of input iterators together.
        while let Some(src1) = sources.next() {
            let right: Source<'a, T> = match sources.next() {
                None => Box::new(iter::empty()),
                Some(src2) => Box::new(src2),
            };
            merged.push(ShardMergeIterator::node(Box::new(src1), right, cmp));
        }

        // Recursively build the merge tree from the leaves.
        ShardMergeIterator::merge(merged, cmp)
    }

    /// Merge multiple ShardMergeIterators, recursively (meaning it will result in a more or less
    /// balanced merge sort tree). Order of `its` is kept: earlier iterators end up on the left.
    fn merge(mut its: Vec<ShardMergeIterator<'a, T>>, cmp: Comparer<T>) -> Self {
        match its.len() {
            0 => ShardMergeIterator::node(Box::new(iter::empty()), Box::new(iter::empty()), cmp),
            1 => its.remove(0),
            _ => {
                let split_at = its.len() / 2;
                let right = its.split_off(split_at);
                ShardMergeIterator::node(
                    Box::new(ShardMergeIterator::merge(its, cmp)),
                    Box::new(ShardMergeIterator::merge(right, cmp)),
                    cmp,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ShardMergeIterator;
    use crate::record_types::Record;
    use crate::sort::record_key_compare;
    use std::vec;

    fn get_collection_1() -> vec::IntoIter<i32> {
        vec![1, 4, 5, 5, 6, 9, 11, 15, 15, 17, 18, 20].into_iter()
    }
    fn get_collection_2() -> vec::IntoIter<i32> {
        vec![2, 2, 2, 3, 4, 5, 7, 8, 9, 10, 45, 46, 47].into_iter()
    }
    fn get_collection_3() -> vec::IntoIter<i32> {
        vec![5, 8, 9, 10, 22, 25, 30, 37, 41, 46, 71].into_iter()
    }
    fn get_collection_4() -> vec::IntoIter<i32> {
        vec![111, 112, 113, 155].into_iter()
    }
    fn get_collection_5() -> vec::IntoIter<i32> {
        vec![13, 45, 98, 105, 145].into_iter()
    }

    #[test]
    fn test_merge_iterator() {
        let it = ShardMergeIterator::build(vec![
            get_collection_1(),
            get_collection_2(),
            get_collection_3(),
            get_collection_4(),
            get_collection_5(),
        ]);
        let mut cmp = 0;
        let mut cnt = 0;

        for i in it {
            assert!(i >= cmp);
            cmp = i;
            cnt += 1;
        }

        assert_eq!(
            cnt,
            get_collection_1().len()
                + get_collection_2().len()
                + get_collection_3().len()
                + get_collection_4().len()
                + get_collection_5().len()
        );
    }

    #[test]
    fn test_merge_no_sources() {
        let it = ShardMergeIterator::build(Vec::<vec::IntoIter<i32>>::new());
        assert_eq!(it.count(), 0);
    }

    #[test]
    fn test_merge_is_stable_across_sources() {
        let runs = vec![
            vec![Record::new("a", "r0"), Record::new("b", "r0")],
            vec![Record::new("a", "r1")],
            vec![Record::new("a", "r2"), Record::new("c", "r2")],
        ];
        let merged: Vec<String> =
            ShardMergeIterator::build_with(runs.into_iter().map(|r| r.into_iter()), record_key_compare)
                .map(|r| r.to_string())
                .collect();
        assert_eq!(merged, vec!["a\tr0", "a\tr1", "a\tr2", "b\tr0", "c\tr2"]);
    }
}
