//! Subscription Chunking
//!
//! Splits an ordered sequence into bounded-size batches. The same algorithm
//! partitions channel identifiers into connection groups and paces in-band
//! subscribe messages on an already-open connection.
//!
//! # Guarantees
//!
//! - Every batch holds between 1 and `max` items.
//! - Concatenating the batches yields the input exactly, in order.
//! - An empty input yields no batches.

use super::trade::ChannelId;

/// Chunking errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    /// The maximum batch size must be positive.
    #[error("batch size must be greater than zero")]
    ZeroBatchSize,
}

/// Lazy iterator over bounded-size batches of an underlying iterator.
#[derive(Debug, Clone)]
pub struct Chunks<I> {
    inner: I,
    max: usize,
}

impl<I: Iterator> Iterator for Chunks<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch: Vec<I::Item> = self.inner.by_ref().take(self.max).collect();
        if batch.is_empty() { None } else { Some(batch) }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (lower, upper) = self.inner.size_hint();
        (
            lower.div_ceil(self.max),
            upper.map(|upper| upper.div_ceil(self.max)),
        )
    }
}

/// Split `items` into batches of at most `max` items, preserving order.
///
/// # Errors
///
/// Returns [`ChunkError::ZeroBatchSize`] if `max` is zero.
pub fn chunked<T, I>(items: I, max: usize) -> Result<Chunks<I::IntoIter>, ChunkError>
where
    I: IntoIterator<Item = T>,
{
    if max == 0 {
        return Err(ChunkError::ZeroBatchSize);
    }
    Ok(Chunks {
        inner: items.into_iter(),
        max,
    })
}

/// The bounded, non-empty set of channels carried by one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionGroup {
    index: usize,
    channels: Vec<ChannelId>,
}

impl ConnectionGroup {
    /// Zero-based position of this group within its pool.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Channels carried by this group, in assignment order.
    #[must_use]
    pub fn channels(&self) -> &[ChannelId] {
        &self.channels
    }

    /// Number of channels in this group.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.channels.len()
    }

    /// Always `false`; groups are never empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// First channel of the group.
    #[must_use]
    pub fn first(&self) -> &ChannelId {
        // Groups are only built from non-empty batches.
        &self.channels[0]
    }

    /// Channels after the first one.
    #[must_use]
    pub fn rest(&self) -> &[ChannelId] {
        &self.channels[1..]
    }
}

/// Partition channel identifiers into connection groups of at most
/// `max_per_connection` channels each.
///
/// # Errors
///
/// Returns [`ChunkError::ZeroBatchSize`] if `max_per_connection` is zero.
pub fn partition(
    channels: impl IntoIterator<Item = ChannelId>,
    max_per_connection: usize,
) -> Result<Vec<ConnectionGroup>, ChunkError> {
    Ok(chunked(channels, max_per_connection)?
        .enumerate()
        .map(|(index, channels)| ConnectionGroup { index, channels })
        .collect())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use super::*;

    fn channel_ids(n: usize) -> Vec<ChannelId> {
        (0..n).map(|i| format!("sym{i}@aggTrade")).collect()
    }

    #[test]
    fn empty_input_yields_no_batches() {
        let batches: Vec<Vec<u32>> = chunked(Vec::new(), 3).unwrap().collect();
        assert!(batches.is_empty());
    }

    #[test]
    fn zero_batch_size_rejected() {
        assert_eq!(
            chunked(vec![1, 2, 3], 0).unwrap_err(),
            ChunkError::ZeroBatchSize
        );
        assert!(partition(channel_ids(3), 0).is_err());
    }

    #[test]
    fn last_batch_holds_remainder() {
        let batches: Vec<Vec<u32>> = chunked(1..=7, 3).unwrap().collect();
        assert_eq!(batches, vec![vec![1, 2, 3], vec![4, 5, 6], vec![7]]);
    }

    #[test]
    fn chunking_is_lazy() {
        // An unbounded source must still produce batches on demand.
        let mut batches = chunked(0.., 4).unwrap();
        assert_eq!(batches.next(), Some(vec![0, 1, 2, 3]));
        assert_eq!(batches.next(), Some(vec![4, 5, 6, 7]));
    }

    #[test]
    fn partition_120_by_50() {
        let groups = partition(channel_ids(120), 50).unwrap();
        let sizes: Vec<usize> = groups.iter().map(ConnectionGroup::len).collect();
        assert_eq!(sizes, vec![50, 50, 20]);
        assert_eq!(groups[2].index(), 2);
        assert_eq!(groups[1].first(), "sym50@aggTrade");
        assert_eq!(groups[2].rest().len(), 19);
    }

    proptest! {
        #[test]
        fn chunks_concatenate_back_to_input(
            items in proptest::collection::vec(any::<u16>(), 0..300),
            max in 1usize..64,
        ) {
            let batches: Vec<Vec<u16>> = chunked(items.clone(), max).unwrap().collect();

            prop_assert_eq!(batches.len(), items.len().div_ceil(max));
            prop_assert!(batches.iter().all(|b| !b.is_empty() && b.len() <= max));

            let flattened: Vec<u16> = batches.into_iter().flatten().collect();
            prop_assert_eq!(flattened, items);
        }

        #[test]
        fn partition_is_disjoint_and_complete(n in 0usize..500, max in 1usize..80) {
            let input = channel_ids(n);
            let groups = partition(input.clone(), max).unwrap();

            let mut seen = HashSet::new();
            for group in &groups {
                prop_assert!(!group.is_empty());
                prop_assert!(group.len() <= max);
                for channel in group.channels() {
                    prop_assert!(seen.insert(channel.clone()), "duplicate {}", channel);
                }
            }
            prop_assert_eq!(seen.len(), input.len());
        }
    }
}
