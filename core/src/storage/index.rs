use std::collections::BTreeMap;
use std::ops::{Bound, RangeBounds};

/// Which way a walk moves through the outer buckets and through the items of
/// each bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WalkDirection {
    pub outer_forward: bool,
    pub inner_forward: bool,
}

/// Two-level ordered index: outer buckets keyed by the partition key (scan
/// time, instance name), each holding items ordered by a secondary key.
pub(crate) struct BucketIndex<K, I, V> {
    buckets: BTreeMap<K, BTreeMap<I, V>>,
    len: usize,
}

impl<K, I, V> Default for BucketIndex<K, I, V> {
    fn default() -> Self {
        Self {
            buckets: BTreeMap::new(),
            len: 0,
        }
    }
}

type Walk<'a, V> = Box<dyn Iterator<Item = &'a V> + 'a>;

impl<K, I, V> BucketIndex<K, I, V>
where
    K: Ord + Clone,
    I: Ord + Clone,
{
    /// Inserts without overwriting; returns `false` if the pair already exists.
    pub fn insert(&mut self, key: K, item: I, value: V) -> bool {
        let bucket = self.buckets.entry(key).or_default();
        if bucket.contains_key(&item) {
            return false;
        }
        bucket.insert(item, value);
        self.len += 1;
        true
    }

    pub fn remove(&mut self, key: &K, item: &I) -> Option<V> {
        let bucket = self.buckets.get_mut(key)?;
        let removed = bucket.remove(item)?;
        if bucket.is_empty() {
            self.buckets.remove(key);
        }
        self.len -= 1;
        Some(removed)
    }

    pub fn get(&self, key: &K, item: &I) -> Option<&V> {
        self.buckets.get(key)?.get(item)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn first_key(&self) -> Option<&K> {
        self.buckets.keys().next()
    }

    pub fn last_key(&self) -> Option<&K> {
        self.buckets.keys().next_back()
    }

    /// Bucket keys with the number of items under each.
    pub fn bucket_sizes(&self) -> impl Iterator<Item = (&K, usize)> + '_ {
        self.buckets.iter().map(|(key, bucket)| (key, bucket.len()))
    }

    /// Items with an outer key inside `bounds`, visited in `direction`. With
    /// `from`, the walk starts strictly past that position.
    pub fn walk<'a>(
        &'a self,
        bounds: (Bound<K>, Bound<K>),
        from: Option<(K, I)>,
        direction: WalkDirection,
    ) -> Walk<'a, V>
    where
        K: 'a,
        I: 'a,
    {
        let inner_forward = direction.inner_forward;
        let Some((key, item)) = from else {
            let buckets = self.buckets.range(bounds);
            return if direction.outer_forward {
                Box::new(buckets.flat_map(move |(_, b)| Self::items(b, None, inner_forward)))
            } else {
                Box::new(
                    buckets
                        .rev()
                        .flat_map(move |(_, b)| Self::items(b, None, inner_forward)),
                )
            };
        };

        let head: Walk<'a, V> = match self.buckets.get(&key) {
            Some(bucket) if bounds.contains(&key) => Self::items(bucket, Some(item), inner_forward),
            _ => Box::new(std::iter::empty()),
        };

        let tail: Walk<'a, V> = if direction.outer_forward {
            let upper = bounds.clone();
            Box::new(
                self.buckets
                    .range((Bound::Excluded(key), Bound::Unbounded))
                    .skip_while(move |(k, _)| !bounds.contains(*k))
                    .take_while(move |(k, _)| upper.contains(*k))
                    .flat_map(move |(_, b)| Self::items(b, None, inner_forward)),
            )
        } else {
            let lower = bounds.clone();
            Box::new(
                self.buckets
                    .range((Bound::Unbounded, Bound::Excluded(key)))
                    .rev()
                    .skip_while(move |(k, _)| !bounds.contains(*k))
                    .take_while(move |(k, _)| lower.contains(*k))
                    .flat_map(move |(_, b)| Self::items(b, None, inner_forward)),
            )
        };

        Box::new(head.chain(tail))
    }

    fn items<'a>(bucket: &'a BTreeMap<I, V>, after: Option<I>, forward: bool) -> Walk<'a, V> {
        match (after, forward) {
            (None, true) => Box::new(bucket.values()),
            (None, false) => Box::new(bucket.values().rev()),
            (Some(item), true) => Box::new(
                bucket
                    .range((Bound::Excluded(item), Bound::Unbounded))
                    .map(|(_, v)| v),
            ),
            (Some(item), false) => Box::new(
                bucket
                    .range((Bound::Unbounded, Bound::Excluded(item)))
                    .rev()
                    .map(|(_, v)| v),
            ),
        }
    }
}
