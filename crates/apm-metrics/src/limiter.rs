// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounds the number of distinct metric names accepted per flush interval.

use fnv::FnvBuildHasher;
use hashbrown::HashSet;

pub type SeenSet = HashSet<String, FnvBuildHasher>;

/// Admits `name` if it was already seen or if fewer than `max` names have been
/// seen so far. `seen` is only modified when a new name is admitted.
pub fn is_within_limit(seen: &mut SeenSet, name: &str, max: usize) -> bool {
    if seen.contains(name) {
        return true;
    }
    if seen.len() >= max {
        return false;
    }
    seen.insert(name.to_string());
    true
}

/// Per-interval limiter state. Lives in the aggregation store so it resets
/// together with the aggregated data.
#[derive(Debug, Default)]
pub struct CardinalityLimiter {
    seen: SeenSet,
}

impl CardinalityLimiter {
    pub fn admit(&mut self, name: &str, max: usize) -> bool {
        is_within_limit(&mut self.seen, name, max)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_within_limit() {
        let mut seen = SeenSet::default();
        assert!(is_within_limit(&mut seen, "t1", 3));
        assert!(is_within_limit(&mut seen, "t2", 3));
        assert!(is_within_limit(&mut seen, "t3", 3));
        assert!(!is_within_limit(&mut seen, "t4", 3));
        assert!(is_within_limit(&mut seen, "t2", 3));
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_rejected_name_is_not_remembered() {
        let mut limiter = CardinalityLimiter::default();
        assert!(limiter.admit("a", 1));
        assert!(!limiter.admit("b", 1));
        assert!(!limiter.admit("b", 1));
        assert_eq!(limiter.len(), 1);
    }

    #[test]
    fn test_zero_limit_rejects_everything() {
        let mut limiter = CardinalityLimiter::default();
        assert!(!limiter.admit("a", 0));
        assert!(limiter.is_empty());
    }
}
