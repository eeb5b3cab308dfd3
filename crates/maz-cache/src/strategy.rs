//! Cache freshness strategies

use std::time::Duration;

use crate::kind::ObjectType;

/// Time-to-live based freshness policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlStrategy {
    ttl: Duration,
}

impl TtlStrategy {
    /// Create new TTL strategy
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// Create TTL strategy with seconds
    pub fn with_seconds(seconds: u64) -> Self {
        Self::new(Duration::from_secs(seconds))
    }

    /// Create TTL strategy with minutes
    pub fn with_minutes(minutes: u64) -> Self {
        Self::new(Duration::from_secs(minutes * 60))
    }

    /// Create TTL strategy with hours
    pub fn with_hours(hours: u64) -> Self {
        Self::new(Duration::from_secs(hours * 3600))
    }

    /// Default policy for an object type
    pub fn for_kind(kind: ObjectType) -> Self {
        Self::new(kind.default_ttl())
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// `age` of `None` means there is no usable cache file, which is always stale
    pub fn is_stale(&self, age: Option<Duration>) -> bool {
        match age {
            None => true,
            Some(age) => age > self.ttl,
        }
    }
}

/// Inputs to the refresh decision for one cache
#[derive(Debug, Clone, Copy)]
pub struct Freshness {
    pub forced: bool,
    pub count: usize,
    pub age: Option<Duration>,
}

impl Freshness {
    /// Stale when forced, empty, without a file, or older than the TTL
    pub fn needs_refresh(&self, strategy: &TtlStrategy) -> bool {
        self.forced || self.count == 0 || strategy.is_stale(self.age)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_constructors() {
        assert_eq!(TtlStrategy::with_minutes(30).ttl(), Duration::from_secs(1800));
        assert_eq!(TtlStrategy::with_hours(24).ttl(), Duration::from_secs(86_400));
        assert_eq!(
            TtlStrategy::for_kind(ObjectType::Group),
            TtlStrategy::with_minutes(30)
        );
        assert_eq!(
            TtlStrategy::for_kind(ObjectType::Subscription),
            TtlStrategy::with_hours(24)
        );
    }

    #[test]
    fn test_missing_file_is_stale() {
        let ttl = TtlStrategy::with_minutes(30);
        assert!(ttl.is_stale(None));
        assert!(!ttl.is_stale(Some(Duration::from_secs(60))));
        assert!(ttl.is_stale(Some(Duration::from_secs(31 * 60))));
    }

    #[test]
    fn test_needs_refresh() {
        let ttl = TtlStrategy::with_minutes(30);
        let fresh = Freshness {
            forced: false,
            count: 10,
            age: Some(Duration::from_secs(5)),
        };
        assert!(!fresh.needs_refresh(&ttl));
        assert!(Freshness { forced: true, ..fresh }.needs_refresh(&ttl));
        assert!(Freshness { count: 0, ..fresh }.needs_refresh(&ttl));
        assert!(Freshness { age: None, ..fresh }.needs_refresh(&ttl));
    }
}
