use std::time::Duration;

/// A bucket name paired with the TTL its entries are usually written with.
///
/// This is only a convenience for callers; the cache itself keeps no state
/// about a bucket's TTL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bucket {
    name: String,
    ttl: Duration,
}

impl Bucket {
    pub fn new(name: impl Into<String>, ttl: Duration) -> Self {
        Self {
            name: name.into(),
            ttl,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_accessors() {
        let bucket = Bucket::new("sessions", Duration::from_secs(4));
        assert_eq!(bucket.name(), "sessions");
        assert_eq!(bucket.ttl(), Duration::from_secs(4));
    }
}
