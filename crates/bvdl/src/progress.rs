use std::sync::atomic::{AtomicU64, Ordering};

/// Running byte count shared by all fetch tasks of one download.
///
/// `add` is the only mutation and is a single atomic increment, so concurrent
/// callers never lose updates.
#[derive(Debug)]
pub struct ProgressAggregator {
    downloaded: AtomicU64,
    total: u64,
}

impl ProgressAggregator {
    pub fn new(total: u64) -> Self {
        Self {
            downloaded: AtomicU64::new(0),
            total,
        }
    }

    /// Record `bytes` more received bytes and return the new running total.
    pub fn add(&self, bytes: u64) -> u64 {
        self.downloaded.fetch_add(bytes, Ordering::AcqRel) + bytes
    }

    pub fn downloaded(&self) -> u64 {
        self.downloaded.load(Ordering::Acquire)
    }

    /// Fraction complete in `[0, 1]`; `0` for a zero-sized resource.
    pub fn fraction(&self) -> f64 {
        fraction(self.downloaded(), self.total)
    }
}

/// `downloaded / total`, clamped to `[0, 1]`.
pub fn fraction(downloaded: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (downloaded as f64 / total as f64).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn fraction_is_clamped() {
        let aggregator = ProgressAggregator::new(100);
        assert_eq!(aggregator.fraction(), 0.0);
        aggregator.add(40);
        assert!((aggregator.fraction() - 0.4).abs() < f64::EPSILON);
        // The open-ended last range may deliver more than the probed size.
        aggregator.add(80);
        assert_eq!(aggregator.fraction(), 1.0);
        assert_eq!(aggregator.downloaded(), 120);
    }

    #[test]
    fn zero_total_reports_zero() {
        let aggregator = ProgressAggregator::new(0);
        aggregator.add(10);
        assert_eq!(aggregator.fraction(), 0.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_adds_are_not_lost() {
        let aggregator = Arc::new(ProgressAggregator::new(8 * 1000 * 3));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let aggregator = aggregator.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..1000 {
                    aggregator.add(3);
                    let seen = aggregator.fraction();
                    assert!((0.0..=1.0).contains(&seen));
                    tokio::task::yield_now().await;
                }
            }));
        }

        for handle in futures::future::join_all(handles).await {
            handle.unwrap();
        }

        assert_eq!(aggregator.downloaded(), 24_000);
        assert_eq!(aggregator.fraction(), 1.0);
    }
}
