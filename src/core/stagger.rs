//! Stagger Function: deterministic per-feed phase offset so a batch refresh
//! doesn't fire every feed's fetch in the same instant.

use std::time::Duration;

/// Spread window: staggered feeds start somewhere within the next 5 minutes.
const STAGGER_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Pure, deterministic delay for `feed_id` given `total_feeds` feeds in the
/// batch. `total_feeds == 0` collapses to zero delay rather than dividing by
/// zero — nothing to spread across.
pub fn stagger_delay(feed_id: i64, total_feeds: i64) -> Duration {
    let total = total_feeds.max(1);
    let slot = feed_id.rem_euclid(total);
    let window_nanos = STAGGER_WINDOW.as_nanos() as i64;
    let delay_nanos = slot * (window_nanos / total);
    Duration::from_nanos(delay_nanos.max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_feeds_is_zero_delay() {
        assert_eq!(stagger_delay(42, 0), Duration::ZERO);
    }

    #[test]
    fn delay_is_within_window() {
        for feed_id in 0..100 {
            let d = stagger_delay(feed_id, 37);
            assert!(d <= STAGGER_WINDOW);
        }
    }

    #[test]
    fn deterministic() {
        assert_eq!(stagger_delay(7, 20), stagger_delay(7, 20));
    }

    #[test]
    fn spreads_across_total_feeds() {
        let a = stagger_delay(0, 4);
        let b = stagger_delay(1, 4);
        let c = stagger_delay(2, 4);
        let d = stagger_delay(3, 4);
        assert!(a < b && b < c && c < d);
    }

    #[test]
    fn negative_feed_id_still_nonnegative_delay() {
        let d = stagger_delay(-3, 5);
        assert!(d <= STAGGER_WINDOW);
    }

    proptest::proptest! {
        #[test]
        fn delay_always_within_window(feed_id: i64, total_feeds in 0i64..10_000) {
            let d = stagger_delay(feed_id, total_feeds);
            proptest::prop_assert!(d <= STAGGER_WINDOW);
        }

        #[test]
        fn always_deterministic(feed_id: i64, total_feeds in 0i64..10_000) {
            proptest::prop_assert_eq!(
                stagger_delay(feed_id, total_feeds),
                stagger_delay(feed_id, total_feeds)
            );
        }
    }
}
