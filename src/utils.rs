/// Utility functions
use chrono::Duration;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

/// Round a security status to one decimal the way the game client does.
/// Anything barely above zero is shown as 0.1, everything else rounds to nearest.
pub fn ccp_round(status: f64) -> f64 {
    if status > 0.0 && status < 0.05 {
        return (status * 10.0).ceil() / 10.0;
    }

    (status * 10.0).round() / 10.0
}

/// Format a duration as `1d2h3m`, with the day part only when over a day.
/// Negative durations are shown as zero.
pub fn format_duration(duration: Duration) -> String {
    let mut remaining = duration.max(Duration::zero());
    let mut result = String::new();

    if remaining > Duration::days(1) {
        result.push_str(&format!("{}d", remaining.num_days()));
        remaining = remaining - Duration::days(remaining.num_days());
    }

    result.push_str(&format!("{}h", remaining.num_hours()));
    remaining = remaining - Duration::hours(remaining.num_hours());

    result.push_str(&format!("{}m", remaining.num_minutes()));
    result
}

/// Queue entry for the layout traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuedSystem {
    pub distance: u32,
    pub system_id: i64,
}

impl Ord for QueuedSystem {
    // BinaryHeap pops the greatest: nearest first, then highest system ID
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .distance
            .cmp(&self.distance)
            .then(self.system_id.cmp(&other.system_id))
    }
}

impl PartialOrd for QueuedSystem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Priority queue of systems ordered by hop distance, then descending ID.
/// A system is only ever accepted once; later pushes of the same ID are ignored.
#[derive(Debug, Default)]
pub struct SystemQueue {
    heap: BinaryHeap<QueuedSystem>,
    seen: HashSet<i64>,
}

impl SystemQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a system as already handled without queueing it
    pub fn mark_seen(&mut self, system_id: i64) {
        self.seen.insert(system_id);
    }

    /// Returns false if the system was already queued or seen
    pub fn push(&mut self, system_id: i64, distance: u32) -> bool {
        if !self.seen.insert(system_id) {
            return false;
        }

        self.heap.push(QueuedSystem {
            distance,
            system_id,
        });
        true
    }

    pub fn pop(&mut self) -> Option<QueuedSystem> {
        self.heap.pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ccp_round_barely_positive_goes_up() {
        assert_eq!(ccp_round(0.049), 0.1);
        assert_eq!(ccp_round(0.001), 0.1);
    }

    #[test]
    fn test_ccp_round_nearest() {
        assert_eq!(ccp_round(0.0), 0.0);
        assert_eq!(ccp_round(0.44), 0.4);
        assert_eq!(ccp_round(0.45), 0.5);
        assert_eq!(ccp_round(-0.04), 0.0);
        assert_eq!(ccp_round(-0.46), -0.5);
    }

    #[test]
    fn test_format_duration_with_days() {
        let d = Duration::days(2) + Duration::hours(3) + Duration::minutes(4);
        assert_eq!(format_duration(d), "2d3h4m");
    }

    #[test]
    fn test_format_duration_under_a_day() {
        let d = Duration::hours(35) + Duration::minutes(59) + Duration::seconds(59);
        assert_eq!(format_duration(d), "1d11h59m");
        assert_eq!(format_duration(Duration::hours(5)), "5h0m");
        assert_eq!(format_duration(Duration::days(1)), "24h0m");
    }

    #[test]
    fn test_format_duration_negative_is_zero() {
        assert_eq!(format_duration(Duration::minutes(-30)), "0h0m");
    }

    #[test]
    fn test_queue_orders_by_distance_then_descending_id() {
        let mut queue = SystemQueue::new();
        queue.push(10, 2);
        queue.push(5, 1);
        queue.push(7, 1);
        queue.push(20, 3);

        let order: Vec<i64> = std::iter::from_fn(|| queue.pop())
            .map(|q| q.system_id)
            .collect();
        assert_eq!(order, vec![7, 5, 10, 20]);
    }

    #[test]
    fn test_queue_deduplicates() {
        let mut queue = SystemQueue::new();
        queue.mark_seen(1);
        assert!(!queue.push(1, 1));
        assert!(queue.push(2, 1));
        assert!(!queue.push(2, 3));
        assert_eq!(queue.pop().map(|q| (q.system_id, q.distance)), Some((2, 1)));
        assert!(queue.pop().is_none());
    }
}
