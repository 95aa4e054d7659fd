//! Deadline-ordered timer queue driving PIT expiry sweeps and content-store
//! freshness purges (§4.7).
//!
//! A `BinaryHeap` of `(deadline, token)` pairs stands in for a timer wheel:
//! the forwarder task calls [`Scheduler::sleep_until_next`] in its select
//! loop and drains every entry whose deadline has passed with [`Scheduler::pop_due`].

use ccnd_common::types::TimerToken;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Duration;
use tokio::time::Instant;

struct Armed {
    deadline: Instant,
    token: TimerToken,
}

impl PartialEq for Armed {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline
    }
}
impl Eq for Armed {}
impl PartialOrd for Armed {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Armed {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.deadline.cmp(&other.deadline)
    }
}

/// A min-heap of pending deadlines, keyed by an opaque token the caller
/// assigns meaning to (a PIT fingerprint's hash, a content-store sweep
/// marker, etc).
pub struct Scheduler {
    heap: BinaryHeap<Reverse<Armed>>,
    next_token: u64,
    /// Tokens that were cancelled before firing; checked and discarded at
    /// pop time rather than searched for in the heap.
    cancelled: std::collections::HashSet<TimerToken>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_token: 1,
            cancelled: std::collections::HashSet::new(),
        }
    }

    /// Arms a new timer `delay` from now and returns its token.
    pub fn arm(&mut self, delay: Duration) -> TimerToken {
        let token = TimerToken(self.next_token);
        self.next_token += 1;
        self.heap.push(Reverse(Armed { deadline: Instant::now() + delay, token }));
        token
    }

    pub fn cancel(&mut self, token: TimerToken) {
        self.cancelled.insert(token);
    }

    /// Removes and returns every token whose deadline has passed.
    pub fn pop_due(&mut self) -> Vec<TimerToken> {
        let mut due = Vec::new();
        let now = Instant::now();
        while let Some(Reverse(top)) = self.heap.peek() {
            if top.deadline > now {
                break;
            }
            let Reverse(armed) = self.heap.pop().unwrap();
            if !self.cancelled.remove(&armed.token) {
                due.push(armed.token);
            }
        }
        due
    }

    /// How long the caller's event loop should sleep before the next
    /// deadline might be due; `None` if no timer is armed.
    pub fn duration_until_next(&self) -> Option<Duration> {
        self.heap.peek().map(|Reverse(armed)| {
            armed.deadline.saturating_duration_since(Instant::now())
        })
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn timers_fire_in_deadline_order() {
        let mut sched = Scheduler::new();
        let far = sched.arm(Duration::from_millis(200));
        let near = sched.arm(Duration::from_millis(50));

        tokio::time::advance(Duration::from_millis(60)).await;
        assert_eq!(sched.pop_due(), vec![near]);

        tokio::time::advance(Duration::from_millis(200)).await;
        assert_eq!(sched.pop_due(), vec![far]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let mut sched = Scheduler::new();
        let token = sched.arm(Duration::from_millis(10));
        sched.cancel(token);

        tokio::time::advance(Duration::from_millis(20)).await;
        assert!(sched.pop_due().is_empty());
    }
}
