use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Extraction state of one archive member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ticket {
    Pending,
    Extracting,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The member is on disk (or failed to extract and never will be).
    Ready,
    /// Extraction was stopped before the member became ready.
    Cancelled,
    /// The member is not part of this extraction session.
    Untracked,
}

#[derive(Default)]
struct Tickets {
    table: HashMap<String, Ticket>,
    cancelled: bool,
}

/// Wait/notify point between the extraction thread and its consumers.
///
/// Every state change is broadcast to all waiters; each waiter re-checks the
/// member it cares about.
#[derive(Default)]
pub struct Coordinator {
    state: Mutex<Tickets>,
    cond: Condvar,
}

/// Handle returned by `Extractor::setup`.
pub type WaitHandle = Arc<Coordinator>;

impl Coordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the tracked members; all start as `Pending`.
    pub fn track<I, S>(&self, members: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.replace(members, Ticket::Pending);
    }

    /// Replace the tracked members with ones already on disk.
    pub fn track_ready<I, S>(&self, members: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.replace(members, Ticket::Ready);
    }

    fn replace<I, S>(&self, members: I, ticket: Ticket)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.state.lock();
        state.table = members.into_iter().map(|m| (m.into(), ticket)).collect();
        self.cond.notify_all();
    }

    pub fn mark_extracting(&self, member: &str) {
        let mut state = self.state.lock();
        if let Some(t) = state.table.get_mut(member) {
            if *t == Ticket::Pending {
                *t = Ticket::Extracting;
            }
        }
    }

    pub fn mark_ready(&self, member: &str) {
        let mut state = self.state.lock();
        if let Some(t) = state.table.get_mut(member) {
            *t = Ticket::Ready;
        }
        self.cond.notify_all();
    }

    /// End of the extraction pass: whatever was not reached is marked ready
    /// so nobody waits on a file that will never come.
    pub fn finish(&self) {
        let mut state = self.state.lock();
        for t in state.table.values_mut() {
            *t = Ticket::Ready;
        }
        self.cond.notify_all();
    }

    pub fn cancel(&self) {
        let mut state = self.state.lock();
        state.cancelled = true;
        self.cond.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }

    pub fn ticket(&self, member: &str) -> Option<Ticket> {
        self.state.lock().table.get(member).copied()
    }

    pub fn is_ready(&self, member: &str) -> bool {
        self.ticket(member) == Some(Ticket::Ready)
    }

    pub fn tracked(&self) -> usize {
        self.state.lock().table.len()
    }

    pub fn ready_count(&self) -> usize {
        self.state
            .lock()
            .table
            .values()
            .filter(|t| **t == Ticket::Ready)
            .count()
    }

    /// Block until `member` is ready or extraction is cancelled.
    pub fn wait_until_ready(&self, member: &str) -> WaitOutcome {
        let mut state = self.state.lock();
        loop {
            let ticket = state.table.get(member).copied();
            match ticket {
                None => return WaitOutcome::Untracked,
                Some(Ticket::Ready) => return WaitOutcome::Ready,
                Some(_) if state.cancelled => return WaitOutcome::Cancelled,
                Some(_) => self.cond.wait(&mut state),
            }
        }
    }

    /// Like `wait_until_ready`, giving up with `None` after `timeout`.
    pub fn wait_until_ready_timeout(&self, member: &str, timeout: Duration) -> Option<WaitOutcome> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            let ticket = state.table.get(member).copied();
            match ticket {
                None => return Some(WaitOutcome::Untracked),
                Some(Ticket::Ready) => return Some(WaitOutcome::Ready),
                Some(_) if state.cancelled => return Some(WaitOutcome::Cancelled),
                Some(_) => {
                    if self.cond.wait_until(&mut state, deadline).timed_out() {
                        return None;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    const BOUND: Duration = Duration::from_secs(5);

    #[test]
    fn ready_member_returns_immediately() {
        let c = Coordinator::new();
        c.track(["a.jpg"]);
        c.mark_ready("a.jpg");
        assert_eq!(c.wait_until_ready("a.jpg"), WaitOutcome::Ready);
    }

    #[test]
    fn untracked_member_does_not_block() {
        let c = Coordinator::new();
        c.track(["a.jpg"]);
        assert_eq!(c.wait_until_ready("b.jpg"), WaitOutcome::Untracked);
    }

    #[test]
    fn tickets_only_move_forward() {
        let c = Coordinator::new();
        c.track(["a.jpg"]);
        assert_eq!(c.ticket("a.jpg"), Some(Ticket::Pending));
        c.mark_extracting("a.jpg");
        assert_eq!(c.ticket("a.jpg"), Some(Ticket::Extracting));
        c.mark_ready("a.jpg");
        c.mark_extracting("a.jpg");
        assert_eq!(c.ticket("a.jpg"), Some(Ticket::Ready));
    }

    #[test]
    fn one_broadcast_wakes_waiters_on_different_members() {
        let c = Arc::new(Coordinator::new());
        c.track(["a.jpg", "b.jpg", "c.jpg"]);

        let waiters: Vec<_> = ["a.jpg", "b.jpg"]
            .into_iter()
            .map(|m| {
                let c = Arc::clone(&c);
                thread::spawn(move || c.wait_until_ready_timeout(m, BOUND))
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        c.mark_ready("c.jpg");
        c.mark_ready("a.jpg");
        c.mark_ready("b.jpg");

        for w in waiters {
            assert_eq!(w.join().unwrap(), Some(WaitOutcome::Ready));
        }
    }

    #[test]
    fn cancel_unblocks_a_pending_wait() {
        let c = Arc::new(Coordinator::new());
        c.track(["never.jpg"]);
        let waiter = {
            let c = Arc::clone(&c);
            thread::spawn(move || c.wait_until_ready_timeout("never.jpg", BOUND))
        };
        thread::sleep(Duration::from_millis(50));
        c.cancel();
        assert_eq!(waiter.join().unwrap(), Some(WaitOutcome::Cancelled));
    }

    #[test]
    fn finish_releases_everything_left() {
        let c = Coordinator::new();
        c.track(["a.jpg", "b.jpg"]);
        c.finish();
        assert_eq!(c.ready_count(), 2);
        assert_eq!(c.wait_until_ready("b.jpg"), WaitOutcome::Ready);
    }

    #[test]
    fn timeout_reports_none() {
        let c = Coordinator::new();
        c.track(["slow.jpg"]);
        assert_eq!(c.wait_until_ready_timeout("slow.jpg", Duration::from_millis(20)), None);
    }
}
