//! Reusable rendezvous barrier between the coordinator and image workers.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

/// Why a barrier wait returned without the generation completing.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierError {
    #[error("Barrier closed")]
    Closed,
    #[error("Barrier wait timed out")]
    TimedOut,
}

#[derive(Debug)]
struct State {
    parties: usize,
    arrived: usize,
    generation: u64,
    closed: bool,
}

/// A barrier for a shrinking set of parties.
///
/// Works like [`std::sync::Barrier`] with three additions: a timed wait that
/// withdraws the caller's arrival on timeout, permanent departure of a party
/// with [`leave`](Self::leave), and [`close`](Self::close), which releases
/// every waiter with an error.
#[derive(Debug)]
pub struct FrameBarrier {
    state: Mutex<State>,
    cvar: Condvar,
}

impl FrameBarrier {
    pub fn new(parties: usize) -> Self {
        Self {
            state: Mutex::new(State {
                parties,
                arrived: 0,
                generation: 0,
                closed: false,
            }),
            cvar: Condvar::new(),
        }
    }

    /// Parties still taking part.
    pub fn parties(&self) -> usize {
        self.state.lock().parties
    }

    /// Completed generations.
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Block until every remaining party has arrived.
    ///
    /// Returns `true` for the party whose arrival completed the generation.
    pub fn wait(&self) -> Result<bool, BarrierError> {
        self.wait_until(None)
    }

    /// Like [`wait`](Self::wait), giving up after `timeout`.
    ///
    /// On timeout the arrival is withdrawn, so the caller can wait again.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<bool, BarrierError> {
        self.wait_until(Some(Instant::now() + timeout))
    }

    fn wait_until(&self, deadline: Option<Instant>) -> Result<bool, BarrierError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(BarrierError::Closed);
        }

        state.arrived += 1;
        if state.arrived >= state.parties {
            self.release(&mut state);
            return Ok(true);
        }

        let generation = state.generation;
        loop {
            let timed_out = match deadline {
                Some(deadline) => self.cvar.wait_until(&mut state, deadline).timed_out(),
                None => {
                    self.cvar.wait(&mut state);
                    false
                }
            };
            if state.generation != generation {
                return Ok(false);
            }
            if state.closed {
                return Err(BarrierError::Closed);
            }
            if timed_out {
                state.arrived -= 1;
                return Err(BarrierError::TimedOut);
            }
        }
    }

    /// Permanently remove one party.
    ///
    /// If every remaining party has already arrived, the generation completes.
    pub fn leave(&self) {
        let mut state = self.state.lock();
        state.parties = state.parties.saturating_sub(1);
        if state.arrived > 0 && state.arrived >= state.parties {
            self.release(&mut state);
        }
    }

    /// Wake every waiter with [`BarrierError::Closed`]. Later waits fail
    /// immediately.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.cvar.notify_all();
    }

    fn release(&self, state: &mut State) {
        state.arrived = 0;
        state.generation += 1;
        self.cvar.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn releases_when_all_arrive() {
        let barrier = Arc::new(FrameBarrier::new(4));
        let passed = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..3)
            .map(|i| {
                let barrier = Arc::clone(&barrier);
                let passed = Arc::clone(&passed);
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(10 * i));
                    barrier.wait().unwrap();
                    passed.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        assert_eq!(passed.load(Ordering::SeqCst), 0);
        barrier.wait().unwrap();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(passed.load(Ordering::SeqCst), 3);
        assert_eq!(barrier.generation(), 1);
    }

    #[test]
    fn exactly_one_leader_per_generation() {
        let barrier = Arc::new(FrameBarrier::new(3));
        let leaders = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let leaders = Arc::clone(&leaders);
                thread::spawn(move || {
                    for _ in 0..10 {
                        if barrier.wait().unwrap() {
                            leaders.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(leaders.load(Ordering::SeqCst), 10);
        assert_eq!(barrier.generation(), 10);
    }

    #[test]
    fn timeout_withdraws_arrival() {
        let barrier = FrameBarrier::new(2);
        assert_eq!(
            barrier.wait_timeout(Duration::from_millis(20)),
            Err(BarrierError::TimedOut)
        );
        assert_eq!(barrier.generation(), 0);

        // The withdrawn arrival must not count towards the next generation.
        let barrier = Arc::new(barrier);
        let other = Arc::clone(&barrier);
        let handle = thread::spawn(move || other.wait());
        thread::sleep(Duration::from_millis(20));
        assert_eq!(barrier.generation(), 0);
        barrier.wait().unwrap();
        assert!(handle.join().unwrap().is_ok());
        assert_eq!(barrier.generation(), 1);
    }

    #[test]
    fn leaving_party_releases_waiters() {
        let barrier = Arc::new(FrameBarrier::new(3));
        let waiter = {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || barrier.wait())
        };
        thread::sleep(Duration::from_millis(20));
        barrier.leave();
        assert_eq!(barrier.generation(), 0);
        // Two parties left; the second arrival completes the generation.
        assert!(barrier.wait().unwrap());
        assert_eq!(waiter.join().unwrap(), Ok(false));
        assert_eq!(barrier.parties(), 2);

        let waiter = {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || barrier.wait())
        };
        thread::sleep(Duration::from_millis(20));
        barrier.leave();
        assert_eq!(waiter.join().unwrap(), Ok(false));
        assert_eq!(barrier.generation(), 2);
    }

    #[test]
    fn close_wakes_waiters() {
        let barrier = Arc::new(FrameBarrier::new(2));
        let waiter = {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || barrier.wait())
        };
        thread::sleep(Duration::from_millis(20));
        barrier.close();
        assert_eq!(waiter.join().unwrap(), Err(BarrierError::Closed));
        assert_eq!(barrier.wait(), Err(BarrierError::Closed));
    }
}
