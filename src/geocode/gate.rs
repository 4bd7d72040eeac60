//! FIFO rate gate for outbound geocoding requests.
//!
//! The public Nominatim instance enforces a hard limit of roughly one request
//! per second per client. Extraction runs on every worker in the pool, so the
//! limit has to be enforced in one place no matter how many workers ask at
//! once.
//!
//! ## Model
//!
//! Callers take a ticket on arrival and are admitted strictly in ticket order.
//! The admitted caller waits until `next_available_dispatch` and holds the
//! turn as an [`Admission`]. Dispatching records its start time and pushes
//! `next_available_dispatch` one interval forward:
//!
//! ```text
//! t=0.0  A admitted, dispatches          next = 1.1
//! t=0.2  B takes ticket, waits for A
//! t=0.3  C takes ticket, waits for B
//! t=1.1  B dispatches                    next = 2.2
//! t=2.2  C dispatches                    next = 3.3
//! ```
//!
//! An admission dropped without dispatching (the answer turned up in the
//! cache meanwhile) hands the turn on and leaves the schedule as it was.
//!
//! The gate only spaces dispatch *starts*; the HTTP call itself runs outside
//! the lock, so a slow response never delays the next caller beyond the
//! interval.
//!
//! Time comes from a [`Clock`] so tests can drive the gate without sleeping.

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Source of time for the gate.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug)]
struct GateState {
    next_ticket: u64,
    now_serving: u64,
    next_available: Option<Instant>,
    dispatched: u64,
}

/// Serializes dispatch starts to at most one per interval.
pub struct RateGate<C: Clock = SystemClock> {
    interval: Duration,
    clock: C,
    state: Mutex<GateState>,
    turn: Condvar,
}

impl RateGate<SystemClock> {
    pub fn new(interval: Duration) -> Self {
        Self::with_clock(interval, SystemClock)
    }
}

impl<C: Clock> RateGate<C> {
    pub fn with_clock(interval: Duration, clock: C) -> Self {
        Self {
            interval,
            clock,
            state: Mutex::new(GateState {
                next_ticket: 0,
                now_serving: 0,
                next_available: None,
                dispatched: 0,
            }),
            turn: Condvar::new(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Earliest instant the next dispatch may start; `None` before the first.
    pub fn next_available_dispatch(&self) -> Option<Instant> {
        self.lock().next_available
    }

    /// Number of dispatches started so far.
    pub fn dispatched(&self) -> u64 {
        self.lock().dispatched
    }

    /// Block until this caller may start a dispatch, then dispatch at once;
    /// returns the start time.
    pub fn acquire(&self) -> Instant {
        self.admit().dispatch()
    }

    /// Block until it is this caller's turn and the interval has passed.
    /// Later callers wait until the returned admission is dispatched or
    /// dropped.
    pub fn admit(&self) -> Admission<'_, C> {
        let mut state = self.lock();
        let ticket = state.next_ticket;
        state.next_ticket += 1;

        while state.now_serving != ticket {
            state = self.turn.wait(state).unwrap_or_else(|e| e.into_inner());
        }

        // Our turn: nobody else touches `next_available` until we advance
        // `now_serving`, so the lock can be released while sleeping.
        loop {
            let now = self.clock.now();
            match state.next_available {
                Some(at) if at > now => {
                    drop(state);
                    self.clock.sleep(at - now);
                    state = self.lock();
                }
                _ => break,
            }
        }

        Admission { gate: self }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// One caller's turn at the gate.
pub struct Admission<'a, C: Clock> {
    gate: &'a RateGate<C>,
}

impl<C: Clock> Admission<'_, C> {
    /// Start a dispatch now and hand the turn on.
    pub fn dispatch(self) -> Instant {
        let start = self.gate.clock.now();
        let mut state = self.gate.lock();
        state.next_available = Some(start + self.gate.interval);
        state.dispatched += 1;
        drop(state);
        start
    }
}

impl<C: Clock> Drop for Admission<'_, C> {
    fn drop(&mut self) {
        self.gate.lock().now_serving += 1;
        self.gate.turn.notify_all();
    }
}
