//! Worker state machine and execution counters.
//!
//! A worker moves through
//! `Inactive → Ready ⇄ Working → {Ready, Errored, Invalid}` with terminal
//! states `Stopped`, `Killed`, `Destroyed`. Terminal states are sticky:
//! once reached, no further transition is applied. The supervisor may
//! transition a `Working` worker to any state asynchronously; the executor
//! detects this with [`WorkerState::cas`] and leaves the supervised state
//! alone.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lifecycle state of a worker process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum State {
    /// Constructed but not yet handshook.
    Inactive = 0,
    /// Handshook and idle; the only state exec accepts.
    Ready = 1,
    /// Serving a call.
    Working = 2,
    /// Condemned by the supervisor; not serviceable.
    Invalid = 3,
    /// Stop control frame sent, awaiting exit.
    Stopping = 4,
    /// Exited after a graceful stop. Terminal.
    Stopped = 5,
    /// Kill signal sent, awaiting reap.
    Killing = 6,
    /// Killed by signal. Terminal.
    Killed = 7,
    /// Relay or protocol failure mid-call.
    Errored = 8,
    /// Removed by the pool. Terminal.
    Destroyed = 9,
}

impl State {
    /// Terminal states accept no further transitions.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, State::Stopped | State::Killed | State::Destroyed)
    }

    fn from_u64(v: u64) -> State {
        match v {
            0 => State::Inactive,
            1 => State::Ready,
            2 => State::Working,
            3 => State::Invalid,
            4 => State::Stopping,
            5 => State::Stopped,
            6 => State::Killing,
            7 => State::Killed,
            8 => State::Errored,
            _ => State::Destroyed,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Inactive => "inactive",
            State::Ready => "ready",
            State::Working => "working",
            State::Invalid => "invalid",
            State::Stopping => "stopping",
            State::Stopped => "stopped",
            State::Killing => "killing",
            State::Killed => "killed",
            State::Errored => "errored",
            State::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}

/// Atomic state variable plus execution counters for one worker.
#[derive(Debug)]
pub struct WorkerState {
    value: AtomicU64,
    num_execs: AtomicU64,
    last_used: AtomicU64,
}

impl WorkerState {
    /// New state starting at `Inactive` with zeroed counters.
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(State::Inactive as u64),
            num_execs: AtomicU64::new(0),
            last_used: AtomicU64::new(0),
        }
    }

    /// Current state value.
    #[inline]
    pub fn value(&self) -> State {
        State::from_u64(self.value.load(Ordering::SeqCst))
    }

    /// Transition to `next`. Returns `false` without touching the value if
    /// the current state is terminal.
    pub fn set(&self, next: State) -> bool {
        let mut cur = self.value.load(Ordering::SeqCst);
        loop {
            if State::from_u64(cur).is_terminal() {
                return false;
            }
            match self.value.compare_exchange(
                cur,
                next as u64,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return true,
                Err(actual) => cur = actual,
            }
        }
    }

    /// Transition from `expected` to `next` only if the state has not been
    /// changed concurrently. This is the supervisor-preemption check.
    pub fn cas(&self, expected: State, next: State) -> bool {
        self.value
            .compare_exchange(
                expected as u64,
                next as u64,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    /// Number of completed exec attempts.
    #[inline]
    pub fn num_execs(&self) -> u64 {
        self.num_execs.load(Ordering::SeqCst)
    }

    /// Increment the exec counter.
    #[inline]
    pub fn register_exec(&self) {
        self.num_execs.fetch_add(1, Ordering::SeqCst);
    }

    /// Unix-nano timestamp of the last exec entry.
    #[inline]
    pub fn last_used(&self) -> u64 {
        self.last_used.load(Ordering::SeqCst)
    }

    /// Store the last-used timestamp (unix nanos).
    #[inline]
    pub fn set_last_used(&self, nanos: u64) {
        self.last_used.store(nanos, Ordering::SeqCst);
    }
}

impl Default for WorkerState {
    fn default() -> Self {
        Self::new()
    }
}
