//! Pacing between the two actors.
//!
//! The readiness gate is polled; how the master spends the time between
//! polls is a [`PollStrategy`]. Optionally the actors also meet at a
//! two-party [`Rendezvous`] once per iteration.

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// How the master waits between two gate polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollStrategy {
    /// Re-poll immediately.
    #[default]
    Spin,
    /// Yield the CPU between polls.
    Yield,
    /// Sleep between polls.
    Sleep(Duration),
}

impl PollStrategy {
    /// Zero means spin.
    pub fn from_interval_us(us: u64) -> Self {
        if us == 0 {
            PollStrategy::Spin
        } else {
            PollStrategy::Sleep(Duration::from_micros(us))
        }
    }

    #[inline]
    pub fn pause(&self) {
        match self {
            PollStrategy::Spin => std::hint::spin_loop(),
            PollStrategy::Yield => std::thread::yield_now(),
            PollStrategy::Sleep(d) => std::thread::sleep(*d),
        }
    }
}

impl fmt::Display for PollStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollStrategy::Spin => f.write_str("spin"),
            PollStrategy::Yield => f.write_str("yield"),
            PollStrategy::Sleep(d) => write!(f, "{}us", d.as_micros()),
        }
    }
}

/// `spin`, `yield`, or a sleep interval in microseconds (`50` or `50us`).
impl std::str::FromStr for PollStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "spin" => Ok(PollStrategy::Spin),
            "yield" => Ok(PollStrategy::Yield),
            other => other
                .trim_end_matches("us")
                .parse::<u64>()
                .map(PollStrategy::from_interval_us)
                .map_err(|_| format!("Unknown poll strategy: {}", other)),
        }
    }
}

/// Cross-actor synchronization beyond the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pacing {
    /// Gate only; peer buffers are peeked without coordination.
    #[default]
    BestEffort,
    /// Both actors meet before each exchange and after each validation.
    Rendezvous,
}

impl fmt::Display for Pacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pacing::BestEffort => f.write_str("best-effort"),
            Pacing::Rendezvous => f.write_str("rendezvous"),
        }
    }
}

impl std::str::FromStr for Pacing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "best-effort" | "besteffort" => Ok(Pacing::BestEffort),
            "rendezvous" | "barrier" => Ok(Pacing::Rendezvous),
            other => Err(format!("Unknown pacing: {}", other)),
        }
    }
}

/// Outcome of [`Rendezvous::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Meeting {
    Met,
    /// The other party has left the run; no further meetings happen.
    PeerLeft,
}

#[derive(Debug, Default)]
struct MeetingState {
    waiting: bool,
    generation: u64,
    closed: bool,
}

/// Two-party barrier that can be abandoned.
#[derive(Debug, Default)]
pub struct Rendezvous {
    state: Mutex<MeetingState>,
    cv: Condvar,
}

impl Rendezvous {
    /// Create a rendezvous and the two participant handles.
    pub fn pair() -> (Participant, Participant) {
        let shared = Arc::new(Rendezvous::default());
        (Participant(shared.clone()), Participant(shared))
    }

    fn wait(&self) -> Meeting {
        let mut state = self.state.lock();
        if state.closed {
            return Meeting::PeerLeft;
        }

        if state.waiting {
            state.waiting = false;
            state.generation += 1;
            self.cv.notify_all();
            return Meeting::Met;
        }

        state.waiting = true;
        let generation = state.generation;
        while state.generation == generation && !state.closed {
            self.cv.wait(&mut state);
        }

        if state.generation != generation {
            Meeting::Met
        } else {
            state.waiting = false;
            Meeting::PeerLeft
        }
    }

    fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.cv.notify_all();
    }
}

/// One side's handle on a [`Rendezvous`]. Dropping it closes the
/// rendezvous, releasing a peer that is waiting.
#[derive(Debug)]
pub struct Participant(Arc<Rendezvous>);

impl Participant {
    pub fn wait(&self) -> Meeting {
        self.0.wait()
    }
}

impl Drop for Participant {
    fn drop(&mut self) {
        self.0.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_poll_strategy_from_interval() {
        assert_eq!(PollStrategy::from_interval_us(0), PollStrategy::Spin);
        assert_eq!(
            PollStrategy::from_interval_us(50),
            PollStrategy::Sleep(Duration::from_micros(50))
        );
    }

    #[test]
    fn test_poll_strategy_parse() {
        assert_eq!("spin".parse::<PollStrategy>(), Ok(PollStrategy::Spin));
        assert_eq!("Yield".parse::<PollStrategy>(), Ok(PollStrategy::Yield));
        assert_eq!("0".parse::<PollStrategy>(), Ok(PollStrategy::Spin));
        assert_eq!(
            "250us".parse::<PollStrategy>(),
            Ok(PollStrategy::Sleep(Duration::from_micros(250)))
        );
        assert!("nap".parse::<PollStrategy>().is_err());
        assert_eq!(PollStrategy::Yield.to_string(), "yield");
        assert_eq!(PollStrategy::from_interval_us(40).to_string(), "40us");
    }

    #[test]
    fn test_pacing_parse() {
        assert_eq!("rendezvous".parse::<Pacing>(), Ok(Pacing::Rendezvous));
        assert_eq!("best-effort".parse::<Pacing>(), Ok(Pacing::BestEffort));
        assert!("lockstep".parse::<Pacing>().is_err());
        assert_eq!(Pacing::BestEffort.to_string(), "best-effort");
    }

    #[test]
    fn test_rendezvous_meets_repeatedly() {
        let (a, b) = Rendezvous::pair();
        let peer = thread::spawn(move || (0..100).map(|_| b.wait()).collect::<Vec<_>>());

        for _ in 0..100 {
            assert_eq!(a.wait(), Meeting::Met);
        }
        assert!(peer.join().unwrap().iter().all(|m| *m == Meeting::Met));
    }

    #[test]
    fn test_dropped_participant_releases_waiter() {
        let (a, b) = Rendezvous::pair();
        let waiter = thread::spawn(move || a.wait());

        drop(b);
        assert_eq!(waiter.join().unwrap(), Meeting::PeerLeft);
    }

    #[test]
    fn test_wait_after_peer_left() {
        let (a, b) = Rendezvous::pair();
        drop(b);
        assert_eq!(a.wait(), Meeting::PeerLeft);
        assert_eq!(a.wait(), Meeting::PeerLeft);
    }
}
