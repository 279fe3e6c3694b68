use std::time::{Duration, Instant};

/// Injectable time source so tests can advance virtual time instead of
/// sleeping. The default, `SystemClock`, simply reads `Instant::now()`.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// The real wall clock; used outside of tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Pure timing oracle for the heartbeat schedule: tracks when the session
/// was last reset, when a heartbeat was last sent, and when one was last
/// received, and derives the predicates `HeartbeatTask` steers by. Carries
/// no I/O of its own.
pub struct HeartbeatClock<C: Clock> {
    clock: C,
    session_timeout: Duration,
    heartbeat_interval: Duration,
    last_session_reset: Instant,
    last_send: Instant,
    last_receive: Instant,
}

impl<C: Clock> HeartbeatClock<C> {
    pub fn new(clock: C, session_timeout: Duration, heartbeat_interval: Duration) -> Self {
        let now = clock.now();

        HeartbeatClock {
            clock: clock,
            session_timeout: session_timeout,
            heartbeat_interval: heartbeat_interval,
            last_session_reset: now,
            last_send: now,
            last_receive: now,
        }
    }

    pub fn session_timeout(&self) -> Duration {
        self.session_timeout
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    /// `true` once `session_timeout` has elapsed since the last confirmed
    /// liveness signal (a received heartbeat response, or an explicit
    /// `reset_session_timeout`).
    pub fn session_expired(&self) -> bool {
        self.clock.now().duration_since(self.last_receive) >= self.session_timeout
    }

    /// `true` once it's time to send the next heartbeat.
    pub fn should_heartbeat(&self) -> bool {
        self.clock.now().duration_since(self.last_send) >= self.heartbeat_interval
    }

    /// Time remaining until the next heartbeat is due, zero if overdue.
    pub fn ttl(&self) -> Duration {
        let elapsed = self.clock.now().duration_since(self.last_send);

        if elapsed >= self.heartbeat_interval {
            Duration::from_millis(0)
        } else {
            self.heartbeat_interval - elapsed
        }
    }

    /// Marks liveness confirmed as of now; called on a successful rejoin or
    /// directly by the task's `reset`.
    pub fn reset_session_timeout(&mut self) {
        let now = self.clock.now();
        self.last_session_reset = now;
        self.last_receive = now;
    }

    pub fn sent_heartbeat(&mut self) {
        self.last_send = self.clock.now();
    }

    pub fn received_heartbeat(&mut self) {
        self.last_receive = self.clock.now();
    }

    pub fn last_session_reset(&self) -> Instant {
        self.last_session_reset
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::time::{Duration, Instant};

    use super::*;

    struct VirtualClock {
        now: Cell<Instant>,
    }

    impl VirtualClock {
        fn new() -> Self {
            VirtualClock { now: Cell::new(Instant::now()) }
        }

        fn advance(&self, by: Duration) {
            self.now.set(self.now.get() + by);
        }
    }

    impl Clock for &'static VirtualClock {
        fn now(&self) -> Instant {
            self.now.get()
        }
    }

    #[test]
    fn should_heartbeat_after_interval_elapses() {
        let clock: &'static VirtualClock = Box::leak(Box::new(VirtualClock::new()));
        let mut hb = HeartbeatClock::new(clock, Duration::from_secs(30), Duration::from_secs(3));

        assert!(!hb.should_heartbeat());

        clock.advance(Duration::from_secs(3));

        assert!(hb.should_heartbeat());

        hb.sent_heartbeat();

        assert!(!hb.should_heartbeat());
    }

    #[test]
    fn session_expires_without_received_heartbeat() {
        let clock: &'static VirtualClock = Box::leak(Box::new(VirtualClock::new()));
        let hb = HeartbeatClock::new(clock, Duration::from_secs(30), Duration::from_secs(3));

        clock.advance(Duration::from_secs(29));
        assert!(!hb.session_expired());

        clock.advance(Duration::from_secs(2));
        assert!(hb.session_expired());
    }

    #[test]
    fn received_heartbeat_resets_session_timer() {
        let clock: &'static VirtualClock = Box::leak(Box::new(VirtualClock::new()));
        let mut hb = HeartbeatClock::new(clock, Duration::from_secs(30), Duration::from_secs(3));

        clock.advance(Duration::from_secs(29));
        hb.received_heartbeat();
        clock.advance(Duration::from_secs(29));

        assert!(!hb.session_expired());
    }

    #[test]
    fn ttl_never_underflows_past_due() {
        let clock: &'static VirtualClock = Box::leak(Box::new(VirtualClock::new()));
        let hb = HeartbeatClock::new(clock, Duration::from_secs(30), Duration::from_secs(3));

        clock.advance(Duration::from_secs(10));

        assert_eq!(hb.ttl(), Duration::from_millis(0));
    }
}
