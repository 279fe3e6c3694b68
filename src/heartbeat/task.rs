use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

use errors::{Error, ErrorKind, KafkaCode};
use generation::DEFAULT_GENERATION;
use heartbeat::clock::{Clock, HeartbeatClock};
use coordinator::Inner;
use policy::GroupPolicy;
use transport::{self, ClientTransport, ScheduledTask};

/// Self-rescheduling unit of work registered with the transport's scheduler.
/// Each firing decides whether to emit a heartbeat, defer to the next
/// cadence, or declare the coordinator dead, then re-arms itself.
///
/// Holds a `Weak` reference to its own `Rc` (installed via
/// `Rc::new_cyclic`) so `run()` can hand the scheduler a fresh `Rc<Self>`
/// without `Inner` having to keep a strong reference back -- the only
/// strong edge is `Inner -> HeartbeatTask`, avoiding a reference cycle.
pub struct HeartbeatTask<T, P, C>
    where T: ClientTransport,
          P: GroupPolicy,
          C: Clock
{
    inner: Weak<Inner<T, P, C>>,
    self_ref: Weak<HeartbeatTask<T, P, C>>,
    clock: RefCell<HeartbeatClock<C>>,
    request_in_flight: Cell<bool>,
}

impl<T, P, C> HeartbeatTask<T, P, C>
    where T: ClientTransport + 'static,
          P: GroupPolicy + 'static,
          C: Clock + 'static
{
    pub fn new(inner: &Rc<Inner<T, P, C>>, clock: HeartbeatClock<C>) -> Rc<Self> {
        Rc::new_cyclic(|weak_self| {
            HeartbeatTask {
                inner: Rc::downgrade(inner),
                self_ref: weak_self.clone(),
                clock: RefCell::new(clock),
                request_in_flight: Cell::new(false),
            }
        })
    }

    fn schedule_self(&self, inner: &Inner<T, P, C>, at: Instant) {
        if let Some(task) = self.self_ref.upgrade() {
            let task: Rc<ScheduledTask> = task;
            inner.transport.schedule(task, at);
        }
    }

    fn reschedule_in(&self, inner: &Inner<T, P, C>, delay: Duration) {
        self.schedule_self(inner, Instant::now() + delay);
    }

    /// Unschedules any pending firing, resets the session clock, and --
    /// unless a heartbeat is already in flight -- schedules an immediate
    /// firing. Called after a successful SyncGroup and whenever membership
    /// is freshly (re-)established.
    pub fn reset(&self) {
        let inner = match self.inner.upgrade() {
            Some(inner) => inner,
            None => return,
        };

        if let Some(task) = self.self_ref.upgrade() {
            let task: Rc<ScheduledTask> = task;
            inner.transport.unschedule(&task);
        }

        self.clock.borrow_mut().reset_session_timeout();

        if !self.request_in_flight.get() {
            self.reschedule_in(&inner, Duration::from_millis(0));
        }
    }

    /// Gives the task a chance to resume heartbeating after the
    /// coordinator has just been rediscovered for an already-established
    /// generation. Does nothing if a heartbeat is currently in flight.
    pub fn nudge(&self) {
        let inner = match self.inner.upgrade() {
            Some(inner) => inner,
            None => return,
        };

        if !self.request_in_flight.get() {
            self.reschedule_in(&inner, Duration::from_millis(0));
        }
    }

    fn handle_heartbeat_error(&self, inner: &Inner<T, P, C>, error: Error) -> Result<(), Error> {
        let code = match error.kind() {
            &ErrorKind::KafkaError(code) => code,
            _ => return Err(error),
        };

        match code {
            KafkaCode::GroupCoordinatorNotAvailable | KafkaCode::NotCoordinatorForGroup => {
                warn!("heartbeat failed, coordinator is no longer reachable for group `{}`",
                      inner.group_id());
                inner.mark_coordinator_dead();
                Ok(())
            }
            KafkaCode::RebalanceInProgress => {
                debug!("heartbeat found group `{}` rebalancing, will rejoin", inner.group_id());
                inner.set_rejoin_needed();
                Ok(())
            }
            KafkaCode::IllegalGeneration => {
                debug!("heartbeat generation stale for group `{}`, will rejoin", inner.group_id());
                inner.set_rejoin_needed();
                Ok(())
            }
            KafkaCode::UnknownMemberId => {
                debug!("heartbeat member id rejected for group `{}`, will rejoin", inner.group_id());
                inner.reset_member_id();
                inner.set_rejoin_needed();
                Ok(())
            }
            _ => Err(code.fatal_error_kind(inner.group_id()).into()),
        }
    }
}

impl<T, P, C> ScheduledTask for HeartbeatTask<T, P, C>
    where T: ClientTransport + 'static,
          P: GroupPolicy + 'static,
          C: Clock + 'static
{
    fn run(&self) {
        let inner = match self.inner.upgrade() {
            Some(inner) => inner,
            None => return,
        };

        if inner.generation() == DEFAULT_GENERATION || inner.need_rejoin() || inner.coordinator_unknown() {
            trace!("heartbeat task skipping firing, group `{}` is not in a heartbeatable state",
                   inner.group_id());
            return;
        }

        if self.clock.borrow().session_expired() {
            warn!("session expired for group `{}`, coordinator declared dead", inner.group_id());
            inner.mark_coordinator_dead();
            return;
        }

        if !self.clock.borrow().should_heartbeat() {
            let ttl = self.clock.borrow().ttl();
            self.reschedule_in(&inner, ttl);
            return;
        }

        self.clock.borrow_mut().sent_heartbeat();
        self.request_in_flight.set(true);

        let coordinator_id = match inner.coordinator_id() {
            Some(id) => id,
            None => {
                self.request_in_flight.set(false);
                return;
            }
        };
        let generation = inner.generation_snapshot();

        let future = inner.transport.heartbeat(coordinator_id, &generation);
        let result = transport::block_on(&inner.transport, future);

        self.request_in_flight.set(false);

        match result {
            Ok(()) => {
                debug!("heartbeat succeeded for group `{}`, generation {}",
                       generation.group_id,
                       generation.generation_id);
                self.clock.borrow_mut().received_heartbeat();
                let ttl = self.clock.borrow().ttl();
                self.reschedule_in(&inner, ttl);
            }
            Err(err) => {
                match self.handle_heartbeat_error(&inner, err) {
                    Ok(()) => {
                        let backoff = inner.config().retry_backoff();
                        self.reschedule_in(&inner, backoff);
                    }
                    Err(err) => error!("heartbeat fatally failed for group `{}`: {}", inner.group_id(), err),
                }
            }
        }
    }
}
