use std::cell::RefCell;
use std::rc::Rc;
use std::thread;

use config::CoordinatorConfig;
use errors::{Error, ErrorClass, ErrorKind, KafkaCode};
use generation::{Encodable, Generation, DEFAULT_GENERATION, UNKNOWN_MEMBER_ID};
use heartbeat::{Clock, HeartbeatClock, HeartbeatTask};
use policy::GroupPolicy;
use transport::{self, ClientTransport, HeartbeatFuture, JoinGroupResponse, NodeId, ScheduledTask};

struct MembershipState {
    coordinator_id: Option<NodeId>,
    generation: i32,
    member_id: String,
    protocol: String,
    rejoin_needed: bool,
    needs_join_prepare: bool,
}

impl Default for MembershipState {
    fn default() -> Self {
        MembershipState {
            coordinator_id: None,
            generation: DEFAULT_GENERATION,
            member_id: UNKNOWN_MEMBER_ID.to_owned(),
            protocol: String::new(),
            rejoin_needed: true,
            needs_join_prepare: true,
        }
    }
}

/// Shared state behind every `Coordinator` clone and its `HeartbeatTask`.
/// `HeartbeatTask` only ever reaches this through a `Weak` reference, so
/// `Inner` is the sole strong owner of the task it drives.
pub(crate) struct Inner<T, P, C>
    where T: ClientTransport,
          P: GroupPolicy,
          C: Clock
{
    pub(crate) config: CoordinatorConfig,
    pub(crate) transport: T,
    pub(crate) policy: P,
    state: RefCell<MembershipState>,
    heartbeat_task: RefCell<Option<Rc<HeartbeatTask<T, P, C>>>>,
}

impl<T, P, C> Inner<T, P, C>
    where T: ClientTransport + 'static,
          P: GroupPolicy + 'static,
          C: Clock + 'static
{
    pub(crate) fn group_id(&self) -> &str {
        &self.config.group_id
    }

    pub(crate) fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub(crate) fn coordinator_id(&self) -> Option<NodeId> {
        self.state.borrow().coordinator_id
    }

    pub(crate) fn generation(&self) -> i32 {
        self.state.borrow().generation
    }

    pub(crate) fn generation_snapshot(&self) -> Generation {
        let state = self.state.borrow();

        Generation {
            group_id: self.config.group_id.clone(),
            generation_id: state.generation,
            member_id: state.member_id.clone(),
            protocol: state.protocol.clone(),
        }
    }

    fn member_id(&self) -> String {
        self.state.borrow().member_id.clone()
    }

    pub(crate) fn need_rejoin(&self) -> bool {
        self.state.borrow().rejoin_needed
    }

    pub(crate) fn set_rejoin_needed(&self) {
        self.state.borrow_mut().rejoin_needed = true;
    }

    pub(crate) fn reset_member_id(&self) {
        self.state.borrow_mut().member_id = UNKNOWN_MEMBER_ID.to_owned();
    }

    pub(crate) fn mark_coordinator_dead(&self) {
        let mut state = self.state.borrow_mut();

        if state.coordinator_id.take().is_some() {
            debug!("coordinator marked dead for group `{}`", self.config.group_id);
        }
    }

    fn take_needs_join_prepare(&self) -> bool {
        let mut state = self.state.borrow_mut();

        if state.needs_join_prepare {
            state.needs_join_prepare = false;
            true
        } else {
            false
        }
    }

    fn adopt_join_response(&self, response: &JoinGroupResponse) {
        let mut state = self.state.borrow_mut();
        state.generation = response.generation_id;
        state.member_id = response.member_id.clone();
        state.protocol = response.group_protocol.clone();
        state.rejoin_needed = false;
    }

    fn finish_join(&self) {
        self.state.borrow_mut().needs_join_prepare = true;

        if let Some(task) = self.heartbeat_task.borrow().as_ref() {
            task.reset();
        }
    }

    pub(crate) fn coordinator_unknown(&self) -> bool {
        let current = self.state.borrow().coordinator_id;

        match current {
            None => true,
            Some(id) => {
                if self.transport.is_disconnected(id) {
                    self.mark_coordinator_dead();
                    true
                } else {
                    !self.transport.ready(id)
                }
            }
        }
    }

    pub(crate) fn send_heartbeat(&self) -> HeartbeatFuture {
        match self.coordinator_id() {
            Some(coordinator_id) => {
                let generation = self.generation_snapshot();
                self.transport.heartbeat(coordinator_id, &generation)
            }
            None => transport::StaticBoxFuture::err(ErrorKind::IllegalState("coordinator unknown").into()),
        }
    }
}

enum Attempt {
    Done,
    RetryImmediate,
    RetryBackoff,
}

/// Owns one membership's join/sync/heartbeat lifecycle against a group.
/// Cheaply cloneable: every clone shares the same `Inner` and the same
/// `HeartbeatTask`.
pub struct Coordinator<T, P, C>(Rc<Inner<T, P, C>>)
    where T: ClientTransport,
          P: GroupPolicy,
          C: Clock;

impl<T, P, C> Clone for Coordinator<T, P, C>
    where T: ClientTransport,
          P: GroupPolicy,
          C: Clock
{
    fn clone(&self) -> Self {
        Coordinator(self.0.clone())
    }
}

impl<T, P, C> Coordinator<T, P, C>
    where T: ClientTransport + 'static,
          P: GroupPolicy + 'static,
          C: Clock + 'static
{
    pub fn new(config: CoordinatorConfig, transport: T, policy: P, clock: C) -> Self {
        config.validate();

        let heartbeat_clock = HeartbeatClock::new(clock, config.session_timeout(), config.heartbeat_interval());

        let inner = Rc::new(Inner {
            config: config,
            transport: transport,
            policy: policy,
            state: RefCell::new(MembershipState::default()),
            heartbeat_task: RefCell::new(None),
        });

        let task = HeartbeatTask::new(&inner, heartbeat_clock);
        *inner.heartbeat_task.borrow_mut() = Some(task);

        Coordinator(inner)
    }

    pub fn need_rejoin(&self) -> bool {
        self.0.need_rejoin()
    }

    /// Used only by `HeartbeatTask`; exposed so a caller embedding this
    /// coordinator into its own scheduler could drive heartbeats directly.
    pub fn send_heartbeat(&self) -> HeartbeatFuture {
        self.0.send_heartbeat()
    }

    /// Blocks until a connected, usable coordinator is known.
    pub fn ensure_coordinator_known(&self) -> Result<(), Error> {
        let inner = &self.0;

        while inner.coordinator_unknown() {
            if inner.coordinator_id().is_some() {
                inner.transport.poll();
                continue;
            }

            let node_id = match inner.transport.least_loaded_node() {
                Some(node_id) => node_id,
                None => return Err(ErrorKind::NoBrokersAvailable.into()),
            };

            let future = inner.transport.group_coordinator(node_id, &inner.config.group_id);

            match transport::block_on(&inner.transport, future) {
                Ok(response) => {
                    if inner.coordinator_unknown() {
                        if inner.transport.record_coordinator(&inner.config.group_id, &response) {
                            {
                                let mut state = inner.state.borrow_mut();
                                state.coordinator_id = Some(response.node_id);
                            }

                            info!("discovered coordinator {} for group `{}`",
                                  response.node_id,
                                  inner.config.group_id);

                            if inner.generation() > 0 {
                                if let Some(task) = inner.heartbeat_task.borrow().as_ref() {
                                    task.nudge();
                                }
                            }
                        } else {
                            return Err(ErrorKind::IllegalState("broker rejected discovered coordinator").into());
                        }
                    }
                }
                Err(err) => {
                    match self.handle_membership_error(err)? {
                        Attempt::RetryBackoff => {
                            let _ = inner.transport.request_metadata_update();
                            thread::sleep(inner.config.retry_backoff());
                        }
                        Attempt::RetryImmediate => {
                            let _ = inner.transport.request_metadata_update();
                        }
                        Attempt::Done => {}
                    }
                }
            }
        }

        Ok(())
    }

    /// Blocks until the membership is STABLE: a known coordinator, a
    /// current generation and member id, and a completed SyncGroup.
    pub fn ensure_active_group(&self) -> Result<(), Error> {
        let inner = &self.0;

        if !inner.need_rejoin() {
            return Ok(());
        }

        if inner.take_needs_join_prepare() {
            let generation = inner.generation_snapshot();
            inner.policy.on_join_prepare(&generation);
        }

        while inner.need_rejoin() {
            self.ensure_coordinator_known()?;

            match self.attempt_join_and_sync() {
                Ok(Attempt::Done) => {}
                Ok(Attempt::RetryImmediate) => continue,
                Ok(Attempt::RetryBackoff) => {
                    thread::sleep(inner.config.retry_backoff());
                    continue;
                }
                Err(err) => return Err(err),
            }
        }

        Ok(())
    }

    fn attempt_join_and_sync(&self) -> Result<Attempt, Error> {
        let inner = &self.0;

        let coordinator_id = match inner.coordinator_id() {
            Some(id) => id,
            None => return Ok(Attempt::RetryImmediate),
        };

        let member_id = inner.member_id();
        let protocols: Vec<(String, Vec<u8>)> = inner.policy
            .group_protocols()
            .into_iter()
            .map(|(name, metadata)| (name, metadata.encode()))
            .collect();

        debug!("joining group `{}` as member `{}`", inner.config.group_id, member_id);

        let join_future = inner.transport
            .join_group(coordinator_id,
                        &inner.config.group_id,
                        inner.config.session_timeout_ms as i32,
                        &member_id,
                        inner.policy.protocol_type(),
                        protocols);

        let response = match transport::block_on(&inner.transport, join_future) {
            Ok(response) => response,
            Err(err) => return self.handle_membership_error(err),
        };

        inner.adopt_join_response(&response);

        let is_leader = response.leader_id == response.member_id;

        let assignments: Vec<(String, Vec<u8>)> = if is_leader {
            match inner.policy.perform_assignment(&response.leader_id, &response.group_protocol, &response.members) {
                Ok(assignments) => {
                    assignments.into_iter().map(|(member_id, bytes)| (member_id, bytes.encode())).collect()
                }
                Err(err) => {
                    warn!("assignment failed for group `{}`: {}", inner.config.group_id, err);
                    inner.set_rejoin_needed();
                    return Ok(Attempt::RetryBackoff);
                }
            }
        } else {
            Vec::new()
        };

        let generation = inner.generation_snapshot();

        debug!("syncing group `{}`, generation {}, leader={}",
               inner.config.group_id,
               generation.generation_id,
               is_leader);

        let sync_future = inner.transport.sync_group(coordinator_id, &generation, assignments);

        match transport::block_on(&inner.transport, sync_future) {
            Ok(sync_response) => {
                inner.policy.on_join_complete(&generation, &sync_response.member_assignment);
                inner.finish_join();

                info!("group `{}` stable at generation {} as `{}`",
                      inner.config.group_id,
                      generation.generation_id,
                      generation.member_id);

                Ok(Attempt::Done)
            }
            Err(err) => {
                inner.set_rejoin_needed();
                self.handle_membership_error(err)
            }
        }
    }

    fn handle_membership_error(&self, error: Error) -> Result<Attempt, Error> {
        let inner = &self.0;

        let class = match error.kind() {
            &ErrorKind::KafkaError(code) => code.classify(),
            &ErrorKind::IoError(_) | &ErrorKind::Canceled(_) => ErrorClass::TransportFailure,
            _ => ErrorClass::Fatal,
        };

        match class {
            ErrorClass::TransportFailure | ErrorClass::CoordinatorMoved => {
                inner.mark_coordinator_dead();
                Ok(Attempt::RetryBackoff)
            }
            ErrorClass::BrokerLoading => Ok(Attempt::RetryBackoff),
            ErrorClass::MembershipInvalidated => {
                if let &ErrorKind::KafkaError(KafkaCode::UnknownMemberId) |
                       &ErrorKind::KafkaError(KafkaCode::IllegalGeneration) = error.kind() {
                    inner.reset_member_id();
                }

                Ok(Attempt::RetryImmediate)
            }
            ErrorClass::Fatal => {
                let mapped = match error.kind() {
                    &ErrorKind::KafkaError(code) => code.fatal_error_kind(inner.group_id()).into(),
                    _ => error,
                };

                Err(mapped)
            }
            ErrorClass::Success => Err(error),
        }
    }

    /// Best-effort: unschedules the heartbeat, sends a single `LeaveGroup`
    /// if a generation was ever established, and resets local state.
    /// Idempotent -- a second call observes `generation <= 0` and sends
    /// nothing.
    pub fn close(&self) {
        let inner = &self.0;

        if let Some(task) = inner.heartbeat_task.borrow().as_ref() {
            let task: Rc<ScheduledTask> = task.clone();
            inner.transport.unschedule(&task);
        }

        if let Some(coordinator_id) = inner.coordinator_id() {
            if inner.generation() > 0 {
                let member_id = inner.member_id();
                let future = inner.transport.leave_group(coordinator_id, &inner.config.group_id, &member_id);

                if let Err(err) = transport::block_on(&inner.transport, future) {
                    warn!("failed to leave group `{}` cleanly: {}", inner.config.group_id, err);
                }
            }
        }

        let mut state = inner.state.borrow_mut();
        state.generation = DEFAULT_GENERATION;
        state.member_id = UNKNOWN_MEMBER_ID.to_owned();
        state.rejoin_needed = true;
    }
}
