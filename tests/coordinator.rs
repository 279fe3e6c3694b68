extern crate group_coordinator;

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

use group_coordinator::{ClientTransport, Clock, Coordinator, CoordinatorConfig, CoordinatorMetadata, Encodable,
                         Error, ErrorKind, Generation, GroupCoordinatorFuture, GroupPolicy, HeartbeatFuture,
                         JoinGroupFuture, JoinGroupMember, JoinGroupResponse, KafkaCode, LeaveGroupFuture,
                         MetadataUpdateFuture, NodeId, ScheduledTask, StaticBoxFuture, SyncGroupFuture,
                         SyncGroupResponse};

struct ManualClock {
    now: Cell<Instant>,
}

impl ManualClock {
    fn new() -> Rc<Self> {
        Rc::new(ManualClock { now: Cell::new(Instant::now()) })
    }

    fn advance(&self, millis: u64) {
        self.now.set(self.now.get() + Duration::from_millis(millis));
    }
}

impl Clock for Rc<ManualClock> {
    fn now(&self) -> Instant {
        self.now.get()
    }
}

#[derive(Default)]
struct TransportState {
    coordinator: Option<NodeId>,
    disconnected: bool,
    join_responses: Vec<Result<JoinGroupResponse, Error>>,
    sync_responses: Vec<Result<SyncGroupResponse, Error>>,
    heartbeat_responses: Vec<Result<(), Error>>,
    scheduled: Option<Rc<ScheduledTask>>,
    group_coordinator_calls: u32,
    heartbeat_calls: u32,
    leave_group_calls: u32,
    last_join_member_id: Option<String>,
}

/// Cheaply cloned test double: every clone shares the same underlying
/// state, so a test can keep a handle after moving one clone into
/// `Coordinator::new`.
#[derive(Clone)]
struct TestTransport {
    state: Rc<RefCell<TransportState>>,
}

impl TestTransport {
    fn new() -> Self {
        TestTransport { state: Rc::new(RefCell::new(TransportState::default())) }
    }

    fn push_join(&self, response: Result<JoinGroupResponse, Error>) {
        self.state.borrow_mut().join_responses.push(response);
    }

    fn push_sync(&self, response: Result<SyncGroupResponse, Error>) {
        self.state.borrow_mut().sync_responses.push(response);
    }

    fn push_heartbeat(&self, response: Result<(), Error>) {
        self.state.borrow_mut().heartbeat_responses.push(response);
    }

    /// Simulates the scheduler invoking whatever was last scheduled --
    /// the heartbeat task, in this crate's case.
    fn fire_scheduled(&self) -> bool {
        let task = self.state.borrow_mut().scheduled.take();

        match task {
            Some(task) => {
                task.run();
                true
            }
            None => false,
        }
    }

    fn group_coordinator_calls(&self) -> u32 {
        self.state.borrow().group_coordinator_calls
    }

    fn heartbeat_calls(&self) -> u32 {
        self.state.borrow().heartbeat_calls
    }

    fn leave_group_calls(&self) -> u32 {
        self.state.borrow().leave_group_calls
    }

    fn last_join_member_id(&self) -> Option<String> {
        self.state.borrow().last_join_member_id.clone()
    }
}

impl ClientTransport for TestTransport {
    fn group_coordinator(&self, _node_id: NodeId, _group_id: &str) -> GroupCoordinatorFuture {
        let mut state = self.state.borrow_mut();
        state.group_coordinator_calls += 1;
        let node_id = state.coordinator.unwrap_or(1);
        StaticBoxFuture::ok(CoordinatorMetadata { node_id: node_id })
    }

    fn join_group(&self,
                  _coordinator: NodeId,
                  _group_id: &str,
                  _session_timeout_ms: i32,
                  member_id: &str,
                  _protocol_type: &str,
                  _protocols: Vec<(String, Vec<u8>)>)
                  -> JoinGroupFuture {
        let mut state = self.state.borrow_mut();
        state.last_join_member_id = Some(member_id.to_owned());

        match state.join_responses.pop() {
            Some(Ok(response)) => StaticBoxFuture::ok(response),
            Some(Err(err)) => StaticBoxFuture::err(err),
            None => StaticBoxFuture::err(ErrorKind::NoBrokersAvailable.into()),
        }
    }

    fn sync_group(&self, _coordinator: NodeId, _generation: &Generation, _assignments: Vec<(String, Vec<u8>)>)
                  -> SyncGroupFuture {
        let mut state = self.state.borrow_mut();

        match state.sync_responses.pop() {
            Some(Ok(response)) => StaticBoxFuture::ok(response),
            Some(Err(err)) => StaticBoxFuture::err(err),
            None => StaticBoxFuture::err(ErrorKind::NoBrokersAvailable.into()),
        }
    }

    fn heartbeat(&self, _coordinator: NodeId, _generation: &Generation) -> HeartbeatFuture {
        let mut state = self.state.borrow_mut();
        state.heartbeat_calls += 1;

        match state.heartbeat_responses.pop() {
            Some(Ok(())) => StaticBoxFuture::ok(()),
            Some(Err(err)) => StaticBoxFuture::err(err),
            None => StaticBoxFuture::ok(()),
        }
    }

    fn leave_group(&self, _coordinator: NodeId, _group_id: &str, _member_id: &str) -> LeaveGroupFuture {
        self.state.borrow_mut().leave_group_calls += 1;
        StaticBoxFuture::ok(())
    }

    fn poll(&self) {}

    fn ready(&self, _node_id: NodeId) -> bool {
        true
    }

    fn is_disconnected(&self, _node_id: NodeId) -> bool {
        self.state.borrow().disconnected
    }

    fn least_loaded_node(&self) -> Option<NodeId> {
        Some(1)
    }

    fn schedule(&self, task: Rc<ScheduledTask>, _at: Instant) {
        self.state.borrow_mut().scheduled = Some(task);
    }

    fn unschedule(&self, _task: &Rc<ScheduledTask>) {
        self.state.borrow_mut().scheduled = None;
    }

    fn request_metadata_update(&self) -> MetadataUpdateFuture {
        StaticBoxFuture::ok(())
    }

    fn record_coordinator(&self, _group_id: &str, response: &CoordinatorMetadata) -> bool {
        self.state.borrow_mut().coordinator = Some(response.node_id);
        true
    }
}

struct PassthroughPolicy;

impl GroupPolicy for PassthroughPolicy {
    fn protocol_type(&self) -> &str {
        "consumer"
    }

    fn group_protocols(&self) -> Vec<(String, Box<Encodable>)> {
        vec![("range".to_owned(), Box::new(Vec::new()) as Box<Encodable>)]
    }

    fn perform_assignment(&self, _leader_id: &str, _protocol: &str, members: &[JoinGroupMember])
                          -> Result<Vec<(String, Box<Encodable>)>, Error> {
        Ok(members.iter()
            .map(|member| (member.member_id.clone(), Box::new(vec![42]) as Box<Encodable>))
            .collect())
    }
}

fn join_response(generation_id: i32, member_id: &str, leader_id: &str) -> JoinGroupResponse {
    JoinGroupResponse {
        generation_id: generation_id,
        member_id: member_id.to_owned(),
        leader_id: leader_id.to_owned(),
        group_protocol: "range".to_owned(),
        members: if leader_id == member_id {
            vec![JoinGroupMember {
                     member_id: member_id.to_owned(),
                     metadata: Vec::new(),
                 }]
        } else {
            Vec::new()
        },
    }
}

fn new_coordinator() -> (Coordinator<TestTransport, PassthroughPolicy, Rc<ManualClock>>, TestTransport, Rc<ManualClock>) {
    let transport = TestTransport::new();
    let clock = ManualClock::new();
    let coordinator = Coordinator::new(CoordinatorConfig::new("integration-group"),
                                        transport.clone(),
                                        PassthroughPolicy,
                                        clock.clone());
    (coordinator, transport, clock)
}

#[test]
fn clean_join_as_follower() {
    let (coordinator, transport, _clock) = new_coordinator();

    transport.push_join(Ok(join_response(1, "member-1", "member-0")));
    transport.push_sync(Ok(SyncGroupResponse { member_assignment: vec![7] }));

    coordinator.ensure_active_group().expect("follower should reach stable generation 1");

    assert!(!coordinator.need_rejoin());
}

#[test]
fn clean_join_as_leader_runs_assignment() {
    let (coordinator, transport, _clock) = new_coordinator();

    transport.push_join(Ok(join_response(1, "member-0", "member-0")));
    transport.push_sync(Ok(SyncGroupResponse { member_assignment: vec![1] }));

    coordinator.ensure_active_group().expect("leader should reach stable generation 1");

    assert!(!coordinator.need_rejoin());
}

#[test]
fn unknown_member_id_on_join_triggers_immediate_retry() {
    let (coordinator, transport, _clock) = new_coordinator();

    // Popped last-in-first-out: the UnknownMemberId failure is consumed
    // first, then the successful retry.
    transport.push_join(Ok(join_response(2, "member-2", "member-2")));
    transport.push_sync(Ok(SyncGroupResponse { member_assignment: Vec::new() }));
    transport.push_join(Err(ErrorKind::KafkaError(KafkaCode::UnknownMemberId).into()));

    coordinator.ensure_active_group().expect("should recover after rejecting the stale member id");

    assert!(!coordinator.need_rejoin());
    assert_eq!(transport.group_coordinator_calls(), 1, "a single coordinator discovery should be shared by both attempts");
}

#[test]
fn illegal_generation_on_sync_resets_member_id_and_retries() {
    let (coordinator, transport, _clock) = new_coordinator();

    // Both response vecs are popped LIFO, so the entries consumed by the
    // first JoinGroup/SyncGroup attempt are pushed last: a join that
    // succeeds followed by a sync that fails with IllegalGeneration. The
    // second attempt then pops the bottom entries, a fresh join/sync pair
    // that succeeds.
    transport.push_join(Ok(join_response(1, "member-1", "member-1")));
    transport.push_join(Ok(join_response(2, "member-2", "member-2")));
    transport.push_sync(Ok(SyncGroupResponse { member_assignment: Vec::new() }));
    transport.push_sync(Err(ErrorKind::KafkaError(KafkaCode::IllegalGeneration).into()));

    coordinator.ensure_active_group().expect("should recover after the stale generation is rejected");

    assert!(!coordinator.need_rejoin());
    assert_eq!(transport.last_join_member_id(),
               Some("".to_owned()),
               "the retried JoinGroup must not carry the member id the broker just invalidated");
}

#[test]
fn coordinator_moves_during_heartbeat() {
    let (coordinator, transport, clock) = new_coordinator();

    transport.push_join(Ok(join_response(1, "member-1", "member-1")));
    transport.push_sync(Ok(SyncGroupResponse { member_assignment: Vec::new() }));
    coordinator.ensure_active_group().expect("initial join should succeed");

    let discoveries_before = transport.group_coordinator_calls();

    // Past the default heartbeat interval, so the firing below actually
    // sends a request instead of deferring to the next cadence.
    clock.advance(3_000 + 1);

    transport.push_heartbeat(Err(ErrorKind::KafkaError(KafkaCode::NotCoordinatorForGroup).into()));
    assert!(transport.fire_scheduled(), "join/sync should have armed the heartbeat task");

    assert_eq!(transport.heartbeat_calls(), 1);

    // The coordinator is now marked dead; the next blocking call must
    // rediscover it before anything else can proceed.
    coordinator.ensure_coordinator_known().expect("rediscovery should succeed");
    assert_eq!(transport.group_coordinator_calls(), discoveries_before + 1);
}

#[test]
fn session_expiry_declares_coordinator_dead_without_a_request() {
    let (coordinator, transport, clock) = new_coordinator();

    transport.push_join(Ok(join_response(1, "member-1", "member-1")));
    transport.push_sync(Ok(SyncGroupResponse { member_assignment: Vec::new() }));
    coordinator.ensure_active_group().expect("initial join should succeed");

    let discoveries_before = transport.group_coordinator_calls();

    clock.advance(30_000 + 1);
    assert!(transport.fire_scheduled(), "join/sync should have armed the heartbeat task");

    assert_eq!(transport.heartbeat_calls(), 0, "an expired session must not attempt a heartbeat");

    coordinator.ensure_coordinator_known().expect("rediscovery should succeed");
    assert_eq!(transport.group_coordinator_calls(), discoveries_before + 1);
}

#[test]
fn close_is_idempotent_and_leaves_once() {
    let (coordinator, transport, _clock) = new_coordinator();

    transport.push_join(Ok(join_response(1, "member-1", "member-1")));
    transport.push_sync(Ok(SyncGroupResponse { member_assignment: Vec::new() }));
    coordinator.ensure_active_group().expect("initial join should succeed");

    coordinator.close();
    assert_eq!(transport.leave_group_calls(), 1);

    coordinator.close();
    assert_eq!(transport.leave_group_calls(), 1, "a second close must not send another LeaveGroup");
}
