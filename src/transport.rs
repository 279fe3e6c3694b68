use std::rc::Rc;
use std::time::Instant;

use futures::{future, Future, IntoFuture, Poll};

use errors::Error;
use generation::Generation;

/// Identifies a broker node as the transport's cluster metadata knows it.
pub type NodeId = i32;

/// A boxed, type-erased future carrying this crate's `Error` -- the
/// `futures` 0.1 way of returning `impl Future` before `impl Trait`
/// existed. Every RPC exposed by `ClientTransport` resolves one of these.
pub struct StaticBoxFuture<T = ()>(Box<Future<Item = T, Error = Error>>);

impl<T> StaticBoxFuture<T>
    where T: 'static
{
    pub fn new<F>(inner: F) -> Self
        where F: IntoFuture<Item = T, Error = Error> + 'static
    {
        StaticBoxFuture(Box::new(inner.into_future()))
    }

    pub fn ok(item: T) -> Self {
        StaticBoxFuture(Box::new(future::ok(item)))
    }

    pub fn err(err: Error) -> Self {
        StaticBoxFuture(Box::new(future::err(err)))
    }
}

impl<T> Future for StaticBoxFuture<T> {
    type Item = T;
    type Error = Error;

    fn poll(&mut self) -> Poll<T, Error> {
        self.0.poll()
    }
}

/// Successful response to a `GroupCoordinator` request: the broker that
/// currently serves as this group's coordinator.
#[derive(Clone, Debug)]
pub struct CoordinatorMetadata {
    pub node_id: NodeId,
}

/// One member as returned in a `JoinGroupResponse`, with the metadata bytes
/// it registered under the chosen protocol.
#[derive(Clone, Debug)]
pub struct JoinGroupMember {
    pub member_id: String,
    pub metadata: Vec<u8>,
}

/// Successful response to a `JoinGroup` request.
#[derive(Clone, Debug)]
pub struct JoinGroupResponse {
    pub generation_id: i32,
    pub member_id: String,
    pub leader_id: String,
    pub group_protocol: String,
    /// Populated only for the elected leader; empty for followers.
    pub members: Vec<JoinGroupMember>,
}

/// Successful response to a `SyncGroup` request: this member's slice of the
/// assignment the leader computed, already specific to this member.
#[derive(Clone, Debug)]
pub struct SyncGroupResponse {
    pub member_assignment: Vec<u8>,
}

pub type GroupCoordinatorFuture = StaticBoxFuture<CoordinatorMetadata>;
pub type JoinGroupFuture = StaticBoxFuture<JoinGroupResponse>;
pub type SyncGroupFuture = StaticBoxFuture<SyncGroupResponse>;
pub type HeartbeatFuture = StaticBoxFuture<()>;
pub type LeaveGroupFuture = StaticBoxFuture<()>;
pub type MetadataUpdateFuture = StaticBoxFuture<()>;

/// A unit of work the transport's scheduler invokes by wall-clock deadline.
/// `HeartbeatTask` is the only implementor in this crate; modelled as a
/// trait object (rather than a concrete type baked into `ClientTransport`)
/// so the transport doesn't need to know about heartbeats specifically.
pub trait ScheduledTask {
    fn run(&self);
}

/// The collaborator that owns connections, the event loop, and broker
/// metadata. Implemented by a lower layer; this crate only consumes it,
/// narrowed down to the five RPCs the membership handshake needs and the
/// scheduling hooks `HeartbeatTask` requires.
pub trait ClientTransport {
    /// Discover the coordinator currently responsible for `group_id` by
    /// asking `node_id` (typically the transport's least-loaded node).
    fn group_coordinator(&self, node_id: NodeId, group_id: &str) -> GroupCoordinatorFuture;

    /// Enroll (or re-enroll) as a member of `group_id`.
    fn join_group(&self,
                  coordinator: NodeId,
                  group_id: &str,
                  session_timeout_ms: i32,
                  member_id: &str,
                  protocol_type: &str,
                  protocols: Vec<(String, Vec<u8>)>)
                  -> JoinGroupFuture;

    /// Propagate (leader) or await (follower) the assignment for the given
    /// generation. `assignments` is non-empty only when called by the
    /// elected leader.
    fn sync_group(&self,
                  coordinator: NodeId,
                  generation: &Generation,
                  assignments: Vec<(String, Vec<u8>)>)
                  -> SyncGroupFuture;

    /// Prove liveness for the given generation.
    fn heartbeat(&self, coordinator: NodeId, generation: &Generation) -> HeartbeatFuture;

    /// Best-effort notification that this member is leaving the group.
    fn leave_group(&self, coordinator: NodeId, group_id: &str, member_id: &str) -> LeaveGroupFuture;

    /// Drive the transport's event loop without waiting on any particular
    /// future; called in a loop by the coordinator's blocking entry points
    /// between polls of the future they actually care about.
    fn poll(&self);

    /// `true` while `node_id` has a connection attempt outstanding or no
    /// connection at all.
    fn ready(&self, node_id: NodeId) -> bool;

    /// `true` if the transport has observed `node_id` disconnect.
    fn is_disconnected(&self, node_id: NodeId) -> bool;

    /// Pick the node with the fewest outstanding requests that is at least
    /// eligible for a connection attempt.
    fn least_loaded_node(&self) -> Option<NodeId>;

    /// Schedule `task` to run at or after `at`. Re-scheduling before a
    /// previous firing is due is achieved by calling `unschedule` first.
    fn schedule(&self, task: Rc<ScheduledTask>, at: Instant);

    /// Cancel a pending firing of `task`, if any. Unscheduling a task that
    /// isn't currently scheduled is a no-op, not an error.
    fn unschedule(&self, task: &Rc<ScheduledTask>);

    /// Ask the transport to refresh cluster metadata; used after a
    /// retriable coordinator-discovery failure.
    fn request_metadata_update(&self) -> MetadataUpdateFuture;

    /// Commit a freshly discovered coordinator into the transport's shared
    /// cluster view. Returns `false` if the transport's metadata disagrees,
    /// e.g. the node id isn't a known broker.
    fn record_coordinator(&self, group_id: &str, coordinator: &CoordinatorMetadata) -> bool;
}

/// Drives `future` to completion by alternating calls to
/// `transport.poll()` (to let the transport make I/O progress) and
/// `future.poll()`, exactly the "blocking-by-polling" pattern the
/// concurrency model calls for: no thread is blocked inside a lower-level
/// wait, the caller's own stack simply doesn't return until the future is
/// ready.
pub fn block_on<T>(transport: &ClientTransport, mut future: StaticBoxFuture<T>) -> Result<T, Error> {
    use futures::Async;

    loop {
        match future.poll() {
            Ok(Async::Ready(item)) => return Ok(item),
            Ok(Async::NotReady) => transport.poll(),
            Err(err) => return Err(err),
        }
    }
}
