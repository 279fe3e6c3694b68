use errors::Error;
use generation::{Encodable, Generation};
use transport::JoinGroupMember;

/// The extension point applications implement to participate in a group:
/// what protocol family this member speaks, which protocols (and metadata)
/// it's willing to negotiate, and -- only when elected leader -- how to
/// turn the group's collected metadata into per-member assignments.
///
/// Metadata and assignment values are handed back as `Box<Encodable>`
/// rather than raw bytes, so a policy can advertise anything with an
/// `encode()` method; the coordinator lowers them to bytes itself right
/// before they cross the wire boundary.
///
/// Partitioning logic, offset storage and wire framing are not this
/// trait's concern; they belong to whatever sits above a `Coordinator`.
pub trait GroupPolicy {
    /// The group's protocol family, e.g. `"consumer"`. Sent on every
    /// `JoinGroup` request; the broker rejects a join whose `protocol_type`
    /// doesn't match the rest of the group.
    fn protocol_type(&self) -> &str;

    /// The protocols this member is willing to speak, most preferred first,
    /// each paired with the metadata to advertise for it. The broker
    /// selects the first protocol that's common to every joining member.
    fn group_protocols(&self) -> Vec<(String, Box<Encodable>)>;

    /// Called after a successful `JoinGroup`, before `SyncGroup` is sent.
    /// Lets a policy note the protocol the group settled on; the default
    /// implementation does nothing.
    fn on_join_prepare(&self, _generation: &Generation) {}

    /// Called only on the member elected leader (`leader_id == member_id`
    /// of the generation just adopted). Given every member's advertised
    /// metadata under the negotiated `protocol`, returns each member's
    /// assignment, keyed by member id.
    fn perform_assignment(&self,
                           leader_id: &str,
                           protocol: &str,
                           members: &[JoinGroupMember])
                           -> Result<Vec<(String, Box<Encodable>)>, Error>;

    /// Called after a successful `SyncGroup`, with this member's own slice
    /// of the assignment. The default implementation does nothing; real
    /// policies hook in here to start consuming their assigned work.
    fn on_join_complete(&self, _generation: &Generation, _member_assignment: &[u8]) {}
}
