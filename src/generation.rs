/// Generation id before any successful JoinGroup has completed.
pub const DEFAULT_GENERATION: i32 = -1;

/// Member id before the broker has assigned one.
pub const UNKNOWN_MEMBER_ID: &str = "";

/// The stable epoch of a group membership: a `member_id`/`generation_id`
/// pair that the broker considers current, plus the protocol it was
/// negotiated under. Produced by a successful JoinGroup, stabilised by the
/// following SyncGroup, and carried on every Heartbeat/LeaveGroup until the
/// next rejoin invalidates it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Generation {
    pub group_id: String,
    pub generation_id: i32,
    pub member_id: String,
    pub protocol: String,
}

impl Generation {
    pub fn is_leader(&self, leader_id: &str) -> bool {
        leader_id == self.member_id
    }
}

/// A value that can be lowered to the raw bytes the wire protocol carries.
/// Applied uniformly to protocol metadata and assignments right before the
/// wire boundary; a blanket impl covers anything that's already bytes.
pub trait Encodable {
    fn encode(&self) -> Vec<u8>;
}

impl Encodable for Vec<u8> {
    fn encode(&self) -> Vec<u8> {
        self.clone()
    }
}

impl<'a> Encodable for &'a [u8] {
    fn encode(&self) -> Vec<u8> {
        self.to_vec()
    }
}
