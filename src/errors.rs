/// Various errors reported by a remote Kafka server.
///
/// We use numeric codes to indicate what problem occurred on the server.
/// These can be translated by the client into exceptions or
/// whatever the appropriate error handling mechanism in the client language.
///
/// See also [Kafka Errors](http://kafka.apache.org/protocol.html)
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum KafkaCode {
    /// The server experienced an unexpected error when processing the request
    Unknown = -1,
    None = 0,
    /// The requested offset is outside the range of offsets
    /// maintained by the server for the given topic/partition
    OffsetOutOfRange = 1,
    /// This indicates that a message contents does not match its CRC
    CorruptMessage = 2,
    /// This request is for a topic or partition that does not exist
    /// on this broker.
    UnknownTopicOrPartition = 3,
    /// The message has a negative size
    InvalidMessageSize = 4,
    /// This error is thrown if we are in the middle of a leadership
    /// election and there is currently no leader for this partition
    /// and hence it is unavailable for writes.
    LeaderNotAvailable = 5,
    /// This error is thrown if the client attempts to send messages
    /// to a replica that is not the leader for some partition. It
    /// indicates that the clients metadata is out of date.
    NotLeaderForPartition = 6,
    /// This error is thrown if the request exceeds the user-specified
    /// time limit in the request.
    RequestTimedOut = 7,
    /// This is not a client facing error and is used mostly by tools
    /// when a broker is not alive.
    BrokerNotAvailable = 8,
    /// If replica is expected on a broker, but is not (this can be
    /// safely ignored).
    ReplicaNotAvailable = 9,
    /// The server has a configurable maximum message size to avoid
    /// unbounded memory allocation. This error is thrown if the
    /// client attempt to produce a message larger than this maximum.
    MessageSizeTooLarge = 10,
    /// Internal error code for broker-to-broker communication.
    StaleControllerEpoch = 11,
    /// If you specify a string larger than configured maximum for
    /// offset metadata
    OffsetMetadataTooLarge = 12,
    /// The server disconnected before a response was received.
    NetworkException = 13,
    /// The broker returns this error code for an offset fetch request
    /// if it is still loading offsets (after a leader change for that
    /// offsets topic partition), or in response to group membership
    /// requests (such as heartbeats) when group metadata is being
    /// loaded by the coordinator.
    GroupLoadInProgress = 14,
    /// The broker returns this error code for group coordinator
    /// requests, offset commits, and most group management requests
    /// if the offsets topic has not yet been created, or if the group
    /// coordinator is not active.
    GroupCoordinatorNotAvailable = 15,
    /// The broker returns this error code if it receives an offset
    /// fetch or commit request for a group that it is not a
    /// coordinator for.
    NotCoordinatorForGroup = 16,
    /// For a request which attempts to access an invalid topic
    /// (e.g. one which has an illegal name), or if an attempt is made
    /// to write to an internal topic (such as the consumer offsets
    /// topic).
    InvalidTopic = 17,
    /// If a message batch in a produce request exceeds the maximum
    /// configured segment size.
    RecordListTooLarge = 18,
    /// Returned from a produce request when the number of in-sync
    /// replicas is lower than the configured minimum and requiredAcks is
    /// -1.
    NotEnoughReplicas = 19,
    /// Returned from a produce request when the message was written
    /// to the log, but with fewer in-sync replicas than required.
    NotEnoughReplicasAfterAppend = 20,
    /// Returned from a produce request if the requested requiredAcks is
    /// invalid (anything other than -1, 1, or 0).
    InvalidRequiredAcks = 21,
    /// Returned from group membership requests (such as heartbeats) when
    /// the generation id provided in the request is not the current
    /// generation.
    IllegalGeneration = 22,
    /// Returned in join group when the member provides a protocol type or
    /// set of protocols which is not compatible with the current group.
    InconsistentGroupProtocol = 23,
    /// Returned in join group when the groupId is empty or null.
    InvalidGroupId = 24,
    /// Returned from group requests (offset commits/fetches, heartbeats,
    /// etc) when the memberId is not in the current generation.
    UnknownMemberId = 25,
    /// Return in join group when the requested session timeout is outside
    /// of the allowed range on the broker
    InvalidSessionTimeout = 26,
    /// Returned in heartbeat requests when the coordinator has begun
    /// rebalancing the group. This indicates to the client that it
    /// should rejoin the group.
    RebalanceInProgress = 27,
    /// This error indicates that an offset commit was rejected because of
    /// oversize metadata.
    InvalidCommitOffsetSize = 28,
    /// Returned by the broker when the client is not authorized to access
    /// the requested topic.
    TopicAuthorizationFailed = 29,
    /// Returned by the broker when the client is not authorized to access
    /// a particular groupId.
    GroupAuthorizationFailed = 30,
    /// Returned by the broker when the client is not authorized to use an
    /// inter-broker or administrative API.
    ClusterAuthorizationFailed = 31,
}

impl KafkaCode {
    pub fn from_code(code: i16) -> KafkaCode {
        match code {
            0 => KafkaCode::None,
            1 => KafkaCode::OffsetOutOfRange,
            2 => KafkaCode::CorruptMessage,
            3 => KafkaCode::UnknownTopicOrPartition,
            4 => KafkaCode::InvalidMessageSize,
            5 => KafkaCode::LeaderNotAvailable,
            6 => KafkaCode::NotLeaderForPartition,
            7 => KafkaCode::RequestTimedOut,
            8 => KafkaCode::BrokerNotAvailable,
            9 => KafkaCode::ReplicaNotAvailable,
            10 => KafkaCode::MessageSizeTooLarge,
            11 => KafkaCode::StaleControllerEpoch,
            12 => KafkaCode::OffsetMetadataTooLarge,
            13 => KafkaCode::NetworkException,
            14 => KafkaCode::GroupLoadInProgress,
            15 => KafkaCode::GroupCoordinatorNotAvailable,
            16 => KafkaCode::NotCoordinatorForGroup,
            17 => KafkaCode::InvalidTopic,
            18 => KafkaCode::RecordListTooLarge,
            19 => KafkaCode::NotEnoughReplicas,
            20 => KafkaCode::NotEnoughReplicasAfterAppend,
            21 => KafkaCode::InvalidRequiredAcks,
            22 => KafkaCode::IllegalGeneration,
            23 => KafkaCode::InconsistentGroupProtocol,
            24 => KafkaCode::InvalidGroupId,
            25 => KafkaCode::UnknownMemberId,
            26 => KafkaCode::InvalidSessionTimeout,
            27 => KafkaCode::RebalanceInProgress,
            28 => KafkaCode::InvalidCommitOffsetSize,
            29 => KafkaCode::TopicAuthorizationFailed,
            30 => KafkaCode::GroupAuthorizationFailed,
            31 => KafkaCode::ClusterAuthorizationFailed,
            _ => KafkaCode::Unknown,
        }
    }

    /// Buckets a broker error code into the five-way retry taxonomy that
    /// drives the coordinator's join/sync/heartbeat loops: whether to retry
    /// immediately, back off, mark the coordinator dead, or raise to the
    /// caller.
    pub fn classify(self) -> ErrorClass {
        match self {
            KafkaCode::None => ErrorClass::Success,
            KafkaCode::GroupLoadInProgress => ErrorClass::BrokerLoading,
            KafkaCode::GroupCoordinatorNotAvailable |
            KafkaCode::NotCoordinatorForGroup => ErrorClass::CoordinatorMoved,
            KafkaCode::UnknownMemberId |
            KafkaCode::IllegalGeneration |
            KafkaCode::RebalanceInProgress => ErrorClass::MembershipInvalidated,
            _ => ErrorClass::Fatal,
        }
    }

    /// Maps a fatal broker code onto its named `ErrorKind`, attaching
    /// `group_id` to the variants that carry one. Codes with no dedicated
    /// variant fall back to the generic `KafkaError(code)`. Only meaningful
    /// to call once `classify()` has already placed `self` in
    /// `ErrorClass::Fatal`.
    pub fn fatal_error_kind(self, group_id: &str) -> ErrorKind {
        match self {
            KafkaCode::InconsistentGroupProtocol => ErrorKind::InconsistentGroupProtocol,
            KafkaCode::InvalidSessionTimeout => ErrorKind::InvalidSessionTimeout,
            KafkaCode::InvalidGroupId => ErrorKind::InvalidGroupId(group_id.to_owned()),
            KafkaCode::GroupAuthorizationFailed => ErrorKind::GroupAuthorizationFailed(group_id.to_owned()),
            code => ErrorKind::KafkaError(code),
        }
    }
}

/// The five-way error taxonomy from the coordination design: every broker
/// response code funnels into exactly one of these before the join/sync/
/// heartbeat loops decide whether to retry, back off, or raise to the
/// caller.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorClass {
    Success,
    /// Lost connection, disconnection, send failure. Always retriable; the
    /// coordinator is marked dead as a side-effect.
    TransportFailure,
    /// `NotCoordinatorForGroup` / `GroupCoordinatorNotAvailable`. Retriable;
    /// the coordinator is marked dead.
    CoordinatorMoved,
    /// `UnknownMemberId` / `IllegalGeneration` / `RebalanceInProgress`.
    /// Retriable without backoff -- the broker has signalled a required
    /// handshake restart.
    MembershipInvalidated,
    /// `GroupLoadInProgress`. Retriable with backoff.
    BrokerLoading,
    /// Anything else, including unmapped codes. Surfaced to the caller.
    Fatal,
}

impl ErrorClass {
    pub fn is_retriable(self) -> bool {
        self != ErrorClass::Fatal && self != ErrorClass::Success
    }
}

error_chain! {
    foreign_links {
        IoError(::std::io::Error);
    }

    errors {
        /// A broker responded with an error code; `classify()` buckets it
        /// for retry purposes.
        KafkaError(code: KafkaCode) {
            description("kafka error")
            display("kafka error: {:?}", code)
        }

        /// JoinGroup failed because the protocol/type the member advertised
        /// doesn't match the rest of the group.
        InconsistentGroupProtocol {
            description("inconsistent group protocol")
        }

        /// The requested session timeout falls outside the broker's allowed
        /// range.
        InvalidSessionTimeout {
            description("invalid session timeout")
        }

        /// `group_id` was empty or otherwise rejected by the broker.
        InvalidGroupId(group_id: String) {
            description("invalid group id")
            display("invalid group id: {}", group_id)
        }

        /// The caller is not authorized to join/sync/leave this group.
        GroupAuthorizationFailed(group_id: String) {
            description("group authorization failed")
            display("group `{}` authorization failed", group_id)
        }

        /// `GroupPolicy::perform_assignment` was handed a protocol name no
        /// registered assignor understands.
        UnsupportedAssignmentStrategy(protocol: String) {
            description("unsupported assignment strategy")
            display("unsupported assignment strategy: {}", protocol)
        }

        /// The transport was asked to address a node it has no connection
        /// info for.
        BrokerNotFound(node_id: i32) {
            description("broker not found")
            display("broker not found: {}", node_id)
        }

        /// No broker in the cluster is currently reachable to discover a
        /// coordinator from.
        NoBrokersAvailable {
            description("no brokers available")
        }

        /// `ClientTransport::record_coordinator` rejected the discovered
        /// coordinator -- the broker's view of the cluster disagreed with
        /// locally cached metadata.
        IllegalState(reason: &'static str) {
            description("illegal state")
            display("illegal state: {}", reason)
        }

        /// A pending future was dropped before it could be completed.
        Canceled(reason: &'static str) {
            description("canceled")
            display("canceled: {}", reason)
        }

        /// A broker reply didn't match the shape expected for the request
        /// that produced it -- a transport/codec bug, not a broker error.
        UnexpectedResponse(description: String) {
            description("unexpected response")
            display("unexpected response: {}", description)
        }
    }
}
