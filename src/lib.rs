#![recursion_limit = "128"]
#![allow(dead_code)]

#[macro_use]
extern crate log;
#[macro_use]
extern crate error_chain;
extern crate futures;

#[cfg(test)]
extern crate pretty_env_logger;

#[macro_use]
pub mod errors;
pub mod config;
pub mod generation;
pub mod transport;
pub mod policy;
pub mod heartbeat;
mod coordinator;

pub use config::CoordinatorConfig;
pub use coordinator::Coordinator;
pub use errors::{Error, ErrorClass, ErrorKind, KafkaCode};
pub use generation::{Encodable, Generation, DEFAULT_GENERATION, UNKNOWN_MEMBER_ID};
pub use heartbeat::{Clock, HeartbeatClock, HeartbeatTask, SystemClock};
pub use policy::GroupPolicy;
pub use transport::{ClientTransport, CoordinatorMetadata, GroupCoordinatorFuture, HeartbeatFuture, JoinGroupFuture,
                     JoinGroupMember, JoinGroupResponse, LeaveGroupFuture, MetadataUpdateFuture, NodeId,
                     ScheduledTask, StaticBoxFuture, SyncGroupFuture, SyncGroupResponse};
