use std::time::Duration;

/// Default logical group name, used when the caller doesn't pick one.
pub const DEFAULT_GROUP_ID: &str = "default-group";

/// Broker eviction timeout: how long the coordinator tolerates silence
/// before declaring this member dead and triggering a rebalance.
pub const DEFAULT_SESSION_TIMEOUT_MILLIS: u64 = 30_000;

/// Target cadence for outgoing heartbeats.
pub const DEFAULT_HEARTBEAT_INTERVAL_MILLIS: u64 = 3_000;

/// Sleep between retry attempts on retriable failures.
pub const DEFAULT_RETRY_BACKOFF_MILLIS: u64 = 100;

/// Configuration recognised by the coordinator, builder-with-defaults
/// style. Fields not named here (offset commit policy, partition
/// assignment strategy, ...) belong to `GroupPolicy` or a higher layer,
/// not this crate.
#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    /// Logical name of the group membership.
    pub group_id: String,
    /// Broker eviction timeout, in milliseconds.
    pub session_timeout_ms: u64,
    /// Target heartbeat period, in milliseconds. Must be less than
    /// `session_timeout_ms`, typically no more than a third of it.
    pub heartbeat_interval_ms: u64,
    /// Sleep between retriable failures, in milliseconds.
    pub retry_backoff_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        CoordinatorConfig {
            group_id: DEFAULT_GROUP_ID.to_owned(),
            session_timeout_ms: DEFAULT_SESSION_TIMEOUT_MILLIS,
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MILLIS,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MILLIS,
        }
    }
}

impl CoordinatorConfig {
    pub fn new<S: Into<String>>(group_id: S) -> Self {
        CoordinatorConfig { group_id: group_id.into(), ..Default::default() }
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Warns (never panics -- this layer does not reject the combination)
    /// when `heartbeat_interval_ms` is not comfortably below
    /// `session_timeout_ms`. Call once after construction.
    pub fn validate(&self) {
        if self.heartbeat_interval_ms >= self.session_timeout_ms {
            warn!("heartbeat_interval_ms ({}) should be lower than session_timeout_ms ({}), \
                   expect repeated session expiries for group `{}`",
                  self.heartbeat_interval_ms,
                  self.session_timeout_ms,
                  self.group_id);
        }
    }
}
