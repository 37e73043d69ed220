//! Operator status conditions and the client used to persist them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use factory_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

/// Attempts made by [`update_status`] before giving up on conflicts.
pub const UPDATE_STATUS_STEPS: u32 = 4;
const UPDATE_STATUS_INITIAL_BACKOFF: Duration = Duration::from_millis(10);
const UPDATE_STATUS_BACKOFF_FACTOR: u32 = 5;

/// Tri-state condition value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// One named condition in an operator's status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorCondition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: ConditionStatus,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
    /// When `status` last changed. Filled in on write when unset.
    #[serde(default)]
    pub last_transition_time: Option<DateTime<Utc>>,
}

impl OperatorCondition {
    pub fn new(condition_type: impl Into<String>, status: ConditionStatus) -> Self {
        Self {
            condition_type: condition_type.into(),
            status,
            reason: String::new(),
            message: String::new(),
            last_transition_time: None,
        }
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

/// The persisted status of an operator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorStatus {
    #[serde(default)]
    pub conditions: Vec<OperatorCondition>,
}

/// Find a condition by type.
#[must_use]
pub fn find_operator_condition<'a>(
    conditions: &'a [OperatorCondition],
    condition_type: &str,
) -> Option<&'a OperatorCondition> {
    conditions
        .iter()
        .find(|c| c.condition_type == condition_type)
}

/// Insert or update a condition.
///
/// The transition time only moves when the status changes. Reason and
/// message are always overwritten.
pub fn set_operator_condition(conditions: &mut Vec<OperatorCondition>, new: OperatorCondition) {
    let Some(existing) = conditions
        .iter_mut()
        .find(|c| c.condition_type == new.condition_type)
    else {
        let mut new = new;
        new.last_transition_time = new.last_transition_time.or_else(|| Some(Utc::now()));
        conditions.push(new);
        return;
    };

    if existing.status != new.status {
        existing.status = new.status;
        existing.last_transition_time = new.last_transition_time.or_else(|| Some(Utc::now()));
    }
    existing.reason = new.reason;
    existing.message = new.message;
}

/// A mutation applied to a status copy by [`update_status`].
pub type UpdateStatusFn = Box<dyn Fn(&mut OperatorStatus) -> Result<()> + Send + Sync>;

/// A mutation that sets one condition.
#[must_use]
pub fn update_condition_fn(condition: OperatorCondition) -> UpdateStatusFn {
    Box::new(move |status: &mut OperatorStatus| {
        set_operator_condition(&mut status.conditions, condition.clone());
        Ok(())
    })
}

/// Read and write access to an operator's status.
///
/// Writes carry the resource version they were based on and fail with
/// [`Error::Conflict`] when the stored version has moved on.
#[async_trait]
pub trait OperatorClient: Send + Sync {
    /// The current status and its resource version.
    async fn get_operator_state(&self) -> Result<(OperatorStatus, String)>;

    /// Replace the status if `resource_version` is still current.
    async fn update_operator_status(
        &self,
        resource_version: &str,
        status: OperatorStatus,
    ) -> Result<OperatorStatus>;
}

/// Outcome of [`update_status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub previous: OperatorStatus,
    pub current: OperatorStatus,
    /// Whether a write happened. No write is made when nothing changed.
    pub updated: bool,
}

/// Apply `updates` to the current status and write it back.
///
/// Conflicts are retried with exponential backoff up to
/// [`UPDATE_STATUS_STEPS`] attempts. Any other failure returns immediately
/// as [`Error::StatusUpdateFailed`].
pub async fn update_status(
    client: &dyn OperatorClient,
    updates: &[UpdateStatusFn],
) -> Result<StatusUpdate> {
    let mut backoff = UPDATE_STATUS_INITIAL_BACKOFF;
    let mut attempt = 1;

    loop {
        match try_update_status(client, updates).await {
            Err(err) if err.is_conflict() && attempt < UPDATE_STATUS_STEPS => {
                debug!(attempt, error = %err, "Status update conflicted, retrying");
                tokio::time::sleep(backoff).await;
                backoff = backoff.saturating_mul(UPDATE_STATUS_BACKOFF_FACTOR);
                attempt = attempt.saturating_add(1);
            }
            Err(err) if err.is_conflict() => return Err(err),
            Err(err @ Error::StatusUpdateFailed { .. }) => return Err(err),
            Err(err) => return Err(Error::status_update_failed(err.to_string())),
            Ok(update) => return Ok(update),
        }
    }
}

async fn try_update_status(
    client: &dyn OperatorClient,
    updates: &[UpdateStatusFn],
) -> Result<StatusUpdate> {
    let (previous, resource_version) = client.get_operator_state().await?;

    let mut desired = previous.clone();
    for update in updates {
        update(&mut desired)?;
    }

    if desired == previous {
        return Ok(StatusUpdate {
            current: previous.clone(),
            previous,
            updated: false,
        });
    }

    let current = client
        .update_operator_status(&resource_version, desired)
        .await?;
    Ok(StatusUpdate {
        previous,
        current,
        updated: true,
    })
}

#[derive(Debug, Default)]
struct StoredStatus {
    status: OperatorStatus,
    version: u64,
}

/// Operator client backed by memory, with real resource-version checks.
#[derive(Debug, Default)]
pub struct InMemoryOperatorClient {
    state: RwLock<StoredStatus>,
    writes: AtomicUsize,
}

impl InMemoryOperatorClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing status.
    pub fn with_status(status: OperatorStatus) -> Self {
        Self {
            state: RwLock::new(StoredStatus { status, version: 0 }),
            writes: AtomicUsize::new(0),
        }
    }

    /// A snapshot of the stored status.
    pub async fn status(&self) -> OperatorStatus {
        self.state.read().await.status.clone()
    }

    /// Number of successful writes.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OperatorClient for InMemoryOperatorClient {
    async fn get_operator_state(&self) -> Result<(OperatorStatus, String)> {
        let state = self.state.read().await;
        Ok((state.status.clone(), state.version.to_string()))
    }

    async fn update_operator_status(
        &self,
        resource_version: &str,
        status: OperatorStatus,
    ) -> Result<OperatorStatus> {
        let mut state = self.state.write().await;
        if state.version.to_string() != resource_version {
            return Err(Error::conflict(resource_version));
        }
        state.status = status;
        state.version = state.version.wrapping_add(1);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(state.status.clone())
    }
}
