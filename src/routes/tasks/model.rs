use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::error::BoxDynError;
use sqlx::postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef};
use sqlx::{encode::IsNull, Decode, Encode, Postgres, Type};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    fn from_db(s: &str) -> Result<Self, BoxDynError> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown task status {other:?}").into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl TaskPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    fn from_db(s: &str) -> Result<Self, BoxDynError> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown task priority {other:?}").into()),
        }
    }
}

// Both enums live in plain TEXT columns, so the sqlx impls delegate to &str
// instead of declaring a Postgres type of their own.
macro_rules! impl_text_enum {
    ($ty:ty) => {
        impl Type<Postgres> for $ty {
            fn type_info() -> PgTypeInfo {
                <&str as Type<Postgres>>::type_info()
            }

            fn compatible(ty: &PgTypeInfo) -> bool {
                <&str as Type<Postgres>>::compatible(ty)
            }
        }

        impl Encode<'_, Postgres> for $ty {
            fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
                <&str as Encode<Postgres>>::encode_by_ref(&self.as_str(), buf)
            }
        }

        impl<'r> Decode<'r, Postgres> for $ty {
            fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
                Self::from_db(<&str as Decode<Postgres>>::decode(value)?)
            }
        }
    };
}

impl_text_enum!(TaskStatus);
impl_text_enum!(TaskPriority);

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Derive the completed_at value for a status change.
///
/// `old_status` must come from the previously persisted row, not from the
/// incoming payload: entering `completed` stamps `now`, leaving `completed`
/// clears the stamp, anything else keeps the current value.
pub fn completed_at_after_transition(
    old_status: TaskStatus,
    new_status: TaskStatus,
    current: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if old_status != TaskStatus::Completed && new_status == TaskStatus::Completed {
        Some(now)
    } else if old_status == TaskStatus::Completed && new_status != TaskStatus::Completed {
        None
    } else {
        current
    }
}

/// completed_at for a brand-new task. A task created directly as completed
/// gets its stamp right away; any other status starts without one.
pub fn completed_at_for_new(status: TaskStatus, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    (status == TaskStatus::Completed).then_some(now)
}

impl Task {
    /// A task is overdue once its due date has passed, unless it is completed.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        match self.due_date {
            Some(due) => self.status != TaskStatus::Completed && due < now,
            None => false,
        }
    }

    /// Whole days until the due date, clamped to 0. None for tasks without a
    /// due date and for completed tasks.
    pub fn days_remaining(&self, now: DateTime<Utc>) -> Option<i64> {
        match self.due_date {
            Some(due) if self.status != TaskStatus::Completed => {
                Some((due - now).num_days().max(0))
            }
            _ => None,
        }
    }
}
