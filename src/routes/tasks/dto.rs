use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use super::model::{Task, TaskPriority, TaskStatus};

// REQUESTS

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DateTime<Utc>>,
}

/// Query string for the list endpoint: exact filters, free-text search and
/// a whitelisted ordering key.
#[derive(Debug, Default, Deserialize)]
pub struct ListTasksQuery {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

impl ListTasksQuery {
    /// ILIKE pattern for the search term, LIKE metacharacters escaped.
    /// None when the parameter is absent or blank.
    pub fn search_pattern(&self) -> Option<String> {
        let term = self.search.as_deref()?.trim();
        if term.is_empty() {
            return None;
        }

        let escaped = term
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        Some(format!("%{}%", escaped))
    }
}

// RESPONSES

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_overdue: bool,
    pub days_remaining: Option<i64>,
    pub user: Uuid,
}

impl TaskResponse {
    /// is_overdue and days_remaining are computed here against the operation's
    /// single `now`, never stored.
    pub fn from_task(task: Task, now: DateTime<Utc>) -> Self {
        Self {
            is_overdue: task.is_overdue(now),
            days_remaining: task.days_remaining(now),
            id: task.id,
            title: task.title,
            description: task.description,
            status: task.status,
            priority: task.priority,
            due_date: task.due_date,
            completed_at: task.completed_at,
            created_at: task.created_at,
            updated_at: task.updated_at,
            user: task.user_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TaskStats {
    pub total_tasks: i64,
    pub completed: i64,
    pub pending: i64,
    pub in_progress: i64,
    pub completion_rate: f64,
}

// HELPER FUNCTIONS

pub fn validate_title(title: &str) -> Result<(), ApiError> {
    let trimmed = title.trim();

    if trimmed.is_empty() {
        return Err(ApiError::validation("title", "Title cannot be empty"));
    }

    if trimmed.chars().count() > 200 {
        return Err(ApiError::validation(
            "title",
            "Title is too long (Max: 200 characters)",
        ));
    }

    Ok(())
}

pub fn validate_due_date(due_date: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), ApiError> {
    if due_date < now {
        return Err(ApiError::validation(
            "due_date",
            "Due date cannot be in the past",
        ));
    }

    Ok(())
}

/// completed / total as a percentage rounded to 2 decimals; 0 for no tasks.
pub fn completion_rate(completed: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (completed as f64 / total as f64 * 100.0 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at_noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_blank_title_is_rejected() {
        let err = validate_title("   ").unwrap_err();
        match err {
            ApiError::Validation { field, .. } => assert_eq!(field, "title"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_title_of_200_chars_is_accepted() {
        assert!(validate_title(&"x".repeat(200)).is_ok());
    }

    #[test]
    fn test_title_over_200_chars_is_rejected() {
        assert!(validate_title(&"x".repeat(201)).is_err());
    }

    #[test]
    fn test_title_length_counts_characters_not_bytes() {
        // 200 two-byte characters must still pass
        assert!(validate_title(&"é".repeat(200)).is_ok());
    }

    #[test]
    fn test_past_due_date_is_rejected() {
        let now = at_noon();
        let err = validate_due_date(now - Duration::minutes(1), now).unwrap_err();
        match err {
            ApiError::Validation { field, message } => {
                assert_eq!(field, "due_date");
                assert_eq!(message, "Due date cannot be in the past");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_future_due_date_is_accepted() {
        let now = at_noon();
        assert!(validate_due_date(now + Duration::days(1), now).is_ok());
    }

    #[test]
    fn test_search_pattern_escapes_like_metacharacters() {
        let query = ListTasksQuery {
            search: Some("50%_done".to_string()),
            ..Default::default()
        };
        assert_eq!(query.search_pattern().unwrap(), "%50\\%\\_done%");
    }

    #[test]
    fn test_blank_search_is_ignored() {
        let query = ListTasksQuery {
            search: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(query.search_pattern(), None);
        assert_eq!(ListTasksQuery::default().search_pattern(), None);
    }

    #[test]
    fn test_completion_rate_of_no_tasks_is_zero() {
        assert_eq!(completion_rate(0, 0), 0.0);
    }

    #[test]
    fn test_completion_rate_of_half_is_fifty() {
        assert_eq!(completion_rate(2, 4), 50.0);
    }

    #[test]
    fn test_completion_rate_rounds_to_two_decimals() {
        assert_eq!(completion_rate(1, 3), 33.33);
        assert_eq!(completion_rate(2, 3), 66.67);
    }

    #[test]
    fn test_response_exposes_derived_fields() {
        let now = at_noon();
        let task = Task {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "Buy milk".to_string(),
            description: None,
            status: TaskStatus::Pending,
            priority: TaskPriority::High,
            due_date: Some(now - Duration::days(1)),
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        let owner = task.user_id;

        let body = serde_json::to_value(TaskResponse::from_task(task, now)).unwrap();
        assert_eq!(body["is_overdue"], serde_json::json!(true));
        assert_eq!(body["days_remaining"], serde_json::json!(0));
        assert_eq!(body["status"], serde_json::json!("pending"));
        assert_eq!(body["priority"], serde_json::json!("high"));
        assert_eq!(body["user"], serde_json::json!(owner));
        assert_eq!(body["completed_at"], serde_json::json!(null));
    }
}
