use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::routes::middleware_auth::JwtUser;
use crate::state::AppState;
use super::dto::{
    completion_rate, validate_due_date, validate_title, CreateTaskRequest, ListTasksQuery,
    TaskResponse, TaskStats, UpdateTaskRequest,
};
use super::model::{completed_at_after_transition, completed_at_for_new, Task};
use super::queries;

pub async fn list(
    State(state): State<AppState>,
    JwtUser(user_id): JwtUser,
    Query(filters): Query<ListTasksQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();

    let tasks = queries::list_tasks(&state.db, user_id, &filters).await?;
    let response: Vec<TaskResponse> = tasks
        .into_iter()
        .map(|t| TaskResponse::from_task(t, now))
        .collect();

    Ok(Json(response))
}

pub async fn create(
    State(state): State<AppState>,
    JwtUser(user_id): JwtUser,
    Json(payload): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();

    validate_title(&payload.title)?;
    if let Some(due_date) = payload.due_date {
        validate_due_date(due_date, now)?;
    }

    let status = payload.status.unwrap_or_default();
    let task = Task {
        id: Uuid::new_v4(),
        user_id,
        title: payload.title.trim().to_string(),
        description: payload.description,
        status,
        priority: payload.priority.unwrap_or_default(),
        due_date: payload.due_date,
        completed_at: completed_at_for_new(status, now),
        created_at: now,
        updated_at: now,
    };

    let task = queries::create_task(&state.db, &task).await?;

    Ok((StatusCode::CREATED, Json(TaskResponse::from_task(task, now))))
}

pub async fn get(
    State(state): State<AppState>,
    JwtUser(user_id): JwtUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();

    match queries::get_task(&state.db, user_id, id).await? {
        Some(task) => Ok(Json(TaskResponse::from_task(task, now))),
        None => Err(ApiError::NotFound),
    }
}

/// Partial update: absent fields keep their stored values. The completed_at
/// rule compares against the status of the loaded row, not the payload.
pub async fn update(
    State(state): State<AppState>,
    JwtUser(user_id): JwtUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();

    let mut task = queries::get_task(&state.db, user_id, id)
        .await?
        .ok_or(ApiError::NotFound)?;

    if let Some(ref title) = payload.title {
        validate_title(title)?;
    }
    if let Some(due_date) = payload.due_date {
        validate_due_date(due_date, now)?;
    }

    let old_status = task.status;

    if let Some(title) = payload.title {
        task.title = title.trim().to_string();
    }
    if let Some(description) = payload.description {
        task.description = Some(description);
    }
    if let Some(status) = payload.status {
        task.status = status;
    }
    if let Some(priority) = payload.priority {
        task.priority = priority;
    }
    if let Some(due_date) = payload.due_date {
        task.due_date = Some(due_date);
    }

    task.completed_at =
        completed_at_after_transition(old_status, task.status, task.completed_at, now);
    task.updated_at = now;

    match queries::update_task(&state.db, &task).await? {
        Some(saved) => Ok(Json(TaskResponse::from_task(saved, now))),
        None => Err(ApiError::NotFound),
    }
}

pub async fn delete(
    State(state): State<AppState>,
    JwtUser(user_id): JwtUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    if queries::delete_task(&state.db, user_id, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

/// Complete a single task, refreshing completed_at even if it already was.
pub async fn mark_completed(
    State(state): State<AppState>,
    JwtUser(user_id): JwtUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();

    match queries::mark_completed(&state.db, user_id, id, now).await? {
        Some(task) => Ok(Json(TaskResponse::from_task(task, now))),
        None => Err(ApiError::NotFound),
    }
}

/// Tasks past their due date and still actionable (pending or in progress).
pub async fn overdue(
    State(state): State<AppState>,
    JwtUser(user_id): JwtUser,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();

    let tasks = queries::list_overdue(&state.db, user_id, now).await?;
    let response: Vec<TaskResponse> = tasks
        .into_iter()
        .map(|t| TaskResponse::from_task(t, now))
        .collect();

    Ok(Json(response))
}

/// Per-status counts plus the completion percentage for the caller's tasks.
pub async fn stats(
    State(state): State<AppState>,
    JwtUser(user_id): JwtUser,
) -> Result<impl IntoResponse, ApiError> {
    let (total, completed, pending, in_progress) =
        queries::task_counts(&state.db, user_id).await?;

    Ok(Json(TaskStats {
        total_tasks: total,
        completed,
        pending,
        in_progress,
        completion_rate: completion_rate(completed, total),
    }))
}
