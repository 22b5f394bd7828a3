use chrono::{DateTime, Utc};
use sqlx::{PgPool, Result};
use uuid::Uuid;

use super::dto::ListTasksQuery;
use super::model::{Task, TaskStatus};

pub async fn create_task(pool: &PgPool, task: &Task) -> Result<Task> {
    let rec = sqlx::query_as::<_, Task>(
        r#"
        INSERT INTO tasks (id, user_id, title, description, status, priority,
                           due_date, completed_at, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(task.id)
    .bind(task.user_id)
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.status)
    .bind(task.priority)
    .bind(task.due_date)
    .bind(task.completed_at)
    .bind(task.created_at)
    .bind(task.updated_at)
    .fetch_one(pool)
    .await?;

    Ok(rec)
}

pub async fn list_tasks(
    pool: &PgPool,
    user_id: Uuid,
    filters: &ListTasksQuery,
) -> Result<Vec<Task>> {
    let search = filters.search_pattern();
    let sql = build_list_sql(
        filters.status.is_some(),
        filters.priority.is_some(),
        search.is_some(),
        filters.ordering.as_deref(),
    );

    let mut query = sqlx::query_as::<_, Task>(&sql).bind(user_id);

    if let Some(status) = filters.status {
        query = query.bind(status);
    }
    if let Some(priority) = filters.priority {
        query = query.bind(priority);
    }
    if let Some(pattern) = search {
        query = query.bind(pattern);
    }

    query.fetch_all(pool).await
}

pub async fn get_task(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<Option<Task>> {
    sqlx::query_as::<_, Task>(
        r#"
        SELECT * FROM tasks
        WHERE id = $1 AND user_id = $2
        "#,
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// Persist an already-merged row. The caller loads the current task, applies
/// the requested changes plus the completed_at rule, and everything mutable
/// is written back in one statement scoped by owner.
pub async fn update_task(pool: &PgPool, task: &Task) -> Result<Option<Task>> {
    sqlx::query_as::<_, Task>(
        r#"
        UPDATE tasks
        SET title = $3, description = $4, status = $5, priority = $6,
            due_date = $7, completed_at = $8, updated_at = $9
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(task.id)
    .bind(task.user_id)
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.status)
    .bind(task.priority)
    .bind(task.due_date)
    .bind(task.completed_at)
    .bind(task.updated_at)
    .fetch_optional(pool)
    .await
}

pub async fn delete_task(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        r#"
        DELETE FROM tasks
        WHERE id = $1 AND user_id = $2
        "#,
    )
    .bind(id)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn mark_completed(
    pool: &PgPool,
    user_id: Uuid,
    id: Uuid,
    now: DateTime<Utc>,
) -> Result<Option<Task>> {
    sqlx::query_as::<_, Task>(
        r#"
        UPDATE tasks
        SET status = $3, completed_at = $4, updated_at = $4
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(TaskStatus::Completed)
    .bind(now)
    .fetch_optional(pool)
    .await
}

// Only actionable tasks count as overdue; completed and cancelled ones are
// out no matter how old their due date is.
const LIST_OVERDUE_SQL: &str = r#"
        SELECT * FROM tasks
        WHERE user_id = $1 AND due_date < $2 AND status IN ('pending', 'in_progress')
        ORDER BY created_at DESC
        "#;

pub async fn list_overdue(pool: &PgPool, user_id: Uuid, now: DateTime<Utc>) -> Result<Vec<Task>> {
    sqlx::query_as::<_, Task>(LIST_OVERDUE_SQL)
        .bind(user_id)
        .bind(now)
        .fetch_all(pool)
        .await
}

pub async fn task_counts(pool: &PgPool, user_id: Uuid) -> Result<(i64, i64, i64, i64)> {
    sqlx::query_as::<_, (i64, i64, i64, i64)>(
        r#"
        SELECT COUNT(*),
               COUNT(*) FILTER (WHERE status = 'completed'),
               COUNT(*) FILTER (WHERE status = 'pending'),
               COUNT(*) FILTER (WHERE status = 'in_progress')
        FROM tasks
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
}

fn build_list_sql(
    has_status: bool,
    has_priority: bool,
    has_search: bool,
    ordering: Option<&str>,
) -> String {
    let mut sql = String::from("SELECT * FROM tasks WHERE user_id = $1");
    let mut bind_count = 2;

    if has_status {
        sql.push_str(&format!(" AND status = ${}", bind_count));
        bind_count += 1;
    }
    if has_priority {
        sql.push_str(&format!(" AND priority = ${}", bind_count));
        bind_count += 1;
    }
    if has_search {
        sql.push_str(&format!(
            " AND (title ILIKE ${} OR description ILIKE ${})",
            bind_count, bind_count
        ));
    }

    sql.push_str(" ORDER BY ");
    sql.push_str(order_by_clause(ordering));
    sql
}

// Whitelisted ordering keys; anything else falls back to newest-first.
fn order_by_clause(ordering: Option<&str>) -> &'static str {
    match ordering {
        Some("created_at") => "created_at ASC",
        Some("-created_at") => "created_at DESC",
        Some("updated_at") => "updated_at ASC",
        Some("-updated_at") => "updated_at DESC",
        Some("due_date") => "due_date ASC",
        Some("-due_date") => "due_date DESC",
        _ => "created_at DESC",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_list_orders_newest_first() {
        assert_eq!(
            build_list_sql(false, false, false, None),
            "SELECT * FROM tasks WHERE user_id = $1 ORDER BY created_at DESC"
        );
    }

    #[test]
    fn test_filters_claim_placeholders_in_order() {
        assert_eq!(
            build_list_sql(true, true, false, None),
            "SELECT * FROM tasks WHERE user_id = $1 AND status = $2 AND priority = $3 \
             ORDER BY created_at DESC"
        );
    }

    #[test]
    fn test_search_reuses_a_single_placeholder() {
        assert_eq!(
            build_list_sql(false, false, true, None),
            "SELECT * FROM tasks WHERE user_id = $1 \
             AND (title ILIKE $2 OR description ILIKE $2) ORDER BY created_at DESC"
        );
    }

    #[test]
    fn test_search_placeholder_follows_filters() {
        assert_eq!(
            build_list_sql(true, false, true, Some("due_date")),
            "SELECT * FROM tasks WHERE user_id = $1 AND status = $2 \
             AND (title ILIKE $3 OR description ILIKE $3) ORDER BY due_date ASC"
        );
    }

    #[test]
    fn test_ordering_accepts_whitelisted_fields_both_directions() {
        assert_eq!(order_by_clause(Some("created_at")), "created_at ASC");
        assert_eq!(order_by_clause(Some("-created_at")), "created_at DESC");
        assert_eq!(order_by_clause(Some("updated_at")), "updated_at ASC");
        assert_eq!(order_by_clause(Some("-updated_at")), "updated_at DESC");
        assert_eq!(order_by_clause(Some("due_date")), "due_date ASC");
        assert_eq!(order_by_clause(Some("-due_date")), "due_date DESC");
    }

    #[test]
    fn test_overdue_listing_is_owner_scoped() {
        assert!(LIST_OVERDUE_SQL.contains("user_id = $1"));
        assert!(LIST_OVERDUE_SQL.contains("due_date < $2"));
    }

    #[test]
    fn test_overdue_listing_excludes_finished_statuses() {
        assert!(LIST_OVERDUE_SQL.contains("status IN ('pending', 'in_progress')"));
        assert!(!LIST_OVERDUE_SQL.contains("'completed'"));
        assert!(!LIST_OVERDUE_SQL.contains("'cancelled'"));
    }

    #[test]
    fn test_unknown_ordering_falls_back_to_default() {
        assert_eq!(order_by_clause(Some("password")), "created_at DESC");
        assert_eq!(order_by_clause(Some("")), "created_at DESC");
        assert_eq!(order_by_clause(None), "created_at DESC");
    }
}
