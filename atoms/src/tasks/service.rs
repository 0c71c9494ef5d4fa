use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use std::collections::HashMap;

use super::model::{CreateTaskPayload, Task, UpdateTaskPayload};

fn board_pk(board_id: &str) -> String {
    format!("BOARD#{}", board_id)
}

fn task_sk(task_id: &str) -> String {
    format!("TASK#{}", task_id)
}

fn task_from_item(board_id: &str, task_id: &str, item: &HashMap<String, AttributeValue>) -> Task {
    Task {
        task_id: task_id.to_string(),
        board_id: board_id.to_string(),
        title: item
            .get("title")
            .and_then(|v| v.as_s().ok())
            .map(|s| s.to_string())
            .unwrap_or_default(),
        due_date: item
            .get("due_date")
            .and_then(|v| v.as_s().ok())
            .map(|s| s.to_string())
            .unwrap_or_default(),
        created_by: item
            .get("created_by")
            .and_then(|v| v.as_s().ok())
            .map(|s| s.to_string())
            .unwrap_or_default(),
        created_at: item
            .get("created_at")
            .and_then(|v| v.as_s().ok())
            .map(|s| s.to_string())
            .unwrap_or_default(),
        completed: item
            .get("completed")
            .and_then(|v| v.as_bool().ok())
            .copied()
            .unwrap_or(false),
        completion_date: item
            .get("completion_date")
            .and_then(|v| v.as_s().ok())
            .map(|s| s.to_string()),
        assigned_to: item
            .get("assigned_to")
            .and_then(|v| v.as_s().ok())
            .map(|s| s.to_string()),
    }
}

/// Load every task on a board.
pub async fn list_board_tasks(
    client: &DynamoClient,
    table_name: &str,
    board_id: &str,
) -> Result<Vec<Task>, String> {
    let result = client
        .query()
        .table_name(table_name)
        .key_condition_expression("PK = :pk AND begins_with(SK, :sk_prefix)")
        .expression_attribute_values(":pk", AttributeValue::S(board_pk(board_id)))
        .expression_attribute_values(":sk_prefix", AttributeValue::S("TASK#".to_string()))
        .send()
        .await
        .map_err(|e| format!("DynamoDB query error: {}", e))?;

    let mut tasks = Vec::new();
    for item in result.items() {
        if let Some(sk) = item.get("SK").and_then(|v| v.as_s().ok()) {
            if let Some(task_id) = sk.strip_prefix("TASK#") {
                tasks.push(task_from_item(board_id, task_id, item));
            }
        }
    }

    Ok(tasks)
}

/// Get a specific task.
pub async fn get_task(
    client: &DynamoClient,
    table_name: &str,
    board_id: &str,
    task_id: &str,
) -> Result<Option<Task>, String> {
    let result = client
        .get_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(board_pk(board_id)))
        .key("SK", AttributeValue::S(task_sk(task_id)))
        .send()
        .await
        .map_err(|e| format!("DynamoDB get_item error: {}", e))?;

    Ok(result
        .item()
        .map(|item| task_from_item(board_id, task_id, item)))
}

/// Point query backing the duplicate-title check. Query-then-insert:
/// two concurrent creations with the same title can both pass.
pub async fn title_exists(
    client: &DynamoClient,
    table_name: &str,
    board_id: &str,
    title: &str,
) -> Result<bool, String> {
    let result = client
        .query()
        .table_name(table_name)
        .key_condition_expression("PK = :pk AND begins_with(SK, :sk_prefix)")
        .filter_expression("#title = :title")
        .expression_attribute_names("#title", "title")
        .expression_attribute_values(":pk", AttributeValue::S(board_pk(board_id)))
        .expression_attribute_values(":sk_prefix", AttributeValue::S("TASK#".to_string()))
        .expression_attribute_values(":title", AttributeValue::S(title.to_string()))
        .send()
        .await
        .map_err(|e| format!("DynamoDB query error: {}", e))?;

    Ok(!result.items().is_empty())
}

/// Create a new task on a board.
pub async fn create_task(
    client: &DynamoClient,
    table_name: &str,
    board_id: &str,
    created_by: &str,
    payload: CreateTaskPayload,
) -> Result<Task, String> {
    let task_id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    let mut builder = client
        .put_item()
        .table_name(table_name)
        .item("PK", AttributeValue::S(board_pk(board_id)))
        .item("SK", AttributeValue::S(task_sk(&task_id)))
        .item("title", AttributeValue::S(payload.title.clone()))
        .item("due_date", AttributeValue::S(payload.due_date.clone()))
        .item("created_by", AttributeValue::S(created_by.to_string()))
        .item("created_at", AttributeValue::S(now.clone()))
        .item("completed", AttributeValue::Bool(false));

    if let Some(assignee) = &payload.assigned_to {
        builder = builder.item("assigned_to", AttributeValue::S(assignee.clone()));
    }

    builder
        .send()
        .await
        .map_err(|e| format!("DynamoDB put_item error: {}", e))?;

    Ok(Task {
        task_id,
        board_id: board_id.to_string(),
        title: payload.title,
        due_date: payload.due_date,
        created_by: created_by.to_string(),
        created_at: now,
        completed: false,
        completion_date: None,
        assigned_to: payload.assigned_to,
    })
}

/// Persist a completion state computed by `Task::toggled`: the date is
/// stored alongside the flag or removed with it.
pub async fn set_completed(
    client: &DynamoClient,
    table_name: &str,
    board_id: &str,
    task_id: &str,
    completed: bool,
    completion_date: Option<String>,
) -> Result<(), String> {
    let mut builder = client
        .update_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(board_pk(board_id)))
        .key("SK", AttributeValue::S(task_sk(task_id)))
        .expression_attribute_values(":completed", AttributeValue::Bool(completed));

    match completion_date {
        Some(date) => {
            builder = builder
                .update_expression("SET completed = :completed, completion_date = :date")
                .expression_attribute_values(":date", AttributeValue::S(date));
        }
        None => {
            builder =
                builder.update_expression("SET completed = :completed REMOVE completion_date");
        }
    }

    builder
        .send()
        .await
        .map_err(|e| format!("DynamoDB update_item error: {}", e))?;

    Ok(())
}

/// Overwrite the mutable task fields. Assignment is either set or
/// removed outright; there is no partial update.
pub async fn update_task(
    client: &DynamoClient,
    table_name: &str,
    board_id: &str,
    task_id: &str,
    payload: UpdateTaskPayload,
) -> Result<(), String> {
    let mut builder = client
        .update_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(board_pk(board_id)))
        .key("SK", AttributeValue::S(task_sk(task_id)))
        .expression_attribute_names("#title", "title")
        .expression_attribute_values(":title", AttributeValue::S(payload.title))
        .expression_attribute_values(":due", AttributeValue::S(payload.due_date));

    match payload.assigned_to {
        Some(assignee) => {
            builder = builder
                .update_expression("SET #title = :title, due_date = :due, assigned_to = :assignee")
                .expression_attribute_values(":assignee", AttributeValue::S(assignee));
        }
        None => {
            builder = builder
                .update_expression("SET #title = :title, due_date = :due REMOVE assigned_to");
        }
    }

    builder
        .send()
        .await
        .map_err(|e| format!("DynamoDB update_item error: {}", e))?;

    Ok(())
}

/// Delete a task. Unconditional; nothing cascades.
pub async fn delete_task(
    client: &DynamoClient,
    table_name: &str,
    board_id: &str,
    task_id: &str,
) -> Result<(), String> {
    client
        .delete_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(board_pk(board_id)))
        .key("SK", AttributeValue::S(task_sk(task_id)))
        .send()
        .await
        .map_err(|e| format!("DynamoDB delete_item error: {}", e))?;

    Ok(())
}

/// Limit-1 probe used by the board-deletion precondition.
pub async fn board_has_tasks(
    client: &DynamoClient,
    table_name: &str,
    board_id: &str,
) -> Result<bool, String> {
    let result = client
        .query()
        .table_name(table_name)
        .key_condition_expression("PK = :pk AND begins_with(SK, :sk_prefix)")
        .expression_attribute_values(":pk", AttributeValue::S(board_pk(board_id)))
        .expression_attribute_values(":sk_prefix", AttributeValue::S("TASK#".to_string()))
        .limit(1)
        .send()
        .await
        .map_err(|e| format!("DynamoDB query error: {}", e))?;

    Ok(!result.items().is_empty())
}

/// Task sort keys in a page of query results.
fn task_sks_in_page(items: &[HashMap<String, AttributeValue>]) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| item.get("SK").and_then(|v| v.as_s().ok()))
        .map(|sk| sk.to_string())
        .collect()
}

/// Clear the assignment on every board task assigned to a removed
/// member, following `last_evaluated_key` so no page of tasks is left
/// behind. Sequential per-task updates; no compensation if one fails.
pub async fn unassign_member_tasks(
    client: &DynamoClient,
    table_name: &str,
    board_id: &str,
    user_id: &str,
) -> Result<(), String> {
    let mut assigned_sks = Vec::new();
    let mut start_key: Option<HashMap<String, AttributeValue>> = None;

    loop {
        let result = client
            .query()
            .table_name(table_name)
            .key_condition_expression("PK = :pk AND begins_with(SK, :sk_prefix)")
            .filter_expression("assigned_to = :assignee")
            .expression_attribute_values(":pk", AttributeValue::S(board_pk(board_id)))
            .expression_attribute_values(":sk_prefix", AttributeValue::S("TASK#".to_string()))
            .expression_attribute_values(":assignee", AttributeValue::S(user_id.to_string()))
            .set_exclusive_start_key(start_key.take())
            .send()
            .await
            .map_err(|e| format!("DynamoDB query error: {}", e))?;

        assigned_sks.extend(task_sks_in_page(result.items()));

        match result.last_evaluated_key() {
            Some(key) => start_key = Some(key.clone()),
            None => break,
        }
    }

    let mut cleared = 0usize;
    for sk in assigned_sks {
        client
            .update_item()
            .table_name(table_name)
            .key("PK", AttributeValue::S(board_pk(board_id)))
            .key("SK", AttributeValue::S(sk))
            .update_expression("REMOVE assigned_to")
            .send()
            .await
            .map_err(|e| format!("DynamoDB update_item error: {}", e))?;
        cleared += 1;
    }

    if cleared > 0 {
        tracing::info!(
            "Cleared {} task assignment(s) for removed member {} on board {}",
            cleared,
            user_id,
            board_id
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_item_maps_to_model() {
        let mut item = HashMap::new();
        item.insert("title".to_string(), AttributeValue::S("Fix bug".to_string()));
        item.insert(
            "due_date".to_string(),
            AttributeValue::S("2024-01-01".to_string()),
        );
        item.insert("created_by".to_string(), AttributeValue::S("u1".to_string()));
        item.insert("completed".to_string(), AttributeValue::Bool(true));
        item.insert(
            "completion_date".to_string(),
            AttributeValue::S("2024-01-02T00:00:00Z".to_string()),
        );
        item.insert("assigned_to".to_string(), AttributeValue::S("u2".to_string()));

        let task = task_from_item("b1", "t1", &item);
        assert_eq!(task.task_id, "t1");
        assert_eq!(task.board_id, "b1");
        assert_eq!(task.title, "Fix bug");
        assert!(task.completed);
        assert_eq!(task.completion_date.as_deref(), Some("2024-01-02T00:00:00Z"));
        assert_eq!(task.assigned_to.as_deref(), Some("u2"));
    }

    #[test]
    fn task_sks_collected_across_pages() {
        let page = |sk: &str| {
            let mut item = HashMap::new();
            item.insert("SK".to_string(), AttributeValue::S(sk.to_string()));
            vec![item]
        };

        let mut sks = task_sks_in_page(&page("TASK#t1"));
        sks.extend(task_sks_in_page(&[]));
        sks.extend(task_sks_in_page(&page("TASK#t2")));
        assert_eq!(sks, vec!["TASK#t1".to_string(), "TASK#t2".to_string()]);
    }

    #[test]
    fn missing_optional_fields_default() {
        let mut item = HashMap::new();
        item.insert("title".to_string(), AttributeValue::S("Fix bug".to_string()));

        let task = task_from_item("b1", "t1", &item);
        assert!(!task.completed);
        assert!(task.completion_date.is_none());
        assert!(task.assigned_to.is_none());
    }
}
