use aws_sdk_dynamodb::types::{AttributeValue, Delete, Put, TransactWriteItem};
use aws_sdk_dynamodb::Client as DynamoClient;
use std::collections::HashMap;

use super::model::{Board, Membership, ROLE_CREATOR, ROLE_MEMBER};

/// GSI mapping a user to every board they belong to (hash `gsi1pk`,
/// range `gsi1sk`, projection ALL).
pub const USER_BOARDS_INDEX: &str = "user-boards";

fn board_pk(board_id: &str) -> String {
    format!("BOARD#{}", board_id)
}

fn member_sk(user_id: &str) -> String {
    format!("MEMBER#{}", user_id)
}

fn board_from_item(board_id: &str, item: &HashMap<String, AttributeValue>) -> Board {
    Board {
        board_id: board_id.to_string(),
        name: item
            .get("board_name")
            .and_then(|v| v.as_s().ok())
            .map(|s| s.to_string())
            .unwrap_or_default(),
        creator_id: item
            .get("creator_id")
            .and_then(|v| v.as_s().ok())
            .map(|s| s.to_string())
            .unwrap_or_default(),
        created_at: item
            .get("created_at")
            .and_then(|v| v.as_s().ok())
            .map(|s| s.to_string())
            .unwrap_or_default(),
    }
}

fn membership_from_item(
    board_id: &str,
    user_id: &str,
    item: &HashMap<String, AttributeValue>,
) -> Membership {
    Membership {
        board_id: board_id.to_string(),
        user_id: user_id.to_string(),
        role: item
            .get("role")
            .and_then(|v| v.as_s().ok())
            .map(|s| s.to_string())
            .unwrap_or_else(|| ROLE_MEMBER.to_string()),
        added_at: item
            .get("added_at")
            .and_then(|v| v.as_s().ok())
            .map(|s| s.to_string())
            .unwrap_or_default(),
    }
}

fn membership_put(
    table_name: &str,
    board_id: &str,
    user_id: &str,
    role: &str,
    added_at: &str,
) -> Result<Put, String> {
    Put::builder()
        .table_name(table_name)
        .item("PK", AttributeValue::S(board_pk(board_id)))
        .item("SK", AttributeValue::S(member_sk(user_id)))
        .item("role", AttributeValue::S(role.to_string()))
        .item("added_at", AttributeValue::S(added_at.to_string()))
        .item("gsi1pk", AttributeValue::S(format!("USER#{}", user_id)))
        .item("gsi1sk", AttributeValue::S(board_pk(board_id)))
        .build()
        .map_err(|e| format!("DynamoDB put build error: {}", e))
}

/// Create a board. The creator membership lands in the same transaction,
/// so a board never exists without its creator in the member set.
pub async fn create_board(
    client: &DynamoClient,
    table_name: &str,
    name: &str,
    creator_id: &str,
) -> Result<Board, String> {
    let board_id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    let meta = Put::builder()
        .table_name(table_name)
        .item("PK", AttributeValue::S(board_pk(&board_id)))
        .item("SK", AttributeValue::S("META".to_string()))
        .item("board_name", AttributeValue::S(name.to_string()))
        .item("creator_id", AttributeValue::S(creator_id.to_string()))
        .item("created_at", AttributeValue::S(now.clone()))
        .build()
        .map_err(|e| format!("DynamoDB put build error: {}", e))?;

    let membership = membership_put(table_name, &board_id, creator_id, ROLE_CREATOR, &now)?;

    client
        .transact_write_items()
        .transact_items(TransactWriteItem::builder().put(meta).build())
        .transact_items(TransactWriteItem::builder().put(membership).build())
        .send()
        .await
        .map_err(|e| format!("DynamoDB transact_write_items error: {}", e))?;

    Ok(Board {
        board_id,
        name: name.to_string(),
        creator_id: creator_id.to_string(),
        created_at: now,
    })
}

/// Get board metadata by id.
pub async fn get_board(
    client: &DynamoClient,
    table_name: &str,
    board_id: &str,
) -> Result<Option<Board>, String> {
    let result = client
        .get_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(board_pk(board_id)))
        .key("SK", AttributeValue::S("META".to_string()))
        .send()
        .await
        .map_err(|e| format!("DynamoDB get_item error: {}", e))?;

    Ok(result.item().map(|item| board_from_item(board_id, item)))
}

/// Rename a board. Creator-only; the caller enforces that.
pub async fn rename_board(
    client: &DynamoClient,
    table_name: &str,
    board_id: &str,
    new_name: &str,
) -> Result<(), String> {
    client
        .update_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(board_pk(board_id)))
        .key("SK", AttributeValue::S("META".to_string()))
        .update_expression("SET board_name = :board_name")
        .expression_attribute_values(":board_name", AttributeValue::S(new_name.to_string()))
        .send()
        .await
        .map_err(|e| format!("DynamoDB update_item error: {}", e))?;

    Ok(())
}

/// Point read of the membership item used by the authorization guard.
pub async fn get_membership(
    client: &DynamoClient,
    table_name: &str,
    board_id: &str,
    user_id: &str,
) -> Result<Option<Membership>, String> {
    let result = client
        .get_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(board_pk(board_id)))
        .key("SK", AttributeValue::S(member_sk(user_id)))
        .send()
        .await
        .map_err(|e| format!("DynamoDB get_item error: {}", e))?;

    Ok(result
        .item()
        .map(|item| membership_from_item(board_id, user_id, item)))
}

/// List every member of a board, creator included.
pub async fn list_members(
    client: &DynamoClient,
    table_name: &str,
    board_id: &str,
) -> Result<Vec<Membership>, String> {
    let result = client
        .query()
        .table_name(table_name)
        .key_condition_expression("PK = :pk AND begins_with(SK, :sk_prefix)")
        .expression_attribute_values(":pk", AttributeValue::S(board_pk(board_id)))
        .expression_attribute_values(":sk_prefix", AttributeValue::S("MEMBER#".to_string()))
        .send()
        .await
        .map_err(|e| format!("DynamoDB query error: {}", e))?;

    let mut members = Vec::new();
    for item in result.items() {
        if let Some(sk) = item.get("SK").and_then(|v| v.as_s().ok()) {
            if let Some(user_id) = sk.strip_prefix("MEMBER#") {
                members.push(membership_from_item(board_id, user_id, item));
            }
        }
    }

    Ok(members)
}

/// Add a member. A single atomic item write; re-adding an existing
/// member is an idempotent overwrite.
pub async fn add_member(
    client: &DynamoClient,
    table_name: &str,
    board_id: &str,
    user_id: &str,
) -> Result<(), String> {
    let now = chrono::Utc::now().to_rfc3339();
    let put = membership_put(table_name, board_id, user_id, ROLE_MEMBER, &now)?;

    client
        .put_item()
        .table_name(table_name)
        .set_item(Some(put.item))
        .send()
        .await
        .map_err(|e| format!("DynamoDB put_item error: {}", e))?;

    Ok(())
}

/// Remove a member. Deleting a non-existent membership is a no-op.
/// Never called for the creator; the handler rejects that first.
pub async fn remove_member(
    client: &DynamoClient,
    table_name: &str,
    board_id: &str,
    user_id: &str,
) -> Result<(), String> {
    client
        .delete_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(board_pk(board_id)))
        .key("SK", AttributeValue::S(member_sk(user_id)))
        .send()
        .await
        .map_err(|e| format!("DynamoDB delete_item error: {}", e))?;

    Ok(())
}

/// Every board the user belongs to, via the user-boards GSI. Replaces
/// the stored created/member board lists of earlier designs.
pub async fn boards_for_user(
    client: &DynamoClient,
    table_name: &str,
    user_id: &str,
) -> Result<Vec<Membership>, String> {
    let result = client
        .query()
        .table_name(table_name)
        .index_name(USER_BOARDS_INDEX)
        .key_condition_expression("gsi1pk = :user")
        .expression_attribute_values(":user", AttributeValue::S(format!("USER#{}", user_id)))
        .send()
        .await
        .map_err(|e| format!("DynamoDB query error: {}", e))?;

    let mut memberships = Vec::new();
    for item in result.items() {
        if let Some(pk) = item.get("PK").and_then(|v| v.as_s().ok()) {
            if let Some(board_id) = pk.strip_prefix("BOARD#") {
                memberships.push(membership_from_item(board_id, user_id, item));
            }
        }
    }

    Ok(memberships)
}

/// Delete a board together with its creator membership in one
/// transaction. The caller has already checked the deletion
/// preconditions (sole member, no tasks).
pub async fn delete_board(
    client: &DynamoClient,
    table_name: &str,
    board_id: &str,
    creator_id: &str,
) -> Result<(), String> {
    let meta = Delete::builder()
        .table_name(table_name)
        .key("PK", AttributeValue::S(board_pk(board_id)))
        .key("SK", AttributeValue::S("META".to_string()))
        .build()
        .map_err(|e| format!("DynamoDB delete build error: {}", e))?;

    let membership = Delete::builder()
        .table_name(table_name)
        .key("PK", AttributeValue::S(board_pk(board_id)))
        .key("SK", AttributeValue::S(member_sk(creator_id)))
        .build()
        .map_err(|e| format!("DynamoDB delete build error: {}", e))?;

    client
        .transact_write_items()
        .transact_items(TransactWriteItem::builder().delete(meta).build())
        .transact_items(TransactWriteItem::builder().delete(membership).build())
        .send()
        .await
        .map_err(|e| format!("DynamoDB transact_write_items error: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn board_item_maps_to_model() {
        let mut item = HashMap::new();
        item.insert(
            "board_name".to_string(),
            AttributeValue::S("Sprint 1".to_string()),
        );
        item.insert("creator_id".to_string(), AttributeValue::S("u1".to_string()));
        item.insert(
            "created_at".to_string(),
            AttributeValue::S("2024-01-01T00:00:00Z".to_string()),
        );

        let board = board_from_item("b1", &item);
        assert_eq!(board.board_id, "b1");
        assert_eq!(board.name, "Sprint 1");
        assert_eq!(board.creator_id, "u1");
    }

    #[test]
    fn membership_item_defaults_to_member_role() {
        let membership = membership_from_item("b1", "u2", &HashMap::new());
        assert_eq!(membership.role, ROLE_MEMBER);
        assert!(!membership.is_creator());
    }

    #[test]
    fn membership_put_carries_index_keys() {
        let put = membership_put("taskboard", "b1", "u2", ROLE_MEMBER, "now").unwrap();
        assert_eq!(
            put.item.get("gsi1pk"),
            Some(&AttributeValue::S("USER#u2".to_string()))
        );
        assert_eq!(
            put.item.get("gsi1sk"),
            Some(&AttributeValue::S("BOARD#b1".to_string()))
        );
        assert_eq!(
            put.item.get("SK"),
            Some(&AttributeValue::S("MEMBER#u2".to_string()))
        );
    }
}
