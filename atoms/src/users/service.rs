use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use std::collections::HashMap;

use super::model::User;

fn user_pk(user_id: &str) -> String {
    format!("USER#{}", user_id)
}

fn user_from_item(user_id: &str, item: &HashMap<String, AttributeValue>) -> User {
    let email = item
        .get("email")
        .and_then(|v| v.as_s().ok())
        .map(|s| s.to_string())
        .unwrap_or_default();
    let mut name = item
        .get("name")
        .and_then(|v| v.as_s().ok())
        .map(|s| s.to_string())
        .unwrap_or_default();
    if name.trim().is_empty() {
        name = email.clone();
    }

    User {
        user_id: user_id.to_string(),
        name,
        email,
    }
}

/// Fetch the profile for a verified identity, creating it on first
/// sighting. The read-or-insert is not isolated; two concurrent first
/// logins write the same default profile and last write wins.
pub async fn get_or_create(
    client: &DynamoClient,
    table_name: &str,
    user_id: &str,
    email: &str,
) -> Result<User, String> {
    if let Some(user) = get_user(client, table_name, user_id).await? {
        return Ok(user);
    }

    let user = User {
        user_id: user_id.to_string(),
        name: email.to_string(),
        email: email.to_string(),
    };

    client
        .put_item()
        .table_name(table_name)
        .item("PK", AttributeValue::S(user_pk(user_id)))
        .item("SK", AttributeValue::S("PROFILE".to_string()))
        .item("name", AttributeValue::S(user.name.clone()))
        .item("email", AttributeValue::S(user.email.clone()))
        .send()
        .await
        .map_err(|e| format!("DynamoDB put_item error: {}", e))?;

    tracing::info!("Created profile for new user {}", user_id);

    Ok(user)
}

/// Get a user profile by id.
pub async fn get_user(
    client: &DynamoClient,
    table_name: &str,
    user_id: &str,
) -> Result<Option<User>, String> {
    let result = client
        .get_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(user_pk(user_id)))
        .key("SK", AttributeValue::S("PROFILE".to_string()))
        .send()
        .await
        .map_err(|e| format!("DynamoDB get_item error: {}", e))?;

    Ok(result
        .item()
        .map(|item| user_from_item(user_id, item)))
}

/// First profile in a page of scan results, if any.
fn profile_in_page(items: &[HashMap<String, AttributeValue>]) -> Option<User> {
    for item in items {
        if let Some(pk) = item.get("PK").and_then(|v| v.as_s().ok()) {
            if let Some(user_id) = pk.strip_prefix("USER#") {
                return Some(user_from_item(user_id, item));
            }
        }
    }
    None
}

/// Look a user up by email. Linear scan over profiles, following
/// `last_evaluated_key` until a match is found or the table is
/// exhausted; board invitations are rare enough that an index is not
/// worth carrying.
pub async fn find_by_email(
    client: &DynamoClient,
    table_name: &str,
    email: &str,
) -> Result<Option<User>, String> {
    let mut start_key: Option<HashMap<String, AttributeValue>> = None;

    loop {
        let result = client
            .scan()
            .table_name(table_name)
            .filter_expression("SK = :profile AND email = :email")
            .expression_attribute_values(":profile", AttributeValue::S("PROFILE".to_string()))
            .expression_attribute_values(":email", AttributeValue::S(email.to_string()))
            .set_exclusive_start_key(start_key.take())
            .send()
            .await
            .map_err(|e| format!("DynamoDB scan error: {}", e))?;

        if let Some(user) = profile_in_page(result.items()) {
            return Ok(Some(user));
        }

        match result.last_evaluated_key() {
            Some(key) => start_key = Some(key.clone()),
            None => return Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(fields: &[(&str, &str)]) -> HashMap<String, AttributeValue> {
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), AttributeValue::S(v.to_string())))
            .collect()
    }

    #[test]
    fn item_maps_to_user() {
        let user = user_from_item("u1", &item(&[("name", "Alice"), ("email", "a@example.com")]));
        assert_eq!(user.user_id, "u1");
        assert_eq!(user.name, "Alice");
        assert_eq!(user.email, "a@example.com");
    }

    #[test]
    fn profile_found_regardless_of_page_position() {
        let pages: Vec<Vec<HashMap<String, AttributeValue>>> = vec![
            vec![],
            vec![item(&[
                ("PK", "USER#u7"),
                ("SK", "PROFILE"),
                ("name", "Carol"),
                ("email", "c@example.com"),
            ])],
        ];

        // An empty page must not terminate the search
        assert!(profile_in_page(&pages[0]).is_none());
        let user = profile_in_page(&pages[1]).unwrap();
        assert_eq!(user.user_id, "u7");
        assert_eq!(user.name, "Carol");
    }

    #[test]
    fn non_user_keys_are_skipped() {
        let page = vec![item(&[("PK", "BOARD#b1"), ("SK", "META")])];
        assert!(profile_in_page(&page).is_none());
    }

    #[test]
    fn blank_name_falls_back_to_email() {
        let user = user_from_item("u1", &item(&[("name", "  "), ("email", "a@example.com")]));
        assert_eq!(user.name, "a@example.com");

        let user = user_from_item("u1", &item(&[("email", "a@example.com")]));
        assert_eq!(user.name, "a@example.com");
    }
}
