use lambda_http::http::header::LOCATION;
use lambda_http::http::{Method, StatusCode};
use lambda_http::{Body, Error, Request, RequestExt, RequestPayloadExt, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use taskboard_atoms::{boards, tasks, users};
use taskboard_shared::auth::{self, IdentityClaims};
use taskboard_shared::AppState;

use crate::pages;

#[derive(Deserialize)]
struct CreateBoardForm {
    board_name: String,
}

#[derive(Deserialize)]
struct AddTaskForm {
    board_id: String,
    title: String,
    due_date: String,
    assigned_to: Option<String>,
}

#[derive(Deserialize)]
struct TaskActionForm {
    task_id: String,
    board_id: String,
}

#[derive(Deserialize)]
struct EditTaskForm {
    task_id: String,
    board_id: String,
    title: String,
    due_date: String,
    assigned_to: Option<String>,
}

#[derive(Deserialize)]
struct AddUserForm {
    board_id: String,
    user_email: String,
}

#[derive(Deserialize)]
struct RemoveUserForm {
    board_id: String,
    user_id: String,
}

#[derive(Deserialize)]
struct RenameBoardForm {
    board_id: String,
    new_name: String,
}

#[derive(Deserialize)]
struct DeleteBoardForm {
    board_id: String,
}

/// Main Lambda handler - verifies the caller's cookie once, then routes
/// to the page and mutation handlers.
pub(crate) async fn function_handler(
    event: Request,
    state: Arc<AppState>,
) -> Result<Response<Body>, Error> {
    let method = event.method().clone();
    let path = event.uri().path().to_string();
    tracing::info!("{} {}", method, path);

    let claims = authenticate(&state, &event);

    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match (&method, parts.as_slice()) {
        (&Method::GET, []) => home(&state, claims).await,
        (&Method::GET, ["login"]) => entry_page(claims, pages::login_page(&state.identity_web_config)),
        (&Method::GET, ["register"]) => {
            entry_page(claims, pages::register_page(&state.identity_web_config))
        }
        (&Method::GET, ["new-board"]) => match claims {
            Some(_) => html_page(pages::new_board_page()),
            None => redirect("/"),
        },
        (&Method::GET, ["profile"]) => profile(&state, claims).await,
        (&Method::GET, ["board", board_id]) => view_board(&state, claims, board_id, &event).await,
        (&Method::POST, ["create-board"]) => create_board(&state, claims, &event).await,
        (&Method::POST, ["add-task"]) => add_task(&state, claims, &event).await,
        (&Method::POST, ["toggle-task"]) => toggle_task(&state, claims, &event).await,
        (&Method::POST, ["delete-task"]) => delete_task(&state, claims, &event).await,
        (&Method::POST, ["edit-task"]) => edit_task(&state, claims, &event).await,
        (&Method::POST, ["add-user-to-board"]) => add_user_to_board(&state, claims, &event).await,
        (&Method::POST, ["remove-user-from-board"]) => {
            remove_user_from_board(&state, claims, &event).await
        }
        (&Method::POST, ["rename-board"]) => rename_board(&state, claims, &event).await,
        (&Method::POST, ["delete-board"]) => delete_board(&state, claims, &event).await,
        _ => not_found(),
    }
}

fn authenticate(state: &AppState, event: &Request) -> Option<IdentityClaims> {
    let cookie_header = event.headers().get("Cookie").and_then(|v| v.to_str().ok());
    let token = auth::token_from_cookie_header(cookie_header)?;
    state.verifier.verify(token)
}

/// Parse an urlencoded form body. A missing or malformed body collapses
/// to None so the caller falls back to a silent redirect.
fn form<T: DeserializeOwned>(event: &Request) -> Option<T> {
    match event.payload::<T>() {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::warn!("Form parse error: {}", err);
            None
        }
    }
}

fn redirect(location: &str) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::FOUND)
        .header(LOCATION, location)
        .body(Body::Empty)
        .map_err(Box::new)?)
}

fn html_page(markup: String) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/html; charset=utf-8")
        .body(markup.into())
        .map_err(Box::new)?)
}

fn not_found() -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "text/html; charset=utf-8")
        .body(Body::from(pages::error_page("Not found")))
        .map_err(Box::new)?)
}

fn board_path(board_id: &str) -> String {
    format!("/board/{}", board_id)
}

/// Treat an empty form select as "no assignee".
fn normalize_assignee(assigned_to: Option<String>) -> Option<String> {
    assigned_to.filter(|v| !v.trim().is_empty())
}

/// Redirect destination for a denied access decision.
fn deny(access: Access, board_id: &str) -> Option<String> {
    match access {
        Access::Granted => None,
        Access::ToHome => Some("/".to_string()),
        Access::ToBoard => Some(board_path(board_id)),
    }
}

/// Where a board-scoped request may proceed. Redirects are silent:
/// no flash message, no distinct status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Granted,
    /// Anonymous caller, unknown board, or caller is not a member.
    ToHome,
    /// Member without creator rights on a creator-only operation.
    ToBoard,
}

/// Pure access decision over already-fetched state; every board and
/// task handler routes its denials through this table.
fn board_access(
    claims: Option<&IdentityClaims>,
    board: Option<&boards::Board>,
    membership: Option<&boards::Membership>,
    creator_only: bool,
) -> Access {
    let Some(claims) = claims else {
        return Access::ToHome;
    };
    let Some(board) = board else {
        return Access::ToHome;
    };
    if membership.is_none() {
        return Access::ToHome;
    }
    if creator_only && !board.is_creator(&claims.user_id) {
        return Access::ToBoard;
    }
    Access::Granted
}

/// Fetch the board and the caller's membership item for `board_access`.
async fn board_context(
    state: &AppState,
    board_id: &str,
    claims: Option<&IdentityClaims>,
) -> Result<(Option<boards::Board>, Option<boards::Membership>), Error> {
    let Some(claims) = claims else {
        return Ok((None, None));
    };

    let Some(board) = boards::get_board(&state.dynamo_client, &state.table_name, board_id).await?
    else {
        return Ok((None, None));
    };

    let membership = boards::get_membership(
        &state.dynamo_client,
        &state.table_name,
        board_id,
        &claims.user_id,
    )
    .await?;

    Ok((Some(board), membership))
}

async fn home(state: &AppState, claims: Option<IdentityClaims>) -> Result<Response<Body>, Error> {
    let Some(claims) = claims else {
        return html_page(pages::main_page(None));
    };

    let user = users::get_or_create(
        &state.dynamo_client,
        &state.table_name,
        &claims.user_id,
        &claims.email,
    )
    .await?;

    let memberships =
        boards::boards_for_user(&state.dynamo_client, &state.table_name, &claims.user_id).await?;

    let mut summaries = Vec::new();
    for membership in &memberships {
        if let Some(board) =
            boards::get_board(&state.dynamo_client, &state.table_name, &membership.board_id).await?
        {
            summaries.push(pages::BoardSummary {
                board_id: board.board_id,
                name: board.name,
                is_creator: membership.is_creator(),
            });
        }
    }
    // Created boards listed ahead of memberships
    summaries.sort_by_key(|b| !b.is_creator);

    html_page(pages::main_page(Some((&user, &summaries))))
}

fn entry_page(claims: Option<IdentityClaims>, markup: String) -> Result<Response<Body>, Error> {
    if claims.is_some() {
        return redirect("/");
    }
    html_page(markup)
}

async fn profile(
    state: &AppState,
    claims: Option<IdentityClaims>,
) -> Result<Response<Body>, Error> {
    let Some(claims) = claims else {
        return redirect("/");
    };

    let user = users::get_or_create(
        &state.dynamo_client,
        &state.table_name,
        &claims.user_id,
        &claims.email,
    )
    .await?;

    let memberships =
        boards::boards_for_user(&state.dynamo_client, &state.table_name, &claims.user_id).await?;
    let created = memberships.iter().filter(|m| m.is_creator()).count();
    let joined = memberships.len() - created;

    html_page(pages::profile_page(&user, created, joined))
}

async fn view_board(
    state: &AppState,
    claims: Option<IdentityClaims>,
    board_id: &str,
    event: &Request,
) -> Result<Response<Body>, Error> {
    let Some(claims) = claims else {
        return redirect("/");
    };
    let (board, membership) = board_context(state, board_id, Some(&claims)).await?;
    if let Some(dest) = deny(
        board_access(Some(&claims), board.as_ref(), membership.as_ref(), false),
        board_id,
    ) {
        return redirect(&dest);
    }
    let Some(board) = board else {
        return redirect("/");
    };

    let members = boards::list_members(&state.dynamo_client, &state.table_name, board_id).await?;
    let member_ids: Vec<String> = members.iter().map(|m| m.user_id.clone()).collect();

    let mut member_views = Vec::new();
    for membership in &members {
        if let Some(profile) =
            users::get_user(&state.dynamo_client, &state.table_name, &membership.user_id).await?
        {
            member_views.push(pages::MemberView {
                user_id: profile.user_id,
                name: profile.name,
                email: profile.email,
                is_creator: membership.is_creator(),
                added_at: membership.added_at.clone(),
            });
        }
    }

    let board_tasks =
        tasks::list_board_tasks(&state.dynamo_client, &state.table_name, board_id).await?;

    let mut active_tasks = 0usize;
    let mut completed_tasks = 0usize;
    let mut task_views = Vec::new();
    for task in board_tasks {
        if task.completed {
            completed_tasks += 1;
        } else {
            active_tasks += 1;
        }

        // Live derivation overrides whatever assignment history says
        let unassigned = task.is_unassigned(&member_ids);
        let assignee_name = if unassigned {
            None
        } else {
            task.assigned_to.as_ref().and_then(|assignee| {
                member_views
                    .iter()
                    .find(|m| &m.user_id == assignee)
                    .map(|m| m.name.clone())
            })
        };

        task_views.push(pages::TaskView {
            task,
            unassigned,
            assignee_name,
        });
    }

    let duplicate_error = event
        .query_string_parameters_ref()
        .and_then(|params| params.first("error"))
        == Some("duplicate_task");

    html_page(pages::board_page(
        &board,
        &task_views,
        &member_views,
        board.is_creator(&claims.user_id),
        active_tasks,
        completed_tasks,
        duplicate_error,
    ))
}

async fn create_board(
    state: &AppState,
    claims: Option<IdentityClaims>,
    event: &Request,
) -> Result<Response<Body>, Error> {
    let Some(claims) = claims else {
        return redirect("/");
    };
    let Some(form) = form::<CreateBoardForm>(event) else {
        return redirect("/");
    };

    users::get_or_create(
        &state.dynamo_client,
        &state.table_name,
        &claims.user_id,
        &claims.email,
    )
    .await?;

    boards::create_board(
        &state.dynamo_client,
        &state.table_name,
        &form.board_name,
        &claims.user_id,
    )
    .await?;

    redirect("/")
}

async fn add_task(
    state: &AppState,
    claims: Option<IdentityClaims>,
    event: &Request,
) -> Result<Response<Body>, Error> {
    let Some(claims) = claims else {
        return redirect("/");
    };
    let Some(form) = form::<AddTaskForm>(event) else {
        return redirect("/");
    };
    let (board, membership) = board_context(state, &form.board_id, Some(&claims)).await?;
    if let Some(dest) = deny(
        board_access(Some(&claims), board.as_ref(), membership.as_ref(), false),
        &form.board_id,
    ) {
        return redirect(&dest);
    }

    if tasks::title_exists(
        &state.dynamo_client,
        &state.table_name,
        &form.board_id,
        &form.title,
    )
    .await?
    {
        return redirect(&format!(
            "{}?error=duplicate_task",
            board_path(&form.board_id)
        ));
    }

    tasks::create_task(
        &state.dynamo_client,
        &state.table_name,
        &form.board_id,
        &claims.user_id,
        tasks::CreateTaskPayload {
            title: form.title,
            due_date: form.due_date,
            assigned_to: normalize_assignee(form.assigned_to),
        },
    )
    .await?;

    redirect(&board_path(&form.board_id))
}

async fn toggle_task(
    state: &AppState,
    claims: Option<IdentityClaims>,
    event: &Request,
) -> Result<Response<Body>, Error> {
    let Some(claims) = claims else {
        return redirect("/");
    };
    let Some(form) = form::<TaskActionForm>(event) else {
        return redirect("/");
    };
    let (board, membership) = board_context(state, &form.board_id, Some(&claims)).await?;
    if let Some(dest) = deny(
        board_access(Some(&claims), board.as_ref(), membership.as_ref(), false),
        &form.board_id,
    ) {
        return redirect(&dest);
    }

    let Some(task) = tasks::get_task(
        &state.dynamo_client,
        &state.table_name,
        &form.board_id,
        &form.task_id,
    )
    .await?
    else {
        return redirect(&board_path(&form.board_id));
    };

    let updated = task.toggled(&chrono::Utc::now().to_rfc3339());
    tasks::set_completed(
        &state.dynamo_client,
        &state.table_name,
        &form.board_id,
        &form.task_id,
        updated.completed,
        updated.completion_date,
    )
    .await?;

    redirect(&board_path(&form.board_id))
}

async fn delete_task(
    state: &AppState,
    claims: Option<IdentityClaims>,
    event: &Request,
) -> Result<Response<Body>, Error> {
    let Some(claims) = claims else {
        return redirect("/");
    };
    let Some(form) = form::<TaskActionForm>(event) else {
        return redirect("/");
    };
    let (board, membership) = board_context(state, &form.board_id, Some(&claims)).await?;
    if let Some(dest) = deny(
        board_access(Some(&claims), board.as_ref(), membership.as_ref(), false),
        &form.board_id,
    ) {
        return redirect(&dest);
    }

    tasks::delete_task(
        &state.dynamo_client,
        &state.table_name,
        &form.board_id,
        &form.task_id,
    )
    .await?;

    redirect(&board_path(&form.board_id))
}

async fn edit_task(
    state: &AppState,
    claims: Option<IdentityClaims>,
    event: &Request,
) -> Result<Response<Body>, Error> {
    let Some(claims) = claims else {
        return redirect("/");
    };
    let Some(form) = form::<EditTaskForm>(event) else {
        return redirect("/");
    };
    let (board, membership) = board_context(state, &form.board_id, Some(&claims)).await?;
    if let Some(dest) = deny(
        board_access(Some(&claims), board.as_ref(), membership.as_ref(), false),
        &form.board_id,
    ) {
        return redirect(&dest);
    }

    // Guard against upserting a phantom item for a deleted task id
    if tasks::get_task(
        &state.dynamo_client,
        &state.table_name,
        &form.board_id,
        &form.task_id,
    )
    .await?
    .is_none()
    {
        return redirect(&board_path(&form.board_id));
    }

    tasks::update_task(
        &state.dynamo_client,
        &state.table_name,
        &form.board_id,
        &form.task_id,
        tasks::UpdateTaskPayload {
            title: form.title,
            due_date: form.due_date,
            assigned_to: normalize_assignee(form.assigned_to),
        },
    )
    .await?;

    redirect(&board_path(&form.board_id))
}

async fn add_user_to_board(
    state: &AppState,
    claims: Option<IdentityClaims>,
    event: &Request,
) -> Result<Response<Body>, Error> {
    let Some(claims) = claims else {
        return redirect("/");
    };
    let Some(form) = form::<AddUserForm>(event) else {
        return redirect("/");
    };

    let (board, membership) = board_context(state, &form.board_id, Some(&claims)).await?;
    if let Some(dest) = deny(
        board_access(Some(&claims), board.as_ref(), membership.as_ref(), true),
        &form.board_id,
    ) {
        return redirect(&dest);
    }

    let Some(user) =
        users::find_by_email(&state.dynamo_client, &state.table_name, &form.user_email).await?
    else {
        return redirect(&board_path(&form.board_id));
    };

    if boards::get_membership(
        &state.dynamo_client,
        &state.table_name,
        &form.board_id,
        &user.user_id,
    )
    .await?
    .is_some()
    {
        return redirect(&board_path(&form.board_id));
    }

    boards::add_member(
        &state.dynamo_client,
        &state.table_name,
        &form.board_id,
        &user.user_id,
    )
    .await?;

    redirect(&board_path(&form.board_id))
}

async fn remove_user_from_board(
    state: &AppState,
    claims: Option<IdentityClaims>,
    event: &Request,
) -> Result<Response<Body>, Error> {
    let Some(claims) = claims else {
        return redirect("/");
    };
    let Some(form) = form::<RemoveUserForm>(event) else {
        return redirect("/");
    };

    let (board, membership) = board_context(state, &form.board_id, Some(&claims)).await?;
    if let Some(dest) = deny(
        board_access(Some(&claims), board.as_ref(), membership.as_ref(), true),
        &form.board_id,
    ) {
        return redirect(&dest);
    }
    // The creator cannot be removed, not even by themselves
    if board.is_some_and(|b| form.user_id == b.creator_id) {
        return redirect(&board_path(&form.board_id));
    }

    boards::remove_member(
        &state.dynamo_client,
        &state.table_name,
        &form.board_id,
        &form.user_id,
    )
    .await?;

    tasks::unassign_member_tasks(
        &state.dynamo_client,
        &state.table_name,
        &form.board_id,
        &form.user_id,
    )
    .await?;

    redirect(&board_path(&form.board_id))
}

async fn rename_board(
    state: &AppState,
    claims: Option<IdentityClaims>,
    event: &Request,
) -> Result<Response<Body>, Error> {
    let Some(claims) = claims else {
        return redirect("/");
    };
    let Some(form) = form::<RenameBoardForm>(event) else {
        return redirect("/");
    };

    let (board, membership) = board_context(state, &form.board_id, Some(&claims)).await?;
    if let Some(dest) = deny(
        board_access(Some(&claims), board.as_ref(), membership.as_ref(), true),
        &form.board_id,
    ) {
        return redirect(&dest);
    }

    boards::rename_board(
        &state.dynamo_client,
        &state.table_name,
        &form.board_id,
        &form.new_name,
    )
    .await?;

    redirect(&board_path(&form.board_id))
}

async fn delete_board(
    state: &AppState,
    claims: Option<IdentityClaims>,
    event: &Request,
) -> Result<Response<Body>, Error> {
    let Some(claims) = claims else {
        return redirect("/");
    };
    let Some(form) = form::<DeleteBoardForm>(event) else {
        return redirect("/");
    };

    let (board, membership) = board_context(state, &form.board_id, Some(&claims)).await?;
    // Every denial here lands on the home page
    if board_access(Some(&claims), board.as_ref(), membership.as_ref(), true) != Access::Granted {
        return redirect("/");
    }

    let members =
        boards::list_members(&state.dynamo_client, &state.table_name, &form.board_id).await?;
    let has_tasks =
        tasks::board_has_tasks(&state.dynamo_client, &state.table_name, &form.board_id).await?;
    if !boards::model::deletable(members.len(), has_tasks) {
        return redirect(&board_path(&form.board_id));
    }

    boards::delete_board(
        &state.dynamo_client,
        &state.table_name,
        &form.board_id,
        &claims.user_id,
    )
    .await?;

    redirect("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form_request(body: &str) -> Request {
        lambda_http::http::Request::builder()
            .method("POST")
            .uri("/add-task")
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    }

    #[test]
    fn redirect_sets_found_and_location() {
        let resp = redirect("/board/b1").unwrap();
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(resp.headers().get(LOCATION).unwrap(), "/board/b1");
        assert!(matches!(resp.body(), Body::Empty));
    }

    #[test]
    fn add_task_form_parses_urlencoded_body() {
        let req = form_request("board_id=b1&title=Fix+bug&due_date=2024-01-01&assigned_to=u2");
        let parsed: AddTaskForm = form(&req).unwrap();
        assert_eq!(parsed.board_id, "b1");
        assert_eq!(parsed.title, "Fix bug");
        assert_eq!(parsed.due_date, "2024-01-01");
        assert_eq!(parsed.assigned_to.as_deref(), Some("u2"));
    }

    #[test]
    fn missing_form_fields_collapse_to_none() {
        let req = form_request("board_id=b1");
        assert!(form::<AddTaskForm>(&req).is_none());

        let empty = lambda_http::http::Request::builder()
            .method("POST")
            .uri("/add-task")
            .body(Body::Empty)
            .unwrap();
        assert!(form::<AddTaskForm>(&empty).is_none());
    }

    #[test]
    fn empty_assignee_normalizes_to_none() {
        assert_eq!(normalize_assignee(Some(String::new())), None);
        assert_eq!(normalize_assignee(Some("  ".to_string())), None);
        assert_eq!(
            normalize_assignee(Some("u2".to_string())),
            Some("u2".to_string())
        );
        assert_eq!(normalize_assignee(None), None);
    }

    #[test]
    fn board_path_format() {
        assert_eq!(board_path("b1"), "/board/b1");
    }

    fn test_claims(user_id: &str) -> IdentityClaims {
        IdentityClaims {
            user_id: user_id.to_string(),
            email: format!("{}@example.com", user_id),
        }
    }

    fn test_board() -> boards::Board {
        boards::Board {
            board_id: "b1".to_string(),
            name: "Sprint 1".to_string(),
            creator_id: "creator".to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    fn test_membership(user_id: &str, role: &str) -> boards::Membership {
        boards::Membership {
            board_id: "b1".to_string(),
            user_id: user_id.to_string(),
            role: role.to_string(),
            added_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn access_decision_table() {
        let creator = test_claims("creator");
        let member = test_claims("u2");
        let board = test_board();
        let creator_m = test_membership("creator", boards::model::ROLE_CREATOR);
        let member_m = test_membership("u2", boards::model::ROLE_MEMBER);

        // Anonymous callers go home, board or no board
        assert_eq!(board_access(None, None, None, false), Access::ToHome);
        assert_eq!(
            board_access(None, Some(&board), Some(&member_m), false),
            Access::ToHome
        );
        // Unknown board
        assert_eq!(board_access(Some(&creator), None, None, false), Access::ToHome);
        // Signed in but not a member
        assert_eq!(
            board_access(Some(&member), Some(&board), None, false),
            Access::ToHome
        );
        // Member on a member operation
        assert_eq!(
            board_access(Some(&member), Some(&board), Some(&member_m), false),
            Access::Granted
        );
        // Member on a creator-only operation bounces to the board
        assert_eq!(
            board_access(Some(&member), Some(&board), Some(&member_m), true),
            Access::ToBoard
        );
        // Creator passes the creator-only gate
        assert_eq!(
            board_access(Some(&creator), Some(&board), Some(&creator_m), true),
            Access::Granted
        );
    }

    #[test]
    fn denied_access_redirects_silently() {
        assert_eq!(deny(Access::Granted, "b1"), None);
        assert_eq!(deny(Access::ToHome, "b1"), Some("/".to_string()));
        assert_eq!(deny(Access::ToBoard, "b1"), Some("/board/b1".to_string()));
    }
}
