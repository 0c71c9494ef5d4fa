use taskboard_atoms::boards::Board;
use taskboard_atoms::tasks::Task;
use taskboard_atoms::users::User;

pub struct BoardSummary {
    pub board_id: String,
    pub name: String,
    pub is_creator: bool,
}

pub struct MemberView {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub is_creator: bool,
    /// RFC 3339 timestamp from the membership item; only the date part
    /// is rendered.
    pub added_at: String,
}

pub struct TaskView {
    pub task: Task,
    pub unassigned: bool,
    pub assignee_name: Option<String>,
}

const STYLE: &str = "\
body{font-family:sans-serif;max-width:720px;margin:2rem auto;padding:0 1rem;color:#222}\
nav a{margin-right:1rem}\
ul{list-style:none;padding:0}\
li{padding:.4rem 0;border-bottom:1px solid #eee}\
form.inline{display:inline}\
.done{text-decoration:line-through;color:#888}\
.badge{font-size:.75rem;background:#eef;border-radius:3px;padding:0 .3rem}\
.error{background:#fdd;border:1px solid #c99;padding:.5rem;margin:.5rem 0}\
.muted{color:#888;font-size:.85rem}";

fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\">\
<title>{}</title><style>{}</style></head><body>{}</body></html>",
        escape(title),
        STYLE,
        body
    )
}

/// Home page: board list for a signed-in user, login prompt otherwise.
pub fn main_page(user: Option<(&User, &[BoardSummary])>) -> String {
    let Some((user, boards)) = user else {
        return layout(
            "Task Boards",
            "<h1>Task Boards</h1>\
<p>Organize your work into boards and share them with your team.</p>\
<p><a href=\"/login\">Log in</a> or <a href=\"/register\">register</a> to get started.</p>",
        );
    };

    let mut body = format!(
        "<nav><a href=\"/\">Home</a><a href=\"/profile\">Profile</a>\
<a href=\"/new-board\">New board</a><a href=\"#\" onclick=\"document.cookie='token=; Max-Age=0; path=/';location.href='/';return false\">Log out</a></nav>\
<h1>Welcome, {}</h1>",
        escape(&user.name)
    );

    let (created, joined): (Vec<&BoardSummary>, Vec<&BoardSummary>) =
        boards.iter().partition(|b| b.is_creator);

    body.push_str("<h2>Your boards</h2>");
    if created.is_empty() {
        body.push_str("<p class=\"muted\">No boards yet.</p>");
    } else {
        body.push_str("<ul>");
        for board in created {
            body.push_str(&format!(
                "<li><a href=\"/board/{}\">{}</a> <span class=\"badge\">creator</span></li>",
                escape(&board.board_id),
                escape(&board.name)
            ));
        }
        body.push_str("</ul>");
    }

    body.push_str("<h2>Shared with you</h2>");
    if joined.is_empty() {
        body.push_str("<p class=\"muted\">Nothing shared with you yet.</p>");
    } else {
        body.push_str("<ul>");
        for board in joined {
            body.push_str(&format!(
                "<li><a href=\"/board/{}\">{}</a></li>",
                escape(&board.board_id),
                escape(&board.name)
            ));
        }
        body.push_str("</ul>");
    }

    layout("Task Boards", &body)
}

fn auth_page(title: &str, button_id: &str, button_label: &str, web_config: &str) -> String {
    let body = format!(
        "<h1>{title}</h1>\
<p id=\"auth-error\" class=\"error\" hidden></p>\
<form onsubmit=\"return false\">\
<p><label>Email <input type=\"email\" id=\"email\" required></label></p>\
<p><label>Password <input type=\"password\" id=\"password\" required></label></p>\
<p><button id=\"{button_id}\">{button_label}</button></p>\
</form>\
<p><a href=\"/\">Back</a></p>\
<script>window.IDENTITY_CONFIG = {web_config};</script>\
<script type=\"module\">\
import {{ initializeApp }} from \"https://www.gstatic.com/firebasejs/9.22.2/firebase-app.js\";\
import {{ getAuth, createUserWithEmailAndPassword, signInWithEmailAndPassword }} from \"https://www.gstatic.com/firebasejs/9.22.2/firebase-auth.js\";\
const auth = getAuth(initializeApp(window.IDENTITY_CONFIG));\
const call = \"{button_id}\" === \"register-btn\" ? createUserWithEmailAndPassword : signInWithEmailAndPassword;\
document.getElementById(\"{button_id}\").addEventListener(\"click\", () => {{\
  call(auth, document.getElementById(\"email\").value, document.getElementById(\"password\").value)\
    .then(cred => cred.user.getIdToken())\
    .then(token => {{ document.cookie = \"token=\" + token + \"; path=/\"; location.href = \"/\"; }})\
    .catch(err => {{ const el = document.getElementById(\"auth-error\"); el.textContent = err.message; el.hidden = false; }});\
}});\
</script>",
        title = escape(title),
        button_id = button_id,
        button_label = escape(button_label),
        web_config = web_config,
    );
    layout(title, &body)
}

pub fn login_page(web_config: &str) -> String {
    auth_page("Log in", "login-btn", "Log in", web_config)
}

pub fn register_page(web_config: &str) -> String {
    auth_page("Register", "register-btn", "Create account", web_config)
}

pub fn new_board_page() -> String {
    layout(
        "New board",
        "<h1>Create a board</h1>\
<form method=\"post\" action=\"/create-board\">\
<p><label>Board name <input type=\"text\" name=\"board_name\" required></label></p>\
<p><button type=\"submit\">Create</button></p>\
</form>\
<p><a href=\"/\">Back</a></p>",
    )
}

pub fn profile_page(user: &User, created_boards: usize, member_boards: usize) -> String {
    let body = format!(
        "<nav><a href=\"/\">Home</a></nav>\
<h1>Profile</h1>\
<ul>\
<li>Name: {}</li>\
<li>Email: {}</li>\
<li>Boards created: {}</li>\
<li>Boards joined: {}</li>\
</ul>",
        escape(&user.name),
        escape(&user.email),
        created_boards,
        member_boards
    );
    layout("Profile", &body)
}

/// Board detail page: stats, task list with per-task actions, member
/// management for the creator.
pub fn board_page(
    board: &Board,
    tasks: &[TaskView],
    members: &[MemberView],
    is_creator: bool,
    active_tasks: usize,
    completed_tasks: usize,
    duplicate_error: bool,
) -> String {
    let board_id = escape(&board.board_id);
    let mut body = format!(
        "<nav><a href=\"/\">Home</a><a href=\"/profile\">Profile</a></nav><h1>{}</h1>",
        escape(&board.name)
    );

    if duplicate_error {
        body.push_str(
            "<p class=\"error\">A task with that title already exists on this board.</p>",
        );
    }

    body.push_str(&format!(
        "<p class=\"muted\">{} tasks - {} active, {} completed</p>",
        active_tasks + completed_tasks,
        active_tasks,
        completed_tasks
    ));

    if is_creator {
        body.push_str(&format!(
            "<form method=\"post\" action=\"/rename-board\" class=\"inline\">\
<input type=\"hidden\" name=\"board_id\" value=\"{board_id}\">\
<input type=\"text\" name=\"new_name\" value=\"{}\" required>\
<button type=\"submit\">Rename</button></form> \
<form method=\"post\" action=\"/delete-board\" class=\"inline\">\
<input type=\"hidden\" name=\"board_id\" value=\"{board_id}\">\
<button type=\"submit\">Delete board</button></form>",
            escape(&board.name)
        ));
    }

    // Assignee options are current members only
    let mut assignee_options =
        String::from("<option value=\"\">Unassigned</option>");
    for member in members {
        assignee_options.push_str(&format!(
            "<option value=\"{}\">{}</option>",
            escape(&member.user_id),
            escape(&member.name)
        ));
    }

    body.push_str(&format!(
        "<h2>Add task</h2>\
<form method=\"post\" action=\"/add-task\">\
<input type=\"hidden\" name=\"board_id\" value=\"{board_id}\">\
<p><label>Title <input type=\"text\" name=\"title\" required></label></p>\
<p><label>Due date <input type=\"date\" name=\"due_date\" required></label></p>\
<p><label>Assign to <select name=\"assigned_to\">{assignee_options}</select></label></p>\
<p><button type=\"submit\">Add task</button></p>\
</form>"
    ));

    body.push_str("<h2>Tasks</h2>");
    if tasks.is_empty() {
        body.push_str("<p class=\"muted\">No tasks yet.</p>");
    } else {
        body.push_str("<ul>");
        for view in tasks {
            let task = &view.task;
            let task_id = escape(&task.task_id);
            let title_class = if task.completed { "done" } else { "" };
            let assignee = match (&view.assignee_name, view.unassigned) {
                (Some(name), false) => escape(name),
                _ => "Unassigned".to_string(),
            };
            let completion = task
                .completion_date
                .as_deref()
                .map(|d| format!(" - completed {}", escape(d)))
                .unwrap_or_default();

            body.push_str(&format!(
                "<li><span class=\"{title_class}\">{}</span> \
<span class=\"muted\">due {} - {}{completion}</span> \
<form method=\"post\" action=\"/toggle-task\" class=\"inline\">\
<input type=\"hidden\" name=\"task_id\" value=\"{task_id}\">\
<input type=\"hidden\" name=\"board_id\" value=\"{board_id}\">\
<button type=\"submit\">{}</button></form> \
<form method=\"post\" action=\"/delete-task\" class=\"inline\">\
<input type=\"hidden\" name=\"task_id\" value=\"{task_id}\">\
<input type=\"hidden\" name=\"board_id\" value=\"{board_id}\">\
<button type=\"submit\">Delete</button></form>\
<details><summary>Edit</summary>\
<form method=\"post\" action=\"/edit-task\">\
<input type=\"hidden\" name=\"task_id\" value=\"{task_id}\">\
<input type=\"hidden\" name=\"board_id\" value=\"{board_id}\">\
<p><label>Title <input type=\"text\" name=\"title\" value=\"{}\" required></label></p>\
<p><label>Due date <input type=\"date\" name=\"due_date\" value=\"{}\" required></label></p>\
<p><label>Assign to <select name=\"assigned_to\">{assignee_options}</select></label></p>\
<p><button type=\"submit\">Save</button></p>\
</form></details></li>",
                escape(&task.title),
                escape(&task.due_date),
                assignee,
                if task.completed {
                    "Mark active"
                } else {
                    "Mark complete"
                },
                escape(&task.title),
                escape(&task.due_date),
            ));
        }
        body.push_str("</ul>");
    }

    body.push_str("<h2>Members</h2><ul>");
    for member in members {
        body.push_str(&format!(
            "<li>{} <span class=\"muted\">{} - joined {}</span>",
            escape(&member.name),
            escape(&member.email),
            escape(member.added_at.get(..10).unwrap_or(&member.added_at))
        ));
        if member.is_creator {
            body.push_str(" <span class=\"badge\">creator</span>");
        } else if is_creator {
            body.push_str(&format!(
                " <form method=\"post\" action=\"/remove-user-from-board\" class=\"inline\">\
<input type=\"hidden\" name=\"board_id\" value=\"{board_id}\">\
<input type=\"hidden\" name=\"user_id\" value=\"{}\">\
<button type=\"submit\">Remove</button></form>",
                escape(&member.user_id)
            ));
        }
        body.push_str("</li>");
    }
    body.push_str("</ul>");

    if is_creator {
        body.push_str(&format!(
            "<h2>Invite</h2>\
<form method=\"post\" action=\"/add-user-to-board\">\
<input type=\"hidden\" name=\"board_id\" value=\"{board_id}\">\
<p><label>Email <input type=\"email\" name=\"user_email\" required></label></p>\
<p><button type=\"submit\">Add member</button></p>\
</form>"
        ));
    }

    layout(&board.name, &body)
}

pub fn error_page(message: &str) -> String {
    layout(
        "Error",
        &format!(
            "<h1>Something went wrong</h1><p>{}</p><p><a href=\"/\">Home</a></p>",
            escape(message)
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            user_id: "u1".to_string(),
            name: "Alice".to_string(),
            email: "a@example.com".to_string(),
        }
    }

    fn board() -> Board {
        Board {
            board_id: "b1".to_string(),
            name: "Sprint 1".to_string(),
            creator_id: "u1".to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    fn task_view(unassigned: bool, assignee_name: Option<&str>) -> TaskView {
        TaskView {
            task: Task {
                task_id: "t1".to_string(),
                board_id: "b1".to_string(),
                title: "Fix bug".to_string(),
                due_date: "2024-01-01".to_string(),
                created_by: "u1".to_string(),
                created_at: "2024-01-01T00:00:00Z".to_string(),
                completed: false,
                completion_date: None,
                assigned_to: None,
            },
            unassigned,
            assignee_name: assignee_name.map(|s| s.to_string()),
        }
    }

    fn creator_view() -> MemberView {
        MemberView {
            user_id: "u1".to_string(),
            name: "Alice".to_string(),
            email: "a@example.com".to_string(),
            is_creator: true,
            added_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn escaping() {
        assert_eq!(
            escape("<b>\"a&b\"</b>"),
            "&lt;b&gt;&quot;a&amp;b&quot;&lt;/b&gt;"
        );
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn anonymous_home_prompts_login() {
        let page = main_page(None);
        assert!(page.contains("/login"));
        assert!(page.contains("/register"));
        assert!(!page.contains("Welcome"));
    }

    #[test]
    fn signed_in_home_lists_boards() {
        let summaries = vec![
            BoardSummary {
                board_id: "b1".to_string(),
                name: "Mine".to_string(),
                is_creator: true,
            },
            BoardSummary {
                board_id: "b2".to_string(),
                name: "Theirs".to_string(),
                is_creator: false,
            },
        ];
        let page = main_page(Some((&user(), &summaries)));
        assert!(page.contains("Welcome, Alice"));
        assert!(page.contains("/board/b1"));
        assert!(page.contains("/board/b2"));
    }

    #[test]
    fn duplicate_banner_only_when_flagged() {
        let members = vec![creator_view()];
        let with = board_page(&board(), &[], &members, true, 0, 0, true);
        let without = board_page(&board(), &[], &members, true, 0, 0, false);
        assert!(with.contains("already exists"));
        assert!(!without.contains("already exists"));
    }

    #[test]
    fn unassigned_task_is_labelled() {
        let members = vec![creator_view()];
        let page = board_page(&board(), &[task_view(true, None)], &members, true, 1, 0, false);
        assert!(page.contains("Unassigned"));
    }

    #[test]
    fn assignee_name_shown_when_member() {
        let members = vec![creator_view()];
        let page = board_page(
            &board(),
            &[task_view(false, Some("Alice"))],
            &members,
            true,
            1,
            0,
            false,
        );
        assert!(page.contains("due 2024-01-01 - Alice"));
    }

    #[test]
    fn member_controls_only_for_creator() {
        let members = vec![
            creator_view(),
            MemberView {
                user_id: "u2".to_string(),
                name: "Bob".to_string(),
                email: "b@example.com".to_string(),
                is_creator: false,
                added_at: "2024-03-05T12:30:00Z".to_string(),
            },
        ];
        let as_creator = board_page(&board(), &[], &members, true, 0, 0, false);
        let as_member = board_page(&board(), &[], &members, false, 0, 0, false);
        assert!(as_creator.contains("/remove-user-from-board"));
        assert!(as_creator.contains("/rename-board"));
        assert!(!as_member.contains("/remove-user-from-board"));
        assert!(!as_member.contains("/rename-board"));
    }

    #[test]
    fn member_list_shows_join_date() {
        let page = board_page(&board(), &[], &[creator_view()], false, 0, 0, false);
        assert!(page.contains("joined 2024-01-01"));
        assert!(!page.contains("joined 2024-01-01T"));
    }

    #[test]
    fn markup_is_escaped() {
        let mut b = board();
        b.name = "<script>alert(1)</script>".to_string();
        let page = board_page(&b, &[], &[creator_view()], false, 0, 0, false);
        assert!(!page.contains("<script>alert(1)</script>"));
        assert!(page.contains("&lt;script&gt;"));
    }
}
