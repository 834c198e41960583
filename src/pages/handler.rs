use axum::{
    Extension, Form,
    extract::State,
    http::header,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use crate::auth::{self, Accounts, CurrentUser, Role};
use crate::circulation::{Circulation, Issue};
use crate::handler::{AppState, HandlerParams};
use crate::members::Members;

/// Minimal HTML escaping for values that end up inside markup.
fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn layout(title: &str, user: Option<&CurrentUser>, body: &str) -> Html<String> {
    let nav = match user {
        Some(user) => {
            let admin_links = if user.role == Role::Admin {
                r#"<a href="/books">Books</a> <a href="/members">Members</a> <a href="/loans">Loans</a>"#
            } else {
                r#"<a href="/books">Books</a> <a href="/loans">My loans</a>"#
            };
            format!(
                r#"<nav>{} <span class="spacer"></span> {} <a href="/logout">Sign out</a></nav>"#,
                admin_links,
                escape(&user.username)
            )
        }
        None => String::new(),
    };

    Html(format!(
        r#"<!doctype html>
<html>
<head>
    <meta charset="utf-8">
    <title>{title} - Athenaeum</title>
    <link rel="stylesheet" href="/assets/app.css">
</head>
<body>
    <header><h1><a href="/">Athenaeum</a></h1>{nav}</header>
    <main>{body}</main>
    <script src="/assets/autocomplete.js"></script>
</body>
</html>"#,
        title = escape(title),
        nav = nav,
        body = body,
    ))
}

fn default_params() -> HandlerParams {
    HandlerParams {
        q: None,
        page: 1,
        limit: 50,
        offset: 0,
    }
}

pub async fn login_form() -> Response {
    render_login(None)
}

fn render_login(error: Option<&str>) -> Response {
    let notice = match error {
        Some(msg) => format!(r#"<p class="error">{}</p>"#, escape(msg)),
        None => String::new(),
    };
    let body = format!(
        r#"{notice}
<form method="post" action="/login" class="card">
    <label>Username <input type="text" name="username" required></label>
    <label>Password <input type="password" name="password" required></label>
    <button type="submit">Sign in</button>
</form>"#,
        notice = notice,
    );
    layout("Sign in", None, &body).into_response()
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

pub async fn login_submit(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    let accounts = Accounts::new(state.db.connection());

    let user = match accounts.verify_credentials(&form.username, &form.password).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            tracing::info!(username = %form.username, "rejected login attempt");
            return render_login(Some("Invalid username or password"));
        }
        Err(e) => {
            tracing::error!("login failed: {}", e);
            return render_login(Some("Something went wrong, try again"));
        }
    };

    let session = match accounts
        .create_session(user.id, state.auth.session_ttl_minutes)
        .await
    {
        Ok(session) => session,
        Err(e) => {
            tracing::error!("failed to create session: {}", e);
            return render_login(Some("Something went wrong, try again"));
        }
    };

    tracing::info!(username = %user.username, "user signed in");
    (
        [(
            header::SET_COOKIE,
            auth::session_cookie(&session.token, state.auth.session_ttl_minutes),
        )],
        Redirect::to("/"),
    )
        .into_response()
}

pub async fn logout(State(state): State<AppState>, headers: axum::http::HeaderMap) -> Response {
    if let Some(token) = auth::middleware::session_token(&headers) {
        let accounts = Accounts::new(state.db.connection());
        if let Err(e) = accounts.delete_session(&token).await {
            tracing::error!("failed to delete session: {}", e);
        }
    }

    (
        [(header::SET_COOKIE, auth::clear_session_cookie())],
        Redirect::to("/login"),
    )
        .into_response()
}

pub async fn dashboard(State(state): State<AppState>, Extension(user): Extension<CurrentUser>) -> Response {
    let circulation = Circulation::new(&state.db);
    let members = Members::new(state.db.connection());

    let books = state.db.count_books().await.unwrap_or(0);
    let member_count = members.count().await.unwrap_or(0);
    let open = circulation.count_open().await.unwrap_or(0);
    let overdue = circulation.count_overdue().await.unwrap_or(0);

    let body = format!(
        r#"<section class="stats">
    <div class="stat"><span class="num">{books}</span> titles</div>
    <div class="stat"><span class="num">{member_count}</span> members</div>
    <div class="stat"><span class="num">{open}</span> open loans</div>
    <div class="stat"><span class="num">{overdue}</span> overdue</div>
</section>"#,
    );

    layout("Dashboard", Some(&user), &body).into_response()
}

pub async fn books_page(State(state): State<AppState>, Extension(user): Extension<CurrentUser>) -> Response {
    let books = match state.db.get_books(default_params()).await {
        Ok(books) => books,
        Err(e) => {
            tracing::error!("failed to load books page: {}", e);
            return layout("Books", Some(&user), "<p class=\"error\">Failed to load books.</p>").into_response();
        }
    };

    let mut rows = String::new();
    for book in &books {
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}/{}</td></tr>",
            book.id,
            escape(&book.title),
            escape(&book.authors.join(", ")),
            escape(book.category.as_deref().unwrap_or("-")),
            escape(&book.status),
            book.available_copies,
            book.total_copies,
        ));
    }

    let body = format!(
        r#"<h2>Books</h2>
<input type="search" id="book-search" placeholder="Search title or ISBN"
       data-autocomplete="/api/books/search" data-label="title">
<table>
<thead><tr><th>#</th><th>Title</th><th>Authors</th><th>Category</th><th>Status</th><th>Copies</th></tr></thead>
<tbody>{rows}</tbody>
</table>"#,
    );

    layout("Books", Some(&user), &body).into_response()
}

pub async fn members_page(State(state): State<AppState>, Extension(user): Extension<CurrentUser>) -> Response {
    if user.role != Role::Admin {
        return Redirect::to("/").into_response();
    }

    let members = match Members::new(state.db.connection()).list(default_params()).await {
        Ok(members) => members,
        Err(e) => {
            tracing::error!("failed to load members page: {}", e);
            return layout("Members", Some(&user), "<p class=\"error\">Failed to load members.</p>")
                .into_response();
        }
    };

    let mut rows = String::new();
    for member in &members {
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            member.id,
            escape(&member.name),
            escape(&member.email),
            member.status.as_str(),
            member.open_loans,
        ));
    }

    let body = format!(
        r#"<h2>Members</h2>
<input type="search" id="member-search" placeholder="Search name or email"
       data-autocomplete="/api/members/search" data-label="name">
<table>
<thead><tr><th>#</th><th>Name</th><th>Email</th><th>Status</th><th>Open loans</th></tr></thead>
<tbody>{rows}</tbody>
</table>"#,
    );

    layout("Members", Some(&user), &body).into_response()
}

fn issue_rows(issues: &[Issue]) -> String {
    let mut rows = String::new();
    for issue in issues {
        let returned = issue.return_date.as_deref().unwrap_or("-");
        let fine = issue
            .fine
            .map(|f| format!("{:.2}", f))
            .unwrap_or_else(|| "-".to_string());
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            issue.id,
            escape(&issue.book_title),
            escape(&issue.member_name),
            issue.issue_date,
            issue.due_date,
            returned,
            fine,
        ));
    }
    rows
}

pub async fn loans_page(State(state): State<AppState>, Extension(user): Extension<CurrentUser>) -> Response {
    let circulation = Circulation::new(&state.db);

    // Admins see the whole ledger, members only their own loans.
    let (title, issues) = if user.role == Role::Admin {
        ("Loans", circulation.list_issues(None, None).await)
    } else {
        match user.member_id {
            Some(member_id) => ("My loans", circulation.list_issues(None, Some(member_id)).await),
            None => ("My loans", Ok(vec![])),
        }
    };

    let issues = match issues {
        Ok(issues) => issues,
        Err(e) => {
            tracing::error!("failed to load loans page: {}", e);
            return layout("Loans", Some(&user), "<p class=\"error\">Failed to load loans.</p>").into_response();
        }
    };

    let body = format!(
        r#"<h2>{title}</h2>
<table>
<thead><tr><th>#</th><th>Book</th><th>Member</th><th>Issued</th><th>Due</th><th>Returned</th><th>Fine</th></tr></thead>
<tbody>{rows}</tbody>
</table>"#,
        title = title,
        rows = issue_rows(&issues),
    );

    layout(title, Some(&user), &body).into_response()
}
