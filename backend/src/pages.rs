//! Server-rendered pages for phones: login, registration, the agent's mission
//! sheet and the admin board. Every piece of player-supplied text goes through
//! [`html_escape`] before it reaches the markup.

use axum::extract::{Form, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::Router;
use missions_core::{AgentView, GameError, Identity, MissionStatus, RoundView};
use serde::Deserialize;
use tracing::warn;

use crate::{AppError, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/login", post(login))
        .route("/register", get(register_page).post(register_submit))
        .route("/agent", get(agent_page))
        .route("/toggle", post(toggle))
        .route("/admin", get(admin_page))
        .route("/start", post(start))
        .route("/end", post(end))
}

#[derive(Deserialize, Default)]
struct ErrorQuery {
    #[serde(default)]
    error: String,
}

#[derive(Deserialize)]
struct LoginForm {
    #[serde(default)]
    agent: String,
}

#[derive(Deserialize)]
struct RegisterForm {
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct AgentQuery {
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct ToggleForm {
    #[serde(default)]
    agent: String,
    #[serde(default)]
    idx: String,
}

#[derive(Deserialize)]
struct AdminQuery {
    #[serde(default)]
    agent: String,
    #[serde(default)]
    error: String,
}

fn error_code(err: &AppError) -> &'static str {
    match err {
        AppError::Game(GameError::NoActiveRound) => "no-round",
        AppError::Game(GameError::UnknownAgent) => "unknown-agent",
        AppError::Game(GameError::RoundAlreadyActive) => "round-active",
        AppError::Unauthorized => "unauthorized",
        _ => "failed",
    }
}

fn error_text(code: &str) -> Option<&'static str> {
    match code {
        "no-round" => Some("No round in progress."),
        "unknown-agent" => Some("Invalid agent name."),
        "round-active" => Some("A round is already running."),
        "unauthorized" => Some("Admin access only."),
        "failed" => Some("Something went wrong, try again."),
        _ => None,
    }
}

fn home_with_error(err: &AppError) -> Redirect {
    Redirect::to(&format!("/?error={}", error_code(err)))
}

fn admin_url(state: &AppState) -> String {
    format!("/admin?agent={}", urlencoding::encode(&state.settings().admin_agent))
}

async fn home(Query(q): Query<ErrorQuery>) -> Html<String> {
    let error = error_text(&q.error)
        .map(|msg| format!(r#"<div class="error">{msg}</div>"#))
        .unwrap_or_default();
    layout(&format!(
        r#"<div class="wrap">
  <h1>Side Missions</h1>
  {error}
  <form class="card" method="post" action="/login">
    <input name="agent" placeholder="Secret agent name" aria-label="Secret agent name" autocomplete="off">
    <button class="primary">Enter</button>
  </form>
  <a class="link" href="/register">Register</a>
</div>"#
    ))
}

async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    match state.login(&form.agent).await {
        Ok(Identity::Admin) => Redirect::to(&admin_url(&state)).into_response(),
        Ok(Identity::Agent { agent }) => {
            Redirect::to(&format!("/agent?name={}", urlencoding::encode(&agent))).into_response()
        }
        Err(err) => home_with_error(&err).into_response(),
    }
}

fn register_form(error: Option<&str>) -> Html<String> {
    let error = error
        .map(|msg| format!(r#"<div class="error">{}</div>"#, html_escape(msg)))
        .unwrap_or_default();
    layout(&format!(
        r#"<div class="wrap">
  <h2>Register</h2>
  {error}
  <form class="card" method="post" action="/register">
    <input name="name" placeholder="Your real name" aria-label="Your real name" maxlength="40">
    <button class="primary">OK</button>
  </form>
  <a class="link" href="/">Back</a>
</div>"#
    ))
}

async fn register_page(State(state): State<AppState>) -> Response {
    let active = state.store().read(|round| round.active).await;
    if !active {
        return home_with_error(&AppError::Game(GameError::NoActiveRound)).into_response();
    }
    register_form(None).into_response()
}

async fn register_submit(State(state): State<AppState>, Form(form): Form<RegisterForm>) -> Response {
    match state.register(&form.name).await {
        Ok(agent) => layout(&format!(
            r#"<div class="wrap">
  <h2>Your secret agent is</h2>
  <div class="agent">{}</div>
  <p class="hint">Remember it: it is your login.</p>
  <a class="link" href="/">Back</a>
</div>"#,
            html_escape(&agent)
        ))
        .into_response(),
        Err(err) => (err.status(), register_form(Some(&err.to_string()))).into_response(),
    }
}

fn status_badge(status: MissionStatus) -> &'static str {
    match status {
        MissionStatus::Completed => "done",
        MissionStatus::Pending => "pending",
        MissionStatus::Failed => "failed",
    }
}

fn mission_cards(sheet: &AgentView, clickable: bool) -> String {
    let mut cards = String::new();
    for (i, m) in sheet.missions.iter().enumerate() {
        let action = if clickable {
            format!(r#" onclick="toggle({i})" role="button" tabindex="0""#)
        } else {
            String::new()
        };
        cards.push_str(&format!(
            r#"<div class="mission-card {status}"{action}><div class="mission-text">{text}</div><div class="badge {status}">{badge}</div></div>
"#,
            status = m.status.as_str(),
            text = html_escape(&m.text),
            badge = status_badge(m.status),
        ));
    }
    cards
}

async fn agent_page(State(state): State<AppState>, Query(q): Query<AgentQuery>) -> Response {
    let sheet = match state.sheet(&q.name).await {
        Ok(sheet) => sheet,
        Err(_) => return Redirect::to("/").into_response(),
    };

    layout(&format!(
        r#"<div class="wrap" id="sheet" data-agent="{agent}">
  <h2>Agent {agent}</h2>
  <div class="progress">Progress: {done}/{total} completed</div>
  {cards}
  <a class="link" href="/">Log out</a>
</div>
<script>
  function toggle(i) {{
    const agent = document.getElementById("sheet").dataset.agent;
    fetch("/toggle", {{
      method: "POST",
      headers: {{ "Content-Type": "application/x-www-form-urlencoded" }},
      body: "agent=" + encodeURIComponent(agent) + "&idx=" + i
    }}).then(() => location.reload());
  }}
</script>"#,
        agent = html_escape(&sheet.agent),
        done = sheet.completed,
        total = sheet.missions.len(),
        cards = mission_cards(&sheet, true),
    ))
    .into_response()
}

async fn toggle(State(state): State<AppState>, Form(form): Form<ToggleForm>) -> Response {
    let Ok(index) = form.idx.trim().parse::<usize>() else {
        return (StatusCode::BAD_REQUEST, "bad mission index").into_response();
    };
    match state.toggle(&form.agent, index).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

fn admin_board(state: &AppState, view: &RoundView, error: Option<&str>) -> Html<String> {
    let admin = html_escape(&state.settings().admin_agent);
    let error = error
        .map(|msg| format!(r#"<div class="error">{msg}</div>"#))
        .unwrap_or_default();

    if !view.active {
        return layout(&format!(
            r#"<div class="wrap">
  <h2>Admin</h2>
  {error}
  <p class="hint">No round in progress.</p>
  <form method="post" action="/start">
    <input type="hidden" name="agent" value="{admin}">
    <button class="primary">Start round</button>
  </form>
  <a class="link" href="/">Home</a>
</div>"#
        ));
    }

    let mut players = String::new();
    for agent in &view.agents {
        players.push_str(&format!(
            r#"<details class="player">
  <summary><span class="player-name">{player}</span> <span class="player-agent">{codename} &middot; {done}/{total}</span></summary>
  {cards}
</details>
"#,
            player = html_escape(agent.player.as_deref().unwrap_or("")),
            codename = html_escape(&agent.agent),
            done = agent.completed,
            total = agent.missions.len(),
            cards = mission_cards(agent, false),
        ));
    }
    if players.is_empty() {
        players = r#"<p class="hint">No players registered yet.</p>"#.to_string();
    }

    layout(&format!(
        r#"<div class="wrap">
  <h2>Admin</h2>
  {error}
  <p class="hint">{claimed} registered, {free} agents free.</p>
  <div class="list">{players}</div>
  <form method="post" action="/end">
    <input type="hidden" name="agent" value="{admin}">
    <button class="danger">End round</button>
  </form>
  <a class="link" href="/">Home</a>
</div>"#,
        claimed = view.agents.len(),
        free = view.free_agents,
    ))
}

async fn admin_page(State(state): State<AppState>, Query(q): Query<AdminQuery>) -> Response {
    if !state.is_admin(&q.agent) {
        warn!("rejected admin page request");
        return home_with_error(&AppError::Unauthorized).into_response();
    }
    let view = state.view().await;
    admin_board(&state, &view, error_text(&q.error)).into_response()
}

async fn start(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    if !state.is_admin(&form.agent) {
        warn!("rejected round start from page");
        return home_with_error(&AppError::Unauthorized).into_response();
    }
    match state.start(None).await {
        Ok(_) => Redirect::to(&admin_url(&state)).into_response(),
        Err(err) => {
            Redirect::to(&format!("{}&error={}", admin_url(&state), error_code(&err)))
                .into_response()
        }
    }
}

async fn end(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    if !state.is_admin(&form.agent) {
        warn!("rejected round end from page");
        return home_with_error(&AppError::Unauthorized).into_response();
    }
    match state.end().await {
        Ok(()) => Redirect::to("/").into_response(),
        Err(err) => home_with_error(&err).into_response(),
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

const STYLE: &str = r#"
  :root { --bg: linear-gradient(180deg, #87ceeb 0%, #bfefff 100%); --text: #0b2b40; --card: #ffffffee;
          --primary: #5865f2; --success: #2ecc71; --danger: #e74c3c; --pending: #ffd166;
          --shadow: 0 10px 25px rgba(0,0,0,.15); }
  * { box-sizing: border-box; }
  body { margin: 0; background: var(--bg); color: var(--text); font-family: system-ui, sans-serif; min-height: 100vh; }
  .wrap { max-width: 680px; margin: 0 auto; padding: 24px; }
  .card, .mission-card, .player, .agent { background: var(--card); border-radius: 16px; box-shadow: var(--shadow); }
  .card { padding: 16px; margin: 12px 0; }
  input { width: 100%; padding: 14px 16px; border-radius: 14px; border: 2px solid #ffffffaa; font-size: 18px; margin: 6px 0 12px; }
  button { width: 100%; padding: 14px 18px; border-radius: 14px; border: none; font-size: 18px; font-weight: 700; cursor: pointer; }
  button.primary { background: var(--primary); color: #fff; }
  button.danger { background: var(--danger); color: #fff; margin-top: 16px; }
  .link { display: inline-block; margin-top: 12px; color: var(--text); font-weight: 600; }
  .agent { display: inline-block; font-size: 34px; font-weight: 800; padding: 14px 18px; }
  .mission-card { display: grid; grid-template-columns: 1fr auto; gap: 8px; align-items: center; padding: 18px; margin: 10px 0; }
  .badge { padding: 6px 10px; border-radius: 999px; font-size: 14px; }
  .badge.completed { background: var(--success); color: #fff; }
  .badge.failed { background: var(--danger); color: #fff; }
  .badge.pending { background: var(--pending); }
  .mission-card.completed { border-left: 6px solid var(--success); }
  .mission-card.failed { border-left: 6px solid var(--danger); }
  .mission-card.pending { border-left: 6px solid var(--pending); }
  .progress { background: #ffffffaa; border-radius: 12px; padding: 10px 12px; margin: 8px 0 14px; font-weight: 700; }
  .player { padding: 12px 14px; margin: 10px 0; }
  .player-name { font-weight: 700; }
  .error { background: #fff4f4; color: #b00020; border: 2px solid #ffd6d6; border-radius: 12px; padding: 10px 12px; margin-bottom: 12px; font-weight: 700; }
  .hint { opacity: .8; }
"#;

fn layout(body: &str) -> Html<String> {
    Html(format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1, maximum-scale=1">
<title>Side Missions</title>
<style>{STYLE}</style>
</head>
<body>
{body}
</body>
</html>"#
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{app, GameSettings};
    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use http_body_util::BodyExt;
    use missions_core::Catalog;
    use tower::ServiceExt;

    fn test_app() -> (Router, AppState) {
        let state = AppState::new(GameSettings {
            catalog: Catalog::new(["north", "south"], ["say okay"]).unwrap(),
            ..GameSettings::default()
        });
        (app(state.clone()), state)
    }

    fn form_post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    fn location(res: &Response) -> &str {
        res.headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }

    async fn text(res: Response) -> String {
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(
            html_escape(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[tokio::test]
    async fn home_shows_known_errors_only() {
        let (app, _) = test_app();
        let res = app.clone().oneshot(get_req("/?error=no-round")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(text(res).await.contains("No round in progress."));

        let res = app
            .clone()
            .oneshot(get_req("/?error=%3Cscript%3E"))
            .await
            .unwrap();
        let body = text(res).await;
        assert!(!body.contains("<script>"));
        assert!(!body.contains(r#"class="error""#));
    }

    #[tokio::test]
    async fn login_redirects_by_identity() {
        let (app, _) = test_app();

        let res = app
            .clone()
            .oneshot(form_post("/login", "agent=north"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&res), "/?error=no-round");

        let res = app
            .clone()
            .oneshot(form_post("/login", "agent=+ITADMIN+"))
            .await
            .unwrap();
        assert_eq!(location(&res), "/admin?agent=itadmin");

        let res = app
            .clone()
            .oneshot(form_post("/start", "agent=itadmin"))
            .await
            .unwrap();
        assert_eq!(location(&res), "/admin?agent=itadmin");

        let res = app
            .clone()
            .oneshot(form_post("/login", "agent=NORTH"))
            .await
            .unwrap();
        assert_eq!(location(&res), "/agent?name=north");

        let res = app
            .clone()
            .oneshot(form_post("/login", "agent=east"))
            .await
            .unwrap();
        assert_eq!(location(&res), "/?error=unknown-agent");
    }

    #[tokio::test]
    async fn register_page_needs_a_round_and_reports_capacity() {
        let (app, state) = test_app();

        let res = app.clone().oneshot(get_req("/register")).await.unwrap();
        assert_eq!(location(&res), "/?error=no-round");

        state.start(Some(3)).await.unwrap();
        let res = app.clone().oneshot(get_req("/register")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let res = app
            .clone()
            .oneshot(form_post("/register", "name=Ana"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = text(res).await;
        let agent = state.store().read(|round| round.players["Ana"].clone()).await;
        assert!(body.contains(&format!(r#"<div class="agent">{agent}</div>"#)));

        let res = app
            .clone()
            .oneshot(form_post("/register", "name="))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(text(res).await.contains("name required"));

        state.register("Ben").await.unwrap();
        let res = app
            .clone()
            .oneshot(form_post("/register", "name=Cleo"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CONFLICT);
        assert!(text(res).await.contains("all agents are taken"));
    }

    #[tokio::test]
    async fn agent_page_and_toggle() {
        let (app, state) = test_app();

        let res = app.clone().oneshot(get_req("/agent?name=north")).await.unwrap();
        assert_eq!(location(&res), "/");

        state.start(None).await.unwrap();
        let res = app.clone().oneshot(get_req("/agent?name=north")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = text(res).await;
        assert!(body.contains("Agent north"));
        assert!(body.contains("Progress: 0/5 completed"));

        let res = app
            .clone()
            .oneshot(form_post("/toggle", "agent=north&idx=0"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        let sheet = state.sheet("north").await.unwrap();
        assert_eq!(sheet.missions[0].status, MissionStatus::Completed);

        let res = app
            .clone()
            .oneshot(form_post("/toggle", "agent=north&idx=abc"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = app
            .clone()
            .oneshot(form_post("/toggle", "agent=north&idx=9"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn admin_board_escapes_player_names_and_ends_round() {
        let (app, state) = test_app();

        let res = app.clone().oneshot(get_req("/admin?agent=north")).await.unwrap();
        assert_eq!(location(&res), "/?error=unauthorized");

        let res = app.clone().oneshot(get_req("/admin?agent=itadmin")).await.unwrap();
        assert!(text(res).await.contains("Start round"));

        state.start(None).await.unwrap();
        state.register("<b>Ana</b>").await.unwrap();

        let res = app.clone().oneshot(get_req("/admin?agent=ItAdmin")).await.unwrap();
        let body = text(res).await;
        assert!(body.contains("&lt;b&gt;Ana&lt;/b&gt;"));
        assert!(body.contains("1 registered, 1 agents free."));

        let res = app
            .clone()
            .oneshot(form_post("/start", "agent=itadmin"))
            .await
            .unwrap();
        assert_eq!(location(&res), "/admin?agent=itadmin&error=round-active");

        let res = app
            .clone()
            .oneshot(form_post("/end", "agent=south"))
            .await
            .unwrap();
        assert_eq!(location(&res), "/?error=unauthorized");
        assert!(state.store().snapshot().await.active);

        let res = app
            .clone()
            .oneshot(form_post("/end", "agent=itadmin"))
            .await
            .unwrap();
        assert_eq!(location(&res), "/");
        assert!(state.store().snapshot().await.is_idle());
    }
}
