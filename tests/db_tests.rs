//! End-to-end flows that need MySQL: refresh-token rotation, board
//! ordering and plan limits under concurrent requests.
//!
//! # Running
//! ```bash
//! DATABASE_URL=mysql://... cargo test --test db_tests
//! ```
//!
//! Note: Tests are skipped if DATABASE_URL is not set. Migrations are
//! applied on connect.

use actix_web::{
    cookie::Cookie,
    dev::ServiceResponse,
    http::StatusCode,
    test::{self, TestRequest},
    web, App,
};
use chrono::{Days, Utc};
use serde_json::{json, Value};
use sqlx::{mysql::MySqlPoolOptions, MySqlPool};
use uuid::Uuid;

use taskflow_backend::{
    config::AppConfig,
    models::reminder::{DueAssignment, ReminderKind, ReminderLog},
    routes,
};

const PASSWORD: &str = "correct horse battery";

fn database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok()
}

macro_rules! skip_without_db {
    () => {
        if database_url().is_none() {
            eprintln!("Skipping test: DATABASE_URL not set");
            return;
        }
    };
}

async fn create_pool() -> MySqlPool {
    let url = database_url().expect("DATABASE_URL must be set");
    let pool = MySqlPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("Failed to connect to database");
    sqlx::migrate!().run(&pool).await.expect("Failed to run migrations");
    pool
}

macro_rules! db_app {
    ($pool:expr) => {{
        let config = AppConfig::from_lookup(|key| match key {
            "DATABASE_URL" => database_url(),
            _ => None,
        })
        .unwrap();
        test::init_service(
            App::new()
                .app_data(web::Data::new($pool.clone()))
                .app_data(web::Data::new(config))
                .configure(routes::configure),
        )
        .await
    }};
}

fn unique(prefix: &str) -> String {
    format!("{}_{}", prefix, &Uuid::new_v4().simple().to_string()[..12])
}

/// Auth cookies held by one signed-in browser.
#[derive(Debug, Clone)]
struct Device {
    session: String,
    refresh: String,
    csrf: String,
}

impl Device {
    fn from_response<B>(resp: &ServiceResponse<B>) -> Device {
        let cookie = |name: &str| {
            resp.response()
                .cookies()
                .find(|c| c.name() == name)
                .map(|c| c.value().to_string())
                .unwrap_or_default()
        };
        Device {
            session: cookie("session_id"),
            refresh: cookie("refresh_token"),
            csrf: cookie("csrf_token"),
        }
    }

    fn signed(&self, req: TestRequest) -> TestRequest {
        req.cookie(Cookie::new("session_id", self.session.clone()))
            .cookie(Cookie::new("csrf_token", self.csrf.clone()))
            .insert_header(("X-CSRF-Token", self.csrf.clone()))
    }

    fn refresh_request(&self) -> TestRequest {
        TestRequest::post()
            .uri("/api/auth/refresh")
            .cookie(Cookie::new("refresh_token", self.refresh.clone()))
            .cookie(Cookie::new("csrf_token", self.csrf.clone()))
            .insert_header(("X-CSRF-Token", self.csrf.clone()))
    }
}

/// Registers a fresh account; yields `(user_id, username)`.
macro_rules! register {
    ($app:expr) => {{
        let name = unique("user");
        let req = TestRequest::post()
            .uri("/api/auth/register")
            .set_json(json!({
                "username": name,
                "email": format!("{}@example.com", name),
                "password": PASSWORD,
            }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&$app, req).await;
        (body["user"]["user_id"].as_i64().unwrap(), name)
    }};
}

macro_rules! login {
    ($app:expr, $name:expr) => {{
        let req = TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({ "login": $name, "password": PASSWORD }))
            .to_request();
        let resp = test::call_service(&$app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        Device::from_response(&resp)
    }};
}

macro_rules! call {
    ($app:expr, $device:expr, $req:expr) => {
        test::call_service(&$app, $device.signed($req).to_request()).await
    };
}

macro_rules! call_json {
    ($app:expr, $device:expr, $req:expr) => {{
        let resp = call!($app, $device, $req);
        assert!(resp.status().is_success(), "unexpected status {}", resp.status());
        let body: Value = test::read_body_json(resp).await;
        body
    }};
}

macro_rules! create_workspace {
    ($app:expr, $device:expr) => {{
        let body = call_json!(
            $app,
            $device,
            TestRequest::post()
                .uri("/api/workspaces")
                .set_json(json!({ "name": "Board" }))
        );
        body["workspace"]["workspace_id"].as_i64().unwrap()
    }};
}

macro_rules! create_category {
    ($app:expr, $device:expr, $workspace_id:expr, $name:expr) => {{
        let body = call_json!(
            $app,
            $device,
            TestRequest::post()
                .uri(&format!("/api/workspaces/{}/categories", $workspace_id))
                .set_json(json!({ "name": $name }))
        );
        body["category"]["category_id"].as_i64().unwrap()
    }};
}

macro_rules! create_task {
    ($app:expr, $device:expr, $workspace_id:expr, $body:expr) => {{
        let body = call_json!(
            $app,
            $device,
            TestRequest::post()
                .uri(&format!("/api/workspaces/{}/tasks", $workspace_id))
                .set_json($body)
        );
        body["task"]["task_id"].as_i64().unwrap()
    }};
}

macro_rules! board {
    ($app:expr, $device:expr, $workspace_id:expr) => {
        call_json!(
            $app,
            $device,
            TestRequest::get().uri(&format!("/api/workspaces/{}/tasks", $workspace_id))
        )
    };
}

/// Task ids of one column in display order; positions must be dense from 0.
fn column(board: &Value, category_id: Option<i64>) -> Vec<i64> {
    let mut rows: Vec<(i64, i64)> = board["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|task| task["category_id"].as_i64() == category_id)
        .map(|task| (task["position"].as_i64().unwrap(), task["task_id"].as_i64().unwrap()))
        .collect();
    rows.sort();
    let positions: Vec<i64> = rows.iter().map(|(position, _)| *position).collect();
    assert_eq!(
        positions,
        (0..rows.len() as i64).collect::<Vec<_>>(),
        "positions of column {:?}",
        category_id
    );
    rows.into_iter().map(|(_, task_id)| task_id).collect()
}

#[actix_web::test]
async fn password_change_keeps_the_caller_signed_in() {
    skip_without_db!();
    let pool = create_pool().await;
    let app = db_app!(pool);
    let (_, name) = register!(app);
    let laptop = login!(app, name);
    let phone = login!(app, name);

    let resp = call!(
        app,
        laptop,
        TestRequest::post().uri("/api/auth/change-password").set_json(json!({
            "current_password": PASSWORD,
            "new_password": "an even better passphrase",
        }))
    );
    assert_eq!(resp.status(), StatusCode::OK);
    let laptop = Device::from_response(&resp);

    // The phone's revoked refresh token is stale, not a replay.
    let resp = test::call_service(&app, phone.refresh_request().to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = call!(app, laptop, TestRequest::get().uri("/api/auth/me"));
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = call!(app, phone, TestRequest::get().uri("/api/auth/me"));
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn stale_refresh_after_logout_leaves_other_devices_alone() {
    skip_without_db!();
    let pool = create_pool().await;
    let app = db_app!(pool);
    let (_, name) = register!(app);
    let laptop = login!(app, name);
    let phone = login!(app, name);

    let resp = call!(
        app,
        laptop,
        TestRequest::post()
            .uri("/api/auth/logout")
            .cookie(Cookie::new("refresh_token", laptop.refresh.clone()))
    );
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = test::call_service(&app, laptop.refresh_request().to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = call!(app, phone, TestRequest::get().uri("/api/auth/me"));
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = test::call_service(&app, phone.refresh_request().to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn replayed_refresh_token_revokes_family_and_sessions() {
    skip_without_db!();
    let pool = create_pool().await;
    let app = db_app!(pool);
    let (_, name) = register!(app);
    let original = login!(app, name);
    let other = login!(app, name);

    let resp = test::call_service(&app, original.refresh_request().to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let rotated = Device::from_response(&resp);
    assert_ne!(rotated.refresh, original.refresh);

    let resp = test::call_service(&app, original.refresh_request().to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // Every session of the user is gone and the rotated successor is revoked.
    for device in [&rotated, &other] {
        let resp = call!(app, device, TestRequest::get().uri("/api/auth/me"));
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
    let resp = test::call_service(&app, rotated.refresh_request().to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn moving_a_task_renumbers_both_columns_and_carries_subtasks() {
    skip_without_db!();
    let pool = create_pool().await;
    let app = db_app!(pool);
    let (_, name) = register!(app);
    let owner = login!(app, name);
    let ws = create_workspace!(app, owner);
    let todo = create_category!(app, owner, ws, "Todo");
    let doing = create_category!(app, owner, ws, "Doing");

    let t1 = create_task!(app, owner, ws, json!({ "title": "one", "category_id": todo }));
    let t2 = create_task!(app, owner, ws, json!({ "title": "two", "category_id": todo }));
    let t3 = create_task!(app, owner, ws, json!({ "title": "three", "category_id": todo }));
    let t4 = create_task!(app, owner, ws, json!({ "title": "four", "category_id": doing }));
    let t5 = create_task!(app, owner, ws, json!({ "title": "five", "category_id": doing }));
    let sub = call_json!(
        app,
        owner,
        TestRequest::post()
            .uri(&format!("/api/workspaces/{}/tasks/{}/subtasks", ws, t2))
            .set_json(json!({ "title": "two, part a" }))
    )["task"]["task_id"]
        .as_i64()
        .unwrap();

    call_json!(
        app,
        owner,
        TestRequest::post()
            .uri(&format!("/api/workspaces/{}/tasks/{}/move", ws, t2))
            .set_json(json!({ "category_id": doing, "index": 1 }))
    );

    let tasks = board!(app, owner, ws);
    assert_eq!(column(&tasks, Some(todo)), vec![t1, t3]);
    assert_eq!(column(&tasks, Some(doing)), vec![t4, t2, t5]);

    let subtask = call_json!(
        app,
        owner,
        TestRequest::get().uri(&format!("/api/workspaces/{}/tasks/{}", ws, sub))
    );
    assert_eq!(subtask["task"]["category_id"], doing);
}

#[actix_web::test]
async fn recategorising_closes_the_gap_in_the_old_column() {
    skip_without_db!();
    let pool = create_pool().await;
    let app = db_app!(pool);
    let (_, name) = register!(app);
    let owner = login!(app, name);
    let ws = create_workspace!(app, owner);
    let todo = create_category!(app, owner, ws, "Todo");
    let done = create_category!(app, owner, ws, "Done");

    let a1 = create_task!(app, owner, ws, json!({ "title": "a1", "category_id": todo }));
    let a2 = create_task!(app, owner, ws, json!({ "title": "a2", "category_id": todo }));
    let a3 = create_task!(app, owner, ws, json!({ "title": "a3", "category_id": todo }));
    let b1 = create_task!(app, owner, ws, json!({ "title": "b1", "category_id": done }));

    call_json!(
        app,
        owner,
        TestRequest::patch()
            .uri(&format!("/api/workspaces/{}/tasks/{}", ws, a1))
            .set_json(json!({ "category_id": done }))
    );

    let tasks = board!(app, owner, ws);
    assert_eq!(column(&tasks, Some(todo)), vec![a2, a3]);
    assert_eq!(column(&tasks, Some(done)), vec![b1, a1]);
}

#[actix_web::test]
async fn deleted_category_tasks_land_below_uncategorised_ones() {
    skip_without_db!();
    let pool = create_pool().await;
    let app = db_app!(pool);
    let (_, name) = register!(app);
    let owner = login!(app, name);
    let ws = create_workspace!(app, owner);
    let doomed = create_category!(app, owner, ws, "Later");

    let u1 = create_task!(app, owner, ws, json!({ "title": "u1" }));
    let u2 = create_task!(app, owner, ws, json!({ "title": "u2" }));
    let c1 = create_task!(app, owner, ws, json!({ "title": "c1", "category_id": doomed }));
    let c2 = create_task!(app, owner, ws, json!({ "title": "c2", "category_id": doomed }));

    call_json!(
        app,
        owner,
        TestRequest::delete().uri(&format!("/api/workspaces/{}/categories/{}", ws, doomed))
    );

    let tasks = board!(app, owner, ws);
    assert_eq!(column(&tasks, None), vec![u1, u2, c1, c2]);
}

#[actix_web::test]
async fn concurrent_invitations_respect_the_seat_limit() {
    skip_without_db!();
    let pool = create_pool().await;
    let app = db_app!(pool);
    let (_, name) = register!(app);
    let owner = login!(app, name);
    let ws = create_workspace!(app, owner);

    let invite = |email: String| {
        owner.signed(
            TestRequest::post()
                .uri(&format!("/api/workspaces/{}/invitations", ws))
                .set_json(json!({ "email": email })),
        )
    };

    // Free plan: 5 seats, the owner plus three pending invitations leave one.
    for _ in 0..3 {
        let email = format!("{}@example.com", unique("guest"));
        let resp = test::call_service(&app, invite(email).to_request()).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    let first = test::call_service(&app, invite(format!("{}@example.com", unique("guest"))).to_request());
    let second = test::call_service(&app, invite(format!("{}@example.com", unique("guest"))).to_request());
    let (first, second) = tokio::join!(first, second);

    let mut statuses = vec![first.status().as_u16(), second.status().as_u16()];
    statuses.sort();
    assert_eq!(statuses, vec![201, 402]);
}

#[actix_web::test]
async fn reminder_scan_skips_assignments_already_reminded() {
    skip_without_db!();
    let pool = create_pool().await;
    let app = db_app!(pool);
    let (user_id, name) = register!(app);
    let owner = login!(app, name);
    let ws = create_workspace!(app, owner);

    let today = Utc::now().date_naive();
    let due = today.checked_sub_days(Days::new(2)).unwrap();
    let task_id = create_task!(
        app,
        owner,
        ws,
        json!({ "title": "late", "due_date": due.format("%Y-%m-%d").to_string() })
    );
    call_json!(
        app,
        owner,
        TestRequest::put().uri(&format!("/api/workspaces/{}/tasks/{}/assignees/{}", ws, task_id, user_id))
    );

    let horizon = today.checked_add_days(Days::new(1)).unwrap();
    let listed = |rows: &[DueAssignment]| rows.iter().any(|row| row.task_id == task_id);

    let before = DueAssignment::list(&pool, today, horizon).await.unwrap();
    assert!(listed(&before));

    assert!(ReminderLog::record(&pool, task_id, user_id, ReminderKind::Overdue, due).await.unwrap());

    let after = DueAssignment::list(&pool, today, horizon).await.unwrap();
    assert!(!listed(&after));
}
