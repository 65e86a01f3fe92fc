use reqwest::StatusCode;
use serde_json::{Value, json};
use worktrack::models::role::Role;

mod common;
use common::{login, spawn_server};

async fn post(client: &reqwest::Client, url: String, body: Value) -> (StatusCode, Value) {
    let res = client.post(url).json(&body).send().await.expect("request");
    let status = res.status();
    let body = res.json().await.unwrap_or(Value::Null);
    (status, body)
}

async fn get(client: &reqwest::Client, url: String) -> (StatusCode, Value) {
    let res = client.get(url).send().await.expect("request");
    let status = res.status();
    let body = res.json().await.unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn health_endpoints_report_ok() {
    let server = spawn_server(false).await;
    let client = reqwest::Client::new();

    let (status, live) = get(&client, server.url("/health/live")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(live["status"], "ok");

    let (status, ready) = get(&client, server.url("/health/ready")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ready["database"], "ok");
    assert_eq!(ready["realtimeConnections"], 0);

    server.stop().await.expect("clean shutdown");
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    let server = spawn_server(false).await;
    let (status, body) = get(&reqwest::Client::new(), server.url("/api/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
    server.stop().await.unwrap();
}

#[tokio::test]
async fn customer_and_project_lifecycle() {
    let server = spawn_server(false).await;
    let client = reqwest::Client::new();

    let (status, body) = post(&client, server.url("/api/customers"), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("name"));

    let (status, customer) = post(
        &client,
        server.url("/api/customers"),
        json!({ "name": "ACME", "email": "ops@acme.test" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let customer_id = customer["id"].as_i64().unwrap();

    let (status, _) = post(
        &client,
        server.url("/api/projects"),
        json!({ "customerId": 9999, "code": "P-1", "name": "Orphan" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, project) = post(
        &client,
        server.url("/api/projects"),
        json!({ "customerId": customer_id, "code": "P-1", "name": "Rollout" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(project["customerId"], customer_id);

    let (status, _) = post(
        &client,
        server.url("/api/projects"),
        json!({ "customerId": customer_id, "code": "P-1", "name": "Again" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, listed) = get(
        &client,
        server.url(&format!("/api/projects?customerId={customer_id}")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, _) = get(&client, server.url("/api/customers/4242")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn bulk_items_are_all_or_nothing() {
    let server = spawn_server(false).await;
    let client = reqwest::Client::new();

    let (_, customer) = post(&client, server.url("/api/customers"), json!({ "name": "C" })).await;
    let (_, project) = post(
        &client,
        server.url("/api/projects"),
        json!({ "customerId": customer["id"], "code": "B", "name": "Bulk" }),
    )
    .await;
    let project_id = project["id"].as_i64().unwrap();

    let (status, body) = post(
        &client,
        server.url("/api/items/bulk"),
        json!({ "items": [
            { "projectId": project_id, "name": "cable" },
            { "projectId": 9999, "name": "ghost" }
        ] }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("items[1]"));

    let (_, items) = get(
        &client,
        server.url(&format!("/api/items?projectId={project_id}")),
    )
    .await;
    assert_eq!(items.as_array().unwrap().len(), 0);

    let (status, created) = post(
        &client,
        server.url("/api/items/bulk"),
        json!({ "items": [
            { "projectId": project_id, "name": "cable", "quantity": 3 },
            { "projectId": project_id, "name": "plug" }
        ] }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created.as_array().unwrap().len(), 2);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn desktop_clock_in_is_idempotent() {
    let server = spawn_server(false).await;
    let client = reqwest::Client::new();
    let user_id = server.add_user("mario", "pw1234", Role::Worker).await;

    let body = json!({ "userId": user_id, "at": "2025-03-01T08:00:00Z", "key": "k-in-1" });
    let (status, first) = post(&client, server.url("/api/desktop/clock-in"), body.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["outcome"], "created");

    let (status, again) = post(&client, server.url("/api/desktop/clock-in"), body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["duplicate"], true);
    assert_eq!(again["record"]["id"], first["record"]["id"]);

    let (_, status_body) = get(
        &client,
        server.url(&format!("/api/desktop/status?userId={user_id}")),
    )
    .await;
    assert_eq!(status_body["shift"]["id"], first["record"]["id"]);

    let (status, closed) = post(
        &client,
        server.url("/api/desktop/clock-out"),
        json!({ "userId": user_id, "at": "2025-03-01T16:30:00Z", "note": "done" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(closed["outcome"], "closed");
    assert_eq!(closed["record"]["durationMinutes"], 510);

    let (_, status_body) = get(
        &client,
        server.url(&format!("/api/desktop/status?userId={user_id}")),
    )
    .await;
    assert!(status_body["shift"].is_null());

    server.stop().await.unwrap();
}

#[tokio::test]
async fn anonymous_desktop_calls_need_a_user() {
    let server = spawn_server(false).await;
    let (status, body) = post(
        &reqwest::Client::new(),
        server.url("/api/desktop/clock-in"),
        json!({ "key": "k" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "userId is required");
    server.stop().await.unwrap();
}

#[tokio::test]
async fn offline_sync_reports_each_action() {
    let server = spawn_server(false).await;
    let client = reqwest::Client::new();
    let user_id = server.add_user("anna", "pw1234", Role::Worker).await;

    let actions = json!({
        "userId": user_id,
        "actions": [
            { "action": "clock-in", "at": "2025-03-02T08:00:00Z", "key": "s1" },
            { "action": "start-activity", "taskId": 777, "at": "2025-03-02T08:05:00Z", "key": "a1" },
            { "action": "clock-out", "at": "2025-03-02T12:00:00Z", "key": "s1" }
        ]
    });
    let (status, body) = post(&client, server.url("/api/desktop/sync"), actions.clone()).await;
    assert_eq!(status, StatusCode::OK);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["outcome"], "created");
    assert_eq!(results[1]["outcome"], "error");
    assert!(results[1]["error"].is_string());
    assert_eq!(results[2]["outcome"], "closed");

    // Replaying the same queue writes nothing new.
    let (_, body) = post(&client, server.url("/api/desktop/sync"), actions).await;
    let results = body["results"].as_array().unwrap();
    assert_eq!(results[0]["outcome"], "duplicate");
    assert_eq!(results[2]["outcome"], "already_closed");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn auth_mode_enforces_tokens_and_roles() {
    let server = spawn_server(true).await;
    let client = reqwest::Client::new();
    let boss = server.add_user("boss", "secret-1", Role::Admin).await;
    let worker = server.add_user("luca", "secret-2", Role::Worker).await;

    let (status, _) = get(&client, server.url("/api/customers")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = post(
        &client,
        server.url("/api/auth/login"),
        json!({ "login": "luca", "password": "wrong" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid credentials");

    let worker_token = login(&server, "luca", "secret-2").await;
    let me: Value = client
        .get(server.url("/api/auth/me"))
        .bearer_auth(&worker_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["id"], worker);
    assert_eq!(me["login"], "luca");

    let res = client
        .post(server.url("/api/customers"))
        .bearer_auth(&worker_token)
        .json(&json!({ "name": "Nope" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .post(server.url("/api/desktop/clock-in"))
        .bearer_auth(&worker_token)
        .json(&json!({ "userId": boss }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .post(server.url("/api/desktop/clock-in"))
        .bearer_auth(&worker_token)
        .json(&json!({ "key": "own" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let admin_token = login(&server, "boss", "secret-1").await;
    let res = client
        .post(server.url("/api/customers"))
        .bearer_auth(&admin_token)
        .json(&json!({ "name": "Allowed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn user_update_rehashes_password_and_guards_self() {
    let server = spawn_server(true).await;
    let client = reqwest::Client::new();
    let boss = server.add_user("boss", "secret-1", Role::Admin).await;
    let worker = server.add_user("luca", "secret-2", Role::Worker).await;
    let admin_token = login(&server, "boss", "secret-1").await;

    let res = client
        .put(server.url(&format!("/api/users/{worker}")))
        .bearer_auth(&admin_token)
        .json(&json!({ "name": "Luca B", "password": "fresh-pass" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["name"], "Luca B");

    let (status, _) = post(
        &client,
        server.url("/api/auth/login"),
        json!({ "login": "luca", "password": "secret-2" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    login(&server, "luca", "fresh-pass").await;

    let res = client
        .put(server.url(&format!("/api/users/{boss}")))
        .bearer_auth(&admin_token)
        .json(&json!({ "role": 3, "password": "another-pass" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    // The rejected update rolled back the new hash too.
    login(&server, "boss", "secret-1").await;

    server.stop().await.unwrap();
}
