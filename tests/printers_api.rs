//! HTTP-level tests for `/api/v1/printers`.

mod common;

use axum::http::{header, Method, StatusCode};
use common::*;
use printwatch::db::{PrintRepository, PrinterCommandRepository};
use printwatch::services::credits::CREDIT_DH_FOR_CONTRIBUTION;
use serde_json::json;

// ---------------------------------------------------------------------------
// Authentication and ownership
// ---------------------------------------------------------------------------

#[tokio::test]
async fn requests_without_token_are_unauthorized() {
    let app = spawn_app().await;
    let response = send(&app, Method::GET, "/api/v1/printers", None, None).await;
    let json = expect_json(response, StatusCode::UNAUTHORIZED).await;
    assert_eq!(json["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn token_for_unknown_user_is_unauthorized() {
    let app = spawn_app().await;
    let token =
        printwatch::routes::auth::create_jwt(&app.state.config.jwt, 999).unwrap();
    let response = get(&app, "/api/v1/printers", &token).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn every_action_on_foreign_printer_is_not_found() {
    let app = spawn_app().await;
    let (owner, _) = create_user(&app, "owner@example.com").await;
    let (_, intruder_token) = create_user(&app, "intruder@example.com").await;
    let printer = create_printer(&app, owner.id, "Prusa").await;
    let id = printer.id;

    let get_paths = [
        format!("/api/v1/printers/{id}"),
        format!("/api/v1/printers/{id}/cancel_print"),
        format!("/api/v1/printers/{id}/pause_print"),
        format!("/api/v1/printers/{id}/resume_print"),
        format!("/api/v1/printers/{id}/mute_current_print?mute_alert=true"),
        format!("/api/v1/printers/{id}/acknowledge_alert?alert_overwrite=FAILED"),
        format!("/api/v1/printers/{id}/status_stream"),
    ];
    for path in &get_paths {
        let response = get(&app, path, &intruder_token).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "GET {path}");
    }

    let response = post_json(
        &app,
        &format!("/api/v1/printers/{id}/send_command"),
        &intruder_token,
        json!({"cmd": "home", "args": {}}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = patch_json(
        &app,
        &format!("/api/v1/printers/{id}"),
        &intruder_token,
        json!({"name": "mine now"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = delete(&app, &format!("/api/v1/printers/{id}"), &intruder_token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// CRUD
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_then_list_and_retrieve() {
    let app = spawn_app().await;
    let (_, token) = create_user(&app, "a@example.com").await;

    let response = post_json(&app, "/api/v1/printers", &token, json!({"name": "Ender 3"})).await;
    let created = expect_json(response, StatusCode::CREATED).await;
    assert_eq!(created["name"], "Ender 3");
    assert_eq!(created["watching_enabled"], true);
    assert_eq!(created["action_on_failure"], "PAUSE");
    assert!(created["current_print"].is_null());
    assert!(!created["auth_token"].as_str().unwrap().is_empty());

    let list = expect_json(get(&app, "/api/v1/printers", &token).await, StatusCode::OK).await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    let id = created["id"].as_i64().unwrap();
    let one = expect_json(
        get(&app, &format!("/api/v1/printers/{id}"), &token).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(one["id"], id);
}

#[tokio::test]
async fn archived_printer_is_hidden_but_still_accepts_commands() {
    let app = spawn_app().await;
    let (user, token) = create_user(&app, "a@example.com").await;
    let printer = create_printer(&app, user.id, "Voron").await;
    let id = printer.id;

    let response = delete(&app, &format!("/api/v1/printers/{id}"), &token).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let list = expect_json(get(&app, "/api/v1/printers", &token).await, StatusCode::OK).await;
    assert!(list.as_array().unwrap().is_empty());
    let response = get(&app, &format!("/api/v1/printers/{id}"), &token).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(&app, &format!("/api/v1/printers/{id}/pause_print"), &token).await;
    let json = expect_json(response, StatusCode::OK).await;
    assert_eq!(json["succeeded"], false);
    assert!(!json["printer"]["archived_at"].is_null());

    // Archiving tells the device to stop watching.
    let pending = PrinterCommandRepository::list_pending(app.pool(), id).await.unwrap();
    let last = pending.last().unwrap();
    assert_eq!(last.cmd, "should_watch");
    assert_eq!(last.args_json, r#"{"should_watch":false}"#);
}

#[tokio::test]
async fn update_applies_allow_listed_fields_and_sends_watch_status() {
    let app = spawn_app().await;
    let (user, token) = create_user(&app, "a@example.com").await;
    let printer = create_printer(&app, user.id, "Old").await;

    let response = patch_json(
        &app,
        &format!("/api/v1/printers/{}", printer.id),
        &token,
        json!({"name": "New", "watching_enabled": false, "detective_sensitivity": 1.5}),
    )
    .await;
    let json = expect_json(response, StatusCode::OK).await;
    assert_eq!(json["succeeded"], true);
    assert_eq!(json["user_credited"], false);
    assert_eq!(json["printer"]["name"], "New");
    assert_eq!(json["printer"]["watching_enabled"], false);
    assert_eq!(json["printer"]["detective_sensitivity"], 1.5);

    let pending = PrinterCommandRepository::list_pending(app.pool(), printer.id)
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].args_json, r#"{"should_watch":false}"#);
}

#[tokio::test]
async fn update_rejects_fields_outside_allow_list() {
    let app = spawn_app().await;
    let (user, token) = create_user(&app, "a@example.com").await;
    let printer = create_printer(&app, user.id, "P").await;

    for body in [
        json!({"user_id": 12}),
        json!({"auth_token": "stolen"}),
        json!({"archived_at": null}),
        json!({"current_print_id": 3}),
    ] {
        let response = put_json(
            &app,
            &format!("/api/v1/printers/{}", printer.id),
            &token,
            body.clone(),
        )
        .await;
        let json = expect_json(response, StatusCode::BAD_REQUEST).await;
        assert_eq!(json["error"]["code"], "BAD_REQUEST", "body {body}");
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[tokio::test]
async fn commands_without_current_print_do_not_succeed() {
    let app = spawn_app().await;
    let (user, token) = create_user(&app, "a@example.com").await;
    let printer = create_printer(&app, user.id, "Idle").await;

    for action in ["cancel_print", "pause_print", "resume_print"] {
        let response = get(
            &app,
            &format!("/api/v1/printers/{}/{action}", printer.id),
            &token,
        )
        .await;
        let json = expect_json(response, StatusCode::OK).await;
        assert_eq!(json["succeeded"], false, "{action}");
        assert_eq!(json["user_credited"], false, "{action}");
    }
}

#[tokio::test]
async fn cancel_acknowledges_pending_alert_as_failed() {
    let app = spawn_app().await;
    let (user, token) = create_user(&app, "a@example.com").await;
    let printer = create_printer(&app, user.id, "P").await;
    let print = create_print(&app, user.id, "benchy.gcode").await;
    start_print_on(&app, &printer, &print).await;
    raise_alert(&app, print.id).await;

    let response = get(
        &app,
        &format!("/api/v1/printers/{}/cancel_print", printer.id),
        &token,
    )
    .await;
    let json = expect_json(response, StatusCode::OK).await;
    assert_eq!(json["succeeded"], true);
    assert_eq!(json["user_credited"], true);

    let print = PrintRepository::find(app.pool(), user.id, print.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(print.alert_overwrite.as_deref(), Some("FAILED"));
    assert!(print.alert_acknowledged_at.is_some());
    assert_eq!(task_count(&app, CREDIT_DH_FOR_CONTRIBUTION).await, 1);

    let pending = PrinterCommandRepository::list_pending(app.pool(), printer.id)
        .await
        .unwrap();
    assert_eq!(pending.last().unwrap().cmd, "cancel");
}

#[tokio::test]
async fn pause_then_resume_toggles_paused_at() {
    let app = spawn_app().await;
    let (user, token) = create_user(&app, "a@example.com").await;
    let printer = create_printer(&app, user.id, "P").await;
    let print = create_print(&app, user.id, "cube.gcode").await;
    start_print_on(&app, &printer, &print).await;

    let json = expect_json(
        get(&app, &format!("/api/v1/printers/{}/pause_print", printer.id), &token).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(json["succeeded"], true);
    assert!(!json["printer"]["current_print"]["paused_at"].is_null());

    let json = expect_json(
        get(&app, &format!("/api/v1/printers/{}/resume_print", printer.id), &token).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(json["succeeded"], true);
    // No alert was raised, so nothing to acknowledge or credit.
    assert_eq!(json["user_credited"], false);
    assert!(json["printer"]["current_print"]["paused_at"].is_null());

    let cmds: Vec<String> = PrinterCommandRepository::list_pending(app.pool(), printer.id)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.cmd)
        .collect();
    assert_eq!(cmds, vec!["pause", "resume"]);
}

#[tokio::test]
async fn mute_only_for_true_in_any_case() {
    let app = spawn_app().await;
    let (user, token) = create_user(&app, "a@example.com").await;
    let printer = create_printer(&app, user.id, "P").await;
    let print = create_print(&app, user.id, "vase.gcode").await;
    start_print_on(&app, &printer, &print).await;

    let cases = [
        ("?mute_alert=TRUE", true),
        ("?mute_alert=false", false),
        ("?mute_alert=True", true),
        ("", false),
        ("?mute_alert=true", true),
        ("?mute_alert=yes", false),
    ];

    for (query, muted) in cases {
        let response = get(
            &app,
            &format!("/api/v1/printers/{}/mute_current_print{query}", printer.id),
            &token,
        )
        .await;
        let json = expect_json(response, StatusCode::OK).await;
        assert_eq!(json["succeeded"], true);
        assert_eq!(json["user_credited"], false);
        assert_eq!(
            !json["printer"]["current_print"]["alert_muted_at"].is_null(),
            muted,
            "query {query:?}"
        );
    }
}

#[tokio::test]
async fn acknowledge_alert_reports_single_bool_twice() {
    let app = spawn_app().await;
    let (user, token) = create_user(&app, "a@example.com").await;
    let printer = create_printer(&app, user.id, "P").await;
    let print = create_print(&app, user.id, "gear.gcode").await;
    start_print_on(&app, &printer, &print).await;
    raise_alert(&app, print.id).await;

    let uri = format!(
        "/api/v1/printers/{}/acknowledge_alert?alert_overwrite=NOT_FAILED",
        printer.id
    );
    let json = expect_json(get(&app, &uri, &token).await, StatusCode::OK).await;
    assert_eq!(json["succeeded"], true);
    assert_eq!(json["user_credited"], true);
    assert_eq!(
        json["printer"]["current_print"]["alert_overwrite"],
        "NOT_FAILED"
    );

    // Already acknowledged.
    let json = expect_json(get(&app, &uri, &token).await, StatusCode::OK).await;
    assert_eq!(json["succeeded"], false);
    assert_eq!(json["user_credited"], false);
    assert_eq!(task_count(&app, CREDIT_DH_FOR_CONTRIBUTION).await, 1);
}

#[tokio::test]
async fn send_command_queues_command_verbatim() {
    let app = spawn_app().await;
    let (user, token) = create_user(&app, "a@example.com").await;
    let printer = create_printer(&app, user.id, "P").await;

    let response = post_json(
        &app,
        &format!("/api/v1/printers/{}/send_command", printer.id),
        &token,
        json!({"cmd": "jog", "args": {"x": 10}}),
    )
    .await;
    let json = expect_json(response, StatusCode::OK).await;
    assert_eq!(json["succeeded"], true);

    let pending = PrinterCommandRepository::list_pending(app.pool(), printer.id)
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].cmd, "jog");
    assert_eq!(pending[0].args_json, r#"{"x":10}"#);
}

#[tokio::test]
async fn send_command_without_cmd_or_args_is_bad_request() {
    let app = spawn_app().await;
    let (user, token) = create_user(&app, "a@example.com").await;
    let printer = create_printer(&app, user.id, "P").await;
    let uri = format!("/api/v1/printers/{}/send_command", printer.id);

    for body in [json!({"cmd": "jog"}), json!({"args": {}}), json!({})] {
        let response = post_json(&app, &uri, &token, body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn status_stream_is_server_sent_events() {
    let app = spawn_app().await;
    let (user, token) = create_user(&app, "a@example.com").await;
    let printer = create_printer(&app, user.id, "P").await;

    let response = get(
        &app,
        &format!("/api/v1/printers/{}/status_stream", printer.id),
        &token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );
}

#[tokio::test]
async fn actions_notify_status_subscribers() {
    let app = spawn_app().await;
    let (user, token) = create_user(&app, "a@example.com").await;
    let printer = create_printer(&app, user.id, "P").await;
    let mut rx = app.state.notifier.subscribe();

    get(
        &app,
        &format!("/api/v1/printers/{}/mute_current_print", printer.id),
        &token,
    )
    .await;

    let event = rx.try_recv().expect("an event should have been broadcast");
    assert_eq!(event.printer_id, printer.id);
}
