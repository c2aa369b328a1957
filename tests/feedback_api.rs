//! HTTP-level tests for `/api/v1/print_shot_feedbacks`.

mod common;

use axum::http::StatusCode;
use common::*;
use printwatch::db::{PrintShotFeedback, PrintShotFeedbackRepository, TaskQueueRepository};
use printwatch::services::credits::{CreditContribution, CREDIT_DH_FOR_CONTRIBUTION};
use serde_json::json;

async fn add_feedback(app: &TestApp, print_id: i64) -> PrintShotFeedback {
    PrintShotFeedbackRepository::create(app.pool(), print_id, "https://img/shot.jpg")
        .await
        .unwrap()
}

#[tokio::test]
async fn answering_the_only_pending_row_credits() {
    let app = spawn_app().await;
    let (user, token) = create_user(&app, "a@example.com").await;
    let print = create_print(&app, user.id, "benchy.gcode").await;
    let feedback = add_feedback(&app, print.id).await;

    let json = expect_json(
        put_json(
            &app,
            &format!("/api/v1/print_shot_feedbacks/{}", feedback.id),
            &token,
            json!({"answer": "LOOKS_OK"}),
        )
        .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(json["credited_dhs"], 2);
    assert_eq!(json["instance"]["answer"], "LOOKS_OK");
    assert!(!json["instance"]["answered_at"].is_null());

    let tasks = TaskQueueRepository::list_by_name(app.pool(), CREDIT_DH_FOR_CONTRIBUTION)
        .await
        .unwrap();
    assert_eq!(tasks.len(), 1);
    let payload: CreditContribution = serde_json::from_str(&tasks[0].payload_json).unwrap();
    assert_eq!(payload.user_id, user.id);
    assert_eq!(payload.amount, 1);
    assert_eq!(payload.description, "Credit | Focused Feedback - \"benchy.gcode\"");
    assert_eq!(payload.correlation, format!("ff:p:{}", print.id));
}

#[tokio::test]
async fn answering_with_others_pending_does_not_credit() {
    let app = spawn_app().await;
    let (user, token) = create_user(&app, "a@example.com").await;
    let print_a = create_print(&app, user.id, "a.gcode").await;
    let print_b = create_print(&app, user.id, "b.gcode").await;
    let first = add_feedback(&app, print_a.id).await;
    let second = add_feedback(&app, print_b.id).await;

    let json = expect_json(
        patch_json(
            &app,
            &format!("/api/v1/print_shot_feedbacks/{}", first.id),
            &token,
            json!({"answer": "LOOKS_BAD"}),
        )
        .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(json["credited_dhs"], 0);
    assert_eq!(task_count(&app, CREDIT_DH_FOR_CONTRIBUTION).await, 0);

    // The second answer empties the user's queue.
    let json = expect_json(
        patch_json(
            &app,
            &format!("/api/v1/print_shot_feedbacks/{}", second.id),
            &token,
            json!({"answer": "LOOKS_OK"}),
        )
        .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(json["credited_dhs"], 2);
    assert_eq!(task_count(&app, CREDIT_DH_FOR_CONTRIBUTION).await, 1);
}

#[tokio::test]
async fn re_answering_with_nothing_pending_does_not_credit_again() {
    let app = spawn_app().await;
    let (user, token) = create_user(&app, "a@example.com").await;
    let print = create_print(&app, user.id, "a.gcode").await;
    let feedback = add_feedback(&app, print.id).await;
    let uri = format!("/api/v1/print_shot_feedbacks/{}", feedback.id);

    let json = expect_json(
        put_json(&app, &uri, &token, json!({"answer": "LOOKS_OK"})).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(json["credited_dhs"], 2);
    let first_answered_at = json["instance"]["answered_at"].clone();

    let json = expect_json(
        put_json(&app, &uri, &token, json!({"answer": "LOOKS_BAD"})).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(json["credited_dhs"], 0);
    assert_eq!(json["instance"]["answer"], "LOOKS_BAD");
    assert_eq!(json["instance"]["answered_at"], first_answered_at);
    assert_eq!(task_count(&app, CREDIT_DH_FOR_CONTRIBUTION).await, 1);
}

#[tokio::test]
async fn pending_rows_of_other_users_do_not_block_credit() {
    let app = spawn_app().await;
    let (alice, alice_token) = create_user(&app, "alice@example.com").await;
    let (bob, _) = create_user(&app, "bob@example.com").await;
    let alice_print = create_print(&app, alice.id, "a.gcode").await;
    let bob_print = create_print(&app, bob.id, "b.gcode").await;
    let mine = add_feedback(&app, alice_print.id).await;
    add_feedback(&app, bob_print.id).await;

    let json = expect_json(
        put_json(
            &app,
            &format!("/api/v1/print_shot_feedbacks/{}", mine.id),
            &alice_token,
            json!({"answer": "LOOKS_OK"}),
        )
        .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(json["credited_dhs"], 2);
}

#[tokio::test]
async fn foreign_feedback_is_not_found_and_untouched() {
    let app = spawn_app().await;
    let (_, token) = create_user(&app, "a@example.com").await;
    let (bob, _) = create_user(&app, "bob@example.com").await;
    let bob_print = create_print(&app, bob.id, "b.gcode").await;
    let theirs = add_feedback(&app, bob_print.id).await;
    let uri = format!("/api/v1/print_shot_feedbacks/{}", theirs.id);

    assert_eq!(get(&app, &uri, &token).await.status(), StatusCode::NOT_FOUND);
    let response = put_json(&app, &uri, &token, json!({"answer": "LOOKS_OK"})).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let stored = PrintShotFeedbackRepository::find(app.pool(), bob.id, theirs.id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.answered_at.is_none());
    assert_eq!(task_count(&app, CREDIT_DH_FOR_CONTRIBUTION).await, 0);
}

#[tokio::test]
async fn invalid_answer_is_bad_request() {
    let app = spawn_app().await;
    let (user, token) = create_user(&app, "a@example.com").await;
    let print = create_print(&app, user.id, "a.gcode").await;
    let feedback = add_feedback(&app, print.id).await;
    let uri = format!("/api/v1/print_shot_feedbacks/{}", feedback.id);

    for body in [
        json!({"answer": "MAYBE"}),
        json!({}),
        json!({"answer": "LOOKS_OK", "answered_at": null}),
    ] {
        let response = put_json(&app, &uri, &token, body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn list_is_scoped_and_filterable_by_print() {
    let app = spawn_app().await;
    let (alice, token) = create_user(&app, "alice@example.com").await;
    let (bob, _) = create_user(&app, "bob@example.com").await;
    let p1 = create_print(&app, alice.id, "1.gcode").await;
    let p2 = create_print(&app, alice.id, "2.gcode").await;
    let bob_print = create_print(&app, bob.id, "b.gcode").await;
    let f1 = add_feedback(&app, p1.id).await;
    let f2 = add_feedback(&app, p2.id).await;
    add_feedback(&app, bob_print.id).await;

    let json = expect_json(
        get(&app, "/api/v1/print_shot_feedbacks", &token).await,
        StatusCode::OK,
    )
    .await;
    let ids: Vec<i64> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![f1.id, f2.id]);

    let json = expect_json(
        get(
            &app,
            &format!("/api/v1/print_shot_feedbacks?print_id={}", p2.id),
            &token,
        )
        .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["id"], f2.id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_answers_credit_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let app = spawn_app_with_pool(file_pool(&dir).await);
    let (user, token) = create_user(&app, "a@example.com").await;

    for round in 1..=3i64 {
        let print_a = create_print(&app, user.id, "a.gcode").await;
        let print_b = create_print(&app, user.id, "b.gcode").await;
        let first = add_feedback(&app, print_a.id).await;
        let second = add_feedback(&app, print_b.id).await;
        let first_uri = format!("/api/v1/print_shot_feedbacks/{}", first.id);
        let second_uri = format!("/api/v1/print_shot_feedbacks/{}", second.id);

        let (a, b) = tokio::join!(
            put_json(&app, &first_uri, &token, json!({"answer": "LOOKS_OK"})),
            put_json(&app, &second_uri, &token, json!({"answer": "LOOKS_BAD"})),
        );
        let a = expect_json(a, StatusCode::OK).await;
        let b = expect_json(b, StatusCode::OK).await;

        let credited: Vec<i64> = [&a, &b]
            .iter()
            .map(|json| json["credited_dhs"].as_i64().unwrap())
            .collect();
        assert_eq!(credited.iter().filter(|&&dhs| dhs == 2).count(), 1);
        assert_eq!(credited.iter().filter(|&&dhs| dhs == 0).count(), 1);
        assert_eq!(task_count(&app, CREDIT_DH_FOR_CONTRIBUTION).await, round);
    }
}
