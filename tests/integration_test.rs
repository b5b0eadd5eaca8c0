use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;

mod common;

use common::{create_test_app, get, json_body, post_json, LEARNER};

#[tokio::test]
async fn test_health_root() {
    let app = create_test_app().await;

    let response = app.router.oneshot(get("/health", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "connected");
    assert_eq!(body["planSuggester"], false);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = create_test_app().await;

    let response = app
        .router
        .oneshot(get("/api/nothing-here", Some(LEARNER)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_learner_header_is_unauthorized() {
    let app = create_test_app().await;

    for uri in [
        "/api/plan/today",
        "/api/vocabulary/due-count",
        "/api/sessions/current",
    ] {
        let response = app.router.clone().oneshot(get(uri, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "UNAUTHORIZED");
    }
}

#[tokio::test]
async fn test_today_plan_for_thirty_minutes() {
    let app = create_test_app().await;

    let response = app
        .router
        .clone()
        .oneshot(get("/api/plan/today?minutes=30", Some(LEARNER)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    let plan = &body["data"];
    assert_eq!(plan["source"], "Deterministic");

    let activities = plan["activities"].as_array().unwrap();
    assert_eq!(activities.len(), 3);
    assert_eq!(activities[0]["activityType"], "VocabularyReview");
    assert_eq!(activities[0]["vocabWordCount"], 0);
    assert_eq!(activities[1]["activityType"], "Conversation");
    assert_eq!(activities[1]["skillId"], "ordering-food");
    assert_ne!(activities[2]["resourceId"], "fr-1");

    // Stored plans are returned as-is for the rest of the day.
    let again = app
        .router
        .oneshot(get("/api/plan/today?minutes=90", Some(LEARNER)))
        .await
        .unwrap();
    let again = json_body(again).await;
    assert_eq!(again["data"]["activities"], plan["activities"]);
}

#[tokio::test]
async fn test_out_of_range_minutes_are_clamped() {
    let app = create_test_app().await;

    let response = app
        .router
        .oneshot(get("/api/plan/today?minutes=2", Some(LEARNER)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let activities = body["data"]["activities"].as_array().unwrap();
    assert_eq!(activities.len(), 2);
}

#[tokio::test]
async fn test_normalize_candidate_plan() {
    let app = create_test_app().await;

    let candidate = json!({
        "plan": {
            "activities": [
                { "activityType": "VocabularyReview", "estimatedMinutes": 10, "priority": 1 },
                { "activityType": "Reading", "resourceId": "ghost", "estimatedMinutes": 10 },
                {
                    "activityType": "Conversation",
                    "skillId": "ordering-food",
                    "estimatedMinutes": 12,
                    "priority": 2
                }
            ],
            "rationale": "Keep it light"
        },
        "minutes": 20
    });

    let response = app
        .router
        .oneshot(post_json("/api/plan/normalize", Some(LEARNER), candidate))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let plan = &body["data"];
    assert_eq!(plan["source"], "Generated");
    assert_eq!(plan["activities"].as_array().unwrap().len(), 2);
    assert!(plan["rationale"]
        .as_str()
        .unwrap()
        .starts_with("Keep it light"));
}

#[tokio::test]
async fn test_record_attempt_and_read_progress() {
    let app = create_test_app().await;

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/vocabulary/hola/attempts",
            Some(LEARNER),
            json!({ "wasCorrect": true, "inputMode": "Recognition", "responseTimeMs": 1200 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let progress = &body["data"];
    assert_eq!(progress["totalAttempts"], 1);
    assert_eq!(progress["correctAttempts"], 1);
    assert_eq!(progress["currentStreak"], 1);
    assert_eq!(progress["currentPhase"], "Recognition");
    assert_eq!(progress["accuracy"], 1.0);
    assert_eq!(progress["isDueForReview"], false);

    let response = app
        .router
        .clone()
        .oneshot(get("/api/vocabulary/hola/progress", Some(LEARNER)))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["data"]["totalAttempts"], 1);

    // Other learners never see this record.
    let response = app
        .router
        .oneshot(get("/api/vocabulary/hola/progress", Some("learner-2")))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["data"]["totalAttempts"], 0);
}

#[tokio::test]
async fn test_inconsistent_attempt_is_rejected() {
    let app = create_test_app().await;

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/vocabulary/hola/attempts",
            Some(LEARNER),
            json!({ "wasCorrect": true, "inputMode": "Recognition", "exerciseKind": "TextEntry" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let response = app
        .router
        .oneshot(get("/api/vocabulary/hola/progress", Some(LEARNER)))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["data"]["totalAttempts"], 0);
}

#[tokio::test]
async fn test_due_count_counts_overdue_words() {
    let app = create_test_app().await;

    let response = app
        .router
        .clone()
        .oneshot(get("/api/vocabulary/due-count", Some(LEARNER)))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["data"]["dueCount"], 0);

    // An attempt schedules the word a day out, so it is not due yet.
    app.router
        .clone()
        .oneshot(post_json(
            "/api/vocabulary/gato/attempts",
            Some(LEARNER),
            json!({ "wasCorrect": false, "inputMode": "Production" }),
        ))
        .await
        .unwrap();

    let response = app
        .router
        .oneshot(get("/api/vocabulary/due-count", Some(LEARNER)))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["data"]["dueCount"], 0);
}

#[tokio::test]
async fn test_session_lifecycle() {
    let app = create_test_app().await;

    let plan = json_body(
        app.router
            .clone()
            .oneshot(get("/api/plan/today", Some(LEARNER)))
            .await
            .unwrap(),
    )
    .await;
    let activity_id = plan["data"]["activities"][0]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/api/sessions/start",
            Some(LEARNER),
            json!({ "activityId": activity_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["session"]["state"], "Running");
    assert!(body["data"]["stopped"].is_null());

    app.clock.advance_secs(65);
    let response = app
        .router
        .clone()
        .oneshot(post_json("/api/sessions/pause", Some(LEARNER), json!({})))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["data"]["state"], "Paused");
    assert_eq!(body["data"]["flushedMinutes"], 1);

    // Pausing twice conflicts with the current state.
    let response = app
        .router
        .clone()
        .oneshot(post_json("/api/sessions/pause", Some(LEARNER), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .router
        .clone()
        .oneshot(post_json("/api/sessions/resume", Some(LEARNER), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    app.clock.advance_secs(40);
    let response = app
        .router
        .clone()
        .oneshot(post_json("/api/sessions/stop", Some(LEARNER), json!({})))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["data"]["elapsedSeconds"], 105);
    assert_eq!(body["data"]["flushedMinutes"], 1);

    let response = app
        .router
        .clone()
        .oneshot(get("/api/sessions/current", Some(LEARNER)))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["data"]["state"], "Idle");

    let response = app
        .router
        .clone()
        .oneshot(post_json("/api/sessions/stop", Some(LEARNER), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // The flushed minute shows up on the plan.
    let plan = json_body(
        app.router
            .oneshot(get("/api/plan/today", Some(LEARNER)))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(plan["data"]["activities"][0]["minutesSpent"], 1);
}

#[tokio::test]
async fn test_start_unknown_activity_is_not_found() {
    let app = create_test_app().await;

    let response = app
        .router
        .oneshot(post_json(
            "/api/sessions/start",
            Some(LEARNER),
            json!({ "activityId": "1999-01-01-1" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_complete_activity() {
    let app = create_test_app().await;

    let plan = json_body(
        app.router
            .clone()
            .oneshot(get("/api/plan/today", Some(LEARNER)))
            .await
            .unwrap(),
    )
    .await;
    let activity_id = plan["data"]["activities"][1]["id"]
        .as_str()
        .unwrap()
        .to_string();

    app.router
        .clone()
        .oneshot(post_json(
            "/api/sessions/start",
            Some(LEARNER),
            json!({ "activityId": activity_id }),
        ))
        .await
        .unwrap();

    let uri = format!("/api/plan/today/activities/{activity_id}/complete");
    let response = app
        .router
        .clone()
        .oneshot(post_json(&uri, Some(LEARNER), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["isCompleted"], true);

    let response = app
        .router
        .clone()
        .oneshot(get("/api/sessions/current", Some(LEARNER)))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["data"]["state"], "Idle");

    let response = app
        .router
        .oneshot(post_json(
            "/api/plan/today/activities/nope/complete",
            Some(LEARNER),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
