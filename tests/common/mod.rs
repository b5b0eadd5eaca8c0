#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;

use danci_study_engine::db::operations::{upsert_resource, upsert_skill};
use danci_study_engine::db::Store;
use danci_study_engine::planning::{LearningResource, MediaType, SkillProfile};
use danci_study_engine::services::plan_suggester::PlanSuggester;
use danci_study_engine::session::ManualClock;
use danci_study_engine::state::AppState;

pub const LEARNER: &str = "learner-1";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub clock: ManualClock,
}

pub async fn create_test_app() -> TestApp {
    let store = Store::in_memory().await.unwrap();
    seed_catalog(&store).await;

    let clock = ManualClock::new();
    let state = AppState::with_clock(
        store,
        PlanSuggester::disabled(),
        "es",
        Arc::new(clock.clone()),
    );
    let router = danci_study_engine::build_router(state.clone());
    TestApp {
        router,
        state,
        clock,
    }
}

pub async fn seed_catalog(store: &Store) {
    let resources = [
        ("news-1", "Morning news", MediaType::Text, 800),
        ("pod-1", "Cafe podcast", MediaType::Audio, 0),
        ("fr-1", "Le journal", MediaType::Text, 500),
    ];
    for (id, title, media_type, word_count) in resources {
        upsert_resource(
            store,
            &LearningResource {
                id: id.to_string(),
                title: title.to_string(),
                media_type,
                language: if id.starts_with("fr") { "fr" } else { "es" }.to_string(),
                word_count,
            },
        )
        .await
        .unwrap();
    }
    upsert_skill(
        store,
        &SkillProfile {
            id: "ordering-food".to_string(),
            title: "Ordering food".to_string(),
            language: "es".to_string(),
        },
    )
    .await
    .unwrap();
}

pub fn get(uri: &str, learner: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(learner) = learner {
        builder = builder.header("X-Learner-Id", learner);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, learner: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(learner) = learner {
        builder = builder.header("X-Learner-Id", learner);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
