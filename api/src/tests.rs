use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use finder::{Answer, AnswerPipeline, Filters, FinderError, FinderRegistry, FinderResponse};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use crate::{AppState, router};

type Call = (String, Option<Filters>, usize, usize);

/// Echoes the question and records every call.
#[derive(Default)]
struct FakePipeline {
    calls: Mutex<Vec<Call>>,
    answers: Vec<Answer>,
}

impl AnswerPipeline for FakePipeline {
    fn get_answers(
        &self,
        question: &str,
        filters: Option<&Filters>,
        top_k_retriever: usize,
        top_k_reader: usize,
    ) -> Result<FinderResponse, FinderError> {
        self.calls.lock().unwrap().push((
            question.to_string(),
            filters.cloned(),
            top_k_retriever,
            top_k_reader,
        ));
        Ok(FinderResponse {
            question: question.to_string(),
            answers: self.answers.clone(),
        })
    }
}

struct FailingPipeline;

impl AnswerPipeline for FailingPipeline {
    fn get_answers(
        &self,
        _: &str,
        _: Option<&Filters>,
        _: usize,
        _: usize,
    ) -> Result<FinderResponse, FinderError> {
        Err(FinderError::Tokenizer("broken vocabulary".into()))
    }
}

fn arya_answer() -> Answer {
    Answer {
        answer: "Eddard Stark".into(),
        score: Some(11.2),
        probability: Some(0.8),
        context: "Arya is the daughter of Eddard Stark.".into(),
        offset_start: 24,
        offset_end: 36,
        document_id: Some("arya".into()),
    }
}

fn app_with(pipelines: Vec<Arc<dyn AnswerPipeline>>) -> axum::Router {
    let registry = FinderRegistry::from_pipelines(pipelines);
    router(Arc::new(AppState::new(registry)))
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn registered_finder_echoes_question() {
    let fake = Arc::new(FakePipeline {
        answers: vec![arya_answer()],
        ..Default::default()
    });
    let app = app_with(vec![fake.clone() as Arc<dyn AnswerPipeline>]);

    let response = app
        .oneshot(post(
            "/finders/1/ask",
            json!({"question": "Who is the father of Arya Stark?"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["question"], "Who is the father of Arya Stark?");
    assert_eq!(body["answers"].as_array().unwrap().len(), 1);
    assert_eq!(body["answers"][0]["answer"], "Eddard Stark");
    assert_eq!(body["answers"][0]["document_id"], "arya");
}

#[tokio::test]
async fn omitted_top_k_uses_defaults() {
    let fake = Arc::new(FakePipeline::default());
    let app = app_with(vec![fake.clone() as Arc<dyn AnswerPipeline>]);

    let response = app
        .oneshot(post("/finders/1/ask", json!({"question": "q"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let calls = fake.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let (question, filters, top_k_retriever, top_k_reader) = &calls[0];
    assert_eq!(question, "q");
    assert!(filters.is_none());
    assert_eq!(*top_k_retriever, 10);
    assert_eq!(*top_k_reader, 5);
}

#[tokio::test]
async fn explicit_arguments_pass_through_unchanged() {
    let fake = Arc::new(FakePipeline::default());
    let app = app_with(vec![fake.clone() as Arc<dyn AnswerPipeline>]);

    let response = app
        .oneshot(post(
            "/finders/1/ask",
            json!({
                "question": "q",
                "filters": {"house": "stark"},
                "top_k_reader": 2,
                "top_k_retriever": 7
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let calls = fake.calls.lock().unwrap();
    let (_, filters, top_k_retriever, top_k_reader) = &calls[0];
    let filters = filters.as_ref().unwrap();
    assert_eq!(filters.get("house").map(String::as_str), Some("stark"));
    assert_eq!(*top_k_retriever, 7);
    assert_eq!(*top_k_reader, 2);
}

#[tokio::test]
async fn unset_answer_fields_are_omitted() {
    let mut answer = arya_answer();
    answer.score = None;
    answer.probability = None;
    answer.document_id = None;
    let fake = Arc::new(FakePipeline {
        answers: vec![answer],
        ..Default::default()
    });
    let app = app_with(vec![fake]);

    let response = app
        .oneshot(post("/finders/1/ask", json!({"question": "q"})))
        .await
        .unwrap();
    let body = json_body(response).await;
    let answer = body["answers"][0].as_object().unwrap();
    assert!(!answer.contains_key("score"));
    assert!(!answer.contains_key("probability"));
    assert!(!answer.contains_key("document_id"));
    assert_eq!(answer["offset_start"], 24);
    assert_eq!(answer["offset_end"], 36);
}

#[tokio::test]
async fn unknown_finder_is_404_with_available_ids() {
    let app = app_with(vec![Arc::new(FakePipeline::default())]);

    for uri in ["/finders/2/ask", "/finders/0/ask"] {
        let response = app
            .clone()
            .oneshot(post(uri, json!({"question": "Who is the father of Arya Stark?"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_body(response).await;
        assert_eq!(body["error"], "FINDER_NOT_FOUND");
        let detail = body["detail"].as_str().unwrap();
        assert!(detail.contains("Available IDs: [1]"), "{detail}");
    }
}

#[tokio::test]
async fn empty_registry_reports_no_ids() {
    let app = app_with(Vec::new());
    let response = app
        .oneshot(post("/finders/1/ask", json!({"question": "q"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert!(body["detail"].as_str().unwrap().ends_with("Available IDs: []"));
}

#[tokio::test]
async fn several_finders_are_listed_in_order() {
    let app = app_with(vec![
        Arc::new(FakePipeline::default()),
        Arc::new(FakePipeline::default()),
    ]);
    let response = app
        .oneshot(post("/finders/3/ask", json!({"question": "q"})))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert!(body["detail"].as_str().unwrap().contains("[1, 2]"));
}

#[tokio::test]
async fn invalid_requests_are_422() {
    let app = app_with(vec![Arc::new(FakePipeline::default())]);

    let cases = [
        post("/finders/1/ask", json!({"top_k_reader": 3})),
        post("/finders/1/ask", json!({"question": "q", "top_k_reader": 0})),
        post("/finders/abc/ask", json!({"question": "q"})),
        post("/finders/-1/ask", json!({"question": "q"})),
    ];
    for req in cases {
        let response = app.clone().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json_body(response).await;
        assert_eq!(body["error"], "UNPROCESSABLE_ENTITY");
    }
}

#[tokio::test]
async fn pipeline_failure_is_500() {
    let app = app_with(vec![Arc::new(FailingPipeline)]);
    let response = app
        .oneshot(post("/finders/1/ask", json!({"question": "q"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["error"], "FINDER_FAILED");
    assert!(body["detail"].as_str().unwrap().contains("broken vocabulary"));
}

#[tokio::test]
async fn only_post_is_routed() {
    let app = app_with(vec![Arc::new(FakePipeline::default())]);
    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/finders/1/ask")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn ids_beyond_u32_are_404_not_422() {
    let app = app_with(vec![Arc::new(FakePipeline::default())]);

    let response = app
        .oneshot(post("/finders/4294967296/ask", json!({"question": "q"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["error"], "FINDER_NOT_FOUND");
    let detail = body["detail"].as_str().unwrap();
    assert_eq!(
        detail,
        "Couldn't get Finder with ID 4294967296. Available IDs: [1]"
    );
}

#[tokio::test]
async fn body_is_parsed_without_json_content_type() {
    let fake = Arc::new(FakePipeline::default());
    let app = app_with(vec![fake.clone() as Arc<dyn AnswerPipeline>]);

    // What `curl --data` sends by default.
    let form = Request::builder()
        .method("POST")
        .uri("/finders/1/ask")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(r#"{"question": "Who is the father of Arya Stark?"}"#))
        .unwrap();
    let response = app.clone().oneshot(form).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bare = Request::builder()
        .method("POST")
        .uri("/finders/1/ask")
        .body(Body::from(r#"{"question": "q"}"#))
        .unwrap();
    let response = app.oneshot(bare).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(fake.calls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn non_json_body_is_422() {
    let app = app_with(vec![Arc::new(FakePipeline::default())]);
    let req = Request::builder()
        .method("POST")
        .uri("/finders/1/ask")
        .body(Body::from("question=q"))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
