use std::sync::{Arc, Mutex};

use axum::{extract::{Multipart, State}, http::header, routing::post, Json, Router};
use base64::{engine::general_purpose::STANDARD, Engine};
use hyper::StatusCode;
use serde_json::json;

use super::serve;
use crate::{
    config::GeneratorConfig,
    errors::GenerationError,
    generation::{
        aspect_ratio_token, image::PLACEHOLDER_PNG, interpret_response, GenerationClient,
        GenerationRequest, GenerationResult, ImageOrigin, SourceImage, MATCH_INPUT_IMAGE,
    },
    prompt::AspectRatio,
};

fn logo() -> SourceImage {
    SourceImage { bytes: vec![1, 2, 3], mime_type: "image/jpeg".into() }
}

fn reference() -> SourceImage {
    SourceImage { bytes: vec![4, 5, 6], mime_type: "image/webp".into() }
}

fn request(reference_image: Option<SourceImage>, logo: Option<SourceImage>) -> GenerationRequest {
    GenerationRequest {
        prompt: "Hire a chef".into(),
        reference_image,
        logo,
        aspect_ratio: Some(AspectRatio::Square),
    }
}

#[test]
fn test_placeholder_when_no_image() {
    let prepared = request(None, None).prepare();

    assert_eq!(prepared.image.origin, ImageOrigin::Placeholder);
    assert_eq!(prepared.image.bytes, PLACEHOLDER_PNG.to_vec());
    assert_eq!(prepared.image.mime_type, "image/png");
    assert_eq!(
        prepared.prompt,
        "Create a professional hiring post image from scratch with the following design: Hire a chef"
    );
}

#[test]
fn test_logo_only_is_transformed() {
    let prepared = request(None, Some(logo())).prepare();

    assert_eq!(prepared.image.origin, ImageOrigin::Logo);
    assert_eq!(prepared.image.bytes, vec![1, 2, 3]);
    assert_eq!(prepared.prompt, "Transform this image into a professional hiring post design. Hire a chef");
}

#[test]
fn test_reference_beats_logo() {
    let prepared = request(Some(reference()), Some(logo())).prepare();

    assert_eq!(prepared.image.origin, ImageOrigin::Reference);
    assert_eq!(prepared.image.mime_type, "image/webp");
    assert!(prepared.prompt.starts_with("Transform this image"));
}

#[test]
fn test_aspect_ratio_tokens() {
    assert_eq!(aspect_ratio_token(Some(AspectRatio::Square)), "1:1");
    assert_eq!(aspect_ratio_token(Some(AspectRatio::Portrait)), "9:16");
    assert_eq!(aspect_ratio_token(Some(AspectRatio::Landscape)), "16:9");
    assert_eq!(aspect_ratio_token(Some(AspectRatio::Standard)), "3:4");
    assert_eq!(aspect_ratio_token(None), MATCH_INPUT_IMAGE);
}

#[test]
fn test_data_urls() {
    let image = SourceImage::from_data_url(&format!("data:image/png;base64,{}", STANDARD.encode(PLACEHOLDER_PNG)))
        .expect("valid data URL");
    assert_eq!(image.mime_type, "image/png");
    assert_eq!(image.bytes, PLACEHOLDER_PNG.to_vec());

    for invalid in ["", "image/png;base64,AAAA", "data:image/png,AAAA", "data:;base64,AAAA", "data:image/png;base64,!!!"] {
        assert!(
            matches!(SourceImage::from_data_url(invalid), Err(GenerationError::Input(_))),
            "{:?} should be rejected",
            invalid
        );
    }
}

#[test]
fn test_json_output_url() {
    let body = br#"{"success":true,"output":["http://x/img.png"]}"#;
    let result = interpret_response(StatusCode::OK, "application/json; charset=utf-8", body);

    assert_eq!(result.expect("success"), GenerationResult::Url("http://x/img.png".into()));
}

#[test]
fn test_json_without_output() {
    for body in [
        r#"{"success":true,"output":[]}"#,
        r#"{"success":false,"output":["http://x/img.png"]}"#,
        r#"{"error":"quota"}"#,
        r#"{"success":true,"output":[42]}"#,
    ] {
        match interpret_response(StatusCode::OK, "application/json", body.as_bytes()) {
            Err(GenerationError::Protocol(message)) => assert!(message.contains("Response: {"), "{}", message),
            other => panic!("{} should fail, got {:?}", body, other),
        }
    }

    let malformed = interpret_response(StatusCode::OK, "application/json", b"{not json");
    assert!(matches!(malformed, Err(GenerationError::Protocol(_))));
}

#[test]
fn test_undersized_image_is_an_error() {
    let body = [b'x'; 50];
    match interpret_response(StatusCode::OK, "image/png", &body) {
        Err(GenerationError::Protocol(message)) => assert!(message.contains("too small: 50 bytes")),
        other => panic!("expected a size validation error, got {:?}", other),
    }
}

#[test]
fn test_binary_image() {
    let body = vec![7u8; 4096];
    let result = interpret_response(StatusCode::OK, "image/jpeg", &body).expect("success");

    assert_eq!(result, GenerationResult::InlineImage { bytes: body.clone(), mime_type: "image/jpeg".into() });
    assert_eq!(result.image_src(), format!("data:image/jpeg;base64,{}", STANDARD.encode(&body)));

    let untyped = interpret_response(StatusCode::OK, "", &body).expect("success");
    assert!(matches!(untyped, GenerationResult::InlineImage { mime_type, .. } if mime_type == "image/png"));
}

#[test]
fn test_error_status() {
    let result = interpret_response(StatusCode::INTERNAL_SERVER_ERROR, "text/plain", b"upstream exploded");
    match result {
        Err(GenerationError::Protocol(message)) => assert_eq!(message, "upstream returned 500: upstream exploded"),
        other => panic!("expected a protocol error, got {:?}", other),
    }
}

#[derive(Default, Debug)]
struct Received {
    image_name: Option<String>,
    image_type: Option<String>,
    image: Vec<u8>,
    prompt: String,
    sub_type: String,
    aspect_ratio: String,
}

async fn record(State(received): State<Arc<Mutex<Vec<Received>>>>, mut form: Multipart) -> Json<serde_json::Value> {
    let mut fields = Received::default();
    while let Some(field) = form.next_field().await.expect("valid multipart") {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                fields.image_name = field.file_name().map(str::to_string);
                fields.image_type = field.content_type().map(str::to_string);
                fields.image = field.bytes().await.expect("image bytes").to_vec();
            },
            "prompt" => fields.prompt = field.text().await.expect("prompt"),
            "sub_type" => fields.sub_type = field.text().await.expect("sub_type"),
            "aspect_ratio" => fields.aspect_ratio = field.text().await.expect("aspect_ratio"),
            _ => continue,
        }
    }

    received.lock().expect("lock").push(fields);
    Json(json!({ "success": true, "output": ["http://cdn.test/post.png"] }))
}

#[tokio::test]
async fn test_client_sends_multipart() {
    let received = Arc::new(Mutex::new(Vec::new()));
    let upstream = serve(Router::new().route("/generate", post(record)).with_state(received.clone())).await;

    let config = GeneratorConfig::new(&format!("http://{}/generate", upstream)).expect("valid endpoint");
    let client = GenerationClient::new(config, reqwest::Client::new());

    let mut portrait = request(None, Some(logo()));
    portrait.aspect_ratio = Some(AspectRatio::Portrait);
    let result = client.generate(&portrait).await.expect("generation succeeds");
    assert_eq!(result, GenerationResult::Url("http://cdn.test/post.png".into()));

    let mut unknown_ratio = request(None, None);
    unknown_ratio.aspect_ratio = None;
    client.generate(&unknown_ratio).await.expect("generation succeeds");

    let received = received.lock().expect("lock");
    assert_eq!(received.len(), 2);

    let first = &received[0];
    assert_eq!(first.image_name.as_deref(), Some("logo.jpg"));
    assert_eq!(first.image_type.as_deref(), Some("image/jpeg"));
    assert_eq!(first.image, vec![1, 2, 3]);
    assert_eq!(first.prompt, "Transform this image into a professional hiring post design. Hire a chef");
    assert_eq!(first.sub_type, "2");
    assert_eq!(first.aspect_ratio, "9:16");

    let second = &received[1];
    assert_eq!(second.image_name.as_deref(), Some("placeholder.png"));
    assert_eq!(second.image, PLACEHOLDER_PNG.to_vec());
    assert!(second.prompt.starts_with("Create a professional hiring post image from scratch"));
    assert_eq!(second.aspect_ratio, "match_input_image");
}

#[tokio::test]
async fn test_client_binary_and_failures() {
    let upstream = serve(
        Router::new()
            .route("/image", post(|| async { ([(header::CONTENT_TYPE, "image/png")], vec![9u8; 2048]) }))
            .route("/tiny", post(|| async { ([(header::CONTENT_TYPE, "image/png")], "rate limited") }))
            .route("/down", post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") })),
    )
    .await;

    let client = |path: &str| {
        let config = GeneratorConfig::new(&format!("http://{}{}", upstream, path)).expect("valid endpoint");
        GenerationClient::new(config, reqwest::Client::new())
    };

    let image = client("/image").generate(&request(None, None)).await.expect("image response");
    assert_eq!(image, GenerationResult::InlineImage { bytes: vec![9u8; 2048], mime_type: "image/png".into() });

    let tiny = client("/tiny").generate(&request(None, None)).await;
    assert!(matches!(tiny, Err(GenerationError::Protocol(message)) if message.contains("rate limited")));

    let down = client("/down").generate(&request(None, None)).await;
    assert!(matches!(down, Err(GenerationError::Protocol(message)) if message.contains("503")));
}

#[tokio::test]
async fn test_client_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("address");
    drop(listener);

    let config = GeneratorConfig::new(&format!("http://{}/generate", addr)).expect("valid endpoint");
    let result = GenerationClient::new(config, reqwest::Client::new())
        .generate(&request(None, None))
        .await;

    assert!(matches!(result, Err(GenerationError::Transport(_))));
}
