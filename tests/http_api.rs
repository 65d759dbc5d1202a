mod common;

use actix_web::http::{StatusCode, header};
use actix_web::{App, test, web};
use common::{ANALYSIS_REPLY, Harness, PASSING_VALIDATION, Reply, png, restored_image, text};
use photo_restoration::{AppState, handlers};
use serde_json::{Value, json};
use std::time::Duration;

const BOUNDARY: &str = "restoration-test-boundary";

enum Part<'a> {
    Image(&'a [u8]),
    Field(&'a str, &'a str),
}

fn multipart(parts: &[Part<'_>]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Image(data) => {
                body.extend_from_slice(
                    b"Content-Disposition: form-data; name=\"image\"; filename=\"photo.png\"\r\n\
                      Content-Type: image/png\r\n\r\n",
                );
                body.extend_from_slice(data);
            }
            Part::Field(name, value) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"\r\n\r\n{}",
                        name, value
                    )
                    .as_bytes(),
                );
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    (format!("multipart/form-data; boundary={}", BOUNDARY), body)
}

fn state(harness: &Harness) -> AppState {
    AppState {
        pipeline: harness.pipeline.clone(),
        max_upload_bytes: 1024 * 1024,
        temp_retention: Duration::from_secs(3600),
    }
}

fn form_post(uri: &str, parts: &[Part<'_>]) -> test::TestRequest {
    let (content_type, body) = multipart(parts);
    test::TestRequest::post()
        .uri(uri)
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
}

#[actix_web::test]
async fn health_reports_model() {
    let harness = Harness::new(vec![]).await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state(&harness)))
            .configure(handlers::routes),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["status"], "OK");
    assert_eq!(body["model"], "scripted-model");
    assert_eq!(body["stages"].as_array().map(Vec::len), Some(3));
}

#[actix_web::test]
async fn three_stages_over_http() {
    let harness = Harness::new(vec![
        text(ANALYSIS_REPLY),
        restored_image(),
        text(PASSING_VALIDATION),
    ])
    .await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state(&harness)))
            .configure(handlers::routes),
    )
    .await;
    let photo = png(4, 4);

    let req = form_post("/api/analyze", &[Part::Image(&photo)]).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let analyzed: Value = test::read_body_json(resp).await;
    assert_eq!(analyzed["success"], true);
    assert_eq!(analyzed["analysis"]["overallCondition"], "FAIR");
    assert_eq!(analyzed["analysis"]["defects"][1]["type"], "TEARS_FOLDS");
    let image_id = analyzed["imageId"].as_str().unwrap().to_string();

    let analysis_data = analyzed["analysis"].to_string();
    let req = form_post(
        "/api/restore",
        &[
            Part::Image(&photo),
            Part::Field("defectsToFix", r#"["TEARS_FOLDS"]"#),
            Part::Field("enhanceColors", "true"),
            Part::Field("analysisData", &analysis_data),
        ],
    )
    .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let restored: Value = test::read_body_json(resp).await;
    assert_eq!(restored["mimeType"], "image/png");
    assert!(
        restored["restoredImage"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,")
    );
    let restored_path = restored["restoredPath"].as_str().unwrap().to_string();
    assert_eq!(harness.stored_files().len(), 2);

    let req = test::TestRequest::post()
        .uri("/api/validate")
        .set_json(json!({
            "originalPath": image_id,
            "restoredPath": restored_path,
            "analysisData": analyzed["analysis"],
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let validated: Value = test::read_body_json(resp).await;
    assert_eq!(validated["validation"]["overallResult"], "PASSED");
    assert_eq!(validated["validation"]["confidenceScore"], 88);
    assert_eq!(
        validated["validation"]["elementComparison"]["peopleCount"]["match"],
        true
    );
    assert_eq!(
        validated["message"],
        "Image validation passed - Restoration is accurate"
    );
    assert!(harness.stored_files().is_empty());

    let instruction = &harness.gateway.requests()[1].instruction;
    assert!(instruction.contains("Repair tears, folds, and creases seamlessly"));
    assert!(!instruction.contains("Remove all scratches"));
}

#[actix_web::test]
async fn analyze_without_image_is_bad_request() {
    let harness = Harness::new(vec![text(ANALYSIS_REPLY)]).await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state(&harness)))
            .configure(handlers::routes),
    )
    .await;

    let req = form_post("/api/analyze", &[Part::Field("note", "hello")]).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert!(harness.gateway.requests().is_empty());
}

#[actix_web::test]
async fn unknown_defect_label_is_rejected_before_model_call() {
    let harness = Harness::new(vec![restored_image()]).await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state(&harness)))
            .configure(handlers::routes),
    )
    .await;
    let photo = png(2, 2);

    let req = form_post(
        "/api/restore",
        &[
            Part::Image(&photo),
            Part::Field("defectsToFix", r#"["MOLD"]"#),
        ],
    )
    .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(harness.gateway.requests().is_empty());
}

#[actix_web::test]
async fn oversized_upload_is_rejected() {
    let harness = Harness::new(vec![text(ANALYSIS_REPLY)]).await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(AppState {
                max_upload_bytes: 16,
                ..state(&harness)
            }))
            .configure(handlers::routes),
    )
    .await;
    let photo = png(16, 16);

    let req = form_post("/api/analyze", &[Part::Image(&photo)]).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(harness.stored_files().is_empty());
}

#[actix_web::test]
async fn model_outage_maps_to_service_unavailable() {
    let harness = Harness::new(vec![Reply::Fail("upstream 500".into())]).await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state(&harness)))
            .configure(handlers::routes),
    )
    .await;
    let photo = png(2, 2);

    let req = form_post("/api/analyze", &[Part::Image(&photo)]).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert!(body["details"].as_str().unwrap().contains("upstream 500"));
}

#[actix_web::test]
async fn validate_checks_its_references() {
    let harness = Harness::new(vec![text(PASSING_VALIDATION)]).await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state(&harness)))
            .configure(handlers::routes),
    )
    .await;

    let cases = [
        (json!({"originalPath": "1-abc.png"}), StatusCode::BAD_REQUEST),
        (
            json!({"originalPath": "../etc/passwd", "restoredPath": "1-abc.png"}),
            StatusCode::BAD_REQUEST,
        ),
        (
            json!({"originalPath": "1-abc.png", "restoredPath": "restored-2-def.png"}),
            StatusCode::NOT_FOUND,
        ),
    ];

    for (body, expected) in cases {
        let req = test::TestRequest::post()
            .uri("/api/validate")
            .set_json(&body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), expected, "body {}", body);
    }
    assert!(harness.gateway.requests().is_empty());
}

#[actix_web::test]
async fn malformed_requests_get_the_error_body() {
    let harness = Harness::new(vec![]).await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state(&harness)))
            .configure(handlers::routes),
    )
    .await;

    let requests = [
        test::TestRequest::post()
            .uri("/api/validate")
            .insert_header((header::CONTENT_TYPE, "application/json"))
            .set_payload("{\"originalPath\": ")
            .to_request(),
        test::TestRequest::post()
            .uri("/api/analyze")
            .insert_header((header::CONTENT_TYPE, "text/plain"))
            .set_payload("not a form")
            .to_request(),
        test::TestRequest::post()
            .uri("/api/restore")
            .insert_header((header::CONTENT_TYPE, "application/json"))
            .set_payload("{}")
            .to_request(),
        test::TestRequest::post()
            .uri("/api/cleanup?maxAgeSeconds=soon")
            .to_request(),
    ];

    for req in requests {
        let path = req.path().to_string();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{}", path);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false, "{}", path);
        assert_eq!(body["error"], "Invalid request", "{}", path);
        assert!(body["details"].as_str().is_some(), "{}", path);
    }
    assert!(harness.gateway.requests().is_empty());
}

#[actix_web::test]
async fn cleanup_sweeps_stale_files() {
    let harness = Harness::new(vec![text(ANALYSIS_REPLY)]).await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state(&harness)))
            .configure(handlers::routes),
    )
    .await;
    let photo = png(2, 2);

    let req = form_post("/api/analyze", &[Part::Image(&photo)]).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::post().uri("/api/cleanup").to_request();
    let kept: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(kept["removed"], 0);
    assert_eq!(harness.stored_files().len(), 1);

    let req = test::TestRequest::post()
        .uri("/api/cleanup?maxAgeSeconds=0")
        .to_request();
    let fresh: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(fresh["removed"], 0);
    assert_eq!(harness.stored_files().len(), 1);

    tokio::time::sleep(Duration::from_millis(300)).await;
    let req = test::TestRequest::post()
        .uri("/api/cleanup?maxAgeSeconds=0")
        .to_request();
    let swept: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(swept["success"], true);
    assert_eq!(swept["removed"], 1);
    assert!(harness.stored_files().is_empty());
}
