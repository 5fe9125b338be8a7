mod common;

use profile_qr::domain::qr::decode;
use reqwest::{Client, StatusCode, header};
use serde_json::Value;

#[tokio::test]
async fn test_profile_qr_returns_payload_and_image() {
    let addr = common::spawn_server().await;

    let response = Client::new()
        .get(format!("{addr}/profiles/u1/qr"))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();

    let payload = decode(body["payload"].as_str().unwrap()).unwrap();
    assert_eq!(payload.subject_id, "u1");
    assert_eq!(payload.display_name, "Amina Perera");
    assert_eq!(payload.contact_phone, "0771234567");

    let image = body["image"].as_str().unwrap();
    assert!(image.starts_with("data:image/png;base64,"), "got {image}");
}

#[tokio::test]
async fn test_profile_qr_png_is_a_download() {
    let addr = common::spawn_server().await;

    let response = Client::new()
        .get(format!("{addr}/profiles/u1/qr.png"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment;"), "got {disposition}");

    let bytes = response.bytes().await.unwrap();
    assert_eq!(&bytes[0..8], &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]);
}

#[tokio::test]
async fn test_profile_errors_map_to_status() {
    let addr = common::spawn_server().await;
    let client = Client::new();

    let response = client
        .get(format!("{addr}/profiles/unknown/qr"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "profile_not_found");

    let response = client
        .get(format!("{addr}/profiles/down/qr"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_decode_endpoint() {
    let addr = common::spawn_server().await;
    let client = Client::new();

    let response = client
        .post(format!("{addr}/qr/decode"))
        .body(r#"{"type":"borrower-profile","userId":"u1","name":"A","phone":"123","extra":1}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["userId"], "u1");
    assert_eq!(body["type"], "borrower-profile");

    let response = client
        .post(format!("{addr}/qr/decode"))
        .body(r#"{"type":"lender-profile","userId":"1"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "unrecognized_format");

    let response = client
        .post(format!("{addr}/qr/decode"))
        .body("{not json")
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "malformed_payload");
}

#[tokio::test]
async fn test_dev_routes_follow_flag() {
    let client = Client::new();

    let addr = common::spawn_server().await;
    let response = client
        .get(format!("{addr}/dev/sample-qr"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let addr = common::spawn_server_with(true).await;
    let response = client
        .get(format!("{addr}/dev/sample-qr"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    let payload = decode(body["payload"].as_str().unwrap()).unwrap();
    assert_eq!(payload.subject_id, "sample-borrower");
}

#[tokio::test]
async fn test_scanner_constraints_served() {
    let addr = common::spawn_server().await;

    let response = Client::new()
        .get(format!("{addr}/scanner/constraints"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["facing"], "environment");
    assert_eq!(body["sample_rate"], 10);
    assert_eq!(body["region"]["width"], 250);
    assert_eq!(body["region"]["height"], 250);
}
