//! Tests for HTTP error mapping.

use actix_web::body::to_bytes;
use actix_web::http::StatusCode;
use actix_web::{App, HttpResponse, ResponseError, post, test as actix_test, web};
use rstest::rstest;
use serde::Deserialize;
use serde_json::{Value, json};

use super::*;

const TRACE_ID: &str = "00000000-0000-0000-0000-000000000000";

#[rstest]
#[case(Error::invalid_request("bad"), StatusCode::BAD_REQUEST)]
#[case(Error::unauthorized("no auth"), StatusCode::UNAUTHORIZED)]
#[case(Error::forbidden("denied"), StatusCode::FORBIDDEN)]
#[case(Error::not_found("missing"), StatusCode::NOT_FOUND)]
#[case(Error::conflict("stale"), StatusCode::CONFLICT)]
#[case(Error::service_unavailable("down"), StatusCode::SERVICE_UNAVAILABLE)]
#[case(Error::internal("boom"), StatusCode::INTERNAL_SERVER_ERROR)]
fn status_code_matches_error_code(#[case] error: Error, #[case] status: StatusCode) {
    assert_eq!(ResponseError::status_code(&error), status);
}

async fn body_of(response: HttpResponse) -> Value {
    let bytes = to_bytes(response.into_body())
        .await
        .expect("reading response body succeeds");
    serde_json::from_slice(&bytes).expect("error body is JSON")
}

#[rstest]
#[actix_web::test]
async fn internal_errors_are_redacted_but_keep_trace_id() {
    let error = Error::internal("database password is hunter2")
        .with_trace_id(TRACE_ID)
        .with_details(json!({"secret": "x"}));

    let response = ResponseError::error_response(&error);
    assert_eq!(
        response
            .headers()
            .get(TRACE_ID_HEADER)
            .and_then(|value| value.to_str().ok()),
        Some(TRACE_ID)
    );

    let body = body_of(response).await;
    assert_eq!(
        body,
        json!({
            "code": "internal_error",
            "message": "Internal server error",
            "traceId": TRACE_ID,
        })
    );
}

#[rstest]
#[actix_web::test]
async fn internal_errors_keep_only_their_stable_code() {
    let error = Error::internal("disk full at /srv/media")
        .with_trace_id(TRACE_ID)
        .with_details(json!({"code": "attachment_write_failed", "path": "/srv/media"}));

    let body = body_of(ResponseError::error_response(&error)).await;
    assert_eq!(
        body,
        json!({
            "code": "internal_error",
            "message": "Internal server error",
            "traceId": TRACE_ID,
            "details": {"code": "attachment_write_failed"},
        })
    );
}

#[rstest]
#[actix_web::test]
async fn client_errors_keep_message_and_details() {
    let error = Error::invalid_request("bad")
        .with_trace_id(TRACE_ID)
        .with_details(json!({"field": "student.name"}));

    let body = body_of(ResponseError::error_response(&error)).await;
    assert_eq!(body.get("message"), Some(&json!("bad")));
    assert_eq!(body.pointer("/details/field"), Some(&json!("student.name")));
}

#[rstest]
fn actix_errors_become_internal() {
    let actix = actix_web::error::ErrorBadGateway("upstream");
    assert_eq!(Error::from(actix).code(), ErrorCode::InternalError);
}

#[derive(Deserialize)]
struct Probe {
    #[expect(dead_code, reason = "only deserialisation is exercised")]
    count: u32,
}

#[post("/probe")]
async fn probe(
    _body: web::Json<Probe>,
    _query: web::Query<std::collections::HashMap<String, u32>>,
) -> HttpResponse {
    HttpResponse::Ok().finish()
}

#[rstest]
#[case("/probe", "{not json", "invalid_json")]
#[case("/probe?limit=x", r#"{"count": 1}"#, "invalid_query")]
#[actix_web::test]
async fn extractor_failures_use_error_envelope(
    #[case] uri: &str,
    #[case] body: &'static str,
    #[case] code: &str,
) {
    let app = actix_test::init_service(
        App::new()
            .app_data(json_config())
            .app_data(query_config())
            .service(probe),
    )
    .await;

    let request = actix_test::TestRequest::post()
        .uri(uri)
        .insert_header(("content-type", "application/json"))
        .set_payload(body)
        .to_request();
    let response = actix_test::call_service(&app, request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = actix_test::read_body_json(response).await;
    assert_eq!(body.get("code"), Some(&json!("invalid_request")));
    assert_eq!(body.pointer("/details/code"), Some(&json!(code)));
}
