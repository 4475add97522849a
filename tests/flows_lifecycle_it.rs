#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use oauth2_pkce_client::{
	_preludet::*,
	auth::TokenSet,
	error::PreconditionError,
	flows::{ReqwestPkceClient, TokenSlots},
};

const REFRESH_PATH: &str = "/api/v1/auth/refresh";
const REVOKE_PATH: &str = "/api/v1/auth/revoke";

fn client_for(server: &MockServer) -> ReqwestPkceClient {
	build_reqwest_test_client(test_descriptor(&server.base_url()), test_settings()).0
}

fn tokens(access: &str, refresh: Option<&str>) -> TokenSet {
	let mut builder = TokenSet::builder().access_token(access).id_token("idt1");

	if let Some(refresh) = refresh {
		builder = builder.refresh_token(refresh);
	}

	builder.build().expect("Token set fixture should build.")
}

fn exposed(tokens: Option<&TokenSet>) -> Option<(String, Option<String>)> {
	tokens.map(|tokens| {
		(
			tokens.access_token.expose().to_owned(),
			tokens.refresh_token.as_ref().map(|token| token.expose().to_owned()),
		)
	})
}

#[tokio::test]
async fn refresh_rotates_current_into_previous() {
	let server = MockServer::start_async().await;
	let client = client_for(&server);

	client.lifecycle().install(tokens("at1", Some("rt1")));

	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(REFRESH_PATH)
				.header("authorization", "Bearer at1")
				.header("content-type", "application/json")
				.json_body(json!({ "refreshToken": "rt1" }));
			then.status(200).json_body(json!({
				"code": 0,
				"data": { "accessToken": "at2", "refreshToken": "rt2" },
				"message": "ok"
			}));
		})
		.await;
	let rotated = client.refresh(None).await.expect("Refresh should succeed.");

	mock.assert_async().await;

	let TokenSlots { current, previous } = client.lifecycle().snapshot();

	assert_eq!(current.as_ref(), Some(&rotated));
	assert_eq!(exposed(current.as_ref()), Some(("at2".into(), Some("rt2".into()))));
	assert_eq!(exposed(previous.as_ref()), Some(("at1".into(), Some("rt1".into()))));
	assert_eq!(
		rotated.id_token.as_ref().map(|token| token.expose()),
		Some("idt1"),
		"Refresh keeps the ID token of the rotated set."
	);

	let metrics = client.lifecycle().metrics();

	assert_eq!(metrics.refresh_attempts(), 1);
	assert_eq!(metrics.refresh_successes(), 1);
	assert_eq!(metrics.refresh_failures(), 0);
}

#[tokio::test]
async fn refresh_without_new_refresh_token_keeps_presented_one() {
	let server = MockServer::start_async().await;
	let client = client_for(&server);

	client.lifecycle().install(tokens("at1", Some("rt1")));

	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(REFRESH_PATH);
			then.status(200).json_body(json!({ "code": 0, "data": { "accessToken": "at2" } }));
		})
		.await;
	let rotated = client.refresh(None).await.expect("Refresh should succeed.");

	mock.assert_async().await;

	assert_eq!(exposed(Some(&rotated)), Some(("at2".into(), Some("rt1".into()))));
}

#[tokio::test]
async fn rejected_refresh_leaves_state_untouched() {
	let server = MockServer::start_async().await;
	let client = client_for(&server);
	let original = tokens("at1", Some("rt1"));

	client.lifecycle().install(original.clone());

	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(REFRESH_PATH);
			then.status(200).json_body(json!({ "code": 1, "message": "refresh token expired" }));
		})
		.await;
	let err = client.refresh(None).await.expect_err("Non-zero envelope code must fail.");

	mock.assert_async().await;

	assert!(matches!(err, Error::Rejected { code: 1, .. }));
	assert_eq!(err.to_string(), "Server rejected the request with code 1: refresh token expired.");
	assert_eq!(client.lifecycle().snapshot(), TokenSlots { current: Some(original), previous: None });
	assert_eq!(client.lifecycle().metrics().refresh_failures(), 1);
}

#[tokio::test]
async fn refresh_http_failure_is_reported_with_status() {
	let server = MockServer::start_async().await;
	let client = client_for(&server);

	client.lifecycle().install(tokens("at1", Some("rt1")));

	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(REFRESH_PATH);
			then.status(500).header("retry-after", "5").body("upstream exploded");
		})
		.await;
	let err = client.refresh(None).await.expect_err("500 responses must fail the refresh.");

	mock.assert_async().await;

	match &err {
		Error::Http(http) => {
			assert_eq!(http.status, 500);
			assert_eq!(http.status_text, "Internal Server Error");
			assert_eq!(http.retry_after, Some(Duration::seconds(5)));
		},
		other => panic!("Expected an HTTP status error, got {other:?}."),
	}

	assert_eq!(err.to_string(), "Token refresh failed (500): upstream exploded");
	assert_eq!(
		exposed(client.lifecycle().current().as_ref()),
		Some(("at1".into(), Some("rt1".into())))
	);
}

#[tokio::test]
async fn refresh_without_any_token_skips_network() {
	let server = MockServer::start_async().await;
	let client = client_for(&server);

	client.lifecycle().install(tokens("at1", None));

	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(REFRESH_PATH);
			then.status(200);
		})
		.await;
	let err = client.refresh(None).await.expect_err("Refresh without a token must fail.");

	mock.assert_calls_async(0).await;

	assert!(matches!(err, Error::Precondition(PreconditionError::MissingRefreshToken)));
	assert_eq!(err.to_string(), "No refresh token available.");
}

#[tokio::test]
async fn fallback_refresh_token_builds_fresh_set() {
	let server = MockServer::start_async().await;
	let client = client_for(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(REFRESH_PATH).json_body(json!({ "refreshToken": "rt-saved" }));
			then.status(200).json_body(json!({
				"code": 0,
				"data": { "accessToken": "at2", "refreshToken": "rt2" }
			}));
		})
		.await;
	let rotated = client.refresh(Some("rt-saved")).await.expect("Fallback refresh should succeed.");

	mock.assert_async().await;

	assert!(rotated.id_token.is_none());
	assert_eq!(exposed(client.lifecycle().current().as_ref()), Some(("at2".into(), Some("rt2".into()))));
	assert!(client.lifecycle().previous().is_none());
}

#[tokio::test]
async fn revoke_posts_current_bearer_and_keeps_state() {
	let server = MockServer::start_async().await;
	let client = client_for(&server);

	client.lifecycle().install(tokens("at2", Some("rt2")));

	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(REVOKE_PATH)
				.header("authorization", "Bearer at2")
				.json_body(json!({}));
			then.status(200).json_body(json!({ "code": 0, "message": "revoked" }));
		})
		.await;

	client.revoke().await.expect("Revoke should succeed.");

	mock.assert_async().await;

	assert_eq!(exposed(client.lifecycle().current().as_ref()), Some(("at2".into(), Some("rt2".into()))));
	assert_eq!(client.lifecycle().metrics().revoke_successes(), 1);

	let cleared = client.lifecycle().clear_current();

	assert!(cleared.is_some());
	assert!(client.lifecycle().current().is_none());
}

#[tokio::test]
async fn revoke_without_access_token_skips_network() {
	let server = MockServer::start_async().await;
	let client = client_for(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(REVOKE_PATH);
			then.status(200);
		})
		.await;
	let err = client.revoke().await.expect_err("Revoke without a token must fail.");

	mock.assert_calls_async(0).await;

	assert!(matches!(err, Error::Precondition(PreconditionError::MissingAccessToken)));
	assert_eq!(client.lifecycle().metrics().revoke_attempts(), 1);
	assert_eq!(client.lifecycle().metrics().revoke_failures(), 1);
}

#[tokio::test]
async fn rejected_revoke_surfaces_envelope_code() {
	let server = MockServer::start_async().await;
	let client = client_for(&server);

	client.lifecycle().install(tokens("at2", Some("rt2")));

	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(REVOKE_PATH);
			then.status(200).json_body(json!({ "code": 40101 }));
		})
		.await;
	let err = client.revoke().await.expect_err("Non-zero envelope code must fail.");

	mock.assert_async().await;

	assert!(matches!(err, Error::Rejected { code: 40101, message: None }));
	assert!(client.lifecycle().current().is_some());
}
