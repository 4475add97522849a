#![cfg(feature = "reqwest")]

// self
use oauth2_pkce_client::{
	_preludet::*,
	error::ConfigError,
	provider::{Endpoint, ProviderDescriptor, ProviderDescriptorError},
};

#[test]
fn descriptor_json_derives_resource_endpoints() {
	let descriptor = ProviderDescriptor::from_json(
		r#"{
			"id": "okta-dev",
			"authorization_endpoint": "https://id.example.com/oauth2/v1/authorize",
			"token_endpoint": "https://id.example.com/oauth2/v1/token",
			"protected_endpoint": "https://api.example.com/api/protected",
			"api_base": "https://api.example.com/api/v1/"
		}"#,
	)
	.expect("Descriptor JSON should parse.");

	assert_eq!(descriptor.id.to_string(), "okta-dev");
	assert_eq!(descriptor.endpoints.refresh.as_str(), "https://api.example.com/api/v1/auth/refresh");
	assert_eq!(descriptor.endpoints.revoke.as_str(), "https://api.example.com/api/v1/auth/revoke");
	assert_eq!(Endpoint::Refresh.operation(), "Token refresh");
}

#[test]
fn malformed_descriptor_reports_field_path() {
	let err = ProviderDescriptor::from_json(r#"{ "id": "okta-dev", "token_endpoint": "not a url" }"#)
		.expect_err("Invalid URLs must be rejected.");

	match err {
		Error::Config(ConfigError::MalformedDescriptor { source }) =>
			assert_eq!(source.path().to_string(), "token_endpoint"),
		other => panic!("Expected a malformed descriptor error, got {other:?}."),
	}
}

#[test]
fn descriptor_json_enforces_https() {
	let err = ProviderDescriptor::from_json(
		r#"{
			"id": "okta-dev",
			"authorization_endpoint": "http://id.example.com/oauth2/v1/authorize",
			"token_endpoint": "https://id.example.com/oauth2/v1/token",
			"protected_endpoint": "https://api.example.com/api/protected",
			"api_base": "https://api.example.com/api/v1/"
		}"#,
	)
	.expect_err("Remote plain-HTTP endpoints must be rejected.");

	assert!(matches!(
		err,
		Error::Config(ConfigError::InvalidDescriptor(ProviderDescriptorError::InsecureEndpoint {
			endpoint: "authorization",
			..
		}))
	));
}
