//! OAuth 2.0 Authorization Code + PKCE client: build the authorize redirect, exchange the code,
//! and keep the current and previous token generations fresh against a resource server.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod api;
pub mod auth;
pub mod error;
pub mod flows;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod provider;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::ProviderId,
		flows::{ClientSettings, ReqwestPkceClient},
		http::ReqwestHttpClient,
		oauth::ReqwestTransportErrorMapper,
		provider::ProviderDescriptor,
		store::{KeyValueStore, MemoryStore},
	};

	/// Client id used by test settings.
	pub const TEST_CLIENT_ID: &str = "spa-client";
	/// Redirect URI used by test settings.
	pub const TEST_REDIRECT_URI: &str = "http://localhost:3000/callback";

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Builds a descriptor whose every endpoint lives under `base` (typically a mock server).
	///
	/// Paths mirror a typical deployment: `/oauth2/v1/authorize`, `/oauth2/v1/token`,
	/// `/api/protected`, and `/api/v1/auth/{refresh,revoke}`.
	pub fn test_descriptor(base: &str) -> ProviderDescriptor {
		let join = |path: &str| {
			Url::parse(&format!("{}{path}", base.trim_end_matches('/')))
				.expect("Test endpoint URL should parse.")
		};

		ProviderDescriptor::builder(ProviderId::new("mock").expect("Provider id should be valid."))
			.authorization_endpoint(join("/oauth2/v1/authorize"))
			.token_endpoint(join("/oauth2/v1/token"))
			.protected_endpoint(join("/api/protected"))
			.api_base(join("/api/v1/"))
			.build()
			.expect("Test descriptor should build.")
	}

	/// Settings for [`TEST_CLIENT_ID`] and [`TEST_REDIRECT_URI`].
	pub fn test_settings() -> ClientSettings {
		ClientSettings::parse(TEST_CLIENT_ID, TEST_REDIRECT_URI)
			.expect("Test settings should parse.")
	}

	/// Constructs a [`ReqwestPkceClient`] backed by an in-memory store and the reqwest transport
	/// used across integration tests.
	pub fn build_reqwest_test_client(
		descriptor: ProviderDescriptor,
		settings: ClientSettings,
	) -> (ReqwestPkceClient, MemoryStore) {
		let backend = MemoryStore::default();
		let store: Arc<dyn KeyValueStore> = Arc::new(backend.clone());
		let client = ReqwestPkceClient::with_http_client(
			store,
			descriptor,
			settings,
			test_reqwest_http_client(),
			ReqwestTransportErrorMapper,
		);

		(client, backend)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use oauth::oauth2;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
