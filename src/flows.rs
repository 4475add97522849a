//! The [`Client`] and the flows it runs: PKCE authorization, code exchange, protected calls,
//! refresh, and revoke.

pub mod auth_code_pkce;
pub mod common;
pub mod lifecycle;
pub mod protected;
pub mod verifier;

pub use auth_code_pkce::*;
pub use common::*;
pub use lifecycle::*;
pub use protected::*;
pub use verifier::*;

// self
use crate::{
	_prelude::*,
	flows::auth_code_pkce::attempt::AttemptTracker,
	http::TokenHttpClient,
	oauth::TransportErrorMapper,
	provider::ProviderDescriptor,
	store::KeyValueStore,
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport stack.
pub type ReqwestPkceClient = Client<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Public OAuth client bound to one provider descriptor.
///
/// The client owns the transport, the key-value store used for verifiers and the last ID token,
/// the token lifecycle (current/previous generations), and the exchange attempt tracker. It is
/// `Send + Sync`; clones share all state.
#[derive(Clone)]
pub struct Client<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for every outbound request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Key-value store backing verifiers and the last ID token.
	pub store: Arc<dyn KeyValueStore>,
	/// Endpoints the client talks to.
	pub descriptor: ProviderDescriptor,
	settings: ClientSettings,
	verifiers: Arc<VerifierStore>,
	lifecycle: Arc<TokenLifecycle>,
	attempts: Arc<AttemptTracker>,
}
impl<C, M> Client<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a client that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		store: Arc<dyn KeyValueStore>,
		descriptor: ProviderDescriptor,
		settings: ClientSettings,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		let verifiers = VerifierStore::new(store.clone(), settings.verifier_ttl);

		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			store,
			descriptor,
			settings,
			verifiers: Arc::new(verifiers),
			lifecycle: Default::default(),
			attempts: Default::default(),
		}
	}

	/// Client registration and policy.
	pub fn settings(&self) -> &ClientSettings {
		&self.settings
	}

	/// Current/previous token generations.
	pub fn lifecycle(&self) -> &TokenLifecycle {
		&self.lifecycle
	}

	/// Pending PKCE verifiers.
	pub fn verifiers(&self) -> &VerifierStore {
		&self.verifiers
	}
}
#[cfg(feature = "reqwest")]
impl Client<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a client with its own reqwest-backed transport.
	pub fn new(
		store: Arc<dyn KeyValueStore>,
		descriptor: ProviderDescriptor,
		settings: ClientSettings,
	) -> Self {
		Self::with_http_client(
			store,
			descriptor,
			settings,
			ReqwestHttpClient::default(),
			ReqwestTransportErrorMapper,
		)
	}
}
impl<C, M> Debug for Client<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Client")
			.field("descriptor", &self.descriptor)
			.field("settings", &self.settings)
			.field("exchange_status", &self.attempts.status())
			.finish()
	}
}
