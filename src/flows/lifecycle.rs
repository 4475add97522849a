//! Current/previous token generations plus the refresh and revoke calls that act on them.
//!
//! [`TokenLifecycle`] owns two slots. A successful refresh moves `current` into `previous` and
//! installs the rotated set; `previous` is kept for display and audit only. Refresh and revoke
//! are serialized by an async operation guard, and the rotation itself is a compare-and-swap
//! against the set the refresh started from, so a refresh that raced a new code exchange is
//! reported as [`Error::Superseded`] instead of clobbering the fresher tokens.

mod metrics;

pub use metrics::LifecycleMetrics;

// self
use crate::{
	_prelude::*,
	api::ApiRequest,
	auth::{TokenSecret, TokenSet},
	error::PreconditionError,
	flows::Client,
	http::TokenHttpClient,
	oauth::TransportErrorMapper,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::Endpoint,
};

/// Both token generations, cloned out as one consistent snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenSlots {
	/// Token set used for new requests.
	pub current: Option<TokenSet>,
	/// Token set replaced by the most recent refresh.
	pub previous: Option<TokenSet>,
}

/// Holder of the two token generations.
#[derive(Debug, Default)]
pub struct TokenLifecycle {
	slots: RwLock<TokenSlots>,
	operation: AsyncMutex<()>,
	metrics: LifecycleMetrics,
}
impl TokenLifecycle {
	/// Sets `current` unconditionally; `previous` is untouched.
	pub fn install(&self, tokens: TokenSet) {
		self.slots.write().current = Some(tokens);
	}

	/// Clone of the current token set.
	pub fn current(&self) -> Option<TokenSet> {
		self.slots.read().current.clone()
	}

	/// Clone of the previous token set.
	pub fn previous(&self) -> Option<TokenSet> {
		self.slots.read().previous.clone()
	}

	/// Clone of both slots taken under one lock.
	pub fn snapshot(&self) -> TokenSlots {
		self.slots.read().clone()
	}

	/// Empties `current` (for example after a revoke), returning what it held.
	pub fn clear_current(&self) -> Option<TokenSet> {
		self.slots.write().current.take()
	}

	/// Refresh and revoke counters.
	pub fn metrics(&self) -> &LifecycleMetrics {
		&self.metrics
	}

	/// Rotates `previous := current; current := next` if `current` still equals `expected`.
	pub(crate) fn rotate(&self, expected: Option<&TokenSet>, next: TokenSet) -> Result<()> {
		let mut slots = self.slots.write();

		if slots.current.as_ref() != expected {
			return Err(Error::Superseded);
		}

		slots.previous = slots.current.replace(next);

		Ok(())
	}
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshedTokens {
	access_token: String,
	#[serde(default)]
	refresh_token: Option<String>,
}

impl<C, M> Client<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Rotates the token set through the resource server's refresh endpoint.
	///
	/// The refresh token comes from `current`, falling back to `fallback` only when `current`
	/// has none. A response without a new refresh token keeps the one that was presented.
	pub async fn refresh(&self, fallback: Option<&str>) -> Result<TokenSet> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.refresh_inner(fallback)).await;

		self.lifecycle.metrics().record_refresh(&result);

		obs::finish(KIND, result)
	}

	/// Revokes the current access token at the resource server.
	///
	/// Local state is left as-is; call [`TokenLifecycle::clear_current`] to drop it.
	pub async fn revoke(&self) -> Result<()> {
		const KIND: FlowKind = FlowKind::Revoke;

		let span = FlowSpan::new(KIND, "revoke");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.revoke_inner()).await;

		self.lifecycle.metrics().record_revoke(&result);

		obs::finish(KIND, result)
	}

	async fn refresh_inner(&self, fallback: Option<&str>) -> Result<TokenSet> {
		let _operation = self.lifecycle.operation.lock().await;
		let start = self.lifecycle.current();
		let refresh_token = start
			.as_ref()
			.and_then(|tokens| tokens.refresh_token.clone())
			.or_else(|| fallback.filter(|token| !token.is_empty()).map(TokenSecret::from))
			.ok_or(PreconditionError::MissingRefreshToken)?;
		let mut request = ApiRequest::post(self.descriptor.endpoints.refresh.clone())
			.with_body(serde_json::json!({ "refreshToken": refresh_token.expose() }));

		if let Some(tokens) = &start {
			request = request.with_bearer(tokens.access_token.clone());
		}

		let refreshed: RefreshedTokens =
			self.send_api(Endpoint::Refresh, request).await?.into_data(Endpoint::Refresh)?;
		let access_token = TokenSecret::from(refreshed.access_token);
		let refresh_token = Some(refreshed.refresh_token.map_or(refresh_token, TokenSecret::from));
		let now = OffsetDateTime::now_utc();
		let next = match &start {
			Some(tokens) => tokens.rotated(access_token, refresh_token, now),
			None => TokenSet { id_token: None, access_token, refresh_token, issued_at: now },
		};

		self.lifecycle.rotate(start.as_ref(), next.clone())?;

		Ok(next)
	}

	async fn revoke_inner(&self) -> Result<()> {
		let _operation = self.lifecycle.operation.lock().await;
		let access_token = self
			.lifecycle
			.current()
			.map(|tokens| tokens.access_token)
			.ok_or(PreconditionError::MissingAccessToken)?;
		let request = ApiRequest::post(self.descriptor.endpoints.revoke.clone())
			.with_body(serde_json::json!({}))
			.with_bearer(access_token);

		self.send_api::<serde_json::Value>(Endpoint::Revoke, request).await?.ensure_success()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn tokens(access: &str, refresh: &str) -> TokenSet {
		TokenSet::builder()
			.access_token(access)
			.refresh_token(refresh)
			.build()
			.expect("Token set fixture should build.")
	}

	#[test]
	fn rotation_moves_current_to_previous() {
		let lifecycle = TokenLifecycle::default();
		let first = tokens("at1", "rt1");
		let second = tokens("at2", "rt2");

		lifecycle.install(first.clone());
		lifecycle.rotate(Some(&first), second.clone()).expect("Rotation should succeed.");

		assert_eq!(lifecycle.snapshot(), TokenSlots { current: Some(second), previous: Some(first) });
	}

	#[test]
	fn rotation_against_stale_snapshot_is_superseded() {
		let lifecycle = TokenLifecycle::default();
		let first = tokens("at1", "rt1");
		let newer = tokens("at9", "rt9");

		lifecycle.install(first.clone());
		lifecycle.install(newer.clone());

		let err = lifecycle
			.rotate(Some(&first), tokens("at2", "rt2"))
			.expect_err("Rotation from a stale snapshot must fail.");

		assert!(matches!(err, Error::Superseded));
		assert_eq!(lifecycle.snapshot(), TokenSlots { current: Some(newer), previous: None });
	}

	#[test]
	fn install_and_clear_leave_previous_alone() {
		let lifecycle = TokenLifecycle::default();
		let first = tokens("at1", "rt1");
		let second = tokens("at2", "rt2");

		lifecycle.install(first.clone());
		lifecycle.rotate(Some(&first), second.clone()).expect("Rotation should succeed.");
		lifecycle.install(tokens("at3", "rt3"));

		assert_eq!(lifecycle.previous(), Some(first.clone()));
		assert!(lifecycle.clear_current().is_some());
		assert_eq!(lifecycle.current(), None);
		assert_eq!(lifecycle.previous(), Some(first));
	}
}
