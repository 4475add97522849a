//! Provider descriptor data structures shared by all flows.

/// Builder API for assembling provider descriptors.
pub mod builder;

pub use builder::*;

// self
use crate::{_prelude::*, auth::ProviderId, error::ConfigError};

/// Endpoint set declared by a provider descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
	/// Authorization endpoint users are redirected to.
	pub authorization: Url,
	/// Token endpoint used for the authorization code exchange.
	pub token: Url,
	/// Resource server endpoint that rotates access/refresh tokens.
	pub refresh: Url,
	/// Resource server endpoint that revokes the current access token.
	pub revoke: Url,
	/// Protected endpoint called with the fresh bearer token after an exchange.
	pub protected: Url,
}

/// Immutable provider descriptor consumed by flows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProviderDescriptor {
	/// Descriptor identifier.
	pub id: ProviderId,
	/// Endpoint definitions.
	pub endpoints: ProviderEndpoints,
}
impl ProviderDescriptor {
	/// Creates a new builder for the provided identifier.
	pub fn builder(id: ProviderId) -> ProviderDescriptorBuilder {
		ProviderDescriptorBuilder::new(id)
	}

	/// Parses and validates a descriptor from its JSON configuration form.
	///
	/// The JSON mirrors [`ProviderDescriptorBuilder`]'s public fields, so endpoints left out
	/// fall back to the builder defaults (refresh/revoke derived from `api_base`).
	pub fn from_json(raw: &str) -> Result<Self> {
		let mut de = serde_json::Deserializer::from_str(raw);
		let builder: ProviderDescriptorBuilder = serde_path_to_error::deserialize(&mut de)
			.map_err(|source| ConfigError::MalformedDescriptor { source })?;

		builder.build().map_err(|e| ConfigError::from(e).into())
	}
}
