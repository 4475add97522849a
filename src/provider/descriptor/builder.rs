// self
use crate::{
	_prelude::*,
	auth::ProviderId,
	provider::{ProviderDescriptor, ProviderEndpoints},
};

const REFRESH_PATH: &str = "auth/refresh";
const REVOKE_PATH: &str = "auth/revoke";

/// Errors raised while constructing or validating descriptors.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ProviderDescriptorError {
	/// Authorization endpoint is required to build authorize URLs.
	#[error("Missing authorization endpoint.")]
	MissingAuthorizationEndpoint,
	/// Token endpoint is required for code exchanges.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// Protected endpoint is required to finish the exchange flow.
	#[error("Missing protected resource endpoint.")]
	MissingProtectedEndpoint,
	/// Neither an explicit endpoint nor an API base was supplied.
	#[error("Missing {endpoint} endpoint and no api_base to derive it from.")]
	MissingResourceEndpoint {
		/// Which endpoint could not be resolved.
		endpoint: &'static str,
	},
	/// API base cannot be extended with the resource paths.
	#[error("The api_base `{url}` cannot be used as a base URL.")]
	InvalidApiBase {
		/// Offending base URL.
		url: String,
	},
	/// Endpoints must use HTTPS unless they target a loopback host.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
}

/// Builder for [`ProviderDescriptor`] values.
///
/// The builder doubles as the configuration schema: it deserializes from JSON with every
/// endpoint optional, and [`build`](Self::build) enforces the invariants.
#[derive(Debug, Deserialize)]
pub struct ProviderDescriptorBuilder {
	/// Identifier for the descriptor being constructed.
	pub id: ProviderId,
	/// Authorization endpoint.
	#[serde(default)]
	pub authorization_endpoint: Option<Url>,
	/// Token endpoint.
	#[serde(default)]
	pub token_endpoint: Option<Url>,
	/// Explicit refresh endpoint; derived from `api_base` when absent.
	#[serde(default)]
	pub refresh_endpoint: Option<Url>,
	/// Explicit revoke endpoint; derived from `api_base` when absent.
	#[serde(default)]
	pub revoke_endpoint: Option<Url>,
	/// Protected endpoint called after a successful exchange.
	#[serde(default)]
	pub protected_endpoint: Option<Url>,
	/// Resource server API root (for example `https://api.example.com/api/v1/`).
	#[serde(default)]
	pub api_base: Option<Url>,
}
impl ProviderDescriptorBuilder {
	/// Creates a new builder seeded with the provided identifier.
	pub fn new(id: ProviderId) -> Self {
		Self {
			id,
			authorization_endpoint: None,
			token_endpoint: None,
			refresh_endpoint: None,
			revoke_endpoint: None,
			protected_endpoint: None,
			api_base: None,
		}
	}

	/// Sets the authorization endpoint.
	pub fn authorization_endpoint(mut self, url: Url) -> Self {
		self.authorization_endpoint = Some(url);

		self
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Sets the refresh endpoint explicitly.
	pub fn refresh_endpoint(mut self, url: Url) -> Self {
		self.refresh_endpoint = Some(url);

		self
	}

	/// Sets the revoke endpoint explicitly.
	pub fn revoke_endpoint(mut self, url: Url) -> Self {
		self.revoke_endpoint = Some(url);

		self
	}

	/// Sets the protected endpoint.
	pub fn protected_endpoint(mut self, url: Url) -> Self {
		self.protected_endpoint = Some(url);

		self
	}

	/// Sets the API root used to derive `auth/refresh` and `auth/revoke`.
	pub fn api_base(mut self, url: Url) -> Self {
		self.api_base = Some(url);

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<ProviderDescriptor, ProviderDescriptorError> {
		let authorization = self
			.authorization_endpoint
			.ok_or(ProviderDescriptorError::MissingAuthorizationEndpoint)?;
		let token = self.token_endpoint.ok_or(ProviderDescriptorError::MissingTokenEndpoint)?;
		let protected =
			self.protected_endpoint.ok_or(ProviderDescriptorError::MissingProtectedEndpoint)?;
		let refresh =
			resolve_resource("refresh", REFRESH_PATH, self.refresh_endpoint, &self.api_base)?;
		let revoke =
			resolve_resource("revoke", REVOKE_PATH, self.revoke_endpoint, &self.api_base)?;
		let descriptor = ProviderDescriptor {
			id: self.id,
			endpoints: ProviderEndpoints { authorization, token, refresh, revoke, protected },
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}

impl ProviderDescriptor {
	fn validate(&self) -> Result<(), ProviderDescriptorError> {
		let endpoints = &self.endpoints;

		validate_endpoint("authorization", &endpoints.authorization)?;
		validate_endpoint("token", &endpoints.token)?;
		validate_endpoint("refresh", &endpoints.refresh)?;
		validate_endpoint("revoke", &endpoints.revoke)?;
		validate_endpoint("protected", &endpoints.protected)?;

		Ok(())
	}
}

fn resolve_resource(
	endpoint: &'static str,
	relative: &str,
	explicit: Option<Url>,
	api_base: &Option<Url>,
) -> Result<Url, ProviderDescriptorError> {
	if let Some(url) = explicit {
		return Ok(url);
	}

	let base = api_base
		.as_ref()
		.ok_or(ProviderDescriptorError::MissingResourceEndpoint { endpoint })?;

	if base.cannot_be_a_base() {
		return Err(ProviderDescriptorError::InvalidApiBase { url: base.to_string() });
	}

	let mut base = base.clone();

	// `Url::join` replaces the last segment unless the path ends with a slash.
	if !base.path().ends_with('/') {
		let path = format!("{}/", base.path());

		base.set_path(&path);
	}

	base.join(relative).map_err(|_| ProviderDescriptorError::InvalidApiBase { url: base.to_string() })
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ProviderDescriptorError> {
	if url.scheme() == "https" || is_loopback(url) {
		Ok(())
	} else {
		Err(ProviderDescriptorError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	}
}

fn is_loopback(url: &Url) -> bool {
	if url.scheme() != "http" {
		return false;
	}

	match url.host() {
		Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
		Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
		None => false,
	}
}
