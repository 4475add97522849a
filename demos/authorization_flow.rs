//! Starts an authorization-code + PKCE login, persists its verifier to disk, and shows what the
//! redirect handler sees when the user cancels at the consent screen.

// std
use std::{env, sync::Arc};
// crates.io
use color_eyre::Result;
use url::Url;
// self
use oauth2_pkce_client::{
	auth::{ProviderId, ScopeSet},
	flows::{Client, ClientSettings},
	provider::ProviderDescriptor,
	store::{FileStore, KeyValueStore},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let path = env::temp_dir().join("oauth2-pkce-client-demo").join("store.json");
	let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&path)?);
	let descriptor = ProviderDescriptor::builder(ProviderId::new("demo-provider")?)
		.authorization_endpoint(Url::parse("https://id.example.com/oauth2/v1/authorize")?)
		.token_endpoint(Url::parse("https://id.example.com/oauth2/v1/token")?)
		.protected_endpoint(Url::parse("https://api.example.com/api/protected")?)
		.api_base(Url::parse("https://api.example.com/api/v1/")?)
		.build()?;
	let settings = ClientSettings::parse("demo-spa", "http://localhost:3000/callback")?
		.with_scope(ScopeSet::new(["openid", "profile", "offline_access"])?);
	let client = Client::new(store, descriptor, settings);
	let session = client.start_authorization().await?;

	println!("Send your user to {}.", session.authorize_url);
	println!(
		"PKCE challenge ({}): {}, redeemable until {}.",
		session.code_challenge_method.as_str(),
		session.code_challenge,
		session.expires_at
	);
	println!("Verifier persisted in {}.", path.display());

	let mut redirect = session.redirect_uri.clone();

	redirect
		.query_pairs_mut()
		.append_pair("error", "access_denied")
		.append_pair("state", &session.attempt);

	if let Err(e) = client.exchange_callback(&redirect).await {
		println!("Callback rejected: {e}");
	}

	println!("Pending attempts after the callback: {:?}.", client.verifiers().pending().await?);

	Ok(())
}
