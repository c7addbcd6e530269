//! Endpoint-driven [`Provider`] for JSON auth backends.

// crates.io
use serde_json::{Value, json};
// self
use crate::{
	_prelude::*,
	auth::TokenInfo,
	protocol::HttpMethod,
	provider::{Provider, ProviderFuture, ResponseParser},
	transport::{HttpTransport, RawBody, RawRequest},
};

/// Endpoint set for an [`HttpProvider`].
#[derive(Clone, Debug, Default)]
pub struct ProviderEndpoints {
	refresh: Option<Url>,
	login: Option<Url>,
	logout: Option<Url>,
	custom: HashMap<String, Url>,
}
impl ProviderEndpoints {
	/// Creates an empty endpoint set.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the refresh endpoint.
	pub fn with_refresh(mut self, url: Url) -> Self {
		self.refresh = Some(url);

		self
	}

	/// Sets the login endpoint.
	pub fn with_login(mut self, url: Url) -> Self {
		self.login = Some(url);

		self
	}

	/// Sets the logout endpoint.
	pub fn with_logout(mut self, url: Url) -> Self {
		self.logout = Some(url);

		self
	}

	/// Registers a named custom operation endpoint.
	pub fn with_custom(mut self, op: impl Into<String>, url: Url) -> Self {
		self.custom.insert(op.into(), url);

		self
	}
}

/// [`Provider`] that POSTs JSON to configured endpoints and parses the
/// responses with a pluggable [`ResponseParser`].
pub struct HttpProvider {
	endpoints: ProviderEndpoints,
	transport: Arc<dyn HttpTransport>,
	parser: Arc<dyn ResponseParser>,
}
impl HttpProvider {
	/// Builds a provider over the given endpoints and transport with the
	/// default JSON parser.
	pub fn new(endpoints: ProviderEndpoints, transport: Arc<dyn HttpTransport>) -> Self {
		Self { endpoints, transport, parser: Arc::new(super::JsonTokenParser) }
	}

	/// Replaces the response parser.
	pub fn with_parser(mut self, parser: Arc<dyn ResponseParser>) -> Self {
		self.parser = parser;

		self
	}

	async fn post_json(&self, url: Url, payload: Value) -> Result<TokenInfo> {
		let body = serde_json::to_string(&payload).map_err(Error::network)?;
		let request = RawRequest {
			method: HttpMethod::Post,
			url,
			headers: BTreeMap::from([("content-type".to_owned(), "application/json".to_owned())]),
			body: Some(RawBody::Text(body)),
		};
		// Auth calls are not cancellable, so no abort signal is attached.
		let response = self.transport.execute(request, None).await?;

		self.parser.parse(&response)
	}
}
impl Provider for HttpProvider {
	fn refresh<'a>(&'a self, refresh_token: Option<&'a str>) -> ProviderFuture<'a, TokenInfo> {
		Box::pin(async move {
			let url = self
				.endpoints
				.refresh
				.clone()
				.ok_or_else(|| Error::auth("No refresh endpoint is configured."))?;
			let payload = match refresh_token {
				Some(token) => json!({ "refreshToken": token }),
				None => json!({}),
			};

			self.post_json(url, payload).await
		})
	}

	fn login<'a>(&'a self, payload: Value, url: Option<&'a Url>) -> ProviderFuture<'a, TokenInfo> {
		Box::pin(async move {
			let url = url
				.cloned()
				.or_else(|| self.endpoints.login.clone())
				.ok_or_else(|| Error::auth("No login endpoint is configured."))?;

			self.post_json(url, payload).await
		})
	}

	fn logout<'a>(&'a self, payload: Option<Value>) -> ProviderFuture<'a, TokenInfo> {
		Box::pin(async move {
			// Without a logout endpoint the session is local-only; report success
			// and let the caller clear state.
			let Some(url) = self.endpoints.logout.clone() else {
				return Ok(TokenInfo::default());
			};

			self.post_json(url, payload.unwrap_or_else(|| json!({}))).await
		})
	}

	fn call<'a>(&'a self, op: &'a str, payload: Value) -> ProviderFuture<'a, TokenInfo> {
		Box::pin(async move {
			let url = self.endpoints.custom.get(op).cloned().ok_or_else(|| {
				Error::auth(format!("Provider does not support the operation {op}."))
			})?;

			self.post_json(url, payload).await
		})
	}
}
