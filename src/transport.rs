//! Transport seam between the vault task and the HTTP stack.
//!
//! The vault never talks to the network directly; it hands a [`RawRequest`] to
//! an [`HttpTransport`] implementation and receives back an already-buffered
//! [`RawResponse`]. The default [`ReqwestTransport`] lives behind the `reqwest`
//! feature so embedders can supply their own stack instead.

// crates.io
#[cfg(feature = "reqwest")] use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tokio::sync::oneshot;
// self
use crate::{_prelude::*, form::MultipartPayload, protocol::HttpMethod};

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = Result<RawResponse>> + 'a + Send>>;

/// Fully-resolved outbound request, produced by the vault after allow-list and
/// auth processing.
#[derive(Clone, Debug)]
pub struct RawRequest {
	/// HTTP method.
	pub method: HttpMethod,
	/// Already-validated absolute URL.
	pub url: Url,
	/// Header map including any authorization header the vault attached.
	pub headers: BTreeMap<String, String>,
	/// Request body, if any.
	pub body: Option<RawBody>,
}

/// Decoded request body handed to the transport.
#[derive(Clone, Debug)]
pub enum RawBody {
	/// UTF-8 text body.
	Text(String),
	/// Raw bytes, already base64-decoded.
	Bytes(Vec<u8>),
	/// Multipart form payload assembled by the transport.
	Multipart(MultipartPayload),
}

/// Buffered response returned by the transport, independent of outcome class.
/// Non-2xx statuses are ordinary responses here; the transport only fails on
/// network-level errors.
#[derive(Clone, Debug)]
pub struct RawResponse {
	/// HTTP status code.
	pub status: u16,
	/// `content-type` header value, if present.
	pub content_type: Option<String>,
	/// Response headers with lowercased names.
	pub headers: BTreeMap<String, String>,
	/// Full response body.
	pub body: Vec<u8>,
}

/// HTTP execution contract implemented by transports.
///
/// When `abort` resolves before the response arrives the implementation must
/// stop the request and return [`Error::Cancelled`](crate::error::Error::Cancelled).
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Executes the request, optionally racing it against an abort signal.
	fn execute(
		&self,
		request: RawRequest,
		abort: Option<oneshot::Receiver<()>>,
	) -> TransportFuture<'_>;
}

/// Default transport backed by a shared [`ReqwestClient`].
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds a transport over a freshly constructed client.
	pub fn new() -> Result<Self> {
		let client = ReqwestClient::builder()
			.build()
			.map_err(|e| crate::error::ConfigError::HttpClientBuild { message: e.to_string() })?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	async fn dispatch(&self, request: RawRequest) -> Result<RawResponse> {
		let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
			.map_err(Error::network)?;
		let mut builder = self.0.request(method, request.url);

		if !request.headers.is_empty() {
			builder = builder.headers(build_header_map(&request.headers)?);
		}

		builder = match request.body {
			Some(RawBody::Text(content)) => builder.body(content),
			Some(RawBody::Bytes(data)) => builder.body(data),
			Some(RawBody::Multipart(payload)) => builder.multipart(payload.into_form()?),
			None => builder,
		};

		let response = builder.send().await?;
		let status = response.status().as_u16();
		let mut headers = BTreeMap::new();

		for (name, value) in response.headers() {
			if let Ok(value) = value.to_str() {
				headers.insert(name.as_str().to_ascii_lowercase(), value.to_owned());
			}
		}

		let content_type = headers.get("content-type").cloned();
		let body = response.bytes().await?.to_vec();

		Ok(RawResponse { status, content_type, headers, body })
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn execute(
		&self,
		request: RawRequest,
		abort: Option<oneshot::Receiver<()>>,
	) -> TransportFuture<'_> {
		Box::pin(async move {
			let Some(abort) = abort else {
				return self.dispatch(request).await;
			};
			let dispatch = self.dispatch(request);

			tokio::pin!(dispatch);
			tokio::select! {
				outcome = &mut dispatch => outcome,
				received = abort => match received {
					Ok(()) => Err(Error::Cancelled),
					// Sender dropped without firing; keep waiting for the response.
					Err(_) => dispatch.await,
				},
			}
		})
	}
}

#[cfg(feature = "reqwest")]
fn build_header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap> {
	let mut map = HeaderMap::with_capacity(headers.len());

	for (name, value) in headers {
		let name = HeaderName::from_bytes(name.as_bytes()).map_err(Error::network)?;
		let value = HeaderValue::from_str(value).map_err(Error::network)?;

		map.insert(name, value);
	}

	Ok(map)
}
