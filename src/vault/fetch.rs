//! Proxied fetch execution: allow-list gate, credential attachment, transport
//! dispatch, and response encoding.

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use tokio::sync::oneshot;
// self
use crate::{
	_prelude::*,
	error::ProtocolError,
	obs::{OpKind, OpSpan},
	protocol::{FetchBody, FetchOutcome, FetchRequest, FetchResponseBody},
	transport::{RawBody, RawRequest},
	vault::{Outbox, VaultCore, refresh},
};

pub(crate) async fn execute(
	core: &VaultCore,
	request: FetchRequest,
	abort: oneshot::Receiver<()>,
	outbox: &Outbox,
) -> Result<FetchOutcome> {
	let span = OpSpan::new(OpKind::Fetch, "execute");
	let url = Url::parse(&request.url).map_err(|_| Error::Domain { url: request.url.clone() })?;

	// The allow-list gate runs before any credential work so a rejected URL
	// never triggers a refresh.
	if !core.permits(&url) {
		return Err(Error::Domain { url: request.url });
	}

	let mut headers: BTreeMap<String, String> = request
		.headers
		.into_iter()
		.map(|(name, value)| (name.to_ascii_lowercase(), value))
		.collect();
	let body = request.body.map(convert_body).transpose()?;

	if request.requires_auth
		&& let Some(token) = refresh::ensure_valid_token(core, false, outbox).await?
	{
		// Caller-supplied authorization headers win over the vault's.
		headers.entry("authorization".into()).or_insert_with(|| format!("Bearer {token}"));
	}

	let raw = RawRequest { method: request.method, url, headers, body };
	let response = span.instrument(core.transport.execute(raw, Some(abort))).await?;
	let body = if is_text_content(response.content_type.as_deref()) {
		FetchResponseBody::Text { content: String::from_utf8_lossy(&response.body).into_owned() }
	} else {
		FetchResponseBody::Base64 { data: BASE64.encode(&response.body) }
	};

	Ok(FetchOutcome {
		status: response.status,
		content_type: response.content_type,
		headers: request.include_headers.then_some(response.headers),
		body,
	})
}

fn convert_body(body: FetchBody) -> Result<RawBody> {
	Ok(match body {
		FetchBody::Text { content } => RawBody::Text(content),
		FetchBody::Bytes { data } => RawBody::Bytes(
			BASE64
				.decode(data.as_bytes())
				.map_err(|e| ProtocolError::InvalidBase64 { source: e })?,
		),
		FetchBody::Multipart { payload } => RawBody::Multipart(payload),
	})
}

/// Text content types cross the boundary unencoded; everything else, including
/// an absent content type, travels as base64.
fn is_text_content(content_type: Option<&str>) -> bool {
	let Some(content_type) = content_type else {
		return false;
	};
	let essence =
		content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();

	essence.starts_with("text/")
		|| matches!(
			essence.as_str(),
			"application/json"
				| "application/xml"
				| "application/x-www-form-urlencoded"
				| "application/javascript"
		) || essence.ends_with("+json")
		|| essence.ends_with("+xml")
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn content_type_classification_covers_structured_suffixes() {
		assert!(is_text_content(Some("text/plain; charset=utf-8")));
		assert!(is_text_content(Some("application/json")));
		assert!(is_text_content(Some("application/problem+json")));
		assert!(is_text_content(Some("image/svg+xml")));
		assert!(is_text_content(Some("APPLICATION/JSON")));
		assert!(!is_text_content(Some("application/octet-stream")));
		assert!(!is_text_content(Some("image/png")));
		assert!(!is_text_content(None));
	}

	#[test]
	fn corrupt_base64_bodies_are_rejected_before_transport() {
		let error = convert_body(FetchBody::Bytes { data: "!!not-base64!!".into() })
			.expect_err("Corrupt base64 should fail conversion.");

		assert!(matches!(error, Error::Protocol(ProtocolError::InvalidBase64 { .. })));
	}
}
