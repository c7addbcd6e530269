//! Response parsing for HTTP auth backends.

// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::{FieldPatch, TokenInfo},
	error::ProtocolError,
	protocol,
	transport::RawResponse,
};

/// Turns a raw auth-endpoint response into a normalized [`TokenInfo`] patch.
pub trait ResponseParser
where
	Self: 'static + Send + Sync,
{
	/// Parses the response, classifying non-success statuses as auth failures.
	fn parse(&self, response: &RawResponse) -> Result<TokenInfo>;
}

/// Default parser for JSON token endpoints.
///
/// Accepts both `token` and `access_token` key spellings and converts a
/// relative `expires_in` (seconds) into an absolute epoch-millisecond expiry
/// when the response carries no `expires_at` of its own.
#[derive(Clone, Debug, Default)]
pub struct JsonTokenParser;
impl ResponseParser for JsonTokenParser {
	fn parse(&self, response: &RawResponse) -> Result<TokenInfo> {
		if response.status >= 400 {
			return Err(Error::Auth {
				reason: format!("Auth endpoint returned status {}.", response.status),
				status: Some(response.status),
				body: Some(String::from_utf8_lossy(&response.body).into_owned()),
			});
		}

		if response.body.is_empty() {
			return Ok(TokenInfo::default());
		}

		let deserializer = &mut serde_json::Deserializer::from_slice(&response.body);
		let raw: RawTokenResponse = serde_path_to_error::deserialize(deserializer)
			.map_err(|e| ProtocolError::ResponseParse {
				source: e,
				status: Some(response.status),
			})?;

		Ok(raw.into_info())
	}
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTokenResponse {
	#[serde(default, alias = "access_token", alias = "accessToken")]
	token: FieldPatch<String>,
	#[serde(default, alias = "refresh_token")]
	refresh_token: FieldPatch<String>,
	#[serde(default, alias = "expires_at")]
	expires_at: FieldPatch<i64>,
	#[serde(default, alias = "expires_in")]
	expires_in: Option<i64>,
	#[serde(default)]
	user: FieldPatch<Value>,
}
impl RawTokenResponse {
	fn into_info(self) -> TokenInfo {
		let expires_at = match (&self.expires_at, self.expires_in) {
			// Absolute expiry wins over a relative lifetime.
			(FieldPatch::Absent, Some(secs)) => FieldPatch::set(protocol::to_unix_ms(
				OffsetDateTime::now_utc() + Duration::seconds(secs),
			)),
			_ => self.expires_at,
		};

		TokenInfo {
			token: self.token,
			expires_at,
			refresh_token: self.refresh_token,
			user: self.user,
		}
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	fn json_response(status: u16, body: Value) -> RawResponse {
		RawResponse {
			status,
			content_type: Some("application/json".into()),
			headers: BTreeMap::new(),
			body: serde_json::to_vec(&body).expect("Fixture body should serialize."),
		}
	}

	#[test]
	fn parses_access_token_spelling_and_expires_in() {
		let response = json_response(
			200,
			json!({"access_token": "abc", "refresh_token": "def", "expires_in": 3600}),
		);
		let info = JsonTokenParser.parse(&response).expect("Token response should parse.");

		assert_eq!(info.token, FieldPatch::set("abc".into()));
		assert_eq!(info.refresh_token, FieldPatch::set("def".into()));

		let expiry = info.expires_at.as_set().flatten().copied().expect("Expiry should be set.");
		let now_ms = protocol::to_unix_ms(OffsetDateTime::now_utc());

		assert!(expiry > now_ms + 3_500_000 && expiry <= now_ms + 3_700_000);
	}

	#[test]
	fn absent_fields_stay_absent() {
		let response = json_response(200, json!({"user": {"id": 7}}));
		let info = JsonTokenParser.parse(&response).expect("Partial response should parse.");

		assert!(info.token.is_absent());
		assert!(info.refresh_token.is_absent());
		assert!(info.expires_at.is_absent());
		assert_eq!(info.user, FieldPatch::set(json!({"id": 7})));
	}

	#[test]
	fn error_statuses_surface_as_auth_failures_with_body() {
		let response = json_response(401, json!({"error": "invalid_session"}));
		let error =
			JsonTokenParser.parse(&response).expect_err("Error status should fail parsing.");

		match error {
			Error::Auth { status, body, .. } => {
				assert_eq!(status, Some(401));
				assert!(body.expect("Auth error should carry the body.").contains("invalid_session"));
			},
			other => panic!("Expected an auth error, got {other:?}."),
		}
	}

	#[test]
	fn empty_bodies_yield_an_empty_patch() {
		let response = RawResponse {
			status: 204,
			content_type: None,
			headers: BTreeMap::new(),
			body: Vec::new(),
		};
		let info = JsonTokenParser.parse(&response).expect("Empty response should parse.");

		assert!(info.is_empty());
	}
}
