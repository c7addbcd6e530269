//! Multipart form payloads that survive serialization across the vault boundary.
//!
//! Browsers and native HTTP stacks keep form state in opaque handles that
//! cannot cross a message channel, so the protocol carries an explicit part
//! list instead: text fields stay as strings and file parts travel as base64.

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
// self
use crate::{_prelude::*, error::ProtocolError};

/// Serializable multipart form: an ordered list of parts.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MultipartPayload {
	/// Form parts in submission order.
	#[serde(default)]
	pub parts: Vec<MultipartPart>,
}
impl MultipartPayload {
	/// Appends a text field.
	pub fn push_field(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
		self.parts.push(MultipartPart::Field { name: name.into(), value: value.into() });

		self
	}

	/// Appends a file part, base64-encoding the bytes for transit.
	pub fn push_file(
		&mut self,
		name: impl Into<String>,
		file_name: impl Into<String>,
		content_type: impl Into<String>,
		bytes: &[u8],
	) -> &mut Self {
		self.parts.push(MultipartPart::File {
			name: name.into(),
			file_name: file_name.into(),
			content_type: content_type.into(),
			data: BASE64.encode(bytes),
		});

		self
	}

	/// Converts the payload into a reqwest form, decoding file parts back into bytes.
	#[cfg(feature = "reqwest")]
	pub fn into_form(self) -> Result<reqwest::multipart::Form> {
		let mut form = reqwest::multipart::Form::new();

		for part in self.parts {
			form = match part {
				MultipartPart::Field { name, value } => form.text(name, value),
				MultipartPart::File { name, file_name, content_type, data } => {
					let bytes = BASE64
						.decode(data.as_bytes())
						.map_err(|e| ProtocolError::InvalidBase64 { source: e })?;
					let part = reqwest::multipart::Part::bytes(bytes)
						.file_name(file_name)
						.mime_str(&content_type)
						.map_err(Error::network)?;

					form.part(name, part)
				},
			};
		}

		Ok(form)
	}
}

/// One part of a multipart form.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MultipartPart {
	/// Plain text field.
	Field {
		/// Field name.
		name: String,
		/// Field value.
		value: String,
	},
	/// File part with base64-encoded contents.
	File {
		/// Field name.
		name: String,
		/// Original file name.
		file_name: String,
		/// MIME type of the file contents.
		content_type: String,
		/// Base64-encoded file bytes.
		data: String,
	},
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn file_parts_round_trip_through_base64() {
		let mut payload = MultipartPayload::default();

		payload.push_field("caption", "hello").push_file(
			"media",
			"photo.png",
			"image/png",
			&[0x89, 0x50, 0x4e, 0x47],
		);

		let json = serde_json::to_string(&payload).expect("Payload should serialize.");
		let restored: MultipartPayload =
			serde_json::from_str(&json).expect("Payload should deserialize.");

		assert_eq!(restored.parts.len(), 2);

		match &restored.parts[1] {
			MultipartPart::File { data, content_type, .. } => {
				assert_eq!(content_type, "image/png");
				assert_eq!(
					BASE64.decode(data.as_bytes()).expect("File data should be valid base64."),
					vec![0x89, 0x50, 0x4e, 0x47],
				);
			},
			other => panic!("Expected a file part, got {other:?}."),
		}
	}

	#[cfg(feature = "reqwest")]
	#[test]
	fn corrupt_file_data_is_rejected_when_building_a_form() {
		let payload = MultipartPayload {
			parts: vec![MultipartPart::File {
				name: "media".into(),
				file_name: "photo.png".into(),
				content_type: "image/png".into(),
				data: "st\u{0}ill not base64".into(),
			}],
		};

		assert!(payload.into_form().is_err());
	}
}
