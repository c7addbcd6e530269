//! Domain allow-list matching, enforced before any network call leaves the vault.

// self
use crate::{_prelude::*, error::ConfigError};

/// Validated set of permitted target hosts and optional ports.
///
/// An empty list admits every URL—the allow-list is an opt-in feature. Patterns are either an
/// exact hostname (`api.example.com`), a `*.`-prefixed wildcard matching the suffix domain and
/// all of its subdomains (`*.example.com`), or either form with a `:port` suffix that the URL's
/// port must then match exactly.
#[derive(Clone, Debug, Default)]
pub struct AllowList {
	patterns: Vec<DomainPattern>,
}
impl AllowList {
	/// Parses and validates the provided patterns; fails fast on malformed entries.
	pub fn new<I, S>(patterns: I) -> Result<Self, ConfigError>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let patterns = patterns
			.into_iter()
			.map(|raw| DomainPattern::parse(raw.as_ref()))
			.collect::<Result<Vec<_>, _>>()?;

		Ok(Self { patterns })
	}

	/// Returns `true` when no patterns are configured.
	pub fn is_empty(&self) -> bool {
		self.patterns.is_empty()
	}

	/// Checks the URL's host and port against the configured patterns.
	pub fn permits(&self, url: &Url) -> bool {
		if self.patterns.is_empty() {
			return true;
		}

		let Some(host) = url.host_str() else {
			return false;
		};
		let host = host.to_ascii_lowercase();
		let port = url.port_or_known_default();

		self.patterns.iter().any(|pattern| pattern.matches(&host, port))
	}

	/// Convenience form of [`permits`](Self::permits) that parses the URL first; an unparsable
	/// URL never matches.
	pub fn permits_str(&self, url: &str) -> bool {
		Url::parse(url).map(|url| self.permits(&url)).unwrap_or(false)
	}
}

#[derive(Clone, Debug)]
struct DomainPattern {
	host: String,
	port: Option<u16>,
	wildcard: bool,
}
impl DomainPattern {
	fn parse(raw: &str) -> Result<Self, ConfigError> {
		let raw = raw.trim();

		if raw.is_empty() {
			return Err(ConfigError::EmptyAllowPattern);
		}

		// Split on the colon only when it is the pattern's sole colon; entries with several
		// colons (IPv6-like or otherwise malformed) are treated as whole-host literals.
		let (host, port) = match (raw.match_indices(':').count(), raw.rsplit_once(':')) {
			(1, Some((host, port))) => {
				let port = port
					.parse::<u16>()
					.map_err(|_| ConfigError::InvalidAllowPort { pattern: raw.into() })?;

				(host, Some(port))
			},
			_ => (raw, None),
		};
		let (wildcard, host) = match host.strip_prefix("*.") {
			Some(suffix) if !suffix.is_empty() => (true, suffix),
			Some(_) => return Err(ConfigError::EmptyAllowPattern),
			None => (false, host),
		};

		if host.is_empty() {
			return Err(ConfigError::EmptyAllowPattern);
		}

		Ok(Self { host: host.to_ascii_lowercase(), port, wildcard })
	}

	fn matches(&self, host: &str, port: Option<u16>) -> bool {
		let host_matches = if self.wildcard {
			host == self.host
				|| host
					.strip_suffix(&self.host)
					.map(|prefix| prefix.ends_with('.'))
					.unwrap_or(false)
		} else {
			host == self.host
		};

		if !host_matches {
			return false;
		}

		match self.port {
			Some(expected) => port == Some(expected),
			None => true,
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn allow(patterns: &[&str]) -> AllowList {
		AllowList::new(patterns).expect("Test patterns should be valid.")
	}

	#[test]
	fn empty_list_admits_everything() {
		let list = allow(&[]);

		assert!(list.permits_str("https://anywhere.example.org/path"));
	}

	#[test]
	fn wildcard_matches_suffix_domain_and_subdomains() {
		let list = allow(&["*.example.com"]);

		assert!(list.permits_str("https://example.com/"));
		assert!(list.permits_str("https://api.example.com/v1"));
		assert!(list.permits_str("https://a.b.example.com/"));
		assert!(!list.permits_str("https://example.com.evil.com/"));
		assert!(!list.permits_str("https://badexample.com/"));
	}

	#[test]
	fn exact_pattern_requires_hostname_equality() {
		let list = allow(&["api.example.com"]);

		assert!(list.permits_str("https://api.example.com/"));
		assert!(!list.permits_str("https://www.api.example.com/"));
		assert!(!list.permits_str("https://example.com/"));
	}

	#[test]
	fn port_pattern_pins_the_port() {
		let list = allow(&["localhost:5173"]);

		assert!(list.permits_str("http://localhost:5173/app"));
		assert!(!list.permits_str("http://localhost:4000/app"));
		assert!(!list.permits_str("http://localhost/app"));
		assert!(!list.permits_str("http://remotehost:5173/app"));
	}

	#[test]
	fn portless_pattern_admits_any_port() {
		let list = allow(&["localhost"]);

		assert!(list.permits_str("http://localhost/"));
		assert!(list.permits_str("http://localhost:5173/"));
	}

	#[test]
	fn multi_colon_patterns_are_whole_host_literals() {
		// Never misparsed into host + port; such an entry simply cannot match a hostname.
		let list = AllowList::new(["a:b:c", "api.example.com"])
			.expect("Multi-colon entries are accepted as literals.");

		assert!(list.permits_str("https://api.example.com/"));
		assert!(!list.permits_str("https://a/"));
	}

	#[test]
	fn malformed_patterns_fail_fast() {
		assert!(matches!(AllowList::new([""]), Err(ConfigError::EmptyAllowPattern)));
		assert!(matches!(AllowList::new(["*."]), Err(ConfigError::EmptyAllowPattern)));
		assert!(matches!(
			AllowList::new(["localhost:http"]),
			Err(ConfigError::InvalidAllowPort { .. }),
		));
	}

	#[test]
	fn unparsable_urls_never_match() {
		let list = allow(&["api.example.com"]);

		assert!(!list.permits_str("not a url"));
		assert!(!list.permits_str(""));
	}

	#[test]
	fn matching_is_case_insensitive_on_hosts() {
		let list = allow(&["*.Example.COM"]);

		assert!(list.permits_str("https://API.example.com/"));
	}
}
