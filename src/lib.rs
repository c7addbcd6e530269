//! Client-side token vault—keep access tokens inside an isolated task and broker authenticated
//! requests over a correlation-id message protocol.
//!
//! The hosting application never holds an access token: the vault task is the sole owner of
//! token state, and the [`host::Broker`](host::Broker) handle reaches it only through typed,
//! correlation-id-tagged message envelopes.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod allowlist;
pub mod auth;
pub mod error;
pub mod form;
pub mod host;
pub mod obs;
pub mod protocol;
pub mod provider;
pub mod store;
pub mod transport;
pub mod vault;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// crates.io
	use serde_json::Value;
	use tokio::{sync::oneshot, time::Instant};
	// self
	use crate::{
		auth::TokenInfo,
		host::{Broker, BrokerBuilder, BrokerConfig},
		protocol::{FetchRequest, HttpMethod},
		provider::{Provider, ProviderFuture},
		store::MemoryStore,
		transport::{HttpTransport, RawRequest, RawResponse, TransportFuture},
	};

	/// Scripted provider whose `refresh` hands out sequentially numbered tokens and counts
	/// invocations, so tests can assert the single-flight property.
	#[derive(Debug, Default)]
	pub struct CountingProvider {
		refreshes: AtomicUsize,
	}
	impl CountingProvider {
		/// Returns the number of `refresh` calls observed so far.
		pub fn refresh_calls(&self) -> usize {
			self.refreshes.load(Ordering::SeqCst)
		}
	}
	impl Provider for CountingProvider {
		fn refresh<'a>(&'a self, _refresh_token: Option<&'a str>) -> ProviderFuture<'a, TokenInfo> {
			let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;

			Box::pin(async move {
				Ok(TokenInfo::default()
					.with_token(format!("token-{n}"))
					.with_refresh_token(format!("refresh-{n}"))
					.with_expires_at(OffsetDateTime::now_utc() + Duration::hours(1)))
			})
		}

		fn login<'a>(
			&'a self,
			_payload: Value,
			_url: Option<&'a Url>,
		) -> ProviderFuture<'a, TokenInfo> {
			Box::pin(async move {
				Ok(TokenInfo::default()
					.with_token("login-token")
					.with_refresh_token("login-refresh")
					.with_expires_at(OffsetDateTime::now_utc() + Duration::hours(1)))
			})
		}

		fn logout<'a>(&'a self, _payload: Option<Value>) -> ProviderFuture<'a, TokenInfo> {
			Box::pin(async move { Ok(TokenInfo::default()) })
		}
	}

	/// In-process transport that records each request with a receive timestamp and replies with a
	/// canned `200 OK`, letting queue tests observe backpressure spacing without a network.
	#[derive(Debug, Default)]
	pub struct RecordingTransport {
		requests: Mutex<Vec<(Instant, RawRequest)>>,
	}
	impl RecordingTransport {
		/// Returns the recorded `(instant, request)` pairs in arrival order.
		pub fn take_requests(&self) -> Vec<(Instant, RawRequest)> {
			std::mem::take(&mut *self.requests.lock())
		}
	}
	impl HttpTransport for RecordingTransport {
		fn execute(
			&self,
			request: RawRequest,
			_abort: Option<oneshot::Receiver<()>>,
		) -> TransportFuture<'_> {
			self.requests.lock().push((Instant::now(), request));

			Box::pin(async move {
				Ok(RawResponse {
					status: 200,
					content_type: Some("text/plain".into()),
					headers: BTreeMap::new(),
					body: b"ok".to_vec(),
				})
			})
		}
	}

	/// Builds a broker over the provided transport with an in-memory refresh-token store.
	pub fn build_test_broker<T>(
		config: BrokerConfig,
		provider: Arc<dyn Provider>,
		transport: Arc<T>,
	) -> (Broker, Arc<MemoryStore>)
	where
		T: HttpTransport,
	{
		let store = Arc::new(MemoryStore::default());
		let broker = BrokerBuilder::new(provider)
			.with_store(store.clone())
			.with_transport(transport)
			.with_config(config)
			.build()
			.expect("Test broker should build successfully.");

		(broker, store)
	}

	/// Shorthand for a GET request builder used across integration tests.
	pub fn get_request(url: impl Into<String>) -> FetchRequest {
		FetchRequest::new(HttpMethod::Get, url)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap, VecDeque},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")] pub use reqwest::Client as ReqwestClient;
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
#[cfg(test)] use vault_broker as _;
