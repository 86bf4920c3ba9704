//! Outbound HTTP with client spans.
//!
//! # Responsibilities
//! - Start a client span for every outbound call and inject it into the
//!   request headers
//! - Finish the span with the call's outcome, including transport failures
//!
//! # Design Decisions
//! - Calls without an active span go out untraced and unmodified
//! - The span is held in a guard, so a dropped call future still reports it
//! - A trace header that is not a valid HTTP header is dropped, never turned
//!   into a failed call

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Response};
use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use crate::propagation::{ActiveSpanContext, PropagationEngine};
use crate::tracer::Span;

/// A reqwest client that propagates the active trace.
#[derive(Debug, Clone)]
pub struct TracedClient {
    client: Client,
    engine: PropagationEngine,
}

impl TracedClient {
    pub fn new(engine: PropagationEngine, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(engine, client))
    }

    pub fn with_client(engine: PropagationEngine, client: Client) -> Self {
        Self { client, engine }
    }

    pub async fn get(
        &self,
        parent: Option<&ActiveSpanContext>,
        url: &str,
    ) -> Result<Response, reqwest::Error> {
        self.send(parent, Method::GET, url).await
    }

    /// Send a body-less request to `url` as a child of `parent`.
    pub async fn send(
        &self,
        parent: Option<&ActiveSpanContext>,
        method: Method,
        url: &str,
    ) -> Result<Response, reqwest::Error> {
        let mut headers: HashMap<String, String> = HashMap::new();
        let span = self.engine.begin_client_span(
            parent,
            &mut headers,
            url,
            method.as_str(),
            SystemTime::now(),
        );
        let call = ClientCall {
            engine: &self.engine,
            span: Some(span),
        };

        let result = self
            .client
            .request(method, url)
            .headers(outbound_header_map(&headers))
            .send()
            .await;
        match &result {
            Ok(response) => call.finish(Some(response.status().as_u16()), None),
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "Outbound call failed");
                call.finish(e.status().map(|s| s.as_u16()), Some(&e.to_string()));
            }
        }
        result
    }
}

/// Trace headers that cannot be represented on the wire are left out; the
/// call itself always goes ahead.
fn outbound_header_map(headers: &HashMap<String, String>) -> HeaderMap {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => tracing::debug!(header = %name, "Skipping unrepresentable trace header"),
        }
    }
    map
}

struct ClientCall<'a> {
    engine: &'a PropagationEngine,
    span: Option<Span>,
}

impl ClientCall<'_> {
    fn finish(mut self, status_code: Option<u16>, error: Option<&str>) {
        if let Some(span) = self.span.take() {
            self.engine
                .finish_client_span_with_outcome(span, status_code, error, SystemTime::now());
        }
    }
}

impl Drop for ClientCall<'_> {
    fn drop(&mut self) {
        if let Some(span) = self.span.take() {
            self.engine.finish_client_span_with_outcome(
                span,
                None,
                Some("call cancelled"),
                SystemTime::now(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_trace_headers_are_skipped() {
        let headers: HashMap<String, String> = [
            ("uber-trace-id", "abc:1:0:1"),
            ("uberctx-bad key", "x"),
            ("uberctx-raw", "line\nbreak"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let map = outbound_header_map(&headers);
        assert_eq!(map.len(), 1);
        assert_eq!(map["uber-trace-id"], "abc:1:0:1");
    }
}
