//! Propagation engine tests against a real tracer and a memory sink.

use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, SystemTime};

use trace_propagation::propagation::engine::SERVER_MODE;
use trace_propagation::propagation::{decode, TraceId, TRACE_HEADER};
use trace_propagation::tracer::span::tags;
use trace_propagation::tracer::{SpanKind, TagValue};

mod common;

fn inbound(value: &str) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    headers.insert(TRACE_HEADER.to_string(), value.to_string());
    headers
}

const PEER: Option<IpAddr> = Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)));

#[tokio::test]
async fn missing_header_starts_fresh_root() {
    let t = common::test_tracer(true);
    let headers: HashMap<String, String> = HashMap::new();
    let started = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);

    let (span, context) = t
        .engine
        .begin_server_span(&headers, "/hello", "GET", PEER, started);
    assert!(span.identity().is_valid());
    assert!(span.identity().is_root());
    assert!(span.identity().sampled);
    assert_eq!(context.identity(), span.identity());

    t.engine
        .finish_server_span(span, 200, None, SystemTime::now());
    t.closer.close().await;

    let spans = t.sink.spans();
    assert_eq!(spans.len(), 1);
    let server = &spans[0];
    assert_eq!(server.kind, SpanKind::Server);
    assert_eq!(server.operation_name, "/hello");
    assert_eq!(server.tag(tags::HTTP_URL), Some(&TagValue::from("/hello")));
    assert_eq!(server.tag(tags::HTTP_METHOD), Some(&TagValue::from("GET")));
    assert_eq!(server.tag(tags::PEER_IPV4), Some(&TagValue::from("10.0.0.7")));
    assert_eq!(server.tag(tags::COMPONENT), Some(&TagValue::from("http-server")));
    assert_eq!(server.tag(tags::HTTP_STATUS_CODE), Some(&TagValue::Int(200)));
    assert_eq!(server.tag(tags::REQUEST_ERRORS), Some(&TagValue::from("")));
    assert_eq!(server.tag(tags::ERROR), None);
    assert_eq!(
        server.tag(tags::REQUEST_TIME),
        Some(&TagValue::from("2023-11-14T22:13:20Z"))
    );
    assert_eq!(server.tag(tags::SERVER_MODE), Some(&TagValue::from(SERVER_MODE)));
}

#[tokio::test]
async fn valid_header_continues_the_trace() {
    let t = common::test_tracer(true);
    let headers = inbound("abc123:1:0:1");

    let (span, _) = t
        .engine
        .begin_server_span(&headers, "/hello", "GET", None, SystemTime::now());
    let identity = span.identity().clone();

    assert_eq!(identity.trace_id, TraceId::from_hex("abc123").unwrap());
    assert_eq!(identity.trace_id.to_hex(), "0000000000abc123");
    assert_eq!(identity.parent_span_id.map(|id| id.as_u64()), Some(1));
    assert_ne!(identity.span_id.as_u64(), 1);

    t.engine.finish_server_span(span, 200, None, SystemTime::now());
    t.closer.close().await;
}

#[tokio::test]
async fn sampled_flag_is_inherited_from_the_header() {
    // The local sampler never samples; the inbound decision wins.
    let t = common::test_tracer(false);
    let headers = inbound("deadbeef:1:0:1");

    let (span, _) = t
        .engine
        .begin_server_span(&headers, "/hello", "GET", None, SystemTime::now());
    assert_eq!(span.identity().trace_id, TraceId::from_hex("deadbeef").unwrap());
    assert!(span.identity().sampled);

    t.engine.finish_server_span(span, 200, None, SystemTime::now());
    t.closer.close().await;
    assert_eq!(t.sink.len(), 1);
}

#[tokio::test]
async fn malformed_header_starts_new_root() {
    let t = common::test_tracer(true);
    let headers = inbound("not-a-trace");

    let (span, _) = t
        .engine
        .begin_server_span(&headers, "/hello", "GET", None, SystemTime::now());
    assert!(span.identity().is_valid());
    assert!(span.identity().is_root());

    t.engine.finish_server_span(span, 200, None, SystemTime::now());
    t.closer.close().await;
}

#[tokio::test]
async fn server_errors_are_flagged() {
    let t = common::test_tracer(true);
    let headers: HashMap<String, String> = HashMap::new();

    let (failed, _) = t
        .engine
        .begin_server_span(&headers, "/a", "GET", None, SystemTime::now());
    t.engine.finish_server_span(failed, 503, None, SystemTime::now());

    let (annotated, _) = t
        .engine
        .begin_server_span(&headers, "/b", "GET", None, SystemTime::now());
    t.engine
        .finish_server_span(annotated, 200, Some("downstream failed"), SystemTime::now());

    let (cancelled, _) = t
        .engine
        .begin_server_span(&headers, "/c", "GET", None, SystemTime::now());
    t.engine
        .cancel_server_span(cancelled, "request cancelled", SystemTime::now());

    t.closer.close().await;
    let spans = t.sink.spans();
    assert_eq!(spans.len(), 3);
    for span in &spans {
        assert_eq!(span.tag(tags::ERROR), Some(&TagValue::Bool(true)));
    }
    let by_name = |name: &str| spans.iter().find(|s| s.operation_name == name).unwrap();
    assert_eq!(
        by_name("/b").tag(tags::REQUEST_ERRORS),
        Some(&TagValue::from("downstream failed"))
    );
    assert_eq!(
        by_name("/c").tag(tags::REQUEST_CANCELLED),
        Some(&TagValue::Bool(true))
    );
}

#[tokio::test]
async fn client_spans_are_children_and_finish_once() {
    const CALLS: usize = 5;
    let t = common::test_tracer(true);
    let inbound_headers: HashMap<String, String> = HashMap::new();

    let (server, context) = t.engine.begin_server_span(
        &inbound_headers,
        "/ping",
        "GET",
        None,
        SystemTime::now(),
    );

    for _ in 0..CALLS {
        let mut outbound: HashMap<String, String> = HashMap::new();
        let span = t.engine.begin_client_span(
            Some(&context),
            &mut outbound,
            "http://downstream:8081/hello",
            "GET",
            SystemTime::now(),
        );

        let injected = decode(&outbound).unwrap();
        assert_eq!(injected.trace_id, context.trace_id());
        assert_eq!(injected.parent_span_id, Some(context.identity().span_id));
        assert_eq!(&injected.span_id, &span.identity().span_id);

        t.engine
            .finish_client_span_with_outcome(span, Some(200), None, SystemTime::now());
    }
    t.engine.finish_server_span(server, 200, None, SystemTime::now());
    t.closer.close().await;

    let spans = t.sink.spans();
    assert_eq!(spans.len(), CALLS + 1);

    let ids: HashSet<_> = spans.iter().map(|s| s.identity.span_id).collect();
    assert_eq!(ids.len(), spans.len(), "every span reported exactly once");

    let clients: Vec<_> = spans.iter().filter(|s| s.kind == SpanKind::Client).collect();
    assert_eq!(clients.len(), CALLS);
    for client in clients {
        assert_eq!(client.identity.trace_id, context.trace_id());
        assert_eq!(client.operation_name, "/hello");
        assert_eq!(client.tag(tags::PEER_HOSTNAME), Some(&TagValue::from("downstream")));
        assert_eq!(client.tag(tags::PEER_PORT), Some(&TagValue::Int(8081)));
        assert_eq!(client.tag(tags::COMPONENT), Some(&TagValue::from("http-client")));
    }
}

#[tokio::test]
async fn client_span_without_parent_is_noop() {
    let t = common::test_tracer(true);
    let mut outbound: HashMap<String, String> = HashMap::new();
    outbound.insert("accept".to_string(), "application/json".to_string());
    let before = outbound.clone();

    let span = t.engine.begin_client_span(
        None,
        &mut outbound,
        "http://downstream:8081/hello",
        "GET",
        SystemTime::now(),
    );
    assert!(!span.is_recording());
    assert_eq!(outbound, before);

    t.engine.finish_client_span(span, SystemTime::now());
    t.closer.close().await;
    assert!(t.sink.is_empty());
}

#[tokio::test]
async fn unparsable_port_tags_hostname_only() {
    let t = common::test_tracer(true);
    let (server, context) = t.engine.begin_server_span(
        &HashMap::<String, String>::new(),
        "/ping",
        "GET",
        None,
        SystemTime::now(),
    );

    let mut outbound: HashMap<String, String> = HashMap::new();
    let span = t.engine.begin_client_span(
        Some(&context),
        &mut outbound,
        "http://downstream:notaport/hello",
        "GET",
        SystemTime::now(),
    );
    assert!(decode(&outbound).is_ok());

    t.engine.finish_client_span(span, SystemTime::now());
    t.engine.finish_server_span(server, 200, None, SystemTime::now());
    t.closer.close().await;

    let client = t
        .sink
        .spans()
        .into_iter()
        .find(|s| s.kind == SpanKind::Client)
        .unwrap();
    assert_eq!(client.tag(tags::PEER_HOSTNAME), Some(&TagValue::from("downstream")));
    assert_eq!(client.tag(tags::PEER_PORT), None);
}

#[tokio::test]
async fn unsampled_traces_are_created_but_not_reported() {
    let t = common::test_tracer(false);
    let (server, context) = t.engine.begin_server_span(
        &HashMap::<String, String>::new(),
        "/ping",
        "GET",
        None,
        SystemTime::now(),
    );
    assert!(!context.identity().sampled);

    let mut outbound: HashMap<String, String> = HashMap::new();
    let client = t.engine.begin_client_span(
        Some(&context),
        &mut outbound,
        "http://downstream:8081/hello",
        "GET",
        SystemTime::now(),
    );
    assert!(client.is_recording());
    assert!(!decode(&outbound).unwrap().sampled);

    t.engine.finish_client_span(client, SystemTime::now());
    t.engine.finish_server_span(server, 200, None, SystemTime::now());
    t.facade.shutdown(t.closer).await;
    assert!(t.sink.is_empty());
}
