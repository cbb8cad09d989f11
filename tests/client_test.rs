//! End-to-end client tests against in-memory exporters.

mod common;

use common::{recording_client, test_config};
use opentelemetry::KeyValue;
use opentelemetry::trace::Status;
use std::panic::{AssertUnwindSafe, catch_unwind};
use telemetryflow::{
    SpanError, SpanKind, TelemetryClient, TelemetryError,
};

#[test]
fn test_full_lifecycle_scenario() {
    let (client, _factory) = recording_client();

    assert!(!client.is_initialized());
    client.initialize().unwrap();
    assert!(client.is_initialized());

    client.increment_counter("x").unwrap();

    let status = client.status();
    assert!(status.initialized);
    assert_eq!(status.metrics_sent, 1);
    assert_eq!(status.service_name, "test-service");

    let summary = client.shutdown().unwrap();
    assert!(summary.is_complete());
    assert!(!client.is_initialized());

    // A second shutdown is a safe no-op.
    client.shutdown().unwrap();

    // The same recording call that worked above now fails.
    let err = client.increment_counter("x").unwrap_err();
    assert!(matches!(err, TelemetryError::NotInitialized));
}

#[test]
fn test_recording_before_initialize_fails() {
    let (client, _factory) = recording_client();

    assert!(matches!(
        client.increment_counter("x").unwrap_err(),
        TelemetryError::NotInitialized
    ));
    assert!(matches!(
        client.log_info("hello").unwrap_err(),
        TelemetryError::NotInitialized
    ));
    assert!(matches!(
        client.start_span("op", SpanKind::Internal, Vec::new()).unwrap_err(),
        TelemetryError::NotInitialized
    ));
}

#[test]
fn test_double_initialize_fails() {
    let (client, _factory) = recording_client();
    client.initialize().unwrap();

    let err = client.initialize().unwrap_err();
    assert!(matches!(err, TelemetryError::AlreadyInitialized));
}

#[test]
fn test_manual_span_lifecycle_exports() {
    let (client, factory) = recording_client();
    client.initialize().unwrap();

    let span_id = client
        .start_span(
            "handle_request",
            SpanKind::Server,
            vec![KeyValue::new("http.method", "GET")],
        )
        .unwrap();
    client
        .add_span_event(span_id.clone(), "checkpoint", Vec::new())
        .unwrap();
    client.end_span(span_id).unwrap();

    let spans = factory.span_exporter.get_finished_spans().unwrap();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].name, "handle_request");
    assert_eq!(spans[0].status, Status::Ok);
}

#[test]
fn test_end_span_with_error_marks_status() {
    let (client, factory) = recording_client();
    client.initialize().unwrap();

    let span_id = client
        .start_span("failing_op", SpanKind::Internal, Vec::new())
        .unwrap();
    client
        .end_span_with_error(span_id, SpanError::new("io", "connection reset"))
        .unwrap();

    let spans = factory.span_exporter.get_finished_spans().unwrap();
    assert_eq!(spans.len(), 1);
    assert!(matches!(spans[0].status, Status::Error { .. }));
    assert!(
        spans[0]
            .attributes
            .iter()
            .any(|kv| kv.key.as_str() == "exception.message")
    );
}

#[test]
fn test_span_scope_ends_on_drop() {
    let (client, factory) = recording_client();
    client.initialize().unwrap();

    {
        let span = client.span("scoped_op", SpanKind::Internal).unwrap();
        span.add_event("checkpoint", Vec::new()).unwrap();
        assert_eq!(client.active_span_count(), 1);
    }

    assert_eq!(client.active_span_count(), 0);
    let spans = factory.span_exporter.get_finished_spans().unwrap();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].status, Status::Ok);
}

#[test]
fn test_span_scope_records_error() {
    let (client, factory) = recording_client();
    client.initialize().unwrap();

    {
        let mut span = client.span("failing_scope", SpanKind::Internal).unwrap();
        span.record_error(SpanError::new("validation", "bad input"));
    }

    let spans = factory.span_exporter.get_finished_spans().unwrap();
    assert_eq!(spans.len(), 1);
    assert!(matches!(spans[0].status, Status::Error { .. }));
}

#[test]
fn test_span_scope_panic_ends_span_with_error_once() {
    let (client, factory) = recording_client();
    client.initialize().unwrap();

    let result = catch_unwind(AssertUnwindSafe(|| {
        let _span = client.span("panicking_scope", SpanKind::Internal).unwrap();
        panic!("boom");
    }));
    assert!(result.is_err());

    // The span ended exactly once, in error state, and its id is gone from
    // the registry.
    assert_eq!(client.active_span_count(), 0);
    let spans = factory.span_exporter.get_finished_spans().unwrap();
    assert_eq!(spans.len(), 1);
    assert!(matches!(spans[0].status, Status::Error { .. }));
}

#[test]
fn test_span_scope_explicit_end() {
    let (client, factory) = recording_client();
    client.initialize().unwrap();

    let span = client.span("explicit_end", SpanKind::Client).unwrap();
    span.end().unwrap();

    assert_eq!(client.active_span_count(), 0);
    assert_eq!(factory.span_exporter.get_finished_spans().unwrap().len(), 1);
}

#[test]
fn test_logs_are_emitted() {
    let (client, factory) = recording_client();
    client.initialize().unwrap();

    client.log_info("starting up").unwrap();
    client
        .log(
            "request rejected",
            telemetryflow::Severity::Warn,
            vec![KeyValue::new("code", 429_i64)],
        )
        .unwrap();

    assert_eq!(client.status().logs_sent, 2);
    assert_eq!(factory.log_exporter.get_emitted_logs().unwrap().len(), 2);
}

#[test]
fn test_metrics_surface() {
    let (client, _factory) = recording_client();
    client.initialize().unwrap();

    client.increment_counter("requests").unwrap();
    client
        .record_counter("requests", 4, vec![KeyValue::new("route", "/health")])
        .unwrap();
    client.record_gauge("queue.depth", 17.0, Vec::new()).unwrap();
    client
        .record_histogram("latency", 12.5, "ms", Vec::new())
        .unwrap();
    client.record_metric("load", 0.4, "", Vec::new()).unwrap();

    assert_eq!(client.status().metrics_sent, 5);
}

#[test]
fn test_flush_summary_is_complete() {
    let (client, _factory) = recording_client();
    client.initialize().unwrap();

    client.increment_counter("x").unwrap();
    let summary = client.flush().unwrap();
    assert!(summary.is_complete());
}

#[test]
fn test_guard_initializes_and_shuts_down() {
    let (client, factory) = recording_client();

    {
        let guard = client.into_guard().unwrap();
        assert!(guard.is_initialized());
        let span = guard.span("guarded_op", SpanKind::Internal).unwrap();
        span.end().unwrap();
    }

    // The guard's drop flushed and shut the pipelines down.
    let spans = factory.span_exporter.get_finished_spans().unwrap();
    assert_eq!(spans.len(), 1);
}

#[test]
fn test_status_before_initialize() {
    let client = TelemetryClient::new(test_config());

    let status = client.status();
    assert!(!status.initialized);
    assert!(status.uptime.is_none());
    assert_eq!(status.endpoint, "localhost:4317");
}
