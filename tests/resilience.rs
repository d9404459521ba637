mod common;

use std::sync::Arc;

use common::{payload, reference_artifact, LevelCounter, RecordingSink};
use fraud_detector::error::{MessageError, PipelineError, Rejection};
use fraud_detector::models::LoadedModel;
use fraud_detector::pipeline::{Pipeline, StopReason};
use fraud_detector::{Decision, LogSink, Scorer};
use futures::StreamExt;
use tracing::Level;

fn reference_model() -> Arc<LoadedModel> {
    Arc::new(LoadedModel::Forest(reference_artifact().clone()))
}

#[tokio::test]
async fn test_malformed_payload_is_logged_once_and_skipped() {
    let counter = LevelCounter::default();
    let pipeline = Pipeline::new(reference_model(), Scorer::default(), LogSink)
        .with_logger(counter.dispatch());

    let messages = futures::stream::iter(vec![
        payload("{this is not json"),
        payload(r#"{"id":"t1","userId":"u1","amount":55}"#),
    ]);
    let result = pipeline.run(messages, futures::future::pending()).await;

    assert!(matches!(result, Err(PipelineError::TransportClosed)));
    assert_eq!(counter.count(Level::WARN), 1);

    let snapshot = pipeline.metrics().snapshot();
    assert_eq!(snapshot.received, 2);
    assert_eq!(snapshot.decode_failures, 1);
    assert_eq!(snapshot.decisions(), 1);
    assert_eq!(snapshot.normal, 1);
}

#[tokio::test]
async fn test_every_kind_of_bad_input_is_survived() {
    let pipeline = Pipeline::new(reference_model(), Scorer::default(), RecordingSink::default());

    let messages = futures::stream::iter(vec![
        payload(""),
        payload("[1, 2, 3]"),
        payload(r#""just a string""#),
        payload(r#"{"id":"n1","amount":null}"#),
        payload(r#"{"id":"n2","amount":"twelve"}"#),
        payload(r#"{"id":"n3","amount":{"value":5}}"#),
        payload(r#"{"id":"ok","userId":"u9","amount":49.5}"#),
    ]);
    let result = pipeline.run(messages, futures::future::pending()).await;
    assert!(matches!(result, Err(PipelineError::TransportClosed)));

    assert_eq!(
        pipeline.sink().decisions(),
        vec![(Some("ok".to_string()), Decision::Normal)]
    );
    let snapshot = pipeline.metrics().snapshot();
    assert_eq!(snapshot.received, 7);
    assert_eq!(snapshot.skipped(), 6);
}

#[tokio::test]
async fn test_skipped_message_carries_its_stage() {
    let pipeline = Pipeline::new(reference_model(), Scorer::default(), RecordingSink::default());

    let decode = pipeline.process(b"\xff\xfe").await.unwrap_err();
    assert_eq!(decode.error.stage(), "decode");
    assert!(decode.transaction.is_none());

    let rejected = pipeline
        .process(br#"{"id":"t3","userId":"u3"}"#)
        .await
        .unwrap_err();
    assert_eq!(rejected.error.stage(), "extract");
    assert!(matches!(
        rejected.error,
        MessageError::Rejected(Rejection::MissingAmount)
    ));
    assert_eq!(
        rejected.transaction.and_then(|tx| tx.user_id),
        Some("u3".to_string())
    );
    assert!(pipeline.sink().decisions().is_empty());
}

#[tokio::test]
async fn test_shutdown_between_messages_keeps_counts() {
    let pipeline = Pipeline::new(reference_model(), Scorer::default(), RecordingSink::default());
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let messages = futures::stream::iter(vec![
        payload(r#"{"id":"t1","amount":55}"#),
        payload(r#"{"id":"t2","amount":600}"#),
    ])
    .chain(futures::stream::pending());

    let run = pipeline.run(Box::pin(messages), async {
        let _ = rx.await;
    });
    let stop = async {
        // Give the loop a chance to drain both messages first.
        while pipeline.metrics().snapshot().received < 2 {
            tokio::task::yield_now().await;
        }
        let _ = tx.send(());
    };

    let (summary, ()) = tokio::join!(run, stop);
    let summary = summary.unwrap();

    assert_eq!(summary.reason, StopReason::Shutdown);
    assert_eq!(summary.metrics.normal, 1);
    assert_eq!(summary.metrics.anomalies, 1);
}

#[tokio::test]
async fn test_unrelated_snake_case_field_does_not_block_decision() {
    let pipeline = Pipeline::new(reference_model(), Scorer::default(), RecordingSink::default());

    let decision = pipeline
        .process(br#"{"id":"t1","userId":"u1","user_id":"legacy","amount":55}"#)
        .await
        .unwrap();

    assert_eq!(decision, Decision::Normal);
    assert_eq!(
        pipeline.sink().emitted.lock().unwrap()[0].1.user_id.as_deref(),
        Some("u1")
    );
}
