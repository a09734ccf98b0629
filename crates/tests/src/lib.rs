//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 配置 -> 工厂 -> 分发 的端到端测试（文件、HTTP、队列）

#[cfg(test)]
mod contract_tests {
    use contracts::{FailureRecord, Record, SinkError};

    #[test]
    fn test_contracts_compile() {
        // 验证 contracts crate 可编译
        let _ = contracts::ConfigVersion::V1;
    }

    #[test]
    fn test_failure_record_snapshot() {
        let failure = FailureRecord::new(
            Record::from_line(r#"{"id":7}"#),
            SinkError::transport("api", "connection refused"),
            None,
        );
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "data": {"id": 7},
                "error": {
                    "kind": "transport",
                    "sink": "api",
                    "message": failure.error.to_string(),
                },
                "trace": null,
            })
        );
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashSet;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{BatchError, PipelineBlueprint, Record, SinkError};
    use dispatcher::client::MemoryBroker;
    use dispatcher::{create_sink, QueueSink, QueueSinkConfig, Sink, SinkDispatcher};
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpListener;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn load(toml: &str) -> PipelineBlueprint {
        ConfigLoader::load_from_str(toml, ConfigFormat::Toml).unwrap()
    }

    fn records(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| Record::from_line(&format!(r#"{{"id":{i}}}"#)))
            .collect()
    }

    /// End-to-end test: config -> factory -> dispatcher -> file
    #[tokio::test]
    async fn test_e2e_file_sink_single_mode() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out").join("records.jsonl");
        let blueprint = load(&format!(
            r#"
[[sinks]]
name = "archive"
sink_type = "file"
[sinks.params]
path = "{}"
"#,
            out.display()
        ));

        let sink = create_sink(&blueprint.sinks[0]).await.unwrap();
        let mut dispatcher = SinkDispatcher::new(sink);
        for record in records(3) {
            assert!(dispatcher.handle(record).await.is_delivered());
        }
        dispatcher.close().await.unwrap();

        // Output after close is isolated into a failure record
        let delivery = dispatcher.handle(Record::from_line("late")).await;
        let failure = delivery.into_failure().unwrap();
        assert!(matches!(failure.error, SinkError::Closed { .. }));

        let snapshot = dispatcher.metrics().snapshot();
        assert_eq!(snapshot.delivered_count, 3);
        assert_eq!(snapshot.failed_count, 1);

        let content = std::fs::read_to_string(&out).unwrap();
        assert_eq!(content, "{\"id\":0}\n{\"id\":1}\n{\"id\":2}\n");
    }

    /// End-to-end test: config -> factory -> HTTP batch with partial failure
    #[tokio::test]
    async fn test_e2e_http_batch_partial_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ingest"))
            .and(body_json(serde_json::json!({"id": 1})))
            .respond_with(ResponseTemplate::new(500))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/ingest"))
            .and(body_json(serde_json::json!({"id": 3})))
            .respond_with(ResponseTemplate::new(422))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/ingest"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&server)
            .await;

        let blueprint = load(&format!(
            r#"
[dispatch]
mode = "batch"
batch_size = 5

[[sinks]]
name = "api"
sink_type = "http"
[sinks.headers]
"Content-Type" = "application/json"
[sinks.params]
url = "{}/ingest"
method = "POST"
timeout_ms = "2000"
"#,
            server.uri()
        ));

        let sink = create_sink(blueprint.sink("api").unwrap()).await.unwrap();
        let mut dispatcher = SinkDispatcher::new(sink);
        let batch = records(5);

        let err = dispatcher.handle_many(&batch).await.unwrap_err();
        let BatchError::Aggregate(aggregate) = err else {
            panic!("expected aggregate failure, got {err:?}");
        };
        assert_eq!(aggregate.total(), 5);
        assert_eq!(aggregate.succeeded(), 3);

        let failed: Vec<&Record> = aggregate.failed_records().collect();
        assert_eq!(failed, vec![&batch[1], &batch[3]]);
        for failure in aggregate.failures() {
            assert!(matches!(failure.error, SinkError::Rejected { .. }));
        }

        let snapshot = dispatcher.metrics().snapshot();
        assert_eq!(snapshot.delivered_count, 3);
        assert_eq!(snapshot.failed_count, 2);
        assert_eq!(snapshot.batch_count, 1);
        dispatcher.close().await.unwrap();
    }

    /// End-to-end test: config -> factory -> TCP line broker
    #[tokio::test]
    async fn test_e2e_queue_sink_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let broker = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut lines = BufReader::new(socket).lines();
            let mut received = Vec::new();
            while let Some(line) = lines.next_line().await.unwrap() {
                received.push(line);
            }
            received
        });

        let blueprint = load(&format!(
            r#"
[[sinks]]
name = "events"
sink_type = "queue"
[sinks.params]
server = "tcp://{addr}"
topic = "records"
"#
        ));

        let sink = create_sink(&blueprint.sinks[0]).await.unwrap();
        let mut dispatcher = SinkDispatcher::new(sink);
        assert!(dispatcher.handle(Record::from_line("first")).await.is_delivered());
        dispatcher.handle_many(&records(2)).await.unwrap();
        dispatcher.close().await.unwrap();

        let received = broker.await.unwrap();
        assert_eq!(
            received,
            vec!["records\tfirst", "records\t{\"id\":0}", "records\t{\"id\":1}"]
        );
    }

    /// Queue bulk failure fails the whole batch without attribution
    #[tokio::test]
    async fn test_e2e_queue_bulk_failure() {
        let blueprint = load(
            r#"
[[sinks]]
name = "events"
sink_type = "queue"
[sinks.params]
server = "memory://local"
topic = "records"
"#,
        );

        let broker = MemoryBroker::new();
        let config = QueueSinkConfig::from_params(&blueprint.sinks[0]).unwrap();
        let sink = QueueSink::connect("events", config, &broker).await.unwrap();
        let mut dispatcher = SinkDispatcher::new(sink);

        dispatcher.handle_many(&records(3)).await.unwrap();
        assert_eq!(broker.messages("records").len(), 3);
        assert_eq!(broker.publish_calls(), 1);

        broker.fail_publishes("broker unavailable");
        let err = dispatcher.handle_many(&records(2)).await.unwrap_err();
        assert!(matches!(err, BatchError::Sink(SinkError::Publish { .. })));
        assert_eq!(err.failed_count(2), 2);

        let snapshot = dispatcher.metrics().snapshot();
        assert_eq!(snapshot.delivered_count, 3);
        assert_eq!(snapshot.failed_count, 2);
        dispatcher.close().await.unwrap();
    }

    /// Every configured sink type can be built and closed from one blueprint
    #[tokio::test]
    async fn test_e2e_all_local_sinks_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let blueprint = load(&format!(
            r#"
[[sinks]]
name = "txt"
sink_type = "file"
[sinks.params]
path = "{txt}"

[[sinks]]
name = "rows"
sink_type = "csv"
[sinks.params]
path = "{csv}"
delimiter = ";"

[[sinks]]
name = "stdout"
sink_type = "console"

[[sinks]]
name = "events"
sink_type = "log"

[[sinks]]
name = "devnull"
sink_type = "null"
"#,
            txt = dir.path().join("out.txt").display(),
            csv = dir.path().join("out.csv").display(),
        ));

        let mut names = HashSet::new();
        for config in &blueprint.sinks {
            let mut sink = create_sink(config).await.unwrap();
            assert_eq!(sink.sink_type(), config.sink_type);
            sink.output_many(&records(2)).await.unwrap();
            sink.close().await.unwrap();
            sink.close().await.unwrap();
            names.insert(sink.name().to_string());
        }
        assert_eq!(names.len(), 5);

        let csv = std::fs::read_to_string(dir.path().join("out.csv")).unwrap();
        assert_eq!(csv.lines().count(), 2);
    }
}
