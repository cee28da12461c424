//! Integration tests for the record-replay cycle

use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use rumqttc::QoS;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::time::Instant;

use mqtt2jsonl::error::ConnectFailure;
use mqtt2jsonl::network::{
    ConnectionManager, Endpoint, Transport, TransportEvent, MAX_PACKET_SIZE,
};
use mqtt2jsonl::recording::{RecordSummary, Recorder};
use mqtt2jsonl::replay::{DelayPolicy, Replayer};
use mqtt2jsonl::storage::{JsonlReader, LogRecord};
use mqtt2jsonl::{Mqtt2JsonlError, Result};

/// Something the in-memory bus does when asked for the next event
enum Step {
    /// Let time pass, then deliver a message
    Deliver {
        after: Duration,
        topic: &'static str,
        payload: &'static [u8],
    },
    /// Drop the connection
    Drop,
}

/// In-memory bus: scripted inbound steps, captured outbound publishes
#[derive(Default)]
struct MemoryBus {
    reachable: bool,
    steps: VecDeque<Step>,
    reconnects_fail: bool,
    subscribes: Vec<(String, QoS)>,
    published: Vec<(Instant, String, Value)>,
}

impl MemoryBus {
    fn reachable() -> Self {
        Self {
            reachable: true,
            ..Default::default()
        }
    }

    fn with_steps(steps: Vec<Step>) -> Self {
        Self {
            reachable: true,
            steps: steps.into(),
            ..Default::default()
        }
    }
}

fn refused() -> Mqtt2JsonlError {
    Mqtt2JsonlError::Connection {
        endpoint: "localhost:1883".to_string(),
        kind: ConnectFailure::Refused,
        detail: "connection refused".to_string(),
    }
}

impl Transport for MemoryBus {
    async fn connect(&mut self, _endpoint: &Endpoint) -> Result<()> {
        if self.reachable {
            Ok(())
        } else {
            Err(refused())
        }
    }

    async fn reconnect(&mut self) -> Result<()> {
        if self.reconnects_fail {
            Err(refused())
        } else {
            Ok(())
        }
    }

    async fn subscribe(&mut self, filter: &str, qos: QoS) -> Result<()> {
        self.subscribes.push((filter.to_string(), qos));
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: Bytes) -> Result<()> {
        let data: Value = serde_json::from_slice(&payload).unwrap();
        self.published.push((Instant::now(), topic.to_string(), data));
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        Ok(())
    }

    async fn next_event(&mut self) -> Result<TransportEvent> {
        match self.steps.pop_front() {
            Some(Step::Deliver {
                after,
                topic,
                payload,
            }) => {
                tokio::time::sleep(after).await;
                Ok(TransportEvent::Message {
                    topic: topic.to_string(),
                    payload: Bytes::from_static(payload),
                })
            }
            Some(Step::Drop) => Ok(TransportEvent::Disconnected { reason_code: 7 }),
            None => Ok(TransportEvent::Disconnected { reason_code: 0 }),
        }
    }
}

fn endpoint() -> Endpoint {
    Endpoint {
        host: "localhost".to_string(),
        port: 1883,
        keep_alive: Duration::from_secs(300),
        max_packet_size: MAX_PACKET_SIZE,
    }
}

fn deliver(after_ms: u64, topic: &'static str, payload: &'static [u8]) -> Step {
    Step::Deliver {
        after: Duration::from_millis(after_ms),
        topic,
        payload,
    }
}

fn read_log(path: &std::path::Path) -> Vec<LogRecord> {
    JsonlReader::open(path)
        .unwrap()
        .collect::<Result<Vec<_>>>()
        .unwrap()
}

async fn record(path: &std::path::Path, steps: Vec<Step>) -> RecordSummary {
    let mut recorder = Recorder::new(path, "#", false).unwrap();
    let mut manager = ConnectionManager::new(MemoryBus::with_steps(steps), endpoint());
    recorder.run(&mut manager).await.unwrap()
}

fn gaps(published: &[(Instant, String, Value)]) -> Vec<Duration> {
    published
        .windows(2)
        .map(|pair| pair[1].0.duration_since(pair[0].0))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_record_then_replay_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("session.jsonl");

    let summary = record(
        &path,
        vec![
            deliver(100, "t", br#"{"a":1}"#),
            deliver(250, "t", br#"{"a":1}"#),
            deliver(50, "other/topic", b"[1,2,3]"),
        ],
    )
    .await;
    assert_eq!(summary.recorded, 3);

    let replayer = Replayer::open(&path, DelayPolicy::Fixed(Duration::ZERO)).unwrap();
    let mut manager = ConnectionManager::new(MemoryBus::reachable(), endpoint());
    let result = replayer.run(&mut manager).await.unwrap();

    assert_eq!(result.published, 3);
    assert_eq!(result.dropped, 0);

    let published: Vec<(String, Value)> = manager
        .into_transport()
        .published
        .into_iter()
        .map(|(_, topic, data)| (topic, data))
        .collect();
    assert_eq!(
        published,
        vec![
            ("t".to_string(), json!({"a": 1})),
            ("t".to_string(), json!({"a": 1})),
            ("other/topic".to_string(), json!([1, 2, 3])),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_recorded_delays_match_arrival_gaps() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("session.jsonl");

    record(
        &path,
        vec![
            deliver(120, "a", b"1"),
            deliver(30, "b", b"2"),
            deliver(0, "c", b"3"),
            deliver(1500, "d", b"4"),
        ],
    )
    .await;

    let records = read_log(&path);
    let delays: Vec<u64> = records.iter().map(|r| r.time_delay).collect();
    assert_eq!(delays, vec![120, 30, 0, 1500]);

    let topics: Vec<&str> = records.iter().map(|r| r.topic.as_str()).collect();
    assert_eq!(topics, vec!["a", "b", "c", "d"]);
}

#[tokio::test(start_paused = true)]
async fn test_replay_reproduces_recorded_timing() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("session.jsonl");
    std::fs::write(
        &path,
        concat!(
            "{\"time_delay\":0,\"topic\":\"a\",\"data\":1}\n",
            "{\"time_delay\":200,\"topic\":\"b\",\"data\":2}\n",
            "{\"time_delay\":50,\"topic\":\"c\",\"data\":3}\n",
            "{\"time_delay\":1000,\"topic\":\"d\",\"data\":4}\n",
        ),
    )
    .unwrap();

    let replayer = Replayer::open(&path, DelayPolicy::Recorded).unwrap();
    let mut manager = ConnectionManager::new(MemoryBus::reachable(), endpoint());
    replayer.run(&mut manager).await.unwrap();

    // Each record's delay is slept after it is published
    let published = manager.into_transport().published;
    assert_eq!(
        gaps(&published),
        vec![
            Duration::from_millis(0),
            Duration::from_millis(200),
            Duration::from_millis(50),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_fixed_delay_overrides_recorded() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("session.jsonl");
    std::fs::write(
        &path,
        concat!(
            "{\"time_delay\":5000,\"topic\":\"a\",\"data\":1}\n",
            "{\"time_delay\":0,\"topic\":\"b\",\"data\":2}\n",
            "{\"time_delay\":300,\"topic\":\"c\",\"data\":3}\n",
        ),
    )
    .unwrap();

    let replayer = Replayer::open(&path, DelayPolicy::from_override_ms(Some(75))).unwrap();
    let mut manager = ConnectionManager::new(MemoryBus::reachable(), endpoint());

    let start = Instant::now();
    replayer.run(&mut manager).await.unwrap();

    assert_eq!(start.elapsed(), Duration::from_millis(3 * 75));
    let published = manager.into_transport().published;
    assert_eq!(
        gaps(&published),
        vec![Duration::from_millis(75), Duration::from_millis(75)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_malformed_line_stops_before_publish() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("session.jsonl");
    std::fs::write(
        &path,
        concat!(
            "{\"time_delay\":1,\"topic\":\"a\",\"data\":1}\n",
            "{\"time_delay\":1,\"topic\":\"b\",\"data\":2}\n",
            "this is not json\n",
            "{\"time_delay\":1,\"topic\":\"c\",\"data\":3}\n",
        ),
    )
    .unwrap();

    let replayer = Replayer::open(&path, DelayPolicy::Recorded).unwrap();
    let mut manager = ConnectionManager::new(MemoryBus::reachable(), endpoint());
    let err = replayer.run(&mut manager).await.unwrap_err();

    assert!(matches!(err, Mqtt2JsonlError::MalformedRecord { line: 3, .. }));
    let topics: Vec<String> = manager
        .transport()
        .published
        .iter()
        .map(|(_, topic, _)| topic.clone())
        .collect();
    assert_eq!(topics, vec!["a", "b"]);
}

#[tokio::test(start_paused = true)]
async fn test_replay_drops_when_broker_unreachable() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("session.jsonl");
    std::fs::write(
        &path,
        concat!(
            "{\"time_delay\":10,\"topic\":\"a\",\"data\":1}\n",
            "{\"time_delay\":10,\"topic\":\"b\",\"data\":2}\n",
        ),
    )
    .unwrap();

    let replayer = Replayer::open(&path, DelayPolicy::Recorded).unwrap();
    let mut manager = ConnectionManager::new(MemoryBus::default(), endpoint());
    let summary = replayer.run(&mut manager).await.unwrap();

    assert_eq!(summary.published, 0);
    assert_eq!(summary.dropped, 2);
    assert!(!manager.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_recording_survives_drop_and_skips_bad_payloads() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("session.jsonl");

    let mut recorder = Recorder::new(&path, "plant/#", false).unwrap();
    let bus = MemoryBus::with_steps(vec![
        deliver(10, "plant/a", b"{\"v\":1}"),
        Step::Drop,
        deliver(10, "plant/b", b"garbage"),
        deliver(10, "plant/c", b"{\"v\":3}"),
    ]);
    let mut manager = ConnectionManager::new(bus, endpoint());

    let summary = recorder.run(&mut manager).await.unwrap();
    assert_eq!(
        summary,
        RecordSummary {
            recorded: 2,
            skipped: 1
        }
    );

    // Subscribed on connect and again after the reconnect
    let bus = manager.into_transport();
    assert_eq!(
        bus.subscribes,
        vec![
            ("plant/#".to_string(), QoS::AtLeastOnce),
            ("plant/#".to_string(), QoS::AtLeastOnce),
        ]
    );

    let records = read_log(&path);
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].topic, "plant/c");
    // 1s reconnect backoff + two 10ms deliveries since the first record
    assert_eq!(records[1].time_delay, 1020);
}

#[tokio::test(start_paused = true)]
async fn test_recording_ends_when_reconnect_exhausted() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("session.jsonl");

    let mut recorder = Recorder::new(&path, "#", false).unwrap();
    let mut bus = MemoryBus::with_steps(vec![deliver(5, "a", b"1"), Step::Drop]);
    bus.reconnects_fail = true;
    let mut manager = ConnectionManager::new(bus, endpoint());

    let err = recorder.run(&mut manager).await.unwrap_err();
    assert!(matches!(
        err,
        Mqtt2JsonlError::ReconnectExhausted { attempts: 12 }
    ));
    assert_eq!(err.exit_code(), 2);
    assert!(manager.is_degraded());
    assert_eq!(read_log(&path).len(), 1);
}

#[tokio::test]
async fn test_record_unreachable_broker_fails() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("session.jsonl");

    let mut recorder = Recorder::new(&path, "#", false).unwrap();
    let mut manager = ConnectionManager::new(MemoryBus::default(), endpoint());

    let err = recorder.run(&mut manager).await.unwrap_err();
    assert_eq!(
        err.diagnostic(),
        "Error: Could not connect to localhost:1883, is the port correct?"
    );
    assert!(!path.exists());
}

#[tokio::test(start_paused = true)]
async fn test_force_overwrite_replaces_previous_recording() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("session.jsonl");
    std::fs::write(&path, "{\"time_delay\":1,\"topic\":\"old\",\"data\":0}\n").unwrap();

    assert!(matches!(
        Recorder::new(&path, "#", false),
        Err(Mqtt2JsonlError::ExistingFile(_))
    ));

    let mut recorder = Recorder::new(&path, "#", true).unwrap();
    let mut manager = ConnectionManager::new(
        MemoryBus::with_steps(vec![deliver(1, "new", b"true")]),
        endpoint(),
    );
    recorder.run(&mut manager).await.unwrap();

    let records = read_log(&path);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].topic, "new");
}
