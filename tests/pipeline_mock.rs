use chrono::{DateTime, Duration, TimeZone, Utc};
use roadwatch::alert::notifier::RecordingNotifier;
use roadwatch::camera::{Camera, parse_registry};
use roadwatch::fetch::mock::{MockImageSource, MockResponse, noise_frame, split_frame};
use roadwatch::fetch::{FetchPolicy, ImageFetcher};
use roadwatch::incident_log::MemoryIncidentLog;
use roadwatch::metrics::MetricExtractor;
use roadwatch::pacer::RecordingPacer;
use roadwatch::pipeline::{CameraOrchestrator, Collaborators, PipelineSettings, RunSummary};
use roadwatch::risk::IncidentType;
use roadwatch::state::CameraState;
use roadwatch::store::{FileStateStore, MemoryStateStore, StateStore};
use std::time::{SystemTime, UNIX_EPOCH};

const REGISTRY: &str = r#"
cameras:
  - id: 218
    name: Malahat Summit
    highway: 1
    image_url: https://cams.test/218.jpg
  - drivebc_id: 612
    name: Sooke Road
    highway: "14"
    url: https://cams.test/612.jpg
  - name: Colwood Crawl
    highway: 1A
"#;

/// 13:00 local time in Vancouver.
fn midday() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 20, 0, 0).unwrap()
}

fn stalled() -> Result<Vec<MockResponse>, image::ImageError> {
    let frame = split_frame(64, 48, 20, 220)?;
    Ok(vec![MockResponse::Bytes(frame.clone()), MockResponse::Bytes(frame)])
}

fn moving(seed: u32) -> Result<Vec<MockResponse>, image::ImageError> {
    Ok(vec![
        MockResponse::Bytes(noise_frame(64, 48, seed)?),
        MockResponse::Bytes(noise_frame(64, 48, seed + 1)?),
    ])
}

fn settings() -> PipelineSettings {
    PipelineSettings {
        extractor: MetricExtractor::new(64),
        ..PipelineSettings::default()
    }
}

fn run(
    cameras: &[Camera],
    script: Vec<MockResponse>,
    store: &dyn StateStore,
    notifier: &RecordingNotifier,
    log: &MemoryIncidentLog,
    now: DateTime<Utc>,
) -> RunSummary {
    let pacer = RecordingPacer::new();
    let mut orchestrator = CameraOrchestrator::new(
        ImageFetcher::new(MockImageSource::new(script), FetchPolicy::default()),
        settings(),
        Collaborators {
            store,
            notifier,
            incident_log: log,
            pacer: &pacer,
        },
    );
    orchestrator.run_once_at(cameras, now)
}

#[test]
fn run_processes_every_camera_and_isolates_failures() -> Result<(), Box<dyn std::error::Error>> {
    let cameras = parse_registry(REGISTRY)?;
    let store = MemoryStateStore::new();
    let notifier = RecordingNotifier::new();
    let log = MemoryIncidentLog::new();

    let mut script = stalled()?;
    script.extend(moving(7)?);
    let summary = run(&cameras, script, &store, &notifier, &log, midday());

    assert_eq!(
        summary,
        RunSummary {
            processed: 2,
            skipped: 1,
            alerted: 1,
            notify_failures: 0,
        }
    );

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].camera_id, "218");
    assert_eq!(sent[0].incident, IncidentType::BlockedOrClosedLane);
    assert_eq!(sent[0].risk, 90.0);

    let records = log.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].camera, "Malahat Summit");
    assert!(records[0].alerted);
    assert_eq!(records[1].camera_id, "612");
    assert_eq!(records[1].incident_type, None);
    assert!(!records[1].alerted);
    assert!(store.get("Colwood_Crawl").is_none());
    Ok(())
}

#[test]
fn repeated_incident_respects_cooldown_across_runs() -> Result<(), Box<dyn std::error::Error>> {
    let cameras = parse_registry(REGISTRY)?;
    let first_camera = &cameras[..1];
    let store = MemoryStateStore::new();
    let notifier = RecordingNotifier::new();
    let log = MemoryIncidentLog::new();

    for minutes in [0, 3, 6, 29] {
        run(first_camera, stalled()?, &store, &notifier, &log, midday() + Duration::minutes(minutes));
    }
    assert_eq!(notifier.sent().len(), 1);

    run(first_camera, stalled()?, &store, &notifier, &log, midday() + Duration::minutes(31));
    assert_eq!(notifier.sent().len(), 2);

    let state = store.get("218").ok_or("state missing")?;
    assert_eq!(state.metric_history.len(), 5);
    assert_eq!(state.last_alert_time(), Some(midday() + Duration::minutes(31)));
    let alerted: Vec<bool> = log.records().iter().map(|r| r.alerted).collect();
    assert_eq!(alerted, vec![true, false, false, false, true]);
    Ok(())
}

#[test]
fn failed_delivery_is_retried_on_next_run() -> Result<(), Box<dyn std::error::Error>> {
    let cameras = parse_registry(REGISTRY)?;
    let first_camera = &cameras[..1];
    let store = MemoryStateStore::new();
    let notifier = RecordingNotifier::failing();
    let log = MemoryIncidentLog::new();

    let summary = run(first_camera, stalled()?, &store, &notifier, &log, midday());
    assert_eq!(summary.notify_failures, 1);
    assert_eq!(store.get("218").and_then(|s| s.last_alert_time()), None);

    notifier.set_failing(false);
    let summary = run(
        first_camera,
        stalled()?,
        &store,
        &notifier,
        &log,
        midday() + Duration::minutes(3),
    );

    assert_eq!(summary.alerted, 1);
    assert_eq!(notifier.sent().len(), 1);
    Ok(())
}

#[test]
fn file_store_carries_history_between_runs() -> Result<(), Box<dyn std::error::Error>> {
    let unique = SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos();
    let dir = std::env::temp_dir().join(format!("roadwatch-pipeline-{unique}"));
    let cameras = parse_registry(REGISTRY)?;
    let first_camera = &cameras[..1];
    let notifier = RecordingNotifier::new();
    let log = MemoryIncidentLog::new();

    for minutes in [0, 3] {
        let store = FileStateStore::new(&dir);
        run(first_camera, stalled()?, &store, &notifier, &log, midday() + Duration::minutes(minutes));
    }

    let state: CameraState = FileStateStore::new(&dir).load("218");
    let _ = std::fs::remove_dir_all(&dir);

    assert_eq!(state.metric_history.len(), 2);
    assert_eq!(state.last_incident_type(), Some(IncidentType::BlockedOrClosedLane));
    assert_eq!(notifier.sent().len(), 1);
    Ok(())
}
