use graphwal::persistence::durability::{
    HealthError, HealthMonitor, MetricsRotationMonitor, NullAppendEvent, NullRotationMonitor,
    RotationController, RotationError, TransactionId, TransactionLog, TransactionLogError,
    TransactionMetadataStore,
};
use graphwal::persistence::storage::{
    list_segments, segment_file_name, LogFileInformation as _, LogPosition, LogSegmentStore,
    SegmentError, StoreLayout, SEGMENT_HEADER_LEN,
};
use graphwal::util::WalConfig;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::tempdir;

fn store_with_threshold(dir: &std::path::Path, threshold: u64) -> Arc<LogSegmentStore> {
    let config = WalConfig::default().with_rotation_threshold(threshold);
    Arc::new(LogSegmentStore::open(dir, &config, 0).unwrap())
}

#[test]
fn concurrent_checks_rotate_exactly_once() {
    let dir = tempdir().unwrap();
    let segments = store_with_threshold(dir.path(), 64);
    segments.append(1, &[7u8; 40]).unwrap();
    assert!(segments.rotation_needed());

    let controller = Arc::new(RotationController::new(
        segments.clone(),
        HealthMonitor::new(),
        Arc::new(NullRotationMonitor),
    ));
    let threads = 16;
    let barrier = Arc::new(Barrier::new(threads));
    let rotations = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let controller = controller.clone();
            let barrier = barrier.clone();
            let rotations = rotations.clone();
            thread::spawn(move || {
                barrier.wait();
                if controller.rotate_if_needed(&NullAppendEvent).unwrap() {
                    rotations.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(rotations.load(Ordering::SeqCst), 1);
    assert_eq!(segments.highest_version(), 1);
    assert_eq!(list_segments(dir.path()).unwrap().len(), 2);
}

#[test]
fn rotated_segment_never_grows_again() {
    let dir = tempdir().unwrap();
    let segments = store_with_threshold(dir.path(), 0);
    segments.append(1, b"first-entry").unwrap();
    let previous = segments.active_segment();
    segments.rotate().unwrap();
    let sealed_len = fs::metadata(&previous.path).unwrap().len();
    assert_eq!(sealed_len, SEGMENT_HEADER_LEN + 11);

    for tx in 2..20u64 {
        segments.append(tx, b"later-entry").unwrap();
    }
    segments.flush().unwrap();

    assert_eq!(fs::metadata(&previous.path).unwrap().len(), sealed_len);
    let active = segments.active_segment();
    assert_eq!(active.version, 1);
    assert_eq!(
        fs::metadata(&active.path).unwrap().len(),
        SEGMENT_HEADER_LEN + 18 * 11
    );
    assert_eq!(segments.last_committed_tx_id(), 19);
}

#[test]
fn flushes_racing_rotations_observe_whole_segments() {
    let dir = tempdir().unwrap();
    let segments = store_with_threshold(dir.path(), 0);
    let controller = Arc::new(RotationController::new(
        segments.clone(),
        HealthMonitor::new(),
        Arc::new(NullRotationMonitor),
    ));
    let barrier = Arc::new(Barrier::new(4));
    let mut handles = Vec::new();
    for worker in 0..2u64 {
        let segments = segments.clone();
        let barrier = barrier.clone();
        handles.push(thread::spawn(move || {
            barrier.wait();
            for round in 0..50u64 {
                segments.append(worker * 100 + round, b"entry").unwrap();
                let position = segments.flush().unwrap();
                assert!(position.byte_offset >= SEGMENT_HEADER_LEN);
            }
        }));
    }
    for _ in 0..2 {
        let controller = controller.clone();
        let barrier = barrier.clone();
        handles.push(thread::spawn(move || {
            barrier.wait();
            for _ in 0..10 {
                controller.rotate_log_file(&NullAppendEvent).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(segments.highest_version(), 20);
    let listed = list_segments(dir.path()).unwrap();
    assert_eq!(listed.len(), 21);
    let entry_bytes: u64 = listed
        .iter()
        .map(|segment| segment.len - SEGMENT_HEADER_LEN)
        .sum();
    assert_eq!(entry_bytes, 100 * 5);
}

#[test]
fn unhealthy_store_blocks_rotation_and_keeps_cause() {
    let dir = tempdir().unwrap();
    let segments = store_with_threshold(dir.path(), 64);
    segments.append(1, &[0u8; 64]).unwrap();
    let health = HealthMonitor::new();
    let controller =
        RotationController::new(segments.clone(), health.clone(), Arc::new(NullRotationMonitor));
    health.panic("metadata write failed");

    let err = controller.rotate_if_needed(&NullAppendEvent).unwrap_err();
    assert!(matches!(err, RotationError::Unhealthy(_)));
    assert!(err.to_string().contains("metadata write failed"));
    assert_eq!(segments.highest_version(), 0);
}

#[test]
fn committed_transactions_rotate_and_publish_metrics() {
    let dir = tempdir().unwrap();
    let layout = StoreLayout::new(dir.path());
    let config = WalConfig::default().with_rotation_threshold(128);
    let metadata = Arc::new(
        TransactionMetadataStore::open(layout.metadata_file(), HealthMonitor::new()).unwrap(),
    );
    let monitor = Arc::new(MetricsRotationMonitor::new("graphwal"));
    let log = TransactionLog::open(&layout, &config, metadata.clone(), monitor.clone()).unwrap();

    let mut last = LogPosition::START;
    for id in 2..=13u64 {
        last = log
            .commit(TransactionId::new(id, id * 3, 1_000 + id), &[1u8; 48], &NullAppendEvent)
            .unwrap();
    }

    // 32-byte header plus two 48-byte entries reaches 128 on every second commit.
    assert_eq!(log.segments().highest_version(), 6);
    assert_eq!(monitor.snapshot().counter("graphwal.wal.rotations"), 6);
    assert_eq!(
        monitor.snapshot().gauge("graphwal.wal.highest_version"),
        Some(6)
    );
    assert_eq!(
        metadata.last_committed().unwrap(),
        Some(TransactionId::new(13, 39, 1_013))
    );
    assert_eq!(metadata.last_closed_position().unwrap(), Some(last));
    assert_eq!(last, LogPosition::new(5, SEGMENT_HEADER_LEN + 96));
}

fn open_log(
    layout: &StoreLayout,
    config: &WalConfig,
) -> (TransactionLog, Arc<TransactionMetadataStore>) {
    let metadata = Arc::new(
        TransactionMetadataStore::open(layout.metadata_file(), HealthMonitor::new()).unwrap(),
    );
    let log = TransactionLog::open(layout, config, metadata.clone(), Arc::new(NullRotationMonitor))
        .unwrap();
    (log, metadata)
}

fn assert_unhealthy_with(result: Result<LogPosition, TransactionLogError>, expected: &str) {
    match result {
        Err(TransactionLogError::Unhealthy(HealthError::Unhealthy { cause })) => {
            assert!(cause.contains(expected), "unexpected cause: {cause}");
        }
        other => panic!("expected an unhealthy store, got {other:?}"),
    }
}

#[test]
fn failed_forced_rotation_marks_store_unhealthy() {
    let dir = tempdir().unwrap();
    let layout = StoreLayout::new(dir.path());
    let config = WalConfig::default();
    let (log, metadata) = open_log(&layout, &config);
    log.commit(TransactionId::new(2, 1, 1), b"entry", &NullAppendEvent)
        .unwrap();
    let blocker = layout.logs_dir(&config).join(segment_file_name(1));
    fs::write(&blocker, b"").unwrap();

    let err = log.rotate(&NullAppendEvent).unwrap_err();
    assert!(matches!(
        err,
        TransactionLogError::Rotation(RotationError::Segment(SegmentError::Io(_)))
    ));
    assert!(!metadata.health().is_healthy());
    assert!(metadata
        .health()
        .cause()
        .unwrap()
        .contains("log rotation failed"));
    assert_eq!(log.segments().highest_version(), 0);

    assert_unhealthy_with(
        log.commit(TransactionId::new(3, 1, 1), b"later", &NullAppendEvent),
        "log rotation failed",
    );
    assert_eq!(fs::metadata(&blocker).unwrap().len(), 0);
    assert_eq!(
        metadata.last_committed().unwrap(),
        Some(TransactionId::new(2, 1, 1))
    );
}

#[test]
fn failed_rotation_after_commit_blocks_later_commits() {
    let dir = tempdir().unwrap();
    let layout = StoreLayout::new(dir.path());
    let config = WalConfig::default().with_rotation_threshold(64);
    let (log, metadata) = open_log(&layout, &config);
    fs::write(layout.logs_dir(&config).join(segment_file_name(1)), b"").unwrap();

    let err = log
        .commit(TransactionId::new(2, 5, 9), &[3u8; 40], &NullAppendEvent)
        .unwrap_err();
    assert!(matches!(
        err,
        TransactionLogError::Rotation(RotationError::Segment(_))
    ));
    // The entry itself was forced and recorded before rotation was attempted.
    assert_eq!(
        metadata.last_committed().unwrap(),
        Some(TransactionId::new(2, 5, 9))
    );
    assert_eq!(
        metadata.last_closed_position().unwrap(),
        Some(LogPosition::new(0, SEGMENT_HEADER_LEN + 40))
    );

    assert_unhealthy_with(
        log.commit(TransactionId::new(3, 5, 9), b"later", &NullAppendEvent),
        "log rotation failed",
    );
    assert!(matches!(
        log.rotation().rotate_if_needed(&NullAppendEvent),
        Err(RotationError::Unhealthy(_))
    ));
}
