use graphwal::persistence::durability::{
    HealthMonitor, MetadataSlot, NullAppendEvent, NullRotationMonitor, RecoveryPositionResolver,
    TransactionId, TransactionLog, TransactionMetadataStore, BASE_TX_CHECKSUM,
    BASE_TX_COMMIT_TIMESTAMP, UNKNOWN_TX_CHECKSUM, UNKNOWN_TX_COMMIT_TIMESTAMP,
};
use graphwal::persistence::storage::{
    list_segments, LogPosition, LogSegmentStore, StoreLayout, SEGMENT_HEADER_LEN,
};
use graphwal::util::WalConfig;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

/// Writes `transactions` entries of `entry_len` bytes, rotating every `per_segment`.
fn populate_log(dir: &Path, transactions: u64, per_segment: u64, entry_len: usize) {
    let config = WalConfig::default().with_rotation_threshold(0);
    let segments = LogSegmentStore::open(dir, &config, 0).unwrap();
    for tx in 1..=transactions {
        segments.append(tx, &vec![tx as u8; entry_len]).unwrap();
        if tx % per_segment == 0 && tx != transactions {
            segments.rotate().unwrap();
        }
    }
    segments.flush().unwrap();
}

fn fresh_metadata(layout: &StoreLayout) -> TransactionMetadataStore {
    layout.ensure().unwrap();
    TransactionMetadataStore::open(layout.metadata_file(), HealthMonitor::new()).unwrap()
}

#[test]
fn relative_custom_directory_resolves_to_end_of_highest_segment() {
    let dir = tempdir().unwrap();
    let layout = StoreLayout::new(dir.path().join("store"));
    let config = WalConfig::default().with_logs_location("custom/../custom-logs");
    let logs = dir.path().join("store").join("custom-logs");
    populate_log(&logs, 10, 4, 25);

    let metadata = fresh_metadata(&layout);
    let position = RecoveryPositionResolver::new(&metadata, &layout, &config)
        .resolve_log_position(10)
        .unwrap();

    let highest = list_segments(&logs).unwrap().pop().unwrap();
    assert_eq!(highest.version, 2);
    assert_eq!(highest.len, SEGMENT_HEADER_LEN + 2 * 25);
    assert_eq!(position, LogPosition::new(highest.version, highest.len));
}

#[test]
fn absolute_and_relative_settings_agree() {
    let dir = tempdir().unwrap();
    let layout = StoreLayout::new(dir.path());
    let logs = dir.path().join("wal");
    populate_log(&logs, 7, 3, 10);
    let metadata = fresh_metadata(&layout);

    let relative = WalConfig::default().with_logs_location("wal");
    let absolute = WalConfig::default().with_logs_location(logs.to_string_lossy());
    let from_relative = RecoveryPositionResolver::new(&metadata, &layout, &relative);
    let from_absolute = RecoveryPositionResolver::new(&metadata, &layout, &absolute);

    assert_eq!(from_relative.logs_dir(), from_absolute.logs_dir());
    assert_eq!(
        from_relative.resolve_log_position(7).unwrap(),
        from_absolute.resolve_log_position(7).unwrap()
    );
    assert_eq!(
        from_absolute.resolve_log_position(7).unwrap(),
        LogPosition::new(2, SEGMENT_HEADER_LEN + 10)
    );
}

#[test]
fn empty_or_missing_log_directory_is_a_fresh_log() {
    let dir = tempdir().unwrap();
    let layout = StoreLayout::new(dir.path());
    let metadata = fresh_metadata(&layout);
    let config = WalConfig::default().with_logs_location("not-created-yet");
    let resolver = RecoveryPositionResolver::new(&metadata, &layout, &config);
    assert_eq!(resolver.resolve_log_position(1).unwrap(), LogPosition::START);

    fs::create_dir_all(dir.path().join("not-created-yet")).unwrap();
    assert_eq!(resolver.resolve_log_position(1).unwrap(), LogPosition::START);
}

#[test]
fn absent_metadata_resolves_to_base_or_unknown() {
    let dir = tempdir().unwrap();
    let layout = StoreLayout::new(dir.path());
    let metadata = fresh_metadata(&layout);
    let config = WalConfig::default();
    let resolver = RecoveryPositionResolver::new(&metadata, &layout, &config);

    let base = resolver.resolve_transaction_metadata(1).unwrap();
    assert_eq!(base, TransactionId::base());
    assert_eq!(base.checksum, BASE_TX_CHECKSUM);
    assert_eq!(base.commit_timestamp, BASE_TX_COMMIT_TIMESTAMP);

    for target in [2u64, 99, u64::MAX] {
        let unknown = resolver.resolve_transaction_metadata(target).unwrap();
        assert_eq!(unknown.checksum, UNKNOWN_TX_CHECKSUM);
        assert_eq!(unknown.commit_timestamp, UNKNOWN_TX_COMMIT_TIMESTAMP);
        assert!(unknown.has_unknown_metadata());
    }
}

#[test]
fn recorded_metadata_is_returned_unchanged() {
    let dir = tempdir().unwrap();
    let layout = StoreLayout::new(dir.path());
    let config = WalConfig::default();
    let metadata = Arc::new(fresh_metadata(&layout));
    let log = TransactionLog::open(&layout, &config, metadata.clone(), Arc::new(NullRotationMonitor))
        .unwrap();
    let tx = TransactionId::new(41, 0x5EED, 1_712_000_000_123);
    let committed = log.commit(tx, b"committed-entry", &NullAppendEvent).unwrap();
    drop(log);

    let resolver = RecoveryPositionResolver::new(&metadata, &layout, &config);
    for target in [1u64, 41, 1_000] {
        let point = resolver.resolve(target).unwrap();
        assert_eq!(point.transaction, tx);
        assert_eq!(point.position, committed);
    }
}

#[test]
fn invalidated_closed_position_falls_back_to_scan() {
    let dir = tempdir().unwrap();
    let layout = StoreLayout::new(dir.path());
    let config = WalConfig::default();
    let metadata = Arc::new(fresh_metadata(&layout));
    {
        let log =
            TransactionLog::open(&layout, &config, metadata.clone(), Arc::new(NullRotationMonitor))
                .unwrap();
        log.commit(TransactionId::new(2, 1, 1), b"abc", &NullAppendEvent)
            .unwrap();
        log.rotate(&NullAppendEvent).unwrap();
        log.segments().append(3, b"unrecorded").unwrap();
        log.flush().unwrap();
    }
    metadata.invalidate_last_closed().unwrap();
    assert_eq!(metadata.get(MetadataSlot::LastClosedLogVersion).unwrap(), None);

    let position = RecoveryPositionResolver::new(&metadata, &layout, &config)
        .resolve_log_position(3)
        .unwrap();
    assert_eq!(position, LogPosition::new(1, SEGMENT_HEADER_LEN + 10));
}

#[test]
fn half_created_trailing_segment_is_ignored_by_scan() {
    let dir = tempdir().unwrap();
    let layout = StoreLayout::new(dir.path());
    let config = WalConfig::default();
    let logs = layout.logs_dir(&config);
    populate_log(&logs, 2, 1, 5);
    fs::write(
        logs.join(graphwal::persistence::storage::segment_file_name(2)),
        b"GW",
    )
    .unwrap();

    let metadata = fresh_metadata(&layout);
    let position = RecoveryPositionResolver::new(&metadata, &layout, &config)
        .resolve_log_position(2)
        .unwrap();
    assert_eq!(position, LogPosition::new(1, SEGMENT_HEADER_LEN + 5));
}
