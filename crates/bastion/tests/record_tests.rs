//! Integration tests for the recording format.

use std::io::Write;

use bastion::record::{
    DEFAULT_MAX_PAYLOAD, Entry, EntryKind, HEADER_LEN, RecordReader, Recorder, SessionMetadata, Timestamp,
    TransferCounters, open_recording, recording_path,
};
use chrono::TimeZone;
use proptest::prelude::*;

fn kind_strategy() -> impl Strategy<Value = EntryKind> {
    prop_oneof![
        prop::sample::select(EntryKind::KNOWN.to_vec()),
        any::<i32>().prop_map(EntryKind::from_code),
    ]
}

fn timestamp_strategy() -> impl Strategy<Value = Timestamp> {
    (0i64..4_102_444_800, 0i64..1_000_000).prop_map(|(secs, micros)| Timestamp::new(secs, micros))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn entry_survives_encoding(
        kind in kind_strategy(),
        timestamp in timestamp_strategy(),
        len in prop_oneof![0usize..64, Just(65536usize), 0usize..=65536],
        seed in any::<u8>(),
    ) {
        let payload: Vec<u8> = (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect();

        let mut recorder = Recorder::new(Vec::new());
        recorder.write_entry_at(timestamp, kind, &payload).unwrap();
        let bytes = recorder.into_inner().unwrap();
        prop_assert_eq!(bytes.len(), HEADER_LEN + len);

        let mut reader = RecordReader::new(bytes.as_slice());
        let entry = reader.next_entry().unwrap().unwrap();
        prop_assert_eq!(entry.kind, kind);
        prop_assert_eq!(entry.timestamp, timestamp);
        prop_assert_eq!(entry.payload, payload);
        prop_assert!(reader.next_entry().unwrap().is_none());
    }

    #[test]
    fn entries_come_back_in_append_order(
        entries in prop::collection::vec((kind_strategy(), prop::collection::vec(any::<u8>(), 0..256)), 0..40),
    ) {
        let mut recorder = Recorder::new(Vec::new());
        for (kind, payload) in &entries {
            recorder.write_entry(*kind, payload).unwrap();
        }
        let bytes = recorder.into_inner().unwrap();

        let decoded: Vec<(EntryKind, Vec<u8>)> = RecordReader::new(bytes.as_slice())
            .map(|e| {
                let e = e.unwrap();
                (e.kind, e.payload)
            })
            .collect();
        prop_assert_eq!(decoded, entries);
    }
}

#[test]
fn timestamps_never_go_backwards() {
    let mut recorder = Recorder::new(Vec::new());
    for _ in 0..100 {
        recorder.write_entry(EntryKind::None, &[]).unwrap();
    }
    let bytes = recorder.into_inner().unwrap();

    let stamps: Vec<Timestamp> = RecordReader::new(bytes.as_slice())
        .map(|e| e.unwrap().timestamp)
        .collect();
    assert_eq!(stamps.len(), 100);
    assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn file_round_trip_with_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ttyrecord-test");

    let start = SessionMetadata::new().field("pid", 42).field("childShell", "/bin/sh");
    let exit = SessionMetadata::session_exit(
        None,
        TransferCounters {
            server_to_client: 5,
            client_to_server: 3,
        },
    );

    let mut recorder = Recorder::new(open_recording(&path).unwrap());
    recorder.write_metadata(EntryKind::SessionStart, &start).unwrap();
    recorder.write_entry(EntryKind::ClientToServer, b"ls\n").unwrap();
    recorder.write_entry(EntryKind::ServerToClient, b"a.txt").unwrap();
    recorder.write_metadata(EntryKind::SessionExit, &exit).unwrap();
    recorder.into_inner().unwrap().flush().unwrap();

    let entries: Vec<_> = RecordReader::open(&path)
        .unwrap()
        .map(Result::unwrap)
        .collect();
    assert_eq!(entries.len(), 4);
    let on_disk: usize = entries.iter().map(Entry::encoded_len).sum();
    assert_eq!(on_disk as u64, std::fs::metadata(&path).unwrap().len());
    assert_eq!(entries.iter().filter(|e| e.kind.is_data()).count(), 2);
    assert_eq!(SessionMetadata::parse(&entries[0].payload_text()), start);
    assert_eq!(entries[1].payload, b"ls\n");

    let exit_text = entries[3].payload_text();
    assert!(exit_text.contains("exitStatus: 0"));
    assert!(exit_text.contains("bytesServerToClient: 5"));
    assert!(exit_text.contains("bytesClientToServer: 3"));
}

#[test]
fn sessions_in_the_same_second_share_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let first = chrono::Local.timestamp_opt(1_727_000_000, 100_000_000).unwrap();
    let second = chrono::Local.timestamp_opt(1_727_000_000, 900_000_000).unwrap();

    let path_a = recording_path(dir.path(), &first);
    let path_b = recording_path(dir.path(), &second);
    assert_eq!(path_a, path_b);

    let mut a = Recorder::new(open_recording(&path_a).unwrap());
    a.write_entry(EntryKind::ServerToClient, b"first session output").unwrap();
    drop(a);

    let mut b = Recorder::new(open_recording(&path_b).unwrap());
    b.write_entry(EntryKind::ServerToClient, b"second").unwrap();
    drop(b);

    let entries: Vec<_> = RecordReader::open(&path_a).unwrap().map(Result::unwrap).collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].payload, b"second");
}

#[test]
fn default_limit_is_sixteen_mebibytes() {
    assert_eq!(DEFAULT_MAX_PAYLOAD, 16 * 1024 * 1024);
}
