use domain::FieldValue;
use iot2alexa_storage::CurrentStateStore;
use std::sync::Arc;

fn batch(entries: &[(&str, FieldValue)]) -> Vec<(String, FieldValue)> {
    entries
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

#[test]
fn merge_keeps_absent_keys() {
    let store = CurrentStateStore::new();
    store.merge(batch(&[
        ("temp", FieldValue::I64(21)),
        ("state", FieldValue::from("ok")),
    ]));
    store.merge(batch(&[("temp", FieldValue::I64(22))]));

    let snapshot = store.snapshot();
    assert_eq!(snapshot.get("temp"), Some(&FieldValue::I64(22)));
    assert_eq!(snapshot.get("state"), Some(&FieldValue::from("ok")));
    assert_eq!(store.len(), 2);
}

#[test]
fn snapshot_is_detached_copy() {
    let store = CurrentStateStore::new();
    store.merge(batch(&[("temp", FieldValue::I64(1))]));
    let before = store.snapshot();
    store.merge(batch(&[("temp", FieldValue::I64(2))]));
    assert_eq!(before.get("temp"), Some(&FieldValue::I64(1)));
    assert_eq!(store.snapshot().get("temp"), Some(&FieldValue::I64(2)));
}

#[test]
fn restricted_store_rejects_unknown_keys() {
    let store = CurrentStateStore::restricted_to(["temp"]);
    let result = store.merge(batch(&[
        ("temp", FieldValue::F64(20.5)),
        ("rogue", FieldValue::Bool(true)),
    ]));
    assert_eq!(result.applied, 1);
    assert_eq!(result.rejected, vec!["rogue".to_string()]);
    assert_eq!(result.version, 1);
    assert!(!store.snapshot().contains_key("rogue"));
}

#[test]
fn empty_store_reads_empty() {
    let store = CurrentStateStore::new();
    assert!(store.is_empty());
    assert_eq!(store.versioned_snapshot(), (0, Default::default()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_snapshots_see_whole_merges() {
    const KEYS: [&str; 4] = ["a", "b", "c", "d"];
    const MERGES: i64 = 500;

    let store = Arc::new(CurrentStateStore::new());

    let mut readers = Vec::new();
    for _ in 0..4 {
        let store = store.clone();
        readers.push(tokio::spawn(async move {
            let mut last_version = 0;
            for _ in 0..2_000 {
                let (version, snapshot) = store.versioned_snapshot();
                assert!(version >= last_version, "versions never go backwards");
                last_version = version;
                if version == 0 {
                    assert!(snapshot.is_empty());
                    continue;
                }
                // 每次合并把所有 key 写成同一个序号：快照里的值必须全部相同且等于版本号
                assert_eq!(snapshot.len(), KEYS.len());
                for key in KEYS {
                    assert_eq!(snapshot.get(key), Some(&FieldValue::I64(version as i64)));
                }
                tokio::task::yield_now().await;
            }
        }));
    }

    let writer = {
        let store = store.clone();
        tokio::spawn(async move {
            for seq in 1..=MERGES {
                store.merge(KEYS.iter().map(|key| (key.to_string(), FieldValue::I64(seq))));
                tokio::task::yield_now().await;
            }
        })
    };

    writer.await.expect("writer");
    for reader in readers {
        reader.await.expect("reader");
    }
    assert_eq!(store.versioned_snapshot().0, MERGES as u64);
}
