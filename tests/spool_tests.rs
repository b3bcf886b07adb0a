use rdisco::spool::{FileSpool, MemorySpool, ResultSpool};
use serde_json::json;
use std::path::PathBuf;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("rdisco-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

#[test]
fn test_file_spool_roundtrip() {
    let dir = scratch_dir("roundtrip");
    let spool = FileSpool::new(&dir).unwrap();

    let entry = json!({"DEVICE": [{"ip": "10.0.0.1"}], "PROCESSNUMBER": "0011122"});
    spool.save(1, &entry).unwrap();

    let restored = spool.restore(1).unwrap().unwrap();
    assert_eq!(restored, entry);

    spool.remove(1).unwrap();
    assert!(spool.restore(1).unwrap().is_none());

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_file_spool_missing_key_is_none() {
    let dir = scratch_dir("missing");
    let spool = FileSpool::new(&dir).unwrap();

    assert!(spool.restore(42).unwrap().is_none());
    // Removing a key that was never saved is not an error
    spool.remove(42).unwrap();

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_file_spool_overwrites_key() {
    let dir = scratch_dir("overwrite");
    let spool = FileSpool::new(&dir).unwrap();

    spool.save(7, &json!({"v": 1})).unwrap();
    spool.save(7, &json!({"v": 2})).unwrap();
    assert_eq!(spool.restore(7).unwrap().unwrap()["v"], 2);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_file_spool_entries_survive_reopen() {
    let dir = scratch_dir("reopen");
    {
        let spool = FileSpool::new(&dir).unwrap();
        spool.save(3, &json!({"kept": true})).unwrap();
    }
    let spool = FileSpool::new(&dir).unwrap();
    assert_eq!(spool.restore(3).unwrap().unwrap()["kept"], true);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_memory_spool_roundtrip() {
    let spool = MemorySpool::new();
    assert!(spool.is_empty());

    spool.save(1, &json!({"a": 1})).unwrap();
    spool.save(2, &json!({"b": 2})).unwrap();
    assert_eq!(spool.len(), 2);

    assert_eq!(spool.restore(1).unwrap().unwrap()["a"], 1);
    spool.remove(1).unwrap();
    assert!(spool.restore(1).unwrap().is_none());
    assert_eq!(spool.len(), 1);
}
