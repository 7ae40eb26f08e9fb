#![cfg(feature = "fjall")]

use allyd_storage::fjall::FjallStore;
use allyd_storage::{Column, KeyValueStore, WriteBatch};

#[test]
fn fjall_smoke_roundtrip() {
    let dir = tempfile::tempdir().expect("tempdir");

    {
        let store = FjallStore::open(dir.path()).expect("open fjall");
        store.put(Column::Meta, b"key", b"value").expect("put");
        assert_eq!(
            store.get(Column::Meta, b"key").expect("get"),
            Some(b"value".to_vec())
        );

        let mut batch = WriteBatch::new();
        batch.put(Column::AddressUtxo, b"addr:1", b"");
        batch.put(Column::AddressUtxo, b"addr:2", b"");
        batch.put(Column::AddressUtxo, b"other", b"");
        batch.delete(Column::Meta, b"key");
        store.write_batch(&batch).expect("batch commit");

        let keys: Vec<Vec<u8>> = store
            .scan_prefix(Column::AddressUtxo, b"addr:")
            .expect("scan")
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        assert_eq!(keys, vec![b"addr:1".to_vec(), b"addr:2".to_vec()]);
        store.persist().expect("persist");
    }

    let reopened = FjallStore::open(dir.path()).expect("reopen fjall");
    assert!(reopened.get(Column::Meta, b"key").expect("get").is_none());
    assert_eq!(
        reopened
            .scan_prefix(Column::AddressUtxo, b"addr:")
            .expect("scan")
            .len(),
        2
    );
}
