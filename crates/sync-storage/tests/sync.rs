use std::{sync::Arc, time::Duration};

use sync_storage::{raw_value_enum, Key, SyncStorage, SyncValue};
use sync_storage_kvs::{ChangeReason, KeyValueStore, MemoryStore, StoredValue};

raw_value_enum! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Sort: i64 {
        Name = 0,
        Modified = 1,
        Size = 2,
    }
}

const SHOW_HIDDEN: Key<bool> = Key::new("show_hidden");
const SORT: Key<Sort> = Key::new("sort");
const LAST_FOLDER: Key<Option<String>> = Key::new("last_folder");
const PINNED_SORT: Key<Option<Sort>> = Key::new("pinned_sort");

async fn wait_for<T, F>(value: &SyncValue<T>, expected: F)
where
    T: Clone + Send + Sync + PartialEq + std::fmt::Debug + 'static,
    F: Fn(&T) -> bool,
{
    let mut receiver = value.subscribe();
    tokio::time::timeout(Duration::from_secs(5), receiver.wait_for(|v| expected(v)))
        .await
        .expect("value should update")
        .expect("sender is alive");
}

#[tokio::test]
async fn external_changes_reach_running_values() {
    let store = Arc::new(MemoryStore::new());
    let storage = SyncStorage::new(store.clone());
    storage.start().expect("runtime is available");

    let show_hidden = storage.value(SHOW_HIDDEN, false);
    let sort = storage.raw_value(SORT, Sort::Name);

    store.apply_external(
        ChangeReason::ServerChange,
        [
            ("show_hidden", Some(StoredValue::Bool(true))),
            ("sort", Some(StoredValue::Integer(2))),
        ],
    );

    wait_for(&show_hidden, |v| *v).await;
    wait_for(&sort, |v| *v == Sort::Size).await;

    storage.stop();
}

#[tokio::test]
async fn local_writes_survive_until_the_next_external_change() {
    let store = Arc::new(MemoryStore::new());
    let storage = SyncStorage::new(store.clone());
    storage.start().expect("runtime is available");

    let last_folder = storage.value(LAST_FOLDER, None);
    last_folder.set(Some("/home".to_owned()));
    assert_eq!(last_folder.get().as_deref(), Some("/home"));
    assert_eq!(store.string("last_folder").as_deref(), Some("/home"));

    store.apply_external(
        ChangeReason::ServerChange,
        [("last_folder", Some(StoredValue::from("/srv")))],
    );

    wait_for(&last_folder, |v| v.as_deref() == Some("/srv")).await;
    storage.stop();
}

#[tokio::test]
async fn dropped_values_stop_listening() {
    let store = Arc::new(MemoryStore::new());
    let storage = SyncStorage::new(store.clone());
    storage.start().expect("runtime is available");

    let pinned = storage.optional_raw_value(PINNED_SORT, None);
    pinned.set(Some(Sort::Modified));
    assert_eq!(store.long_long("pinned_sort"), 1);
    drop(pinned);

    assert!(!storage.watcher().has_subscriber("pinned_sort"));

    // A later value for another key still updates, the dropped one is simply skipped.
    let show_hidden = storage.value(SHOW_HIDDEN, false);
    store.apply_external(
        ChangeReason::ServerChange,
        [
            ("pinned_sort", Some(StoredValue::Integer(0))),
            ("show_hidden", Some(StoredValue::Bool(true))),
        ],
    );
    wait_for(&show_hidden, |v| *v).await;

    storage.stop();
}

#[tokio::test]
async fn quota_violations_do_not_disturb_cached_values() {
    let store = Arc::new(MemoryStore::with_limits(sync_storage_kvs::StoreLimits {
        max_total_bytes: 32,
        ..Default::default()
    }));
    let storage = SyncStorage::new(store.clone());
    storage.start().expect("runtime is available");

    let blob = storage.value(Key::<Vec<u8>>::new("blob"), Vec::new());
    blob.set(vec![7; 128]);

    // The cache keeps the local write even though the store rejected it.
    assert_eq!(blob.get(), vec![7; 128]);
    assert!(!store.contains_key("blob"));

    storage.stop();
}
