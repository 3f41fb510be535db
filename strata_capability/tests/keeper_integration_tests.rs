use std::sync::Arc;
use std::thread;

use strata_capability::{CapabilityError, CapabilityKeeper, GenesisState};
use strata_core::{FileStore, MemStore};
use tempfile::tempdir;

#[test]
fn test_restart_rebuilds_cache_from_persisted_index() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("capability.json");

    let (old_port, old_send) = {
        let store = Arc::new(FileStore::open(&path).unwrap());
        let keeper = CapabilityKeeper::load(store.clone()).unwrap();

        let port = keeper.new_capability("ibc", "ports/transfer").unwrap();
        keeper.claim_capability("transfer", "port", &port).unwrap();
        let send = keeper.new_capability("bank", "send").unwrap();
        let burn = keeper.new_capability("bank", "burn").unwrap();
        keeper.release_capability("bank", &burn).unwrap();

        store.commit().unwrap();
        (port, send)
    };

    // Second "process": same persisted bytes, fresh cache
    let store = Arc::new(FileStore::open(&path).unwrap());
    let keeper = CapabilityKeeper::load(store).unwrap();

    assert_eq!(keeper.cache().len(), 2);
    assert_eq!(keeper.index().latest_index().unwrap(), 3);

    let port = keeper.get_capability("transfer", "port").unwrap();
    assert_eq!(port.index(), old_port.index());
    assert_ne!(port, old_port);
    assert_eq!(keeper.get_capability("ibc", "ports/transfer").unwrap(), port);

    let send = keeper.get_capability("bank", "send").unwrap();
    assert_eq!(send.index(), old_send.index());
    assert!(!keeper.authenticate_capability("bank", &old_send, "send"));
    assert!(keeper.authenticate_capability("bank", &send, "send"));

    // released capabilities stay released, and their index is not reused
    assert!(matches!(
        keeper.get_capability("bank", "burn"),
        Err(CapabilityError::NotFound(_))
    ));
    assert_eq!(keeper.new_capability("bank", "burn").unwrap().index(), 4);
}

#[test]
fn test_persisted_state_is_identical_across_keepers() {
    fn run(store: MemStore) -> Vec<(Vec<u8>, Vec<u8>)> {
        let keeper = CapabilityKeeper::load(store.clone()).unwrap();
        let a = keeper.new_capability("ibc", "port").unwrap();
        keeper.claim_capability("transfer", "port", &a).unwrap();
        keeper.claim_capability("ica", "port", &a).unwrap();
        let b = keeper.new_capability("bank", "send").unwrap();
        keeper.release_capability("ica", &a).unwrap();
        keeper.release_capability("bank", &b).unwrap();
        store.snapshot()
    }

    // tokens differ between the two runs, persisted bytes must not
    assert_eq!(run(MemStore::new()), run(MemStore::new()));
}

#[test]
fn test_concurrent_readers_during_block_execution() {
    let keeper = CapabilityKeeper::load(MemStore::new()).unwrap();
    let port = keeper.new_capability("ibc", "port").unwrap();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let keeper = keeper.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    let modules = keeper.lookup_modules(&port).unwrap();
                    assert!(modules.contains("ibc"));
                    assert!(keeper.authenticate_capability("ibc", &port, "port"));
                }
            })
        })
        .collect();

    for i in 0..50 {
        let module = format!("module{}", i);
        keeper.claim_capability(&module, "port", &port).unwrap();
        keeper.new_capability(&module, "own").unwrap();
    }

    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(keeper.lookup_modules(&port).unwrap().len(), 51);
    assert_eq!(keeper.index().latest_index().unwrap(), 51);
}

#[test]
fn test_genesis_round_trip_through_new_process() {
    let keeper = CapabilityKeeper::load(MemStore::new()).unwrap();
    let port = keeper.new_capability("ibc", "port").unwrap();
    keeper.claim_capability("transfer", "port", &port).unwrap();
    keeper.new_capability("bank", "send").unwrap();

    let exported = keeper.export_genesis().unwrap();
    let json = serde_json::to_string(&exported).unwrap();
    let imported: GenesisState = serde_json::from_str(&json).unwrap();

    let restored = CapabilityKeeper::load(MemStore::new()).unwrap();
    restored.init_genesis(&imported).unwrap();

    assert_eq!(restored.export_genesis().unwrap(), exported);
    let restored_port = restored.get_capability("transfer", "port").unwrap();
    assert_eq!(restored_port.index(), port.index());
    assert_ne!(restored_port, port);
}
