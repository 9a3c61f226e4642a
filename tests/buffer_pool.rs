//! Integration tests for the storage + buffer layers working together.

use std::sync::Arc;

use tempfile::tempdir;
use treeline::{BufferPoolManager, DiskManager, PageId};

fn setup(pool_size: usize) -> (Arc<BufferPoolManager>, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pool.tln");
    let dm = DiskManager::create(&path).unwrap();
    (Arc::new(BufferPoolManager::new(pool_size, dm)), dir)
}

#[test]
fn data_survives_eviction_and_reload() {
    let (bpm, _dir) = setup(4);

    // Write a distinct byte to each of 16 pages through a 4-frame pool
    let mut pids = Vec::new();
    for i in 0..16u8 {
        let mut guard = bpm.new_page().unwrap();
        guard.as_mut_slice()[100] = i;
        pids.push(guard.page_id());
    }

    for (i, pid) in pids.iter().enumerate() {
        let guard = bpm.fetch_page_read(*pid).unwrap();
        assert_eq!(guard.as_slice()[100], i as u8);
    }

    let snapshot = bpm.stats().snapshot();
    assert!(snapshot.evictions > 0);
}

#[test]
fn data_survives_process_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pool.tln");

    let pid;
    {
        let dm = DiskManager::create(&path).unwrap();
        let bpm = BufferPoolManager::new(4, dm);
        let mut guard = bpm.new_page().unwrap();
        guard.as_mut_slice()[500] = 0x77;
        pid = guard.page_id();
        drop(guard);
        bpm.flush_all_pages().unwrap();
    }

    {
        let dm = DiskManager::open(&path).unwrap();
        let bpm = BufferPoolManager::new(4, dm);
        let guard = bpm.fetch_page_read(pid).unwrap();
        assert_eq!(guard.as_slice()[500], 0x77);
    }
}

#[test]
fn freed_pages_are_recycled_across_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pool.tln");

    let freed;
    {
        let dm = DiskManager::create(&path).unwrap();
        let bpm = BufferPoolManager::new(4, dm);
        freed = bpm.new_page().unwrap().page_id();
        let _keep = bpm.new_page().unwrap().page_id();
        bpm.free_page(freed).unwrap();
    }

    {
        let dm = DiskManager::open(&path).unwrap();
        let bpm = BufferPoolManager::new(4, dm);
        assert_eq!(bpm.new_page().unwrap().page_id(), freed);
    }
}

#[test]
fn file_entries_bind_names_across_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pool.tln");

    {
        let dm = DiskManager::create(&path).unwrap();
        let bpm = BufferPoolManager::new(4, dm);
        let pid = bpm.new_page().unwrap().page_id();
        bpm.add_file_entry("my_index", pid).unwrap();
    }

    {
        let dm = DiskManager::open(&path).unwrap();
        let bpm = BufferPoolManager::new(4, dm);
        assert_eq!(bpm.file_entry("my_index"), Some(PageId::new(1)));
        assert_eq!(bpm.file_entry("other"), None);
    }
}

#[test]
fn pinned_pages_never_evicted() {
    let (bpm, _dir) = setup(3);

    // Hold two of three frames pinned
    let g1 = bpm.new_page().unwrap();
    let g2 = bpm.new_page().unwrap();
    let p1 = g1.page_id();
    let p2 = g2.page_id();

    // Churn the remaining frame
    for _ in 0..5 {
        let _g = bpm.new_page().unwrap();
    }

    assert!(bpm.pin_count(p1).is_some());
    assert!(bpm.pin_count(p2).is_some());
    drop(g1);
    drop(g2);
}

#[test]
fn concurrent_writers_on_distinct_pages() {
    use std::thread;

    let (bpm, _dir) = setup(8);

    let mut pids = Vec::new();
    for _ in 0..4 {
        pids.push(bpm.new_page().unwrap().page_id());
    }

    let mut handles = vec![];
    for (i, pid) in pids.iter().enumerate() {
        let bpm = Arc::clone(&bpm);
        let pid = *pid;
        handles.push(thread::spawn(move || {
            for _ in 0..50 {
                let mut guard = bpm.fetch_page_write(pid).unwrap();
                guard.as_mut_slice()[10] = i as u8;
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    for (i, pid) in pids.iter().enumerate() {
        let guard = bpm.fetch_page_read(*pid).unwrap();
        assert_eq!(guard.as_slice()[10], i as u8);
    }
}
