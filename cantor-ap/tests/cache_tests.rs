//! Audio cache behavior under realistic access patterns

use cantor_ap::cache::{stream_key, AudioCache, STREAM_NAMESPACE};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn url_key(n: usize) -> String {
    stream_key(&format!("https://cdn.example.org/bhajan/{}.mp3", n))
}

/// Visible entry files in the cache directory
fn entry_files(dir: &Path) -> HashSet<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|name| !name.starts_with('.'))
        .collect()
}

/// **Given:** A full cache where some entries were read recently
/// **When:** New entries push it over budget
/// **Then:** Exactly the least recently accessed entries are evicted
#[tokio::test]
async fn test_evicts_least_recently_accessed() {
    let temp = TempDir::new().unwrap();
    let cache = AudioCache::open(STREAM_NAMESPACE, temp.path(), 500).await.unwrap();

    for n in 0..5 {
        cache.put(&url_key(n), &[n as u8; 100]).await.unwrap();
    }
    assert_eq!(cache.stats().total_bytes, 500);

    // Recency order becomes 1, 4, 0, 2, 3 (oldest first)
    assert!(cache.get(&url_key(0)).await.is_some());
    assert!(cache.get(&url_key(2)).await.is_some());
    assert!(cache.get(&url_key(3)).await.is_some());

    cache.put(&url_key(5), &[5; 100]).await.unwrap();
    cache.put(&url_key(6), &[6; 100]).await.unwrap();

    assert!(!cache.is_cached(&url_key(1)));
    assert!(!cache.is_cached(&url_key(4)));
    for n in [0, 2, 3, 5, 6] {
        assert!(cache.is_cached(&url_key(n)), "entry {} should survive", n);
    }
    assert_eq!(cache.stats().entries, 5);
    assert_eq!(entry_files(temp.path()).len(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_puts_stay_within_budget() {
    let temp = TempDir::new().unwrap();
    let cache = Arc::new(AudioCache::open(STREAM_NAMESPACE, temp.path(), 1000).await.unwrap());

    let mut handles = Vec::new();
    for n in 0..20 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            cache.put(&url_key(n), &vec![n as u8; 100]).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stats = cache.stats();
    assert!(stats.total_bytes <= stats.budget_bytes);
    assert_eq!(stats.entries, 10);

    // Index and directory agree, and no temporary files remain
    let files = entry_files(temp.path());
    assert_eq!(files.len(), 10);
    let all: Vec<_> = std::fs::read_dir(temp.path()).unwrap().collect();
    assert_eq!(all.len(), 10);
}

/// Entries survive a restart, and reads never see partial content
#[tokio::test]
async fn test_entries_survive_reopen() {
    let temp = TempDir::new().unwrap();
    let url = "https://cdn.example.org/aarti.mp3";
    {
        let cache = AudioCache::open(STREAM_NAMESPACE, temp.path(), 10_000).await.unwrap();
        cache.put(&stream_key(url), b"recorded aarti").await.unwrap();
    }

    let reopened = AudioCache::open(STREAM_NAMESPACE, temp.path(), 10_000).await.unwrap();
    // Surrounding whitespace does not change the key
    let bytes = reopened.read(&stream_key(&format!("  {}\n", url))).await.unwrap();
    assert_eq!(bytes.as_deref(), Some(&b"recorded aarti"[..]));
    assert_eq!(reopened.stats().entries, 1);
}

/// Reopening with a smaller budget trims before the cache is used
#[tokio::test]
async fn test_smaller_budget_applies_on_open() {
    let temp = TempDir::new().unwrap();
    {
        let cache = AudioCache::open(STREAM_NAMESPACE, temp.path(), 10_000).await.unwrap();
        for n in 0..4 {
            cache.put(&url_key(n), &[1; 200]).await.unwrap();
        }
    }

    let cache = AudioCache::open(STREAM_NAMESPACE, temp.path(), 300).await.unwrap();
    let stats = cache.stats();
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.total_bytes, 200);
    let survivors = (0..4).filter(|n| cache.is_cached(&url_key(*n))).count();
    assert_eq!(survivors, 1);

    cache.put(&url_key(9), &[2; 100]).await.unwrap();
    let stats = cache.stats();
    assert!(stats.total_bytes <= 300);
    assert!(cache.is_cached(&url_key(9)));
}

/// **Given:** Several tasks wanting the same missing entry
/// **Then:** Holding the key slot lets exactly one of them produce it
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_key_slot_collapses_producers() {
    let temp = TempDir::new().unwrap();
    let cache = Arc::new(AudioCache::open(STREAM_NAMESPACE, temp.path(), 10_000).await.unwrap());
    let produced = Arc::new(AtomicUsize::new(0));
    let key = url_key(42);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let cache = cache.clone();
        let produced = produced.clone();
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            let _slot = cache.lock_key(&key).await;
            if cache.get(&key).await.is_none() {
                tokio::time::sleep(Duration::from_millis(20)).await;
                produced.fetch_add(1, Ordering::SeqCst);
                cache.put(&key, b"downloaded").await.unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(produced.load(Ordering::SeqCst), 1);
    assert!(cache.is_cached(&key));
}
