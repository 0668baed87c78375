//! End-to-end versioning behavior against both repository backends.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use proptest::prelude::*;

use cellar_engine::{CellEngine, EngineConfig, EngineError, ErrorKind};
use cellar_store::{
    CellRepository, CellVersion, FileCellRepository, FileRepositoryConfig, InMemoryCellRepository,
    PairGuard, StoreResult,
};
use cellar_types::{CellAddress, Document, Namespace, RefKey};

fn users() -> Namespace {
    Namespace::new("users").unwrap()
}

fn memory_engine() -> CellEngine {
    CellEngine::new(Arc::new(InMemoryCellRepository::with_namespaces([users()])))
}

async fn file_engine(root: &std::path::Path) -> CellEngine {
    let repo = FileCellRepository::open(root, FileRepositoryConfig::default()).unwrap();
    repo.create_namespace(&users()).await.unwrap();
    CellEngine::new(Arc::new(repo))
}

fn person(first: &str, last: &str) -> Document {
    Document::map([
        ("first_name", Document::from(first)),
        ("last_name", Document::from(last)),
    ])
}

async fn zelda_then_link(engine: &CellEngine) {
    let first = engine
        .put("users", "R1", "BASIC_INFO", &person("Zelda", "Princess"))
        .await
        .unwrap();
    assert_eq!(first.ref_key().get(), 1);

    let second = engine
        .put("users", "R1", "BASIC_INFO", &person("Link", "Hero"))
        .await
        .unwrap();
    assert_eq!(second.ref_key().get(), 2);

    let latest = engine.get_latest("users", "R1", "BASIC_INFO").await.unwrap();
    assert_eq!(latest.ref_key().get(), 2);
    assert_eq!(latest.body, person("Link", "Hero"));

    let original = engine.get_exact("users", "R1", "BASIC_INFO", 1).await.unwrap();
    assert_eq!(original.body, person("Zelda", "Princess"));
    assert_eq!(original.version.row_key.as_str(), "R1");
    assert_eq!(original.version.column_key.as_str(), "BASIC_INFO");
}

#[tokio::test]
async fn zelda_and_link_in_memory() {
    zelda_then_link(&memory_engine()).await;
}

#[tokio::test]
async fn zelda_and_link_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    zelda_then_link(&file_engine(dir.path()).await).await;

    // history is intact after a restart
    let engine = CellEngine::new(Arc::new(
        FileCellRepository::open(dir.path(), FileRepositoryConfig::default()).unwrap(),
    ));
    let latest = engine.get_latest("users", "R1", "BASIC_INFO").await.unwrap();
    assert_eq!(latest.ref_key().get(), 2);
    let next = engine
        .put("users", "R1", "BASIC_INFO", &person("Ganon", "Dorf"))
        .await
        .unwrap();
    assert_eq!(next.ref_key().get(), 3);
}

#[tokio::test]
async fn empty_pair_is_absent() {
    let engine = memory_engine();
    for err in [
        engine.get_latest("users", "R9", "BASIC_INFO").await.unwrap_err(),
        engine.get_exact("users", "R9", "BASIC_INFO", 1).await.unwrap_err(),
    ] {
        assert_eq!(err.kind(), ErrorKind::CellNotFound);
    }
}

#[tokio::test]
async fn read_after_write() {
    let engine = memory_engine();
    for n in 1..=20i64 {
        let body = Document::map([("n", Document::from(n))]);
        engine.put("users", "R1", "COUNTER", &body).await.unwrap();
        let latest = engine.get_latest("users", "R1", "COUNTER").await.unwrap();
        assert_eq!(latest.ref_key().get(), n as u64);
        assert_eq!(latest.body, body);
    }
}

// ---------------------------------------------------------------------------
// Concurrent writers
// ---------------------------------------------------------------------------

async fn race_on_one_pair(engine: CellEngine, writers: usize) -> Vec<Result<u64, EngineError>> {
    let mut handles = Vec::with_capacity(writers);
    for i in 0..writers {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let body = Document::map([("writer", Document::from(i as i64))]);
            engine
                .put("users", "R1", "BASIC_INFO", &body)
                .await
                .map(|r| r.ref_key().get())
        }));
    }
    let mut results = Vec::with_capacity(writers);
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    results
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_puts_are_gapless_in_memory() {
    const K: usize = 64;
    let results = race_on_one_pair(memory_engine(), K).await;
    let mut keys: Vec<u64> = results.into_iter().map(|r| r.unwrap()).collect();
    keys.sort_unstable();
    assert_eq!(keys, (1..=K as u64).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_puts_are_gapless_on_disk() {
    const K: usize = 32;
    let dir = tempfile::tempdir().unwrap();
    let engine = file_engine(dir.path()).await;
    let results = race_on_one_pair(engine.clone(), K).await;
    let mut keys: Vec<u64> = results.into_iter().map(|r| r.unwrap()).collect();
    keys.sort_unstable();
    assert_eq!(keys, (1..=K as u64).collect::<Vec<_>>());

    let latest = engine.get_latest("users", "R1", "BASIC_INFO").await.unwrap();
    assert_eq!(latest.ref_key().get(), K as u64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn different_pairs_proceed_independently() {
    let engine = memory_engine();
    let mut handles = Vec::new();
    for row in 0..8 {
        for _ in 0..8 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                let row = format!("R{row}");
                engine
                    .put("users", &row, "A", &Document::Null)
                    .await
                    .map(|r| r.ref_key().get())
            }));
        }
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    for row in 0..8 {
        let latest = engine.get_latest("users", &format!("R{row}"), "A").await.unwrap();
        assert_eq!(latest.ref_key().get(), 8);
    }
}

/// Delegates to the in-memory backend but keeps the default `lock_pair`, so
/// only the sequencing check in `insert` stands between racing writers.
struct Unlocked(InMemoryCellRepository);

#[async_trait]
impl CellRepository for Unlocked {
    async fn insert(
        &self,
        address: &CellAddress,
        ref_key: RefKey,
        body: Vec<u8>,
    ) -> StoreResult<CellVersion> {
        tokio::task::yield_now().await;
        self.0.insert(address, ref_key, body).await
    }

    async fn find_exact(&self, address: &CellAddress, ref_key: RefKey) -> StoreResult<CellVersion> {
        self.0.find_exact(address, ref_key).await
    }

    async fn find_latest(&self, address: &CellAddress) -> StoreResult<CellVersion> {
        self.0.find_latest(address).await
    }

    async fn max_ref_key(&self, address: &CellAddress) -> StoreResult<Option<RefKey>> {
        self.0.max_ref_key(address).await
    }

    async fn create_namespace(&self, namespace: &Namespace) -> StoreResult<bool> {
        self.0.create_namespace(namespace).await
    }

    async fn namespaces(&self) -> StoreResult<Vec<Namespace>> {
        self.0.namespaces().await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn without_pair_locks_losers_see_conflict_never_gaps() {
    const K: usize = 48;
    let repo = Unlocked(InMemoryCellRepository::with_namespaces([users()]));
    let engine = CellEngine::with_config(
        Arc::new(repo),
        EngineConfig {
            max_put_attempts: 2,
            retry_backoff_ms: 0,
        },
    );

    let mut won = Vec::new();
    for result in race_on_one_pair(engine.clone(), K).await {
        match result {
            Ok(key) => won.push(key),
            Err(e) => assert_eq!(e.kind(), ErrorKind::Conflict),
        }
    }
    won.sort_unstable();
    assert!(!won.is_empty());
    assert_eq!(won, (1..=won.len() as u64).collect::<Vec<_>>());

    let latest = engine.get_latest("users", "R1", "BASIC_INFO").await.unwrap();
    assert_eq!(latest.ref_key().get(), won.len() as u64);
}

// ---------------------------------------------------------------------------
// Cancelled writers
// ---------------------------------------------------------------------------

/// Lets the file backend commit a version, then never reports back.
struct NeverAcks(Arc<FileCellRepository>);

#[async_trait]
impl CellRepository for NeverAcks {
    async fn insert(
        &self,
        address: &CellAddress,
        ref_key: RefKey,
        body: Vec<u8>,
    ) -> StoreResult<CellVersion> {
        let version = self.0.insert(address, ref_key, body).await?;
        std::future::pending::<()>().await;
        Ok(version)
    }

    async fn find_exact(&self, address: &CellAddress, ref_key: RefKey) -> StoreResult<CellVersion> {
        self.0.find_exact(address, ref_key).await
    }

    async fn find_latest(&self, address: &CellAddress) -> StoreResult<CellVersion> {
        self.0.find_latest(address).await
    }

    async fn max_ref_key(&self, address: &CellAddress) -> StoreResult<Option<RefKey>> {
        self.0.max_ref_key(address).await
    }

    async fn lock_pair(&self, address: &CellAddress) -> StoreResult<PairGuard> {
        self.0.lock_pair(address).await
    }

    async fn create_namespace(&self, namespace: &Namespace) -> StoreResult<bool> {
        self.0.create_namespace(namespace).await
    }

    async fn namespaces(&self) -> StoreResult<Vec<Namespace>> {
        self.0.namespaces().await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn put_abandoned_after_commit_leaves_no_gap() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Arc::new(FileCellRepository::open(dir.path(), FileRepositoryConfig::default()).unwrap());
    repo.create_namespace(&users()).await.unwrap();
    let engine = CellEngine::new(repo.clone());
    let stalled = CellEngine::new(Arc::new(NeverAcks(repo.clone())));

    engine
        .put("users", "R1", "BASIC_INFO", &person("Zelda", "Princess"))
        .await
        .unwrap();

    let abandoned = tokio::time::timeout(
        Duration::from_millis(100),
        stalled.put("users", "R1", "BASIC_INFO", &person("Link", "Hero")),
    )
    .await;
    assert!(abandoned.is_err());

    // The cancelled writer released the cell, and its version stands.
    let next = tokio::time::timeout(
        Duration::from_secs(2),
        engine.put("users", "R1", "BASIC_INFO", &person("Ganon", "Dorf")),
    )
    .await
    .expect("put waited on a cancelled writer")
    .unwrap();
    assert_eq!(next.ref_key().get(), 3);
    let kept = engine.get_exact("users", "R1", "BASIC_INFO", 2).await.unwrap();
    assert_eq!(kept.body, person("Link", "Hero"));

    let reopened = CellEngine::new(Arc::new(
        FileCellRepository::open(dir.path(), FileRepositoryConfig::default()).unwrap(),
    ));
    let latest = reopened.get_latest("users", "R1", "BASIC_INFO").await.unwrap();
    assert_eq!(latest.ref_key().get(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn puts_cancelled_mid_insert_never_leave_gaps() {
    let dir = tempfile::tempdir().unwrap();
    let repo = FileCellRepository::open(dir.path(), FileRepositoryConfig::default()).unwrap();
    repo.create_namespace(&users()).await.unwrap();
    let engine = CellEngine::with_config(
        Arc::new(repo),
        EngineConfig {
            max_put_attempts: 16,
            retry_backoff_ms: 5,
        },
    );

    let mut last = 0;
    for i in 0..20i64 {
        let body = Document::map([("n", Document::from(i))]);
        // Polled once: the insert is handed to the blocking pool, then dropped.
        let _ = tokio::time::timeout(Duration::ZERO, engine.put("users", "R1", "A", &body)).await;

        let done = tokio::time::timeout(
            Duration::from_secs(2),
            engine.put("users", "R1", "A", &body),
        )
        .await
        .expect("put waited on a cancelled writer")
        .unwrap();
        assert!(done.ref_key().get() > last);
        last = done.ref_key().get();
    }

    let latest = engine.get_latest("users", "R1", "A").await.unwrap();
    assert!(latest.ref_key().get() >= 20);
    for k in 1..=latest.ref_key().get() as i64 {
        engine.get_exact("users", "R1", "A", k).await.unwrap();
    }
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

fn arb_body() -> impl Strategy<Value = Document> {
    prop_oneof![
        Just(Document::Null),
        any::<bool>().prop_map(Document::Bool),
        any::<i64>().prop_map(Document::Integer),
        "[a-z ]{0,12}".prop_map(Document::String),
        (any::<i64>(), "[a-z]{0,6}").prop_map(|(n, s)| Document::map([
            ("n", Document::Integer(n)),
            ("s", Document::String(s)),
        ])),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn puts_number_each_pair_from_one(ops in prop::collection::vec((0usize..3, 0usize..2, arb_body()), 1..40)) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async {
            let engine = memory_engine();
            let mut history: HashMap<(usize, usize), Vec<Document>> = HashMap::new();

            for (row, col, body) in &ops {
                let record = engine
                    .put("users", &format!("R{row}"), &format!("C{col}"), body)
                    .await
                    .unwrap();
                let bodies = history.entry((*row, *col)).or_default();
                bodies.push(body.clone());
                assert_eq!(record.ref_key().get(), bodies.len() as u64);
                assert_eq!(&record.body, body);
            }

            for ((row, col), bodies) in &history {
                let (row, col) = (format!("R{row}"), format!("C{col}"));
                let latest = engine.get_latest("users", &row, &col).await.unwrap();
                assert_eq!(latest.ref_key().get(), bodies.len() as u64);
                for (i, body) in bodies.iter().enumerate() {
                    let exact = engine.get_exact("users", &row, &col, i as i64 + 1).await.unwrap();
                    assert_eq!(&exact.body, body);
                }
            }
        });
    }
}
