//! Pipeline coordinator: one content unit from detection to persistence.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::{RunError, RunReport, RunState, RunTracker};
use crate::chunkers;
use crate::error::{ChunkError, ErrorKind, PipelineError};
use crate::extraction::{ExtractionChain, ExtractionUnit, StrategyTable};
use crate::merge::EntityMerger;
use crate::resilience::ResilientInvoker;
use crate::services::{
    AnalysisService, ContentTypeDetector, ExtensionDetector, FormatExtractor, HttpAnalysisService,
    InMemoryStore, PassthroughExtractor, Store,
};
use crate::types::{
    Chunk, ChunkRecord, ContentUnit, ExtractionOptions, ExtractionResult, PipelineConfig,
};

/// Drives a content unit through detection, chunking, extraction,
/// merging and persistence.
///
/// Chunk-level failures are contained and reported. Only an invalid
/// configuration, or a terminal failure on the first chunk that leaves
/// no usable result, aborts a run with an error.
pub struct PipelineCoordinator {
    config: PipelineConfig,
    chain: ExtractionChain,
    store: Arc<dyn Store>,
    detector: Arc<dyn ContentTypeDetector>,
    formats: Arc<dyn FormatExtractor>,
    persist: ResilientInvoker,
}

impl PipelineCoordinator {
    pub fn new(
        config: PipelineConfig,
        table: Arc<StrategyTable>,
        store: Arc<dyn Store>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            persist: ResilientInvoker::new("persist", config.storage_retry.clone()),
            chain: ExtractionChain::new(table),
            store,
            detector: Arc::new(ExtensionDetector::new()),
            formats: Arc::new(PassthroughExtractor),
            config,
        })
    }

    /// Standard strategy table, HTTP analysis when a service URL is
    /// configured, and an in-memory store.
    pub fn from_config(config: PipelineConfig) -> Result<Self, PipelineError> {
        let service = HttpAnalysisService::from_config(&config)?
            .map(|service| Arc::new(service) as Arc<dyn AnalysisService>);
        if service.is_none() {
            info!("No analysis service configured, using rule-based extraction only");
        }
        let table = Arc::new(StrategyTable::standard(&config, service));
        Self::new(config, table, Arc::new(InMemoryStore::new()))
    }

    pub fn with_detector(mut self, detector: Arc<dyn ContentTypeDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_format_extractor(mut self, formats: Arc<dyn FormatExtractor>) -> Self {
        self.formats = formats;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn chain(&self) -> &ExtractionChain {
        &self.chain
    }

    /// Read a file, detect its type, reduce it to its plain representation and run it.
    pub async fn ingest_file(
        &self,
        path: impl AsRef<Path>,
        cancel: &CancellationToken,
    ) -> Result<RunReport, PipelineError> {
        let path = path.as_ref();
        let source = path.display().to_string();
        let bytes = tokio::fs::read(path).await.map_err(|e| PipelineError::Read {
            path: source.clone(),
            message: e.to_string(),
        })?;

        let mime = self.detector.detect(&source, &bytes);
        let plain = self.formats.extract_plain(bytes, &mime);
        let content = ContentUnit::new(source, plain.bytes)
            .with_content_type(mime)
            .with_metadata(plain.metadata);
        self.run(content, cancel).await
    }

    /// Run with the configured extraction options.
    pub async fn run(
        &self,
        content: ContentUnit,
        cancel: &CancellationToken,
    ) -> Result<RunReport, PipelineError> {
        let options = self.config.extraction_options();
        self.run_with_options(content, &options, cancel).await
    }

    pub async fn run_with_options(
        &self,
        content: ContentUnit,
        options: &ExtractionOptions,
        cancel: &CancellationToken,
    ) -> Result<RunReport, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("ingest", %run_id, content_id = %content.id, source = %content.source);
        self.execute(run_id, content, options, cancel).instrument(span).await
    }

    async fn execute(
        &self,
        run_id: Uuid,
        mut content: ContentUnit,
        options: &ExtractionOptions,
        cancel: &CancellationToken,
    ) -> Result<RunReport, PipelineError> {
        let started_at = Utc::now();
        let mut tracker = RunTracker::new(run_id);

        let content_type = match content.content_type.clone() {
            Some(content_type) => content_type,
            None => {
                let detected = self.detector.detect(&content.source, &content.bytes);
                content.content_type = Some(detected.clone());
                detected
            }
        };
        info!(content_type = %content_type, bytes = content.len(), "Ingesting content");

        let chunks = self.split(&content, &mut tracker)?;
        tracker.advance(RunState::Extracting);

        let results = self.extract_all(&chunks, &content_type, options, cancel).await;
        let attempted = results.len();
        let succeeded = results.iter().filter(|r| r.succeeded).count();
        let cancelled = cancel.is_cancelled();

        let mut errors: Vec<RunError> = results
            .iter()
            .filter(|r| !r.succeeded)
            .filter_map(|r| r.failure.as_ref().map(|f| RunError::chunk(r.chunk_index, f)))
            .collect();

        if succeeded == 0 && !cancelled {
            let first_failure = results
                .first()
                .filter(|r| r.chunk_index == Some(0))
                .and_then(|r| r.failure.as_ref())
                .filter(|f| f.kind == ErrorKind::TerminalExternal);
            if let Some(failure) = first_failure {
                warn!(strategy = %failure.strategy, error = %failure.message, "First chunk failed terminally, aborting run");
                return Err(PipelineError::Aborted {
                    kind: failure.kind,
                    message: failure.message.clone(),
                });
            }
        }

        let records = chunk_records(content.id, &chunks, &results);
        let mut merger = EntityMerger::new();
        for result in results {
            merger.absorb_result(result);
        }
        let duplicates = merger.duplicate_mentions();
        let entities = merger.finish();

        let persisted = if cancelled || succeeded == 0 {
            let message = if cancelled {
                format!("run cancelled after {} of {} chunks", attempted, chunks.len())
            } else {
                format!("none of {} chunks extracted successfully", attempted)
            };
            warn!(attempted, succeeded, cancelled, "{}", message);
            errors.push(RunError::run(ErrorKind::PartialPipelineFailure, message));
            tracker.advance(RunState::PartialFailure);
            false
        } else {
            tracker.advance(RunState::Merging);
            debug!(entities = entities.len(), duplicate_mentions = duplicates, "Merged chunk results");

            tracker.advance(RunState::Persisting);
            match self
                .persist
                .invoke(|| self.store.persist(content.id, &entities, &records))
                .await
            {
                Ok(outcome) => {
                    debug!(
                        created = outcome.entities_created,
                        updated = outcome.entities_updated,
                        links = outcome.links_created,
                        mentions = outcome.mentions_added,
                        "Persisted"
                    );
                    tracker.advance(RunState::Done);
                    true
                }
                Err(e) => {
                    error!(attempts = e.attempts(), error = %e, "Persistence failed");
                    errors.push(RunError::run(e.kind(), e.to_string()));
                    tracker.advance(RunState::PartialFailure);
                    false
                }
            }
        };

        let state = tracker.state();
        info!(
            state = %state,
            chunks_attempted = attempted,
            chunks_succeeded = succeeded,
            entities = entities.len(),
            errors = errors.len(),
            "Run finished"
        );

        Ok(RunReport {
            run_id,
            content_id: content.id,
            content_type,
            state,
            done: state == RunState::Done,
            cancelled,
            persisted,
            chunks_attempted: attempted,
            chunks_succeeded: succeeded,
            entities,
            errors,
            states: tracker.history().to_vec(),
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Chunks for a content unit. Small content, and content the chunker
    /// cannot handle, is processed as one unit.
    fn split(&self, content: &ContentUnit, tracker: &mut RunTracker) -> Result<Vec<Chunk>, PipelineError> {
        if content.len() <= self.config.single_unit_threshold {
            tracker.advance(RunState::SingleUnit);
            return Ok(vec![Chunk::whole(&content.bytes)]);
        }

        tracker.advance(RunState::Chunking);
        match chunkers::chunk_with(content, &self.config.chunk_config()) {
            Ok(chunks) if !chunks.is_empty() => {
                debug!(chunks = chunks.len(), strategy = %self.config.chunk_strategy, "Chunked content");
                Ok(chunks)
            }
            Ok(_) => {
                tracker.advance(RunState::SingleUnit);
                Ok(vec![Chunk::whole(&content.bytes)])
            }
            Err(ChunkError::InvalidConfig(message)) => Err(PipelineError::Config(message)),
            Err(e) => {
                warn!(error = %e, "Chunking failed, processing as a single unit");
                tracker.advance(RunState::SingleUnit);
                Ok(vec![Chunk::whole(&content.bytes)])
            }
        }
    }

    /// Extract every chunk, at most `max_concurrent_extractions` at a time.
    ///
    /// Chunks not yet started when `cancel` fires are skipped. Results come
    /// back in chunk-index order.
    async fn extract_all(
        &self,
        chunks: &[Chunk],
        content_type: &str,
        options: &ExtractionOptions,
        cancel: &CancellationToken,
    ) -> Vec<ExtractionResult> {
        let chain = &self.chain;
        let limit = self.config.max_concurrent_extractions.max(1);

        // Built before streaming: a `&Chunk` closure inside the stream makes
        // the run future fail the `Send` check of `tokio::spawn`.
        let pending: Vec<_> = chunks
            .iter()
            .map(|chunk| async move {
                if cancel.is_cancelled() {
                    debug!(chunk = chunk.index, "Run cancelled, skipping chunk");
                    return None;
                }
                let unit = ExtractionUnit::from_chunk(chunk, content_type);
                Some(chain.extract(&unit, options).await)
            })
            .collect();

        let mut results: Vec<ExtractionResult> = stream::iter(pending)
            .buffer_unordered(limit)
            .filter_map(|result| async move { result })
            .collect()
            .await;

        results.sort_by_key(|r| r.chunk_index);
        results
    }
}

fn chunk_records(content_id: Uuid, chunks: &[Chunk], results: &[ExtractionResult]) -> Vec<ChunkRecord> {
    let mut outcomes: Vec<(usize, bool)> = vec![(0, false); chunks.len()];
    for result in results {
        if let Some(slot) = result.chunk_index.and_then(|i| outcomes.get_mut(i)) {
            *slot = (result.entities.len(), result.succeeded);
        }
    }
    chunks
        .iter()
        .zip(outcomes)
        .map(|(chunk, (entity_count, succeeded))| {
            ChunkRecord::from_chunk(content_id, chunk, entity_count, succeeded)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExtractionError, ExternalError, InvokeError};
    use crate::extraction::{ExtractionStrategy, StrategyOutput};
    use crate::types::{Entity, EntityType, Mention, RetryPolicy};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Yields one entity per chunk, or fails terminally on the listed chunks.
    struct PerChunk {
        fail_on: Vec<usize>,
    }

    #[async_trait]
    impl ExtractionStrategy for PerChunk {
        fn name(&self) -> &str {
            "ai:text"
        }

        async fn extract(
            &self,
            unit: &ExtractionUnit<'_>,
            _options: &ExtractionOptions,
        ) -> Result<StrategyOutput, ExtractionError> {
            let index = unit.index.unwrap_or(0);
            if self.fail_on.contains(&index) {
                return Err(ExtractionError::Invoke(InvokeError::Terminal {
                    source: ExternalError::Schema("unexpected payload".into()),
                    attempts: 1,
                }));
            }
            let entity = Entity::new("Acme Corp", EntityType::Organization)
                .with_mention(Mention::new(format!("chunk {}", index), unit.absolute(0), 0.9));
            Ok(StrategyOutput::new(vec![entity]))
        }
    }

    /// Rule-based fallback that never finds anything.
    struct NothingFound;

    #[async_trait]
    impl ExtractionStrategy for NothingFound {
        fn name(&self) -> &str {
            "text-rules"
        }

        async fn extract(
            &self,
            _unit: &ExtractionUnit<'_>,
            _options: &ExtractionOptions,
        ) -> Result<StrategyOutput, ExtractionError> {
            Ok(StrategyOutput::default())
        }
    }

    /// Backend that is down for every chunk.
    struct Unavailable;

    #[async_trait]
    impl ExtractionStrategy for Unavailable {
        fn name(&self) -> &str {
            "ai:text"
        }

        async fn extract(
            &self,
            _unit: &ExtractionUnit<'_>,
            _options: &ExtractionOptions,
        ) -> Result<StrategyOutput, ExtractionError> {
            Err(ExtractionError::Unavailable("analysis backend down".into()))
        }
    }

    /// Store failing transiently `failures` times before accepting writes.
    struct FlakyStore {
        failures: u32,
        calls: AtomicU32,
        inner: InMemoryStore,
    }

    #[async_trait]
    impl Store for FlakyStore {
        async fn persist(
            &self,
            content_id: Uuid,
            entities: &[Entity],
            chunks: &[ChunkRecord],
        ) -> Result<crate::services::PersistOutcome, ExternalError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(ExternalError::Locked("database is locked".into()));
            }
            self.inner.persist(content_id, entities, chunks).await
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 2,
            jitter_pct: 0,
            timeout_ms: 1_000,
        }
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            chunk_size: 10,
            chunk_overlap: 0,
            chunk_strategy: "size".to_string(),
            single_unit_threshold: 0,
            max_concurrent_extractions: 2,
            storage_retry: fast_retry(),
            ..Default::default()
        }
    }

    fn coordinator(fail_on: Vec<usize>, store: Arc<dyn Store>) -> PipelineCoordinator {
        let ai: Arc<dyn ExtractionStrategy> = Arc::new(PerChunk { fail_on });
        let rules: Arc<dyn ExtractionStrategy> = Arc::new(NothingFound);
        let table = StrategyTable::builder().register("*", vec![ai, rules]).build();
        PipelineCoordinator::new(config(), Arc::new(table), store).unwrap()
    }

    fn four_chunks() -> ContentUnit {
        ContentUnit::from_text("notes.txt", "a".repeat(40)).with_content_type("text/plain")
    }

    #[tokio::test]
    async fn test_one_failed_chunk_still_done() {
        let store = Arc::new(InMemoryStore::new());
        let coordinator = coordinator(vec![2], store.clone());
        let content = four_chunks();
        let content_id = content.id;

        let report = coordinator.run(content, &CancellationToken::new()).await.unwrap();

        assert!(report.done);
        assert_eq!(report.state, RunState::Done);
        assert_eq!(report.chunks_attempted, 4);
        assert_eq!(report.chunks_succeeded, 3);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].chunk_index, Some(2));
        assert_eq!(report.errors[0].kind, ErrorKind::TerminalExternal);

        assert_eq!(report.entities.len(), 1);
        let positions: Vec<i64> = report.entities[0].mentions.iter().map(|m| m.position).collect();
        assert_eq!(positions, vec![0, 10, 30]);

        assert!(report.persisted);
        let records = store.chunk_records(content_id);
        assert_eq!(records.len(), 4);
        assert!(!records[2].succeeded);
        assert_eq!(records[1].entity_count, 1);
        assert_eq!(
            report.states,
            vec![
                RunState::Detecting,
                RunState::Chunking,
                RunState::Extracting,
                RunState::Merging,
                RunState::Persisting,
                RunState::Done
            ]
        );
    }

    #[tokio::test]
    async fn test_terminal_failure_on_only_chunk_aborts() {
        let coordinator = coordinator(vec![0], Arc::new(InMemoryStore::new()));
        let content = ContentUnit::from_text("short.txt", "tiny").with_content_type("text/plain");
        let err = coordinator.run(content, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Aborted { kind: ErrorKind::TerminalExternal, .. }));
    }

    #[tokio::test]
    async fn test_no_successful_chunk_is_partial_failure() {
        let unavailable: Arc<dyn ExtractionStrategy> = Arc::new(Unavailable);
        let table = StrategyTable::builder().register("*", vec![unavailable]).build();
        let store = Arc::new(InMemoryStore::new());
        let coordinator = PipelineCoordinator::new(config(), Arc::new(table), store.clone()).unwrap();

        let report = coordinator.run(four_chunks(), &CancellationToken::new()).await.unwrap();
        assert!(!report.done);
        assert_eq!(report.state, RunState::PartialFailure);
        assert_eq!(report.chunks_attempted, 4);
        assert_eq!(report.chunks_succeeded, 0);
        // One per chunk plus the run-level entry
        assert_eq!(report.errors.len(), 5);
        assert_eq!(report.errors[4].kind, ErrorKind::PartialPipelineFailure);
        assert!(!report.persisted);
        assert_eq!(store.entity_count(), 0);
    }

    #[tokio::test]
    async fn test_transient_store_failure_is_retried() {
        let store = Arc::new(FlakyStore {
            failures: 2,
            calls: AtomicU32::new(0),
            inner: InMemoryStore::new(),
        });
        let coordinator = coordinator(Vec::new(), store.clone());
        let report = coordinator.run(four_chunks(), &CancellationToken::new()).await.unwrap();
        assert!(report.done);
        assert!(report.persisted);
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
        assert_eq!(store.inner.entity_count(), 1);
    }

    #[tokio::test]
    async fn test_persistence_exhausted_returns_entities() {
        let store = Arc::new(FlakyStore {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
            inner: InMemoryStore::new(),
        });
        let coordinator = coordinator(Vec::new(), store.clone());
        let report = coordinator.run(four_chunks(), &CancellationToken::new()).await.unwrap();

        assert!(!report.done);
        assert!(!report.persisted);
        assert_eq!(report.state, RunState::PartialFailure);
        assert_eq!(report.chunks_succeeded, 4);
        assert_eq!(report.entities.len(), 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].chunk_index, None);
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cancelled_run_skips_chunks_and_persistence() {
        let store = Arc::new(InMemoryStore::new());
        let coordinator = coordinator(Vec::new(), store.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = coordinator.run(four_chunks(), &cancel).await.unwrap();
        assert!(report.cancelled);
        assert!(!report.done);
        assert!(!report.persisted);
        assert_eq!(report.chunks_attempted, 0);
        assert_eq!(report.state, RunState::PartialFailure);
        assert_eq!(store.entity_count(), 0);
    }

    #[tokio::test]
    async fn test_small_content_is_single_unit() {
        let mut config = config();
        config.single_unit_threshold = 100;
        let table = StrategyTable::standard(&config, None);
        let coordinator =
            PipelineCoordinator::new(config, Arc::new(table), Arc::new(InMemoryStore::new())).unwrap();

        let content = ContentUnit::from_text("memo", "John Smith works at Acme Corp in Paris on 2024-01-05.");
        let report = coordinator.run(content, &CancellationToken::new()).await.unwrap();

        assert_eq!(report.content_type, "text/plain");
        assert_eq!(report.chunks_attempted, 1);
        assert_eq!(report.entities.len(), 4);
        assert!(report.entities.iter().all(|e| e.mentions.len() == 1));
        assert_eq!(report.states[1], RunState::SingleUnit);
    }

    #[tokio::test]
    async fn test_binary_content_yields_no_entities() {
        let table = StrategyTable::standard(&config(), None);
        let coordinator =
            PipelineCoordinator::new(config(), Arc::new(table), Arc::new(InMemoryStore::new())).unwrap();
        let content = ContentUnit::new("blob.bin", vec![0u8, 0xff, 0x13, 0x37].repeat(8));
        let report = coordinator.run(content, &CancellationToken::new()).await.unwrap();

        assert_eq!(report.content_type, "application/octet-stream");
        assert!(report.done);
        assert_eq!(report.chunks_attempted, 4);
        assert_eq!(report.chunks_succeeded, 4);
        assert!(report.entities.is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_text_degrades_to_single_unit() {
        let mut config = config();
        config.chunk_strategy = "paragraph".to_string();
        let ai: Arc<dyn ExtractionStrategy> = Arc::new(PerChunk { fail_on: Vec::new() });
        let table = StrategyTable::builder().register("*", vec![ai]).build();
        let coordinator =
            PipelineCoordinator::new(config, Arc::new(table), Arc::new(InMemoryStore::new())).unwrap();

        let content = ContentUnit::new("scan.txt", vec![b'a', 0xff, 0xfe, b'\n'].repeat(10))
            .with_content_type("text/plain");
        let report = coordinator.run(content, &CancellationToken::new()).await.unwrap();

        assert!(report.done);
        assert_eq!(report.chunks_attempted, 1);
        assert_eq!(report.chunks_succeeded, 1);
        assert_eq!(
            report.states,
            vec![
                RunState::Detecting,
                RunState::Chunking,
                RunState::SingleUnit,
                RunState::Extracting,
                RunState::Merging,
                RunState::Persisting,
                RunState::Done
            ]
        );
    }

    #[tokio::test]
    async fn test_run_inside_spawned_task() {
        let coordinator = Arc::new(coordinator(vec![2], Arc::new(InMemoryStore::new())));
        let handle = tokio::spawn({
            let coordinator = coordinator.clone();
            async move {
                let cancel = CancellationToken::new();
                coordinator.run(four_chunks(), &cancel).await
            }
        });

        let report = handle.await.unwrap().unwrap();
        assert!(report.done);
        assert_eq!(report.chunks_succeeded, 3);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let mut config = config();
        config.chunk_overlap = 10;
        let table = Arc::new(StrategyTable::builder().build());
        assert!(matches!(
            PipelineCoordinator::new(config, table, Arc::new(InMemoryStore::new())),
            Err(PipelineError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_ingest_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memo.txt");
        std::fs::write(&path, "We met Dr. Jane Doe in Berlin.").unwrap();

        let mut config = config();
        config.single_unit_threshold = 1_000;
        let table = StrategyTable::standard(&config, None);
        let coordinator =
            PipelineCoordinator::new(config, Arc::new(table), Arc::new(InMemoryStore::new())).unwrap();
        let report = coordinator.ingest_file(&path, &CancellationToken::new()).await.unwrap();

        assert_eq!(report.content_type, "text/plain");
        let names: Vec<&str> = report.entities.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"Jane Doe"));
        assert!(names.contains(&"Berlin"));

        let missing = coordinator
            .ingest_file(dir.path().join("missing.txt"), &CancellationToken::new())
            .await;
        assert!(matches!(missing, Err(PipelineError::Read { .. })));
    }
}
