//! End-to-end pipeline behaviour over generated PDFs, with in-process model doubles.

mod common;

use std::path::Path;
use std::sync::Arc;

use common::{write_pdf, CannedModel, DownEmbedder, HashEmbedder};
use jurag_core::{
    ConfigError, IngestionError, InitReport, Pipeline, PipelineError, PipelineSettings,
    SourceRef, StoreError, VectorStore,
};
use jurag_core::store::INDEX_FILENAME;

fn settings(pdf_dir: &Path, index_path: &Path) -> PipelineSettings {
    PipelineSettings::new(pdf_dir, index_path).with_chunking(1000, 150)
}

#[tokio::test]
async fn ask_before_initialize_is_not_ready() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = Arc::new(HashEmbedder::new());
    let llm = Arc::new(CannedModel::new("unused"));
    let pipeline = Pipeline::new(
        settings(dir.path(), &dir.path().join("idx")),
        embedder.clone(),
        llm.clone(),
    );

    let err = pipeline.ask("anything?").await.unwrap_err();
    assert!(matches!(err, PipelineError::NotReady));
    assert!(!pipeline.is_ready());
    assert_eq!(embedder.single_calls(), 0);
    assert_eq!(embedder.batch_calls(), 0);
    assert_eq!(llm.calls(), 0);
    assert!(!dir.path().join("idx").exists());
}

#[tokio::test]
async fn single_page_contract_is_answered_with_its_source() {
    let dir = tempfile::tempdir().unwrap();
    let pdf_dir = dir.path().join("data");
    std::fs::create_dir(&pdf_dir).unwrap();
    let pdf_path = pdf_dir.join("contract.pdf");
    write_pdf(&pdf_path, &["The contract expires in 2026."]);

    let embedder = Arc::new(HashEmbedder::new());
    let llm = Arc::new(CannedModel::new("The contract expires in 2026."));
    let mut pipeline = Pipeline::new(
        settings(&pdf_dir, &dir.path().join("docs_index")),
        embedder.clone(),
        llm.clone(),
    );

    let report = pipeline.initialize().await.unwrap();
    assert_eq!(
        report,
        InitReport::Built {
            pages: 1,
            chunks: 1,
            skipped_files: 0
        }
    );
    assert_eq!(pipeline.indexed_chunks(), Some(1));

    let answer = pipeline.ask("When does the contract expire?").await.unwrap();
    assert_eq!(answer.text, "The contract expires in 2026.");
    assert_eq!(answer.sources, vec![SourceRef::new(&pdf_path, Some(1))]);

    let prompt = llm.prompts.lock().unwrap()[0].clone();
    assert!(prompt.contains("2026"));
    assert!(prompt.contains("When does the contract expire?"));
}

#[tokio::test]
async fn second_initialize_reuses_persisted_index() {
    let dir = tempfile::tempdir().unwrap();
    let pdf_dir = dir.path().join("data");
    std::fs::create_dir(&pdf_dir).unwrap();
    write_pdf(&pdf_dir.join("a.pdf"), &["Payment is due within thirty days.", "Late fees apply."]);
    let index_path = dir.path().join("docs_index");

    let embedder = Arc::new(HashEmbedder::new());
    let llm = Arc::new(CannedModel::new("ok"));

    let mut first = Pipeline::new(settings(&pdf_dir, &index_path), embedder.clone(), llm.clone());
    assert!(matches!(first.initialize().await.unwrap(), InitReport::Built { pages: 2, .. }));
    let batches_after_build = embedder.batch_calls();
    assert!(batches_after_build >= 1);
    assert!(VectorStore::exists(&index_path));

    // Same instance: no work at all.
    assert!(matches!(
        first.initialize().await.unwrap(),
        InitReport::AlreadyReady { chunks: 2 }
    ));

    // Fresh instance, as on the next process start: restore without re-embedding.
    let mut second = Pipeline::new(settings(&pdf_dir, &index_path), embedder.clone(), llm.clone());
    assert_eq!(
        second.initialize().await.unwrap(),
        InitReport::Restored { chunks: 2 }
    );
    assert_eq!(embedder.batch_calls(), batches_after_build);

    let a = first.ask("When is payment due?").await.unwrap();
    let b = second.ask("When is payment due?").await.unwrap();
    assert_eq!(a.sources, b.sources);
}

#[tokio::test]
async fn three_topics_rank_the_matching_document_first() {
    let dir = tempfile::tempdir().unwrap();
    let pdf_dir = dir.path().join("data");
    std::fs::create_dir(&pdf_dir).unwrap();
    write_pdf(&pdf_dir.join("1_orchard.pdf"), &["Apple orchard harvest yields ripe fruit every autumn."]);
    write_pdf(&pdf_dir.join("2_rocket.pdf"), &["Rocket launch places satellite into stable orbit."]);
    write_pdf(&pdf_dir.join("3_violin.pdf"), &["Violin soloist joins orchestra for symphony concert."]);

    let embedder = Arc::new(HashEmbedder::new());
    let llm = Arc::new(CannedModel::new("Rockets put satellites in orbit."));
    let mut pipeline = Pipeline::new(
        settings(&pdf_dir, &dir.path().join("docs_index")).with_top_k(3),
        embedder,
        llm,
    );
    pipeline.initialize().await.unwrap();

    let answer = pipeline.ask("Which rocket put the satellite into orbit?").await.unwrap();
    assert_eq!(answer.sources.len(), 3);
    assert_eq!(answer.sources[0], SourceRef::new(pdf_dir.join("2_rocket.pdf"), Some(1)));
}

#[tokio::test]
async fn missing_pdf_directory_fails_ingestion() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = Pipeline::new(
        settings(&dir.path().join("nope"), &dir.path().join("idx")),
        Arc::new(HashEmbedder::new()),
        Arc::new(CannedModel::new("ok")),
    );
    let err = pipeline.initialize().await.unwrap_err();
    assert!(matches!(err, PipelineError::Ingestion(IngestionError::NotFound(_))));
    assert!(!pipeline.is_ready());
    assert!(!VectorStore::exists(&dir.path().join("idx")));
}

#[tokio::test]
async fn invalid_chunking_fails_before_any_work() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = Arc::new(HashEmbedder::new());
    let mut pipeline = Pipeline::new(
        PipelineSettings::new(dir.path(), dir.path().join("idx")).with_chunking(100, 100),
        embedder.clone(),
        Arc::new(CannedModel::new("ok")),
    );
    let err = pipeline.initialize().await.unwrap_err();
    assert!(matches!(err, PipelineError::Config(ConfigError::OverlapTooLarge { .. })));
    assert_eq!(embedder.batch_calls(), 0);
}

#[tokio::test]
async fn embedding_outage_surfaces_and_persists_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let pdf_dir = dir.path().join("data");
    std::fs::create_dir(&pdf_dir).unwrap();
    write_pdf(&pdf_dir.join("a.pdf"), &["Some clause."]);
    let index_path = dir.path().join("docs_index");

    let mut pipeline = Pipeline::new(
        settings(&pdf_dir, &index_path),
        Arc::new(DownEmbedder),
        Arc::new(CannedModel::new("ok")),
    );
    let err = pipeline.initialize().await.unwrap_err();
    assert!(matches!(err, PipelineError::Embedding(_)));
    assert!(!VectorStore::exists(&index_path));
}

#[tokio::test]
async fn index_from_another_model_is_rejected_as_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let index_path = dir.path().join("docs_index");
    VectorStore::new("some-other-model", 3).persist(&index_path).unwrap();

    let mut pipeline = Pipeline::new(
        settings(dir.path(), &index_path),
        Arc::new(HashEmbedder::new()),
        Arc::new(CannedModel::new("ok")),
    );
    let err = pipeline.initialize().await.unwrap_err();
    assert!(matches!(err, PipelineError::Store(StoreError::Corrupt { .. })));
}

#[tokio::test]
async fn broken_pdf_is_skipped_and_the_rest_indexed() {
    let dir = tempfile::tempdir().unwrap();
    let pdf_dir = dir.path().join("data");
    std::fs::create_dir(&pdf_dir).unwrap();
    write_pdf(&pdf_dir.join("good.pdf"), &["Termination requires written notice."]);
    std::fs::write(pdf_dir.join("bad.pdf"), "not really a pdf").unwrap();

    let mut pipeline = Pipeline::new(
        settings(&pdf_dir, &dir.path().join("docs_index")),
        Arc::new(HashEmbedder::new()),
        Arc::new(CannedModel::new("Written notice.")),
    );
    let report = pipeline.initialize().await.unwrap();
    assert_eq!(
        report,
        InitReport::Built {
            pages: 1,
            chunks: 1,
            skipped_files: 1
        }
    );
}

#[tokio::test]
async fn blank_question_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let pdf_dir = dir.path().join("data");
    std::fs::create_dir(&pdf_dir).unwrap();
    write_pdf(&pdf_dir.join("a.pdf"), &["Some clause."]);
    let embedder = Arc::new(HashEmbedder::new());
    let llm = Arc::new(CannedModel::new("ok"));
    let mut pipeline = Pipeline::new(settings(&pdf_dir, &dir.path().join("idx")), embedder.clone(), llm.clone());
    pipeline.initialize().await.unwrap();

    assert!(matches!(pipeline.ask("   ").await, Err(PipelineError::EmptyQuestion)));
    assert_eq!(embedder.single_calls(), 0);
    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn unreadable_corpus_is_not_persisted_and_later_pdfs_get_indexed() {
    let dir = tempfile::tempdir().unwrap();
    let pdf_dir = dir.path().join("data");
    std::fs::create_dir(&pdf_dir).unwrap();
    std::fs::write(pdf_dir.join("bad.pdf"), "this is not a pdf at all").unwrap();
    let index_path = dir.path().join("docs_index");
    let embedder = Arc::new(HashEmbedder::new());

    let mut first = Pipeline::new(
        settings(&pdf_dir, &index_path),
        embedder.clone(),
        Arc::new(CannedModel::new("ok")),
    );
    let err = first.initialize().await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Ingestion(IngestionError::EmptyCorpus { skipped: 1, .. })
    ));
    assert!(!first.is_ready());
    assert!(!VectorStore::exists(&index_path));
    assert_eq!(embedder.batch_calls(), 0);

    let good = pdf_dir.join("good.pdf");
    write_pdf(&good, &["The contract expires in 2026."]);
    let mut second = Pipeline::new(
        settings(&pdf_dir, &index_path),
        embedder.clone(),
        Arc::new(CannedModel::new("In 2026.")),
    );
    assert!(matches!(
        second.initialize().await.unwrap(),
        InitReport::Built { pages: 1, chunks: 1, skipped_files: 1 }
    ));
    let answer = second.ask("When does the contract expire?").await.unwrap();
    assert_eq!(answer.sources, vec![SourceRef::new(&good, Some(1))]);
}

#[tokio::test]
async fn empty_directory_fails_ingestion() {
    let dir = tempfile::tempdir().unwrap();
    let pdf_dir = dir.path().join("data");
    std::fs::create_dir(&pdf_dir).unwrap();
    let mut pipeline = Pipeline::new(
        settings(&pdf_dir, &dir.path().join("idx")),
        Arc::new(HashEmbedder::new()),
        Arc::new(CannedModel::new("ok")),
    );
    let err = pipeline.initialize().await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Ingestion(IngestionError::EmptyCorpus { skipped: 0, .. })
    ));
}

#[tokio::test]
async fn failed_rebuild_keeps_the_persisted_index() {
    let dir = tempfile::tempdir().unwrap();
    let pdf_dir = dir.path().join("data");
    std::fs::create_dir(&pdf_dir).unwrap();
    write_pdf(&pdf_dir.join("a.pdf"), &["Payment is due within thirty days."]);
    let index_path = dir.path().join("docs_index");
    let embedder = Arc::new(HashEmbedder::new());
    let llm = Arc::new(CannedModel::new("ok"));

    let mut pipeline = Pipeline::new(settings(&pdf_dir, &index_path), embedder.clone(), llm.clone());
    pipeline.initialize().await.unwrap();
    let before = std::fs::read(index_path.join(INDEX_FILENAME)).unwrap();

    // Embedding service down during the rebuild.
    let mut down = Pipeline::new(settings(&pdf_dir, &index_path), Arc::new(DownEmbedder), llm.clone());
    let err = down.rebuild().await.unwrap_err();
    assert!(matches!(err, PipelineError::Embedding(_)));
    assert!(!down.is_ready());
    assert_eq!(std::fs::read(index_path.join(INDEX_FILENAME)).unwrap(), before);

    // Invalid settings are rejected before anything is touched.
    let mut invalid = Pipeline::new(
        settings(&pdf_dir, &index_path).with_chunking(100, 100),
        embedder.clone(),
        llm.clone(),
    );
    assert!(matches!(invalid.rebuild().await, Err(PipelineError::Config(_))));
    assert_eq!(std::fs::read(index_path.join(INDEX_FILENAME)).unwrap(), before);

    let mut fresh = Pipeline::new(settings(&pdf_dir, &index_path), embedder, llm);
    assert_eq!(fresh.initialize().await.unwrap(), InitReport::Restored { chunks: 1 });
}

#[tokio::test]
async fn rebuild_replaces_the_persisted_index() {
    let dir = tempfile::tempdir().unwrap();
    let pdf_dir = dir.path().join("data");
    std::fs::create_dir(&pdf_dir).unwrap();
    write_pdf(&pdf_dir.join("a.pdf"), &["Payment is due within thirty days."]);
    let index_path = dir.path().join("docs_index");
    let embedder = Arc::new(HashEmbedder::new());
    let llm = Arc::new(CannedModel::new("ok"));

    let mut pipeline = Pipeline::new(settings(&pdf_dir, &index_path), embedder.clone(), llm.clone());
    pipeline.initialize().await.unwrap();
    assert_eq!(pipeline.indexed_chunks(), Some(1));

    write_pdf(&pdf_dir.join("b.pdf"), &["Late fees apply after the due date."]);
    assert_eq!(
        pipeline.rebuild().await.unwrap(),
        InitReport::Built {
            pages: 2,
            chunks: 2,
            skipped_files: 0
        }
    );
    assert_eq!(pipeline.indexed_chunks(), Some(2));

    let mut fresh = Pipeline::new(settings(&pdf_dir, &index_path), embedder, llm);
    assert_eq!(fresh.initialize().await.unwrap(), InitReport::Restored { chunks: 2 });
}
