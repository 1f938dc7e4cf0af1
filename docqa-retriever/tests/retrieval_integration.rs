use docqa_context::{Chunk, ChunkKind, ChunkingConfig, PageText};
use docqa_embed::{EmbeddingProvider, HashEmbedProvider};
use docqa_retriever::retrieval::{
    DocumentId, DocumentSession, IndexBuilder, Retriever, format_context,
};
use docqa_retriever::storage::{FileStore, IndexStore};
use docqa_retriever::{RetrievalError, RetrieverConfig};
use std::sync::Arc;
use tempfile::tempdir;

fn report_pages() -> Vec<PageText> {
    vec![
        PageText::new(1, ChunkKind::Text, "Revenue grew 12%."),
        PageText::new(2, ChunkKind::Text, "Risks include FX exposure."),
        PageText::new(3, ChunkKind::Text, "Outlook remains positive."),
    ]
}

fn provider() -> Arc<dyn EmbeddingProvider> {
    Arc::new(HashEmbedProvider::new(384))
}

#[tokio::test]
async fn test_report_question_returns_cited_context() {
    let dir = tempdir().unwrap();
    let config = RetrieverConfig {
        index_dir: dir.path().to_path_buf(),
        ..RetrieverConfig::default()
    };
    let session = DocumentSession::new(
        config.chunking.clone(),
        config.top_k,
        provider(),
        Arc::new(FileStore::new(&config.index_dir)),
    )
    .unwrap();

    session.upload("report.pdf", &report_pages()).await.unwrap();
    let chunks = session.search("What risks exist?", Some(2)).await.unwrap();

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0], Chunk::new(2, ChunkKind::Text, "Risks include FX exposure."));
    assert_eq!(
        format_context(&chunks),
        "(Page 2) Risks include FX exposure.\n\n(Page 1) Revenue grew 12%."
    );

    // Default top_k of 6 over a three-chunk document returns everything
    let all = session.search("What risks exist?", None).await.unwrap();
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn test_reloaded_index_matches_built_index() {
    let dir = tempdir().unwrap();
    let store: Arc<dyn IndexStore> = Arc::new(FileStore::new(dir.path()));
    let provider = provider();

    let chunks: Vec<Chunk> = report_pages()
        .into_iter()
        .map(|p| Chunk::new(p.page, p.kind, p.content))
        .collect();
    let id = DocumentId::derive("report.pdf", &report_pages());
    let built = IndexBuilder::new(provider.clone(), store.clone())
        .build(id.clone(), "report.pdf", chunks)
        .await
        .unwrap();

    let loaded = store.load(&id, &provider.model_metadata()).await.unwrap();
    assert_eq!(loaded.entries(), built.entries());
    assert_eq!(loaded.source_name(), "report.pdf");

    let before = Retriever::new(Arc::new(built), provider.clone(), 6).unwrap();
    let after = Retriever::new(Arc::new(loaded), provider, 6).unwrap();
    for query in ["What risks exist?", "revenue outlook", "FX"] {
        assert_eq!(
            before.search_with_scores(query, 3).await.unwrap(),
            after.search_with_scores(query, 3).await.unwrap()
        );
    }
}

#[tokio::test]
async fn test_incompatible_model_is_rejected_on_load() {
    let dir = tempdir().unwrap();
    let store = Arc::new(FileStore::new(dir.path()));
    let session = DocumentSession::new(
        ChunkingConfig::default(),
        6,
        Arc::new(HashEmbedProvider::new(384)),
        store.clone(),
    )
    .unwrap();
    let document = session.upload("report.pdf", &report_pages()).await.unwrap();
    let id = document.document_id().clone();

    let narrow = HashEmbedProvider::new(128);
    assert!(matches!(
        store.load(&id, &narrow.model_metadata()).await,
        Err(RetrievalError::DimensionMismatch {
            expected: 128,
            found: 384,
            ..
        })
    ));

    let raw = HashEmbedProvider::new(384).with_normalize(false);
    assert!(matches!(
        store.load(&id, &raw.model_metadata()).await,
        Err(RetrievalError::ModelMismatch { .. })
    ));

    // A session using the new model cannot open the old index either
    let other =
        DocumentSession::new(ChunkingConfig::default(), 6, Arc::new(narrow), store).unwrap();
    assert!(matches!(
        other.open(&id).await,
        Err(RetrievalError::DimensionMismatch { .. })
    ));
    assert!(other.active_document().await.is_none());
}

#[tokio::test]
async fn test_empty_document_leaves_no_artifacts() {
    let dir = tempdir().unwrap();
    let store = Arc::new(FileStore::new(dir.path().join("vector_store")));
    let session =
        DocumentSession::new(ChunkingConfig::default(), 6, provider(), store.clone()).unwrap();

    let blank = vec![
        PageText::new(1, ChunkKind::Text, ""),
        PageText::new(2, ChunkKind::Ocr, "  \n\t "),
    ];
    assert!(matches!(
        session.upload("scan.pdf", &blank).await,
        Err(RetrievalError::EmptyDocument { .. })
    ));
    assert!(store.list().await.unwrap().is_empty());
    assert!(!dir.path().join("vector_store").exists());
    assert!(matches!(
        session.search("anything", None).await,
        Err(RetrievalError::IndexNotFound { .. })
    ));
}

#[tokio::test]
async fn test_second_document_replaces_first() {
    let dir = tempdir().unwrap();
    let store = Arc::new(FileStore::new(dir.path()));
    let session =
        DocumentSession::new(ChunkingConfig::default(), 6, provider(), store.clone()).unwrap();

    let a = session.upload("report.pdf", &report_pages()).await.unwrap();
    let handbook = vec![
        PageText::new(1, ChunkKind::Text, "Employees accrue vacation monthly."),
        PageText::new(4, ChunkKind::Ocr, "Signed acknowledgement form."),
    ];
    let b = session.upload("handbook.pdf", &handbook).await.unwrap();
    assert_ne!(a.document_id(), b.document_id());

    let results = session.search("What risks exist?", None).await.unwrap();
    assert_eq!(results.len(), 2);
    for chunk in &results {
        assert!(handbook.iter().any(|p| p.page == chunk.page && p.content == chunk.content));
    }

    // Both indexes stay on disk under their own ids
    assert_eq!(store.list().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_long_pages_are_windowed_with_page_provenance() {
    let dir = tempdir().unwrap();
    let session = DocumentSession::new(
        ChunkingConfig::default().with_chunk_size(40).with_chunk_overlap(10),
        6,
        provider(),
        Arc::new(FileStore::new(dir.path())),
    )
    .unwrap();

    let long_text = "The audit committee reviewed treasury controls. ".repeat(5);
    let pages = vec![
        PageText::new(7, ChunkKind::Text, long_text.clone()),
        PageText::new(8, ChunkKind::Ocr, "Handwritten note about treasury."),
    ];
    let document = session.upload("audit.pdf", &pages).await.unwrap();
    assert!(document.chunk_count() > 2);

    let chunks: Vec<&Chunk> = document.index().chunks().collect();
    assert!(chunks.iter().all(|c| c.content.chars().count() <= 40));
    assert!(chunks.iter().all(|c| c.page == 7 || c.page == 8));
    assert_eq!(chunks.last().unwrap().kind, ChunkKind::Ocr);
    assert!(chunks.windows(2).all(|w| w[0].page <= w[1].page));
}

#[tokio::test]
async fn test_risk_question_on_two_page_report() {
    let session = DocumentSession::new(
        ChunkingConfig::default(),
        6,
        provider(),
        Arc::new(docqa_retriever::storage::MemoryStore::new()),
    )
    .unwrap();
    let pages = vec![
        PageText::new(1, ChunkKind::Text, "Revenue grew 10%."),
        PageText::new(1, ChunkKind::Text, "Risks include FX exposure."),
        PageText::new(2, ChunkKind::Text, "Outlook is cautious."),
    ];
    session.upload("report", &pages).await.unwrap();

    let hits = session.search_with_scores("What risks exist?", Some(2)).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].chunk.content, "Risks include FX exposure.");
    assert_eq!(hits[0].chunk.page, 1);
    assert!(hits[0].distance < hits[1].distance);
    assert!(pages.iter().any(|p| p.content == hits[1].chunk.content));
}
