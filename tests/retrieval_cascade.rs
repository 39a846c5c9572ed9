//! Priority-cascade retrieval against an in-memory corpus

mod common;

use std::sync::Arc;

use common::{
    memory_store, seed, DownEmbedder, DownReranker, FlakyIndex, RecordingIndex, WordHashEmbedder,
};
use forensicbuddy::rag::reranking::LexicalReranker;
use forensicbuddy::rag::{CascadeTuning, HierarchicalRetriever, RerankStage, RetrievalPolicy};
use forensicbuddy::store::{
    Category, CategoryRegistry, ChunkRecord, ChunkStore, MemoryIndex, MetadataFilter,
};
use forensicbuddy::ForensicError;

const QUERY: &str = "fund allocation";

fn policy() -> RetrievalPolicy {
    RetrievalPolicy {
        n_primary: 10,
        n_secondary: 5,
        include_tertiary: false,
    }
}

async fn seeded_store(primary: usize, secondary: usize) -> ChunkStore {
    let store = memory_store();
    seed(&store, Category::CompleteAnalysis, "analysis", primary).await;
    seed(&store, Category::PortfolioFacts, "facts", secondary).await;
    seed(&store, Category::ForensicAnalysis, "forensic", secondary).await;
    seed(&store, Category::HistoricalContext, "history", 4).await;
    seed(&store, Category::ClientTimeline, "timeline", 4).await;
    store
}

#[tokio::test]
async fn test_primary_with_context_halves_secondary_budget() {
    let store = seeded_store(3, 5).await;
    let retriever =
        HierarchicalRetriever::new(store, RerankStage::disabled(), CategoryRegistry::forensic());

    let map = retriever.retrieve(QUERY, &policy()).await.unwrap();

    let (primary, results) = map.primary().unwrap();
    assert_eq!(primary, Category::CompleteAnalysis);
    assert_eq!(results.len(), 3);
    assert!(map.primary_has_context());

    assert_eq!(map.get(Category::PortfolioFacts).unwrap().len(), 2);
    assert_eq!(map.get(Category::ForensicAnalysis).unwrap().len(), 2);
    assert!(!map.contains(Category::HistoricalContext));
    assert!(!map.contains(Category::ClientTimeline));
}

#[tokio::test]
async fn test_thin_primary_keeps_full_secondary_budget() {
    let store = seeded_store(1, 5).await;
    let retriever =
        HierarchicalRetriever::new(store, RerankStage::disabled(), CategoryRegistry::forensic());

    let map = retriever.retrieve(QUERY, &policy()).await.unwrap();

    assert_eq!(map.primary().unwrap().1.len(), 1);
    assert!(!map.primary_has_context());
    assert_eq!(map.get(Category::PortfolioFacts).unwrap().len(), 5);
    assert_eq!(map.get(Category::ForensicAnalysis).unwrap().len(), 5);
}

#[tokio::test]
async fn test_tertiary_searched_only_on_request() {
    let store = seeded_store(3, 5).await;
    let retriever =
        HierarchicalRetriever::new(store, RerankStage::disabled(), CategoryRegistry::forensic());

    let map = retriever
        .retrieve(QUERY, &policy().with_tertiary(true))
        .await
        .unwrap();

    assert_eq!(map.categories().len(), 6);
    assert_eq!(map.get(Category::HistoricalContext).unwrap().len(), 2);
    assert_eq!(map.get(Category::ClientTimeline).unwrap().len(), 2);
    assert!(map.get(Category::OfficialDocs).unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_corpus_still_has_primary_key() {
    let retriever = HierarchicalRetriever::new(
        memory_store(),
        RerankStage::disabled(),
        CategoryRegistry::forensic(),
    );

    let map = retriever.retrieve(QUERY, &policy()).await.unwrap();

    assert!(map.contains(Category::CompleteAnalysis));
    assert!(map.is_empty());
    assert_eq!(
        map.categories(),
        vec![
            Category::CompleteAnalysis,
            Category::PortfolioFacts,
            Category::ForensicAnalysis
        ]
    );
}

#[tokio::test]
async fn test_rerank_outage_keeps_vector_order() {
    let store = seeded_store(3, 5).await;
    let plain =
        HierarchicalRetriever::new(store.clone(), RerankStage::disabled(), CategoryRegistry::forensic());
    let degraded = HierarchicalRetriever::new(
        store,
        RerankStage::new(Arc::new(DownReranker)),
        CategoryRegistry::forensic(),
    );

    let expected = plain.retrieve(QUERY, &policy()).await.unwrap();
    let map = degraded.retrieve(QUERY, &policy()).await.unwrap();

    for (category, results) in map.iter() {
        assert!(!results.reranked);
        assert_eq!(Some(results), expected.get(category));
    }
}

#[tokio::test]
async fn test_lexical_rerank_marks_results() {
    let store = seeded_store(3, 5).await;
    let retriever = HierarchicalRetriever::new(
        store,
        RerankStage::new(Arc::new(LexicalReranker::new())),
        CategoryRegistry::forensic(),
    );

    let map = retriever.retrieve(QUERY, &policy()).await.unwrap();
    let primary = map.primary().unwrap().1;
    assert!(primary.reranked);
    assert_eq!(primary.len(), 3);
    assert!(primary.hits.iter().all(|h| h.rerank_score.is_some()));
}

#[tokio::test]
async fn test_store_failure_aborts_retrieval() {
    let store = ChunkStore::new(
        Arc::new(WordHashEmbedder),
        Arc::new(FlakyIndex::new(Category::ForensicAnalysis)),
    );
    seed(&store, Category::CompleteAnalysis, "analysis", 3).await;
    let retriever =
        HierarchicalRetriever::new(store, RerankStage::disabled(), CategoryRegistry::forensic());

    let err = retriever.retrieve(QUERY, &policy()).await.unwrap_err();
    match err {
        ForensicError::RetrievalUnavailable { category, .. } => {
            assert_eq!(category, Category::ForensicAnalysis)
        }
        other => panic!("expected RetrievalUnavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn test_embedding_outage_is_not_an_empty_result() {
    let store = ChunkStore::new(Arc::new(DownEmbedder), Arc::new(MemoryIndex::new()));

    let err = store
        .query(Category::CompleteAnalysis, QUERY, 5, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ForensicError::RetrievalUnavailable { .. }));
}

#[tokio::test]
async fn test_clear_then_query_returns_nothing() {
    let store = seeded_store(3, 5).await;
    assert_eq!(store.count(Category::PortfolioFacts).await.unwrap(), 5);

    store.clear(Category::PortfolioFacts).await.unwrap();

    let results = store
        .query(Category::PortfolioFacts, QUERY, 5, None)
        .await
        .unwrap();
    assert!(results.is_empty());
    assert_eq!(store.count(Category::PortfolioFacts).await.unwrap(), 0);
}

#[tokio::test]
async fn test_metadata_filter_is_exact_conjunction() {
    let store = memory_store();
    let records = vec![
        ChunkRecord::new(Category::PortfolioFacts, "p01.pdf", "fund allocation P01")
            .with_portfolio("P01"),
        ChunkRecord::new(Category::PortfolioFacts, "p02.pdf", "fund allocation P02")
            .with_portfolio("P02")
            .with_page(7),
        ChunkRecord::new(Category::PortfolioFacts, "p02b.pdf", "fund allocation P02 again")
            .with_portfolio("P02")
            .with_page(9),
    ];
    store.add_batch(Category::PortfolioFacts, records).await.unwrap();

    let filter = MetadataFilter::new().eq("portfolio", "P02").eq("source_page", 7i64);
    let results = store
        .query(Category::PortfolioFacts, QUERY, 10, Some(&filter))
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results.hits[0].record.source_document, "p02.pdf");
}

#[tokio::test]
async fn test_results_sorted_by_distance() {
    let store = seeded_store(3, 5).await;
    let results = store
        .query(Category::PortfolioFacts, "facts fund allocation note number 4", 5, None)
        .await
        .unwrap();

    assert_eq!(results.len(), 5);
    assert!(results
        .hits
        .windows(2)
        .all(|pair| pair[0].distance <= pair[1].distance));
}

async fn recorded_corpus() -> (ChunkStore, Arc<RecordingIndex>) {
    let index = Arc::new(RecordingIndex::new());
    let store = ChunkStore::new(Arc::new(WordHashEmbedder), index.clone());
    seed(&store, Category::CompleteAnalysis, "analysis", 3).await;
    seed(&store, Category::PortfolioFacts, "facts", 5).await;
    seed(&store, Category::ForensicAnalysis, "forensic", 5).await;
    seed(&store, Category::HistoricalContext, "history", 4).await;
    seed(&store, Category::ClientTimeline, "timeline", 4).await;
    (store, index)
}

#[tokio::test]
async fn test_overfetch_then_rerank_per_tier() {
    let (store, index) = recorded_corpus().await;
    let retriever = HierarchicalRetriever::new(
        store,
        RerankStage::new(Arc::new(LexicalReranker::new())),
        CategoryRegistry::forensic(),
    );

    let map = retriever
        .retrieve(QUERY, &policy().with_tertiary(true))
        .await
        .unwrap();

    // primary: 2 x n_primary; secondary: 2 x halved budget; tertiary: fixed count
    assert_eq!(index.limits_for(Category::CompleteAnalysis), vec![20]);
    assert_eq!(index.limits_for(Category::PortfolioFacts), vec![4]);
    assert_eq!(index.limits_for(Category::ForensicAnalysis), vec![4]);
    for category in [
        Category::HistoricalContext,
        Category::ClientTimeline,
        Category::OfficialDocs,
    ] {
        assert_eq!(index.limits_for(category), vec![2], "{}", category);
    }

    assert!(map.primary().unwrap().1.reranked);
    assert!(map.get(Category::PortfolioFacts).unwrap().reranked);
    assert_eq!(map.get(Category::PortfolioFacts).unwrap().len(), 2);

    let tertiary = map.get(Category::HistoricalContext).unwrap();
    assert_eq!(tertiary.len(), 2);
    assert!(!tertiary.reranked);
    assert!(tertiary.hits.iter().all(|h| h.rerank_score.is_none()));
}

#[tokio::test]
async fn test_overfetch_follows_tuning() {
    let (store, index) = recorded_corpus().await;
    let retriever =
        HierarchicalRetriever::new(store, RerankStage::disabled(), CategoryRegistry::forensic())
            .with_tuning(CascadeTuning {
                overfetch_factor: 3,
                tertiary_count: 1,
                ..CascadeTuning::default()
            });

    let map = retriever
        .retrieve(QUERY, &policy().with_tertiary(true))
        .await
        .unwrap();

    assert_eq!(index.limits_for(Category::CompleteAnalysis), vec![30]);
    assert_eq!(index.limits_for(Category::PortfolioFacts), vec![6]);
    assert_eq!(index.limits_for(Category::ClientTimeline), vec![1]);
    assert_eq!(map.get(Category::PortfolioFacts).unwrap().len(), 2);
}
