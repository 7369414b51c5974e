//! The Deduplicator node: semantic duplicate rejection.
//!
//! Each formatted candidate is embedded (title + background) and compared
//! against the persisted corpus and against candidates already accepted
//! earlier in the same pass, so intra-batch duplicates are caught before
//! any of them reach storage. The comparison is inclusive: similarity
//! equal to the diversity threshold counts as a duplicate.
//!
//! Embedding failures never block the pipeline: the candidate passes
//! through as unique without a cached vector.

use std::sync::Arc;

use crate::diversity::SimilarityIndex;
use crate::llm::EmbeddingProvider;
use crate::storage::ScenarioRepository;
use crate::swarm::{RejectedBy, ScenarioStatus, SwarmState, WorkflowPhase};

/// Critique recorded on deduplicated-out candidates.
const DUPLICATE_CRITIQUE: &str = "too similar to an existing scenario";

/// Semantic deduplication node.
pub struct Deduplicator {
    embeddings: Option<Arc<dyn EmbeddingProvider>>,
    repository: Arc<dyn ScenarioRepository>,
}

impl Deduplicator {
    /// Create a Deduplicator over the given collaborators.
    pub fn new(
        embeddings: Option<Arc<dyn EmbeddingProvider>>,
        repository: Arc<dyn ScenarioRepository>,
    ) -> Self {
        Self {
            embeddings,
            repository,
        }
    }

    /// Split formatted candidates into unique and duplicate.
    pub async fn run(&self, state: &mut SwarmState) {
        state.set_phase(WorkflowPhase::Deduplicating);

        let indexes: Vec<usize> = state
            .candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.is_raw_draft && c.status == ScenarioStatus::Formatted)
            .map(|(i, _)| i)
            .collect();

        if indexes.is_empty() {
            tracing::info!("Deduplicator: no formatted candidates to check");
            return;
        }

        tracing::info!(candidates = indexes.len(), "Deduplicator starting");

        let corpus = match self.repository.load_all_embeddings().await {
            Ok(corpus) => corpus,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load existing embeddings");
                Vec::new()
            }
        };
        tracing::debug!(corpus = corpus.len(), "Loaded persisted embeddings");
        let mut index = SimilarityIndex::with_corpus(corpus);

        // Embedding calls may run concurrently; the decision loop below is
        // sequential over the original candidate order, so results do not
        // depend on call completion order.
        let vectors = self.embed_all(state, &indexes).await;

        let threshold = state.config.diversity_threshold;
        let mut duplicates = 0usize;
        let mut unique = 0usize;

        for (idx, vector) in indexes.into_iter().zip(vectors) {
            let candidate = &mut state.candidates[idx];
            let Some(vector) = vector else {
                // Optimistic pass-through on embedding failure.
                candidate.status = ScenarioStatus::Unique;
                unique += 1;
                continue;
            };

            let top = index.max_similarity(&vector);
            if let Some((similarity, matched)) = top {
                if similarity >= threshold {
                    tracing::debug!(
                        title = candidate.title(),
                        matched = matched,
                        similarity,
                        threshold,
                        "Duplicate found"
                    );
                    candidate.status = ScenarioStatus::Rejected;
                    candidate.rejected_by = Some(RejectedBy::Deduplicator);
                    candidate.critique = DUPLICATE_CRITIQUE.to_string();
                    state.metrics.duplicates_skipped += 1;
                    duplicates += 1;
                    continue;
                }
            }

            candidate.status = ScenarioStatus::Unique;
            candidate.embedding = Some(vector.clone());
            let title = candidate.title().to_string();
            index.push(title, vector);
            unique += 1;
        }

        tracing::info!(unique, duplicates, "Deduplicator completed");
    }

    /// Embed every candidate's dedup text, preserving candidate order.
    async fn embed_all(&self, state: &mut SwarmState, indexes: &[usize]) -> Vec<Option<Vec<f32>>> {
        let Some(provider) = &self.embeddings else {
            return vec![None; indexes.len()];
        };

        let texts: Vec<String> = indexes
            .iter()
            .map(|&i| state.candidates[i].data.dedup_text())
            .collect();

        let results =
            futures::future::join_all(texts.iter().map(|text| provider.embed(text))).await;

        let mut vectors = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(vector) => vectors.push(Some(vector)),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to embed candidate, passing through");
                    state.metrics.llm_errors += 1;
                    vectors.push(None);
                }
            }
        }
        vectors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::support::{MockRepository, ScriptedEmbeddings};
    use crate::scenario::ScenarioData;
    use crate::swarm::{ScenarioCandidate, SwarmConfig};
    use serde_json::json;

    fn formatted(title: &str, background: &str) -> ScenarioCandidate {
        let data = ScenarioData::from_value(json!({
            "title": title,
            "category": "suspicious object",
            "background": background
        }));
        ScenarioCandidate::new(data, ScenarioStatus::Formatted)
    }

    fn state(threshold: f32) -> SwarmState {
        SwarmState::new(SwarmConfig {
            diversity_threshold: threshold,
            ..SwarmConfig::new("suspicious object")
        })
    }

    #[tokio::test]
    async fn test_duplicate_against_corpus() {
        let repo = Arc::new(MockRepository::with_embeddings(vec![(
            "Existing".to_string(),
            vec![1.0, 0.0],
        )]));
        let embeddings = Arc::new(ScriptedEmbeddings::constant(vec![1.0, 0.0]));
        let dedup = Deduplicator::new(Some(embeddings), repo);

        let mut st = state(0.92);
        st.add_candidate(formatted("New but same", "identical content"));
        dedup.run(&mut st).await;

        let c = &st.candidates[0];
        assert_eq!(c.status, ScenarioStatus::Rejected);
        assert_eq!(c.rejected_by, Some(RejectedBy::Deduplicator));
        assert!(c.critique.contains("similar"));
        assert_eq!(st.metrics.duplicates_skipped, 1);
        assert!(c.embedding.is_none());
    }

    #[tokio::test]
    async fn test_unique_candidates_cache_embeddings() {
        let repo = Arc::new(MockRepository::new());
        let embeddings = Arc::new(ScriptedEmbeddings::with_rules(
            vec![
                ("Bag".to_string(), vec![1.0, 0.0]),
                ("Drone".to_string(), vec![0.0, 1.0]),
            ],
            None,
        ));
        let dedup = Deduplicator::new(Some(embeddings), repo);

        let mut st = state(0.92);
        st.add_candidate(formatted("Bag on bench", "a bag"));
        st.add_candidate(formatted("Drone overhead", "a drone"));
        dedup.run(&mut st).await;

        for c in &st.candidates {
            assert_eq!(c.status, ScenarioStatus::Unique);
            assert!(c.embedding.is_some());
        }
    }

    #[tokio::test]
    async fn test_intra_batch_duplicate_is_asymmetric() {
        let repo = Arc::new(MockRepository::new());
        let embeddings = Arc::new(ScriptedEmbeddings::constant(vec![0.6, 0.8]));
        let dedup = Deduplicator::new(Some(embeddings), repo);

        let mut st = state(0.92);
        st.add_candidate(formatted("First of pair", "same idea"));
        st.add_candidate(formatted("Second of pair", "same idea"));
        dedup.run(&mut st).await;

        // The earlier candidate wins; the later duplicate is rejected.
        assert_eq!(st.candidates[0].status, ScenarioStatus::Unique);
        assert_eq!(st.candidates[1].status, ScenarioStatus::Rejected);
        assert_eq!(st.metrics.duplicates_skipped, 1);
    }

    #[tokio::test]
    async fn test_threshold_is_inclusive() {
        let repo = Arc::new(MockRepository::with_embeddings(vec![(
            "Existing".to_string(),
            vec![2.0, 0.0],
        )]));
        // Same direction, different magnitude: similarity is exactly 1.0.
        let embeddings = Arc::new(ScriptedEmbeddings::constant(vec![1.0, 0.0]));
        let dedup = Deduplicator::new(Some(embeddings), repo);

        let mut st = state(1.0);
        st.add_candidate(formatted("Exact boundary", "x"));
        dedup.run(&mut st).await;

        assert_eq!(st.candidates[0].status, ScenarioStatus::Rejected);
    }

    #[tokio::test]
    async fn test_embedding_failure_passes_through() {
        let repo = Arc::new(MockRepository::with_embeddings(vec![(
            "Existing".to_string(),
            vec![1.0, 0.0],
        )]));
        let embeddings = Arc::new(ScriptedEmbeddings::failing());
        let dedup = Deduplicator::new(Some(embeddings), repo);

        let mut st = state(0.92);
        st.add_candidate(formatted("Unembeddable", "x"));
        dedup.run(&mut st).await;

        let c = &st.candidates[0];
        assert_eq!(c.status, ScenarioStatus::Unique);
        assert!(c.embedding.is_none(), "failed embeds are not cached");
        assert_eq!(st.metrics.llm_errors, 1);
    }

    #[tokio::test]
    async fn test_no_embedding_provider_passes_all() {
        let repo = Arc::new(MockRepository::new());
        let dedup = Deduplicator::new(None, repo);

        let mut st = state(0.92);
        st.add_candidate(formatted("A scenario", "x"));
        dedup.run(&mut st).await;

        assert_eq!(st.candidates[0].status, ScenarioStatus::Unique);
    }

    #[tokio::test]
    async fn test_ignores_non_formatted_candidates() {
        let repo = Arc::new(MockRepository::new());
        let embeddings = Arc::new(ScriptedEmbeddings::constant(vec![1.0, 0.0]));
        let dedup = Deduplicator::new(Some(embeddings.clone()), repo);

        let mut st = state(0.92);
        let mut approved = formatted("Already approved", "x");
        approved.status = ScenarioStatus::Approved;
        st.add_candidate(approved);
        dedup.run(&mut st).await;

        assert_eq!(st.candidates[0].status, ScenarioStatus::Approved);
        assert_eq!(embeddings.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }
}
