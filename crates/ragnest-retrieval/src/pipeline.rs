use ragnest_core::error::{RagError, Result};
use ragnest_core::models::{
    validate_workspace_id, GenerationRequest, HealthReport, QueryOutcome, RetrievalResult, SearchOutcome,
    SourceAttribution, WorkspaceStats,
};
use ragnest_llm::GenerationEngine;
use ragnest_store::WorkspaceStore;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::context::{build_prompt, ContextAssembler};
use crate::models::{
    check_min_score, check_top_k, QueryPlan, ResolvedPlan, RetrievalSettings, StreamingQuery,
};

/// Retrieval pipeline tying workspace search to generation
///
/// Each query runs VALIDATE, RETRIEVE, ASSEMBLE_CONTEXT and GENERATE in order. One deadline
/// covers retrieval and generation.
pub struct RetrievalPipeline {
    store: Arc<dyn WorkspaceStore>,
    engine: GenerationEngine,
    settings: RetrievalSettings,
}

/// Output of the stages shared by both query variants
struct Prepared {
    sources: Vec<SourceAttribution>,
    context_length: usize,
    request: GenerationRequest,
}

impl RetrievalPipeline {
    /// Create a new retrieval pipeline
    pub fn new(
        store: Arc<dyn WorkspaceStore>,
        engine: GenerationEngine,
        settings: RetrievalSettings,
    ) -> Self {
        Self {
            store,
            engine,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn WorkspaceStore> {
        &self.store
    }

    pub fn engine(&self) -> &GenerationEngine {
        &self.engine
    }

    pub fn settings(&self) -> &RetrievalSettings {
        &self.settings
    }

    /// Answer a query with a complete response
    pub async fn query(&self, plan: &QueryPlan) -> Result<QueryOutcome> {
        let started = Instant::now();
        let resolved = plan.resolve(&self.settings)?;
        let deadline = tokio::time::Instant::now() + resolved.timeout;

        let prepared = within(deadline, resolved.timeout, "retrieve", self.prepare(&resolved)).await?;
        let output = within(
            deadline,
            resolved.timeout,
            "generate",
            self.engine.generate(prepared.request),
        )
        .await?;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            workspace_id = %resolved.workspace_id,
            user_id = %plan.user_id,
            sources = prepared.sources.len(),
            tokens = output.stats.tokens,
            elapsed_ms,
            "Query completed"
        );

        Ok(QueryOutcome {
            query: resolved.text,
            response: output.text,
            sources: prepared.sources,
            context_length: prepared.context_length,
            elapsed_ms,
            generation: output.stats,
        })
    }

    /// Answer a query incrementally
    ///
    /// Resolves once sources are known and the generation engine has been acquired.
    pub async fn query_stream(&self, plan: &QueryPlan) -> Result<StreamingQuery> {
        let started = Instant::now();
        let resolved = plan.resolve(&self.settings)?;
        let deadline = tokio::time::Instant::now() + resolved.timeout;

        let prepared = within(deadline, resolved.timeout, "retrieve", self.prepare(&resolved)).await?;
        let tokens = within(
            deadline,
            resolved.timeout,
            "generate",
            self.engine.generate_stream(prepared.request),
        )
        .await?;

        tracing::info!(
            workspace_id = %resolved.workspace_id,
            user_id = %plan.user_id,
            sources = prepared.sources.len(),
            "Streaming query started"
        );

        Ok(StreamingQuery {
            query: resolved.text,
            sources: prepared.sources,
            context_length: prepared.context_length,
            tokens,
            deadline,
            budget: resolved.timeout,
            started,
        })
    }

    /// Retrieval only, with the same defaults and bounds as a query
    pub async fn search(
        &self,
        workspace_id: &str,
        text: &str,
        top_k: Option<usize>,
        min_score: Option<f32>,
    ) -> Result<Vec<RetrievalResult>> {
        validate_workspace_id(workspace_id)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(RagError::validation("query", "must not be empty"));
        }
        let top_k = check_top_k(top_k.unwrap_or(self.settings.top_k))?;
        let min_score = check_min_score(min_score.unwrap_or(self.settings.score_threshold))?;
        let budget = self.settings.timeout;

        let outcome = within(
            tokio::time::Instant::now() + budget,
            budget,
            "retrieve",
            self.store.search(workspace_id, text, top_k, min_score),
        )
        .await?;
        Ok(outcome.into_results())
    }

    pub async fn stats(&self, workspace_id: &str) -> Result<WorkspaceStats> {
        self.store.stats(workspace_id).await
    }

    pub async fn health(&self) -> HealthReport {
        HealthReport::new(self.engine.status().clone(), self.store.mounted().await)
    }

    /// RETRIEVE and ASSEMBLE_CONTEXT
    async fn prepare(&self, plan: &ResolvedPlan) -> Result<Prepared> {
        let outcome = self
            .store
            .search(&plan.workspace_id, &plan.text, plan.top_k, plan.min_score)
            .await?;

        let results = match outcome {
            SearchOutcome::Found(results) => results,
            SearchOutcome::Empty => {
                tracing::info!(
                    workspace_id = %plan.workspace_id,
                    min_score = plan.min_score,
                    "No chunks cleared the score threshold"
                );
                return Err(RagError::NoResults {
                    workspace_id: plan.workspace_id.clone(),
                    query: plan.text.clone(),
                });
            }
        };

        let context = ContextAssembler::new(self.settings.max_context_chars).assemble(&results);
        tracing::debug!(
            workspace_id = %plan.workspace_id,
            retrieved = results.len(),
            used = context.sources.len(),
            context_length = context.length,
            "Context assembled"
        );

        Ok(Prepared {
            request: GenerationRequest::new(
                build_prompt(&context.text, &plan.text),
                plan.max_tokens,
                plan.temperature,
            ),
            sources: context.sources,
            context_length: context.length,
        })
    }
}

/// Run `work` against an absolute deadline, naming `stage` if it expires
async fn within<T>(
    deadline: tokio::time::Instant,
    budget: Duration,
    stage: &str,
    work: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout_at(deadline, work).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(stage, budget_ms = budget.as_millis() as u64, "Query deadline exceeded");
            Err(RagError::Timeout {
                stage: stage.to_string(),
                deadline: budget,
            })
        }
    }
}
