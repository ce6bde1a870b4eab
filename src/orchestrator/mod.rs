mod gemini;

pub use gemini::GeminiOrchestrator;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::error::ApiError;
use crate::models::QueryOutcome;

/// Where the production orchestrator writes one markdown artifact per
/// answered query.
const OUTPUT_DIR: &str = "./respostas";

/// Seam to the legal research engine. The request pipeline only ever talks
/// to this trait; the production implementation is [`GeminiOrchestrator`].
#[async_trait]
pub trait QueryOrchestrator: Send + Sync {
    async fn process_query(&self, pergunta: &str) -> Result<QueryOutcome>;
}

type OrchestratorBuilder = Box<dyn Fn() -> Result<Arc<dyn QueryOrchestrator>> + Send + Sync>;

/// Lazily-built, process-wide orchestrator reference.
///
/// First construction is serialized behind the cell: concurrent first
/// callers share a single attempt. A failed attempt is not cached; the next
/// caller runs the builder again.
pub struct OrchestratorHandle {
    cell: OnceCell<Arc<dyn QueryOrchestrator>>,
    builder: OrchestratorBuilder,
}

impl OrchestratorHandle {
    /// Production handle: builds a [`GeminiOrchestrator`] from the process
    /// environment on first use.
    pub fn from_env() -> Self {
        Self::with_builder(Box::new(|| {
            let orchestrator: Arc<dyn QueryOrchestrator> =
                Arc::new(GeminiOrchestrator::from_env(OUTPUT_DIR)?);
            Ok(orchestrator)
        }))
    }

    pub fn with_builder(builder: OrchestratorBuilder) -> Self {
        Self {
            cell: OnceCell::new(),
            builder,
        }
    }

    pub async fn get(&self) -> Result<Arc<dyn QueryOrchestrator>, ApiError> {
        self.cell
            .get_or_try_init(|| async { (self.builder)() })
            .await
            .map(Arc::clone)
            .map_err(ApiError::Initialization)
    }
}

#[cfg(test)]
pub mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use anyhow::anyhow;

    use super::*;
    use crate::models::QueryMetadata;

    /// Scripted orchestrator double with a call counter.
    pub struct StubOrchestrator {
        outcome: Result<QueryOutcome, String>,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl StubOrchestrator {
        pub fn ok(outcome: QueryOutcome) -> Arc<Self> {
            Arc::new(Self {
                outcome: Ok(outcome),
                delay: None,
                calls: AtomicUsize::new(0),
            })
        }

        pub fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                outcome: Err(message.to_string()),
                delay: None,
                calls: AtomicUsize::new(0),
            })
        }

        pub fn slow(outcome: QueryOutcome, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                outcome: Ok(outcome),
                delay: Some(delay),
                calls: AtomicUsize::new(0),
            })
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// Outcome used by the canonical happy-path scenario.
        pub fn sample_outcome() -> QueryOutcome {
            QueryOutcome {
                summary: Some("Usucapião é um modo de aquisição da propriedade.".to_string()),
                formatted_response: Some(
                    "## Usucapião\n\nAquisição da propriedade pela posse prolongada.".to_string(),
                ),
                sources_found: Some(3),
                metadata: QueryMetadata {
                    workflow_id: Some("wf_42".to_string()),
                },
            }
        }
    }

    #[async_trait]
    impl QueryOrchestrator for StubOrchestrator {
        async fn process_query(&self, _pergunta: &str) -> Result<QueryOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.outcome {
                Ok(outcome) => Ok(outcome.clone()),
                Err(message) => Err(anyhow!("{message}")),
            }
        }
    }

    /// Handle whose builder always hands out the given stub.
    pub fn handle_for(stub: Arc<StubOrchestrator>) -> Arc<OrchestratorHandle> {
        Arc::new(OrchestratorHandle::with_builder(Box::new(move || {
            let orchestrator: Arc<dyn QueryOrchestrator> = stub.clone();
            Ok(orchestrator)
        })))
    }
}
