//! Model gateway: cache lookup, one remote call on miss, normalization.
//!
//! Remote failures never propagate out of [`ModelGateway::call`]; they come
//! back as [`GatewayResponse::Failed`] so batch callers can keep going.

pub mod backend;
pub mod normalize;
pub mod openai;

pub use backend::{ModelBackend, RawFunctionCall, RawMessage, RawReply, RawToolCall};
pub use normalize::normalize;
pub use openai::OpenAiBackend;

use crate::cache::{CacheKey, CacheStore};
use crate::error::GatewayError;
use crate::tools::ToolSchema;
use crate::types::{FailedResponse, FailureKind, GatewayResponse, NormalizedResponse};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct ModelGateway {
    backend: Arc<dyn ModelBackend>,
    cache: CacheStore,
}

impl ModelGateway {
    pub fn new(backend: Arc<dyn ModelBackend>, cache: CacheStore) -> Self {
        Self { backend, cache }
    }

    pub fn model_id(&self) -> &str {
        self.backend.model_id()
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Ask the model about `query`, offering `catalog` as tools.
    ///
    /// A cache hit returns the stored record without contacting the model.
    /// Only successful responses are cached.
    pub async fn call(&self, query: &str, catalog: &[ToolSchema]) -> GatewayResponse {
        let key = CacheKey::derive(query, catalog);

        if let Some(record) = self.cache.get::<NormalizedResponse>(&key) {
            info!("Cache hit for query ({})", key.as_str());
            return GatewayResponse::Completed(record);
        }
        if self.cache.is_enabled() {
            debug!("Cache miss for query ({})", key.as_str());
        }

        let response = self.call_uncached(query, catalog).await;
        if let GatewayResponse::Completed(record) = &response {
            self.cache.set(&key, record);
        }
        response
    }

    /// One remote round trip, bypassing the cache entirely.
    pub async fn call_uncached(&self, query: &str, catalog: &[ToolSchema]) -> GatewayResponse {
        match self.request(query, catalog).await {
            Ok(record) => GatewayResponse::Completed(record),
            Err(e) => {
                warn!("Model call failed: {}", e);
                GatewayResponse::Failed(FailedResponse {
                    user_query: query.to_string(),
                    kind: failure_kind(&e),
                    error: e.to_string(),
                    functions_called: catalog.iter().map(|s| s.name.clone()).collect(),
                })
            }
        }
    }

    async fn request(
        &self,
        query: &str,
        catalog: &[ToolSchema],
    ) -> Result<NormalizedResponse, GatewayError> {
        let reply = self.backend.complete(query, catalog).await?;
        let response = normalize(query, self.backend.model_id(), reply, catalog)?;
        info!(
            "Model {} answered with {} tool call(s)",
            response.model_id,
            response.tool_calls().len()
        );
        Ok(response)
    }
}

fn failure_kind(err: &GatewayError) -> FailureKind {
    match err {
        GatewayError::Transport(_) => FailureKind::Transport,
        GatewayError::Timeout => FailureKind::Timeout,
        GatewayError::Status { .. } => FailureKind::Status,
        GatewayError::Protocol(_) => FailureKind::Protocol,
    }
}
