//! Dispatcher: executes a response's tool calls against the registry.
//!
//! Calls run strictly in arrival order since later calls may depend on the
//! side effects of earlier ones. A failing call is recorded and the chain
//! moves on. Cancellation stops further calls but never undoes finished ones.

use crate::deadline::Deadline;
use crate::error::RegistryError;
use crate::tools::FunctionRegistry;
use crate::types::{
    CanonicalToolCall, ExecutionChain, ExecutionRecord, NormalizedResponse, ToolArgs,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Error recorded for calls skipped after cancellation.
pub const CANCELLED: &str = "cancelled before execution";

/// Where a response stands with respect to dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Text-only reply; nothing to execute.
    NoToolCalls,
    /// The reply carries this many calls.
    HasToolCalls(usize),
}

impl DispatchState {
    pub fn of(response: &NormalizedResponse) -> Self {
        match response.tool_calls().len() {
            0 => Self::NoToolCalls,
            n => Self::HasToolCalls(n),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<FunctionRegistry>,
    chain_timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(registry: Arc<FunctionRegistry>) -> Self {
        Self {
            registry,
            chain_timeout: None,
        }
    }

    /// Bound a whole chain by one shared budget.
    pub fn with_chain_timeout(mut self, budget: Option<Duration>) -> Self {
        self.chain_timeout = budget;
        self
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Execute a single tool directly.
    pub async fn execute(&self, name: &str, args: ToolArgs) -> Result<String, RegistryError> {
        self.registry.execute(name, args).await
    }

    /// Execute every tool call in `response`.
    pub async fn run(&self, response: &NormalizedResponse) -> ExecutionChain {
        self.run_with_cancel(response, &CancellationToken::new()).await
    }

    pub async fn run_with_cancel(
        &self,
        response: &NormalizedResponse,
        cancel: &CancellationToken,
    ) -> ExecutionChain {
        match DispatchState::of(response) {
            DispatchState::NoToolCalls => {
                info!("Response carries no tool calls");
                ExecutionChain::new()
            }
            DispatchState::HasToolCalls(n) => {
                info!("Dispatching {} tool call(s)", n);
                self.run_calls(response.tool_calls(), cancel).await
            }
        }
    }

    /// Execute `calls` in order, one record per call.
    pub async fn run_calls(
        &self,
        calls: &[CanonicalToolCall],
        cancel: &CancellationToken,
    ) -> ExecutionChain {
        let deadline = self.chain_timeout.map(Deadline::new);
        let mut chain = ExecutionChain::new();

        for (idx, call) in calls.iter().enumerate() {
            let name = call.function_name.as_str();

            if cancel.is_cancelled() {
                warn!("Dispatch cancelled, skipping call {}: {}", idx + 1, name);
                chain.push(ExecutionRecord::failure(name, CANCELLED));
                continue;
            }

            info!(
                "Call {}: {}({})",
                idx + 1,
                name,
                serde_json::Value::Object(call.arguments.clone())
            );

            let outcome = match &deadline {
                Some(deadline) => self.execute_within(deadline, name, call.arguments.clone()).await,
                None => self
                    .execute(name, call.arguments.clone())
                    .await
                    .map_err(|e| e.to_string()),
            };

            match outcome {
                Ok(result) => {
                    info!("Result of {}: {}", name, result);
                    chain.push(ExecutionRecord::success(name, result));
                }
                Err(message) => {
                    warn!("Execution of {} failed: {}", name, message);
                    chain.push(ExecutionRecord::failure(name, message));
                }
            }
        }

        chain
    }

    /// Execute one call against the shared budget.
    ///
    /// A call that returns after the budget ran out is reported as timed out,
    /// even if the tool itself finished.
    async fn execute_within(
        &self,
        deadline: &Deadline,
        name: &str,
        args: ToolArgs,
    ) -> Result<String, String> {
        let result = deadline
            .run(self.execute(name, args))
            .await
            .map_err(|e| e.to_string())?;
        deadline.remaining().map_err(|e| e.to_string())?;
        result.map_err(|e| e.to_string())
    }
}
