//! Tool discovery: bulk-loads tools from a collection of sources.
//!
//! A source that fails to load, or a single tool that fails validation, is
//! logged and skipped; the rest of the catalog still loads.

use super::builtin::ArithmeticTools;
use super::registry::{FunctionRegistry, RegisterOptions};
use super::traits::ToolFunction;
use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// An implementation paired with its wire-format schema.
pub struct ToolExport {
    pub implementation: Arc<dyn ToolFunction>,
    pub schema: Value,
}

impl ToolExport {
    pub fn new(implementation: Arc<dyn ToolFunction>, schema: Value) -> Self {
        Self {
            implementation,
            schema,
        }
    }
}

/// A module that exports tools.
pub trait ToolSource: Send + Sync {
    /// Module label recorded on every entry it registers.
    fn module(&self) -> &str;

    /// Load the exported tools. An error skips the whole source.
    fn exports(&self) -> Result<Vec<ToolExport>>;
}

/// A tool or source that could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryFailure {
    pub module: String,
    pub tool: Option<String>,
    pub reason: String,
}

/// Outcome of [`discover`].
#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    pub loaded: Vec<String>,
    pub failed: Vec<DiscoveryFailure>,
}

impl DiscoveryReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Register every tool exported by `sources`.
pub fn discover(registry: &FunctionRegistry, sources: &[Box<dyn ToolSource>]) -> DiscoveryReport {
    let mut report = DiscoveryReport::default();

    for source in sources {
        let module = source.module();
        let exports = match source.exports() {
            Ok(exports) => exports,
            Err(e) => {
                warn!("Failed to load tool module {}: {:#}", module, e);
                report.failed.push(DiscoveryFailure {
                    module: module.to_string(),
                    tool: None,
                    reason: format!("{:#}", e),
                });
                continue;
            }
        };

        for export in exports {
            let tool_name = export.implementation.name().to_string();
            let options = RegisterOptions {
                module: Some(module),
                ..Default::default()
            };
            match registry.register_with(export.implementation, &export.schema, options) {
                Ok(name) => report.loaded.push(name),
                Err(e) => {
                    warn!("Skipping tool {} from {}: {}", tool_name, module, e);
                    report.failed.push(DiscoveryFailure {
                        module: module.to_string(),
                        tool: Some(tool_name),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!("Imported tool module: {}", module);
    }

    info!(
        "Discovered {} tool(s), {} failure(s)",
        report.loaded.len(),
        report.failed.len()
    );
    report
}

/// Sources compiled into this crate.
pub fn builtin_sources() -> Vec<Box<dyn ToolSource>> {
    vec![Box::new(ArithmeticTools)]
}

/// Startup routine: a fresh registry populated from `sources`.
pub fn build_registry(sources: &[Box<dyn ToolSource>]) -> (FunctionRegistry, DiscoveryReport) {
    let registry = FunctionRegistry::new();
    let report = discover(&registry, sources);
    (registry, report)
}
