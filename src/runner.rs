//! Batch suite runner: replays natural-language queries through the gateway
//! and dispatcher and checks the resulting call chain.
//!
//! Suite file format (JSON list):
//! ```json
//! [{"query": "...", "description": "...", "expected_function": "add_num",
//!   "expected_arguments": {"num1": 2}, "next_function": {"name": "sqrt_num"}}]
//! ```

use crate::dispatch::Dispatcher;
use crate::gateway::ModelGateway;
use crate::tools::{FunctionRegistry, ToolSchema};
use crate::types::{ExecutionChain, GatewayResponse, ToolArgs};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Queries longer than this are shortened in log lines.
const QUERY_PREVIEW_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub query: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub expected_function: Option<String>,
    #[serde(default)]
    pub expected_arguments: ToolArgs,
    #[serde(default)]
    pub next_function: Option<NextFunction>,
}

/// Expected second call of a chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextFunction {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Passed,
    Failed,
    Error,
}

/// A call as the model issued it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActualCall {
    pub function: String,
    pub arguments: ToolArgs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseResult {
    pub test_index: usize,
    pub query: String,
    pub description: String,
    pub expected_function: Option<String>,
    pub expected_arguments: ToolArgs,
    pub status: CaseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub response: GatewayResponse,
    #[serde(default)]
    pub actual_chain: Vec<ActualCall>,
    #[serde(default)]
    pub execution_chain: ExecutionChain,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SuiteReport {
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub details: Vec<CaseResult>,
}

impl SuiteReport {
    pub fn total(&self) -> usize {
        self.details.len()
    }

    /// Share of passed cases, in percent.
    pub fn success_rate(&self) -> f64 {
        if self.details.is_empty() {
            return 0.0;
        }
        self.passed as f64 / self.details.len() as f64 * 100.0
    }

    fn record(&mut self, result: CaseResult) {
        match result.status {
            CaseStatus::Passed => self.passed += 1,
            CaseStatus::Failed => self.failed += 1,
            CaseStatus::Error => self.errors += 1,
        }
        self.details.push(result);
    }
}

/// Run every case in order. A failing case never stops the suite.
pub async fn run_suite(
    gateway: &ModelGateway,
    dispatcher: &Dispatcher,
    schemas: &[ToolSchema],
    cases: &[TestCase],
) -> SuiteReport {
    let mut report = SuiteReport::default();

    for (i, case) in cases.iter().enumerate() {
        let index = i + 1;
        info!("Test {}/{}: '{}'", index, cases.len(), preview(&case.query));

        let response = gateway.call(&case.query, schemas).await;
        let result = evaluate(index, case, response, dispatcher).await;

        match result.status {
            CaseStatus::Passed => info!("Test {} passed", index),
            CaseStatus::Failed => warn!(
                "Test {} failed: {}",
                index,
                result.reason.as_deref().unwrap_or_default()
            ),
            CaseStatus::Error => error!(
                "Test {} errored: {}",
                index,
                result.error.as_deref().unwrap_or_default()
            ),
        }
        report.record(result);
    }

    report
}

async fn evaluate(
    index: usize,
    case: &TestCase,
    response: GatewayResponse,
    dispatcher: &Dispatcher,
) -> CaseResult {
    let mut result = CaseResult {
        test_index: index,
        query: case.query.clone(),
        description: case.description.clone(),
        expected_function: case.expected_function.clone(),
        expected_arguments: case.expected_arguments.clone(),
        status: CaseStatus::Passed,
        reason: None,
        error: None,
        response: response.clone(),
        actual_chain: Vec::new(),
        execution_chain: ExecutionChain::new(),
    };

    let completed = match &response {
        GatewayResponse::Failed(failure) => {
            result.status = CaseStatus::Error;
            result.error = Some(failure.error.clone());
            return result;
        }
        GatewayResponse::Completed(completed) => completed,
    };

    if !completed.has_tool_calls() {
        result.status = CaseStatus::Failed;
        result.reason = Some("no function called".into());
        return result;
    }

    result.actual_chain = completed
        .tool_calls()
        .iter()
        .map(|call| ActualCall {
            function: call.function_name.clone(),
            arguments: call.arguments.clone(),
        })
        .collect();
    result.execution_chain = dispatcher.run(completed).await;

    if let Some(reason) = check_chain(case, &result.actual_chain) {
        result.status = CaseStatus::Failed;
        result.reason = Some(reason);
    }
    result
}

/// First mismatch between the expectations of `case` and `actual`.
fn check_chain(case: &TestCase, actual: &[ActualCall]) -> Option<String> {
    let first = actual.first();

    if let Some(expected) = &case.expected_function {
        let called = first.map(|c| c.function.as_str()).unwrap_or("nothing");
        if called != expected {
            return Some(format!("expected function '{}', called '{}'", expected, called));
        }
    }

    if let Some(first) = first {
        for (key, want) in &case.expected_arguments {
            match first.arguments.get(key) {
                Some(got) if got == want => {}
                got => {
                    return Some(format!(
                        "argument '{}': expected {}, got {}",
                        key,
                        want,
                        got.map(Value::to_string).unwrap_or_else(|| "nothing".into())
                    ))
                }
            }
        }
    }

    if let Some(next) = &case.next_function {
        let called = actual.get(1).map(|c| c.function.as_str()).unwrap_or("nothing");
        if called != next.name {
            return Some(format!(
                "expected sequence: {}, but called {}",
                next.name, called
            ));
        }
    }

    None
}

fn preview(query: &str) -> String {
    if query.chars().count() > QUERY_PREVIEW_CHARS {
        let head: String = query.chars().take(QUERY_PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else {
        query.to_string()
    }
}

/// Schemas to offer for `names`, or the full catalog when none are given.
///
/// Unknown names are logged and skipped; it is an error only when none of
/// them resolve.
pub fn select_schemas(registry: &FunctionRegistry, names: &[String]) -> Result<Vec<ToolSchema>> {
    if names.is_empty() {
        return Ok(registry.all_schemas());
    }
    let (schemas, missing) = registry.schemas_for(names);
    for name in &missing {
        warn!("Function '{}' not found, not offering it", name);
    }
    if schemas.is_empty() {
        bail!("None of the requested functions are registered: {}", missing.join(", "));
    }
    Ok(schemas)
}

/// Locate a suite file, falling back to `tests/suites/<path>`.
pub fn resolve_suite_path(path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    let alt = Path::new("tests").join("suites").join(path);
    if alt.exists() {
        return Ok(alt);
    }
    bail!("Test suite file '{}' not found", path.display())
}

pub fn load_suite(path: &Path) -> Result<Vec<TestCase>> {
    let path = resolve_suite_path(path)?;
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read suite {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse suite {}", path.display()))
}

/// Write `report` as `tests_<names>.json` under `dir`.
pub fn save_report(dir: &Path, function_names: &[String], report: &SuiteReport) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create results directory {}", dir.display()))?;
    let path = dir.join(format!("tests_{}.json", function_names.join("_")));
    let body = serde_json::to_string_pretty(report).context("Failed to serialize suite report")?;
    std::fs::write(&path, body)
        .with_context(|| format!("Failed to write suite report {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStore;
    use crate::error::GatewayError;
    use crate::gateway::{ModelBackend, RawReply};
    use crate::tools::{build_registry, builtin_sources};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    /// Answers from a fixed table keyed by query.
    struct ScriptedBackend;

    #[async_trait]
    impl ModelBackend for ScriptedBackend {
        fn model_id(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            query: &str,
            _tools: &[ToolSchema],
        ) -> Result<RawReply, GatewayError> {
            let message = match query {
                "add then root" => json!({
                    "tool_calls": [
                        {"id": "1", "type": "function",
                         "function": {"name": "add_num",
                                      "arguments": "{\"num1\": 7, \"num2\": 9}"}},
                        {"id": "2", "type": "function",
                         "function": {"name": "sqrt_num", "arguments": "{\"num\": 16}"}}
                    ]
                }),
                "say hi" => json!({"content": "Hi!"}),
                "root" => json!({
                    "function_call": {"name": "sqrt_num", "arguments": "{\"num\": 9}"}
                }),
                _ => return Err(GatewayError::Timeout),
            };
            Ok(RawReply {
                created: Some(0),
                message: serde_json::from_value(message).unwrap(),
            })
        }
    }

    fn case(value: Value) -> TestCase {
        serde_json::from_value(value).unwrap()
    }

    async fn run(cases: &[TestCase]) -> SuiteReport {
        let (registry, _) = build_registry(&builtin_sources());
        let schemas = registry.all_schemas();
        let dispatcher = Dispatcher::new(Arc::new(registry));
        let gateway = ModelGateway::new(Arc::new(ScriptedBackend), CacheStore::disabled());
        run_suite(&gateway, &dispatcher, &schemas, cases).await
    }

    #[tokio::test]
    async fn two_call_chain_passes() {
        let report = run(&[case(json!({
            "query": "add then root",
            "expected_function": "add_num",
            "expected_arguments": {"num1": 7},
            "next_function": {"name": "sqrt_num"}
        }))])
        .await;

        assert_eq!((report.passed, report.failed, report.errors), (1, 0, 0));
        let detail = &report.details[0];
        assert_eq!(detail.execution_chain.function_names(), vec!["add_num", "sqrt_num"]);
        assert_eq!(detail.execution_chain.records()[0].result(), Some("16"));
        assert_eq!(detail.execution_chain.records()[1].result(), Some("4.0"));
    }

    #[tokio::test]
    async fn mismatches_and_errors_are_counted_once() {
        let report = run(&[
            case(json!({"query": "say hi", "expected_function": "add_num"})),
            case(json!({"query": "root", "expected_function": "add_num"})),
            case(json!({"query": "add then root", "next_function": {"name": "add_num"}})),
            case(json!({"query": "add then root", "expected_arguments": {"num1": 1}})),
            case(json!({"query": "unknown"})),
        ])
        .await;

        assert_eq!(report.total(), 5);
        assert_eq!((report.passed, report.failed, report.errors), (0, 4, 1));
        assert_eq!(report.details[0].reason.as_deref(), Some("no function called"));
        assert!(report.details[1].reason.as_deref().unwrap().contains("called 'sqrt_num'"));
        assert!(report.details[2].reason.as_deref().unwrap().contains("expected sequence"));
        assert!(report.details[3].reason.as_deref().unwrap().contains("num1"));
        assert_eq!(report.details[4].status, CaseStatus::Error);
        assert!(report.details[4].response.is_failed());
    }

    #[test]
    fn suite_files_load_and_reports_save() {
        let dir = tempfile::tempdir().unwrap();
        let suite = dir.path().join("suite.json");
        std::fs::write(&suite, r#"[{"query": "root", "expected_function": "sqrt_num"}]"#).unwrap();

        let cases = load_suite(&suite).unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].expected_function.as_deref(), Some("sqrt_num"));
        assert!(cases[0].expected_arguments.is_empty());

        let names = vec!["sqrt_num".to_string(), "add_num".to_string()];
        let path = save_report(&dir.path().join("out"), &names, &SuiteReport::default()).unwrap();
        assert!(path.ends_with("tests_sqrt_num_add_num.json"));
        assert!(path.exists());

        assert!(load_suite(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn bundled_suite_only_expects_calls() {
        // Resolved through the tests/suites/ fallback.
        let cases = load_suite(Path::new("arithmetic.json")).unwrap();
        assert!(!cases.is_empty());
        // A reply without tool calls always fails, so every case must expect one.
        assert!(cases.iter().all(|c| c.expected_function.is_some()));
    }

    #[test]
    fn unknown_function_names_are_skipped() {
        let (registry, _) = build_registry(&builtin_sources());

        let all = select_schemas(&registry, &[]).unwrap();
        assert_eq!(all.len(), 2);

        let names = vec!["sqrt_num".to_string(), "cube_num".to_string()];
        let picked = select_schemas(&registry, &names).unwrap();
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].name, "sqrt_num");

        let err = select_schemas(&registry, &["cube_num".to_string()]).unwrap_err();
        assert!(err.to_string().contains("cube_num"));
    }

    #[test]
    fn long_queries_are_previewed() {
        let long = "x".repeat(600);
        assert_eq!(preview(&long).len(), QUERY_PREVIEW_CHARS + 3);
        assert_eq!(preview("short"), "short");
    }
}
