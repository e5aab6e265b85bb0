// HTTP route handlers for the Arbiter API

use arbiter_common::types::{ExecutionRequest, Language, Problem, ValidationSummary};
use arbiter_engine::{EngineError, Validator};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::metrics::{self, FAULT};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub code: Option<String>,
    pub language: Option<String>,
    pub input: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub code: Option<String>,
    pub language: Option<String>,
    pub problem_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct SubmitResponse {
    success: bool,
    #[serde(flatten)]
    summary: ValidationSummary,
}

fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({
            "success": false,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Empty strings count as missing
fn present(field: Option<String>) -> Option<String> {
    field.filter(|value| !value.trim().is_empty())
}

fn engine_failure(e: &EngineError) -> Response {
    let status = match e {
        EngineError::UnsupportedLanguage(_) => StatusCode::BAD_REQUEST,
        EngineError::Cancelled | EngineError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::Workspace(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    failure(status, e.to_string())
}

/// POST /api/code/run - Execute code with raw stdin input
pub async fn run_code(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RunRequest>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return failure(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    let (Some(code), Some(language)) = (present(payload.code), present(payload.language)) else {
        return failure(StatusCode::BAD_REQUEST, "Code and language are required");
    };
    let language: Language = match language.parse() {
        Ok(language) => language,
        Err(e) => return failure(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let request = ExecutionRequest::new(code, language).with_input(payload.input.unwrap_or_default());
    match state.engine.execute(&request).await {
        Ok(result) => {
            state.metrics.record_execution(language, &result);
            info!(
                language = %language,
                status = %result.status,
                elapsed_ms = result.elapsed_ms,
                "Run completed"
            );
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "success": true,
                    "result": result,
                })),
            )
                .into_response()
        }
        Err(e) => {
            state.metrics.record_execution_fault(language);
            error!(language = %language, error = %e, "Run failed");
            engine_failure(&e)
        }
    }
}

/// POST /api/code/submit - Grade code against every example of a problem
pub async fn submit_code(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return failure(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    let (Some(code), Some(language), Some(problem_id)) = (
        present(payload.code),
        present(payload.language),
        present(payload.problem_id),
    ) else {
        return failure(StatusCode::BAD_REQUEST, "Code, language, and problemId are required");
    };
    let language: Language = match language.parse() {
        Ok(language) => language,
        Err(e) => return failure(StatusCode::BAD_REQUEST, e.to_string()),
    };
    let Some(problem) = state.catalog.get(&problem_id) else {
        warn!(problem_id = %problem_id, "Submission for unknown problem");
        return failure(StatusCode::NOT_FOUND, "Problem not found");
    };

    let validator = Validator::new(&state.engine);
    match validator.validate(&code, language, problem).await {
        Ok(summary) => {
            let outcome = if summary.all_passed { "accepted" } else { "rejected" };
            state.metrics.record_submission(language, outcome);
            info!(
                problem_id = %problem_id,
                language = %language,
                passed = summary.passed_count,
                total = summary.total_tests,
                "Submission graded"
            );
            (
                StatusCode::OK,
                Json(SubmitResponse {
                    success: true,
                    summary,
                }),
            )
                .into_response()
        }
        Err(e) => {
            state.metrics.record_submission(language, FAULT);
            error!(problem_id = %problem_id, language = %language, error = %e, "Submission failed");
            engine_failure(&e)
        }
    }
}

/// GET /api/problems - List problems without starter code
pub async fn list_problems(State(state): State<Arc<AppState>>) -> Response {
    let problems: Vec<Problem> = state
        .catalog
        .problems()
        .iter()
        .cloned()
        .map(|mut problem| {
            problem.starter_code.clear();
            problem
        })
        .collect();

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "success": true,
            "count": problems.len(),
            "problems": problems,
        })),
    )
        .into_response()
}

/// GET /api/problems/{problemId}
pub async fn get_problem(
    State(state): State<Arc<AppState>>,
    Path(problem_id): Path<String>,
) -> Response {
    match state.catalog.get(&problem_id) {
        Some(problem) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "problem": problem,
            })),
        )
            .into_response(),
        None => failure(StatusCode::NOT_FOUND, "Problem not found"),
    }
}

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "OK",
            "message": "Arbiter is running",
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}

/// GET /metrics - Prometheus text exposition
pub async fn export_metrics(State(state): State<Arc<AppState>>) -> Response {
    match metrics::render(&state.registry) {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metrics;
    use arbiter_common::catalog::ProblemCatalog;
    use arbiter_engine::workspace::Workspace;
    use arbiter_engine::{CommandTemplate, Engine, ExecutionLimits, LanguageConfig, LanguageConfigManager};
    use prometheus::Registry;
    use serde_json::Value;

    const CATALOG: &str = r#"{"problems": [{
        "id": "sum",
        "title": "Sum",
        "functionName": "sum",
        "examples": [
            {"input": {"a": 2, "b": 3}, "output": 5},
            {"input": {"a": 1, "b": 1}, "output": 2}
        ],
        "starterCode": {"python": "def sum(a, b):\n    pass"}
    }]}"#;

    /// Python runs through `sh`; a verdict script stands in for the harness when `verdict` is set
    fn state(verdict: Option<&str>) -> Arc<AppState> {
        let run = match verdict {
            Some(script) => CommandTemplate::new("sh", &["-c", script]),
            None => CommandTemplate::new("sh", &["{source}"]),
        };
        let toolchains = LanguageConfigManager::from_configs(vec![LanguageConfig {
            name: Language::Python,
            version: "test".to_string(),
            file_extension: "py".to_string(),
            compile: None,
            run,
        }])
        .unwrap();
        let engine = Engine::new(
            toolchains,
            Workspace::create(None).unwrap(),
            ExecutionLimits::default(),
            2,
        );
        let registry = Registry::new();
        Arc::new(AppState {
            engine,
            catalog: ProblemCatalog::from_json(CATALOG).unwrap(),
            metrics: Metrics::register(&registry).unwrap(),
            registry,
        })
    }

    fn run_body(raw: Value) -> Result<Json<RunRequest>, JsonRejection> {
        Ok(Json(serde_json::from_value(raw).unwrap()))
    }

    fn submit_body(raw: Value) -> Result<Json<SubmitRequest>, JsonRejection> {
        Ok(Json(serde_json::from_value(raw).unwrap()))
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_run_passes_input_through() {
        let state = state(None);
        let response = run_code(
            State(state.clone()),
            run_body(serde_json::json!({
                "code": "read line\necho \"got $line\"",
                "language": "python",
                "input": "abc\n"
            })),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["result"]["status"], "Success");
        assert_eq!(body["result"]["stdout"], "got abc\n");
        assert_eq!(body["result"]["memoryKb"], 0);
    }

    #[tokio::test]
    async fn test_run_requires_code_and_language() {
        let state = state(None);
        let response = run_code(
            State(state.clone()),
            run_body(serde_json::json!({"code": "", "language": "python"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Code and language are required");

        let response = run_code(State(state), run_body(serde_json::json!({"code": "echo"}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_run_rejects_unknown_language() {
        let response = run_code(
            State(state(None)),
            run_body(serde_json::json!({"code": "puts 1", "language": "ruby"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["message"], "Unsupported language: ruby");
    }

    #[tokio::test]
    async fn test_run_unconfigured_language_is_bad_request() {
        let response = run_code(
            State(state(None)),
            run_body(serde_json::json!({"code": "console.log(1)", "language": "javascript"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_submit_flattens_summary() {
        let state = state(Some("printf '5\\n==ARBITER-VERDICT v1==\\nPASS\\n'"));
        let response = submit_code(
            State(state.clone()),
            submit_body(serde_json::json!({
                "code": "def sum(a, b):\n    return a + b",
                "language": "python",
                "problemId": "sum"
            })),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["allPassed"], true);
        assert_eq!(body["totalTests"], 2);
        assert_eq!(body["passedCount"], 2);
        assert_eq!(body["message"], "All test cases passed!");
        assert_eq!(body["testOutcomes"][0]["actualOutput"], "5");

        let exposition = metrics::render(&state.registry).unwrap();
        assert!(exposition.contains(r#"arbiter_submissions_total{language="python",outcome="accepted"} 1"#));
    }

    #[tokio::test]
    async fn test_submit_reports_failures() {
        let state = state(Some("printf '4\\n==ARBITER-VERDICT v1==\\nFAIL: Expected 5 but got 4\\n'"));
        let response = submit_code(
            State(state),
            submit_body(serde_json::json!({
                "code": "def sum(a, b):\n    return 4",
                "language": "python",
                "problemId": "sum"
            })),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["allPassed"], false);
        assert_eq!(body["failedCount"], 2);
        assert_eq!(body["message"], "2 test case(s) failed");
    }

    #[tokio::test]
    async fn test_submit_unknown_problem() {
        let response = submit_code(
            State(state(None)),
            submit_body(serde_json::json!({
                "code": "x",
                "language": "python",
                "problemId": "missing"
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["message"], "Problem not found");
    }

    #[tokio::test]
    async fn test_submit_requires_problem_id() {
        let response = submit_code(
            State(state(None)),
            submit_body(serde_json::json!({"code": "x", "language": "python"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_unavailable() {
        let state = state(None);
        state.engine.close();
        let response = submit_code(
            State(state),
            submit_body(serde_json::json!({
                "code": "x",
                "language": "python",
                "problemId": "sum"
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_problem_listing_strips_starter_code() {
        let state = state(None);
        let body = body_json(list_problems(State(state.clone())).await).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["count"], 1);
        assert_eq!(body["problems"][0]["id"], "sum");
        assert!(body["problems"][0].get("starterCode").is_none());

        let body = body_json(get_problem(State(state.clone()), Path("sum".to_string())).await).await;
        assert_eq!(body["problem"]["functionName"], "sum");
        assert!(body["problem"]["starterCode"]["python"].is_string());

        let response = get_problem(State(state), Path("nope".to_string())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_check() {
        let body = body_json(health_check().await.into_response()).await;
        assert_eq!(body["status"], "OK");
        assert!(body["timestamp"].is_string());
    }
}
