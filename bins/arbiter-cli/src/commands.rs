// CLI commands for running and grading submissions locally
use anyhow::{bail, Context, Result};
use arbiter_common::catalog::ProblemCatalog;
use arbiter_common::config::Settings;
use arbiter_common::types::{ExecutionRequest, ExecutionResult, Language, Problem, ValidationSummary};
use arbiter_engine::{harness, CommandTemplate, Engine, LanguageConfigManager, Validator};
use std::fs;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

fn read_source(file: &Path) -> Result<String> {
    fs::read_to_string(file).with_context(|| format!("Failed to read source file {}", file.display()))
}

/// Load a problem either from a single-problem file or from a catalog by id
pub fn load_problem(problem: Option<&Path>, catalog: Option<&Path>, id: Option<&str>) -> Result<Problem> {
    match (problem, catalog) {
        (Some(path), _) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read problem file {}", path.display()))?;
            let mut problem: Problem = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse problem file {}", path.display()))?;
            if problem.id.trim().is_empty() {
                problem.id = path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "problem".to_string());
            }
            // Same checks the catalog applies
            let checked = ProblemCatalog::new(vec![problem])?;
            checked
                .problems()
                .first()
                .cloned()
                .context("Problem file holds no problem")
        }
        (None, Some(path)) => {
            let Some(id) = id else {
                bail!("--id is required with --catalog");
            };
            let catalog = ProblemCatalog::load_from_file(path)?;
            match catalog.get(id) {
                Some(problem) => Ok(problem.clone()),
                None => bail!("Problem '{}' not found in {}", id, path.display()),
            }
        }
        (None, None) => bail!("Either --problem or --catalog is required"),
    }
}

pub async fn run_file(
    settings: &Settings,
    language: Language,
    file: &Path,
    input_file: Option<&Path>,
    cancel: &CancellationToken,
) -> Result<ExecutionResult> {
    let code = read_source(file)?;
    let input = match input_file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file {}", path.display()))?,
        None => String::new(),
    };

    let engine = Engine::from_settings(settings)?;
    debug!(%language, file = %file.display(), workspace = %engine.workspace_path().display(), "Running source file");
    let request = ExecutionRequest::new(code, language).with_input(input);
    let result = engine.execute_with_cancel(&request, cancel).await?;
    info!(
        %language,
        status = ?result.status,
        elapsed_ms = result.elapsed_ms,
        memory_kb = result.memory_kb,
        "Run finished"
    );
    Ok(result)
}

pub async fn submit_file(
    settings: &Settings,
    problem: &Problem,
    language: Language,
    file: &Path,
    cancel: &CancellationToken,
) -> Result<ValidationSummary> {
    let code = read_source(file)?;
    let engine = Engine::from_settings(settings)?;
    let summary = Validator::new(&engine)
        .validate_with_cancel(&code, language, problem, cancel)
        .await?;
    info!(
        problem = %problem.id,
        %language,
        passed = summary.passed_count,
        total = summary.total_tests,
        "Submission graded"
    );
    Ok(summary)
}

/// Generated program for the `example`-th (1-based) example
pub fn render_harness(problem: &Problem, example: usize, language: Language, file: &Path) -> Result<String> {
    let code = read_source(file)?;
    let total = problem.examples.len();
    let Some(chosen) = example.checked_sub(1).and_then(|i| problem.examples.get(i)) else {
        bail!("Example {} out of range: problem '{}' has {} example(s)", example, problem.id, total);
    };
    Ok(harness::generate(&code, chosen, problem, language))
}

fn format_command(template: &CommandTemplate) -> String {
    std::iter::once(template.command.as_str())
        .chain(template.args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

/// One line per configured toolchain
pub fn describe_languages(settings: &Settings) -> Result<Vec<String>> {
    let toolchains = LanguageConfigManager::load_or_builtin(&settings.languages_config)?;
    Ok(toolchains
        .list_languages()
        .into_iter()
        .filter_map(|language| toolchains.get(language))
        .map(|config| {
            let compile = config
                .compile
                .as_ref()
                .map(|c| format!("  compile: {}", format_command(c)))
                .unwrap_or_default();
            format!(
                "{:<12} {:<8} .{:<6}{}  run: {}",
                config.name.as_str(),
                config.version,
                config.file_extension,
                compile,
                format_command(&config.run)
            )
        })
        .collect())
}
