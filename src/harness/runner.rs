use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::languages::{Language, RunPlan};
use super::manifest::{CallSpec, Manifest, ManifestEntry, MANIFEST_FILENAME};
use super::report::{HarnessReport, TestReport};
use crate::db::types::TestStyle;

const COMPILE_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub(crate) struct RunnerConfig {
    pub(crate) student_dir: PathBuf,
    pub(crate) tests_dir: PathBuf,
    pub(crate) test_timeout: Duration,
}

/// Failures that prevent producing a result document at all. Everything
/// else degrades into failed entries inside the document.
#[derive(Debug, Error)]
pub(crate) enum HarnessError {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),
    #[error("failed to read manifest {path}: {source}")]
    ManifestRead { path: PathBuf, source: std::io::Error },
    #[error("invalid manifest {path}: {source}")]
    ManifestFormat { path: PathBuf, source: serde_json::Error },
}

pub(crate) async fn run_language(
    language: &str,
    config: &RunnerConfig,
) -> Result<HarnessReport, HarnessError> {
    let language = Language::from_name(language)
        .ok_or_else(|| HarnessError::UnsupportedLanguage(language.to_string()))?;

    let solution = config.student_dir.join(language.solution_filename());
    let plan = language.plan(&config.student_dir);
    run_plan(&plan, Some(&solution), config).await
}

/// Runs every manifest entry in order and aggregates the document. Public
/// to the crate so tests can drive it with plain binaries instead of real
/// language toolchains.
pub(crate) async fn run_plan(
    plan: &RunPlan,
    solution: Option<&Path>,
    config: &RunnerConfig,
) -> Result<HarnessReport, HarnessError> {
    let manifest = load_manifest(&config.tests_dir).await?;

    if let Some(path) = solution {
        if !path.exists() {
            let error = format!("solution file not found: {}", path.display());
            return Ok(all_failed(&manifest, &error));
        }
    }

    if let Some(compile) = &plan.compile {
        if let Err(diagnostic) = compile_step(compile).await {
            return Ok(all_failed(&manifest, &diagnostic));
        }
    }

    let mut results = Vec::with_capacity(manifest.tests.len());
    for entry in &manifest.tests {
        let result = run_test(plan, entry, config).await;
        if !result.passed {
            tracing::debug!(test = %entry.test, error = %result.error, "test failed");
        }
        results.push(result);
    }

    Ok(HarnessReport::from_results(results))
}

async fn load_manifest(tests_dir: &Path) -> Result<Manifest, HarnessError> {
    let path = tests_dir.join(MANIFEST_FILENAME);
    let raw = tokio::fs::read(&path)
        .await
        .map_err(|source| HarnessError::ManifestRead { path: path.clone(), source })?;

    serde_json::from_slice(&raw).map_err(|source| HarnessError::ManifestFormat { path, source })
}

fn all_failed(manifest: &Manifest, error: &str) -> HarnessReport {
    let results =
        manifest.tests.iter().map(|entry| TestReport::failed(&entry.test, error.to_string())).collect();
    HarnessReport::from_results(results)
}

async fn compile_step(argv: &[String]) -> Result<(), String> {
    let mut command = Command::new(&argv[0]);
    command.args(&argv[1..]).stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
    command.kill_on_drop(true);

    let child = match command.spawn() {
        Ok(child) => child,
        Err(err) => return Err(format!("failed to start compiler {}: {err}", argv[0])),
    };

    let output =
        match tokio::time::timeout(Duration::from_secs(COMPILE_TIMEOUT_SECS), child.wait_with_output())
            .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => return Err(format!("compiler failed: {err}")),
            Err(_) => return Err(format!("compilation timed out after {COMPILE_TIMEOUT_SECS}s")),
        };

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() {
        Err(format!("compilation failed with {}", output.status))
    } else {
        Err(format!("compilation failed: {stderr}"))
    }
}

async fn run_test(plan: &RunPlan, entry: &ManifestEntry, config: &RunnerConfig) -> TestReport {
    match entry.style {
        TestStyle::Stdin => run_stdin_test(plan, entry, config).await,
        TestStyle::Exec => run_exec_test(plan, entry, config).await,
    }
}

/// Feeds the fixture input on stdin and trim-compares captured stdout
/// against the expected output.
async fn run_stdin_test(plan: &RunPlan, entry: &ManifestEntry, config: &RunnerConfig) -> TestReport {
    let input = match read_fixture(&config.tests_dir, &entry.input).await {
        Ok(raw) => raw,
        Err(err) => return TestReport::failed(&entry.test, err),
    };
    let expected = match read_fixture(&config.tests_dir, &entry.expected).await {
        Ok(raw) => raw,
        Err(err) => return TestReport::failed(&entry.test, err),
    };

    execute_capture(&plan.run, Some(input), &expected, entry, config.test_timeout).await
}

/// Invokes the submission through its fixed entry point. The call spec's
/// entry name and each argument's compact JSON encoding become extra argv
/// elements; stdin stays empty and stdout is the test-scoped capture buffer.
async fn run_exec_test(plan: &RunPlan, entry: &ManifestEntry, config: &RunnerConfig) -> TestReport {
    let raw_spec = match read_fixture(&config.tests_dir, &entry.input).await {
        Ok(raw) => raw,
        Err(err) => return TestReport::failed(&entry.test, err),
    };
    let spec: CallSpec = match serde_json::from_str(&raw_spec) {
        Ok(spec) => spec,
        Err(err) => return TestReport::failed(&entry.test, format!("invalid call spec: {err}")),
    };
    let expected = match read_fixture(&config.tests_dir, &entry.expected).await {
        Ok(raw) => raw,
        Err(err) => return TestReport::failed(&entry.test, err),
    };

    let mut argv = plan.run.clone();
    argv.push(spec.entry);
    for arg in &spec.args {
        match serde_json::to_string(arg) {
            Ok(encoded) => argv.push(encoded),
            Err(err) => {
                return TestReport::failed(&entry.test, format!("unserializable argument: {err}"))
            }
        }
    }

    execute_capture(&argv, None, &expected, entry, config.test_timeout).await
}

async fn execute_capture(
    argv: &[String],
    input: Option<String>,
    expected: &str,
    entry: &ManifestEntry,
    timeout: Duration,
) -> TestReport {
    let mut command = Command::new(&argv[0]);
    command.args(&argv[1..]).stdout(Stdio::piped()).stderr(Stdio::piped());
    command.stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() });
    command.kill_on_drop(true);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            return TestReport::failed(&entry.test, format!("failed to start {}: {err}", argv[0]))
        }
    };

    // Written from a separate task so a child that never drains stdin
    // cannot wedge the harness outside the timeout window.
    let stdin_pipe = child.stdin.take();
    let writer = tokio::spawn(async move {
        if let (Some(mut sink), Some(input)) = (stdin_pipe, input) {
            let _ = sink.write_all(input.as_bytes()).await;
            let _ = sink.shutdown().await;
        }
    });

    let outcome = tokio::time::timeout(timeout, child.wait_with_output()).await;
    let _ = writer.await;

    let expected = expected.trim().to_string();
    match outcome {
        Ok(Ok(output)) => {
            let actual = String::from_utf8_lossy(&output.stdout).trim().to_string();
            let passed = actual == expected;
            let mut error = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if !passed && error.is_empty() && !output.status.success() {
                error = format!("process exited with {}", output.status);
            }

            TestReport { test: entry.test.clone(), passed, expected, actual, error }
        }
        Ok(Err(err)) => TestReport {
            test: entry.test.clone(),
            passed: false,
            expected,
            actual: String::new(),
            error: format!("failed to wait for process: {err}"),
        },
        Err(_) => TestReport {
            test: entry.test.clone(),
            passed: false,
            expected,
            actual: String::new(),
            error: format!("timed out after {}s", timeout.as_secs_f64()),
        },
    }
}

async fn read_fixture(tests_dir: &Path, name: &str) -> Result<String, String> {
    let path = tests_dir.join(name);
    tokio::fs::read_to_string(&path)
        .await
        .map_err(|err| format!("failed to read fixture {}: {err}", path.display()))
}
