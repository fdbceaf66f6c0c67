pub(crate) mod languages;
pub(crate) mod manifest;
pub(crate) mod report;
pub(crate) mod runner;

use std::path::PathBuf;

use clap::Parser;

/// Arguments of the in-container harness binary. The defaults match the
/// mount points the dispatcher binds into every runner image.
#[derive(Parser, Debug)]
#[command(
    name = "harness",
    about = "Runs staged fixtures against a submission and prints one JSON result document"
)]
pub(crate) struct HarnessArgs {
    /// Language profile to grade with (e.g. "python", "java")
    pub(crate) language: String,

    /// Directory holding the staged submission
    #[arg(long, default_value = "/app/student")]
    pub(crate) student_dir: PathBuf,

    /// Directory holding the fixture files and their manifest
    #[arg(long, default_value = "/app/tests")]
    pub(crate) tests_dir: PathBuf,

    /// Per-test timeout, independent of the dispatcher wall clock
    #[arg(long, default_value_t = 2)]
    pub(crate) test_timeout_secs: u64,

    /// Stderr log level; stdout stays reserved for the result document
    #[arg(long, default_value = "warn")]
    pub(crate) log_level: String,
}
