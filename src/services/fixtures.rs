use std::path::{Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

use crate::db::models::CodeTestCase;
use crate::harness::languages::Language;
use crate::harness::manifest::{Manifest, ManifestEntry, MANIFEST_FILENAME};

#[derive(Debug, Error)]
pub(crate) enum FixtureError {
    #[error("failed to create {path}: {source}")]
    Create { path: PathBuf, source: std::io::Error },
    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },
    #[error("failed to encode manifest: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One staged submission: `<root>/<uuid>/` with `student/` and `tests/`
/// underneath. The directory is removed on drop so nothing outlives the
/// attempt, on error paths included.
pub(crate) struct Workspace {
    root: PathBuf,
    id: String,
}

impl Workspace {
    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn student_dir(&self) -> PathBuf {
        self.root.join("student")
    }

    pub(crate) fn tests_dir(&self) -> PathBuf {
        self.root.join("tests")
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_dir_all(&self.root) {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(workspace = %self.id, error = %err, "failed to remove workspace");
            }
        }
    }
}

/// Stages the submission and its hidden fixtures. Fixtures are laid out and
/// listed in the manifest by `order_index`, whatever order they arrive in.
pub(crate) async fn stage(
    workspace_root: &Path,
    language: Language,
    code: &str,
    cases: &[CodeTestCase],
) -> Result<Workspace, FixtureError> {
    let id = Uuid::new_v4().to_string();
    let workspace = Workspace { root: workspace_root.join(&id), id };

    let student_dir = workspace.student_dir();
    let tests_dir = workspace.tests_dir();
    create_dir(&student_dir).await?;
    create_dir(&tests_dir).await?;

    write_file(&student_dir.join(language.solution_filename()), code.as_bytes()).await?;

    let mut ordered: Vec<&CodeTestCase> = cases.iter().collect();
    ordered.sort_by_key(|case| case.order_index);

    let mut entries = Vec::with_capacity(ordered.len());
    for case in ordered {
        let input_name = format!("{}.in", case.order_index);
        let expected_name = format!("{}.out", case.order_index);
        write_file(&tests_dir.join(&input_name), case.input_data.as_bytes()).await?;
        write_file(&tests_dir.join(&expected_name), case.expected_output.as_bytes()).await?;

        entries.push(ManifestEntry {
            test: case.order_index.to_string(),
            style: case.test_style,
            input: input_name,
            expected: expected_name,
        });
    }

    let manifest = serde_json::to_vec(&Manifest { tests: entries })?;
    write_file(&tests_dir.join(MANIFEST_FILENAME), &manifest).await?;

    tracing::debug!(workspace = %workspace.id, cases = cases.len(), "workspace staged");
    Ok(workspace)
}

async fn create_dir(path: &Path) -> Result<(), FixtureError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| FixtureError::Create { path: path.to_path_buf(), source })
}

async fn write_file(path: &Path, contents: &[u8]) -> Result<(), FixtureError> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|source| FixtureError::Write { path: path.to_path_buf(), source })
}
