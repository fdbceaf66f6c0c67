use serde::{Deserialize, Serialize};

use crate::db::types::TestStyle;

pub(crate) const MANIFEST_FILENAME: &str = "manifest.json";

/// Ordered fixture list written into `tests/` by the materializer and read
/// back by the harness. Array order is execution order; the harness never
/// globs the directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Manifest {
    pub(crate) tests: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ManifestEntry {
    pub(crate) test: String,
    pub(crate) style: TestStyle,
    /// Fixture filename relative to `tests/`, e.g. `1.in`
    pub(crate) input: String,
    /// Expected-output filename relative to `tests/`, e.g. `1.out`
    pub(crate) expected: String,
}

/// Payload of an exec-style `.in` fixture: the entry point to invoke plus
/// the arguments, each of which gets passed as its compact JSON encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CallSpec {
    pub(crate) entry: String,
    #[serde(default)]
    pub(crate) args: Vec<serde_json::Value>,
}
