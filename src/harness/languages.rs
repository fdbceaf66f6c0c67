use std::path::Path;

/// Languages with a runner image and a harness profile. The two move
/// together: adding a language here implies publishing the matching
/// `code-runner-<name>` image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Language {
    Python,
    Java,
}

pub(crate) const SUPPORTED_LANGUAGES: &[&str] = &["python", "java"];

/// Concrete commands for one staged submission. Tests construct these
/// directly to drive the runner with plain binaries.
#[derive(Debug, Clone)]
pub(crate) struct RunPlan {
    pub(crate) compile: Option<Vec<String>>,
    pub(crate) run: Vec<String>,
}

impl Language {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        match name {
            "python" => Some(Self::Python),
            "java" => Some(Self::Java),
            _ => None,
        }
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Java => "java",
        }
    }

    /// Filename the materializer stages the submission under.
    pub(crate) fn solution_filename(self) -> &'static str {
        match self {
            Self::Python => "solution.py",
            Self::Java => "Solution.java",
        }
    }

    pub(crate) fn plan(self, student_dir: &Path) -> RunPlan {
        let solution = student_dir.join(self.solution_filename());
        let solution = solution.to_string_lossy().into_owned();

        match self {
            Self::Python => RunPlan { compile: None, run: vec!["python3".into(), solution] },
            Self::Java => RunPlan {
                compile: Some(vec!["javac".into(), solution]),
                run: vec![
                    "java".into(),
                    "-cp".into(),
                    student_dir.to_string_lossy().into_owned(),
                    "Solution".into(),
                ],
            },
        }
    }
}
