pub(crate) mod fixtures;
pub(crate) mod grading;
pub(crate) mod sandbox;
pub(crate) mod verdict;
