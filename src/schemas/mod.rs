use std::collections::BTreeMap;

use serde::Serialize;

pub(crate) mod submission;

/// Service banner for `/`. `languages` lists every language this deployment
/// can dispatch a runner image for.
#[derive(Debug, Serialize)]
pub(crate) struct RootResponse {
    pub(crate) service: String,
    pub(crate) version: String,
    pub(crate) api_base: String,
    pub(crate) languages: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) service: String,
    pub(crate) status: String,
    pub(crate) components: BTreeMap<String, String>,
}
