use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sonarlink_types::ConfigScopeId;

use super::{RpcService, ServiceClient};
use crate::transport::RpcError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeFilesAndTrackParams {
    pub config_scope_id: ConfigScopeId,
    pub analysis_id: String,
    pub files_to_analyze: Vec<String>,
    #[serde(default)]
    pub extra_properties: HashMap<String, String>,
    #[serde(default)]
    pub should_fetch_server_issues: bool,
    /// Milliseconds since the Unix epoch.
    pub start_time: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeFilesResponse {
    #[serde(default)]
    pub failed_analysis_files: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DidChangeAnalysisPropertiesParams {
    pub properties: HashMap<String, String>,
}

/// `analysis/*`. Results arrive later through `analysis/raiseIssues`.
pub struct AnalysisService {
    client: ServiceClient,
}

impl RpcService for AnalysisService {
    const NAMESPACE: &'static str = "analysis";

    fn bind(client: ServiceClient) -> Self {
        Self { client }
    }
}

impl AnalysisService {
    pub async fn analyze_files_and_track(
        &self,
        params: &AnalyzeFilesAndTrackParams,
    ) -> Result<AnalyzeFilesResponse, RpcError> {
        self.client.request("analyzeFilesAndTrack", params).await
    }

    pub async fn did_change_analysis_properties(
        &self,
        params: &DidChangeAnalysisPropertiesParams,
    ) -> Result<(), RpcError> {
        self.client.notify("didChangeAnalysisProperties", params).await
    }
}
