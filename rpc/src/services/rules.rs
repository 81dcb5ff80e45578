use serde::{Deserialize, Serialize};
use sonarlink_types::ConfigScopeId;

use super::{RpcService, ServiceClient};
use crate::either::Either;
use crate::transport::RpcError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetEffectiveRuleDetailsParams {
    pub configuration_scope_id: ConfigScopeId,
    pub rule_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleMonolithicDescriptionDto {
    pub html_content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleNonContextualSectionDto {
    pub html_content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleContextualSectionDto {
    pub html_content: String,
    pub context_key: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleContextualSectionWithDefaultContextKeyDto {
    pub default_context_key: String,
    pub contextual_sections: Vec<RuleContextualSectionDto>,
}

/// A tab is either a single section or one section per framework context.
pub type TabContent = Either<RuleNonContextualSectionDto, RuleContextualSectionWithDefaultContextKeyDto>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDescriptionTabDto {
    pub title: String,
    pub content: TabContent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSplitDescriptionDto {
    #[serde(default)]
    pub introduction_html_content: Option<String>,
    pub tabs: Vec<RuleDescriptionTabDto>,
}

/// Legacy rules carry one HTML blob; newer rules are split into tabs.
pub type RuleDescription = Either<RuleMonolithicDescriptionDto, RuleSplitDescriptionDto>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveRuleParamDto {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveRuleDetailsDto {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default, rename = "type")]
    pub rule_type: Option<String>,
    #[serde(default)]
    pub clean_code_attribute: Option<String>,
    pub description: RuleDescription,
    #[serde(default)]
    pub params: Vec<EffectiveRuleParamDto>,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetEffectiveRuleDetailsResponse {
    pub details: EffectiveRuleDetailsDto,
}

/// `rule/*`
pub struct RuleService {
    client: ServiceClient,
}

impl RpcService for RuleService {
    const NAMESPACE: &'static str = "rule";

    fn bind(client: ServiceClient) -> Self {
        Self { client }
    }
}

impl RuleService {
    pub async fn get_effective_rule_details(
        &self,
        params: &GetEffectiveRuleDetailsParams,
    ) -> Result<GetEffectiveRuleDetailsResponse, RpcError> {
        self.client.request("getEffectiveRuleDetails", params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listeners::ListenerRegistry;
    use crate::services::ServiceProvider;
    use crate::test_support::connect;
    use crate::transport::TransportOptions;
    use serde_json::json;
    use std::sync::Arc;

    fn details(description: serde_json::Value) -> serde_json::Value {
        json!({
            "details": {
                "key": "csharpsquid:S101",
                "name": "Types should be named in PascalCase",
                "severity": "MINOR",
                "type": "CODE_SMELL",
                "description": description,
                "params": [{"name": "format", "defaultValue": "^[A-Z]"}],
                "language": "cs"
            }
        })
    }

    #[tokio::test]
    async fn monolithic_description_decodes_left() {
        let (transport, mut engine) = connect(ListenerRegistry::default(), TransportOptions::default());
        let provider = ServiceProvider::with_all_services();
        provider.attach(Arc::new(transport));
        let rules = provider.get::<RuleService>().unwrap();
        let params = GetEffectiveRuleDetailsParams {
            configuration_scope_id: ConfigScopeId::new("scope"),
            rule_key: "csharpsquid:S101".to_string(),
            context_key: None,
        };

        let (response, request) = tokio::join!(
            rules.get_effective_rule_details(&params),
            engine.reply(details(json!({"htmlContent": "<p>Rule</p>"}))),
        );
        assert_eq!(request["method"], "rule/getEffectiveRuleDetails");
        assert!(request["params"].get("contextKey").is_none());

        let details = response.unwrap().details;
        assert_eq!(details.rule_type.as_deref(), Some("CODE_SMELL"));
        assert_eq!(details.params[0].default_value.as_deref(), Some("^[A-Z]"));
        assert_eq!(details.description.left().unwrap().html_content, "<p>Rule</p>");
    }

    #[test]
    fn split_description_with_contextual_tab_decodes_right() {
        let response: GetEffectiveRuleDetailsResponse = serde_json::from_value(details(json!({
            "introductionHtmlContent": "<p>Intro</p>",
            "tabs": [
                {"title": "Why is this an issue?", "content": {"htmlContent": "<p>Because</p>"}},
                {"title": "How can I fix it?", "content": {
                    "defaultContextKey": "aspnet",
                    "contextualSections": [
                        {"htmlContent": "<p>Fix</p>", "contextKey": "aspnet", "displayName": "ASP.NET"}
                    ]
                }}
            ]
        })))
        .unwrap();

        let split = response.details.description.right().unwrap();
        assert_eq!(split.introduction_html_content.as_deref(), Some("<p>Intro</p>"));
        assert!(split.tabs[0].content.is_left());
        let contextual = split.tabs[1].content.right().unwrap();
        assert_eq!(contextual.default_context_key, "aspnet");
        assert_eq!(contextual.contextual_sections[0].display_name, "ASP.NET");
    }

    #[test]
    fn description_of_neither_shape_fails() {
        let result = serde_json::from_value::<GetEffectiveRuleDetailsResponse>(details(json!({"x": 1})));
        assert!(result.is_err());
    }
}
