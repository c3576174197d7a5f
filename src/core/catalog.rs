use tracing::warn;

use crate::api::flows::{
    fetch_catalog, CatalogError, CatalogFlow, CatalogResponse, CatalogTweak,
};
use crate::core::flow::{Component, Flow, Tweak, TweakKind, TweakValue};

/// A selectable flow, as offered in a model picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowModel {
    pub id: String,
    pub display_name: String,
}

/// The ordered list of flows published by the catalog service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowCatalog {
    flows: Vec<Flow>,
}

impl FlowCatalog {
    pub fn new(flows: Vec<Flow>) -> Self {
        Self { flows }
    }

    pub async fn fetch(
        client: &reqwest::Client,
        catalog_url: &str,
        access_token: Option<&str>,
    ) -> Result<Self, CatalogError> {
        let response = fetch_catalog(client, catalog_url, access_token).await?;
        Ok(Self::from_response(response))
    }

    pub fn from_response(response: CatalogResponse) -> Self {
        Self {
            flows: response.data.into_iter().map(build_flow).collect(),
        }
    }

    pub fn flows(&self) -> &[Flow] {
        &self.flows
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    pub fn get_flow(&self, flow_id: &str) -> Option<&Flow> {
        self.flows.iter().find(|flow| flow.id == flow_id)
    }

    pub fn models(&self) -> Vec<FlowModel> {
        self.flows
            .iter()
            .map(|flow| FlowModel {
                id: flow.id.clone(),
                display_name: flow.name.clone(),
            })
            .collect()
    }

    /// All tweaks of a flow, flattened across its components.
    pub fn flow_tweaks(&self, flow_id: &str) -> Option<Vec<&Tweak>> {
        self.get_flow(flow_id).map(|flow| flow.tweaks().collect())
    }

    /// Move a flow to a new position. Out-of-range indices leave the order
    /// untouched and return false.
    pub fn move_flow(&mut self, from: usize, to: usize) -> bool {
        if from >= self.flows.len() || to >= self.flows.len() {
            return false;
        }
        let flow = self.flows.remove(from);
        self.flows.insert(to, flow);
        true
    }
}

fn build_flow(flow: CatalogFlow) -> Flow {
    let flow_id = flow.flow_id;
    let components = flow
        .data
        .nodes
        .into_iter()
        .map(|node| {
            let tweaks = node
                .data
                .node
                .tweaks
                .into_iter()
                .filter_map(|tweak| build_tweak(&flow_id, &node.id, tweak))
                .collect();
            Component::new(node.id, tweaks)
        })
        .collect();

    Flow {
        id: flow_id,
        name: flow.flow_name,
        components,
    }
}

fn build_tweak(flow_id: &str, node_id: &str, tweak: CatalogTweak) -> Option<Tweak> {
    let kind = match TweakKind::try_from(tweak.value_type.as_str()) {
        Ok(kind) => kind,
        Err(err) => {
            warn!(flow_id, node_id, tweak = %tweak.name, "Skipping tweak: {err}");
            return None;
        }
    };

    let value = match tweak.default.as_ref() {
        Some(default) => TweakValue::from_json(kind, default).unwrap_or_else(|err| {
            warn!(flow_id, node_id, tweak = %tweak.name, "Ignoring tweak default: {err}");
            None
        }),
        None => None,
    };

    Some(Tweak {
        name: tweak.name,
        display_name: tweak.display_name,
        description: tweak.description,
        value,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_response() -> CatalogResponse {
        serde_json::from_str(
            r#"{
                "data": [
                    {
                        "flowId": "flow-a",
                        "flowName": "Support bot",
                        "data": {
                            "nodes": [
                                {
                                    "id": "OpenAIModel-x1",
                                    "data": {
                                        "node": {
                                            "tweaks": [
                                                {"name": "temperature", "display_name": "Temperature", "default": 0.7, "value_type": "float"},
                                                {"name": "max_tokens", "display_name": "Max tokens", "value_type": "int"},
                                                {"name": "mystery", "display_name": "Mystery", "value_type": "bool"}
                                            ]
                                        }
                                    }
                                },
                                {
                                    "id": "Prompt-y2",
                                    "data": {"node": {"tweaks": [
                                        {"name": "template", "display_name": "Template", "description": "System prompt", "default": "Be brief", "value_type": "str"}
                                    ]}}
                                }
                            ]
                        }
                    },
                    {"flowId": "flow-b", "flowName": "Summarizer", "data": {"nodes": []}}
                ]
            }"#,
        )
        .expect("valid catalog json")
    }

    #[test]
    fn builds_flows_with_typed_tweaks() {
        let catalog = FlowCatalog::from_response(sample_response());
        let flow = catalog.get_flow("flow-a").expect("flow-a");
        assert_eq!(flow.name, "Support bot");
        assert_eq!(flow.components.len(), 2);

        let model = &flow.components[0];
        assert_eq!(model.id, "OpenAIModel-x1");
        assert_eq!(model.tweaks.len(), 2, "unknown value types are skipped");
        assert_eq!(
            model.tweak("temperature").and_then(|t| t.value.clone()),
            Some(TweakValue::Float(0.7))
        );
        assert_eq!(model.tweak("max_tokens").and_then(|t| t.value.clone()), None);

        let prompt = flow.components[1].tweak("template").expect("template");
        assert_eq!(prompt.description.as_deref(), Some("System prompt"));
        assert_eq!(prompt.value, Some(TweakValue::Str("Be brief".into())));
    }

    #[test]
    fn models_and_flattened_tweaks() {
        let catalog = FlowCatalog::from_response(sample_response());
        let models = catalog.models();
        assert_eq!(
            models,
            vec![
                FlowModel {
                    id: "flow-a".into(),
                    display_name: "Support bot".into()
                },
                FlowModel {
                    id: "flow-b".into(),
                    display_name: "Summarizer".into()
                },
            ]
        );

        let names: Vec<_> = catalog
            .flow_tweaks("flow-a")
            .expect("flow-a")
            .into_iter()
            .map(|tweak| tweak.name.as_str())
            .collect();
        assert_eq!(names, vec!["temperature", "max_tokens", "template"]);
        assert!(catalog.flow_tweaks("nope").is_none());
    }

    #[test]
    fn move_flow_reorders_and_rejects_out_of_range() {
        let mut catalog = FlowCatalog::from_response(sample_response());
        assert!(catalog.move_flow(1, 0));
        assert_eq!(catalog.flows()[0].id, "flow-b");
        assert!(!catalog.move_flow(0, 5));
        assert_eq!(catalog.flows()[0].id, "flow-b");
    }
}
