//! Resolves what a run needs before the first turn: effective settings, the
//! flow to run, and that flow's components with any command-line overrides.

use std::error::Error;

use tracing::{debug, warn};

use crate::cli::RunOptions;
use crate::core::catalog::FlowCatalog;
use crate::core::config::{Config, FlowSettings};
use crate::core::flow::{apply_tweak_override, parse_override_spec, Component};

pub struct FlowSession {
    pub client: reqwest::Client,
    pub settings: FlowSettings,
    pub flow_id: String,
    pub components: Vec<Component>,
    pub stream: bool,
}

pub async fn prepare_flow_session(options: &RunOptions) -> Result<FlowSession, Box<dyn Error>> {
    let config = Config::load()?;
    let settings = config.resolve();
    let client = reqwest::Client::new();

    let catalog = match FlowCatalog::fetch(
        &client,
        &settings.catalog_url,
        settings.access_token.as_deref(),
    )
    .await
    {
        Ok(catalog) => Some(catalog),
        Err(err) if options.tweaks.is_empty() => {
            warn!(url = %settings.catalog_url, "Flow catalog unavailable; running without component settings: {err}");
            None
        }
        Err(err) => {
            return Err(format!("Cannot apply --tweak overrides without the flow catalog: {err}").into())
        }
    };

    let flow_id = select_flow_id(options.flow.as_deref(), &settings, catalog.as_ref())?;
    let mut components = catalog
        .as_ref()
        .and_then(|catalog| catalog.get_flow(&flow_id))
        .map(|flow| flow.components.clone())
        .unwrap_or_default();
    if catalog.is_some() && components.is_empty() {
        debug!(flow_id = %flow_id, "Flow not described by the catalog");
    }
    apply_overrides(&mut components, &options.tweaks)?;

    Ok(FlowSession {
        stream: settings.stream && !options.no_stream,
        client,
        settings,
        flow_id,
        components,
    })
}

/// Explicit flag first, then the configured default, then the catalog's only
/// flow if it has exactly one.
pub fn select_flow_id(
    requested: Option<&str>,
    settings: &FlowSettings,
    catalog: Option<&FlowCatalog>,
) -> Result<String, Box<dyn Error>> {
    if let Some(flow) = requested.map(str::trim).filter(|flow| !flow.is_empty()) {
        return Ok(flow.to_string());
    }
    if let Some(flow) = &settings.default_flow {
        return Ok(flow.clone());
    }
    if let Some(catalog) = catalog {
        if let [only] = catalog.flows() {
            return Ok(only.id.clone());
        }
    }
    Err("No flow selected. Pass --flow <FLOW_ID> or run 'flowtalk set default-flow <FLOW_ID>'. \
Use 'flowtalk flows' to see what is available."
        .into())
}

pub fn apply_overrides(components: &mut [Component], specs: &[String]) -> Result<(), Box<dyn Error>> {
    for spec in specs {
        let (component, name, value) = parse_override_spec(spec)?;
        apply_tweak_override(components, component, name, value)?;
        debug!(component, name, "Applied tweak override");
    }
    Ok(())
}
