//! Flow listing
//!
//! Lists the flows the catalog publishes, or the adjustable settings of one
//! flow.

use std::error::Error;
use std::io::Write;

use crate::core::catalog::FlowCatalog;
use crate::core::config::Config;
use crate::core::flow::Flow;

pub async fn list_flows(flow: Option<String>) -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    let settings = config.resolve();
    let client = reqwest::Client::new();
    let mut catalog = FlowCatalog::fetch(
        &client,
        &settings.catalog_url,
        settings.access_token.as_deref(),
    )
    .await?;

    let mut out = std::io::stdout().lock();
    match flow {
        Some(flow_id) => {
            let flow = catalog
                .get_flow(&flow_id)
                .ok_or_else(|| format!("Flow '{flow_id}' is not in the catalog"))?;
            write_flow_details(&mut out, flow)?;
        }
        None => {
            let default_flow = settings.default_flow.as_deref();
            pin_default_flow(&mut catalog, default_flow);
            write_flow_list(&mut out, &catalog, default_flow)?;
        }
    }
    Ok(())
}

/// List the default flow first; the rest keep the catalog's order.
fn pin_default_flow(catalog: &mut FlowCatalog, default_flow: Option<&str>) {
    let Some(default_flow) = default_flow else {
        return;
    };
    if let Some(index) = catalog.flows().iter().position(|flow| flow.id == default_flow) {
        catalog.move_flow(index, 0);
    }
}

fn write_flow_list<W: Write>(
    out: &mut W,
    catalog: &FlowCatalog,
    default_flow: Option<&str>,
) -> std::io::Result<()> {
    writeln!(out, "🔀 Available Flows")?;
    writeln!(out, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
    if catalog.is_empty() {
        writeln!(out, "No flows found.")?;
        return Ok(());
    }

    for model in catalog.models() {
        let marker = if Some(model.id.as_str()) == default_flow {
            " (default)"
        } else {
            ""
        };
        let settings = catalog
            .flow_tweaks(&model.id)
            .map(|tweaks| tweaks.len())
            .unwrap_or_default();
        writeln!(
            out,
            "  • {} - {}{} [{} settings]",
            model.id, model.display_name, marker, settings
        )?;
    }
    writeln!(out)?;
    writeln!(out, "Use 'flowtalk flows <FLOW_ID>' to see a flow's settings.")?;
    Ok(())
}

fn write_flow_details<W: Write>(out: &mut W, flow: &Flow) -> std::io::Result<()> {
    writeln!(out, "🔀 {} ({})", flow.name, flow.id)?;
    writeln!(out, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
    for component in &flow.components {
        writeln!(out, "{}", component.id)?;
        if component.tweaks.is_empty() {
            writeln!(out, "  (no settings)")?;
        }
        for tweak in &component.tweaks {
            let value = tweak
                .present_value()
                .map(|value| value.to_string())
                .unwrap_or_else(|| "(service default)".to_string());
            writeln!(
                out,
                "  {}.{} [{}] = {}",
                component.id,
                tweak.name,
                tweak.kind.as_str(),
                value
            )?;
            if tweak.display_name != tweak.name {
                writeln!(out, "      {}", tweak.display_name)?;
            }
            if let Some(description) = &tweak.description {
                writeln!(out, "      {description}")?;
            }
        }
    }
    writeln!(out)?;
    writeln!(
        out,
        "Override with --tweak COMPONENT.NAME=VALUE on 'say' or 'chat'."
    )?;
    Ok(())
}
