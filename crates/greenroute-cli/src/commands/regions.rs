use greenroute_core::{GreenrouteConfig, Region};

use crate::{OutputFormat, report, setup};

pub async fn run(config: &GreenrouteConfig, format: OutputFormat) -> anyhow::Result<()> {
    let regions = setup::build_catalog(config).list_regions().await?;

    match format {
        OutputFormat::Json => {
            let regions: Vec<&Region> = regions.iter().map(|r| r.as_ref()).collect();
            println!("{}", serde_json::to_string_pretty(&regions)?);
        }
        OutputFormat::Text => print!("{}", report::format_regions(&regions)),
    }
    Ok(())
}
