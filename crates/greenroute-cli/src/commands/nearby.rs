use anyhow::Context;

use greenroute_core::{Coordinate, GreenrouteConfig};

use crate::{OutputFormat, report, setup};

pub async fn run(
    config: &GreenrouteConfig,
    lat: f64,
    lon: f64,
    max_distance: Option<f64>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let location = Coordinate::new(lat, lon).context("invalid --lat/--lon")?;
    let max_distance_km = max_distance.unwrap_or(config.engine.default_max_distance_km);
    let engine = setup::build_engine(config)?;
    let nearby = engine.list_nearby(location, max_distance_km).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&nearby)?),
        OutputFormat::Text => print!("{}", report::format_nearby(&nearby, max_distance_km)),
    }
    Ok(())
}
