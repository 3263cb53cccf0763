use anyhow::Context;
use tracing::warn;

use greenroute_core::{Coordinate, GreenrouteConfig, capability_set};
use greenroute_placement::{CancelHandle, RecommendRequest};

use crate::{OutputFormat, report, setup};

pub struct RecommendArgs {
    pub lat: f64,
    pub lon: f64,
    pub max_distance: Option<f64>,
    pub capabilities: Vec<String>,
    pub regions: Vec<String>,
    pub weight_market: Option<f64>,
}

impl RecommendArgs {
    fn to_request(&self, config: &GreenrouteConfig) -> anyhow::Result<RecommendRequest> {
        let location = Coordinate::new(self.lat, self.lon).context("invalid --lat/--lon")?;
        let required = capability_set(&self.capabilities).context("invalid --capability")?;
        let mut request = RecommendRequest::new(
            location,
            self.max_distance.unwrap_or(config.engine.default_max_distance_km),
        )
        .with_capabilities(required);
        if !self.regions.is_empty() {
            request = request.with_candidates(self.regions.iter().map(|r| r.trim().to_string()));
        }
        if let Some(weight) = self.weight_market {
            request = request.with_weight_market(weight);
        }
        Ok(request)
    }
}

pub async fn run(config: &GreenrouteConfig, args: RecommendArgs, format: OutputFormat) -> anyhow::Result<()> {
    let request = args.to_request(config)?;
    let engine = setup::build_engine(config)?;

    // Ctrl-C abandons the in-flight oracle calls instead of waiting them out.
    let cancel = CancelHandle::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling request");
            on_signal.cancel();
        }
    });

    let rec = engine.recommend(&request, Some(cancel)).await?;

    match format {
        OutputFormat::Json => {
            let body = serde_json::json!({
                "recommendation": &rec,
                "emission_reduction_percent": rec.result().emission_reduction_percent(),
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        OutputFormat::Text => print!("{}", report::format_recommendation(&rec)),
    }
    Ok(())
}
