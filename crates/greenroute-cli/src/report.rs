//! Human-readable rendering of engine output.

use std::fmt::Write;

use greenroute_core::Region;
use greenroute_placement::{NearbyRegion, Recommendation};

pub fn format_recommendation(rec: &Recommendation) -> String {
    let result = rec.result();
    let counts = result.counts;
    let mut out = String::new();

    match rec.empty_reason() {
        None => {
            let _ = writeln!(out, "Recommended regions (lower score is cleaner):");
            let _ = writeln!(
                out,
                "  {:<4} {:<16} {:<28} {:>10} {:>10} {:>10} {:>8}",
                "#", "CODE", "NAME", "DIST(km)", "LOCATION", "MARKET", "SCORE"
            );
            for (i, r) in result.ranked.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "  {:<4} {:<16} {:<28} {:>10.0} {:>10.4} {:>10.4} {:>8.4}",
                    i + 1,
                    r.code,
                    r.name,
                    r.distance_km,
                    r.location_based,
                    r.market_based,
                    r.score
                );
            }
            if let Some(pct) = result.emission_reduction_percent() {
                let _ = writeln!(
                    out,
                    "\n{pct:.1}% lower location-based intensity in the cleanest region than in the dirtiest"
                );
            }
        }
        Some(reason) => {
            let _ = writeln!(out, "No recommendation: {reason}.");
        }
    }

    let _ = writeln!(
        out,
        "\nConsidered {}, within distance {}, with capabilities {}, scored {}.",
        counts.considered, counts.within_distance, counts.satisfying_capabilities, counts.scored
    );

    if !result.diagnostics.is_empty() {
        let _ = writeln!(out, "\nExcluded:");
        for d in &result.diagnostics {
            let _ = writeln!(out, "  - {d}");
        }
    }
    out
}

pub fn format_nearby(nearby: &[NearbyRegion], max_distance_km: f64) -> String {
    if nearby.is_empty() {
        return format!("No regions within {max_distance_km:.0} km.\n");
    }
    let mut out = String::new();
    for n in nearby {
        let _ = writeln!(out, "{:<16} {:<28} {:>8.0} km", n.code, n.name, n.distance_km);
    }
    out
}

pub fn format_regions(regions: &[std::sync::Arc<Region>]) -> String {
    let mut out = String::new();
    for r in regions {
        let _ = writeln!(out, "{:<16} {:<28} {}", r.code, r.name, r.location);
    }
    out
}
