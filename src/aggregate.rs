use std::collections::HashMap;

use tracing::debug;

use crate::config::PercentSummary;
use crate::error::ReportError;
use crate::models::{DetailRow, LocationSummary, ProviderVisits, VisitCounts};

/// Parses a database percentage such as `"12.34%"` or `"12.34 %"` into `0.1234`.
pub fn parse_percent(value: &str) -> Result<f64, ReportError> {
    let trimmed = value.trim();
    let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
    number
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| v / 100.0)
        .ok_or_else(|| ReportError::MalformedPercent {
            value: value.to_string(),
        })
}

pub fn format_percent(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}

/// Drops providers with no completed visits and converts their percentages.
pub fn prepare_details(rows: Vec<ProviderVisits>) -> Result<Vec<DetailRow>, ReportError> {
    let total = rows.len();
    let mut details = Vec::with_capacity(total);

    for row in rows {
        if row.counts.checked_out == 0 {
            continue;
        }
        details.push(DetailRow {
            no_show_rate: parse_percent(&row.no_show_pct)?,
            walk_in_rate: parse_percent(&row.walk_ins_pct)?,
            loc_name: row.loc_name,
            prov_id: row.prov_id,
            prov_name: row.prov_name,
            counts: row.counts,
        });
    }

    debug!(
        dropped = total - details.len(),
        kept = details.len(),
        "filtered providers without completed visits"
    );
    Ok(details)
}

/// One summary per location, in the order locations first appear in `details`.
pub fn summarize_by_location(details: &[DetailRow], mode: PercentSummary) -> Vec<LocationSummary> {
    #[derive(Default)]
    struct Acc {
        counts: VisitCounts,
        no_show_rates: f64,
        walk_in_rates: f64,
        rows: usize,
    }

    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Acc> = HashMap::new();

    for row in details {
        let entry = groups.entry(row.loc_name.as_str()).or_insert_with(|| {
            order.push(row.loc_name.as_str());
            Acc::default()
        });
        entry.counts.add(&row.counts);
        entry.no_show_rates += row.no_show_rate;
        entry.walk_in_rates += row.walk_in_rate;
        entry.rows += 1;
    }

    order
        .into_iter()
        .filter_map(|loc_name| {
            let acc = groups.remove(loc_name)?;
            let (no_show_rate, walk_in_rate) = match mode {
                PercentSummary::RowMean => (
                    acc.no_show_rates / acc.rows as f64,
                    acc.walk_in_rates / acc.rows as f64,
                ),
                PercentSummary::Pooled => (
                    ratio(acc.counts.no_shows, acc.counts.scheduled_appts),
                    ratio(acc.counts.walk_ins, acc.counts.scheduled_appts),
                ),
            };
            Some(LocationSummary {
                loc_name: loc_name.to_string(),
                counts: acc.counts,
                no_show_rate,
                walk_in_rate,
            })
        })
        .collect()
}

fn ratio(part: i64, whole: i64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}
