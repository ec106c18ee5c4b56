//! Demo content for a throwaway store.

use crate::catalog::{SourceId, SourceRecord};
use crate::db::error::StoreResult;
use crate::table::{DataTable, TableMeta};

/// Sources seeded into a sandbox store, one commit each.
pub const SANDBOX_SOURCES: [&str; 2] = ["SOURCE_A_2020", "SOURCE_B_2020"];

const REGIONS: [(&str, f64); 3] = [("World", 36_000.0), ("Asia", 19_000.0), ("ZAF", 450.0)];

fn meta(source: &SourceId, scenario: &str) -> TableMeta {
    TableMeta::from_pairs([
        ("entity", "Emissions|CO2"),
        ("category", "Energy"),
        ("scenario", scenario),
        ("source", source.as_str()),
        ("unit", "Mt CO2"),
    ])
}

/// Values grow linearly by `rate` of the base value per year from `start`.
fn series(years: &[i32], start: i32, rate: f64) -> Vec<Vec<Option<f64>>> {
    REGIONS
        .iter()
        .map(|(_, base)| {
            years
                .iter()
                .map(|&y| Some((base * (1.0 + rate * f64::from(y - start))).round()))
                .collect()
        })
        .collect()
}

/// A historic and a projection table for `source`, plus its catalog record.
pub fn sandbox_tables(source: &SourceId) -> StoreResult<(Vec<DataTable>, SourceRecord)> {
    let regions: Vec<String> = REGIONS.iter().map(|(r, _)| r.to_string()).collect();

    let historic: Vec<i32> = (2000..=2020).collect();
    let projection: Vec<i32> = (2020..=2050).collect();

    let tables = vec![
        DataTable::new(
            regions.clone(),
            historic.clone(),
            series(&historic, 2020, 0.02),
            meta(source, "Historic"),
        )?,
        DataTable::new(
            regions,
            projection.clone(),
            series(&projection, 2020, -0.015),
            meta(source, "Projection"),
        )?,
    ];

    let record = SourceRecord::new(source.clone())
        .with_collected_by("datashelf")
        .with_licence("CC-BY-4.0")
        .with_url("https://example.org/sandbox");
    Ok((tables, record))
}
