use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use super::ShapefileIndex;
use crate::error::Result;
use crate::index::CyclePass;
use crate::io::shapefile::{AttributeTable, ShapefileKind, read_attribute_table};
use crate::storage::Storage;
use crate::vars::{LAKE_VARS, Series};

use super::river::masked_float;

// Extracted lake observations: one appended value set per observed
// cycle/pass. The attribute set is deliberately distinct from the river
// context.
pub struct LakeData {
    pub lake_id: String,
    pub series: HashMap<&'static str, Series>,
    pub obs: Vec<String>,
}

/// Extract one lake over the resolved cycle/pass order from the Prior
/// lake shapefiles.
pub async fn extract_lake(
    storage: &Storage,
    index: &ShapefileIndex,
    lake_id: &str,
    cycle_passes: &[CyclePass],
    scratch: &Path,
) -> Result<LakeData> {
    info!("processing lake {lake_id}");

    let mut steps = Vec::with_capacity(cycle_passes.len());
    for cp in cycle_passes {
        let table = match index.get(ShapefileKind::Prior, *cp) {
            Some(name) => {
                let path = storage.fetch(name, scratch).await?;
                Some(read_attribute_table(&path)?)
            }
            None => None,
        };
        steps.push((*cp, table));
    }

    extract_lake_tables(lake_id, &steps)
}

/// Table-level extraction, separated from storage access.
pub fn extract_lake_tables(
    lake_id: &str,
    steps: &[(CyclePass, Option<AttributeTable>)],
) -> Result<LakeData> {
    let mut series: HashMap<&'static str, Series> = LAKE_VARS
        .iter()
        .map(|d| (d.name, Series::empty(d.kind)))
        .collect();
    let mut obs = Vec::new();

    for (cp, table) in steps {
        let Some(table) = table else { continue };
        if extract_lake_step(table, lake_id, &mut series) {
            obs.push(cp.label());
        }
    }

    Ok(LakeData {
        lake_id: lake_id.to_string(),
        series,
        obs,
    })
}

// Append the matching lake record's attributes; false when the lake is
// absent from this overpass
fn extract_lake_step(
    table: &AttributeTable,
    lake_id: &str,
    series: &mut HashMap<&'static str, Series>,
) -> bool {
    let Some(row) = table.rows.iter().find(|r| r.text("lake_id") == Some(lake_id)) else {
        return false;
    };

    for def in LAKE_VARS {
        match series.get_mut(def.name) {
            Some(Series::Float(v)) => v.push(masked_float(row, def.name)),
            Some(Series::Int(v)) => v.push(
                row.int(def.name)
                    .and_then(|x| i32::try_from(x).ok())
                    .unwrap_or(crate::config::INT_FILL),
            ),
            Some(Series::Str(v)) => v.push(row.text(def.name).unwrap_or_default().to_string()),
            None => {}
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SHAPE_FILL;
    use crate::io::shapefile::{Field, Row};

    const LAKE_ID: &str = "6350036102";

    fn lake_row(lake_id: &str, delta_s_q: f64, time_str: &str) -> Row {
        let mut fields = HashMap::new();
        fields.insert("lake_id".to_string(), Field::Str(lake_id.to_string()));
        fields.insert("delta_s_q".to_string(), Field::Float(delta_s_q));
        fields.insert("time_str".to_string(), Field::Str(time_str.to_string()));
        Row::new(fields)
    }

    fn cp(cycle: u32) -> CyclePass {
        CyclePass { cycle, pass: 249 }
    }

    #[test]
    fn extracts_lake_fields_per_observed_step() {
        let steps = vec![
            (
                cp(1),
                Some(AttributeTable {
                    rows: vec![
                        lake_row("1110008673", 9.9, "x"),
                        lake_row(LAKE_ID, 0.25, "2023-06-10T19:33:37Z"),
                    ],
                }),
            ),
            (cp(2), None),
            (
                cp(3),
                Some(AttributeTable {
                    rows: vec![lake_row(LAKE_ID, SHAPE_FILL, "2023-07-01T19:33:37Z")],
                }),
            ),
        ];

        let data = extract_lake_tables(LAKE_ID, &steps).unwrap();
        assert_eq!(data.obs, vec!["1/249", "3/249"]);

        let dsq = data.series.get("delta_s_q").unwrap().as_floats().unwrap();
        assert_eq!(dsq.len(), 2);
        assert_eq!(dsq[0], 0.25);
        assert!(dsq[1].is_nan(), "fill marker must be masked");

        let ids = data.series.get("lake_id").unwrap().as_strs().unwrap();
        assert_eq!(ids, &[LAKE_ID.to_string(), LAKE_ID.to_string()]);
    }

    #[test]
    fn unmatched_lake_yields_empty_series() {
        let steps = vec![(
            cp(1),
            Some(AttributeTable { rows: vec![lake_row("1110008673", 1.0, "x")] }),
        )];
        let data = extract_lake_tables(LAKE_ID, &steps).unwrap();

        assert!(data.obs.is_empty());
        for def in LAKE_VARS {
            assert!(data.series.get(def.name).unwrap().is_empty(), "{}", def.name);
        }
    }
}
