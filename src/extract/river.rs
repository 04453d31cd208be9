use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use super::ShapefileIndex;
use crate::config::{INT_FILL, PIXEL_FILL, SHAPE_FILL};
use crate::error::{InputError, Result};
use crate::index::CyclePass;
use crate::io::shapefile::{AttributeTable, Row, ShapefileKind, read_attribute_table};
use crate::storage::Storage;
use crate::vars::{Grid, NODE_APPENDED_VARS, NODE_VARS, REACH_VARS, Series};

// Extracted river observations: reach series over nt, node grids over
// (nx, nt), and the cycle/pass label per observed time step.
#[derive(Debug)]
pub struct RiverData {
    pub reach_id: u64,
    pub node_ids: Vec<u64>,
    pub reach: HashMap<&'static str, Series>,
    pub node: HashMap<&'static str, Grid>,
    pub obs: Vec<String>,
}

/// Extract one reach and its nodes over the resolved cycle/pass order.
pub async fn extract_river(
    storage: &Storage,
    index: &ShapefileIndex,
    reach_id: u64,
    node_ids: &[u64],
    cycle_passes: &[CyclePass],
    scratch: &Path,
) -> Result<RiverData> {
    info!("processing reach {reach_id}");

    let pb = ProgressBar::new(cycle_passes.len() as u64 * 2);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} shapefiles")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    let mut steps = Vec::with_capacity(cycle_passes.len());
    for cp in cycle_passes {
        let reach_table = match index.get(ShapefileKind::Reach, *cp) {
            Some(name) => {
                let path = storage.fetch(name, scratch).await?;
                Some(read_attribute_table(&path)?)
            }
            None => None,
        };
        pb.inc(1);

        let node_table = match index.get(ShapefileKind::Node, *cp) {
            Some(name) => {
                let path = storage.fetch(name, scratch).await?;
                Some(read_attribute_table(&path)?)
            }
            None => None,
        };
        pb.inc(1);

        steps.push((*cp, reach_table, node_table));
    }
    pb.finish_and_clear();

    extract_river_tables(reach_id, node_ids, &steps)
}

/// Table-level extraction, separated from storage access.
pub fn extract_river_tables(
    reach_id: u64,
    node_ids: &[u64],
    steps: &[(CyclePass, Option<AttributeTable>, Option<AttributeTable>)],
) -> Result<RiverData> {
    let mut reach: HashMap<&'static str, Series> = REACH_VARS
        .iter()
        .map(|d| (d.name, Series::empty(d.kind)))
        .collect();

    // Reach pass: observed time steps are the cycle/passes with a
    // matching reach record, in resolved order
    let mut observed: Vec<CyclePass> = Vec::new();
    for (cp, reach_table, _) in steps {
        if let Some(table) = reach_table {
            if extract_reach_step(table, reach_id, &mut reach) {
                observed.push(*cp);
            }
        }
    }

    // Node pass: grids are sized to the observed reach steps, and a node
    // observation outside them breaks the alignment invariant
    let nx = node_ids.len();
    let nt = observed.len();
    let mut node: HashMap<&'static str, Grid> = NODE_VARS
        .iter()
        .map(|d| (d.name, Grid::filled(d.kind, nx, nt)))
        .collect();
    let node_pos: HashMap<u64, usize> = node_ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

    for (cp, _, node_table) in steps {
        let Some(table) = node_table else { continue };
        let matches = table
            .rows
            .iter()
            .any(|r| r.id("node_id").is_some_and(|id| node_pos.contains_key(&id)));
        if !matches {
            continue;
        }
        match observed.iter().position(|o| o == cp) {
            Some(t) => extract_node_step(table, &node_pos, &mut node, t),
            None => return Err(InputError::ReachNodeMismatch(cp.label())),
        }
    }

    // The product sometimes carries no d_x_area at all; recompute it
    // from wse and width
    let dxa_missing = matches!(
        reach.get("d_x_area"),
        Some(Series::Float(v)) if v.iter().all(|x| x.is_nan())
    );
    if dxa_missing {
        let wse = reach.get("wse").and_then(Series::as_floats).unwrap_or(&[]).to_vec();
        let width = reach.get("width").and_then(Series::as_floats).unwrap_or(&[]).to_vec();
        reach.insert("d_x_area", Series::Float(calculate_d_x_area(&wse, &width)));
    }

    // Tile reach-level series across the nodes
    for def in NODE_APPENDED_VARS {
        if let Some(values) = reach.get(def.name).and_then(Series::as_floats) {
            node.insert(def.name, Grid::tiled(values, nx));
        }
    }

    let obs = observed.iter().map(CyclePass::label).collect();
    Ok(RiverData {
        reach_id,
        node_ids: node_ids.to_vec(),
        reach,
        node,
        obs,
    })
}

// Append the matching reach record's attributes; false when the reach
// is absent from this overpass
fn extract_reach_step(
    table: &AttributeTable,
    reach_id: u64,
    series: &mut HashMap<&'static str, Series>,
) -> bool {
    let Some(row) = table.rows.iter().find(|r| r.id("reach_id") == Some(reach_id)) else {
        return false;
    };

    for def in REACH_VARS {
        match series.get_mut(def.name) {
            Some(Series::Float(v)) => v.push(masked_float(row, def.name)),
            Some(Series::Int(v)) => v.push(masked_int(row, def.name)),
            Some(Series::Str(v)) => v.push(row.text(def.name).unwrap_or_default().to_string()),
            None => {}
        }
    }
    true
}

// Scatter matching node records into column t of the grids
fn extract_node_step(
    table: &AttributeTable,
    node_pos: &HashMap<u64, usize>,
    grids: &mut HashMap<&'static str, Grid>,
    t: usize,
) {
    for row in &table.rows {
        let Some(i) = row.id("node_id").and_then(|id| node_pos.get(&id).copied()) else {
            continue;
        };
        for def in NODE_VARS {
            match grids.get_mut(def.name) {
                Some(Grid::Float(a)) => a[[i, t]] = masked_float(row, def.name),
                Some(Grid::Int(a)) => a[[i, t]] = masked_int(row, def.name),
                Some(Grid::Str(a)) => {
                    a[[i, t]] = row.text(def.name).unwrap_or_default().to_string()
                }
                None => {}
            }
        }
    }
}

fn near(v: f64, fill: f64) -> bool {
    (v / fill - 1.0).abs() < 1.0e-5
}

// Missing or filled floats become NaN in memory
pub(crate) fn masked_float(row: &Row, name: &str) -> f64 {
    match row.float(name) {
        Some(v) if near(v, SHAPE_FILL) || near(v, crate::config::FLOAT_FILL) => f64::NAN,
        Some(v) => v,
        None => f64::NAN,
    }
}

// Missing integers become the integer fill
pub(crate) fn masked_int(row: &Row, name: &str) -> i32 {
    match row.int(name) {
        Some(v) if v == PIXEL_FILL => INT_FILL,
        Some(v) => i32::try_from(v).unwrap_or(INT_FILL),
        None => INT_FILL,
    }
}

/// Change in cross-sectional area: width times the deviation of wse
/// from its (missing-skipping) median.
pub fn calculate_d_x_area(wse: &[f64], width: &[f64]) -> Vec<f64> {
    let m = median(wse);
    wse.iter()
        .zip(width.iter())
        .map(|(h, w)| w * (h - m))
        .collect()
}

fn median(values: &[f64]) -> f64 {
    let mut v: Vec<f64> = values.iter().copied().filter(|x| !x.is_nan()).collect();
    if v.is_empty() {
        return f64::NAN;
    }
    v.sort_by(|a, b| a.total_cmp(b));
    let mid = v.len() / 2;
    if v.len() % 2 == 0 {
        (v[mid - 1] + v[mid]) / 2.0
    } else {
        v[mid]
    }
}
