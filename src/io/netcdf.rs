use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{FLOAT_FILL, INT_FILL};
use crate::error::Result;
use crate::extract::{Extracted, LakeData, RiverData};
use crate::vars::{
    Grid, LAKE_VARS, NODE_APPENDED_VARS, NODE_VARS, REACH_VARS, Series, VarDef, VarKind,
    nan_to_fill,
};

/// Serialize extracted observations into a NetCDF file inside the
/// scratch directory, returning the finished path. The file is complete
/// and closed before this returns; the stager moves it into place.
pub fn write(scratch: &Path, continent: &str, extracted: &Extracted) -> Result<PathBuf> {
    match extracted {
        Extracted::River(data) => write_river(scratch, continent, data),
        Extracted::Lake(data) => write_lake(scratch, continent, data),
    }
}

// One file per reach: reach series in a "reach" group over (nt), node
// grids in a "node" group over (nx, nt)
pub fn write_river(scratch: &Path, continent: &str, data: &RiverData) -> Result<PathBuf> {
    let path = scratch.join(format!("{}_SWOT.nc", data.reach_id));
    let tmp = scratch.join(format!("{}_SWOT.nc.tmp", data.reach_id));
    let nt = data.obs.len();
    let nx = data.node_ids.len();

    {
        let mut file = netcdf::create(&tmp)?;

        file.add_attribute("title", format!("SWOT Data for Reach {}", data.reach_id))?;
        file.add_attribute("reach_id", data.reach_id as i64)?;
        file.add_attribute("history", Utc::now().format("%m/%d/%Y %H:%M:%S").to_string())?;
        file.add_attribute("continent", continent)?;

        file.add_dimension("nt", nt)?;
        file.add_dimension("nx", nx)?;
        write_coordinates(&mut file, nt, nx)?;
        write_observations(&mut file, &data.obs)?;

        {
            let mut reach = file.add_group("reach")?;
            let mut id_v = reach.add_variable::<i64>("reach_id", &[])?;
            id_v.put_attribute("long_name", "reach ID from prior river database")?;
            id_v.put_values(&[data.reach_id as i64], ..)?;

            for def in REACH_VARS {
                write_series(&mut reach, def, data.reach.get(def.name))?;
            }
        }

        {
            let mut node = file.add_group("node")?;
            let mut rid_v = node.add_variable::<i64>("reach_id", &[])?;
            rid_v.put_attribute("long_name", "reach ID from prior river database")?;
            rid_v.put_values(&[data.reach_id as i64], ..)?;

            let node_ids: Vec<i64> = data.node_ids.iter().map(|id| *id as i64).collect();
            let mut nid_v = node.add_variable::<i64>("node_id", &["nx"])?;
            nid_v.put_attribute("long_name", "node ID of the node in the prior river database")?;
            if nx > 0 {
                nid_v.put_values(&node_ids, ..)?;
            }

            for def in NODE_VARS.iter().chain(NODE_APPENDED_VARS) {
                write_grid(&mut node, def, data.node.get(def.name))?;
            }
        }
    }

    fs::rename(&tmp, &path).map_err(crate::error::InputError::Io)?;
    Ok(path)
}

// One file per lake with the lake attribute set over (nt)
pub fn write_lake(scratch: &Path, continent: &str, data: &LakeData) -> Result<PathBuf> {
    let path = scratch.join(format!("{}_SWOT.nc", data.lake_id));
    let tmp = scratch.join(format!("{}_SWOT.nc.tmp", data.lake_id));
    let nt = data.obs.len();

    {
        let mut file = netcdf::create(&tmp)?;

        file.add_attribute("title", format!("SWOT Data for Lake {}", data.lake_id))?;
        file.add_attribute("lake_id", data.lake_id.as_str())?;
        file.add_attribute("history", Utc::now().format("%m/%d/%Y %H:%M:%S").to_string())?;
        file.add_attribute("continent", continent)?;

        file.add_dimension("nt", nt)?;
        let mut nt_v = file.add_variable::<i32>("nt", &["nt"])?;
        nt_v.put_attribute("units", "pass")?;
        nt_v.put_attribute("long_name", "time steps")?;
        if nt > 0 {
            nt_v.put_values(&(0..nt as i32).collect::<Vec<i32>>(), ..)?;
        }
        write_observations(&mut file, &data.obs)?;

        // created files are NetCDF-4, which always has a root group
        let mut root = file.root_mut().expect("netcdf-4 root group");
        for def in LAKE_VARS {
            write_series(&mut root, def, data.series.get(def.name))?;
        }
    }

    fs::rename(&tmp, &path).map_err(crate::error::InputError::Io)?;
    Ok(path)
}

fn write_coordinates(file: &mut netcdf::FileMut, nt: usize, nx: usize) -> Result<()> {
    let mut nt_v = file.add_variable::<i32>("nt", &["nt"])?;
    nt_v.put_attribute("units", "pass")?;
    nt_v.put_attribute("long_name", "time steps")?;
    if nt > 0 {
        nt_v.put_values(&(0..nt as i32).collect::<Vec<i32>>(), ..)?;
    }

    let mut nx_v = file.add_variable::<i32>("nx", &["nx"])?;
    nx_v.put_attribute("units", "node")?;
    nx_v.put_attribute("long_name", "number of nodes")?;
    if nx > 0 {
        nx_v.put_values(&(1..=nx as i32).collect::<Vec<i32>>(), ..)?;
    }
    Ok(())
}

// Global list of "cycle/pass" labels, one per observed time step
fn write_observations(file: &mut netcdf::FileMut, obs: &[String]) -> Result<()> {
    let mut var = file.add_string_variable("observations", &["nt"])?;
    var.put_attribute("units", "pass")?;
    var.put_attribute("long_name", "cycle/pass observations")?;
    for (i, label) in obs.iter().enumerate() {
        var.put_string(label, (i,))?;
    }
    Ok(())
}

fn write_series(group: &mut netcdf::GroupMut, def: &VarDef, series: Option<&Series>) -> Result<()> {
    let Some(series) = series else { return Ok(()) };
    match series {
        Series::Float(values) => {
            let mut var = group.add_variable::<f64>(def.name, &["nt"])?;
            var.put_attribute("_FillValue", FLOAT_FILL)?;
            annotate(&mut var, def)?;
            if !values.is_empty() {
                let out: Vec<f64> = values.iter().map(|v| nan_to_fill(*v)).collect();
                var.put_values(&out, ..)?;
            }
        }
        Series::Int(values) => {
            let mut var = group.add_variable::<i32>(def.name, &["nt"])?;
            var.put_attribute("_FillValue", INT_FILL)?;
            annotate(&mut var, def)?;
            if !values.is_empty() {
                var.put_values(values, ..)?;
            }
        }
        Series::Str(values) => {
            let mut var = group.add_string_variable(def.name, &["nt"])?;
            annotate(&mut var, def)?;
            for (i, s) in values.iter().enumerate() {
                var.put_string(s, (i,))?;
            }
        }
    }
    Ok(())
}

fn write_grid(group: &mut netcdf::GroupMut, def: &VarDef, grid: Option<&Grid>) -> Result<()> {
    let Some(grid) = grid else { return Ok(()) };
    let (nx, nt) = grid.shape();
    match grid {
        Grid::Float(a) => {
            let mut var = group.add_variable::<f64>(def.name, &["nx", "nt"])?;
            var.put_attribute("_FillValue", FLOAT_FILL)?;
            annotate(&mut var, def)?;
            if nt > 0 {
                for i in 0..nx {
                    let row: Vec<f64> = a.row(i).iter().map(|v| nan_to_fill(*v)).collect();
                    var.put_values(&row, (&[i, 0], &[1, nt]))?;
                }
            }
        }
        Grid::Int(a) => {
            let mut var = group.add_variable::<i32>(def.name, &["nx", "nt"])?;
            var.put_attribute("_FillValue", INT_FILL)?;
            annotate(&mut var, def)?;
            if nt > 0 {
                for i in 0..nx {
                    let row: Vec<i32> = a.row(i).to_vec();
                    var.put_values(&row, (&[i, 0], &[1, nt]))?;
                }
            }
        }
        Grid::Str(a) => {
            let mut var = group.add_string_variable(def.name, &["nx", "nt"])?;
            annotate(&mut var, def)?;
            for ((i, j), s) in a.indexed_iter() {
                var.put_string(s, (i, j))?;
            }
        }
    }
    Ok(())
}

fn annotate(var: &mut netcdf::VariableMut, def: &VarDef) -> Result<()> {
    var.put_attribute("long_name", def.long_name)?;
    if let Some(units) = def.units {
        var.put_attribute("units", units)?;
    }
    if let Some((lo, hi)) = def.range {
        match def.kind {
            VarKind::Int => {
                var.put_attribute("valid_min", lo as i32)?;
                var.put_attribute("valid_max", hi as i32)?;
            }
            _ => {
                var.put_attribute("valid_min", lo)?;
                var.put_attribute("valid_max", hi)?;
            }
        }
    }
    if def.name == "time" {
        var.put_attribute("calendar", "gregorian")?;
    }
    Ok(())
}
