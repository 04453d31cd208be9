use ndarray::Array2;

use crate::config::{FLOAT_FILL, INT_FILL};

// Variable tables for the three attribute sets. The extractor fills one
// series (or one nx-by-nt grid) per entry; the writer walks the same
// table to emit the variable with its metadata.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Float,
    Int,
    Str,
}

#[derive(Debug, Clone, Copy)]
pub struct VarDef {
    pub name: &'static str,
    pub kind: VarKind,
    pub long_name: &'static str,
    pub units: Option<&'static str>,
    pub range: Option<(f64, f64)>,
}

const fn float(
    name: &'static str,
    long_name: &'static str,
    units: Option<&'static str>,
    range: Option<(f64, f64)>,
) -> VarDef {
    VarDef { name, kind: VarKind::Float, long_name, units, range }
}

const fn int(
    name: &'static str,
    long_name: &'static str,
    units: Option<&'static str>,
    range: Option<(f64, f64)>,
) -> VarDef {
    VarDef { name, kind: VarKind::Int, long_name, units, range }
}

const fn text(name: &'static str, long_name: &'static str) -> VarDef {
    VarDef { name, kind: VarKind::Str, long_name, units: None, range: None }
}

pub const TIME_UNITS: &str = "seconds since 2000-01-01 00:00:00.000";

// Reach-level variables extracted per observed cycle/pass
pub const REACH_VARS: &[VarDef] = &[
    float("slope", "water surface slope with respect to the geoid", Some("m/m"), Some((-0.001, 0.1))),
    float("slope_u", "total uncertainty in the water surface slope", Some("m/m"), Some((0.0, 0.1))),
    float("slope2", "enhanced water surface slope with respect to geoid", Some("m/m"), Some((-0.001, 0.1))),
    float("slope2_u", "uncertainty in the enhanced water surface slope", Some("m/m"), Some((0.0, 0.1))),
    float("width", "reach width", Some("m"), Some((0.0, 100000.0))),
    float("width_u", "total uncertainty in the reach width", Some("m"), Some((0.0, 100000.0))),
    float("wse", "water surface elevation with respect to the geoid", Some("m"), Some((-1500.0, 150000.0))),
    float("wse_u", "total uncertainty in the water surface elevation", Some("m"), Some((0.0, 999999.0))),
    float("d_x_area", "change in cross-sectional area", Some("m^2"), Some((-10000000.0, 10000000.0))),
    float("d_x_area_u", "total uncertainty of the change in the cross-sectional area", Some("m^2"), Some((0.0, 10000000.0))),
    int("reach_q", "summary quality indicator for the reach", None, Some((0.0, 3.0))),
    float("dark_frac", "fractional area of dark water", Some("1"), Some((-1000.0, 10000.0))),
    int("ice_clim_f", "climatological ice cover flag", None, Some((0.0, 2.0))),
    int("ice_dyn_f", "dynamical ice cover flag", None, Some((0.0, 2.0))),
    int("partial_f", "partial reach coverage flag", None, Some((0.0, 1.0))),
    int("n_good_nod", "number of nodes in the reach that have a valid WSE", Some("1"), Some((0.0, 100.0))),
    float("obs_frac_n", "fraction of nodes that have a valid WSE", Some("1"), Some((0.0, 1.0))),
    int("xovr_cal_q", "quality of the cross-over calibration", None, Some((0.0, 2.0))),
    float("time", "time (UTC)", Some(TIME_UNITS), None),
    text("time_str", "UTC time"),
];

// Node-level variables extracted per observed cycle/pass
pub const NODE_VARS: &[VarDef] = &[
    float("width", "node width", Some("m"), Some((0.0, 100000.0))),
    float("width_u", "total uncertainty in the node width", Some("m"), Some((0.0, 100000.0))),
    float("wse", "water surface elevation with respect to the geoid", Some("m"), Some((-1000.0, 100000.0))),
    float("wse_u", "total uncertainty in the water surface elevation", Some("m"), Some((0.0, 999999.0))),
    int("node_q", "summary quality indicator for the node", None, Some((0.0, 3.0))),
    int("node_q_b", "bitwise quality indicator for the node", None, Some((0.0, 533491359.0))),
    float("dark_frac", "fractional area of dark water", Some("1"), Some((0.0, 1.0))),
    int("ice_clim_f", "climatological ice cover flag", None, Some((0.0, 2.0))),
    int("ice_dyn_f", "dynamical ice cover flag", None, Some((0.0, 2.0))),
    int("n_good_pix", "number of pixels that have a valid WSE", Some("1"), Some((0.0, 100000.0))),
    int("xovr_cal_q", "quality of the cross-over calibration", None, Some((0.0, 2.0))),
    float("time", "time (UTC)", Some(TIME_UNITS), None),
    text("time_str", "UTC time"),
];

// Reach-level variables tiled across nodes after extraction
pub const NODE_APPENDED_VARS: &[VarDef] = &[
    float("slope", "water surface slope with respect to the geoid", Some("m/m"), Some((-0.001, 0.1))),
    float("slope_u", "total uncertainty in the water surface slope", Some("m/m"), Some((0.0, 0.1))),
    float("slope2", "enhanced water surface slope with respect to geoid", Some("m/m"), Some((-0.001, 0.1))),
    float("slope2_u", "uncertainty in the enhanced water surface slope", Some("m/m"), Some((0.0, 0.1))),
    float("d_x_area", "change in cross-sectional area", Some("m^2"), Some((-10000000.0, 10000000.0))),
    float("d_x_area_u", "total uncertainty of the change in the cross-sectional area", Some("m^2"), Some((0.0, 10000000.0))),
];

// Lake variables; a deliberately disjoint set from the river context
pub const LAKE_VARS: &[VarDef] = &[
    text("lake_id", "lake ID(s) from prior database"),
    text("time_str", "UTC time"),
    float("delta_s_q", "storage change computed by quadratic method", Some("km^3"), Some((-1000.0, 1000.0))),
];

pub fn var_def(table: &'static [VarDef], name: &str) -> Option<&'static VarDef> {
    table.iter().find(|d| d.name == name)
}

// One time series: values appended in observed time-step order
#[derive(Debug, Clone, PartialEq)]
pub enum Series {
    Float(Vec<f64>),
    Int(Vec<i32>),
    Str(Vec<String>),
}

impl Series {
    pub fn empty(kind: VarKind) -> Self {
        match kind {
            VarKind::Float => Series::Float(Vec::new()),
            VarKind::Int => Series::Int(Vec::new()),
            VarKind::Str => Series::Str(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Series::Float(v) => v.len(),
            Series::Int(v) => v.len(),
            Series::Str(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_floats(&self) -> Option<&[f64]> {
        match self {
            Series::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_ints(&self) -> Option<&[i32]> {
        match self {
            Series::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_strs(&self) -> Option<&[String]> {
        match self {
            Series::Str(v) => Some(v),
            _ => None,
        }
    }
}

// One nx-by-nt grid, pre-filled with the kind's fill value
#[derive(Debug, Clone, PartialEq)]
pub enum Grid {
    Float(Array2<f64>),
    Int(Array2<i32>),
    Str(Array2<String>),
}

impl Grid {
    pub fn filled(kind: VarKind, nx: usize, nt: usize) -> Self {
        match kind {
            VarKind::Float => Grid::Float(Array2::from_elem((nx, nt), f64::NAN)),
            VarKind::Int => Grid::Int(Array2::from_elem((nx, nt), INT_FILL)),
            VarKind::Str => Grid::Str(Array2::from_elem((nx, nt), String::new())),
        }
    }

    /// Tile a reach-level float series across nx node rows.
    pub fn tiled(values: &[f64], nx: usize) -> Self {
        let nt = values.len();
        let mut grid = Array2::from_elem((nx, nt), f64::NAN);
        for mut row in grid.rows_mut() {
            for (t, v) in values.iter().enumerate() {
                row[t] = *v;
            }
        }
        Grid::Float(grid)
    }

    pub fn shape(&self) -> (usize, usize) {
        let d = match self {
            Grid::Float(a) => a.dim(),
            Grid::Int(a) => a.dim(),
            Grid::Str(a) => a.dim(),
        };
        (d.0, d.1)
    }
}

/// NaN values become the float fill on disk.
pub fn nan_to_fill(v: f64) -> f64 {
    if v.is_nan() { FLOAT_FILL } else { v }
}
