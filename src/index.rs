use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::config::{Context, continent_abbr};
use crate::error::{InputError, Result};
use crate::io::shapefile::ShapefileName;

// One satellite overpass: "cycle_pass" in documents and file names,
// "cycle/pass" in output labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CyclePass {
    pub cycle: u32,
    pub pass: u32,
}

impl CyclePass {
    pub fn parse(s: &str) -> Option<Self> {
        let (c, p) = s.split_once('_')?;
        Some(CyclePass {
            cycle: c.parse().ok()?,
            pass: p.parse().ok()?,
        })
    }

    pub fn label(&self) -> String {
        format!("{}/{}", self.cycle, self.pass)
    }
}

#[derive(Debug, Deserialize)]
struct ReachEntry {
    reach_id: u64,
    node_ids: Vec<u64>,
}

#[derive(Debug, Deserialize)]
struct LakeEntry {
    lake_id: String,
}

// What this invocation extracts: one reach with its nodes, or one lake
#[derive(Debug, Clone)]
pub enum Target {
    Reach { reach_id: u64, node_ids: Vec<u64> },
    Lake { lake_id: String },
}

impl Target {
    pub fn swot_id(&self) -> String {
        match self {
            Target::Reach { reach_id, .. } => reach_id.to_string(),
            Target::Lake { lake_id } => lake_id.clone(),
        }
    }
}

// Everything the rest of the pipeline needs for one job index
#[derive(Debug, Clone)]
pub struct Resolved {
    pub target: Target,
    pub continent: &'static str,
    pub cycle_passes: Vec<CyclePass>,
    pub shapefiles: Vec<String>,
}

/// Resolve a job array index against the reach/node, cycle/pass and
/// (cloud mode) shapefile-listing JSON documents.
pub fn resolve(
    context: Context,
    index: usize,
    reach_json: &Path,
    pass_json: &Path,
    shapefile_json: Option<&Path>,
) -> Result<Resolved> {
    let target = resolve_target(context, index, reach_json)?;
    let swot_id = target.swot_id();

    let continent = continent_abbr(&swot_id).ok_or_else(|| {
        InputError::Config(format!("identifier {swot_id} has no continent code"))
    })?;

    let cycle_passes = resolve_cycle_passes(pass_json, &swot_id)?;

    let shapefiles = match shapefile_json {
        Some(path) => {
            let keys: Vec<String> = serde_json::from_str(&read_doc(path)?)?;
            keys.into_iter()
                .filter(|k| {
                    ShapefileName::parse(k).is_some_and(|n| n.continent == continent)
                })
                .collect()
        }
        None => Vec::new(),
    };

    Ok(Resolved { target, continent, cycle_passes, shapefiles })
}

fn resolve_target(context: Context, index: usize, reach_json: &Path) -> Result<Target> {
    let doc = read_doc(reach_json)?;
    match context {
        Context::River => {
            let entries: Vec<ReachEntry> = serde_json::from_str(&doc)?;
            let entry = entries.get(index).ok_or_else(|| {
                InputError::Config(format!(
                    "index {index} out of range for {} reach entries",
                    entries.len()
                ))
            })?;
            Ok(Target::Reach {
                reach_id: entry.reach_id,
                node_ids: entry.node_ids.clone(),
            })
        }
        Context::Lake => {
            let entries: Vec<LakeEntry> = serde_json::from_str(&doc)?;
            let entry = entries.get(index).ok_or_else(|| {
                InputError::Config(format!(
                    "index {index} out of range for {} lake entries",
                    entries.len()
                ))
            })?;
            Ok(Target::Lake { lake_id: entry.lake_id.clone() })
        }
    }
}

fn resolve_cycle_passes(pass_json: &Path, swot_id: &str) -> Result<Vec<CyclePass>> {
    let doc: HashMap<String, Vec<String>> = serde_json::from_str(&read_doc(pass_json)?)?;
    let labels = doc.get(swot_id).ok_or_else(|| {
        InputError::Config(format!("no cycle/pass entry for identifier {swot_id}"))
    })?;

    labels
        .iter()
        .map(|l| {
            CyclePass::parse(l).ok_or_else(|| {
                InputError::Config(format!("malformed cycle/pass label {l:?} for {swot_id}"))
            })
        })
        .collect()
}

fn read_doc(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| InputError::Config(format!("cannot read {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    fn scenario_docs(dir: &tempfile::TempDir) -> (std::path::PathBuf, std::path::PathBuf) {
        // 26 filler entries, then the reach of interest at index 26
        let mut entries: Vec<String> = (0..26)
            .map(|i| format!(r#"{{"reach_id": {}, "node_ids": []}}"#, 71224000000u64 + i))
            .collect();
        entries.push(
            r#"{"reach_id": 74267800071, "node_ids": [74267800010, 74267800020]}"#.to_string(),
        );
        let reaches = write_tmp(dir, "reaches.json", &format!("[{}]", entries.join(",")));
        let passes = write_tmp(
            dir,
            "passes.json",
            r#"{"74267800071": ["1_249", "2_249", "3_249"]}"#,
        );
        (reaches, passes)
    }

    #[test]
    fn resolves_reach_and_nodes_for_index() {
        let dir = tempfile::tempdir().unwrap();
        let (reaches, passes) = scenario_docs(&dir);

        let resolved = resolve(Context::River, 26, &reaches, &passes, None).unwrap();
        match &resolved.target {
            Target::Reach { reach_id, node_ids } => {
                assert_eq!(*reach_id, 74267800071);
                assert_eq!(node_ids, &[74267800010, 74267800020]);
            }
            _ => panic!("expected reach target"),
        }
        assert_eq!(resolved.continent, "NA");
        assert_eq!(resolved.cycle_passes.len(), 3);
        assert_eq!(resolved.cycle_passes[0], CyclePass { cycle: 1, pass: 249 });
        assert_eq!(resolved.cycle_passes[2].label(), "3/249");
    }

    #[test]
    fn resolution_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let (reaches, passes) = scenario_docs(&dir);

        let a = resolve(Context::River, 26, &reaches, &passes, None).unwrap();
        let b = resolve(Context::River, 26, &reaches, &passes, None).unwrap();
        assert_eq!(a.target.swot_id(), b.target.swot_id());
        assert_eq!(a.cycle_passes, b.cycle_passes);
    }

    #[test]
    fn out_of_range_index_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let (reaches, passes) = scenario_docs(&dir);

        let err = resolve(Context::River, 99, &reaches, &passes, None).unwrap_err();
        assert!(matches!(err, InputError::Config(_)), "got {err:?}");
    }

    #[test]
    fn missing_cycle_pass_key_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let reaches = write_tmp(
            &dir,
            "reaches.json",
            r#"[{"reach_id": 74267800071, "node_ids": []}]"#,
        );
        let passes = write_tmp(&dir, "passes.json", r#"{"11111111111": ["1_1"]}"#);

        let err = resolve(Context::River, 0, &reaches, &passes, None).unwrap_err();
        assert!(matches!(err, InputError::Config(_)), "got {err:?}");
    }

    #[test]
    fn malformed_reach_json_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let reaches = write_tmp(&dir, "reaches.json", r#"[{"reach_id": "not a number"}]"#);
        let passes = write_tmp(&dir, "passes.json", "{}");

        let err = resolve(Context::River, 0, &reaches, &passes, None).unwrap_err();
        assert!(matches!(err, InputError::Config(_)), "got {err:?}");
    }

    #[test]
    fn shapefile_keys_filtered_to_continent() {
        let dir = tempfile::tempdir().unwrap();
        let (reaches, passes) = scenario_docs(&dir);
        let listing = write_tmp(
            &dir,
            "s3_list.json",
            r#"[
                "SWOT_L2_HR_RiverSP_Reach_001_249_NA_20230610T010101_20230610T010111_PIA1_01.shp",
                "SWOT_L2_HR_RiverSP_Reach_001_249_EU_20230610T010101_20230610T010111_PIA1_01.shp",
                "not_a_swot_name.shp"
            ]"#,
        );

        let resolved = resolve(Context::River, 26, &reaches, &passes, Some(&listing)).unwrap();
        assert_eq!(resolved.shapefiles.len(), 1);
        assert!(resolved.shapefiles[0].contains("_NA_"));
    }

    #[test]
    fn lake_context_resolves_lake_entry() {
        let dir = tempfile::tempdir().unwrap();
        let lakes = write_tmp(&dir, "lakes.json", r#"[{"lake_id": "6350036102"}]"#);
        let passes = write_tmp(&dir, "passes.json", r#"{"6350036102": ["1_249"]}"#);

        let resolved = resolve(Context::Lake, 0, &lakes, &passes, None).unwrap();
        assert_eq!(resolved.target.swot_id(), "6350036102");
        assert_eq!(resolved.continent, "SA");
    }
}
