use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;
use crate::index::{CyclePass, Resolved, Target};
use crate::io::shapefile::{ShapefileKind, ShapefileName};
use crate::storage::Storage;

pub mod lake;
pub mod river;

pub use lake::LakeData;
pub use river::RiverData;

// Lookup from (kind, cycle, pass) to the shapefile name or object key
// holding that overpass. Only first-processing files for the target
// continent are indexed.
pub struct ShapefileIndex {
    map: HashMap<(ShapefileKind, u32, u32), String>,
}

impl ShapefileIndex {
    pub fn build(names: &[String], continent: &str) -> Self {
        let mut map = HashMap::new();
        for name in names {
            if let Some(parsed) = ShapefileName::parse(name) {
                if parsed.continent == continent && parsed.first_processing {
                    map.entry((parsed.kind, parsed.cycle, parsed.pass))
                        .or_insert_with(|| name.clone());
                }
            }
        }
        ShapefileIndex { map }
    }

    pub fn get(&self, kind: ShapefileKind, cp: CyclePass) -> Option<&str> {
        self.map.get(&(kind, cp.cycle, cp.pass)).map(String::as_str)
    }
}

pub enum Extracted {
    River(RiverData),
    Lake(LakeData),
}

impl Extracted {
    pub fn observation_count(&self) -> usize {
        match self {
            Extracted::River(d) => d.obs.len(),
            Extracted::Lake(d) => d.obs.len(),
        }
    }
}

/// Run the context-appropriate extraction for a resolved target.
pub async fn extract(storage: &Storage, resolved: &Resolved, scratch: &Path) -> Result<Extracted> {
    let names = storage.shapefile_names(&resolved.shapefiles)?;
    let index = ShapefileIndex::build(&names, resolved.continent);

    match &resolved.target {
        Target::Reach { reach_id, node_ids } => Ok(Extracted::River(
            river::extract_river(
                storage,
                &index,
                *reach_id,
                node_ids,
                &resolved.cycle_passes,
                scratch,
            )
            .await?,
        )),
        Target::Lake { lake_id } => Ok(Extracted::Lake(
            lake::extract_lake(storage, &index, lake_id, &resolved.cycle_passes, scratch).await?,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_keeps_first_processing_files_for_continent() {
        let names = vec![
            "SWOT_L2_HR_RiverSP_Reach_001_249_NA_20230610T010101_20230610T010111_PIA1_01.shp".to_string(),
            "SWOT_L2_HR_RiverSP_Reach_002_249_NA_20230610T010101_20230610T010111_PIA1_02.shp".to_string(),
            "SWOT_L2_HR_RiverSP_Reach_003_249_EU_20230610T010101_20230610T010111_PIA1_01.shp".to_string(),
            "SWOT_L2_HR_RiverSP_Node_001_249_NA_20230610T010101_20230610T010111_PIA1_01.shp".to_string(),
        ];
        let index = ShapefileIndex::build(&names, "NA");

        let cp1 = CyclePass { cycle: 1, pass: 249 };
        let cp2 = CyclePass { cycle: 2, pass: 249 };
        let cp3 = CyclePass { cycle: 3, pass: 249 };
        assert!(index.get(ShapefileKind::Reach, cp1).is_some());
        assert!(index.get(ShapefileKind::Node, cp1).is_some());
        // later processing counter is not first processing
        assert!(index.get(ShapefileKind::Reach, cp2).is_none());
        // wrong continent
        assert!(index.get(ShapefileKind::Reach, cp3).is_none());
    }
}
