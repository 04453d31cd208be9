use gdal::Dataset;
use gdal::vector::{FieldValue, LayerAccess};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{InputError, Result};

// SWOT shapefile names carry metadata as underscore-separated fields:
// SWOT_L2_HR_RiverSP_Reach_<cycle>_<pass>_<continent>_..._<counter>.shp

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapefileKind {
    Reach,
    Node,
    Prior,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapefileName {
    pub kind: ShapefileKind,
    pub cycle: u32,
    pub pass: u32,
    pub continent: String,
    pub first_processing: bool,
}

impl ShapefileName {
    /// Parse a shapefile object key or file name; `None` when the name
    /// does not follow the SWOT convention.
    pub fn parse(key: &str) -> Option<Self> {
        let file_name = key.rsplit('/').next()?;
        let stem = file_name.strip_suffix(".shp")?;
        let parts: Vec<&str> = stem.split('_').collect();
        if parts.len() < 8 {
            return None;
        }

        let kind = match parts[4] {
            "Reach" => ShapefileKind::Reach,
            "Node" => ShapefileKind::Node,
            "Prior" => ShapefileKind::Prior,
            _ => return None,
        };

        Some(ShapefileName {
            kind,
            cycle: parts[5].parse().ok()?,
            pass: parts[6].parse().ok()?,
            continent: parts[7].to_string(),
            first_processing: stem.ends_with('1'),
        })
    }
}

// One shapefile feature's attributes, geometry discarded
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Float(f64),
    Int(i64),
    Str(String),
}

#[derive(Debug, Clone, Default)]
pub struct Row {
    fields: HashMap<String, Field>,
}

impl Row {
    pub fn new(fields: HashMap<String, Field>) -> Self {
        Row { fields }
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        match self.fields.get(name)? {
            Field::Float(v) => Some(*v),
            Field::Int(v) => Some(*v as f64),
            Field::Str(_) => None,
        }
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.fields.get(name)? {
            Field::Int(v) => Some(*v),
            Field::Float(v) => Some(*v as i64),
            Field::Str(_) => None,
        }
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.fields.get(name)? {
            Field::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Identifier fields arrive as int64, real or text depending on the
    /// shapefile writer; normalize to u64.
    pub fn id(&self, name: &str) -> Option<u64> {
        match self.fields.get(name)? {
            Field::Int(v) => u64::try_from(*v).ok(),
            Field::Float(v) if *v >= 0.0 => Some(*v as u64),
            Field::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

// In-memory attribute table for one shapefile
#[derive(Debug, Clone, Default)]
pub struct AttributeTable {
    pub rows: Vec<Row>,
}

/// Read the attribute table of the first layer of a shapefile.
pub fn read_attribute_table(path: &Path) -> Result<AttributeTable> {
    let dataset = Dataset::open(path)
        .map_err(|e| InputError::Extraction(format!("cannot open {}: {e}", path.display())))?;
    let mut layer = dataset
        .layer(0)
        .map_err(|e| InputError::Extraction(format!("no layer in {}: {e}", path.display())))?;

    let mut rows = Vec::new();
    for feature in layer.features() {
        let mut fields = HashMap::new();
        for (name, value) in feature.fields() {
            let field = match value {
                Some(FieldValue::IntegerValue(v)) => Field::Int(v as i64),
                Some(FieldValue::Integer64Value(v)) => Field::Int(v),
                Some(FieldValue::RealValue(v)) => Field::Float(v),
                Some(FieldValue::StringValue(v)) => Field::Str(v),
                _ => continue,
            };
            fields.insert(name, field);
        }
        rows.push(Row::new(fields));
    }

    Ok(AttributeTable { rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_reach_shapefile_name() {
        let name = ShapefileName::parse(
            "shapefiles/SWOT_L2_HR_RiverSP_Reach_001_249_NA_20230610T193337_20230610T193344_PIA1_01.shp",
        )
        .unwrap();
        assert_eq!(name.kind, ShapefileKind::Reach);
        assert_eq!(name.cycle, 1);
        assert_eq!(name.pass, 249);
        assert_eq!(name.continent, "NA");
        assert!(name.first_processing);
    }

    #[test]
    fn parses_node_and_prior_names() {
        let node = ShapefileName::parse(
            "SWOT_L2_HR_RiverSP_Node_002_249_NA_20230610T193337_20230610T193344_PIA1_01.shp",
        )
        .unwrap();
        assert_eq!(node.kind, ShapefileKind::Node);
        assert_eq!(node.cycle, 2);

        let prior = ShapefileName::parse(
            "SWOT_L2_HR_LakeSP_Prior_003_249_SA_20230610T193337_20230610T193344_PIA1_01.shp",
        )
        .unwrap();
        assert_eq!(prior.kind, ShapefileKind::Prior);
        assert_eq!(prior.continent, "SA");
    }

    #[test]
    fn later_processing_counters_are_flagged() {
        let name = ShapefileName::parse(
            "SWOT_L2_HR_RiverSP_Reach_001_249_NA_20230610T193337_20230610T193344_PIA1_02.shp",
        )
        .unwrap();
        assert!(!name.first_processing);
    }

    #[test]
    fn rejects_foreign_names() {
        assert!(ShapefileName::parse("reaches.shp").is_none());
        assert!(ShapefileName::parse("SWOT_L2_HR_RiverSP_Other_1_2_NA_a_b_c_01.shp").is_none());
        assert!(ShapefileName::parse("SWOT_L2_HR_RiverSP_Reach_x_2_NA_a_b_c_01.shp").is_none());
    }

    #[test]
    fn row_normalizes_identifier_types() {
        let mut fields = HashMap::new();
        fields.insert("reach_id".to_string(), Field::Str("74267800071".to_string()));
        fields.insert("node_id".to_string(), Field::Int(74267800010));
        fields.insert("wse".to_string(), Field::Float(7.99663));
        let row = Row::new(fields);

        assert_eq!(row.id("reach_id"), Some(74267800071));
        assert_eq!(row.id("node_id"), Some(74267800010));
        assert_eq!(row.float("wse"), Some(7.99663));
        assert_eq!(row.float("missing"), None);
        assert_eq!(row.int("node_id"), Some(74267800010));
    }
}
