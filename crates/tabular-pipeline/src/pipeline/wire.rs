//! Wire representation of a pipeline, as consumed by the processing service.
//!
//! [`serialize`] validates the model and converts it into a [`WireConfig`].
//! Field names match what the service already reads (`type`, `columns`,
//! `schema`, `mapping`, ...), and a column selection that covers every header
//! is sent as `null`, meaning "every column at execution time".

use super::model::PipelineModel;
use super::steps::{
    CastType, CleanerStrategy, ColumnSelection, EncoderStrategy, ScalerStrategy, StepKind,
};
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Name of the implicit ingestion step that always runs first.
pub const LOADER_STEP: &str = "loader";

/// Target columns of a step on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<Vec<String>>", into = "Option<Vec<String>>")]
pub enum ColumnTarget {
    /// Every column present when the job runs. Serialized as `null`.
    All,
    /// Exactly these columns, frozen at submission time.
    Columns(Vec<String>),
}

impl ColumnTarget {
    /// Sentinel when `selection` covers `headers`, else the ordered list.
    pub fn from_selection(selection: &ColumnSelection, headers: &[String]) -> Self {
        if selection.covers(headers) {
            Self::All
        } else {
            Self::Columns(selection.ordered(headers))
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

impl From<Option<Vec<String>>> for ColumnTarget {
    fn from(value: Option<Vec<String>>) -> Self {
        match value {
            None => Self::All,
            Some(columns) => Self::Columns(columns),
        }
    }
}

impl From<ColumnTarget> for Option<Vec<String>> {
    fn from(value: ColumnTarget) -> Self {
        match value {
            ColumnTarget::All => None,
            ColumnTarget::Columns(columns) => Some(columns),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderWire {
    #[serde(rename = "type")]
    pub format: String,
    pub separator: String,
}

impl Default for LoaderWire {
    fn default() -> Self {
        Self {
            format: "csv".to_string(),
            separator: ",".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanerWire {
    #[serde(rename = "type")]
    pub strategy: CleanerStrategy,
    pub remove_duplicates: bool,
    pub columns: ColumnTarget,
    /// Fill value, only sent for the constant strategy.
    #[serde(rename = "value", skip_serializing_if = "Option::is_none", default)]
    pub fill_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCasterWire {
    pub schema: BTreeMap<String, CastType>,
}

/// Ordinal ranks per column: column → (category → rank).
pub type OrdinalLevels = BTreeMap<String, BTreeMap<String, i64>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderWire {
    #[serde(rename = "type")]
    pub strategy: EncoderStrategy,
    /// Only sent for the ordinal strategy.
    #[serde(rename = "mapping", skip_serializing_if = "Option::is_none", default)]
    pub ordinal_levels: Option<OrdinalLevels>,
    pub columns: ColumnTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalerWire {
    #[serde(rename = "type")]
    pub strategy: ScalerStrategy,
    pub columns: ColumnTarget,
}

/// Complete, transport-ready pipeline description.
///
/// Every declared step is present; `order` alone decides execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireConfig {
    /// `"loader"` followed by the step kinds in user order.
    pub order: Vec<String>,
    pub loader: LoaderWire,
    pub cleaner: CleanerWire,
    pub typecaster: TypeCasterWire,
    pub encoder: EncoderWire,
    pub scaler: ScalerWire,
}

impl WireConfig {
    /// JSON text sent as the `config` form field.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// User-visible steps in execution order (without the loader).
    pub fn step_order(&self) -> Vec<StepKind> {
        self.order.iter().filter_map(|name| StepKind::parse(name)).collect()
    }
}

/// Validate `model` and convert it into its wire form.
///
/// # Errors
///
/// [`PipelineError::InvalidConfig`] when the cleaner uses the constant
/// strategy without a fill value, or the encoder uses the ordinal strategy
/// with a mapping that is missing or is not a JSON object of
/// column → category list / column → (category → rank).
pub fn serialize(model: &PipelineModel, headers: &[String]) -> Result<WireConfig> {
    let cleaner = model.cleaner();
    let fill_value = match cleaner.strategy {
        CleanerStrategy::Constant => match &cleaner.fill_value {
            Some(value) => Some(value.clone()),
            None => {
                return Err(PipelineError::InvalidConfig(
                    "constant cleaner requires a fill value".to_string(),
                ));
            }
        },
        _ => None,
    };

    let encoder = model.encoder();
    let ordinal_levels = match encoder.strategy {
        EncoderStrategy::Ordinal => {
            let text = encoder.ordinal_mapping.as_deref().unwrap_or("");
            let levels = parse_ordinal_mapping(text)?;
            for column in levels.keys().filter(|c| !headers.contains(*c)) {
                warn!("Ordinal mapping names unknown column '{}'", column);
            }
            Some(levels)
        }
        _ => None,
    };

    let mut order = Vec::with_capacity(model.order().len() + 1);
    order.push(LOADER_STEP.to_string());
    order.extend(model.order().iter().map(|k| k.as_str().to_string()));

    Ok(WireConfig {
        order,
        loader: LoaderWire::default(),
        cleaner: CleanerWire {
            strategy: cleaner.strategy,
            remove_duplicates: cleaner.remove_duplicate_rows,
            columns: ColumnTarget::from_selection(&cleaner.columns, headers),
            fill_value,
        },
        typecaster: TypeCasterWire {
            schema: cast_schema(&model.typecaster().column_types, headers),
        },
        encoder: EncoderWire {
            strategy: encoder.strategy,
            ordinal_levels,
            columns: ColumnTarget::from_selection(&encoder.columns, headers),
        },
        scaler: ScalerWire {
            strategy: model.scaler().strategy,
            columns: ColumnTarget::from_selection(&model.scaler().columns, headers),
        },
    })
}

/// Non-`str` casts only; the full mapping when every column is `str`.
///
/// Casts for columns outside `headers` are never sent. An all-default mapping
/// is sent as-is rather than as `{}`.
fn cast_schema(
    column_types: &BTreeMap<String, CastType>,
    headers: &[String],
) -> BTreeMap<String, CastType> {
    let known: BTreeMap<String, CastType> = column_types
        .iter()
        .filter(|(column, _)| headers.contains(*column))
        .map(|(column, cast)| (column.clone(), *cast))
        .collect();

    let filtered: BTreeMap<String, CastType> = known
        .iter()
        .filter(|(_, cast)| !cast.is_noop())
        .map(|(column, cast)| (column.clone(), *cast))
        .collect();

    if filtered.is_empty() { known } else { filtered }
}

/// Levels for one column, in either accepted shape.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ColumnLevels {
    /// `["low", "medium", "high"]`: rank is the list position.
    Ordered(Vec<String>),
    /// `{"low": 0, "medium": 1, "high": 2}`
    Ranked(BTreeMap<String, i64>),
}

/// Parse user-entered ordinal mapping text into column → (category → rank).
///
/// Both column → ordered category list and column → (category → rank)
/// objects are accepted, per column. Lists are converted by position.
pub fn parse_ordinal_mapping(text: &str) -> Result<OrdinalLevels> {
    if text.trim().is_empty() {
        return Err(PipelineError::InvalidConfig(
            "ordinal encoder requires a mapping".to_string(),
        ));
    }

    let raw: BTreeMap<String, ColumnLevels> = serde_json::from_str(text).map_err(|e| {
        PipelineError::InvalidConfig(format!(
            "ordinal mapping must be a JSON object of column to category list or category ranks: {}",
            e
        ))
    })?;

    if raw.is_empty() {
        return Err(PipelineError::InvalidConfig(
            "ordinal mapping must name at least one column".to_string(),
        ));
    }

    raw.into_iter()
        .map(|(column, levels)| {
            let ranks = match levels {
                ColumnLevels::Ordered(categories) => {
                    let mut seen = BTreeSet::new();
                    if let Some(dup) = categories.iter().find(|c| !seen.insert(c.as_str())) {
                        return Err(PipelineError::InvalidConfig(format!(
                            "ordinal mapping for '{}' lists '{}' twice",
                            column, dup
                        )));
                    }
                    categories
                        .into_iter()
                        .enumerate()
                        .map(|(rank, category)| (category, rank as i64))
                        .collect()
                }
                ColumnLevels::Ranked(ranks) => ranks,
            };

            if ranks.is_empty() {
                return Err(PipelineError::InvalidConfig(format!(
                    "ordinal mapping for '{}' has no categories",
                    column
                )));
            }

            Ok((column, ranks))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::steps::{
        CleanerPatch, EncoderPatch, ScalerPatch, StepKind::*, TypeCasterPatch,
    };
    use crate::preview::DatasetPreview;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn loaded_model(text: &str) -> PipelineModel {
        let preview = DatasetPreview::parse(text).unwrap();
        let mut model = PipelineModel::new();
        model.load_preview(&preview);
        model
    }

    #[test]
    fn test_full_selection_serializes_as_sentinel() {
        let model = loaded_model("name,age\nA,30\nB,\n");
        let wire = model.to_wire_config().unwrap();

        assert!(wire.cleaner.columns.is_all());
        assert!(wire.encoder.columns.is_all());
        assert!(wire.scaler.columns.is_all());

        let value = serde_json::to_value(&wire).unwrap();
        assert_eq!(value["cleaner"]["columns"], serde_json::Value::Null);
    }

    #[test]
    fn test_partial_selection_serializes_in_header_order() {
        let mut model = loaded_model("c,a,b,d\n1,2,3,4\n");
        model.toggle_column(Scaler, "b");

        let wire = model.to_wire_config().unwrap();
        assert_eq!(
            wire.scaler.columns,
            ColumnTarget::Columns(vec!["c".into(), "a".into(), "d".into()])
        );
        assert!(wire.cleaner.columns.is_all());
    }

    #[test]
    fn test_empty_selection_is_explicit_empty_list() {
        let mut model = loaded_model("a,b\n1,2\n");
        model.toggle_all_columns(Encoder);
        let value = serde_json::to_value(model.to_wire_config().unwrap()).unwrap();
        assert_eq!(value["encoder"]["columns"], json!([]));
    }

    #[test]
    fn test_order_is_prefixed_with_loader() {
        let mut model = loaded_model("a\n1\n");
        model.move_step(Scaler, Cleaner);
        let wire = model.to_wire_config().unwrap();

        assert_eq!(wire.order, vec!["loader", "scaler", "cleaner", "typecaster", "encoder"]);
        assert_eq!(wire.step_order(), vec![Scaler, Cleaner, TypeCaster, Encoder]);
    }

    #[test]
    fn test_default_wire_config_shape() {
        let model = loaded_model("name,age\nA,30\n");
        let value = serde_json::to_value(model.to_wire_config().unwrap()).unwrap();

        assert_eq!(
            value,
            json!({
                "order": ["loader", "cleaner", "typecaster", "encoder", "scaler"],
                "loader": { "type": "csv", "separator": "," },
                "cleaner": { "type": "mean", "remove_duplicates": false, "columns": null },
                "typecaster": { "schema": { "age": "str", "name": "str" } },
                "encoder": { "type": "onehot", "columns": null },
                "scaler": { "type": "standard", "columns": null }
            })
        );
    }

    #[test]
    fn test_constant_cleaner_requires_fill_value() {
        let mut model = loaded_model("a\n1\n");
        model.set_step_config(CleanerPatch::default().strategy(CleanerStrategy::Constant));

        let err = model.to_wire_config().unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));

        model.set_step_config(CleanerPatch::default().fill_value("0"));
        let wire = model.to_wire_config().unwrap();
        assert_eq!(wire.cleaner.fill_value.as_deref(), Some("0"));
    }

    #[test]
    fn test_fill_value_omitted_for_other_strategies() {
        let mut model = loaded_model("a\n1\n");
        model.set_step_config(CleanerPatch::default().fill_value("N/A"));
        let value = serde_json::to_value(model.to_wire_config().unwrap()).unwrap();
        assert!(value["cleaner"].get("value").is_none());
    }

    #[test]
    fn test_typecaster_sends_only_non_default_casts() {
        let mut model = loaded_model("name,age,score\nA,30,1.5\n");
        model.set_step_config(
            TypeCasterPatch::default()
                .cast("age", CastType::Int)
                .cast("score", CastType::Float),
        );

        let wire = model.to_wire_config().unwrap();
        assert_eq!(wire.typecaster.schema.len(), 2);
        assert_eq!(wire.typecaster.schema["age"], CastType::Int);
        assert!(!wire.typecaster.schema.contains_key("name"));
    }

    #[test]
    fn test_typecaster_falls_back_to_full_mapping() {
        let model = loaded_model("name,age\nA,30\n");
        let wire = model.to_wire_config().unwrap();
        assert_eq!(wire.typecaster.schema.len(), 2);
        assert!(wire.typecaster.schema.values().all(CastType::is_noop));
    }

    #[test]
    fn test_typecaster_drops_casts_for_unknown_columns() {
        let mut model = loaded_model("name,age\nA,30\n");
        model.set_step_config(TypeCasterPatch::default().cast("age", CastType::Int));

        let narrowed = vec!["name".to_string()];
        let wire = serialize(&model, &narrowed).unwrap();
        assert_eq!(wire.typecaster.schema.len(), 1);
        assert_eq!(wire.typecaster.schema["name"], CastType::Str);

        model.set_step_config(TypeCasterPatch::default().cast("ghost", CastType::Int));
        let value = serde_json::to_value(model.to_wire_config().unwrap()).unwrap();
        assert_eq!(value["typecaster"], json!({ "schema": { "age": "int" } }));
    }

    #[test]
    fn test_ordinal_mapping_rank_object() {
        let mut model = loaded_model("size\nlow\n");
        model.set_step_config(
            EncoderPatch::default()
                .strategy(EncoderStrategy::Ordinal)
                .ordinal_mapping(r#"{"size": {"low": 0, "medium": 1, "high": 2}}"#),
        );

        let wire = model.to_wire_config().unwrap();
        let levels = wire.encoder.ordinal_levels.unwrap();
        assert_eq!(levels["size"]["high"], 2);
    }

    #[test]
    fn test_ordinal_mapping_list_is_normalized_to_ranks() {
        let levels = parse_ordinal_mapping(r#"{"size": ["low", "medium", "high"]}"#).unwrap();
        assert_eq!(levels["size"]["low"], 0);
        assert_eq!(levels["size"]["medium"], 1);
        assert_eq!(levels["size"]["high"], 2);
    }

    #[test]
    fn test_ordinal_mapping_invalid_inputs() {
        let invalid = [
            "",
            "not json",
            "[\"low\", \"high\"]",
            "{}",
            r#"{"size": "low"}"#,
            r#"{"size": {"low": "zero"}}"#,
            r#"{"size": []}"#,
            r#"{"size": ["low", "low"]}"#,
        ];

        for text in invalid {
            let result = parse_ordinal_mapping(text);
            assert!(
                matches!(result, Err(PipelineError::InvalidConfig(_))),
                "expected InvalidConfig for {:?}",
                text
            );
        }
    }

    #[test]
    fn test_ordinal_strategy_with_bad_mapping_fails_serialization() {
        let mut model = loaded_model("size\nlow\n");
        model.set_step_config(
            EncoderPatch::default()
                .strategy(EncoderStrategy::Ordinal)
                .ordinal_mapping("{ size: low }"),
        );
        assert!(matches!(
            model.to_wire_config(),
            Err(PipelineError::InvalidConfig(_))
        ));

        // Mapping is ignored entirely for other strategies.
        model.set_step_config(EncoderPatch::default().strategy(EncoderStrategy::Label));
        let wire = model.to_wire_config().unwrap();
        assert!(wire.encoder.ordinal_levels.is_none());
    }

    #[test]
    fn test_serialize_uses_given_headers() {
        let mut model = loaded_model("a,b\n1,2\n");
        model.set_step_config(ScalerPatch::default().strategy(ScalerStrategy::Robust));

        let wider: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let wire = serialize(&model, &wider).unwrap();
        assert_eq!(
            wire.scaler.columns,
            ColumnTarget::Columns(vec!["a".into(), "b".into()])
        );
        assert_eq!(wire.scaler.strategy, ScalerStrategy::Robust);
    }

    #[test]
    fn test_wire_config_json_roundtrip_preserves_sentinel() {
        let mut model = loaded_model("a,b\n1,2\n");
        model.toggle_column(Cleaner, "a");
        let wire = model.to_wire_config().unwrap();

        let parsed: WireConfig = serde_json::from_str(&wire.to_json().unwrap()).unwrap();
        assert_eq!(parsed, wire);
        assert!(parsed.scaler.columns.is_all());
        assert_eq!(parsed.cleaner.columns, ColumnTarget::Columns(vec!["b".into()]));
    }
}
