//! Step kinds and their typed configurations.
//!
//! Each step kind has its own configuration struct. Partial updates are
//! expressed as patches ([`StepPatch`]) so callers only name the fields they
//! change, and [`StepConfig`] gives a tagged view over any one step.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// The declared transformation steps of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    /// Missing-value imputation and duplicate removal.
    Cleaner,
    /// Per-column type casting.
    TypeCaster,
    /// Categorical feature encoding.
    Encoder,
    /// Numeric feature scaling.
    Scaler,
}

impl StepKind {
    /// Every declared kind, in default execution order.
    pub const ALL: [StepKind; 4] = [
        StepKind::Cleaner,
        StepKind::TypeCaster,
        StepKind::Encoder,
        StepKind::Scaler,
    ];

    /// Name used in the wire config.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cleaner => "cleaner",
            Self::TypeCaster => "typecaster",
            Self::Encoder => "encoder",
            Self::Scaler => "scaler",
        }
    }

    /// Returns a human-readable name for the step.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Cleaner => "Cleaner (Missing Values)",
            Self::TypeCaster => "TypeCaster (Column Types)",
            Self::Encoder => "Encoder (Categorical Features)",
            Self::Scaler => "Scaler (Numeric Features)",
        }
    }

    /// Parse a wire name (`"cleaner"`, `"typecaster"`, ...).
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strategy for imputing missing values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CleanerStrategy {
    /// Use the mean of non-null values
    #[default]
    Mean,
    /// Use the median of non-null values
    Median,
    /// Use the most frequent value
    Mode,
    /// Use a user-provided fill value
    Constant,
}

/// Target type for a cast column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CastType {
    Int,
    Float,
    Bool,
    /// Leave the column as text. This is the no-op default.
    #[default]
    Str,
}

impl CastType {
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::Str)
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "int" => Some(Self::Int),
            "float" => Some(Self::Float),
            "bool" => Some(Self::Bool),
            "str" | "string" => Some(Self::Str),
            _ => None,
        }
    }
}

/// Strategy for encoding categorical features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EncoderStrategy {
    /// One binary column per category
    #[default]
    OneHot,
    /// Integer label per category
    Label,
    /// User-defined category ranks
    Ordinal,
}

/// Strategy for scaling numeric features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScalerStrategy {
    /// Zero mean, unit variance
    #[default]
    Standard,
    /// Rescale into [0, 1]
    MinMax,
    /// Median and IQR based scaling
    Robust,
}

/// Set of columns a step applies to.
///
/// Membership is all that is stored; output order always follows the
/// dataset headers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnSelection {
    columns: BTreeSet<String>,
}

impl ColumnSelection {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains(column)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// True when every header is selected.
    pub fn covers(&self, headers: &[String]) -> bool {
        headers.iter().all(|h| self.columns.contains(h))
    }

    /// Selected columns, in header order.
    pub fn ordered(&self, headers: &[String]) -> Vec<String> {
        let mut seen = BTreeSet::new();
        headers
            .iter()
            .filter(|h| self.columns.contains(h.as_str()) && seen.insert(h.as_str()))
            .cloned()
            .collect()
    }

    /// Flip membership of one column. Returns whether it is now selected.
    pub fn toggle(&mut self, column: &str) -> bool {
        if self.columns.remove(column) {
            false
        } else {
            self.columns.insert(column.to_string());
            true
        }
    }

    pub(crate) fn select_all(&mut self, headers: &[String]) {
        self.columns = headers.iter().cloned().collect();
    }

    pub(crate) fn clear(&mut self) {
        self.columns.clear();
    }

    /// Drop selected columns that are not in `headers`.
    pub(crate) fn retain(&mut self, headers: &[String]) {
        self.columns.retain(|c| headers.contains(c));
    }
}

/// Cleaner configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CleanerConfig {
    pub strategy: CleanerStrategy,
    /// Required when `strategy` is [`CleanerStrategy::Constant`].
    pub fill_value: Option<String>,
    /// Drop duplicate rows before imputing. Applies to the whole table.
    pub remove_duplicate_rows: bool,
    pub columns: ColumnSelection,
}

/// TypeCaster configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TypeCasterConfig {
    /// Target type per column. Columns absent here are left as text.
    pub column_types: BTreeMap<String, CastType>,
}

/// Encoder configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EncoderConfig {
    pub strategy: EncoderStrategy,
    /// JSON text of the ordinal mapping, as entered by the user.
    /// Required when `strategy` is [`EncoderStrategy::Ordinal`].
    pub ordinal_mapping: Option<String>,
    pub columns: ColumnSelection,
}

/// Scaler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScalerConfig {
    pub strategy: ScalerStrategy,
    pub columns: ColumnSelection,
}

/// Borrowed, tagged view over one step's configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepConfig<'a> {
    Cleaner(&'a CleanerConfig),
    TypeCaster(&'a TypeCasterConfig),
    Encoder(&'a EncoderConfig),
    Scaler(&'a ScalerConfig),
}

impl StepConfig<'_> {
    pub fn kind(&self) -> StepKind {
        match self {
            Self::Cleaner(_) => StepKind::Cleaner,
            Self::TypeCaster(_) => StepKind::TypeCaster,
            Self::Encoder(_) => StepKind::Encoder,
            Self::Scaler(_) => StepKind::Scaler,
        }
    }

    /// One-line summary for logs and the CLI.
    pub fn summary(&self) -> String {
        match self {
            Self::Cleaner(c) => format!(
                "{:?}{}{}",
                c.strategy,
                c.fill_value
                    .as_deref()
                    .map(|v| format!(" (fill '{}')", v))
                    .unwrap_or_default(),
                if c.remove_duplicate_rows {
                    ", remove duplicates"
                } else {
                    ""
                }
            ),
            Self::TypeCaster(t) => {
                let casts = t.column_types.values().filter(|c| !c.is_noop()).count();
                format!("{} column casts", casts)
            }
            Self::Encoder(e) => format!("{:?}", e.strategy),
            Self::Scaler(s) => format!("{:?}", s.strategy),
        }
    }
}

/// Partial update for the cleaner step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanerPatch {
    pub strategy: Option<CleanerStrategy>,
    /// `Some(None)` clears the fill value.
    pub fill_value: Option<Option<String>>,
    pub remove_duplicate_rows: Option<bool>,
    pub columns: Option<ColumnSelection>,
}

impl CleanerPatch {
    pub fn strategy(mut self, strategy: CleanerStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn fill_value(mut self, value: impl Into<String>) -> Self {
        self.fill_value = Some(Some(value.into()));
        self
    }

    pub fn clear_fill_value(mut self) -> Self {
        self.fill_value = Some(None);
        self
    }

    pub fn remove_duplicate_rows(mut self, remove: bool) -> Self {
        self.remove_duplicate_rows = Some(remove);
        self
    }

    pub fn columns(mut self, columns: ColumnSelection) -> Self {
        self.columns = Some(columns);
        self
    }

    pub(crate) fn apply(self, config: &mut CleanerConfig) {
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        if let Some(fill_value) = self.fill_value {
            config.fill_value = fill_value;
        }
        if let Some(remove) = self.remove_duplicate_rows {
            config.remove_duplicate_rows = remove;
        }
        if let Some(columns) = self.columns {
            config.columns = columns;
        }
    }
}

/// Partial update for the type caster step. Entries are merged per column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeCasterPatch {
    pub column_types: BTreeMap<String, CastType>,
}

impl TypeCasterPatch {
    pub fn cast(mut self, column: impl Into<String>, cast: CastType) -> Self {
        self.column_types.insert(column.into(), cast);
        self
    }

    pub(crate) fn apply(self, config: &mut TypeCasterConfig) {
        config.column_types.extend(self.column_types);
    }
}

/// Partial update for the encoder step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncoderPatch {
    pub strategy: Option<EncoderStrategy>,
    pub ordinal_mapping: Option<Option<String>>,
    pub columns: Option<ColumnSelection>,
}

impl EncoderPatch {
    pub fn strategy(mut self, strategy: EncoderStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn ordinal_mapping(mut self, mapping: impl Into<String>) -> Self {
        self.ordinal_mapping = Some(Some(mapping.into()));
        self
    }

    pub fn columns(mut self, columns: ColumnSelection) -> Self {
        self.columns = Some(columns);
        self
    }

    pub(crate) fn apply(self, config: &mut EncoderConfig) {
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        if let Some(mapping) = self.ordinal_mapping {
            config.ordinal_mapping = mapping;
        }
        if let Some(columns) = self.columns {
            config.columns = columns;
        }
    }
}

/// Partial update for the scaler step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScalerPatch {
    pub strategy: Option<ScalerStrategy>,
    pub columns: Option<ColumnSelection>,
}

impl ScalerPatch {
    pub fn strategy(mut self, strategy: ScalerStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn columns(mut self, columns: ColumnSelection) -> Self {
        self.columns = Some(columns);
        self
    }

    pub(crate) fn apply(self, config: &mut ScalerConfig) {
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        if let Some(columns) = self.columns {
            config.columns = columns;
        }
    }
}

/// A partial update addressed to exactly one step kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepPatch {
    Cleaner(CleanerPatch),
    TypeCaster(TypeCasterPatch),
    Encoder(EncoderPatch),
    Scaler(ScalerPatch),
}

impl StepPatch {
    pub fn kind(&self) -> StepKind {
        match self {
            Self::Cleaner(_) => StepKind::Cleaner,
            Self::TypeCaster(_) => StepKind::TypeCaster,
            Self::Encoder(_) => StepKind::Encoder,
            Self::Scaler(_) => StepKind::Scaler,
        }
    }

    /// Drop selected columns and casts that are not in `headers`.
    pub(crate) fn retain_headers(&mut self, headers: &[String]) {
        let columns = match self {
            Self::Cleaner(p) => p.columns.as_mut(),
            Self::Encoder(p) => p.columns.as_mut(),
            Self::Scaler(p) => p.columns.as_mut(),
            Self::TypeCaster(p) => {
                p.column_types.retain(|column, _| headers.contains(column));
                None
            }
        };
        if let Some(columns) = columns {
            columns.retain(headers);
        }
    }
}

impl From<CleanerPatch> for StepPatch {
    fn from(patch: CleanerPatch) -> Self {
        Self::Cleaner(patch)
    }
}

impl From<TypeCasterPatch> for StepPatch {
    fn from(patch: TypeCasterPatch) -> Self {
        Self::TypeCaster(patch)
    }
}

impl From<EncoderPatch> for StepPatch {
    fn from(patch: EncoderPatch) -> Self {
        Self::Encoder(patch)
    }
}

impl From<ScalerPatch> for StepPatch {
    fn from(patch: ScalerPatch) -> Self {
        Self::Scaler(patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_step_kind_json_values() {
        let expectations = [
            (StepKind::Cleaner, "\"cleaner\""),
            (StepKind::TypeCaster, "\"typecaster\""),
            (StepKind::Encoder, "\"encoder\""),
            (StepKind::Scaler, "\"scaler\""),
        ];

        for (kind, expected) in expectations {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, expected);
            assert_eq!(format!("\"{}\"", kind.as_str()), expected);
        }
    }

    #[test]
    fn test_step_kind_parse() {
        assert_eq!(StepKind::parse("Encoder"), Some(StepKind::Encoder));
        assert_eq!(StepKind::parse(" typecaster "), Some(StepKind::TypeCaster));
        assert_eq!(StepKind::parse("loader"), None);
    }

    #[test]
    fn test_strategy_wire_names() {
        assert_eq!(serde_json::to_string(&EncoderStrategy::OneHot).unwrap(), "\"onehot\"");
        assert_eq!(serde_json::to_string(&ScalerStrategy::MinMax).unwrap(), "\"minmax\"");
        assert_eq!(serde_json::to_string(&CleanerStrategy::Constant).unwrap(), "\"constant\"");
        assert_eq!(serde_json::to_string(&CastType::Str).unwrap(), "\"str\"");
    }

    #[test]
    fn test_cast_type_parse() {
        assert_eq!(CastType::parse("INT"), Some(CastType::Int));
        assert_eq!(CastType::parse("string"), Some(CastType::Str));
        assert_eq!(CastType::parse("decimal"), None);
        assert!(CastType::default().is_noop());
    }

    #[test]
    fn test_column_selection_order_follows_headers() {
        let h = headers(&["c", "a", "b"]);
        let selection = ColumnSelection::new(["b", "c"]);
        assert_eq!(selection.ordered(&h), vec!["c", "b"]);
        assert!(!selection.covers(&h));
        assert!(ColumnSelection::new(["a", "b", "c"]).covers(&h));
    }

    #[test]
    fn test_column_selection_toggle_and_retain() {
        let mut selection = ColumnSelection::new(["a", "b"]);
        assert!(!selection.toggle("a"));
        assert!(selection.toggle("z"));
        selection.retain(&headers(&["b", "c"]));
        assert_eq!(selection, ColumnSelection::new(["b"]));
    }

    #[test]
    fn test_cleaner_patch_merges_only_named_fields() {
        let mut config = CleanerConfig {
            remove_duplicate_rows: true,
            ..Default::default()
        };

        CleanerPatch::default()
            .strategy(CleanerStrategy::Constant)
            .fill_value("0")
            .apply(&mut config);

        assert_eq!(config.strategy, CleanerStrategy::Constant);
        assert_eq!(config.fill_value.as_deref(), Some("0"));
        assert!(config.remove_duplicate_rows);

        CleanerPatch::default().clear_fill_value().apply(&mut config);
        assert!(config.fill_value.is_none());
    }

    #[test]
    fn test_type_caster_patch_merges_per_column() {
        let mut config = TypeCasterConfig::default();
        config.column_types.insert("age".to_string(), CastType::Str);
        config.column_types.insert("name".to_string(), CastType::Str);

        TypeCasterPatch::default()
            .cast("age", CastType::Int)
            .apply(&mut config);

        assert_eq!(config.column_types["age"], CastType::Int);
        assert_eq!(config.column_types["name"], CastType::Str);
    }

    #[test]
    fn test_patch_kind() {
        assert_eq!(StepPatch::from(ScalerPatch::default()).kind(), StepKind::Scaler);
        assert_eq!(StepPatch::from(EncoderPatch::default()).kind(), StepKind::Encoder);
    }
}
