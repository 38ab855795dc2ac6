//! The editable pipeline: per-step configuration plus execution order.
//!
//! The order is kept apart from the step configurations, so reordering never
//! touches configuration content and configuration edits never touch order.

use super::steps::{
    CastType, CleanerConfig, ColumnSelection, EncoderConfig, ScalerConfig, StepConfig, StepKind,
    StepPatch, TypeCasterConfig,
};
use crate::error::Result;
use crate::pipeline::wire::{self, WireConfig};
use crate::preview::DatasetPreview;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Execution order of the declared step kinds.
///
/// Always a permutation of [`StepKind::ALL`]; the only mutation is
/// [`move_step`].
pub type StepOrder = [StepKind; 4];

/// Default execution order.
pub const DEFAULT_ORDER: StepOrder = StepKind::ALL;

/// Move `moved` to the position `target` currently occupies.
///
/// `moved` is removed first and reinserted at `target`'s original index, so
/// moving down places it after `target` and moving up places it before.
/// Returns `order` unchanged when `moved == target` or either kind is
/// missing from it.
pub fn move_step(order: &[StepKind], moved: StepKind, target: StepKind) -> Vec<StepKind> {
    let from = order.iter().position(|k| *k == moved);
    let to = order.iter().position(|k| *k == target);

    match (from, to) {
        (Some(from), Some(to)) if from != to => {
            let mut next = order.to_vec();
            let kind = next.remove(from);
            next.insert(to, kind);
            next
        }
        _ => order.to_vec(),
    }
}

/// Pipeline configuration being edited for the current dataset.
///
/// # Example
///
/// ```rust,ignore
/// use tabular_pipeline::{DatasetPreview, PipelineModel, StepKind};
/// use tabular_pipeline::pipeline::{CleanerPatch, CleanerStrategy};
///
/// let preview = DatasetPreview::parse("name,age\nA,30\nB,\n")?;
/// let mut model = PipelineModel::new();
/// model.load_preview(&preview);
/// model.set_step_config(CleanerPatch::default().strategy(CleanerStrategy::Median));
/// model.move_step(StepKind::Scaler, StepKind::Cleaner);
///
/// let wire = model.to_wire_config()?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineModel {
    headers: Vec<String>,
    order: StepOrder,
    cleaner: CleanerConfig,
    typecaster: TypeCasterConfig,
    encoder: EncoderConfig,
    scaler: ScalerConfig,
}

impl Default for PipelineModel {
    fn default() -> Self {
        Self {
            headers: Vec::new(),
            order: DEFAULT_ORDER,
            cleaner: CleanerConfig::default(),
            typecaster: TypeCasterConfig::default(),
            encoder: EncoderConfig::default(),
            scaler: ScalerConfig::default(),
        }
    }
}

impl PipelineModel {
    /// Empty model with default step settings and default order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Headers of the currently loaded dataset.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn order(&self) -> &StepOrder {
        &self.order
    }

    pub fn cleaner(&self) -> &CleanerConfig {
        &self.cleaner
    }

    pub fn typecaster(&self) -> &TypeCasterConfig {
        &self.typecaster
    }

    pub fn encoder(&self) -> &EncoderConfig {
        &self.encoder
    }

    pub fn scaler(&self) -> &ScalerConfig {
        &self.scaler
    }

    /// Tagged view of one step's configuration.
    pub fn step(&self, kind: StepKind) -> StepConfig<'_> {
        match kind {
            StepKind::Cleaner => StepConfig::Cleaner(&self.cleaner),
            StepKind::TypeCaster => StepConfig::TypeCaster(&self.typecaster),
            StepKind::Encoder => StepConfig::Encoder(&self.encoder),
            StepKind::Scaler => StepConfig::Scaler(&self.scaler),
        }
    }

    /// Steps in execution order.
    pub fn steps(&self) -> impl Iterator<Item = StepConfig<'_>> + '_ {
        self.order.iter().map(|kind| self.step(*kind))
    }

    /// Adopt a freshly parsed dataset.
    ///
    /// Every column selection becomes the full header set, every column's
    /// cast type becomes [`CastType::Str`] and the order returns to
    /// [`DEFAULT_ORDER`]. Step strategies are kept.
    pub fn load_preview(&mut self, preview: &DatasetPreview) {
        self.headers = preview.headers.clone();
        self.order = DEFAULT_ORDER;
        for selection in self.selections_mut() {
            selection.select_all(&preview.headers);
        }
        self.typecaster.column_types = preview
            .headers
            .iter()
            .map(|h| (h.clone(), CastType::Str))
            .collect();

        debug!("Pipeline model loaded {} columns", self.headers.len());
    }

    /// Replace the header set without resetting selections.
    ///
    /// Selected columns and casts that no longer exist are pruned.
    pub fn retain_headers(&mut self, headers: Vec<String>) {
        for selection in self.selections_mut() {
            selection.retain(&headers);
        }
        self.typecaster
            .column_types
            .retain(|column, _| headers.contains(column));
        self.headers = headers;
    }

    /// Forget the dataset: no headers, empty selections and casts.
    pub fn clear_dataset(&mut self) {
        self.headers.clear();
        for selection in self.selections_mut() {
            selection.clear();
        }
        self.typecaster.column_types.clear();
    }

    /// Back to a fresh model: no dataset, default settings, default order.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Merge a partial update into one step's configuration.
    ///
    /// Selected columns and casts naming columns that are not current headers
    /// are dropped before merging.
    pub fn set_step_config(&mut self, patch: impl Into<StepPatch>) {
        let mut patch = patch.into();
        patch.retain_headers(&self.headers);
        debug!("Updating {} configuration", patch.kind());

        match patch {
            StepPatch::Cleaner(p) => p.apply(&mut self.cleaner),
            StepPatch::TypeCaster(p) => p.apply(&mut self.typecaster),
            StepPatch::Encoder(p) => p.apply(&mut self.encoder),
            StepPatch::Scaler(p) => p.apply(&mut self.scaler),
        }
    }

    /// Set one column's cast type. Returns `false`, changing nothing, when
    /// the column is not a current header.
    pub fn set_column_type(&mut self, column: impl Into<String>, cast: CastType) -> bool {
        let column = column.into();
        if !self.headers.contains(&column) {
            return false;
        }
        self.typecaster.column_types.insert(column, cast);
        true
    }

    /// Reorder: see [`move_step`]. Returns whether the order changed.
    pub fn move_step(&mut self, moved: StepKind, target: StepKind) -> bool {
        let next = move_step(&self.order, moved, target);
        let changed = next[..] != self.order[..];
        if let Ok(order) = <StepOrder>::try_from(next) {
            self.order = order;
        }
        if changed {
            debug!("Moved {} to position of {}: {:?}", moved, target, self.order);
        }
        changed
    }

    /// Select every column, or none if every column was already selected.
    ///
    /// No-op for [`StepKind::TypeCaster`], which has no column selection.
    pub fn toggle_all_columns(&mut self, kind: StepKind) {
        let headers = &self.headers;
        let selection = match kind {
            StepKind::Cleaner => &mut self.cleaner.columns,
            StepKind::Encoder => &mut self.encoder.columns,
            StepKind::Scaler => &mut self.scaler.columns,
            StepKind::TypeCaster => return,
        };

        if selection.covers(headers) && selection.len() == unique_count(headers) {
            selection.clear();
        } else {
            selection.select_all(headers);
        }
    }

    /// Flip one column in a step's selection.
    ///
    /// Columns that are not current headers are ignored. Returns whether the
    /// column is selected afterwards.
    pub fn toggle_column(&mut self, kind: StepKind, column: &str) -> bool {
        if !self.headers.iter().any(|h| h == column) {
            return false;
        }

        match self.selection_mut(kind) {
            Some(selection) => selection.toggle(column),
            None => false,
        }
    }

    /// Replace a step's selection, pruning names that are not current headers.
    pub fn set_columns(&mut self, kind: StepKind, mut columns: ColumnSelection) {
        columns.retain(&self.headers);
        if let Some(selection) = self.selection_mut(kind) {
            *selection = columns;
        }
    }

    /// Column selection of a step, if it has one.
    pub fn selection(&self, kind: StepKind) -> Option<&ColumnSelection> {
        match kind {
            StepKind::Cleaner => Some(&self.cleaner.columns),
            StepKind::Encoder => Some(&self.encoder.columns),
            StepKind::Scaler => Some(&self.scaler.columns),
            StepKind::TypeCaster => None,
        }
    }

    /// Serialize against the model's own headers.
    pub fn to_wire_config(&self) -> Result<WireConfig> {
        wire::serialize(self, &self.headers)
    }

    fn selection_mut(&mut self, kind: StepKind) -> Option<&mut ColumnSelection> {
        match kind {
            StepKind::Cleaner => Some(&mut self.cleaner.columns),
            StepKind::Encoder => Some(&mut self.encoder.columns),
            StepKind::Scaler => Some(&mut self.scaler.columns),
            StepKind::TypeCaster => None,
        }
    }

    fn selections_mut(&mut self) -> [&mut ColumnSelection; 3] {
        [
            &mut self.cleaner.columns,
            &mut self.encoder.columns,
            &mut self.scaler.columns,
        ]
    }
}

fn unique_count(headers: &[String]) -> usize {
    headers
        .iter()
        .collect::<std::collections::BTreeSet<_>>()
        .len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::steps::{CleanerPatch, CleanerStrategy, TypeCasterPatch};
    use pretty_assertions::assert_eq;

    use crate::pipeline::steps::StepKind::{Cleaner, Encoder, Scaler, TypeCaster};

    fn loaded_model() -> PipelineModel {
        let preview = DatasetPreview::parse("name,age,city\nA,30,X\n").unwrap();
        let mut model = PipelineModel::new();
        model.load_preview(&preview);
        model
    }

    fn is_permutation(order: &[StepKind]) -> bool {
        let mut sorted = order.to_vec();
        sorted.sort();
        sorted == StepKind::ALL.to_vec()
    }

    #[test]
    fn test_move_step_down_and_up() {
        let order = DEFAULT_ORDER;
        assert_eq!(
            move_step(&order, Cleaner, Encoder),
            vec![TypeCaster, Encoder, Cleaner, Scaler]
        );
        assert_eq!(
            move_step(&order, Scaler, TypeCaster),
            vec![Cleaner, Scaler, TypeCaster, Encoder]
        );
    }

    #[test]
    fn test_move_step_onto_itself_is_noop() {
        for kind in StepKind::ALL {
            assert_eq!(move_step(&DEFAULT_ORDER, kind, kind), DEFAULT_ORDER.to_vec());
        }
    }

    #[test]
    fn test_move_step_missing_kind_is_noop() {
        let partial = [Cleaner, Encoder];
        assert_eq!(move_step(&partial, Scaler, Cleaner), partial.to_vec());
        assert_eq!(move_step(&partial, Cleaner, TypeCaster), partial.to_vec());
    }

    #[test]
    fn test_move_step_always_yields_permutation() {
        for moved in StepKind::ALL {
            for target in StepKind::ALL {
                let next = move_step(&DEFAULT_ORDER, moved, target);
                assert!(is_permutation(&next), "{:?} -> {:?}: {:?}", moved, target, next);
            }
        }
    }

    #[test]
    fn test_move_step_is_deterministic() {
        let first = move_step(&DEFAULT_ORDER, Encoder, Cleaner);
        let second = move_step(&DEFAULT_ORDER, Encoder, Cleaner);
        assert_eq!(first, second);
        assert_eq!(first, vec![Encoder, Cleaner, TypeCaster, Scaler]);
    }

    #[test]
    fn test_model_move_step_reports_change() {
        let mut model = PipelineModel::new();
        assert!(!model.move_step(Scaler, Scaler));
        assert!(model.move_step(Scaler, Cleaner));
        assert_eq!(model.order(), &[Scaler, Cleaner, TypeCaster, Encoder]);
        assert!(is_permutation(model.order()));
    }

    #[test]
    fn test_load_preview_defaults_selections_and_casts() {
        let model = loaded_model();
        let headers = model.headers().to_vec();

        for kind in [Cleaner, Encoder, Scaler] {
            assert!(model.selection(kind).unwrap().covers(&headers));
        }
        assert_eq!(model.typecaster().column_types.len(), 3);
        assert!(model.typecaster().column_types.values().all(CastType::is_noop));
    }

    #[test]
    fn test_load_preview_restores_default_order() {
        let mut model = loaded_model();
        model.move_step(Scaler, Cleaner);
        model.set_step_config(CleanerPatch::default().strategy(CleanerStrategy::Mode));

        model.load_preview(&DatasetPreview::parse("x,y\n1,2\n").unwrap());
        assert_eq!(model.order(), &DEFAULT_ORDER);
        assert_eq!(model.cleaner().strategy, CleanerStrategy::Mode);
    }

    #[test]
    fn test_toggle_all_columns_is_strict_toggle() {
        let mut model = loaded_model();

        model.toggle_all_columns(Cleaner);
        assert!(model.cleaner().columns.is_empty());

        model.toggle_all_columns(Cleaner);
        assert_eq!(model.cleaner().columns.len(), 3);

        // Partial selection goes to full, not empty.
        model.toggle_column(Cleaner, "age");
        model.toggle_all_columns(Cleaner);
        assert_eq!(model.cleaner().columns.len(), 3);
    }

    #[test]
    fn test_toggle_all_columns_ignores_typecaster() {
        let mut model = loaded_model();
        let before = model.clone();
        model.toggle_all_columns(TypeCaster);
        assert_eq!(model, before);
    }

    #[test]
    fn test_toggle_column_ignores_unknown_columns() {
        let mut model = loaded_model();
        assert!(!model.toggle_column(Scaler, "salary"));
        assert!(!model.scaler().columns.contains("salary"));
        assert!(!model.toggle_column(Scaler, "age"));
        assert!(model.toggle_column(Scaler, "age"));
    }

    #[test]
    fn test_retain_headers_prunes_stale_columns() {
        let mut model = loaded_model();
        model.set_column_type("city", CastType::Bool);
        model.retain_headers(vec!["name".to_string(), "age".to_string()]);

        for kind in [Cleaner, Encoder, Scaler] {
            assert!(!model.selection(kind).unwrap().contains("city"));
        }
        assert!(!model.typecaster().column_types.contains_key("city"));
        assert_eq!(model.headers(), &["name".to_string(), "age".to_string()]);
    }

    #[test]
    fn test_set_columns_prunes_unknown_names() {
        let mut model = loaded_model();
        model.set_columns(Encoder, ColumnSelection::new(["city", "country"]));
        assert_eq!(model.encoder().columns, ColumnSelection::new(["city"]));
    }

    #[test]
    fn test_set_step_config_merges() {
        let mut model = loaded_model();
        model.set_step_config(CleanerPatch::default().strategy(CleanerStrategy::Mode));
        model.set_step_config(TypeCasterPatch::default().cast("age", CastType::Int));

        assert_eq!(model.cleaner().strategy, CleanerStrategy::Mode);
        assert_eq!(model.cleaner().columns.len(), 3);
        assert_eq!(model.typecaster().column_types["age"], CastType::Int);
        assert_eq!(model.typecaster().column_types["name"], CastType::Str);
    }

    #[test]
    fn test_set_step_config_prunes_unknown_columns() {
        let mut model = loaded_model();
        model.set_step_config(
            CleanerPatch::default().columns(ColumnSelection::new(["name", "age", "ghost"])),
        );
        model.set_step_config(
            TypeCasterPatch::default()
                .cast("ghost", CastType::Int)
                .cast("age", CastType::Float),
        );

        assert_eq!(model.cleaner().columns, ColumnSelection::new(["name", "age"]));
        assert!(!model.typecaster().column_types.contains_key("ghost"));
        assert_eq!(model.typecaster().column_types["age"], CastType::Float);
    }

    #[test]
    fn test_set_column_type_ignores_unknown_columns() {
        let mut model = loaded_model();
        assert!(!model.set_column_type("ghost", CastType::Int));
        assert!(model.set_column_type("age", CastType::Int));
        assert_eq!(model.typecaster().column_types.len(), 3);
        assert_eq!(model.typecaster().column_types["age"], CastType::Int);
    }

    #[test]
    fn test_reset_and_clear() {
        let mut model = loaded_model();
        model.move_step(Scaler, Cleaner);
        model.set_step_config(CleanerPatch::default().remove_duplicate_rows(true));

        model.clear_dataset();
        assert!(model.headers().is_empty());
        assert!(model.cleaner().columns.is_empty());
        assert!(model.cleaner().remove_duplicate_rows);
        assert_eq!(model.order()[0], Scaler);

        model.reset();
        assert_eq!(model, PipelineModel::new());
        assert_eq!(model.order(), &DEFAULT_ORDER);
    }

    #[test]
    fn test_steps_follow_order() {
        let mut model = PipelineModel::new();
        model.move_step(Encoder, Cleaner);
        let kinds: Vec<_> = model.steps().map(|s| s.kind()).collect();
        assert_eq!(kinds, vec![Encoder, Cleaner, TypeCaster, Scaler]);
    }
}
