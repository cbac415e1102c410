use std::collections::HashMap;

use serde::Serialize;
use tracing::warn;

use crate::models::{Category, WeightRow};

#[derive(Debug, Clone, Default)]
struct CategoryWeights {
    default: Option<f64>,
    labels: HashMap<String, f64>,
}

/// Point values keyed by category, then outcome label.
///
/// Lookups never fail: an unknown label falls back to the category default,
/// an unknown category to the global floor.
#[derive(Debug, Clone)]
pub struct WeightTable {
    categories: HashMap<Category, CategoryWeights>,
    floor: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WeightSummary {
    pub categories: usize,
    pub labeled_pairs: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub floor: f64,
}

/// Historical average handle time for one (category, label) pair.
#[derive(Debug, Clone)]
pub struct HandleTimeRow {
    pub category: Category,
    pub outcome_label: String,
    pub avg_handle_seconds: f64,
}

fn label_key(label: &str) -> String {
    label.trim().to_lowercase()
}

fn usable(weight: f64) -> bool {
    weight.is_finite() && weight >= 0.0
}

impl WeightTable {
    pub fn new(floor: f64) -> Self {
        Self {
            categories: HashMap::new(),
            floor: if usable(floor) { floor } else { 0.0 },
        }
    }

    pub fn from_rows(rows: &[WeightRow], floor: f64) -> Self {
        let mut table = Self::new(floor);
        table.apply_rows(rows);
        table
    }

    /// Layers stored rows over whatever the table already holds.
    pub fn apply_rows(&mut self, rows: &[WeightRow]) {
        for row in rows {
            match &row.outcome_label {
                Some(label) => self.insert_pair(&row.category, label, row.weight),
                None => self.insert_category_default(&row.category, row.weight),
            }
        }
    }

    /// Derives pair weights from average handle time: one point per
    /// `seconds_per_point` of handling.
    pub fn from_handle_times(rows: &[HandleTimeRow], seconds_per_point: f64, floor: f64) -> Self {
        let mut table = Self::new(floor);
        if !(seconds_per_point.is_finite() && seconds_per_point > 0.0) {
            warn!(seconds_per_point, "ignoring handle times with unusable scale");
            return table;
        }
        for row in rows {
            table.insert_pair(
                &row.category,
                &row.outcome_label,
                row.avg_handle_seconds / seconds_per_point,
            );
        }
        table
    }

    pub fn insert_pair(&mut self, category: &Category, label: &str, weight: f64) {
        if !usable(weight) {
            warn!(%category, label, weight, "ignoring unusable weight");
            return;
        }
        self.categories
            .entry(category.clone())
            .or_default()
            .labels
            .insert(label_key(label), weight);
    }

    pub fn insert_category_default(&mut self, category: &Category, weight: f64) {
        if !usable(weight) {
            warn!(%category, weight, "ignoring unusable category weight");
            return;
        }
        self.categories.entry(category.clone()).or_default().default = Some(weight);
    }

    pub fn weight_of(&self, category: &Category, label: Option<&str>) -> f64 {
        let Some(weights) = self.categories.get(category) else {
            return self.floor;
        };
        label
            .and_then(|label| weights.labels.get(&label_key(label)).copied())
            .or(weights.default)
            .unwrap_or(self.floor)
    }

    pub fn summary(&self) -> WeightSummary {
        let values: Vec<f64> = self
            .categories
            .values()
            .flat_map(|weights| weights.labels.values().copied().chain(weights.default))
            .collect();
        let labeled_pairs = self.categories.values().map(|w| w.labels.len()).sum();
        let mean = if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        };

        WeightSummary {
            categories: self.categories.len(),
            labeled_pairs,
            min: values.iter().copied().reduce(f64::min),
            max: values.iter().copied().reduce(f64::max),
            mean,
            floor: self.floor,
        }
    }
}
