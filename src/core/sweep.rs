//! Parameter sweeps - the Cartesian product of configuration variants
//!
//! A sweep file names the configuration fields to vary and their values:
//!
//! ```yaml
//! iterations: 50
//! seed: 7
//! base:
//!   cell_count: 20
//! axes:
//!   - field: pitch_y2
//!     values: [23.0, 23.5, 24.0]
//!   - field: end_limit_offsets.upper_x
//!     range: { from: 0.0, to: 2.0, steps: 5 }
//! ```
//!
//! Every combination is applied to the base configuration and validated
//! before the first trial starts.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::config::ModelConfig;
use crate::core::error::ModelError;
use crate::core::monte_carlo::TrialSpec;

fn default_iterations() -> usize {
    1
}

/// Evenly spaced values, ends included
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinearRange {
    pub from: f64,
    pub to: f64,
    pub steps: usize,
}

impl LinearRange {
    /// Sorted, de-duplicated points; integral points become integers so
    /// they also fit count fields
    pub fn expand(&self) -> Vec<Value> {
        let mut points: Vec<f64> = match self.steps {
            0 => Vec::new(),
            1 => vec![self.from],
            n => (0..n)
                .map(|i| self.from + (self.to - self.from) * i as f64 / (n - 1) as f64)
                .collect(),
        };
        points.sort_by(f64::total_cmp);
        points.dedup();
        points.into_iter().map(number_value).collect()
    }
}

fn number_value(v: f64) -> Value {
    if v.fract() == 0.0 && v.abs() < 9.0e15 {
        Value::from(v as i64)
    } else {
        Value::from(v)
    }
}

/// One swept field and its values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweepAxis {
    /// Dotted path into the configuration, e.g. `physics.time_step`
    pub field: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<LinearRange>,
}

impl SweepAxis {
    pub fn resolve(&self) -> Result<Vec<Value>, ModelError> {
        let invalid = |message: &str| ModelError::InvalidSweepValue {
            field: self.field.clone(),
            message: message.to_string(),
        };
        let values = match (&self.values, &self.range) {
            (Some(values), None) => values.clone(),
            (None, Some(range)) => range.expand(),
            _ => return Err(invalid("axis needs exactly one of `values` or `range`")),
        };
        if values.is_empty() {
            return Err(invalid("axis has no values"));
        }
        Ok(values)
    }
}

/// One point of the sweep grid
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Variant {
    pub fields: Vec<(String, Value)>,
}

impl Variant {
    /// Apply the swept values on top of `base`
    pub fn apply(&self, base: &ModelConfig) -> Result<ModelConfig, ModelError> {
        let mut config = base.clone();
        for (field, value) in &self.fields {
            let mut tree = serde_json::to_value(&config).map_err(|e| ModelError::InvalidSweepValue {
                field: field.clone(),
                message: e.to_string(),
            })?;
            set_path(&mut tree, field, value.clone())?;
            config = serde_json::from_value(tree).map_err(|e| ModelError::InvalidSweepValue {
                field: field.clone(),
                message: e.to_string(),
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Values as written to a result record
    pub fn display_values(&self) -> Vec<String> {
        self.fields.iter().map(|(_, v)| display_value(v)).collect()
    }
}

pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn set_path(root: &mut Value, path: &str, value: Value) -> Result<(), ModelError> {
    let unknown = || ModelError::UnknownSweepField(path.to_string());
    let (parents, leaf) = match path.rsplit_once('.') {
        Some((parents, leaf)) => (Some(parents), leaf),
        None => (None, path),
    };

    let mut node = root;
    if let Some(parents) = parents {
        for part in parents.split('.') {
            node = node.get_mut(part).ok_or_else(unknown)?;
        }
    }
    let slot = node
        .as_object_mut()
        .and_then(|object| object.get_mut(leaf))
        .ok_or_else(unknown)?;
    *slot = value;
    Ok(())
}

/// A parsed sweep file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweepPlan {
    /// Repetitions of every variant
    #[serde(default = "default_iterations")]
    pub iterations: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Configuration the axes are applied to
    #[serde(default)]
    pub base: ModelConfig,

    #[serde(default)]
    pub axes: Vec<SweepAxis>,
}

impl SweepPlan {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ModelError> {
        let plan: SweepPlan = serde_yml::from_str(content)?;
        if plan.iterations == 0 {
            return Err(ModelError::InvalidConfig(
                "sweep iterations must be at least 1".to_string(),
            ));
        }
        Ok(plan)
    }

    pub fn swept_fields(&self) -> Vec<String> {
        self.axes.iter().map(|a| a.field.clone()).collect()
    }

    /// Cartesian product of the axes, last axis varying fastest
    pub fn variants(&self) -> Result<Vec<Variant>, ModelError> {
        let mut variants = vec![Variant::default()];
        for axis in &self.axes {
            let values = axis.resolve()?;
            variants = variants
                .into_iter()
                .flat_map(|variant| {
                    values.iter().map(move |value| {
                        let mut fields = variant.fields.clone();
                        fields.push((axis.field.clone(), value.clone()));
                        Variant { fields }
                    })
                })
                .collect();
        }
        Ok(variants)
    }

    /// Every trial of the sweep: each variant applied to `base` and repeated
    /// `iterations` times, seeded `seed + index`
    pub fn trials(&self, base: &ModelConfig, seed: u64) -> Result<Vec<TrialSpec>, ModelError> {
        let mut trials = Vec::new();
        for variant in self.variants()? {
            let config = Arc::new(variant.apply(base)?);
            let variant = Arc::new(variant);
            for _ in 0..self.iterations {
                let index = trials.len();
                trials.push(TrialSpec {
                    index,
                    seed: seed.wrapping_add(index as u64),
                    config: Arc::clone(&config),
                    variant: Arc::clone(&variant),
                });
            }
        }
        Ok(trials)
    }
}
