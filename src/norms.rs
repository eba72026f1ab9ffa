//! T-norm and S-norm families over sequences of membership grades.
//!
//! Both families are fixed enumerations resolved from names once, at
//! knowledge-base construction; the inference loop only ever sees the
//! discriminant. The registries map every accepted spelling (including the
//! `prob`/`sum` and `bsum`/`lukasiewicz` aliases) to its discriminant.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Generalized fuzzy conjunction. Neutral on an empty sequence is 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TNorm {
    Min,
    Prod,
    Lukasiewicz,
    Hamacher,
}

/// Generalized fuzzy disjunction. Neutral on an empty sequence is 0.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SNorm {
    Max,
    Prob,
    BoundedSum,
    Hamacher,
}

pub static TNORMS: Lazy<HashMap<&'static str, TNorm>> = Lazy::new(|| {
    HashMap::from([
        ("min", TNorm::Min),
        ("prod", TNorm::Prod),
        ("lukasiewicz", TNorm::Lukasiewicz),
        ("hamacher", TNorm::Hamacher),
    ])
});

pub static SNORMS: Lazy<HashMap<&'static str, SNorm>> = Lazy::new(|| {
    HashMap::from([
        ("max", SNorm::Max),
        ("prob", SNorm::Prob),
        ("sum", SNorm::Prob),
        ("bsum", SNorm::BoundedSum),
        ("lukasiewicz", SNorm::BoundedSum),
        ("hamacher", SNorm::Hamacher),
    ])
});

impl TNorm {
    pub fn from_name(name: &str) -> Option<Self> {
        TNORMS.get(name.to_lowercase().as_str()).copied()
    }

    /// Runtime lookup: unknown names fall back to `min` with a warning.
    pub fn resolve(name: &str) -> Self {
        Self::from_name(name).unwrap_or_else(|| {
            log::warn!("unknown tnorm '{}', falling back to 'min'", name);
            TNorm::Min
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            TNorm::Min => "min",
            TNorm::Prod => "prod",
            TNorm::Lukasiewicz => "lukasiewicz",
            TNorm::Hamacher => "hamacher",
        }
    }

    pub fn apply(&self, values: &[f64]) -> f64 {
        if values.is_empty() {
            return 1.0;
        }
        match self {
            TNorm::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            TNorm::Prod => values.iter().product(),
            TNorm::Lukasiewicz => {
                let sum: f64 = values.iter().sum();
                (sum - (values.len() as f64 - 1.0)).max(0.0)
            }
            TNorm::Hamacher => {
                let mut acc = values[0];
                for &v in &values[1..] {
                    acc = hamacher_t_pair(acc, v);
                }
                acc
            }
        }
    }
}

impl SNorm {
    pub fn from_name(name: &str) -> Option<Self> {
        SNORMS.get(name.to_lowercase().as_str()).copied()
    }

    /// Runtime lookup: unknown names fall back to `max` with a warning.
    pub fn resolve(name: &str) -> Self {
        Self::from_name(name).unwrap_or_else(|| {
            log::warn!("unknown snorm '{}', falling back to 'max'", name);
            SNorm::Max
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            SNorm::Max => "max",
            SNorm::Prob => "prob",
            SNorm::BoundedSum => "bsum",
            SNorm::Hamacher => "hamacher",
        }
    }

    /// Pairwise disjunction; aggregation is the left fold of this operator.
    pub fn pair(&self, a: f64, b: f64) -> f64 {
        match self {
            SNorm::Max => a.max(b),
            SNorm::Prob => a + b - a * b,
            SNorm::BoundedSum => (a + b).min(1.0),
            SNorm::Hamacher => {
                if a == 1.0 && b == 1.0 {
                    return 1.0;
                }
                let denom = 1.0 - a * b;
                if denom == 0.0 {
                    1.0
                } else {
                    (a + b - 2.0 * a * b) / denom
                }
            }
        }
    }

    pub fn apply(&self, values: &[f64]) -> f64 {
        values.iter().fold(0.0, |acc, &v| self.pair(acc, v))
    }
}

fn hamacher_t_pair(a: f64, b: f64) -> f64 {
    let denom = a + b - a * b;
    if denom == 0.0 {
        // only reachable with a = b = 0
        0.0
    } else {
        (a * b) / denom
    }
}
