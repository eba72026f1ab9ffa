use crate::error::Result;
use crate::membership::MembershipFunction;
use crate::schema_error;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Defuzzification grid sentinel: request auto-computation from MF supports.
pub const GRID_SENTINEL: (f64, f64, usize) = (0.0, 1.0, 101);

/// Crisp-input linguistic variable with an ordered label -> MF mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputVariable {
    pub name: String,
    pub vmin: f64,
    pub vmax: f64,
    pub terms: IndexMap<String, MembershipFunction>,
}

impl InputVariable {
    pub fn new(name: impl Into<String>, vmin: f64, vmax: f64) -> Result<Self> {
        let name = name.into();
        if !(vmin < vmax) {
            return Err(schema_error!("variable '{}': vmin < vmax required", name));
        }
        Ok(Self { name, vmin, vmax, terms: IndexMap::new() })
    }

    pub fn add_term(&mut self, label: impl Into<String>, mf: MembershipFunction) -> Result<()> {
        let label = label.into();
        if self.terms.contains_key(&label) {
            return Err(schema_error!(
                "variable '{}': duplicate term label '{}'",
                self.name,
                label
            ));
        }
        self.terms.insert(label, mf);
        Ok(())
    }

    pub fn clamp(&self, x: f64) -> f64 {
        x.clamp(self.vmin, self.vmax)
    }
}

/// Output variable; adds the defuzzification grid (ymin, ymax, n).
///
/// The grid defaults to the sentinel, which asks the engine to derive the
/// range from the union of term supports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputVariable {
    pub name: String,
    pub vmin: f64,
    pub vmax: f64,
    pub terms: IndexMap<String, MembershipFunction>,
    pub grid: (f64, f64, usize),
}

impl OutputVariable {
    pub fn new(name: impl Into<String>, vmin: f64, vmax: f64) -> Result<Self> {
        let name = name.into();
        if !(vmin < vmax) {
            return Err(schema_error!("variable '{}': vmin < vmax required", name));
        }
        Ok(Self { name, vmin, vmax, terms: IndexMap::new(), grid: GRID_SENTINEL })
    }

    pub fn add_term(&mut self, label: impl Into<String>, mf: MembershipFunction) -> Result<()> {
        let label = label.into();
        if self.terms.contains_key(&label) {
            return Err(schema_error!(
                "variable '{}': duplicate term label '{}'",
                self.name,
                label
            ));
        }
        self.terms.insert(label, mf);
        Ok(())
    }
}
