//! Authored configuration for unit types and their abilities.
//!
//! All structs deserialize from RON. Decimal values are converted to
//! [`Fixed`](crate::math::Fixed) once, at load time, and every numeric
//! field is validated before a [`Catalog`] is handed out.
//!
//! **Note:** This module contains no IO - it only parses text the host
//! has already read.

mod ability_data;
mod unit_data;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

pub use ability_data::{AbilityCategory, AbilityData, AbilityKind, OverdriveTrigger};
pub use unit_data::{ResourcePoolData, UnitTypeData};

/// A validated set of unit types.
///
/// # Example RON
///
/// ```ron
/// Catalog(
///     unit_types: [
///         UnitTypeData(id: "rock", max_health: 200.0, attack: 8.0, move_speed: 2.0),
///     ],
/// )
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    /// Every unit type, in authored order.
    #[serde(default)]
    pub unit_types: Vec<UnitTypeData>,
}

impl Catalog {
    /// Build a catalog from already constructed unit types.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if validation fails.
    pub fn new(unit_types: Vec<UnitTypeData>) -> Result<Self> {
        let catalog = Self { unit_types };
        catalog.check()?;
        Ok(catalog)
    }

    /// Parse and validate a catalog from RON text.
    ///
    /// `label` names the source (usually a file path) in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DataParseError`] for malformed text and
    /// [`EngineError::InvalidConfig`] for invalid values.
    pub fn from_ron_str(text: &str, label: &str) -> Result<Self> {
        let catalog: Self = ron::from_str(text).map_err(|err| EngineError::DataParseError {
            path: label.to_string(),
            message: err.to_string(),
        })?;
        catalog.check()?;
        tracing::debug!(source = label, unit_types = catalog.len(), "catalog loaded");
        Ok(catalog)
    }

    fn check(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(EngineError::config("catalog", errors.join("; ")))
        }
    }

    /// Validate every unit type and the uniqueness of ids.
    ///
    /// Returns a list of validation errors.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (index, unit_type) in self.unit_types.iter().enumerate() {
            if let Err(err) = unit_type.validate() {
                errors.push(err.to_string());
            }
            if self.unit_types[..index].iter().any(|u| u.id == unit_type.id) {
                errors.push(format!("Duplicate unit type '{}'", unit_type.id));
            }
        }

        errors
    }

    /// Find a unit type by its ID.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&UnitTypeData> {
        self.unit_types.iter().find(|u| u.id == id)
    }

    /// Find a unit type by its ID or fail.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownUnitType`] if no type has this id.
    pub fn require(&self, id: &str) -> Result<&UnitTypeData> {
        self.get(id)
            .ok_or_else(|| EngineError::UnknownUnitType(id.to_string()))
    }

    /// Iterate unit types in authored order.
    pub fn iter(&self) -> impl Iterator<Item = &UnitTypeData> {
        self.unit_types.iter()
    }

    /// Number of unit types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.unit_types.len()
    }

    /// Check if the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.unit_types.is_empty()
    }
}
