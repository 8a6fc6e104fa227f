//! Unit type data structures for data-driven unit definitions.

use serde::{Deserialize, Serialize};

use crate::components::UnitStats;
use crate::error::{EngineError, Result};
use crate::math::{decimal_serde, Fixed};
use crate::resource::ResourcePool;

use super::AbilityData;

mod option_decimal_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::math::Fixed;

    pub fn serialize<S>(value: &Option<Fixed>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.map(|v| v.to_num::<f64>()).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Fixed>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value: Option<f64> = Option::deserialize(deserializer)?;
        value
            .map(|v| {
                Fixed::checked_from_num(v)
                    .ok_or_else(|| serde::de::Error::custom(format!("{v} out of fixed-point range")))
            })
            .transpose()
    }
}

/// Authored resource pool of a unit type.
///
/// # Example RON
///
/// ```ron
/// ResourcePoolData(
///     max: 100.0,
///     regen_rate: 5.0,
///     consume_rate: 2.0,
///     high_threshold: Some(80.0),
/// )
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourcePoolData {
    /// Capacity.
    #[serde(with = "decimal_serde")]
    pub max: Fixed,

    /// Gain per second outside overdrive.
    #[serde(default, with = "decimal_serde")]
    pub regen_rate: Fixed,

    /// Drain per second during overdrive.
    #[serde(default, with = "decimal_serde")]
    pub consume_rate: Fixed,

    /// Entering overdrive requires reaching this value. No threshold, no overdrive.
    #[serde(default, with = "option_decimal_serde")]
    pub high_threshold: Option<Fixed>,

    /// Leaving overdrive requires dropping below this value. Defaults to the high threshold.
    #[serde(default, with = "option_decimal_serde")]
    pub low_threshold: Option<Fixed>,

    /// Amount at spawn.
    #[serde(default, with = "decimal_serde")]
    pub starting: Fixed,
}

impl ResourcePoolData {
    /// Build the runtime pool.
    #[must_use]
    pub fn build(&self) -> ResourcePool {
        let pool = ResourcePool::new(self.max, self.regen_rate, self.consume_rate);
        let pool = match self.high_threshold {
            Some(high) => pool.with_thresholds(high, self.low_threshold.unwrap_or(high)),
            None => pool,
        };
        pool.with_current(self.starting)
    }

    fn validate(&self, context: &str) -> Result<()> {
        let fail = |reason: String| Err(EngineError::config(context, reason));

        if self.max <= Fixed::ZERO {
            return fail(format!("resource max {} must be positive", self.max));
        }
        if self.regen_rate < Fixed::ZERO || self.consume_rate < Fixed::ZERO {
            return fail("resource rates must be non-negative".to_string());
        }
        if self.starting < Fixed::ZERO || self.starting > self.max {
            return fail(format!("starting resource {} outside [0, {}]", self.starting, self.max));
        }
        match (self.high_threshold, self.low_threshold) {
            (None, Some(_)) => fail("low_threshold without high_threshold".to_string()),
            (Some(high), low) => {
                if high < Fixed::ZERO || high > self.max {
                    return fail(format!("high_threshold {high} outside [0, {}]", self.max));
                }
                let low = low.unwrap_or(high);
                if low < Fixed::ZERO || low > high {
                    return fail(format!("low_threshold {low} outside [0, {high}]"));
                }
                Ok(())
            }
            (None, None) => Ok(()),
        }
    }
}

/// Data-driven unit type definition.
///
/// # Example RON
///
/// ```ron
/// UnitTypeData(
///     id: "thunder",
///     name: "Thunder",
///     max_health: 90.0,
///     attack: 12.0,
///     move_speed: 3.0,
///     resource: Some(ResourcePoolData(max: 100.0, regen_rate: 10.0)),
///     abilities: [ /* AbilityData entries */ ],
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitTypeData {
    /// Unique string identifier for this unit type.
    pub id: String,

    /// Display name.
    #[serde(default)]
    pub name: String,

    /// Maximum health.
    #[serde(with = "decimal_serde")]
    pub max_health: Fixed,

    /// Base attack damage.
    #[serde(with = "decimal_serde")]
    pub attack: Fixed,

    /// Base move speed.
    #[serde(with = "decimal_serde")]
    pub move_speed: Fixed,

    /// Resource pool, if the type has one.
    #[serde(default)]
    pub resource: Option<ResourcePoolData>,

    /// Abilities in slot order.
    #[serde(default)]
    pub abilities: Vec<AbilityData>,
}

impl UnitTypeData {
    /// Create a unit type with no pool and no abilities.
    #[must_use]
    pub fn new(id: impl Into<String>, max_health: Fixed, attack: Fixed, move_speed: Fixed) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            max_health,
            attack,
            move_speed,
            resource: None,
            abilities: Vec::new(),
        }
    }

    /// Builder method to attach a resource pool.
    #[must_use]
    pub fn with_resource(mut self, resource: ResourcePoolData) -> Self {
        self.resource = Some(resource);
        self
    }

    /// Builder method to append an ability.
    #[must_use]
    pub fn with_ability(mut self, ability: AbilityData) -> Self {
        self.abilities.push(ability);
        self
    }

    /// Authored stat block.
    #[must_use]
    pub fn stats(&self) -> UnitStats {
        UnitStats::new(self.attack, self.move_speed, self.max_health)
    }

    /// Find an ability by its ID.
    #[must_use]
    pub fn get_ability(&self, id: &str) -> Option<&AbilityData> {
        self.abilities.iter().find(|a| a.id == id)
    }

    /// Reject invalid numeric configuration.
    ///
    /// Missing references (an ability that needs a pool the type lacks) are
    /// not rejected here; the ability is disabled at spawn instead.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] for the first problem found.
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| Err(EngineError::config(&self.id, reason));

        if self.id.is_empty() {
            return fail("unit type id is empty".to_string());
        }
        if self.max_health <= Fixed::ZERO {
            return fail(format!("max_health {} must be positive", self.max_health));
        }
        if self.attack < Fixed::ZERO || self.move_speed < Fixed::ZERO {
            return fail("attack and move_speed must be non-negative".to_string());
        }
        if self.abilities.len() > usize::from(u8::MAX) {
            return fail(format!("{} abilities exceed the slot limit", self.abilities.len()));
        }
        if let Some(resource) = &self.resource {
            resource.validate(&self.id)?;
        }
        for (index, ability) in self.abilities.iter().enumerate() {
            ability.validate().map_err(|err| match err {
                EngineError::InvalidConfig { context, reason } => {
                    EngineError::config(format!("{}/{context}", self.id), reason)
                }
                other => other,
            })?;
            if self.abilities[..index].iter().any(|a| a.id == ability.id) {
                return fail(format!("duplicate ability id '{}'", ability.id));
            }
        }
        Ok(())
    }
}
