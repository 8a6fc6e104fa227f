//! Fixed-point math utilities for deterministic simulation.
//!
//! Every quantity the engine tracks (health, damage, rates, durations,
//! distances, multipliers and the simulation clock) is a [`Fixed`]. Floats
//! only appear at the authoring boundary, where [`decimal_serde`] converts
//! decimal config values once on load.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Scalar used for every engine quantity.
///
/// I32F32: a signed 32-bit whole part and 32 fraction bits, enough for
/// arena coordinates and sub-millisecond clocks alike.
pub type Fixed = I32F32;

/// Position or direction on the arena floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// Horizontal component.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Vertical component.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

/// Raw-bit serde adapter for runtime state.
///
/// A saved simulation must restore to the exact same bits, so values go
/// through their `i64` representation rather than a decimal.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Write the raw bits.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Read the raw bits back.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        i64::deserialize(deserializer).map(Fixed::from_bits)
    }
}

/// [`fixed_serde`] for optional values such as a timestamp that may be unset.
pub mod option_fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Write the raw bits, or nothing.
    pub fn serialize<S>(value: &Option<Fixed>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.map(Fixed::to_bits).serialize(serializer)
    }

    /// Read optional raw bits back.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Fixed>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<i64>::deserialize(deserializer)?.map(Fixed::from_bits))
    }
}

/// Serde support for authored decimal values.
///
/// Config files are written by designers as plain decimals (`cooldown: 2.5`).
/// The value is converted into [`Fixed`] exactly once on load, so the
/// simulation itself never touches floating point.
pub mod decimal_serde {
    use super::Fixed;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize a fixed-point number as a decimal.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(value.to_num::<f64>())
    }

    /// Deserialize a decimal into a fixed-point number.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = f64::deserialize(deserializer)?;
        Fixed::checked_from_num(raw)
            .ok_or_else(|| D::Error::custom(format!("{raw} is out of fixed-point range")))
    }
}

impl Vec2Fixed {
    /// Vector from components.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Create a vector from integer coordinates.
    #[must_use]
    pub fn from_int(x: i32, y: i32) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    /// The origin.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Unit vector along +X, the default facing.
    pub const UNIT_X: Self = Self {
        x: Fixed::ONE,
        y: Fixed::ZERO,
    };

    /// Squared distance. Range checks compare against `range * range`.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        let delta = self - other;
        delta
            .x
            .saturating_mul(delta.x)
            .saturating_add(delta.y.saturating_mul(delta.y))
    }

    /// Euclidean distance.
    #[must_use]
    pub fn distance(self, other: Self) -> Fixed {
        fixed_sqrt(self.distance_squared(other))
    }

    /// Dot product.
    #[must_use]
    pub fn dot(self, other: Self) -> Fixed {
        self.x
            .saturating_mul(other.x)
            .saturating_add(self.y.saturating_mul(other.y))
    }

    /// Counter-clockwise perpendicular.
    #[must_use]
    pub fn perp(self) -> Self {
        Self::new(-self.y, self.x)
    }

    /// Multiply both components by a scalar.
    #[must_use]
    pub fn scale(self, factor: Fixed) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Unit-length copy, or [`Self::ZERO`] for a zero-length vector.
    #[must_use]
    pub fn normalize(self) -> Self {
        let length = fixed_sqrt(self.dot(self));
        if length == Fixed::ZERO {
            Self::ZERO
        } else {
            Self::new(self.x / length, self.y / length)
        }
    }

    /// Direction from `self` toward `target`, or `fallback` when they coincide.
    #[must_use]
    pub fn direction_to(self, target: Self, fallback: Self) -> Self {
        let dir = (target - self).normalize();
        if dir == Self::ZERO {
            fallback
        } else {
            dir
        }
    }
}

/// Square root by bisection, so every platform lands on the same bits.
///
/// Non-positive input yields zero.
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    let (mut below, mut above) = (Fixed::ZERO, value.max(Fixed::ONE));
    for _ in 0..64 {
        let guess = below + (above - below) / 2;
        if guess.saturating_mul(guess) <= value {
            below = guess;
        } else {
            above = guess;
        }
    }
    below
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}
