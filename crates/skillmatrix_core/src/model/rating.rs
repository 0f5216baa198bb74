//! Bounded 0..=5 rating.

use serde::{Deserialize, Serialize};

/// A rating clamped into `[Rating::MIN, Rating::MAX]`.
///
/// Every way of producing a `Rating` (constructor, setter, deserializer)
/// clamps out-of-range input to the nearest bound. Stored reals such as
/// `4.0` deserialize by rounding to the nearest whole point first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(from = "f64", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 0;
    pub const MAX: u8 = 5;

    pub fn new(value: i64) -> Self {
        let clamped = value.clamp(i64::from(Self::MIN), i64::from(Self::MAX));
        Self(u8::try_from(clamped).unwrap_or(Self::MAX))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn set(&mut self, value: i64) {
        *self = Self::new(value);
    }
}

impl From<i64> for Rating {
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}

impl From<f64> for Rating {
    /// Rounds half away from zero, then clamps. `NaN` maps to `MIN`.
    fn from(value: f64) -> Self {
        if value.is_nan() {
            return Self(Self::MIN);
        }
        let clamped = value.round().clamp(f64::from(Self::MIN), f64::from(Self::MAX));
        // In range after the clamp, so the cast is exact.
        Self(clamped as u8)
    }
}

impl From<Rating> for u8 {
    fn from(value: Rating) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::Rating;

    #[test]
    fn clamps_on_construction_and_mutation() {
        assert_eq!(Rating::new(9000).get(), 5);
        assert_eq!(Rating::new(-9000).get(), 0);
        assert_eq!(Rating::new(3).get(), 3);

        let mut rating = Rating::new(2);
        rating.set(6);
        assert_eq!(rating.get(), 5);
        rating.set(-1);
        assert_eq!(rating.get(), 0);
    }

    #[test]
    fn clamps_on_deserialization() {
        let high: Rating = serde_json::from_str("9000").unwrap();
        let low: Rating = serde_json::from_str("-9000").unwrap();
        assert_eq!(high.get(), 5);
        assert_eq!(low.get(), 0);
        assert_eq!(serde_json::to_string(&Rating::new(4)).unwrap(), "4");
    }

    #[test]
    fn real_numbers_round_before_clamping() {
        let parse = |text: &str| serde_json::from_str::<Rating>(text).unwrap().get();
        assert_eq!(parse("4.0"), 4);
        assert_eq!(parse("4.4"), 4);
        assert_eq!(parse("4.6"), 5);
        assert_eq!(parse("9000.5"), 5);
        assert_eq!(parse("-3.2"), 0);
        assert_eq!(Rating::from(f64::NAN).get(), Rating::MIN);
        assert!(serde_json::from_str::<Rating>("\"4\"").is_err());
    }
}
