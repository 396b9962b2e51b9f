//! Scalar values carrying an IEC 61850 unit and SI multiplier.
//!
//! SCL stores physical quantities as a raw magnitude plus a `unit` attribute
//! and an SI `multiplier` attribute (`<Voltage unit="V" multiplier="k">20`
//! means 20 kV). Storage keeps the magnitude exactly as written; conversion
//! to base SI units is explicit via [`ScalarWithUnit::si_value`], so a value
//! is never silently rescaled between parse and display.

use serde::{Deserialize, Serialize};

/// SI prefix multiplier as allowed on SCL value elements.
///
/// Only the prefixes that appear in IEC 61850-6 value attributes are
/// represented; an empty attribute means no scaling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SiMultiplier {
    Pico,
    Nano,
    Micro,
    Milli,
    #[default]
    Unit,
    Kilo,
    Mega,
    Giga,
}

impl SiMultiplier {
    /// Parse an SCL `multiplier` attribute. Unknown symbols yield `None`.
    pub fn parse(symbol: &str) -> Option<Self> {
        match symbol {
            "p" => Some(SiMultiplier::Pico),
            "n" => Some(SiMultiplier::Nano),
            "u" => Some(SiMultiplier::Micro),
            "m" => Some(SiMultiplier::Milli),
            "" => Some(SiMultiplier::Unit),
            "k" => Some(SiMultiplier::Kilo),
            "M" => Some(SiMultiplier::Mega),
            "G" => Some(SiMultiplier::Giga),
            _ => None,
        }
    }

    /// Power-of-ten exponent applied by this prefix.
    pub fn exponent(self) -> i32 {
        match self {
            SiMultiplier::Pico => -12,
            SiMultiplier::Nano => -9,
            SiMultiplier::Micro => -6,
            SiMultiplier::Milli => -3,
            SiMultiplier::Unit => 0,
            SiMultiplier::Kilo => 3,
            SiMultiplier::Mega => 6,
            SiMultiplier::Giga => 9,
        }
    }

    /// The SCL attribute spelling of this prefix.
    pub fn symbol(self) -> &'static str {
        match self {
            SiMultiplier::Pico => "p",
            SiMultiplier::Nano => "n",
            SiMultiplier::Micro => "u",
            SiMultiplier::Milli => "m",
            SiMultiplier::Unit => "",
            SiMultiplier::Kilo => "k",
            SiMultiplier::Mega => "M",
            SiMultiplier::Giga => "G",
        }
    }
}

/// A scalar with unit and SI multiplier, e.g. a voltage-level rating.
///
/// `value` is the magnitude as written in the document; `text` preserves the
/// original character data so a non-numeric value (parsed as 0) can still be
/// reported verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScalarWithUnit {
    pub value: f64,
    pub unit: String,
    pub multiplier: SiMultiplier,
    pub text: String,
}

impl ScalarWithUnit {
    /// The value expressed in base SI units (`value · 10^exponent`).
    pub fn si_value(&self) -> f64 {
        self.value * 10f64.powi(self.multiplier.exponent())
    }
}

impl std::fmt::Display for ScalarWithUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}{}", self.value, self.multiplier.symbol(), self.unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiplier_parse() {
        assert_eq!(SiMultiplier::parse("k"), Some(SiMultiplier::Kilo));
        assert_eq!(SiMultiplier::parse(""), Some(SiMultiplier::Unit));
        assert_eq!(SiMultiplier::parse("G"), Some(SiMultiplier::Giga));
        assert_eq!(SiMultiplier::parse("X"), None);
        // case matters: mega is upper, milli is lower
        assert_eq!(SiMultiplier::parse("M"), Some(SiMultiplier::Mega));
        assert_eq!(SiMultiplier::parse("m"), Some(SiMultiplier::Milli));
    }

    #[test]
    fn test_si_value() {
        let v = ScalarWithUnit {
            value: 20.0,
            unit: "V".into(),
            multiplier: SiMultiplier::Kilo,
            text: "20".into(),
        };
        assert!((v.si_value() - 20_000.0).abs() < 1e-9);

        let v = ScalarWithUnit {
            value: 50.0,
            unit: "Hz".into(),
            multiplier: SiMultiplier::Unit,
            text: "50".into(),
        };
        assert!((v.si_value() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_display() {
        let v = ScalarWithUnit {
            value: 380.0,
            unit: "V".into(),
            multiplier: SiMultiplier::Kilo,
            text: "380".into(),
        };
        assert_eq!(v.to_string(), "380 kV");
    }
}
