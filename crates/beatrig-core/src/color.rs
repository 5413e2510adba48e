//! Named color palette
//!
//! Effects pick colors by name. Each [`RgbColor`] resolves to a [`ColorSpec`]
//! holding the raw values for every color-mixing channel a fixture may have,
//! and to the closest [`WheelColor`] for fixtures with a color wheel.

use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

/// Raw color-mixing values for one color
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorSpec {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub cold_white: u8,
    pub warm_white: u8,
    pub amber: u8,
    pub uv: u8,
}

impl ColorSpec {
    pub const fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self {
            red,
            green,
            blue,
            cold_white: 0,
            warm_white: 0,
            amber: 0,
            uv: 0,
        }
    }
}

/// Colors available to effects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RgbColor {
    White,
    Red,
    Green,
    Blue,
    Yellow,
    Orange,
    Pink,
    Purple,
    Lightpink,
    Cyan,
    Gold,
    Lime,
    Brown,
    Blindingwhite,
}

impl RgbColor {
    /// Every color in palette order
    pub const ALL: [RgbColor; 14] = [
        RgbColor::White,
        RgbColor::Red,
        RgbColor::Green,
        RgbColor::Blue,
        RgbColor::Yellow,
        RgbColor::Orange,
        RgbColor::Pink,
        RgbColor::Purple,
        RgbColor::Lightpink,
        RgbColor::Cyan,
        RgbColor::Gold,
        RgbColor::Lime,
        RgbColor::Brown,
        RgbColor::Blindingwhite,
    ];

    pub fn spec(&self) -> ColorSpec {
        match self {
            RgbColor::White => ColorSpec {
                cold_white: 255,
                ..ColorSpec::rgb(255, 255, 255)
            },
            RgbColor::Red => ColorSpec::rgb(255, 0, 0),
            RgbColor::Green => ColorSpec::rgb(0, 255, 0),
            RgbColor::Blue => ColorSpec::rgb(0, 0, 255),
            RgbColor::Yellow => ColorSpec {
                amber: 120,
                ..ColorSpec::rgb(255, 255, 0)
            },
            RgbColor::Orange => ColorSpec {
                amber: 255,
                ..ColorSpec::rgb(255, 128, 0)
            },
            RgbColor::Pink => ColorSpec {
                uv: 60,
                ..ColorSpec::rgb(255, 0, 127)
            },
            RgbColor::Purple => ColorSpec {
                uv: 200,
                ..ColorSpec::rgb(128, 0, 255)
            },
            RgbColor::Lightpink => ColorSpec {
                cold_white: 80,
                ..ColorSpec::rgb(255, 64, 160)
            },
            RgbColor::Cyan => ColorSpec::rgb(0, 255, 255),
            RgbColor::Gold => ColorSpec {
                warm_white: 120,
                amber: 200,
                ..ColorSpec::rgb(255, 200, 0)
            },
            RgbColor::Lime => ColorSpec::rgb(128, 255, 0),
            RgbColor::Brown => ColorSpec {
                amber: 80,
                ..ColorSpec::rgb(120, 40, 0)
            },
            RgbColor::Blindingwhite => ColorSpec {
                red: 255,
                green: 255,
                blue: 255,
                cold_white: 255,
                warm_white: 255,
                amber: 255,
                uv: 0,
            },
        }
    }

    /// Closest slot on a standard color wheel
    pub fn wheel_color(&self) -> WheelColor {
        match self {
            RgbColor::White | RgbColor::Blindingwhite => WheelColor::White,
            RgbColor::Red => WheelColor::Red,
            RgbColor::Green | RgbColor::Lime => WheelColor::Green,
            RgbColor::Blue => WheelColor::Blue,
            RgbColor::Yellow | RgbColor::Gold => WheelColor::Yellow,
            RgbColor::Orange | RgbColor::Brown => WheelColor::Orange,
            RgbColor::Pink | RgbColor::Lightpink => WheelColor::Pink,
            RgbColor::Purple => WheelColor::Purple,
            RgbColor::Cyan => WheelColor::Lightblue,
        }
    }

    /// Color on the other side of the color circle.
    ///
    /// Saturated colors pair up both ways. Whites and tints map to the
    /// closest saturated complement.
    pub fn complement(&self) -> RgbColor {
        match self {
            RgbColor::Red => RgbColor::Cyan,
            RgbColor::Cyan => RgbColor::Red,
            RgbColor::Green => RgbColor::Pink,
            RgbColor::Pink => RgbColor::Green,
            RgbColor::Blue => RgbColor::Yellow,
            RgbColor::Yellow => RgbColor::Blue,
            RgbColor::Purple => RgbColor::Lime,
            RgbColor::Lime => RgbColor::Purple,
            RgbColor::White | RgbColor::Blindingwhite | RgbColor::Gold => RgbColor::Purple,
            RgbColor::Orange => RgbColor::Blue,
            RgbColor::Lightpink | RgbColor::Brown => RgbColor::Cyan,
        }
    }
}

/// Positions found on fixture color wheels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WheelColor {
    White,
    Red,
    Green,
    Blue,
    Yellow,
    Orange,
    Pink,
    Purple,
    Lightblue,
}

/// Colors that read well as the dominant color of a complementary pair
const PAIR_BASES: [RgbColor; 8] = [
    RgbColor::Red,
    RgbColor::Green,
    RgbColor::Blue,
    RgbColor::Yellow,
    RgbColor::Pink,
    RgbColor::Purple,
    RgbColor::Cyan,
    RgbColor::Lime,
];

/// Pick a random pair of mutually complementary colors
pub fn complementary_pair() -> [RgbColor; 2] {
    let base = *PAIR_BASES
        .choose(&mut rand::rng())
        .unwrap_or(&RgbColor::Red);
    [base, base.complement()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complement_differs() {
        for color in RgbColor::ALL {
            assert_ne!(color, color.complement(), "{:?}", color);
        }
    }

    #[test]
    fn test_pair_bases_are_mutual() {
        for base in PAIR_BASES {
            let other = base.complement();
            assert_eq!(other.complement(), base, "{:?} -> {:?}", base, other);
        }
    }

    #[test]
    fn test_complementary_pair() {
        for _ in 0..32 {
            let [a, b] = complementary_pair();
            assert_eq!(a.complement(), b);
            assert_eq!(b.complement(), a);
        }
    }

    #[test]
    fn test_serde_names() {
        let color: RgbColor = serde_json::from_str("\"lightpink\"").unwrap();
        assert_eq!(color, RgbColor::Lightpink);
        assert_eq!(serde_json::to_string(&RgbColor::Pink).unwrap(), "\"pink\"");
    }
}
