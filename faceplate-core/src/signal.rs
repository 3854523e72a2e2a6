//! Signal strength indicator mapping.
//! 把连接状态映射为信号条的长度和不透明度，动画过渡由显示端负责。

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Highest bar level a connected reading may carry.
pub const MAX_LEVEL: u8 = 4;

/// A connectivity/status reading as reported by the host.
///
/// Variant order is the strength order used by the indicator:
/// `Unknown < Disconnected < Connecting < Connected { 0 } < .. < Connected { MAX_LEVEL }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConnectivityReading {
    Unknown,
    Disconnected,
    Connecting,
    Connected { level: u8 },
}

/// Visual magnitude of the strength indicator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StrengthPresentation {
    /// Fraction of the maximum bar extent, in (0, 1].
    pub length: f32,
    /// Opacity weight, in (0, 1].
    pub opacity: f32,
}

/// The "no data" presentation: barely visible.
pub const NO_DATA: StrengthPresentation = StrengthPresentation {
    length: 0.1,
    opacity: 0.1,
};

impl StrengthPresentation {
    /// Bar length scaled to `max`, e.g. a pixel extent.
    pub fn extent(&self, max: f32) -> f32 {
        self.length * max
    }
}

/// Maps a reading to bar length and opacity.
///
/// Monotonic in the reading order. Out-of-range levels degrade to [`NO_DATA`].
pub fn present_strength(reading: ConnectivityReading) -> StrengthPresentation {
    match reading {
        ConnectivityReading::Unknown => NO_DATA,
        ConnectivityReading::Disconnected => StrengthPresentation {
            length: 0.1,
            opacity: 0.3,
        },
        ConnectivityReading::Connecting => StrengthPresentation {
            length: 0.25,
            opacity: 0.5,
        },
        ConnectivityReading::Connected { level } if level <= MAX_LEVEL => {
            let l = f32::from(level);
            let max = f32::from(MAX_LEVEL);
            // length: 0.25 -> 1.0, opacity: 0.6 -> 1.0
            StrengthPresentation {
                length: (max + 3.0 * l) / (4.0 * max),
                opacity: (6.0 * max + 4.0 * l) / (10.0 * max),
            }
        }
        ConnectivityReading::Connected { .. } => NO_DATA,
    }
}

impl ConnectivityReading {
    /// Converts an access point strength percentage (0-100) into bars,
    /// using the same thresholds as `nmcli`.
    pub fn from_strength_percent(percent: u8) -> Self {
        let level = match percent {
            101..=u8::MAX => return ConnectivityReading::Unknown,
            81..=100 => 4,
            56..=80 => 3,
            31..=55 => 2,
            6..=30 => 1,
            _ => 0,
        };
        ConnectivityReading::Connected { level }
    }

    /// Converts a NetworkManager global `State` plus the active access point
    /// strength (if any) into a reading.
    pub fn from_nm_state(state: u32, strength: Option<u8>) -> Self {
        match state {
            70 => strength.map_or(ConnectivityReading::Unknown, Self::from_strength_percent),
            40..=60 => ConnectivityReading::Connecting,
            10..=30 => ConnectivityReading::Disconnected,
            _ => ConnectivityReading::Unknown,
        }
    }

    /// Like [`str::parse`], but malformed text becomes `Unknown`.
    pub fn parse_lossy(s: &str) -> Self {
        s.parse().unwrap_or(ConnectivityReading::Unknown)
    }
}

impl FromStr for ConnectivityReading {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "unknown" => Ok(ConnectivityReading::Unknown),
            "disconnected" => Ok(ConnectivityReading::Disconnected),
            "connecting" => Ok(ConnectivityReading::Connecting),
            other => other
                .parse::<u8>()
                .map(|level| ConnectivityReading::Connected { level })
                .map_err(|_| crate::Error::InvalidReading(s.to_string())),
        }
    }
}

impl fmt::Display for ConnectivityReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectivityReading::Unknown => f.write_str("unknown"),
            ConnectivityReading::Disconnected => f.write_str("disconnected"),
            ConnectivityReading::Connecting => f.write_str("connecting"),
            ConnectivityReading::Connected { level } => write!(f, "{}", level),
        }
    }
}
