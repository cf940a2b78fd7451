use std::fmt;

use crate::frame::{Binning, DetectorId, FlatIdentity, ReadoutMode};

/// Kind of master calibration frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CalibrationKind {
    Bias,
    Flat,
}

impl CalibrationKind {
    pub fn tag(self) -> &'static str {
        match self {
            Self::Bias => "bias",
            Self::Flat => "flat",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "bias" => Some(Self::Bias),
            "flat" => Some(Self::Flat),
            _ => None,
        }
    }
}

impl fmt::Display for CalibrationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Bias frames are interchangeable within one detector, binning and readout
/// speed.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BiasKey {
    pub detector: DetectorId,
    pub binning: Binning,
    pub readout: ReadoutMode,
}

/// Flat fields are interchangeable within one detector, binning and light
/// path (slit mask or filter).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlatKey {
    pub detector: DetectorId,
    pub binning: Binning,
    pub identity: FlatIdentity,
}

/// Identifies one master calibration frame. The variant is the frame type.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigurationKey {
    Bias(BiasKey),
    Flat(FlatKey),
}

impl ConfigurationKey {
    pub fn kind(&self) -> CalibrationKind {
        match self {
            Self::Bias(_) => CalibrationKind::Bias,
            Self::Flat(_) => CalibrationKind::Flat,
        }
    }

    pub fn detector(&self) -> DetectorId {
        match self {
            Self::Bias(k) => k.detector,
            Self::Flat(k) => k.detector,
        }
    }

    pub fn binning(&self) -> Binning {
        match self {
            Self::Bias(k) => k.binning,
            Self::Flat(k) => k.binning,
        }
    }

    /// Deterministic file stem, e.g. `master_bias_c6_2x2_slow` or
    /// `master_flat_c6_2x2_slit-ls1`.
    pub fn file_stem(&self) -> String {
        let variant = match self {
            Self::Bias(k) => k.readout.to_string(),
            Self::Flat(k) => k.identity.to_string(),
        };
        let stem = format!(
            "master_{}_{}_{}_{}",
            self.kind(),
            self.detector(),
            self.binning(),
            variant
        );
        stem.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl From<BiasKey> for ConfigurationKey {
    fn from(key: BiasKey) -> Self {
        Self::Bias(key)
    }
}

impl From<FlatKey> for ConfigurationKey {
    fn from(key: FlatKey) -> Self {
        Self::Flat(key)
    }
}

impl fmt::Display for ConfigurationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bias(k) => write!(
                f,
                "master bias ({}, {}, {} readout)",
                k.detector, k.binning, k.readout
            ),
            Self::Flat(k) => write!(
                f,
                "master flat ({}, {}, {})",
                k.detector, k.binning, k.identity
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_stems_are_deterministic() {
        let bias = ConfigurationKey::Bias(BiasKey {
            detector: DetectorId(6),
            binning: Binning { x: 2, y: 2 },
            readout: ReadoutMode::new("Slow"),
        });
        assert_eq!(bias.file_stem(), "master_bias_c6_2x2_slow");

        let flat = ConfigurationKey::Flat(FlatKey {
            detector: DetectorId(3),
            binning: Binning::default(),
            identity: FlatIdentity::slit_mask("LS 0.7 arcsec"),
        });
        assert_eq!(flat.file_stem(), "master_flat_c3_1x1_slit-ls_0.7_arcsec");
    }
}
