use std::fmt;

use thiserror::Error;

use crate::{
    codec::Command,
    consts::{MAX_FREQUENCY, PID_LBE_1420, PID_LBE_1421, VID_LEO_BODNAR},
};

/// The supported LBE-142x variants, detected from the USB product identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Model {
    /// LBE-1420, single output
    Lbe1420,

    /// LBE-1421, dual output with 1PPS and PLL lock reporting
    Lbe1421DualOutput,
}

impl Model {
    pub fn from_product_id(product_id: u16) -> Option<Model> {
        match product_id {
            PID_LBE_1420 => Some(Model::Lbe1420),
            PID_LBE_1421 => Some(Model::Lbe1421DualOutput),
            _ => None,
        }
    }

    pub fn from_vid_pid(vendor_id: u16, product_id: u16) -> Option<Model> {
        if vendor_id != VID_LEO_BODNAR {
            return None;
        }

        Self::from_product_id(product_id)
    }

    pub fn product_id(&self) -> u16 {
        match self {
            Model::Lbe1420 => PID_LBE_1420,
            Model::Lbe1421DualOutput => PID_LBE_1421,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Model::Lbe1420 => "LBE-1420",
            Model::Lbe1421DualOutput => "LBE-1421 dual output",
        }
    }

    pub fn capabilities(&self) -> &'static Capabilities {
        match self {
            Model::Lbe1420 => &LBE_1420_CAPABILITIES,
            Model::Lbe1421DualOutput => &LBE_1421_CAPABILITIES,
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A device feature that is not present on every model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    PllModeSelect,
    Pps,
    PowerLevel { output: u8 },
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feature::PllModeSelect => f.write_str("PLL/FLL mode selection"),
            Feature::Pps => f.write_str("1PPS output control"),
            Feature::PowerLevel { output } => write!(f, "OUT{output} power level"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParameterError {
    #[error("output {output} does not exist, valid outputs are 1..={output_count}")]
    OutputOutOfRange { output: u8, output_count: u8 },

    #[error("frequency {frequency} Hz is out of range, valid range is 1..={max} Hz")]
    FrequencyOutOfRange { frequency: u32, max: u32 },
}

/// Reasons a command cannot be encoded for a model.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(#[from] ParameterError),

    #[error("{feature} is not supported on the {model}")]
    Unsupported { model: Model, feature: Feature },

    #[error("status report must be {expected} bytes, received {received}")]
    ReportSize { expected: usize, received: usize },
}

/// What a model can do. Never mutated; one static table per model.
#[derive(Debug, PartialEq, Eq)]
pub struct Capabilities {
    pub model: Model,
    pub output_count: u8,
    pub max_frequency: u32,
    pub pll_mode_select: bool,
    pub pps: bool,

    /// Number of outputs with a selectable power level, counted from OUT1
    pub power_level_outputs: u8,

    /// Whether bit 1 of the status byte reports PLL lock
    pub reports_pll_lock: bool,

    /// The LBE-1420 reports disable bits even while its output is running,
    /// so its status is treated as always enabled.
    pub trusts_output_enable_bits: bool,
}

pub static LBE_1420_CAPABILITIES: Capabilities = Capabilities {
    model: Model::Lbe1420,
    output_count: 1,
    max_frequency: MAX_FREQUENCY,
    pll_mode_select: true,
    pps: false,
    power_level_outputs: 1,
    reports_pll_lock: false,
    trusts_output_enable_bits: false,
};

pub static LBE_1421_CAPABILITIES: Capabilities = Capabilities {
    model: Model::Lbe1421DualOutput,
    output_count: 2,
    max_frequency: MAX_FREQUENCY,
    pll_mode_select: true,
    pps: true,
    power_level_outputs: 2,
    reports_pll_lock: true,
    trusts_output_enable_bits: true,
};

impl Capabilities {
    pub fn check_output(&self, output: u8) -> Result<(), ParameterError> {
        if output == 0 || output > self.output_count {
            return Err(ParameterError::OutputOutOfRange {
                output,
                output_count: self.output_count,
            });
        }

        Ok(())
    }

    pub fn check_frequency(&self, frequency: u32) -> Result<(), ParameterError> {
        if frequency == 0 || frequency > self.max_frequency {
            return Err(ParameterError::FrequencyOutOfRange {
                frequency,
                max: self.max_frequency,
            });
        }

        Ok(())
    }

    fn unsupported(&self, feature: Feature) -> CodecError {
        CodecError::Unsupported {
            model: self.model,
            feature,
        }
    }

    /// Checks a command against this model before anything is encoded.
    pub fn validate(&self, command: &Command) -> Result<(), CodecError> {
        match *command {
            Command::SetFrequency {
                output, frequency, ..
            } => {
                self.check_output(output)?;
                self.check_frequency(frequency)?;
            }

            Command::SetPllMode(_) if !self.pll_mode_select => {
                return Err(self.unsupported(Feature::PllModeSelect));
            }

            Command::SetPps(_) if !self.pps => {
                return Err(self.unsupported(Feature::Pps));
            }

            Command::SetPowerLevel { output, .. } => {
                // OUT1 and OUT2 exist somewhere in the family; anything else is a bad index
                if (1..=2).contains(&output) && output > self.power_level_outputs {
                    return Err(self.unsupported(Feature::PowerLevel { output }));
                }

                self.check_output(output)?;
            }

            Command::SetOutputsEnabled(_)
            | Command::SetPllMode(_)
            | Command::SetPps(_)
            | Command::BlinkLeds => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{CodecError, Feature, Model, ParameterError};
    use crate::codec::{Command, LockMode, Persistence, PowerLevel};

    #[test]
    fn model_is_detected_from_product_id() {
        assert_eq!(Model::from_product_id(0x2443), Some(Model::Lbe1420));
        assert_eq!(
            Model::from_product_id(0x2444),
            Some(Model::Lbe1421DualOutput)
        );
        assert_eq!(Model::from_product_id(0x2210), None);
    }

    #[test]
    fn model_requires_leo_bodnar_vendor_id() {
        assert_eq!(Model::from_vid_pid(0x1dd2, 0x2444), Some(Model::Lbe1421DualOutput));
        assert_eq!(Model::from_vid_pid(0x1234, 0x2444), None);
    }

    #[test]
    fn product_id_round_trips_through_model() {
        for model in [Model::Lbe1420, Model::Lbe1421DualOutput] {
            assert_eq!(Model::from_product_id(model.product_id()), Some(model));
        }
    }

    #[test]
    fn capabilities_differ_between_models() {
        let single = Model::Lbe1420.capabilities();
        let dual = Model::Lbe1421DualOutput.capabilities();

        assert_eq!(single.output_count, 1);
        assert_eq!(dual.output_count, 2);
        assert!(!single.pps);
        assert!(dual.pps);
        assert!(single.pll_mode_select && dual.pll_mode_select);
        assert!(!single.reports_pll_lock);
        assert!(dual.reports_pll_lock);
    }

    #[test]
    fn validate_rejects_second_output_frequency_on_single_output_model() {
        let result = Model::Lbe1420.capabilities().validate(&Command::SetFrequency {
            output: 2,
            frequency: 10_000_000,
            persistence: Persistence::Committed,
        });

        assert_eq!(
            result,
            Err(CodecError::InvalidParameter(
                ParameterError::OutputOutOfRange {
                    output: 2,
                    output_count: 1
                }
            ))
        );
    }

    #[test]
    fn validate_rejects_zero_and_excessive_frequency() {
        let caps = Model::Lbe1421DualOutput.capabilities();

        for frequency in [0, 1_400_000_001, u32::MAX] {
            let result = caps.validate(&Command::SetFrequency {
                output: 1,
                frequency,
                persistence: Persistence::Temporary,
            });

            assert!(matches!(
                result,
                Err(CodecError::InvalidParameter(
                    ParameterError::FrequencyOutOfRange { .. }
                ))
            ));
        }
    }

    #[test]
    fn validate_accepts_range_bounds() {
        let caps = Model::Lbe1421DualOutput.capabilities();

        for frequency in [1, 1_400_000_000] {
            assert!(caps
                .validate(&Command::SetFrequency {
                    output: 2,
                    frequency,
                    persistence: Persistence::Committed,
                })
                .is_ok());
        }
    }

    #[test]
    fn validate_rejects_missing_features_on_single_output_model() {
        let caps = Model::Lbe1420.capabilities();

        assert_eq!(
            caps.validate(&Command::SetPps(true)),
            Err(CodecError::Unsupported {
                model: Model::Lbe1420,
                feature: Feature::Pps
            })
        );
        assert_eq!(
            caps.validate(&Command::SetPowerLevel {
                output: 2,
                level: PowerLevel::Low
            }),
            Err(CodecError::Unsupported {
                model: Model::Lbe1420,
                feature: Feature::PowerLevel { output: 2 }
            })
        );
        assert!(caps.validate(&Command::SetPllMode(LockMode::Fll)).is_ok());
    }

    #[test]
    fn validate_rejects_power_level_for_nonexistent_output() {
        let caps = Model::Lbe1421DualOutput.capabilities();

        for output in [0, 3] {
            assert!(matches!(
                caps.validate(&Command::SetPowerLevel {
                    output,
                    level: PowerLevel::Normal
                }),
                Err(CodecError::InvalidParameter(
                    ParameterError::OutputOutOfRange { .. }
                ))
            ));
        }
    }

    #[test]
    fn unsupported_error_names_feature_and_model() {
        let error = CodecError::Unsupported {
            model: Model::Lbe1420,
            feature: Feature::Pps,
        };

        assert_eq!(
            error.to_string(),
            "1PPS output control is not supported on the LBE-1420"
        );
    }
}
