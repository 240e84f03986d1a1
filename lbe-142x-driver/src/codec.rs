//! Conversion between device operations and raw feature reports.
//!
//! Nothing in here performs I/O. Encoding is parameterised over a
//! [`ReportLayout`] so the same code serves every transport.

use std::fmt;

use crate::{
    consts::{
        ANTENNA_OK_BIT, CMD_1420_SET_F1, CMD_1420_SET_F1_TEMP, CMD_1420_SET_FLL,
        CMD_1420_SET_POWER1, CMD_1421_SET_F1, CMD_1421_SET_F1_TEMP, CMD_1421_SET_F2,
        CMD_1421_SET_F2_TEMP, CMD_1421_SET_PLL, CMD_1421_SET_POWER1, CMD_1421_SET_POWER2,
        CMD_1421_SET_PPS, CMD_BLINK_LEDS, CMD_ENABLE_OUTPUTS, GPS_LOCK_BIT, OUTPUTS_ENABLED_MASK,
        OUTPUT_MASK_DUAL, OUTPUT_MASK_SINGLE, PLL_LOCK_BIT, PPS_ENABLED_BIT, STATUS_REPORT_ID,
    },
    layout::{ReportLayout, MAX_REPORT_SIZE},
    model::{CodecError, Model},
};

/// Whether a new frequency survives a power cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persistence {
    /// Written to the device flash
    Committed,

    /// Applied until the next power cycle
    Temporary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Pll,
    Fll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerLevel {
    Normal,
    Low,
}

/// A write operation understood by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetFrequency {
        output: u8,
        frequency: u32,
        persistence: Persistence,
    },
    SetOutputsEnabled(bool),
    SetPllMode(LockMode),
    SetPps(bool),
    SetPowerLevel {
        output: u8,
        level: PowerLevel,
    },
    BlinkLeds,
}

impl Command {
    /// The command byte for this operation on `model`.
    ///
    /// Only meaningful for commands that passed [`Capabilities::validate`](crate::model::Capabilities::validate).
    pub(crate) fn code(&self, model: Model) -> u8 {
        match (*self, model) {
            (Command::SetOutputsEnabled(_), _) => CMD_ENABLE_OUTPUTS,
            (Command::BlinkLeds, _) => CMD_BLINK_LEDS,

            (Command::SetFrequency { persistence, .. }, Model::Lbe1420) => match persistence {
                Persistence::Committed => CMD_1420_SET_F1,
                Persistence::Temporary => CMD_1420_SET_F1_TEMP,
            },
            (
                Command::SetFrequency {
                    output,
                    persistence,
                    ..
                },
                Model::Lbe1421DualOutput,
            ) => match (output, persistence) {
                (1, Persistence::Committed) => CMD_1421_SET_F1,
                (1, Persistence::Temporary) => CMD_1421_SET_F1_TEMP,
                (_, Persistence::Committed) => CMD_1421_SET_F2,
                (_, Persistence::Temporary) => CMD_1421_SET_F2_TEMP,
            },

            (Command::SetPllMode(_), Model::Lbe1420) => CMD_1420_SET_FLL,
            (Command::SetPllMode(_), Model::Lbe1421DualOutput) => CMD_1421_SET_PLL,

            (Command::SetPps(_), _) => CMD_1421_SET_PPS,

            (Command::SetPowerLevel { output: 1, .. }, Model::Lbe1420) => CMD_1420_SET_POWER1,
            (Command::SetPowerLevel { output: 1, .. }, Model::Lbe1421DualOutput) => {
                CMD_1421_SET_POWER1
            }
            (Command::SetPowerLevel { .. }, _) => CMD_1421_SET_POWER2,
        }
    }
}

/// A zero-filled, fixed-size feature report.
#[derive(Clone, PartialEq, Eq)]
pub struct RawReport {
    buf: [u8; MAX_REPORT_SIZE],
    len: usize,
}

impl RawReport {
    pub fn zeroed(layout: &ReportLayout) -> Self {
        RawReport {
            buf: [0u8; MAX_REPORT_SIZE],
            len: layout.report_size.min(MAX_REPORT_SIZE),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.buf[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for RawReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawReport[")?;
        for (i, byte) in self.as_bytes().iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{byte:02X}")?;
        }
        write!(f, "]")
    }
}

/// Builds the report for `command`, or fails without producing a buffer.
pub fn encode(
    model: Model,
    layout: &ReportLayout,
    command: &Command,
) -> Result<RawReport, CodecError> {
    model.capabilities().validate(command)?;

    let offsets = layout.offsets(model);
    let mut report = RawReport::zeroed(layout);
    let buf = report.as_mut_bytes();

    if let Some(report_id) = layout.report_id {
        buf[0] = report_id;
    }
    buf[layout.command] = command.code(model);

    match *command {
        Command::SetFrequency { frequency, .. } => {
            let start = offsets.frequency_payload;
            buf[start..start + 4].copy_from_slice(&frequency.to_le_bytes());
        }
        Command::SetOutputsEnabled(enabled) => {
            buf[layout.payload] = match (enabled, model) {
                (false, _) => 0x00,
                (true, Model::Lbe1420) => OUTPUT_MASK_SINGLE,
                (true, Model::Lbe1421DualOutput) => OUTPUT_MASK_DUAL,
            };
        }
        Command::SetPllMode(mode) => buf[layout.payload] = u8::from(mode == LockMode::Fll),
        Command::SetPps(enabled) => buf[layout.payload] = u8::from(enabled),
        Command::SetPowerLevel { level, .. } => {
            buf[layout.payload] = u8::from(level == PowerLevel::Low)
        }
        Command::BlinkLeds => {}
    }

    Ok(report)
}

/// Builds the buffer handed to the transport when requesting the status report.
pub fn encode_status_request(layout: &ReportLayout) -> RawReport {
    let mut report = RawReport::zeroed(layout);
    report.as_mut_bytes()[0] = STATUS_REPORT_ID;
    report
}

fn read_u32_le(buf: &[u8], start: usize) -> u32 {
    u32::from_le_bytes([buf[start], buf[start + 1], buf[start + 2], buf[start + 3]])
}

/// Decodes a status report received through a transport using `layout`.
pub fn decode_status(
    model: Model,
    layout: &ReportLayout,
    buf: &[u8],
) -> Result<StatusReport, CodecError> {
    if buf.len() != layout.report_size {
        return Err(CodecError::ReportSize {
            expected: layout.report_size,
            received: buf.len(),
        });
    }

    let capabilities = model.capabilities();
    let offsets = layout.offsets(model);
    let raw_status = buf[layout.status];

    let outputs_enabled = !capabilities.trusts_output_enable_bits
        || raw_status & OUTPUTS_ENABLED_MASK == OUTPUTS_ENABLED_MASK;
    let power_low = |index: usize| offsets.power_low[index].is_some_and(|o| buf[o] != 0);

    Ok(StatusReport {
        model,
        raw_status,
        frequency1: read_u32_le(buf, offsets.frequency1),
        frequency2: offsets.frequency2.map_or(0, |o| read_u32_le(buf, o)),
        outputs_enabled,
        fll_enabled: buf[offsets.mode] != 0,
        pll_locked: capabilities.reports_pll_lock && raw_status & PLL_LOCK_BIT != 0,
        antenna_ok: raw_status & ANTENNA_OK_BIT != 0,
        pps_enabled: capabilities.pps && raw_status & PPS_ENABLED_BIT != 0,
        out1_power_low: power_low(0),
        out2_power_low: power_low(1),
    })
}

/// A snapshot of the device state, fresh from one status request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    model: Model,
    raw_status: u8,
    frequency1: u32,
    frequency2: u32,
    outputs_enabled: bool,
    fll_enabled: bool,
    pll_locked: bool,
    antenna_ok: bool,
    pps_enabled: bool,
    out1_power_low: bool,
    out2_power_low: bool,
}

impl StatusReport {
    pub fn model(&self) -> Model {
        self.model
    }

    pub fn raw_status(&self) -> u8 {
        self.raw_status
    }

    pub fn gps_locked(&self) -> bool {
        self.raw_status & GPS_LOCK_BIT != 0
    }

    pub fn pll_locked(&self) -> bool {
        self.pll_locked
    }

    pub fn antenna_ok(&self) -> bool {
        self.antenna_ok
    }

    pub fn outputs_enabled(&self) -> bool {
        self.outputs_enabled
    }

    /// OUT1 frequency in Hz
    pub fn frequency1(&self) -> u32 {
        self.frequency1
    }

    /// OUT2 frequency in Hz, always 0 on the single output model
    pub fn frequency2(&self) -> u32 {
        self.frequency2
    }

    pub fn fll_enabled(&self) -> bool {
        self.fll_enabled
    }

    pub fn lock_mode(&self) -> LockMode {
        if self.fll_enabled {
            LockMode::Fll
        } else {
            LockMode::Pll
        }
    }

    pub fn pps_enabled(&self) -> bool {
        self.pps_enabled
    }

    pub fn out1_power_low(&self) -> bool {
        self.out1_power_low
    }

    pub fn out2_power_low(&self) -> bool {
        self.out2_power_low
    }
}
