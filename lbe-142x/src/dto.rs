use lbe_142x_driver::{LockMode, Model, StatusReport};
use serde::Serialize;

#[derive(Serialize, Debug)]
pub(crate) struct StatusResponse {
    model: &'static str,

    /// The status byte exactly as reported by the device
    raw_status: u8,

    /// Whether the device has a lock on a GPS signal
    gps_lock: bool,

    /// Whether the PLL is locked, always false on the LBE-1420
    pll_lock: bool,

    /// Whether the antenna is connected without a short circuit
    antenna_ok: bool,

    outputs_enabled: bool,

    /// "PLL" or "FLL"
    mode: &'static str,

    /// The frequency output on OUT1, in Hz
    out1_frequency: u32,

    out1_power_low: bool,

    /// The frequency output on OUT2, in Hz
    #[serde(skip_serializing_if = "Option::is_none")]
    out2_frequency: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    out2_power_low: Option<bool>,

    /// Whether OUT1 carries the 1PPS signal
    #[serde(skip_serializing_if = "Option::is_none")]
    pps_enabled: Option<bool>,
}

pub(crate) fn mode_name(mode: LockMode) -> &'static str {
    match mode {
        LockMode::Pll => "PLL",
        LockMode::Fll => "FLL",
    }
}

impl From<&StatusReport> for StatusResponse {
    fn from(value: &StatusReport) -> Self {
        let dual = value.model() == Model::Lbe1421DualOutput;

        StatusResponse {
            model: value.model().display_name(),
            raw_status: value.raw_status(),
            gps_lock: value.gps_locked(),
            pll_lock: value.pll_locked(),
            antenna_ok: value.antenna_ok(),
            outputs_enabled: value.outputs_enabled(),
            mode: mode_name(value.lock_mode()),
            out1_frequency: value.frequency1(),
            out1_power_low: value.out1_power_low(),
            out2_frequency: dual.then(|| value.frequency2()),
            out2_power_low: dual.then(|| value.out2_power_low()),
            pps_enabled: dual.then(|| value.pps_enabled()),
        }
    }
}
