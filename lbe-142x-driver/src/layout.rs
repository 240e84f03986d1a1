use crate::{consts::STATUS_REPORT_ID, model::Model};

/// Size of the largest report any transport exchanges.
pub const MAX_REPORT_SIZE: usize = 64;

/// Byte positions used for one model within a report layout.
#[derive(Debug, PartialEq, Eq)]
pub struct ModelOffsets {
    /// Start of the little-endian frequency written by the set-frequency commands
    pub frequency_payload: usize,

    /// Start of the OUT1 frequency in the status response
    pub frequency1: usize,

    /// Start of the OUT2 frequency in the status response, dual output only
    pub frequency2: Option<usize>,

    /// Nonzero when the device runs in FLL mode
    pub mode: usize,

    /// Nonzero when the matching output runs at low power. `None` where the
    /// response carries no such field.
    pub power_low: [Option<usize>; 2],
}

/// Where the fields of a feature report live for one transport.
///
/// HID raw on Linux takes the command byte as the report number, while USB
/// control transfers prefix every report with [`STATUS_REPORT_ID`], which
/// shifts most fields along by one byte.
#[derive(Debug, PartialEq, Eq)]
pub struct ReportLayout {
    pub name: &'static str,

    /// Total number of bytes exchanged per report
    pub report_size: usize,

    /// Leading report id written at offset 0 of every outgoing report
    pub report_id: Option<u8>,

    pub command: usize,

    /// The single byte argument of the enable/mode/1PPS/power commands
    pub payload: usize,

    /// Raw status bits in the status response
    pub status: usize,

    pub single_output: ModelOffsets,
    pub dual_output: ModelOffsets,
}

impl ReportLayout {
    pub fn offsets(&self, model: Model) -> &ModelOffsets {
        match model {
            Model::Lbe1420 => &self.single_output,
            Model::Lbe1421DualOutput => &self.dual_output,
        }
    }
}

/// Reports exchanged through hidraw, where the command doubles as report number.
pub static HIDRAW: ReportLayout = ReportLayout {
    name: "hidraw",
    report_size: 60,
    report_id: None,
    command: 0,
    payload: 1,
    status: 1,
    single_output: ModelOffsets {
        frequency_payload: 1,
        frequency1: 6,
        frequency2: None,
        mode: 18,
        power_low: [Some(10), None],
    },
    dual_output: ModelOffsets {
        frequency_payload: 5,
        frequency1: 6,
        frequency2: Some(14),
        mode: 18,
        power_low: [Some(19), Some(20)],
    },
};

/// Reports exchanged through class-specific USB control transfers.
pub static CONTROL_TRANSFER: ReportLayout = ReportLayout {
    name: "control-transfer",
    report_size: 64,
    report_id: Some(STATUS_REPORT_ID),
    command: 1,
    payload: 2,
    status: 2,
    single_output: ModelOffsets {
        frequency_payload: 2,
        frequency1: 6,
        frequency2: None,
        mode: 19,
        // The single output model does not report its power level here
        power_low: [None, None],
    },
    dual_output: ModelOffsets {
        frequency_payload: 6,
        frequency1: 7,
        frequency2: Some(15),
        mode: 19,
        power_low: [Some(20), Some(21)],
    },
};

#[cfg(test)]
mod test {
    use super::{ReportLayout, CONTROL_TRANSFER, HIDRAW, MAX_REPORT_SIZE};
    use crate::model::Model;

    fn fields_fit(layout: &ReportLayout) {
        assert!(layout.report_size <= MAX_REPORT_SIZE);

        for model in [Model::Lbe1420, Model::Lbe1421DualOutput] {
            let offsets = layout.offsets(model);

            assert!(offsets.frequency_payload + 4 <= layout.report_size);
            assert!(offsets.frequency1 + 4 <= layout.report_size);
            assert!(offsets.frequency2.map_or(true, |o| o + 4 <= layout.report_size));
            assert!(offsets.mode < layout.report_size);
            assert!(offsets
                .power_low
                .iter()
                .flatten()
                .all(|&o| o < layout.report_size));

            // The frequency payload never overlaps the command byte
            assert!(offsets.frequency_payload > layout.command);
        }
    }

    #[test]
    fn hidraw_fields_fit_inside_report() {
        fields_fit(&HIDRAW);
    }

    #[test]
    fn control_transfer_fields_fit_inside_report() {
        fields_fit(&CONTROL_TRANSFER);
    }

    #[test]
    fn control_transfer_shifts_command_past_report_id() {
        assert_eq!(HIDRAW.report_id, None);
        assert_eq!(CONTROL_TRANSFER.report_id, Some(0x4B));
        assert_eq!(CONTROL_TRANSFER.command, HIDRAW.command + 1);
        assert_eq!(CONTROL_TRANSFER.payload, HIDRAW.payload + 1);
        assert_eq!(
            CONTROL_TRANSFER.dual_output.frequency_payload,
            HIDRAW.dual_output.frequency_payload + 1
        );
    }

    #[test]
    fn dual_output_offsets_only_exist_for_dual_model() {
        for layout in [&HIDRAW, &CONTROL_TRANSFER] {
            assert!(layout.offsets(Model::Lbe1420).frequency2.is_none());
            assert!(layout.offsets(Model::Lbe1420).power_low[1].is_none());
            assert!(layout.offsets(Model::Lbe1421DualOutput).frequency2.is_some());
        }
    }
}
