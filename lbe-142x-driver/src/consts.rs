use std::time::Duration;

// USB Vendor Identifier for Leo Bodnar
pub const VID_LEO_BODNAR: u16 = 0x1dd2;

// USB Product Identifier for the LBE-1420 (single output)
pub const PID_LBE_1420: u16 = 0x2443;

// USB Product Identifier for the LBE-1421 (dual output)
pub const PID_LBE_1421: u16 = 0x2444;

/// Report number used to request the device status, and prefixed to every
/// report sent over USB control transfers.
pub const STATUS_REPORT_ID: u8 = 0x4B;

/// Highest frequency either model can synthesise, in Hz.
pub const MAX_FREQUENCY: u32 = 1_400_000_000;

/// Upper bound for a single control transfer.
pub const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_secs(5);

pub const GPS_LOCK_BIT: u8 = 1 << 0;
pub const PLL_LOCK_BIT: u8 = 1 << 1;
pub const ANTENNA_OK_BIT: u8 = 1 << 2;
pub const PPS_ENABLED_BIT: u8 = 1 << 7;

// Bits 3 and 4 mirror the LED1/LED2 state, bits 5 and 6 the OUT1/OUT2 enables.
/// Every bit below the 1PPS bit is set when the outputs are running.
pub const OUTPUTS_ENABLED_MASK: u8 = 0x7F;

// Commands understood by both models
pub const CMD_ENABLE_OUTPUTS: u8 = 0x01;
pub const CMD_BLINK_LEDS: u8 = 0x02;

// LBE-1420
pub const CMD_1420_SET_F1_TEMP: u8 = 0x03;
pub const CMD_1420_SET_F1: u8 = 0x04;
pub const CMD_1420_SET_POWER1: u8 = 0x07;
pub const CMD_1420_SET_FLL: u8 = 0x0B;

// LBE-1421
pub const CMD_1421_SET_F1_TEMP: u8 = 0x05;
pub const CMD_1421_SET_F1: u8 = 0x06;
pub const CMD_1421_SET_F2_TEMP: u8 = 0x09;
pub const CMD_1421_SET_F2: u8 = 0x0A;
pub const CMD_1421_SET_PLL: u8 = 0x0B;
pub const CMD_1421_SET_PPS: u8 = 0x0C;
pub const CMD_1421_SET_POWER1: u8 = 0x0D;
pub const CMD_1421_SET_POWER2: u8 = 0x0E;

// Payload for the enable command: one bit per output
pub const OUTPUT_MASK_SINGLE: u8 = 0x01;
pub const OUTPUT_MASK_DUAL: u8 = 0x03;
