mod dto;

use std::{fmt, process::ExitCode, time::Duration};

use clap::{ArgAction, ArgMatches, CommandFactory, FromArgMatches, Parser, ValueEnum};
use hidapi::HidApi;
#[cfg(feature = "rusb")]
use lbe_142x_driver::interface::LbeRusbInterface;
use lbe_142x_driver::{
    consts::MAX_FREQUENCY, interface::LbeHidApiInterface, Command, LbeDevice, LbeError,
    LockMode, Model, Persistence, PowerLevel, StatusReport, UsbInterface,
};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use crate::dto::{mode_name, StatusResponse};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Transport {
    /// HID feature reports through hidapi
    Hidraw,

    /// HID class control transfers through libusb
    Usb,
}

impl Default for Transport {
    fn default() -> Self {
        if cfg!(all(target_os = "windows", feature = "rusb")) {
            Transport::Usb
        } else {
            Transport::Hidraw
        }
    }
}

// Operation flags keep their raw values so a bad value is reported when its turn
// comes instead of rejecting the whole command line.
#[derive(Parser, Debug)]
#[command(version, about = "Leo Bodnar LBE-142x GPS locked clock source configuration")]
struct Args {
    #[arg(long, value_name = "HZ", action = ArgAction::Append, allow_hyphen_values = true, help = "Set frequency for output 1 and save to flash")]
    f1: Vec<String>,

    #[arg(long, value_name = "HZ", action = ArgAction::Append, allow_hyphen_values = true, help = "Set temporary frequency for output 1")]
    f1t: Vec<String>,

    #[arg(long, value_name = "HZ", action = ArgAction::Append, allow_hyphen_values = true, help = "Set frequency for output 2 and save to flash (LBE-1421 only)")]
    f2: Vec<String>,

    #[arg(long, value_name = "HZ", action = ArgAction::Append, allow_hyphen_values = true, help = "Set temporary frequency for output 2 (LBE-1421 only)")]
    f2t: Vec<String>,

    #[arg(long, value_name = "0|1", action = ArgAction::Append, allow_hyphen_values = true, help = "Enable or disable outputs")]
    out: Vec<String>,

    #[arg(long, value_name = "0|1", action = ArgAction::Append, allow_hyphen_values = true, help = "Set PLL(0) or FLL(1) mode")]
    pll: Vec<String>,

    #[arg(long, value_name = "0|1", action = ArgAction::Append, allow_hyphen_values = true, help = "Enable or disable 1PPS on OUT1 (LBE-1421 only)")]
    pps: Vec<String>,

    #[arg(long, value_name = "0|1", action = ArgAction::Append, allow_hyphen_values = true, help = "Set OUT1 power level: normal(0) or low(1)")]
    pwr1: Vec<String>,

    #[arg(long, value_name = "0|1", action = ArgAction::Append, allow_hyphen_values = true, help = "Set OUT2 power level: normal(0) or low(1) (LBE-1421 only)")]
    pwr2: Vec<String>,

    #[arg(long, help = "Blink output LED(s) for 3 seconds")]
    blink: bool,

    #[arg(long, help = "Display current device status")]
    status: bool,

    #[arg(long, requires = "status", help = "Print the status in JSON format")]
    json: bool,

    #[arg(
        long,
        help = "Serial number of the LBE-142x to use, if not specified the first one found is used"
    )]
    serial_number: Option<String>,

    #[arg(long, value_enum, default_value_t = Transport::default(), help = "How feature reports reach the device")]
    transport: Transport,

    #[arg(long, value_parser = humantime::parse_duration, help = "Timeout for each USB control transfer (usb transport only)")]
    timeout: Option<Duration>,

    #[arg(short, long, action = ArgAction::Count, help = "Increase log verbosity")]
    verbose: u8,
}

/// An operation flag as it appeared on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flag {
    F1,
    F1t,
    F2,
    F2t,
    Out,
    Pll,
    Pps,
    Pwr1,
    Pwr2,
    Blink,
    Status,
}

impl Flag {
    fn id(self) -> &'static str {
        match self {
            Flag::F1 => "f1",
            Flag::F1t => "f1t",
            Flag::F2 => "f2",
            Flag::F2t => "f2t",
            Flag::Out => "out",
            Flag::Pll => "pll",
            Flag::Pps => "pps",
            Flag::Pwr1 => "pwr1",
            Flag::Pwr2 => "pwr2",
            Flag::Blink => "blink",
            Flag::Status => "status",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Request {
    flag: Flag,
    value: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Operation {
    Send(Command),
    Status,
}

impl Request {
    fn operation(&self) -> Result<Operation, String> {
        let value = self.value.as_deref().unwrap_or_default();

        let command = match self.flag {
            Flag::F1 => frequency_command(1, Persistence::Committed, value)?,
            Flag::F1t => frequency_command(1, Persistence::Temporary, value)?,
            Flag::F2 => frequency_command(2, Persistence::Committed, value)?,
            Flag::F2t => frequency_command(2, Persistence::Temporary, value)?,
            Flag::Out => Command::SetOutputsEnabled(switch("output state", value)?),
            Flag::Pll => Command::SetPllMode(if switch("PLL/FLL mode", value)? {
                LockMode::Fll
            } else {
                LockMode::Pll
            }),
            Flag::Pps => Command::SetPps(switch("1PPS state", value)?),
            Flag::Pwr1 => power_command(1, value)?,
            Flag::Pwr2 => power_command(2, value)?,
            Flag::Blink => Command::BlinkLeds,
            Flag::Status => return Ok(Operation::Status),
        };

        Ok(Operation::Send(command))
    }
}

fn switch(name: &str, value: &str) -> Result<bool, String> {
    match value {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(format!("Invalid {name}: {value} (use 0 or 1)")),
    }
}

fn frequency_command(output: u8, persistence: Persistence, value: &str) -> Result<Command, String> {
    let frequency = value.parse().map_err(|_| {
        format!("Invalid OUT{output} frequency: {value} (range: 1-{MAX_FREQUENCY} Hz)")
    })?;

    Ok(Command::SetFrequency {
        output,
        frequency,
        persistence,
    })
}

fn power_command(output: u8, value: &str) -> Result<Command, String> {
    let level = if switch(&format!("OUT{output} power level"), value)? {
        PowerLevel::Low
    } else {
        PowerLevel::Normal
    };

    Ok(Command::SetPowerLevel { output, level })
}

impl Args {
    /// Every operation flag in the order it was given on the command line.
    fn requests(&self, matches: &ArgMatches) -> Vec<Request> {
        let valued: [(Flag, &[String]); 9] = [
            (Flag::F1, self.f1.as_slice()),
            (Flag::F1t, self.f1t.as_slice()),
            (Flag::F2, self.f2.as_slice()),
            (Flag::F2t, self.f2t.as_slice()),
            (Flag::Out, self.out.as_slice()),
            (Flag::Pll, self.pll.as_slice()),
            (Flag::Pps, self.pps.as_slice()),
            (Flag::Pwr1, self.pwr1.as_slice()),
            (Flag::Pwr2, self.pwr2.as_slice()),
        ];

        let mut requests = Vec::new();

        for (flag, values) in valued {
            let indices = matches.indices_of(flag.id()).into_iter().flatten();
            requests.extend(indices.zip(values).map(|(index, value)| {
                let request = Request {
                    flag,
                    value: Some(value.clone()),
                };
                (index, request)
            }));
        }

        for (flag, set) in [(Flag::Blink, self.blink), (Flag::Status, self.status)] {
            if let Some(index) = matches.index_of(flag.id()).filter(|_| set) {
                requests.push((index, Request { flag, value: None }));
            }
        }

        requests.sort_by_key(|(index, _)| *index);
        requests.into_iter().map(|(_, request)| request).collect()
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_writer(std::io::stderr)
        .init();
}

fn describe(command: &Command) -> String {
    match *command {
        Command::SetFrequency {
            output,
            frequency,
            persistence: Persistence::Committed,
        } => format!("Setting OUT{output} frequency and saving to flash: {frequency} Hz"),
        Command::SetFrequency {
            output,
            frequency,
            persistence: Persistence::Temporary,
        } => format!("Setting OUT{output} temporary frequency: {frequency} Hz"),
        Command::SetOutputsEnabled(enabled) => {
            format!("Set output(s) to {}", enabled_name(enabled))
        }
        Command::SetPllMode(mode) => format!("Set {} mode", mode_name(mode)),
        Command::SetPps(enabled) => format!("Set 1PPS on OUT1 to {}", enabled_name(enabled)),
        Command::SetPowerLevel { output, level } => format!(
            "Set OUT{output} power to {}",
            power_name(level == PowerLevel::Low).to_lowercase()
        ),
        Command::BlinkLeds => "Blink LED(s)".to_owned(),
    }
}

/// Remembers whether any requested change reached the device.
#[derive(Default)]
struct ChangeTracker {
    changed: bool,
}

impl ChangeTracker {
    fn send<Interface: UsbInterface>(&mut self, device: &LbeDevice<Interface>, command: &Command)
    where
        Interface::InterfaceError: fmt::Display,
    {
        let description = describe(command);

        match device.send(command) {
            Ok(()) => {
                println!("  {description}");
                self.changed = true;
            }
            Err(error) => {
                debug!(%error, "{description} failed");
                eprintln!("{description} failed: {error}");
            }
        }
    }
}

fn show_status<Interface: UsbInterface>(device: &LbeDevice<Interface>, json: bool)
where
    Interface::InterfaceError: fmt::Display,
{
    match device.status() {
        Ok(status) if json => match serde_json::to_string_pretty(&StatusResponse::from(&status)) {
            Ok(json) => println!("{json}"),
            Err(error) => eprintln!("failed to serialize status: {error}"),
        },
        Ok(status) => print_status(&status),
        Err(error) => {
            error!(%error, "status request failed");
            eprintln!("Failed to read device status: {error}");
        }
    }
}

fn print_status(status: &StatusReport) {
    println!("Device Status (0x{:02X}):", status.raw_status());
    println!("  GPS Lock: {}", yes_no(status.gps_locked()));
    println!("  PLL Lock: {}", yes_no(status.pll_locked()));
    println!(
        "  Antenna: {}",
        if status.antenna_ok() {
            "OK"
        } else {
            "Short Circuit"
        }
    );
    println!("  Output(s) Enabled: {}", yes_no(status.outputs_enabled()));
    println!("  OUT1 Frequency: {} Hz", status.frequency1());
    println!("  OUT1 Power Level: {}", power_name(status.out1_power_low()));

    if status.model() == Model::Lbe1421DualOutput {
        println!("  OUT2 Frequency: {} Hz", status.frequency2());
        println!("  OUT2 Power Level: {}", power_name(status.out2_power_low()));
        println!("  1PPS on OUT1: {}", enabled_name(status.pps_enabled()));
    }

    println!("  {} mode enabled", mode_name(status.lock_mode()));
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

fn enabled_name(enabled: bool) -> &'static str {
    if enabled {
        "enabled"
    } else {
        "disabled"
    }
}

fn power_name(low: bool) -> &'static str {
    if low {
        "Low"
    } else {
        "Normal"
    }
}

fn run<Interface: UsbInterface>(
    mut device: LbeDevice<Interface>,
    args: &Args,
    requests: &[Request],
) -> ExitCode
where
    Interface::InterfaceError: fmt::Display,
{
    if requests.is_empty() {
        if let Err(error) = Args::command().print_help() {
            eprintln!("failed to print usage: {error}");
        }
        device.close();
        return ExitCode::FAILURE;
    }

    println!("Connected to {}", device.model());

    match device.serial_number() {
        Ok(serial_number) => debug!(
            "using device with serial number {}",
            serial_number.unwrap_or_else(|| "unknown".to_owned())
        ),
        Err(error) => debug!(%error, "could not read serial number"),
    }

    let mut tracker = ChangeTracker::default();

    for request in requests {
        match request.operation() {
            Ok(Operation::Send(command)) => tracker.send(&device, &command),
            Ok(Operation::Status) => show_status(&device, args.json),
            Err(message) => eprintln!("{message}"),
        }
    }

    if !tracker.changed {
        println!("No changes made");
    }

    device.close();

    ExitCode::SUCCESS
}

/// Help and version requests exit cleanly, anything else clap rejects is a usage error.
fn usage_exit_code(error: &clap::Error) -> u8 {
    if error.use_stderr() {
        1
    } else {
        0
    }
}

fn usage_error(error: clap::Error) -> ExitCode {
    if let Err(print_error) = error.print() {
        eprintln!("failed to print usage: {print_error}");
    }

    ExitCode::from(usage_exit_code(&error))
}

fn main() -> ExitCode {
    let matches = match Args::command().try_get_matches() {
        Ok(matches) => matches,
        Err(error) => return usage_error(error),
    };
    let args = match Args::from_arg_matches(&matches) {
        Ok(args) => args,
        Err(error) => return usage_error(error),
    };
    let requests = args.requests(&matches);

    init_tracing(args.verbose);

    println!(
        "lbe-142x v{} Leo Bodnar LBE-142x GPS locked clock source config",
        env!("CARGO_PKG_VERSION")
    );

    let serial_number = args.serial_number.as_deref();

    match args.transport {
        Transport::Hidraw => {
            let hid_api = match HidApi::new() {
                Ok(hid_api) => hid_api,
                Err(error) => {
                    eprintln!("Failed to create hidapi context: {error}");
                    return ExitCode::FAILURE;
                }
            };

            match LbeHidApiInterface::open(&hid_api, serial_number) {
                Ok((interface, model)) => run(LbeDevice::new(interface, model), &args, &requests),
                Err(error) => open_failed(error),
            }
        }

        Transport::Usb => run_usb(&args, &requests),
    }
}

#[cfg(feature = "rusb")]
fn run_usb(args: &Args, requests: &[Request]) -> ExitCode {
    match LbeRusbInterface::open(args.serial_number.as_deref(), args.timeout) {
        Ok((interface, model)) => run(LbeDevice::new(interface, model), args, requests),
        Err(error) => open_failed(error),
    }
}

#[cfg(not(feature = "rusb"))]
fn run_usb(_args: &Args, _requests: &[Request]) -> ExitCode {
    eprintln!("The usb transport is not available, lbe-142x was built without the \"rusb\" feature");

    ExitCode::FAILURE
}

fn open_failed<E: fmt::Display>(error: LbeError<E>) -> ExitCode {
    eprintln!("Failed to open LBE-142x device: {error}");

    ExitCode::FAILURE
}
