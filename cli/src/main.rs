#![deny(unsafe_code)]

use std::error::Error;
use std::ffi::OsString;
use std::fmt::{self, Display, Formatter};
use std::fs::OpenOptions;
use std::io::Read;

use clap::Parser;
use tracing::{event, span, Level};
use tracing_subscriber::prelude::*;

use base::prelude::*;
use cpu::{CpuConfiguration, CpuModel, Machine, StopKind};

const ABOUT: &str = "Simulate the HP 2100 and HP 1000 M/E/F-Series computers";

/// Parse an octal number, with or without a leading 0.
fn parse_octal(s: &str) -> Result<u16, String> {
    u16::from_str_radix(s, 8).map_err(|e| format!("'{s}' is not an octal number: {e}"))
}

fn parse_address(s: &str) -> Result<LogicalAddress, String> {
    let n = parse_octal(s)?;
    LogicalAddress::try_from(n).map_err(|e| format!("{s} is not a logical address: {e}"))
}

fn parse_model(s: &str) -> Result<CpuModel, String> {
    CpuModel::try_from(s).map_err(|e| e.to_string())
}

fn parse_stop_kind(s: &str) -> Result<StopKind, String> {
    StopKind::try_from(s).map_err(|e| e.to_string())
}

/// Load a memory image and run it on a simulated HP 2100 or HP 1000.
#[derive(Parser, Debug)]
#[clap(version, about = ABOUT, long_about = None)]
struct Cli {
    /// Memory image: a sequence of big-endian 16-bit words.
    image: OsString,

    /// CPU model: 2100, 1000-M, 1000-E or 1000-F.
    #[clap(long, value_parser = parse_model, default_value = "1000-E")]
    model: CpuModel,

    /// Memory size in K (1024-word) units; defaults to 32.
    #[clap(long)]
    memory: Option<u32>,

    /// Maximum length of an indirect address chain.
    #[clap(long)]
    indirect_limit: Option<u32>,

    /// Stop kinds which should not stop the simulation (BREAK,
    /// UNIMPL, UNDEF, UNSC, IOERR, INDIR).
    #[clap(long = "no-stop", value_parser = parse_stop_kind)]
    no_stop: Vec<StopKind>,

    /// Physical address (octal) at which the image is loaded.
    #[clap(long, value_parser = parse_octal, default_value = "0")]
    origin: u16,

    /// Starting value (octal) of the program counter.
    #[clap(long, value_parser = parse_address, default_value = "100")]
    start: LogicalAddress,

    /// Initial value (octal) of the switch register.
    #[clap(long, value_parser = parse_octal, default_value = "0")]
    switches: u16,

    /// Breakpoint addresses (octal).
    #[clap(long = "break", value_parser = parse_address)]
    breakpoints: Vec<LogicalAddress>,

    /// Stop after this many instructions rather than running until
    /// a stop occurs.
    #[clap(long)]
    max_instructions: Option<u64>,
}

#[derive(Debug)]
enum Fail {
    ReadFailed(String),
    OddLength(usize),
    Setup(String),
}

impl Display for Fail {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Fail::ReadFailed(message) | Fail::Setup(message) => f.write_str(message),
            Fail::OddLength(len) => write!(
                f,
                "image file length {len} should be a multiple of 2 bytes"
            ),
        }
    }
}

impl Error for Fail {}

fn read_image(name: &OsString) -> Result<Vec<u16>, Fail> {
    let mut file = OpenOptions::new()
        .read(true)
        .open(name)
        .map_err(|e| Fail::ReadFailed(format!("failed to open {}: {e}", name.to_string_lossy())))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| Fail::ReadFailed(format!("failed to read {}: {e}", name.to_string_lossy())))?;
    if bytes.len() % 2 != 0 {
        return Err(Fail::OddLength(bytes.len()));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect())
}

fn configure(cli: &Cli) -> CpuConfiguration {
    let mut config = CpuConfiguration::new(cli.model);
    if let Some(k) = cli.memory {
        config.memory_words = k.saturating_mul(PAGE_SIZE);
    }
    if let Some(limit) = cli.indirect_limit {
        config.indirect_limit = limit;
    }
    config
}

fn report(machine: &Machine) {
    let regs = machine.registers();
    println!(
        "P={} A={:06o} B={:06o} X={:06o} Y={:06o} E={} O={} S={:06o}",
        regs.p,
        regs.a,
        regs.b,
        regs.x,
        regs.y,
        u8::from(regs.e),
        u8::from(regs.o),
        regs.s
    );
    println!(
        "{} instructions executed in {:?} of simulated time",
        machine.instructions_executed(),
        machine.now()
    );
    for status in machine.stop_statuses() {
        if status.occurrences > 0 {
            println!(
                "{} ({}) occurred {} times{}: {}",
                status.name,
                status.code,
                status.occurrences,
                if status.enabled { "" } else { " while disabled" },
                status.last_message
            );
        }
    }
}

fn run_simulator() -> Result<i32, Box<dyn Error>> {
    let cli = Cli::parse();

    // See
    // https://docs.rs/tracing-subscriber/latest/tracing_subscriber/fmt/index.html#filtering-events-with-environment-variables
    // for instructions on how to select which trace messages get
    // printed.
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info"))?;
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    let span = span!(Level::INFO, "hp21xx", model = %cli.model);
    let _enter = span.enter();

    let image = read_image(&cli.image)?;
    let mut machine = Machine::new(configure(&cli))?;
    for kind in cli.no_stop.iter() {
        machine
            .set_stop_enabled(*kind, false)
            .map_err(|e| Fail::Setup(e.to_string()))?;
    }
    for addr in cli.breakpoints.iter() {
        machine.set_breakpoint(*addr);
    }
    for (sc, name) in machine.attached_devices() {
        event!(Level::DEBUG, "select code {sc}: {name}");
    }
    machine
        .load_physical(u32::from(cli.origin), &image)
        .map_err(|e| Fail::Setup(e.to_string()))?;
    event!(
        Level::INFO,
        "loaded {} words at {:06o}",
        image.len(),
        cli.origin
    );
    {
        let regs = machine.registers_mut();
        regs.p = cli.start;
        regs.s = cli.switches;
    }

    let outcome = match cli.max_instructions {
        Some(count) => machine.step(count),
        None => Err(machine.run()),
    };
    let status = match outcome {
        Ok(()) => {
            println!("instruction limit reached");
            0
        }
        Err(stop) => {
            println!("stopped: {stop}");
            match stop.kind() {
                StopKind::Halt => 0,
                _ => 1,
            }
        }
    };
    report(&machine);
    Ok(status)
}

fn main() {
    match run_simulator() {
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
        Ok(status) => {
            std::process::exit(status);
        }
    }
}
