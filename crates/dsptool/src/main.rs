use clap::{Args as ClapArgs, Parser, Subcommand};
use eyre_pretty::{Context, Result, bail};
use mcpx_dsp::{Config, Dsp, Peripherals, regs::Reg};
use std::path::PathBuf;

/// Peripheral handler that logs every access and reads zeros.
struct LoggingPeripherals;

impl Peripherals for LoggingPeripherals {
    fn read(&mut self, addr: u32) -> u32 {
        tracing::info!("peripheral read X:{addr:06X}");
        0
    }

    fn write(&mut self, addr: u32, value: u32) {
        tracing::info!("peripheral write X:{addr:06X} <- {value:06X}");
    }
}

#[derive(Debug, ClapArgs)]
struct Image {
    /// Path to a raw scratch memory image
    image: PathBuf,
    /// Bytes bootstrapped from the start of scratch
    #[arg(long, default_value_t = 0x2000)]
    bootstrap_len: u32,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Bootstrap a scratch image and run it.
    Run {
        #[command(flatten)]
        image: Image,
        /// Cycles to run for
        #[arg(short, long, default_value_t = 100_000)]
        cycles: u32,
        /// Log accesses to peripherals the core does not implement
        #[arg(long, default_value_t = false)]
        peripherals: bool,
        /// Keep running after the program signals it is idle
        #[arg(long, default_value_t = false)]
        ignore_idle: bool,
    },
    /// Bootstrap a scratch image and show the instructions from the reset vector.
    Step {
        #[command(flatten)]
        image: Image,
        /// Instructions to show
        #[arg(short = 'n', long, default_value_t = 16)]
        count: u32,
    },
}

/// A CLI to run programs on the MCPX audio DSP.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Action to take
    #[command(subcommand)]
    command: Command,
}

fn setup_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or(EnvFilter::new("dsptool=info,mcpx_dsp=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn load(image: &Image, stop_on_idle: bool) -> Result<Dsp> {
    let scratch = std::fs::read(&image.image).context("reading scratch image")?;
    if scratch.len() < image.bootstrap_len as usize {
        bail!(
            "scratch image is {:#X} bytes, smaller than the {:#X} byte boot image",
            scratch.len(),
            image.bootstrap_len
        );
    }

    let config = Config {
        bootstrap_len: image.bootstrap_len,
        stop_on_idle,
    };

    let mut dsp = Dsp::new(config, Box::new(scratch));
    dsp.bootstrap().context("bootstrapping")?;

    Ok(dsp)
}

fn run(image: &Image, cycles: u32, peripherals: bool, ignore_idle: bool) -> Result<()> {
    let mut dsp = load(image, !ignore_idle)?;
    if peripherals {
        dsp = dsp.with_peripherals(Box::new(LoggingPeripherals));
    }

    dsp.run(cycles).context("running")?;

    let core = dsp.core();
    let regs = &core.regs;
    println!("PC      {:06X}", core.pc);
    println!("cycles  {}", dsp.cycles());
    println!("instrs  {}", core.instr_count);
    println!("idle    {}", dsp.idle());
    println!(
        "A       {:02X}:{:06X}:{:06X}",
        regs.get(Reg::A2),
        regs.get(Reg::A1),
        regs.get(Reg::A0)
    );
    println!(
        "B       {:02X}:{:06X}:{:06X}",
        regs.get(Reg::B2),
        regs.get(Reg::B1),
        regs.get(Reg::B0)
    );
    println!("SR      {:04X}", regs.get(Reg::Sr));
    println!("SP      {:02X}", regs.get(Reg::Sp));
    println!(
        "DMA     control {:06X} next {:06X} start {:06X} eol {}",
        core.dma.control.to_bits(),
        core.dma.next_block,
        core.dma.start_block,
        core.dma.eol
    );

    Ok(())
}

fn step(image: &Image, count: u32) -> Result<()> {
    let dsp = load(image, true)?;

    let mut addr = dsp.core().pc;
    for _ in 0..count {
        let detached = dsp.step_detached(addr).context("stepping")?;
        println!(
            "{addr:06X}  {:06X}  {:<32} {:>2} cycles  -> {:06X}",
            detached.word,
            format!("{:?}", detached.decoded),
            detached.cycles,
            detached.next
        );

        addr = detached.next;
    }

    Ok(())
}

fn main() -> Result<()> {
    eyre_pretty::install()?;
    setup_tracing();

    let args = Args::parse();
    match args.command {
        Command::Run {
            image,
            cycles,
            peripherals,
            ignore_idle,
        } => run(&image, cycles, peripherals, ignore_idle),
        Command::Step { image, count } => step(&image, count),
    }
}
