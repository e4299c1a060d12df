//! Command line front end for building boot disks

use anyhow::{bail, Context, Result};
use bootdisk::cache::CacheWarmScheduler;
use bootdisk::config::{CompressionSettings, Environment, Manifest};
use bootdisk::io::write_atomic;
use bootdisk::{render_layout_map, BootstrapEncoder, DiskImageAssembler, FileTable};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::fs::{self, OpenOptions};
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "bootdisk", version, about = "Assemble self-booting ADFS L disk images")]
struct Cli {
    /// More output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build the disk image and table of contents
    Build(BuildArgs),
    /// Generate the file index constants source
    Constants(ConstantsArgs),
    /// Encode a machine code program as *EXEC text
    Encode(EncodeArgs),
    /// Compress one file through the cache
    Compress(CompressArgs),
    /// Compress every uncached file of a manifest in parallel
    Warm(WarmArgs),
}

#[derive(Debug, Args)]
struct ManifestArg {
    /// Build manifest
    #[arg(short, long, value_name = "FILE", default_value = "bootdisk.toml")]
    manifest: PathBuf,
}

#[derive(Debug, Args)]
struct CompressionArgs {
    /// Compressor executable (overrides BOOTDISK_COMPRESSOR)
    #[arg(long, value_name = "FILE")]
    compressor: Option<PathBuf>,

    /// Cache directory (overrides BOOTDISK_CACHE)
    #[arg(long, value_name = "DIR")]
    cache: Option<PathBuf>,

    /// Parallel compression jobs
    #[arg(short, long)]
    jobs: Option<usize>,
}

#[derive(Debug, Args)]
struct BuildArgs {
    #[command(flatten)]
    manifest: ManifestArg,

    #[command(flatten)]
    compression: CompressionArgs,

    /// Bootstrap program, a .prg with 2-byte load address
    #[arg(long, value_name = "FILE")]
    bootstrap: Option<PathBuf>,

    /// Loader for side 1 track 0
    #[arg(long, value_name = "FILE")]
    loader: Option<PathBuf>,

    /// Hide the bootstrap's loading text with VDU21
    #[arg(long)]
    hidden: bool,

    /// Write the disk image to FILE
    #[arg(long, value_name = "FILE")]
    output_image: Option<PathBuf>,

    /// Write the TOC as JSON to FILE
    #[arg(long, value_name = "FILE")]
    output_toc: Option<PathBuf>,

    /// Write the packed binary TOC to FILE
    #[arg(long, value_name = "FILE")]
    output_packed_toc: Option<PathBuf>,

    /// Skip the parallel cache warm before building
    #[arg(long)]
    no_warm: bool,

    /// Print a map of the layout
    #[arg(long)]
    map: bool,
}

#[derive(Debug, Args)]
struct ConstantsArgs {
    #[command(flatten)]
    manifest: ManifestArg,

    /// Write output to FILE rather than stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct EncodeArgs {
    /// Input program, a .prg with 2-byte load address
    input: PathBuf,

    /// Write output to FILE rather than stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Add a VDU21 to hide the loading text
    #[arg(long)]
    hidden: bool,

    /// Append to the output file rather than replacing it
    #[arg(long, requires = "output")]
    append: bool,
}

#[derive(Debug, Args)]
struct CompressArgs {
    /// File to compress
    input: PathBuf,

    /// Where to write the compressed data
    output: PathBuf,

    #[command(flatten)]
    compression: CompressionArgs,
}

#[derive(Debug, Args)]
struct WarmArgs {
    #[command(flatten)]
    manifest: ManifestArg,

    #[command(flatten)]
    compression: CompressionArgs,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("FATAL: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };

    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| format!("bootdisk={level}"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Build(args) => cmd_build(args),
        Command::Constants(args) => cmd_constants(args),
        Command::Encode(args) => cmd_encode(args),
        Command::Compress(args) => cmd_compress(args),
        Command::Warm(args) => cmd_warm(args),
    }
}

fn compression_settings(manifest: &Manifest, args: &CompressionArgs) -> Result<CompressionSettings> {
    let mut section = manifest.compression.clone();
    if args.jobs.is_some() {
        section.jobs = args.jobs;
    }

    let mut settings = CompressionSettings::resolve(&section, &Environment::capture())?;
    if let Some(compressor) = &args.compressor {
        settings.compressor = compressor.clone();
    }
    if let Some(cache) = &args.cache {
        settings.cache_dir = cache.clone();
    }
    Ok(settings)
}

fn read_input(path: &Path, what: &str) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("reading {what} {}", path.display()))
}

fn cmd_build(args: BuildArgs) -> Result<()> {
    let mut manifest = Manifest::load(&args.manifest.manifest)?;
    if args.bootstrap.is_some() {
        manifest.build.bootstrap = args.bootstrap.clone();
    }
    if args.loader.is_some() {
        manifest.build.loader = args.loader.clone();
    }

    let mut outputs = manifest.output_paths();
    if args.output_image.is_some() {
        outputs.image = args.output_image.clone();
    }
    if args.output_toc.is_some() {
        outputs.toc_json = args.output_toc.clone();
    }
    if args.output_packed_toc.is_some() {
        outputs.toc_packed = args.output_packed_toc.clone();
    }

    let Some(bootstrap_path) = manifest.build.bootstrap.as_deref() else {
        bail!("no bootstrap program given (--bootstrap or [build] bootstrap)");
    };
    let bootstrap = read_input(bootstrap_path, "bootstrap")?;
    let loader = match manifest.build.loader.as_deref() {
        Some(path) => read_input(path, "loader")?,
        None => Vec::new(),
    };

    let files = manifest.file_list()?;
    let settings = compression_settings(&manifest, &args.compression)?;
    let cache = settings.cache();

    if !args.no_warm {
        let runner = settings.runner();
        CacheWarmScheduler::new(&cache, runner.as_ref()).warm(&files)?;
    }

    let output = DiskImageAssembler::new()
        .bootstrap(bootstrap)
        .loader(loader)
        .hidden(args.hidden || manifest.build.hidden)
        .assemble(&FileTable::new(files), &cache)?;

    if outputs.is_empty() {
        tracing::warn!("no outputs requested; nothing written");
    }
    output.write(&outputs)?;

    if args.map {
        print!("{}", render_layout_map(&output.layout, io::stdout().is_terminal()));
    }
    Ok(())
}

fn cmd_constants(args: ConstantsArgs) -> Result<()> {
    let manifest = Manifest::load(&args.manifest.manifest)?;
    let source = manifest.file_list()?.constants_source();

    match args.output {
        Some(path) => write_atomic(&path, source.as_bytes())?,
        None => print!("{source}"),
    }
    Ok(())
}

fn cmd_encode(args: EncodeArgs) -> Result<()> {
    let data = read_input(&args.input, "program")?;
    let encoded = BootstrapEncoder::new().hidden(args.hidden).encode(&data)?;

    match args.output {
        Some(path) if args.append => {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("opening {}", path.display()))?;
            file.write_all(&encoded)?;
        }
        Some(path) => write_atomic(&path, &encoded)?,
        None => io::stdout().write_all(&encoded)?,
    }
    Ok(())
}

fn cmd_compress(args: CompressArgs) -> Result<()> {
    let settings = compression_settings(&Manifest::default(), &args.compression)?;
    let data = read_input(&args.input, "input")?;
    let compressed = settings.cache().get_or_compress(&data)?;
    write_atomic(&args.output, &compressed)?;
    Ok(())
}

fn cmd_warm(args: WarmArgs) -> Result<()> {
    let manifest = Manifest::load(&args.manifest.manifest)?;
    let files = manifest.file_list()?;
    let settings = compression_settings(&manifest, &args.compression)?;
    let cache = settings.cache();
    let runner = settings.runner();

    let report = CacheWarmScheduler::new(&cache, runner.as_ref()).warm(&files)?;
    println!(
        "{} compressed files, {} compressed now",
        report.candidates, report.compressed
    );
    Ok(())
}
