use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use gometa::logging;
use gometa::{ByteOrder, GoFile, OracleConfig, VersionTable};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Go binary to inspect
    #[arg(short, long)]
    input: PathBuf,

    /// Release table CSV (`version,sha,date`) to use instead of the builtin one
    #[arg(long)]
    versions: Option<PathBuf>,

    /// Lowest version the string scan accepts
    #[arg(long)]
    min_scan_version: Option<String>,

    #[arg(long)]
    no_debug_info: bool,

    #[arg(long)]
    no_disasm: bool,

    #[arg(long)]
    no_string_scan: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn oracle_config(&self) -> OracleConfig {
        let mut config = OracleConfig::default();
        if let Some(min) = &self.min_scan_version {
            config.min_scan_version = min.clone();
        }
        config.use_debug_info = !self.no_debug_info;
        config.use_disassembly = !self.no_disasm;
        config.use_string_scan = !self.no_string_scan;
        config
    }

    fn version_table(&self) -> Result<Option<VersionTable>> {
        let Some(path) = &self.versions else {
            return Ok(None);
        };
        let file =
            File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
        let table = VersionTable::from_csv(BufReader::new(file))
            .with_context(|| format!("cannot parse {}", path.display()))?;
        Ok(Some(table))
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_tracing(args.verbose);

    let table = args.version_table()?;
    #[allow(clippy::redundant_closure)] // builtin() is 'static, the fn item would not coerce
    let table = table.as_ref().unwrap_or_else(|| VersionTable::builtin());
    let config = args.oracle_config();

    let file = GoFile::open(&args.input)
        .with_context(|| format!("cannot open {}", args.input.display()))?;

    let info = file.file_info();
    let endian = match info.byte_order {
        ByteOrder::Little => "little",
        ByteOrder::Big => "big",
    };
    println!("File:       {}", args.input.display());
    println!("Arch:       {} ({}-bit, {endian} endian)", info.arch, info.word_size * 8);
    println!("OS:         {}", info.os);

    match file.build_id() {
        Ok(id) => println!("Build ID:   {id}"),
        Err(e) => println!("Build ID:   not found ({e})"),
    }

    let version = file
        .go_version_with(table, &config, None)
        .context("No Go version found")?;
    if version.sha.is_empty() {
        println!("Go version: {}", version.name);
    } else {
        println!(
            "Go version: {} ({} {})",
            version.name, version.sha, version.timestamp
        );
    }

    file.close()?;
    Ok(())
}
