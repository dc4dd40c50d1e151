//! Entrypoint for the `mpc` command.
use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use log::{info, LevelFilter};
use mp_compiler::machine::{self, Status};
use mp_compiler::{compile, xref, Compilation, CompileError};
use simple_logger::SimpleLogger;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "mpc")]
#[command(about = "A single-pass compiler for a small Pascal-like language")]
struct Args {
    /// Path to the source file to compile (must end in .pas)
    file: PathBuf,

    /// Where to write the assembly (default: the source path with .asm)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the cross-reference table after a successful compile
    #[arg(long)]
    xref: bool,

    /// Run the compiled program on the simulator, using stdin and stdout
    #[arg(long)]
    run: bool,

    /// Raise the log level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

const USAGE_ERROR: u8 = 2;
const IO_ERROR: u8 = 1;

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if let Err(err) = SimpleLogger::new().with_level(level).env().init() {
        eprintln!("mpc: cannot start logging: {err}");
    }

    if args.file.extension().and_then(|ext| ext.to_str()) != Some("pas") {
        eprintln!("mpc: '{}' is not a .pas file", args.file.display());
        return ExitCode::from(USAGE_ERROR);
    }

    let source = match read_source(&args.file) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("mpc: {err:#}");
            return ExitCode::from(IO_ERROR);
        }
    };

    let compilation = match compile(&source) {
        Ok(compilation) => compilation,
        Err(err) => {
            eprintln!("{}: {err}", args.file.display());
            return ExitCode::from(exit_status(&err));
        }
    };

    match finish(&args, &compilation) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("mpc: {err:#}");
            ExitCode::from(IO_ERROR)
        }
    }
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("cannot read '{}'", path.display()))
}

/// The line of the diagnostic, kept inside 1..=255 so that it never
/// reads as success once the OS truncates it to a byte.
fn exit_status(err: &CompileError) -> u8 {
    err.line().clamp(1, 255) as u8
}

fn finish(args: &Args, compilation: &Compilation) -> Result<()> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.file.with_extension("asm"));
    fs::write(&output, &compilation.assembly)
        .with_context(|| format!("cannot write '{}'", output.display()))?;
    info!("wrote {}", output.display());

    if args.xref {
        print!("{}", xref::render(&compilation.symbols));
    }

    if args.run {
        let mut input = String::new();
        io::stdin()
            .read_to_string(&mut input)
            .context("cannot read standard input")?;
        let outcome = machine::run(&compilation.assembly, &input).context("simulator fault")?;
        let mut stdout = io::stdout();
        stdout.write_all(outcome.output.as_bytes())?;
        stdout.flush()?;
        info!("program ran for {} step(s)", outcome.steps);
        if let Status::Trapped(error) = outcome.status {
            bail!("program stopped: {error}");
        }
    }
    Ok(())
}
