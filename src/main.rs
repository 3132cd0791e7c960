use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Compile arithmetic statements into code for an 8-register machine.
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
  /// Source file; statements are read from stdin when omitted.
  input: Option<PathBuf>,

  /// Explain fatal errors on stderr, pointing at the offending column.
  #[arg(short, long, env = "CALCC_DIAGNOSTICS")]
  diagnostics: bool,

  /// Raise the log level on stderr (repeat for more).
  #[arg(short, long, action = ArgAction::Count)]
  verbose: u8,
}

fn init_logging(verbose: u8) {
  let level = match verbose {
    0 => "warn",
    1 => "info",
    2 => "debug",
    _ => "trace",
  };
  let filter = EnvFilter::try_from_env("CALCC_LOG").unwrap_or_else(|_| EnvFilter::new(level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_target(false)
    .with_writer(io::stderr)
    .init();
}

fn main() -> ExitCode {
  let args = Args::parse();
  init_logging(args.verbose);

  let input: Box<dyn Read> = match &args.input {
    Some(path) => match File::open(path) {
      Ok(file) => Box::new(BufReader::new(file)),
      Err(err) => {
        eprintln!("error: failed to read {}: {err}", path.display());
        return ExitCode::from(2);
      }
    },
    None => Box::new(io::stdin().lock()),
  };
  info!(input = ?args.input, "compiling");

  let stdout = io::stdout();
  let mut out = stdout.lock();
  match calcc::run_with_context(input, &mut out) {
    (Ok(()), _) => ExitCode::SUCCESS,
    (Err(err), line) => {
      debug!(kind = ?err.kind(), "{err}");
      if args.diagnostics {
        eprintln!("{}", err.render(&line));
      }
      ExitCode::FAILURE
    }
  }
}
