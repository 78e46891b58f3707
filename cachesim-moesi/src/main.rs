use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use env_logger::Env;
use log::error;

use cachesim_moesi::moesi::SystemSpec;
use cachesim_moesi::{trace, SimError, SimResult, Simulator};

const USAGE: &str = "usage: cachesim-moesi <trace-dir> <testname> [--cache-size N] [--assoc N] [--max-cycles N] [--no-check]";

struct Args {
    dir: PathBuf,
    testname: String,
    specs: SystemSpec,
}

fn parse_num<T: std::str::FromStr>(flag: &str, value: Option<String>) -> SimResult<T> {
    let value = value.ok_or_else(|| SimError::ConfigError(format!("{} needs a value", flag)))?;
    value
        .parse()
        .map_err(|_| SimError::ConfigError(format!("invalid value '{}' for {}", value, flag)))
}

fn parse_args(args: impl IntoIterator<Item = String>) -> SimResult<Args> {
    let mut specs = SystemSpec::default();
    let mut positional = Vec::new();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--cache-size" => specs.cache_size = parse_num(&arg, args.next())?,
            "--assoc" => specs.cache_assoc = parse_num(&arg, args.next())?,
            "--max-cycles" => specs.max_cycles = Some(parse_num(&arg, args.next())?),
            "--no-check" => specs.check_invariants = false,
            flag if flag.starts_with("--") => {
                return Err(SimError::ConfigError(format!("unknown option {}\n{}", flag, USAGE)));
            }
            _ => positional.push(arg),
        }
    }
    let [dir, testname]: [String; 2] = positional
        .try_into()
        .map_err(|_| SimError::ConfigError(USAGE.to_string()))?;
    Ok(Args { dir: PathBuf::from(dir), testname, specs })
}

fn run() -> SimResult<()> {
    let args = parse_args(env::args().skip(1))?;
    let insts = trace::read_testfiles(&args.dir, &args.testname)?;

    let t0 = Instant::now();
    let mut sim = Simulator::new(args.specs, insts)?;
    let report = sim.run()?;
    println!("{}", report);
    println!("execution time {:?}", t0.elapsed());
    Ok(())
}

fn main() -> ExitCode {
    // logging
    let env = Env::default()
        .filter_or("CACHESIM_LOG_LEVEL", "info")
        .write_style_or("CACHESIM_LOG_STYLE", "auto");
    env_logger::init_from_env(env);

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
