//! Solves `minimize x subject to x = sin(2.5 x1) + x2, -1 <= x1, x2 <= 1` with Gurobi
//! and prints the variable values and the objective.
//!
//! Set `GENCONSTR_NL_TRACE` (for instance to `debug`) to see what is sent to the solver.
use std::env;
use std::io;
use std::process::ExitCode;

use genconstr_nl::driver;
use genconstr_nl::solvers::gurobi::GurobiEnv;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let level = env::var("GENCONSTR_NL_TRACE").unwrap_or_else(|_| "off".to_string());
    let filter = if level.eq_ignore_ascii_case("off") {
        EnvFilter::default().add_directive(LevelFilter::OFF.into())
    } else {
        EnvFilter::try_new(&level).unwrap_or_else(|err| {
            eprintln!("Invalid GENCONSTR_NL_TRACE filter {:?}: {}", level, err);
            EnvFilter::default().add_directive(LevelFilter::WARN.into())
        })
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn main() -> ExitCode {
    init_logging();
    let stdout = io::stdout();
    match driver::run_and_report(GurobiEnv::new, &mut stdout.lock()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("Failed to write the report: {}", err);
            ExitCode::FAILURE
        }
    }
}
