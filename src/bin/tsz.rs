//! Command-line driver for the structural type checker.
//!
//! There is no lexer/parser in scope (spec §1) -- this binary reads a
//! JSON-encoded [`tsz_solver::ast::Program`] directly, compiles it to
//! bytecode, runs the VM over it, and reports whatever diagnostics the
//! module collected. An optional `--source` file supplies the text the
//! AST's byte spans were taken from, purely so diagnostics can be reported
//! as line/column instead of raw offsets.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tracing::{debug, info};
use tsz_common::position::LineMap;
use tsz_solver::ast::Program;
use tsz_solver::{Diagnostic, Vm, compile_source_file};

#[derive(Parser, Debug)]
#[command(name = "tsz", version, about = "Structural type checker for a TypeScript-like type language")]
struct Args {
    /// Path to a JSON-encoded `tsz_solver::ast::Program`.
    program: PathBuf,

    /// Path to the source text the program's spans were taken from, for
    /// line/column diagnostics. Without it, positions print as raw offsets.
    #[arg(long)]
    source: Option<PathBuf>,

    /// Disable colored diagnostic output.
    #[arg(long)]
    no_color: bool,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("TSZ_LOG").unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn main() -> Result<ExitCode> {
    init_tracing();

    let args = Args::parse();
    if args.no_color {
        colored::control::set_override(false);
    }

    let program_text = fs::read_to_string(&args.program).with_context(|| format!("reading program {}", args.program.display()))?;
    let program: Program = serde_json::from_str(&program_text).with_context(|| format!("parsing AST JSON from {}", args.program.display()))?;

    let source = match &args.source {
        Some(path) => Some(fs::read_to_string(path).with_context(|| format!("reading source {}", path.display()))?),
        None => None,
    };
    let line_map = source.as_deref().map(LineMap::build);

    info!(path = %args.program.display(), "compiling program");
    let mut module = compile_source_file(&program).context("compiling program to bytecode")?;
    debug!(subroutines = module.subroutine_count(), "compiled");

    let mut vm = Vm::new();
    vm.run(&mut module).context("running compiled module")?;

    let diagnostics = module.diagnostics();
    for diagnostic in diagnostics {
        print_diagnostic(diagnostic, source.as_deref(), line_map.as_ref());
    }

    if diagnostics.is_empty() {
        info!("no diagnostics");
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn print_diagnostic(diagnostic: &Diagnostic, source: Option<&str>, line_map: Option<&LineMap>) {
    let location = match (source, line_map) {
        (Some(source), Some(map)) => {
            let start = map.offset_to_position(diagnostic.source_pos, source);
            format!("{}:{}", start.line + 1, start.character + 1)
        }
        _ => format!("{}:{}", diagnostic.source_pos, diagnostic.source_end),
    };
    let code = diagnostic.code.map(|c| format!("TS{c}")).unwrap_or_default();
    println!("{} {} {}: {}", location.dimmed(), code.blue(), "error".red().bold(), diagnostic.message);
}
