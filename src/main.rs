//! shot CLI
//!
//! Usage:
//!   shot [OPTIONS] [FILE]
//!
//! Options:
//!   -l, --locals <FILE>      Locals file (TOML, or JSON by `.json` extension)
//!   -s, --set <NAME=VALUE>   Set a single local (repeatable)
//!   -b, --block-file <FILE>  Contents passed to `yield`
//!   -c, --config <FILE>      Syntax and render settings (TOML)
//!   -v, --verbose            Increase logging verbosity (-v, -vv, -vvv)
//!   -h, --help               Print help

use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};

use clap::{ArgAction, CommandFactory, Parser};
use log::LevelFilter;

use shot::{Config, Locals, Template, Value};

#[derive(Parser)]
#[command(name = "shot", version)]
#[command(about = "Render line-oriented shot templates")]
struct Cli {
    /// Template file (reads from stdin if not provided)
    input: Option<PathBuf>,

    /// Locals file: a TOML table, or a JSON object when the name ends in `.json`
    #[arg(short, long)]
    locals: Option<PathBuf>,

    /// Set a local; the value is read as a TOML value, or as a plain string
    #[arg(short, long = "set", value_name = "NAME=VALUE")]
    set: Vec<String>,

    /// File whose contents are the trailing block for `yield`
    #[arg(short, long)]
    block_file: Option<PathBuf>,

    /// Config file with syntax and render settings (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (`-v`, `-vv`, `-vvv`)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(log_level(cli.verbose))
        .init();

    // Nothing piped in and no file given: show help instead of waiting on a terminal
    if cli.input.is_none() && io::stdin().is_terminal() {
        let _ = Cli::command().print_help();
        return;
    }

    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .unwrap_or_else(|e| fail(format!("Error loading config '{}': {}", path.display(), e))),
        None => Config::default(),
    };

    let mut locals = match &cli.locals {
        Some(path) => load_locals(path).unwrap_or_else(|e| fail(e)),
        None => Locals::new(),
    };
    for assignment in &cli.set {
        let (name, value) = parse_assignment(assignment).unwrap_or_else(|e| fail(e));
        locals.insert(name, value);
    }

    let template = match &cli.input {
        Some(path) => Template::from_file_with_config(path, &config),
        None => {
            let mut buffer = String::new();
            if let Err(e) = io::stdin().read_to_string(&mut buffer) {
                fail(format!("Error reading from stdin: {}", e));
            }
            Template::from_literal_with_config(buffer, &config)
        }
    }
    .unwrap_or_else(|e| fail(format!("Error: {}", e)));

    let result = match &cli.block_file {
        Some(path) => {
            let block = fs::read_to_string(path).unwrap_or_else(|e| {
                fail(format!("Error reading block file '{}': {}", path.display(), e))
            });
            // A trailing newline in the file would add a blank line to the output
            let block = block.strip_suffix('\n').map(str::to_string).unwrap_or(block);
            template.render_with_block(&locals, move || block)
        }
        None => template.render(&locals),
    };

    match result {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprint!("{}", template.format_error(&e));
            std::process::exit(1);
        }
    }
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("{}", message);
    std::process::exit(1);
}

/// Map `-v` counts to a log level
fn log_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn load_locals(path: &Path) -> Result<Locals, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Error reading locals '{}': {}", path.display(), e))?;

    let value = if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str::<serde_json::Value>(&content)
            .map(Value::from)
            .map_err(|e| format!("Error parsing locals '{}': {}", path.display(), e))?
    } else {
        toml::from_str::<toml::Value>(&content)
            .map(Value::from)
            .map_err(|e| format!("Error parsing locals '{}': {}", path.display(), e))?
    };

    Locals::from_value(value)
        .ok_or_else(|| format!("Locals '{}' must be a table of names", path.display()))
}

/// Split `name=value`; values that are not valid TOML are taken as strings
fn parse_assignment(assignment: &str) -> Result<(String, Value), String> {
    let (name, raw) = assignment
        .split_once('=')
        .ok_or_else(|| format!("Expected NAME=VALUE, got '{}'", assignment))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("Missing name in '{}'", assignment));
    }

    let value = toml::from_str::<toml::Table>(&format!("value = {}", raw))
        .ok()
        .and_then(|mut table| table.remove("value"))
        .map(Value::from)
        .unwrap_or_else(|| Value::from(raw));
    Ok((name.to_string(), value))
}
