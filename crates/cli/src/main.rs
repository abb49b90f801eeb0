mod config;
mod runner;
mod tap;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use svrf_core::conditional::resolve_conditionals;
use svrf_core::deck::load_deck;
use svrf_core::{parse_bytes, Diagnostic, ParseOutput, SymbolTable};

use config::Config;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// SVRF rule-deck toolchain.
#[derive(Parser)]
#[command(name = "svrf", version, about = "SVRF rule-deck toolchain")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Path to a svrf.toml configuration file (default: ./svrf.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a rule deck and print its syntax tree as JSON
    Parse {
        /// Path to the rule deck
        file: PathBuf,
    },

    /// Print the token stream of a rule deck
    Tokens {
        /// Path to the rule deck
        file: PathBuf,
    },

    /// Print a rule deck in canonical form
    Fmt {
        /// Path to the rule deck
        file: PathBuf,
    },

    /// Check a rule deck and everything it includes
    Check {
        /// Path to the root rule deck
        file: PathBuf,
        /// Fail on warnings as well as errors
        #[arg(long)]
        deny_warnings: bool,
    },

    /// List the names the prescan declares
    Symbols {
        /// Path to the rule deck
        file: PathBuf,
    },

    /// Select #IFDEF branches and print the resulting deck
    Resolve {
        /// Path to the rule deck
        file: PathBuf,
        /// Define a preprocessor name (NAME or NAME=VALUE); repeatable
        #[arg(long = "define", short = 'D', value_name = "NAME[=VALUE]")]
        defines: Vec<String>,
    },

    /// Run the conformance test suite
    Test {
        /// Path to the conformance suite directory
        #[arg(default_value = "conformance")]
        suite_dir: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match config::load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            report_error(&e.to_string(), cli.output, cli.quiet);
            process::exit(1);
        }
    };

    match cli.command {
        Commands::Parse { file } => cmd_parse(&file, cli.output, cli.quiet),
        Commands::Tokens { file } => cmd_tokens(&file, cli.output, cli.quiet),
        Commands::Fmt { file } => cmd_fmt(&file, cli.output, cli.quiet),
        Commands::Check {
            file,
            deny_warnings,
        } => {
            let deny = deny_warnings || config.check.deny_warnings;
            cmd_check(&file, deny, cli.output, cli.quiet);
        }
        Commands::Symbols { file } => cmd_symbols(&file, cli.output, cli.quiet),
        Commands::Resolve { file, defines } => {
            cmd_resolve(&file, &defines, &config, cli.output, cli.quiet);
        }
        Commands::Test { suite_dir } => cmd_test(&suite_dir, cli.output, cli.quiet),
    }
}

/// Read and parse `file`, exiting with status 1 when it cannot be read or
/// is not a rule deck at all.
fn load_and_parse(file: &Path, output: OutputFormat, quiet: bool) -> ParseOutput {
    let bytes = match std::fs::read(file) {
        Ok(b) => b,
        Err(e) => {
            let msg = format!("error reading file '{}': {}", file.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    match parse_bytes(&bytes, &file.display().to_string()) {
        Ok(out) => out,
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    }
}

fn cmd_parse(file: &Path, output: OutputFormat, quiet: bool) {
    let parsed = load_and_parse(file, output, quiet);
    let pretty = serde_json::to_string_pretty(&parsed.program)
        .unwrap_or_else(|e| format!("serialization error: {}", e));
    println!("{}", pretty);
    report_diagnostics(&parsed.diagnostics, output, quiet);
    if parsed.has_errors() {
        process::exit(1);
    }
}

fn cmd_tokens(file: &Path, output: OutputFormat, quiet: bool) {
    let bytes = match std::fs::read(file) {
        Ok(b) => b,
        Err(e) => {
            let msg = format!("error reading file '{}': {}", file.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    let filename = file.display().to_string();
    let text = match svrf_core::source::decode_source(&bytes, &filename) {
        Ok(t) => t,
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    };

    let lexed = svrf_core::lex(&text);
    match output {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&lexed.tokens)
                .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
            println!("{}", json);
        }
        OutputFormat::Text => {
            for t in &lexed.tokens {
                println!("{}:{} {:?} {}", t.line, t.col, t.kind, t.text.escape_debug());
            }
        }
    }

    let diagnostics: Vec<Diagnostic> = lexed
        .errors
        .iter()
        .map(|e| e.to_diagnostic(&filename))
        .collect();
    report_diagnostics(&diagnostics, output, quiet);
    if !diagnostics.is_empty() {
        process::exit(1);
    }
}

fn cmd_fmt(file: &Path, output: OutputFormat, quiet: bool) {
    let parsed = load_and_parse(file, output, quiet);
    if parsed.has_errors() {
        report_diagnostics(&parsed.diagnostics, output, quiet);
        process::exit(1);
    }
    print!("{}", svrf_core::print(&parsed.program));
}

fn cmd_check(file: &Path, deny_warnings: bool, output: OutputFormat, quiet: bool) {
    let deck = match load_deck(file) {
        Ok(d) => d,
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    };

    let diagnostics: Vec<&Diagnostic> = deck
        .units
        .iter()
        .flat_map(|u| u.output.diagnostics.iter())
        .collect();
    let errors = diagnostics.iter().filter(|d| d.is_error()).count();
    let warnings = diagnostics.len() - errors;
    let failed = errors > 0 || (deny_warnings && warnings > 0);

    match output {
        OutputFormat::Json => {
            let files: Vec<serde_json::Value> = deck
                .units
                .iter()
                .map(|u| {
                    serde_json::json!({
                        "file": u.path.display().to_string(),
                        "diagnostics": u.output.diagnostics
                            .iter()
                            .map(Diagnostic::to_json_value)
                            .collect::<Vec<_>>(),
                    })
                })
                .collect();
            let report = serde_json::json!({
                "ok": !failed,
                "files": files,
                "errors": errors,
                "warnings": warnings,
            });
            let json = serde_json::to_string_pretty(&report)
                .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
            println!("{}", json);
        }
        OutputFormat::Text => {
            for d in &diagnostics {
                println!("{}", d);
            }
            if !quiet {
                let status = if failed { "failed" } else { "ok" };
                println!(
                    "{}: {} file(s), {} error(s), {} warning(s)",
                    status,
                    deck.units.len(),
                    errors,
                    warnings
                );
            }
        }
    }

    if failed {
        process::exit(1);
    }
}

fn cmd_symbols(file: &Path, output: OutputFormat, quiet: bool) {
    let bytes = match std::fs::read(file) {
        Ok(b) => b,
        Err(e) => {
            let msg = format!("error reading file '{}': {}", file.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    let text = match svrf_core::source::decode_source(&bytes, &file.display().to_string()) {
        Ok(t) => t,
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    };

    let table = SymbolTable::build(&svrf_core::tokenize(&text));
    match output {
        OutputFormat::Json => {
            let map: serde_json::Map<String, serde_json::Value> = table
                .iter()
                .map(|(name, role)| {
                    (
                        name.to_owned(),
                        serde_json::to_value(role).unwrap_or(serde_json::Value::Null),
                    )
                })
                .collect();
            let json = serde_json::to_string_pretty(&map)
                .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
            println!("{}", json);
        }
        OutputFormat::Text => {
            for (name, role) in table.iter() {
                println!("{:<24} {:?}", name, role);
            }
        }
    }
}

fn cmd_resolve(
    file: &Path,
    defines: &[String],
    config: &Config,
    output: OutputFormat,
    quiet: bool,
) {
    let parsed = load_and_parse(file, output, quiet);
    if parsed.has_errors() {
        report_diagnostics(&parsed.diagnostics, output, quiet);
        process::exit(1);
    }

    let mut set = config.defines();
    for spec in defines {
        set.define_spec(spec);
    }
    let resolved = resolve_conditionals(parsed.program, &set);
    print!("{}", svrf_core::print(&resolved));
}

fn cmd_test(suite_dir: &Path, output: OutputFormat, quiet: bool) {
    if !suite_dir.exists() {
        let msg = format!(
            "conformance suite directory not found: {}",
            suite_dir.display()
        );
        report_error(&msg, output, quiet);
        process::exit(1);
    }

    let result = runner::run_suite(suite_dir);
    print!("{}", result.report);
    if result.failed > 0 {
        process::exit(1);
    }
}

/// Diagnostics to stderr: one line each in text mode (suppressed by
/// `--quiet`), a JSON array otherwise.
fn report_diagnostics(diagnostics: &[Diagnostic], output: OutputFormat, quiet: bool) {
    if diagnostics.is_empty() {
        return;
    }
    match output {
        OutputFormat::Json => {
            let values: Vec<_> = diagnostics.iter().map(Diagnostic::to_json_value).collect();
            let json = serde_json::to_string_pretty(&values)
                .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
            eprintln!("{}", json);
        }
        OutputFormat::Text => {
            if !quiet {
                for d in diagnostics {
                    eprintln!("{}", d);
                }
            }
        }
    }
}

/// Report an error message respecting output format and quiet mode.
pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}
