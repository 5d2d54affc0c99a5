//! flowref CLI: checks refined information-flow contracts.

use clap::{Parser as ClapParser, Subcommand};
use flowref_cli::colors::{bold, red, status_label};
use flowref_cli::config::{FlowrefConfig, OutputFormat, CONFIG_FILE};
use flowref_cli::report::{to_json, UnitReport};
use flowref_cli::unit::Unit;
use flowref_compiler::compiler::error_codes::{all_error_codes, error_doc};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "flowref", version, about = "Refinement checker for flow contracts")]
struct Cli {
    /// Use this configuration file instead of searching for flowref.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the refinements declared in unit files
    Check {
        /// Unit description files (.toml)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output format (overrides flowref.toml)
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,

        /// Skip Refined_Depends checks
        #[arg(long)]
        no_depends: bool,

        /// Skip Refined_Global checks
        #[arg(long)]
        no_globals: bool,
    },
    /// Explain an error code, or list every code
    Explain {
        /// Error code such as F0301
        code: Option<String>,
    },
    /// Create a flowref.toml config file in the current directory
    Init,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    match cli.command {
        Commands::Check {
            files,
            format,
            no_color,
            no_depends,
            no_globals,
        } => {
            let mut config = config;
            if let Some(format) = format {
                config.output.format = format;
            }
            if no_color {
                config.output.color = false;
            }
            if no_depends {
                config.check.depends = false;
            }
            if no_globals {
                config.check.globals = false;
            }
            cmd_check(&files, &config)
        }
        Commands::Explain { code } => cmd_explain(code.as_deref()),
        Commands::Init => cmd_init(),
    }
}

fn load_config(path: Option<&PathBuf>) -> FlowrefConfig {
    match path {
        Some(path) => FlowrefConfig::load_from(path).unwrap_or_else(|e| {
            eprintln!("{} {}", red("error:"), e);
            std::process::exit(1);
        }),
        None => match FlowrefConfig::load_with_path() {
            Some((path, config)) => {
                debug!(path = %path.display(), "using config");
                config
            }
            None => FlowrefConfig::default(),
        },
    }
}

fn cmd_check(files: &[PathBuf], config: &FlowrefConfig) {
    let options = config.check_options();
    let mut reports: Vec<UnitReport> = Vec::new();
    let mut failed = false;

    for file in files {
        let filename = file.display().to_string();
        let result = Unit::load(file).and_then(|unit| unit.check(&filename, options));
        match result {
            Ok(report) => {
                failed |= report.rejected() > 0;
                reports.push(report);
            }
            Err(e) => {
                eprintln!("{} {}: {}", red("error:"), bold(&filename), e);
                failed = true;
            }
        }
    }

    match config.output.format {
        OutputFormat::Json => match to_json(&reports) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("{} serializing report: {}", red("error:"), e);
                std::process::exit(1);
            }
        },
        format => {
            for report in &reports {
                print!(
                    "{}",
                    report.render(format, config.output.color, config.check.max_diagnostics)
                );
            }
        }
    }

    if failed {
        std::process::exit(1);
    }
}

fn cmd_explain(code: Option<&str>) {
    match code {
        Some(code) => {
            let code = code.to_ascii_uppercase();
            let doc = error_doc(&code);
            if !all_error_codes().iter().any(|(c, _)| *c == code) {
                eprintln!("{} unknown error code '{}'", red("error:"), code);
                std::process::exit(1);
            }
            println!("{}: {}", bold(&code), doc);
        }
        None => {
            for (code, doc) in all_error_codes() {
                println!("{}  {}", bold(code), doc);
            }
        }
    }
}

fn cmd_init() {
    let path = PathBuf::from(CONFIG_FILE);
    if path.exists() {
        eprintln!("{} {} already exists, not overwriting", red("error:"), CONFIG_FILE);
        std::process::exit(1);
    }
    std::fs::write(&path, FlowrefConfig::default_template()).unwrap_or_else(|e| {
        eprintln!("{} writing {}: {}", red("error:"), CONFIG_FILE, e);
        std::process::exit(1);
    });
    println!("{} {}", status_label("Created"), CONFIG_FILE);
}
