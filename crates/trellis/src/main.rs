//! trellis - component-template compiler and renderer.

use clap::Parser;
use miette::{miette, IntoDiagnostic, Result, WrapErr};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod app;
mod cli;
mod config;

use app::App;
use cli::Args;
use config::Config;

fn main() -> ExitCode {
    let args = Args::parse();

    init_tracing(args.verbose);

    // Set up miette for nice error output
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    match run(args) {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("{:?}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "trellis=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: Args) -> Result<ExitCode> {
    let workspace = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let config = Config::load(&workspace, &args)?;
    let app = App::new(config);

    if args.list {
        app.list();
        return Ok(ExitCode::SUCCESS);
    }

    if args.precompile {
        let failures = app.precompile()?;
        return Ok(if failures > 0 {
            ExitCode::from(1)
        } else {
            ExitCode::SUCCESS
        });
    }

    let Some(name) = args.name.as_deref() else {
        return Err(miette!(
            "no template name given (or use --list / --precompile)"
        ));
    };

    let data = load_data(&args)?;
    let output = app.render(name, data, &args.fragments)?;
    println!("{output}");
    Ok(ExitCode::SUCCESS)
}

/// Scope data from `--data` or `--data-file`, defaulting to an empty object.
fn load_data(args: &Args) -> Result<serde_json::Value> {
    let text = match (&args.data, &args.data_file) {
        (Some(inline), _) => inline.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to read {}", path.display()))?,
        (None, None) => return Ok(serde_json::json!({})),
    };
    let value: serde_json::Value = serde_json::from_str(&text)
        .into_diagnostic()
        .wrap_err("scope data must be valid JSON")?;
    if !value.is_object() {
        return Err(miette!("scope data must be a JSON object"));
    }
    Ok(value)
}
