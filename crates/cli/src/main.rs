use crate::{
    commands::{Commands, LoadArgs},
    error::CliError,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use chrono::Local;
use clap::Parser;
use connectors::catalog::Catalog;
use engine_config::settings::{LoadConfiguration, load_configuration};
use engine_processing::{
    filter::function::TransformRegistry,
    reader::{Reader, dump_params},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, Registry, prelude::*, reload};

mod commands;
mod error;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(name = "bulkload", version, about = "Bulk loader for delimited and fixed-width files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let verbose = match &cli.command {
        Commands::Load { target, .. } | Commands::Check { target } => target.verbose,
    };
    let filter = init_tracing(verbose);

    let code = match run(cli.command, &filter).await {
        Ok(code) => code,
        Err(err) if err.is_shutdown() => {
            error!("{err}");
            ExitCode::ShutdownRequested
        }
        Err(err) => {
            error!("{err}");
            eprintln!("ERROR: {err}");
            ExitCode::GeneralError
        }
    };
    code.into()
}

type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Installs the subscriber. The returned handle raises the level once the
/// control file has been read.
fn init_tracing(verbose: bool) -> FilterHandle {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let (filter, handle) = reload::Layer::new(filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    handle
}

/// `VERBOSE = YES` from any source switches to debug unless `RUST_LOG` is set.
fn apply_verbosity(handle: &FilterHandle, verbose: bool) {
    if !verbose || std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        return;
    }
    if let Err(err) = handle.reload(EnvFilter::new("debug")) {
        warn!(error = %err, "Could not raise log level");
    }
}

async fn run(command: Commands, filter: &FilterHandle) -> Result<ExitCode, CliError> {
    match command {
        Commands::Load { target, json } => {
            let catalog = Catalog::load(&target.catalog)?;
            let config = resolve(&target, &catalog)?;
            apply_verbosity(filter, config.verbose);
            let registry = TransformRegistry::from_catalog(&catalog)?;

            let coordinator = ShutdownCoordinator::new(CancellationToken::new());
            coordinator.register_handlers();

            let reader = Reader::open(config, &registry, coordinator.cancel_token())?;
            let result = reader.run().await?;
            if coordinator.is_shutdown_requested() {
                return Err(CliError::ShutdownRequested);
            }

            output::print_result(&result, json)?;
            Ok(if result.is_breached() {
                ExitCode::ThresholdExceeded
            } else {
                ExitCode::Success
            })
        }
        Commands::Check { target } => {
            let catalog = Catalog::load(&target.catalog)?;
            let config = resolve(&target, &catalog)?;
            apply_verbosity(filter, config.verbose);
            TransformRegistry::from_catalog(&catalog)?;
            info!(table = %config.table.qualified_name(), "Configuration is valid");
            output::print_params(&dump_params(&config));
            Ok(ExitCode::Success)
        }
    }
}

fn resolve(args: &LoadArgs, catalog: &Catalog) -> Result<LoadConfiguration, CliError> {
    let config = load_configuration(
        args.control_file.as_deref(),
        &args.option_lines(),
        catalog,
        &args.output_dir,
        Local::now(),
    )?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_load_arguments() {
        let cli = Cli::try_parse_from([
            "bulkload",
            "load",
            "/etc/bulkload/items.ctl",
            "--catalog",
            "catalog.json",
            "-o",
            "PARSE_ERRORS=5",
            "-o",
            "LIMIT=10",
            "--verbose",
        ])
        .unwrap();

        let Commands::Load { target, json } = cli.command else {
            panic!("expected load");
        };
        assert!(!json);
        assert_eq!(target.output_dir, std::path::PathBuf::from("."));
        assert_eq!(
            target.option_lines(),
            vec!["PARSE_ERRORS=5", "LIMIT=10", "VERBOSE = YES"]
        );
    }

    #[test]
    fn test_verbose_configuration_raises_level() {
        if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
            return;
        }
        let (layer, handle) = reload::Layer::new(EnvFilter::new("info"));
        let _subscriber = tracing_subscriber::registry().with(layer);

        apply_verbosity(&handle, false);
        assert_eq!(
            handle.with_current(|f| f.max_level_hint()).unwrap(),
            Some(tracing::level_filters::LevelFilter::INFO)
        );

        apply_verbosity(&handle, true);
        assert_eq!(
            handle.with_current(|f| f.max_level_hint()).unwrap(),
            Some(tracing::level_filters::LevelFilter::DEBUG)
        );
    }

    #[test]
    fn test_catalog_is_required() {
        assert!(Cli::try_parse_from(["bulkload", "check"]).is_err());
    }
}
