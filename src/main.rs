use std::{error::Error, net::SocketAddr, process, time::Duration};

use clap::{command, Parser, ValueHint};
use log::{debug, error, info, LevelFilter};

use dzgate::{
    arl::Arl,
    config::Config,
    engine::Engine,
    secrets::{self, SecretsFile, StaticCredential},
    server,
};

/// Profile to display when not built in release mode.
#[cfg(debug_assertions)]
const BUILD_PROFILE: &str = "debug";
/// Profile to display when not built release mode.
#[cfg(not(debug_assertions))]
const BUILD_PROFILE: &str = "release";

/// Group name for mutually exclusive logging options.
const ARGS_GROUP_LOGGING: &str = "logging";

/// Command line arguments as parsed by `clap`.
#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Secrets file
    ///
    /// Holds the credential and the provider keys. Ensure that this file is
    /// kept secure and not shared publicly, as it contains sensitive
    /// information that can grant access to your Deezer account.
    #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath, default_value_t = String::from("secrets.toml"))]
    secrets_file: String,

    /// Credential override
    ///
    /// Use this credential instead of the one in the secrets file. The
    /// secrets file is still required for the provider keys.
    #[arg(long, env = "DZGATE_ARL", hide_env_values = true)]
    arl: Option<Arl>,

    /// Address to listen on
    #[arg(short, long, value_name = "ADDR", default_value_t = SocketAddr::from(([127, 0, 0, 1], 8080)))]
    listen: SocketAddr,

    /// Upstream request timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = Config::DEFAULT_TIMEOUT.as_secs())]
    timeout: u64,

    /// Suppresses all output except warnings and errors.
    #[arg(short, long, default_value_t = false, group = ARGS_GROUP_LOGGING)]
    quiet: bool,

    /// Enable verbose logging
    ///
    /// Specify twice for trace logging.
    #[arg(short, long, action = clap::ArgAction::Count, group = ARGS_GROUP_LOGGING)]
    verbose: u8,
}

/// Initializes the logger facade.
///
/// The logging level is determined as follows, in order of precedence from
/// highest to lowest:
/// 1. Command line arguments
/// 2. `RUST_LOG` environment variable
/// 3. Hard coded default
///
/// # Panics
///
/// Panics when a logger facade is already initialized.
fn init_logger(config: &Args) {
    let mut logger = env_logger::Builder::from_env(
        // Note: if you change the default logging level here, then you should
        // probably also change the verbosity levels below.
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    if config.quiet || config.verbose > 0 {
        let level = match config.verbose {
            0 => {
                // Quiet and verbose are mutually exclusive, and `verbose` is 0
                // by default. So this arm means: quiet mode.
                LevelFilter::Warn
            }
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Filter log messages of external crates.
        logger.filter_module(module_path!(), level);
    }

    logger.init();
}

/// Builds the engine and serves it until shutdown.
///
/// # Errors
///
/// Returns an error when the provider keys cannot be loaded, the listen
/// address cannot be bound, or the server fails.
async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let keys = secrets::load_keys(&args.secrets_file).inspect_err(|_| {
        info!(
            "read the documentation on how to set up {}",
            args.secrets_file
        );
    })?;

    let mut config = Config::new();
    config.timeout = Duration::from_secs(args.timeout);

    let engine = match args.arl {
        Some(arl) => {
            debug!("using credential from command line");
            Engine::new(config, keys, StaticCredential(Some(arl)))
        }
        None => Engine::new(config, keys, SecretsFile::new(&args.secrets_file)),
    };

    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    server::serve(listener, engine).await?;

    Ok(())
}

/// Main entry point of the application.
///
/// This function initializes the logger facade, parses the command line
/// arguments, and starts the server.
#[tokio::main]
async fn main() {
    // `clap` handles our command line arguments and help text.
    let args = Args::parse();
    init_logger(&args);

    // Dump command line arguments before we do anything more.
    // This aids in debugging of whatever comes next.
    debug!("Command {:#?}", args);

    let cmd = command!();
    let name = cmd.get_name().to_string();
    let version = cmd.get_version().unwrap_or("UNKNOWN").to_string();

    info!("starting {name}/{version}; {BUILD_PROFILE}");

    if let Err(e) = run(args).await {
        error!("{e}");
        process::exit(1);
    }
}
