use anyhow::Result;
use clap::Parser;
use log::info;
use platbin::config::{Config, ConfigOptions};
use platbin::http::HttpClient;
use platbin::install::install;
use platbin::launcher;
use platbin::package_manager::NpmCli;
use platbin::platform::PlatformKey;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

/// platbin - prebuilt platform binaries for npm packages
///
/// Run from a package's post-install hook to find or fetch the native
/// executable for this machine, and from its `bin` entry to launch it.
///
/// Options go before the subcommand; everything after `run` belongs to the
/// executable.
///
/// Examples:
///   platbin install                       # Acquire, place and verify the executable
///   platbin run --version                 # Run it with the given arguments
///   platbin --package-dir DIR run ARGS    # Launch from outside the package
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding the installer's package.json (defaults to the package
    /// containing this executable, then to the current directory)
    #[arg(long, env = "PLATBIN_PACKAGE_DIR", value_name = "PATH")]
    package_dir: Option<PathBuf>,

    /// Registry to download platform packages from
    #[arg(long, env = "npm_config_registry", value_name = "URL")]
    registry: Option<String>,

    /// Package manager executable used for the isolated install
    #[arg(long, env = "PLATBIN_NPM", value_name = "PROGRAM")]
    npm: Option<String>,

    /// Time limit for each acquisition stage
    #[arg(long, env = "PLATBIN_STAGE_TIMEOUT", value_name = "SECONDS")]
    stage_timeout: Option<u64>,
}

impl Cli {
    fn options(&self) -> ConfigOptions {
        ConfigOptions {
            package_dir: self.package_dir.clone(),
            registry: self.registry.clone(),
            npm: self.npm.clone(),
            stage_timeout: self.stage_timeout.map(Duration::from_secs),
        }
    }
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Acquire the executable for this platform and place it at bin/<product>
    Install(InstallArgs),

    /// Run the executable, forwarding all arguments and its exit code
    #[command(disable_help_flag = true)]
    Run(RunArgs),
}

#[derive(clap::Args, Debug)]
pub struct InstallArgs {}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Arguments passed through unchanged
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "ARGS")]
    pub args: Vec<OsString>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = platbin::runtime::RealRuntime;
    let config = Config::load(&runtime, cli.options())?;
    let key = PlatformKey::current();

    match cli.command {
        Commands::Install(_args) => {
            let http = HttpClient::with_user_agent(&config.user_agent())?;
            let npm = NpmCli::new(config.npm_program.clone());
            let placed = install(&runtime, &npm, &http, &config, &key).await?;
            info!("{} is ready at {:?}", config.product, placed.path);
        }
        Commands::Run(args) => {
            let code = launcher::run(&runtime, &config, &key, &args.args).await?;
            std::process::exit(code);
        }
    }
    Ok(())
}
