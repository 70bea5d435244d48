use crate::{Session, WardenConfig, WardenServer, signer::LocalKeyring};
use clap::Parser;
use eyre::{Result, WrapErr};
use std::{path::PathBuf, sync::Arc};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Clone, Debug, Parser)]
#[command(name = "warden", version, about = "Dapp request gateway for a local keyring")]
pub struct Warden {
    /// Path of the config file.
    #[arg(long, short, env = "WARDEN_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Port to listen on, overrides the config.
    #[arg(long, short)]
    pub port: Option<u16>,

    /// Private key of the served account.
    #[arg(long, env = "WARDEN_PRIVATE_KEY", value_name = "KEY", hide_env_values = true)]
    pub private_key: String,

    /// Start with the wallet unlocked.
    #[arg(long)]
    pub unlocked: bool,
}

impl Warden {
    /// Loads the config file and applies the command line overrides.
    pub fn config(&self) -> Result<WardenConfig> {
        let mut config =
            WardenConfig::load(self.config.as_deref()).wrap_err("failed to load config")?;
        if let Some(port) = self.port {
            config.port = port;
        }
        Ok(config)
    }
}

fn init_tracing() {
    let _ = FmtSubscriber::builder().with_env_filter(EnvFilter::from_default_env()).try_init();
}

/// Runs the `warden` CLI until ctrl-c.
pub fn run() -> Result<()> {
    init_tracing();
    let args = Warden::parse();
    tokio::runtime::Builder::new_multi_thread().enable_all().build()?.block_on(serve(args))
}

async fn serve(args: Warden) -> Result<()> {
    let config = args.config()?;
    let keyring = LocalKeyring::from_private_key(&args.private_key)?;
    let mut server =
        WardenServer::from_config(&config, Arc::new(keyring), Session::new(args.unlocked))?;
    server.start().await.wrap_err("failed to start server")?;
    println!("Listening on {}:{}", config.host, server.port());
    println!("Session token: {}", server.session_token());

    tokio::signal::ctrl_c().await?;
    info!(target: "warden", "shutting down");
    server.stop().await?;
    Ok(())
}
