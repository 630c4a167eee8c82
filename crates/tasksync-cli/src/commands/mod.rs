pub mod auth_url;
pub mod config;
pub mod run;
pub mod serve;
pub mod watch;

use std::future::Future;
use std::sync::Arc;

use tasksync_core::{Config, Reconciler, ReqwestTransport, Secrets};

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Drive an async command to completion on a fresh runtime.
pub fn block_on<F>(fut: F) -> CliResult
where
    F: Future<Output = CliResult>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(fut)
}

/// Load `config.toml` with environment overrides applied.
pub fn load_config() -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = Config::load()?;
    config.apply_env_overrides(|key| std::env::var(key).ok());
    Ok(config)
}

/// Everything a trigger needs for one pass, wired from config and environment.
pub fn reconciler(
    config: &Config,
    dry_run: bool,
) -> Result<Reconciler, Box<dyn std::error::Error>> {
    let secrets = Secrets::from_env()?;
    let transport = Arc::new(ReqwestTransport::new(config.http_timeout())?);
    Ok(Reconciler::from_config(config, &secrets, transport)?.with_dry_run(dry_run))
}
