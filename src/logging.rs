use color_eyre::eyre::{Result, eyre};
use tracing_subscriber::EnvFilter;

/// Picks the log filter: `RUST_LOG` wins, then `-v` flags, then the config file.
pub fn filter_directive(env: Option<&str>, verbosity: u8, configured: &str) -> String {
    if let Some(env) = env
        && !env.trim().is_empty()
    {
        return env.to_string();
    }
    match verbosity {
        0 => configured.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

pub fn init(verbosity: u8, configured: &str) -> Result<()> {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let directive = filter_directive(env.as_deref(), verbosity, configured);
    let filter = EnvFilter::try_new(&directive)
        .map_err(|e| eyre!("invalid log filter `{directive}`: {e}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| eyre!("failed to set tracing subscriber: {e}"))?;
    Ok(())
}
