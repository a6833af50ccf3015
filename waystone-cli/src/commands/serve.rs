use std::sync::Arc;

use waystone_core::config::WaystoneConfig;
use waystone_core::{InterceptServer, Registration};

/// Register the configured version and serve until Ctrl-C.
pub async fn run(config: &WaystoneConfig) -> anyhow::Result<()> {
    let registration = Arc::new(Registration::from_config(config).await?);
    let state = registration.register(config.engine_config()?).await?;
    log::info!("Cache version {} is {}", config.cache.version, state);

    let origin = config.server.origin_url()?;
    InterceptServer::new(registration, config.server.listen_addr(), origin)
        .with_max_body_size(config.server.max_body_size)
        .serve()
        .await?;
    Ok(())
}
