use waystone_core::cache::NamespaceManager;
use waystone_core::config::WaystoneConfig;
use waystone_core::Registration;

/// Install (and activate) the configured version without serving.
pub async fn install(config: &WaystoneConfig) -> anyhow::Result<()> {
    let registration = Registration::from_config(config).await?;
    let state = registration.register(config.engine_config()?).await?;
    registration.drain().await;

    println!("Installed cache version {} ({})", config.cache.version, state);
    Ok(())
}

/// Print every namespace with its entry count; current ones are marked.
pub async fn namespaces(config: &WaystoneConfig) -> anyhow::Result<()> {
    for line in namespace_report(config).await? {
        println!("{}", line);
    }
    Ok(())
}

async fn namespace_report(config: &WaystoneConfig) -> anyhow::Result<Vec<String>> {
    let storage = config.open_storage().await?;
    let current = config.engine_config()?.cache_names();

    let mut lines = Vec::new();
    for name in storage.namespaces().await? {
        let marker = if current.contains(&name) { "*" } else { " " };
        lines.push(format!("{} {} ({} entries)", marker, name, storage.len(&name).await?));
    }
    Ok(lines)
}

/// Delete every namespace that belongs to another version.
pub async fn purge(config: &WaystoneConfig) -> anyhow::Result<()> {
    let purged = purge_stale(config).await?;
    if purged.is_empty() {
        println!("Nothing to purge");
    }
    for name in purged {
        println!("Purged {}", name);
    }
    Ok(())
}

async fn purge_stale(config: &WaystoneConfig) -> anyhow::Result<Vec<String>> {
    let storage = config.open_storage().await?;
    let manager = NamespaceManager::new(storage, config.engine_config()?.cache_names());
    Ok(manager.purge_stale().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use waystone_core::cache::{CacheStorage, FileCacheStorage};
    use waystone_core::http::RequestKey;
    use waystone_core::StoredResponse;

    fn config_in(dir: &std::path::Path, version: &str) -> WaystoneConfig {
        let mut config = WaystoneConfig::default();
        config.storage.backend = "file".to_string();
        config.storage.data_dir = dir.display().to_string();
        config.cache.version = version.to_string();
        config
    }

    async fn seed(dir: &std::path::Path, namespace: &str) {
        let storage = FileCacheStorage::open_dir(dir).await.unwrap();
        let key = RequestKey::new(&http::Method::GET, &"http://127.0.0.1:8000/a.css".parse().unwrap());
        storage.put(namespace, key, StoredResponse::new(200, "a")).await.unwrap();
    }

    #[tokio::test]
    async fn test_namespace_report_marks_current() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path(), "runtime-v1").await;
        seed(dir.path(), "runtime-v0").await;

        let report = namespace_report(&config_in(dir.path(), "v1")).await.unwrap();
        assert_eq!(report, vec!["  runtime-v0 (1 entries)", "* runtime-v1 (1 entries)"]);
    }

    #[tokio::test]
    async fn test_purge_keeps_current_version() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path(), "runtime-v1").await;
        seed(dir.path(), "precache-v0").await;

        let purged = purge_stale(&config_in(dir.path(), "v1")).await.unwrap();
        assert_eq!(purged, vec!["precache-v0".to_string()]);

        let storage = FileCacheStorage::open_dir(dir.path()).await.unwrap();
        assert_eq!(storage.namespaces().await.unwrap(), vec!["runtime-v1".to_string()]);
    }
}
