use std::{
    net::SocketAddr,
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use anyhow::Context;
use clap::Parser;
use sled::Config as DbConfig;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::{
    DEFAULT_ADDRESS_FEED_URL,
    fetch::HttpFetcher,
    reconcile::Reconciler,
    server::{
        Schedule,
        SyncServer,
    },
    store::SledStore,
};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Path of the database, defaults to the platform data directory
    #[arg(long, env = "SLIVER_SYNC_DB_PATH")]
    pub db_path: Option<PathBuf>,
    /// Cache size in bytes
    #[arg(long, env = "SLIVER_SYNC_CACHE_SIZE", default_value = "1000000")]
    pub cache_size: usize,
    /// Trigger API address
    #[arg(long, env = "SLIVER_SYNC_LISTEN_ADDR", default_value = "0.0.0.0:5002")]
    pub listen_addr: SocketAddr,
    /// Log level
    #[arg(long, env = "SLIVER_SYNC_LOG_LEVEL", default_value = "info")]
    pub log_level: LevelFilter,
    /// Metrics server address
    #[arg(long, env = "SLIVER_SYNC_METRICS_ADDR", default_value = "0.0.0.0:9003")]
    pub metrics_addr: SocketAddr,
    /// Address feed of `fqdn,ipv4,ipv6` lines
    #[arg(long, env = "SLIVER_SYNC_ADDRESS_FEED_URL", default_value = DEFAULT_ADDRESS_FEED_URL)]
    pub address_feed_url: String,
    /// Timeout of a single feed request in seconds
    #[arg(long, env = "SLIVER_SYNC_FETCH_TIMEOUT_SECS", default_value = "30")]
    pub fetch_timeout_secs: u64,
    /// Monitoring feeds fetched concurrently during a status pass
    #[arg(long, env = "SLIVER_SYNC_MONITORING_CONCURRENCY", default_value = "4")]
    pub monitoring_concurrency: usize,
    /// Run the address pass every N seconds instead of waiting for a trigger
    #[arg(long, env = "SLIVER_SYNC_ADDRESS_INTERVAL_SECS")]
    pub address_interval_secs: Option<u64>,
    /// Run the status pass every N seconds instead of waiting for a trigger
    #[arg(long, env = "SLIVER_SYNC_STATUS_INTERVAL_SECS")]
    pub status_interval_secs: Option<u64>,
}

impl Config {
    /// Build the sliver sync server
    pub async fn build(self) -> anyhow::Result<SyncServer<SledStore, HttpFetcher>> {
        let address_feed_url = Url::parse(&self.address_feed_url)
            .with_context(|| format!("invalid address feed url: {}", self.address_feed_url))?;

        // Bind to an address
        let listener = TcpListener::bind(&self.listen_addr)
            .await
            .with_context(|| format!("failed to bind {}", self.listen_addr))?;
        tracing::info!(listen_addr = ?self.listen_addr, "Listening on address");

        // Get the database path
        let db_path = match &self.db_path {
            Some(db_path) => db_path.clone(),
            None => {
                directories::ProjectDirs::from("net", "measurementlab", "sliver-sync")
                    .context("no home directory to place the database in, pass --db-path")?
                    .data_dir()
                    .join("db")
            }
        };

        // Try to open the sled db
        let db: sled::Db = DbConfig::new()
            .path(db_path.clone())
            .cache_capacity_bytes(self.cache_size)
            .open()
            .with_context(|| format!("failed to open database at {}", db_path.display()))?;

        let store = SledStore::new(db)?;
        tracing::info!(
            database_size_bytes = store.size_on_disk()?,
            database_path = %db_path.display(),
            "Opened database"
        );

        let fetcher = HttpFetcher::new(Duration::from_secs(self.fetch_timeout_secs))?;
        let reconciler = Reconciler::new(Arc::new(store), fetcher, address_feed_url)
            .with_monitoring_concurrency(self.monitoring_concurrency);

        Ok(SyncServer {
            listener,
            reconciler: Arc::new(reconciler),
            schedule: self.schedule(),
        })
    }

    fn schedule(&self) -> Schedule {
        Schedule {
            address_interval: self.address_interval_secs.map(Duration::from_secs),
            status_interval: self.status_interval_secs.map(Duration::from_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio_util::sync::CancellationToken;

    fn test_config(db_path: PathBuf) -> Config {
        Config {
            db_path: Some(db_path),
            cache_size: 1024 * 1024,
            listen_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: LevelFilter::current(),
            metrics_addr: "127.0.0.1:0".parse().unwrap(),
            address_feed_url: DEFAULT_ADDRESS_FEED_URL.to_string(),
            fetch_timeout_secs: 5,
            monitoring_concurrency: 2,
            address_interval_secs: None,
            status_interval_secs: None,
        }
    }

    #[tokio::test]
    async fn test_server_random_port() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let server = test_config(dir.path().join("db")).build().await?;

        let listen_addr = server.listener.local_addr()?;
        // Check that we got a random port
        assert_ne!(listen_addr.port(), 0);

        let cancel_token = CancellationToken::new();
        let cancel_token_clone = cancel_token.clone();
        let task_handle = tokio::task::spawn(async move {
            server.run(cancel_token_clone).await.unwrap();
        });

        let health = reqwest::get(format!("http://{listen_addr}/health")).await?;
        assert_eq!(health.status(), 200);

        cancel_token.cancel();
        task_handle.await.unwrap();
        Ok(())
    }

    #[tokio::test]
    async fn build_rejects_invalid_feed_url() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path().join("db"));
        config.address_feed_url = "not a url".to_string();

        let err = config.build().await.err().unwrap();
        assert!(err.to_string().starts_with("invalid address feed url"));
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::try_parse_from(vec!["program"]).unwrap();

        assert_eq!(config.cache_size, 1000000);
        assert_eq!(config.listen_addr, "0.0.0.0:5002".parse().unwrap());
        assert_eq!(config.log_level, LevelFilter::INFO);
        assert_eq!(config.metrics_addr.to_string(), "0.0.0.0:9003");
        assert_eq!(config.address_feed_url, DEFAULT_ADDRESS_FEED_URL);
        assert_eq!(config.fetch_timeout_secs, 30);
        assert_eq!(config.monitoring_concurrency, 4);
        assert!(config.db_path.is_none());
        assert_eq!(config.schedule(), Schedule::default());
    }

    #[test]
    fn test_config_args() {
        let config = Config::try_parse_from(vec![
            "program",
            "--cache-size",
            "2000000",
            "--listen-addr",
            "127.0.0.1:8080",
            "--log-level",
            "debug",
            "--db-path",
            "/tmp/test-db",
            "--address-feed-url",
            "http://127.0.0.1:9000/hosts.txt",
            "--address-interval-secs",
            "300",
        ])
        .unwrap();

        assert_eq!(config.cache_size, 2000000);
        assert_eq!(config.listen_addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.log_level, LevelFilter::DEBUG);
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/test-db")));
        assert_eq!(config.address_feed_url, "http://127.0.0.1:9000/hosts.txt");
        assert_eq!(
            config.schedule(),
            Schedule {
                address_interval: Some(Duration::from_secs(300)),
                status_interval: None,
            }
        );
    }
}
