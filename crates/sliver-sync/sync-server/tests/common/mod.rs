use std::{
    net::SocketAddr,
    sync::Arc,
    time::Duration,
};

use chrono::{
    DateTime,
    Utc,
};
use sliver_sync_core::{
    MonitoringConfig,
    Slice,
    SliverTool,
    Status,
};
use sliver_sync_server::{
    HttpFetcher,
    Reconciler,
    Schedule,
    SledStore,
    SliverStore,
    SyncServer,
};
use tokio::{
    net::TcpListener,
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::{
    Mock,
    MockServer,
    ResponseTemplate,
    matchers::path,
};

pub const ADDRESS_FEED_PATH: &str = "/mlab-host-ips.txt";
pub const MONITORING_PATH: &str = "/baseList";
pub const USERNAME: &str = "reader";
pub const PASSWORD: &str = "secret";

/// A running sync server backed by a temporary store and a mock feed server.
pub struct TestServer {
    pub addr: SocketAddr,
    pub feeds: MockServer,
    pub store: Arc<SledStore>,
    cancel_token: CancellationToken,
    handle: JoinHandle<anyhow::Result<()>>,
    _dir: tempfile::TempDir,
}

impl TestServer {
    pub async fn start() -> Self {
        let feeds = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let db = sled::Config::new().path(dir.path().join("db")).open().unwrap();
        let store = Arc::new(SledStore::new(db).unwrap());
        store
            .put_monitoring_config(&MonitoringConfig {
                url: format!("{}{MONITORING_PATH}", feeds.uri()),
                username: USERNAME.to_string(),
                password: PASSWORD.to_string(),
            })
            .unwrap();

        // Monitoring requests without credentials are challenged first.
        Mock::given(path(MONITORING_PATH))
            .respond_with(
                ResponseTemplate::new(401).insert_header("WWW-Authenticate", r#"Basic realm="nagios""#),
            )
            .with_priority(10)
            .mount(&feeds)
            .await;

        let address_feed_url = Url::parse(&format!("{}{ADDRESS_FEED_PATH}", feeds.uri())).unwrap();
        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
        let reconciler = Reconciler::new(store.clone(), fetcher, address_feed_url);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = SyncServer {
            listener,
            reconciler: Arc::new(reconciler),
            schedule: Schedule::default(),
        };

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(server.run(cancel_token.clone()));

        Self {
            addr,
            feeds,
            store,
            cancel_token,
            handle,
            _dir: dir,
        }
    }

    /// POST to a trigger endpoint and return the status code and body.
    pub async fn trigger(&self, path: &str) -> (u16, String) {
        let response = reqwest::Client::new()
            .post(format!("http://{}{path}", self.addr))
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.text().await.unwrap())
    }

    pub fn seed(&self, tool: &SliverTool) {
        self.store.put_slice(&Slice {
            tool_id: tool.tool_id.clone(),
        })
        .unwrap();
        self.store.put_sliver_tool(tool).unwrap();
    }

    pub fn stored(&self, fqdn: &str) -> SliverTool {
        let mut tools = self.store.sliver_tools_by_fqdn(fqdn).unwrap();
        assert_eq!(tools.len(), 1, "expected exactly one record for {fqdn}");
        tools.remove(0)
    }

    pub async fn shutdown(self) {
        self.cancel_token.cancel();
        self.handle.await.unwrap().unwrap();
    }
}

pub fn sliver_tool(tool_id: &str, server_id: &str, fqdn: &str) -> SliverTool {
    SliverTool {
        tool_id: tool_id.to_string(),
        slice_id: format!("iupui_{tool_id}"),
        server_id: server_id.to_string(),
        site_id: "nuq01".to_string(),
        fqdn: fqdn.to_string(),
        sliver_ipv4: "192.0.2.1".to_string(),
        sliver_ipv6: "2001:db8::1".to_string(),
        status_ipv4: Status::Online,
        status_ipv6: Status::Online,
        when: DateTime::<Utc>::UNIX_EPOCH,
    }
}
