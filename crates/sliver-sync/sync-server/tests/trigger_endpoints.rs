mod common;

use chrono::{
    DateTime,
    Utc,
};
use common::{
    ADDRESS_FEED_PATH,
    MONITORING_PATH,
    PASSWORD,
    TestServer,
    USERNAME,
    sliver_tool,
};
use pretty_assertions::assert_eq;
use sliver_sync_core::Status;
use sliver_sync_server::api::{
    ADDRESS_UPDATE_PATH,
    STATUS_UPDATE_PATH,
};
use wiremock::{
    Mock,
    ResponseTemplate,
    matchers::{
        basic_auth,
        method,
        path,
        query_param,
    },
};

const HOST1: &str = "host1.example.org";

async fn serve_address_feed(server: &TestServer, body: &str) {
    Mock::given(method("GET"))
        .and(path(ADDRESS_FEED_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server.feeds)
        .await;
}

async fn serve_monitoring_feed(server: &TestServer, service_name: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(MONITORING_PATH))
        .and(query_param("show_state", "1"))
        .and(query_param("service_name", service_name))
        .and(basic_auth(USERNAME, PASSWORD))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server.feeds)
        .await;
}

#[tokio::test]
async fn address_feed_line_with_empty_ipv6_disables_it() {
    let server = TestServer::start().await;
    server.seed(&sliver_tool("ndt", "mlab1", HOST1));
    serve_address_feed(&server, "host1.example.org,10.0.0.1,\n").await;

    let (status, body) = server.trigger(ADDRESS_UPDATE_PATH).await;
    assert_eq!((status, body.as_str()), (200, "OK"));

    let tool = server.stored(HOST1);
    assert_eq!(tool.sliver_ipv4, "10.0.0.1");
    assert_eq!(tool.sliver_ipv6, "off");

    server.shutdown().await;
}

#[tokio::test]
async fn offline_report_marks_ipv4_offline() {
    let server = TestServer::start().await;
    let mut tool = sliver_tool("ndt", "mlab1", HOST1);
    tool.sliver_ipv4 = "10.0.0.1".to_string();
    server.seed(&tool);
    serve_monitoring_feed(&server, "ndt", "host1.example.org/ndt 2 1 CRITICAL\n").await;
    serve_monitoring_feed(&server, "ndt_ipv6", "host1.example.org/ndt_ipv6 0 1 OK\n").await;

    let before = Utc::now();
    let (status, _) = server.trigger(STATUS_UPDATE_PATH).await;
    assert_eq!(status, 200);

    let tool = server.stored(HOST1);
    assert_eq!(tool.status_ipv4, Status::Offline);
    assert_eq!(tool.status_ipv6, Status::Online);
    assert!(tool.when >= before);

    server.shutdown().await;
}

#[tokio::test]
async fn disabled_ipv6_stays_offline_despite_online_report() {
    let server = TestServer::start().await;
    let mut tool = sliver_tool("ndt", "mlab1", HOST1);
    tool.sliver_ipv6 = "off".to_string();
    server.seed(&tool);
    serve_monitoring_feed(&server, "ndt", "host1.example.org/ndt 0\n").await;
    serve_monitoring_feed(&server, "ndt_ipv6", "host1.example.org/ndt_ipv6 0\n").await;

    let (status, _) = server.trigger(STATUS_UPDATE_PATH).await;
    assert_eq!(status, 200);

    let tool = server.stored(HOST1);
    assert_eq!(tool.status_ipv4, Status::Online);
    assert_eq!(tool.status_ipv6, Status::Offline);

    server.shutdown().await;
}

#[tokio::test]
async fn empty_monitoring_feed_skips_only_its_unit() {
    let server = TestServer::start().await;
    server.seed(&sliver_tool("ndt", "mlab1", HOST1));
    serve_monitoring_feed(&server, "ndt", "\n").await;
    serve_monitoring_feed(&server, "ndt_ipv6", "host1.example.org/ndt_ipv6 2\n").await;

    let (status, _) = server.trigger(STATUS_UPDATE_PATH).await;
    assert_eq!(status, 200);

    let tool = server.stored(HOST1);
    // The ipv4 unit was rejected and left the record alone.
    assert_eq!(tool.status_ipv4, Status::Online);
    assert_eq!(tool.status_ipv6, Status::Offline);
    assert_ne!(tool.when, DateTime::<Utc>::UNIX_EPOCH);

    server.shutdown().await;
}

#[tokio::test]
async fn address_feed_outage_is_reported() {
    let server = TestServer::start().await;
    server.seed(&sliver_tool("ndt", "mlab1", HOST1));
    Mock::given(method("GET"))
        .and(path(ADDRESS_FEED_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server.feeds)
        .await;

    let (status, body) = server.trigger(ADDRESS_UPDATE_PATH).await;
    assert_eq!(status, 500);
    assert!(body.contains("503"), "unexpected body: {body}");
    assert_eq!(server.stored(HOST1).sliver_ipv4, "192.0.2.1");

    server.shutdown().await;
}
