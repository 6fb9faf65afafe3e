use core::convert::Infallible;
use std::{
    net::SocketAddr,
    sync::Arc,
};

use http_body_util::Full;
use hyper::{
    Method,
    Request,
    StatusCode,
    body::Bytes,
};

use crate::{
    api::{
        ADDRESS_UPDATE_PATH,
        STATUS_UPDATE_PATH,
    },
    error::SyncError,
    fetch::FeedFetcher,
    reconcile::Reconciler,
    store::SliverStore,
};

macro_rules! text_response {
    (
        $status:expr,
        $body:expr
    ) => {
        Ok(hyper::Response::builder()
            .status($status)
            .header(hyper::header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(Full::new(Bytes::from($body)))
            .unwrap_or_default())
    };
}

/// Routes an incoming HTTP request to the matching reconciliation pass or
/// health check.
#[tracing::instrument(level = "info", skip_all, target = "api::accept_request", fields(client_addr = %client_addr))]
pub async fn accept_request<B, S, F>(
    req: Request<B>,
    reconciler: Arc<Reconciler<S, F>>,
    client_addr: SocketAddr,
) -> Result<hyper::Response<Full<Bytes>>, Infallible>
where
    S: SliverStore + 'static,
    F: FeedFetcher,
{
    let path = req.uri().path();
    let method = req.method().clone();
    let is_trigger = method == Method::GET || method == Method::POST;

    match path {
        "/health" if method == Method::GET => text_response!(StatusCode::OK, "ok"),
        "/ready" if method == Method::GET => {
            let store = reconciler.store().clone();
            let ready = tokio::task::spawn_blocking(move || check_store_readiness(store.as_ref()))
                .await
                .unwrap_or(false);
            if ready {
                text_response!(StatusCode::OK, "ready")
            } else {
                text_response!(StatusCode::SERVICE_UNAVAILABLE, "not ready")
            }
        }
        ADDRESS_UPDATE_PATH if is_trigger => {
            tracing::info!(target: "api", "Address pass triggered");
            acknowledge(reconciler.sync_addresses().await)
        }
        STATUS_UPDATE_PATH if is_trigger => {
            tracing::info!(target: "api", "Status pass triggered");
            acknowledge(reconciler.sync_statuses().await)
        }
        _ => text_response!(StatusCode::NOT_FOUND, "not found"),
    }
}

fn acknowledge(result: Result<(), SyncError>) -> Result<hyper::Response<Full<Bytes>>, Infallible> {
    match result {
        Ok(()) => text_response!(StatusCode::OK, "OK"),
        Err(err) => text_response!(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

fn check_store_readiness<S: SliverStore>(store: &S) -> bool {
    store.monitoring_config().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::test_utils::{
        ADDRESS_FEED,
        StubFetcher,
        reconciler,
        sliver_tool,
        tmp_store,
    };
    use http_body_util::{
        BodyExt,
        Empty,
    };
    use pretty_assertions::assert_eq;

    async fn call<S, F>(
        reconciler: &Arc<Reconciler<S, F>>,
        method: Method,
        path: &str,
    ) -> (StatusCode, String)
    where
        S: SliverStore + 'static,
        F: FeedFetcher,
    {
        let req = Request::builder()
            .method(method)
            .uri(path)
            .body(Empty::<Bytes>::new())
            .unwrap();
        let resp = accept_request(req, reconciler.clone(), "127.0.0.1:40000".parse().unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn address_trigger_acknowledges_with_ok() {
        let store = tmp_store();
        store
            .put_sliver_tool(&sliver_tool("ndt", "mlab1", "host1.example.org"))
            .unwrap();
        let fetcher = StubFetcher::default().with(
            ADDRESS_FEED,
            "host1.example.org,10.0.0.1,\nnot-a-line\nmissing.example.org,10.0.0.9,\n",
        );
        let reconciler = Arc::new(reconciler(store, fetcher));

        let (status, body) = call(&reconciler, Method::POST, ADDRESS_UPDATE_PATH).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");
    }

    #[tokio::test]
    async fn address_trigger_reports_fetch_failure() {
        let reconciler = Arc::new(reconciler(tmp_store(), StubFetcher::default()));

        let (status, body) = call(&reconciler, Method::GET, ADDRESS_UPDATE_PATH).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.starts_with("failed to fetch address feed"));
    }

    #[tokio::test]
    async fn unsupported_method_is_not_found() {
        let reconciler = Arc::new(reconciler(tmp_store(), StubFetcher::default()));

        let (status, _) = call(&reconciler, Method::DELETE, STATUS_UPDATE_PATH).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&reconciler, Method::POST, "/health").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_and_ready_endpoints() {
        let reconciler = Arc::new(reconciler(tmp_store(), StubFetcher::default()));

        assert_eq!(
            call(&reconciler, Method::GET, "/health").await,
            (StatusCode::OK, "ok".to_string())
        );
        assert_eq!(
            call(&reconciler, Method::GET, "/ready").await,
            (StatusCode::OK, "ready".to_string())
        );
    }
}

/// Serves one connection with [`accept_request`](crate::api::accept::accept_request).
#[macro_export]
macro_rules! accept {
    (
        $io:expr,
        $reconciler:expr,
        $client_addr:expr
    ) => {
        let reconciler = $reconciler.clone();
        let client_addr = $client_addr;
        // Bind the incoming connection to our service
        if let Err(err) = hyper::server::conn::http1::Builder::new()
            // `service_fn` converts our function in a `Service`
            .serve_connection(
                $io,
                hyper::service::service_fn(move |req| {
                    let reconciler = reconciler.clone();
                    async move {
                        $crate::api::accept::accept_request(req, reconciler, client_addr).await
                    }
                }),
            )
            .await
        {
            tracing::error!(target: "api", ?err, "Error serving connection");
        }
    };
}
