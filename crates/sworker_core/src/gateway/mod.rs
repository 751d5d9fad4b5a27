//! HTTP front of the worker.
//!
//! Plays the browser's part: every incoming request becomes a fetch event
//! for the active version, control endpoints carry page signals, and a timer
//! delivers the periodic cleanup trigger.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use hyper::{Request, body::Incoming, server::conn::http1, service::service_fn};
use hyper_util::rt::TokioIo;
use sworker_cache::CacheStorage;
use sworker_config::SworkerConfig;
use sworker_http::Fetcher;
use tokio::{
    net::{TcpListener, TcpStream},
    time::interval,
};
use tracing::{debug, error, info, instrument, warn};

use crate::{clock::Clock, registration::Registration, sweeper::CleanupSchedule};

mod convert;
mod routes;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub(crate) struct GatewayState<S, F> {
    scope: String,
    registration: Arc<Registration<S, F>>,
    /// Used for requests the worker does not intercept.
    network: F,
}

pub struct Gateway<S, F> {
    listen: String,
    state: Arc<GatewayState<S, F>>,
    schedule: Arc<CleanupSchedule>,
    cleanup_check: Duration,
    clock: Arc<dyn Clock>,
}

impl<S, F> Gateway<S, F>
where
    S: CacheStorage + Clone + 'static,
    F: Fetcher + Clone + 'static,
{
    pub fn new(
        cfg: &SworkerConfig,
        registration: Arc<Registration<S, F>>,
        network: F,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let server = cfg.server();
        Self {
            listen: server.listen().to_string(),
            state: Arc::new(GatewayState {
                scope: cfg.worker().scope().to_string(),
                registration,
                network,
            }),
            schedule: Arc::new(CleanupSchedule::new(
                server.cleanup_min_interval_secs().saturating_mul(1000),
            )),
            cleanup_check: Duration::from_secs(server.cleanup_check_secs().max(1)),
            clock,
        }
    }

    /// Bind the listener and serve until the accept loop fails.
    #[instrument(skip(self), fields(listen = %self.listen))]
    pub async fn run(self) -> anyhow::Result<()> {
        info!(target: "sworker::gateway", "Starting gateway");

        let listener = match TcpListener::bind(&self.listen).await {
            Ok(l) => {
                info!(target: "sworker::gateway", listen = %self.listen, "Bind() successful");
                l
            }
            Err(e) => {
                error!(
                    target: "sworker::gateway",
                    listen = %self.listen,
                    error = ?e,
                    "Failed to bind listener"
                );
                return Err(e.into());
            }
        };

        self.serve(listener).await
    }

    /// Serve connections from an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        self.start_cleanup_timer();

        loop {
            let (stream, client_addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    // EMFILE and friends fail again immediately; back off.
                    warn!(target: "sworker::gateway", error = ?e, "accept() failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };

            let state = self.state.clone();
            tokio::spawn(async move {
                if let Err(e) = serve_connection(stream, client_addr, state).await {
                    debug!(
                        target: "sworker::gateway",
                        client = %client_addr,
                        error = ?e,
                        "Connection closed with error"
                    );
                }
            });
        }
    }

    /// Periodically deliver `cache-cleanup`, at most once per minimum interval.
    fn start_cleanup_timer(&self) {
        let registration = self.state.registration.clone();
        let schedule = self.schedule.clone();
        let clock = self.clock.clone();
        let check_every = self.cleanup_check;

        tokio::spawn(async move {
            let mut ticker = interval(check_every);
            loop {
                ticker.tick().await;
                if let Some(report) = registration
                    .cleanup_if_due(&schedule, clock.now_millis())
                    .await
                {
                    info!(
                        target: "sworker::gateway",
                        evicted = report.evicted,
                        failed = report.failed,
                        "Scheduled cache cleanup delivered"
                    );
                }
            }
        });
    }
}

#[instrument(skip(stream, state), fields(client = %client_addr))]
async fn serve_connection<S, F>(
    stream: TcpStream,
    client_addr: SocketAddr,
    state: Arc<GatewayState<S, F>>,
) -> anyhow::Result<()>
where
    S: CacheStorage + Clone + 'static,
    F: Fetcher + Clone + 'static,
{
    debug!(target: "sworker::gateway", "Handling new client connection");

    let io = TokioIo::new(stream);
    let service = service_fn(move |req: Request<Incoming>| {
        let state = state.clone();
        async move { routes::handle_request(req, state).await }
    });

    http1::Builder::new()
        .serve_connection(io, service)
        .await
        .context("HTTP/1 connection error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::ManualClock,
        settings::WorkerSettings,
        testing::{SCOPE, ScriptedFetcher, test_config},
        worker::Worker,
    };
    use sworker_cache::MemoryStorage;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn start() -> (SocketAddr, Arc<ScriptedFetcher>) {
        let cfg = test_config();
        let fetcher = Arc::new(ScriptedFetcher::with_bundle());
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(0));

        let registration = Arc::new(Registration::new(SCOPE));
        registration
            .install(Worker::new(
                WorkerSettings::from_config(&cfg),
                MemoryStorage::new(),
                fetcher.clone(),
                clock.clone(),
            ))
            .await
            .expect("install");

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let gateway = Gateway::new(&cfg, registration, fetcher.clone(), clock);
        tokio::spawn(gateway.serve(listener));
        (addr, fetcher)
    }

    async fn roundtrip(addr: SocketAddr, head: &str, body: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.expect("connect");
        let request = format!(
            "{head}\r\nHost: 127.0.0.1\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(request.as_bytes()).await.expect("write");
        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.expect("read");
        String::from_utf8_lossy(&raw).into_owned()
    }

    #[tokio::test]
    async fn cached_index_is_served_without_network() {
        let (addr, fetcher) = start().await;
        let calls_after_install = fetcher.calls();

        let response = roundtrip(addr, "GET /index.html HTTP/1.1", "").await;
        assert!(response.starts_with("HTTP/1.1 200"), "{response}");
        assert!(response.contains("x-sworker-outcome: served-cached"), "{response}");
        assert!(response.ends_with("<html>index</html>"), "{response}");
        assert_eq!(fetcher.calls(), calls_after_install);
    }

    #[tokio::test]
    async fn status_and_events_endpoints() {
        let (addr, _) = start().await;

        let status = roundtrip(addr, "GET /__worker/status HTTP/1.1", "").await;
        assert!(status.starts_with("HTTP/1.1 200"), "{status}");
        assert!(status.contains(r#""version":"1.0.0","state":"active""#), "{status}");

        let events = roundtrip(addr, "GET /__worker/events?since=0 HTTP/1.1", "").await;
        assert!(events.contains(r#""type":"controllerchange""#), "{events}");
    }

    #[tokio::test]
    async fn control_routes_check_method_and_body() {
        let (addr, _) = start().await;

        let wrong_method = roundtrip(addr, "GET /__worker/push HTTP/1.1", "").await;
        assert!(wrong_method.starts_with("HTTP/1.1 405"), "{wrong_method}");

        let malformed = roundtrip(addr, "POST /__worker/message HTTP/1.1", "not json").await;
        assert!(malformed.starts_with("HTTP/1.1 400"), "{malformed}");

        let push = roundtrip(addr, "POST /__worker/push HTTP/1.1", "hello").await;
        assert!(push.contains(r#""body":"hello""#), "{push}");

        let sweep = roundtrip(addr, "POST /__worker/sync/cache-cleanup HTTP/1.1", "").await;
        assert!(sweep.contains(r#""scanned":0"#), "{sweep}");
    }
}
