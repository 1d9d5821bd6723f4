use std::net::TcpListener;

use actix_web::dev::{Server, ServerHandle};
use actix_web::{App, HttpServer, web};
use fanout::FanOutPool;
use fanout::clients::BoundedHttpClient;
use fanout::concurrency::shutdown::ShutdownTx;
use fanout_config::shared::RunnerConfig;
use tracing_actix_web::TracingLogger;

use crate::routes::health_check::health_check;
use crate::routes::proxy::{ProxyTarget, proxy};
use crate::routes::squares::squares;

/// Runner HTTP server wrapper.
pub struct Application {
    port: u16,
    server: Server,
}

impl Application {
    /// Binds the listener and configures the HTTP server.
    pub fn build(
        config: &RunnerConfig,
        pool: FanOutPool,
        shutdown_tx: ShutdownTx,
    ) -> anyhow::Result<Self> {
        let address = format!("{}:{}", config.proxy.host, config.proxy.port);
        let listener = TcpListener::bind(address)?;
        let port = listener.local_addr()?.port();

        let client = BoundedHttpClient::new(config.proxy.timeout())?;
        let target = ProxyTarget {
            upstream_url: config.proxy.upstream_url.clone(),
        };

        let server = run(listener, client, target, pool, shutdown_tx)?;

        Ok(Self { port, server })
    }

    /// Returns the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns a handle able to stop the server.
    pub fn handle(&self) -> ServerHandle {
        self.server.handle()
    }

    /// Runs the server until it is stopped.
    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

/// Creates the HTTP server with every route and its shared state.
///
/// Signal handling is left to the caller, which also has to shut down running batches.
pub fn run(
    listener: TcpListener,
    client: BoundedHttpClient,
    target: ProxyTarget,
    pool: FanOutPool,
    shutdown_tx: ShutdownTx,
) -> Result<Server, anyhow::Error> {
    let client = web::Data::new(client);
    let target = web::Data::new(target);
    let pool = web::Data::new(pool);
    let shutdown_tx = web::Data::new(shutdown_tx);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .service(health_check)
            .service(proxy)
            .service(squares)
            .app_data(client.clone())
            .app_data(target.clone())
            .app_data(pool.clone())
            .app_data(shutdown_tx.clone())
    })
    .disable_signals()
    .listen(listener)?
    .run();

    Ok(server)
}
