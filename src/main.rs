use std::{process, sync::Arc};

use ink::{
    application::{
        error::AppError,
        render::{ComrakRenderer, MarkdownRenderer},
    },
    cache::{CacheConfig, ContentCacheManager, NotifyWatcher, WatchCoordinator, WatchRegistry},
    config,
    infra::{
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let cache_config = CacheConfig::from(&settings.content);
    let renderer: Arc<dyn MarkdownRenderer> = Arc::new(ComrakRenderer::new());
    let content = Arc::new(ContentCacheManager::new(cache_config, renderer)?);
    info!(
        root = %content.root().dir().display(),
        extension = %content.root().extension(),
        capacity = content.config().capacity,
        categories = content.categories().len(),
        "Content root opened"
    );

    let (watcher, events) = NotifyWatcher::new().map_err(InfraError::from)?;
    let watcher = Arc::new(watcher);
    let coordinator = Arc::new(WatchCoordinator::new(
        Arc::clone(&content),
        Arc::clone(&watcher) as Arc<dyn WatchRegistry>,
    ));
    coordinator.start().map_err(InfraError::from)?;
    let consumer_handle = tokio::spawn(Arc::clone(&coordinator).run(events));

    let result = serve_http(&settings, HttpState::new(content, settings.site.clone())).await;

    watcher.close();
    match tokio::time::timeout(settings.server.graceful_shutdown, consumer_handle).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(error = %err, "Watch coordinator task failed"),
        Err(_) => warn!(
            timeout_secs = settings.server.graceful_shutdown.as_secs(),
            "Watch coordinator did not stop before the shutdown deadline"
        ),
    }

    result
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.addr, "Listening");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C; shutting down"),
        () = terminate => info!("Received SIGTERM; shutting down"),
    }
}
