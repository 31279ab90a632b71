//! This demo shows how the error boundary turns the errors of a page
//! rendering service into redirects, fallback pages and unhandled errors.
//!
//! No server is bound: requests are served in-process, one per route, and
//! the outcome of each one is logged next to the diagnostics of the boundary.
//!
//! # Run the demo
//!
//! ```sh
//! RUST_LOG=debug cargo run --example error_boundary
//! ```
//!
//! # Expected output
//!
//! For every route you should see the diagnostics emitted by the boundary
//! (e.g. `not-found-error`, `send-server-error`, `redirect-found-error`),
//! followed by the status the client would receive.

use http::{HeaderValue, StatusCode, header};
use http_body_util::BodyExt;
use ssr_boundary::{
    BoxError, ErrorBoundaryHandler, ErrorBoundaryLayer, Layer, Request, RequestError, Response,
    Service, body,
    config::ErrorBoundaryConfig,
    fallback::{
        FallbackProps,
        manifest::{AssetManifest, EntryAssets, StaticAssetManifest},
    },
    hooks::hook_fn,
    service::service_fn,
};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const CONFIG: &str = r#"{
    "entry_point": "rootErrorBoundary",
    "redirect_status": 303
}"#;

fn error_page(props: &FallbackProps<'_>) -> Result<String, BoxError> {
    Ok(format!(
        "<!doctype html><html><head><title>Something went wrong</title></head>\
<body><h1>{status}</h1><p>{message}</p></body></html>",
        status = props.error.status,
        message = props.error.message,
    ))
}

async fn render_page(req: Request) -> Result<Response, RequestError> {
    match req.uri().path() {
        "/" => Ok(Response::new(body::full("<h1>home</h1>"))),
        "/account" => Err(RequestError::redirect("/login")),
        "/inventory" => Err(RequestError::http(
            StatusCode::SERVICE_UNAVAILABLE,
            "inventory service unavailable",
        )
        .with_backtrace()),
        "/upload" => Err(RequestError::server("Unsupported Media Type: text/csv")
            .with_status(StatusCode::UNSUPPORTED_MEDIA_TYPE)
            .with_code("FST_ERR_CTP_INVALID_MEDIA_TYPE")),
        "/api/orders" => Err(RequestError::server("order database unreachable")),
        _ => Err(RequestError::not_found()),
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config = ErrorBoundaryConfig::from_json(CONFIG)?;
    let manifest = AssetManifest::new().with_entry(
        &config.entry_point,
        EntryAssets {
            js: vec!["/static/error-boundary.js".to_owned()],
            css: vec!["/static/error-boundary.css".to_owned()],
        },
    );

    let handler = ErrorBoundaryHandler::try_from_config(&config)?
        .with_fallback(error_page)
        .with_asset_manifest(StaticAssetManifest::new(manifest))
        .with_before_hook(hook_fn(|err, req, _reply| {
            if !req.uri.path().starts_with("/api/") {
                return Ok(None);
            }
            let mut res = Response::new(body::full(format!(r#"{{"error":"{err}"}}"#)));
            *res.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            res.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            Ok(Some(res))
        }));

    let service = ErrorBoundaryLayer::new(handler).into_layer(service_fn(render_page));

    for path in ["/", "/account", "/inventory", "/upload", "/api/orders", "/missing"] {
        let req = http::Request::get(path)
            .header("x-request-id", format!("demo{}", path.replace('/', "-")))
            .body(body::empty())?;

        match service.serve(req).await {
            Ok(res) => {
                let status = res.status();
                let location = res.headers().get(header::LOCATION).cloned();
                let body = res.into_body().collect().await?.to_bytes();
                tracing::info!(
                    path,
                    %status,
                    location = ?location,
                    body.len = body.len(),
                    "request answered"
                );
            }
            Err(err) => {
                let res = err.into_response();
                tracing::warn!(path, status = %res.status(), "request left unhandled");
            }
        }
    }

    Ok(())
}
