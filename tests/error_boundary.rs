use http::{HeaderValue, StatusCode, header};
use http_body_util::BodyExt;
use parking_lot::Mutex;
use ssr_boundary::{
    BoundaryError, BoxError, ErrorBoundaryHandler, ErrorBoundaryLayer, ErrorKind, Layer, Request,
    RequestError, Response, Service, body,
    classify::{LogEvent, LogLevel},
    diagnostics::MemoryDiagnostics,
    error::HookStage,
    fallback::{
        FallbackProps,
        manifest::{AssetManifest, EntryAssets, StaticAssetManifest},
    },
    hooks::hook_fn,
    request::RequestHead,
    service::service_fn,
};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use tracing_test::traced_test;

fn failing_service(
    error: fn() -> RequestError,
) -> impl Service<Request, Response = Response, Error = RequestError> {
    service_fn(move |_req: Request| async move { Err::<Response, _>(error()) })
}

fn request(uri: &str) -> Request {
    http::Request::get(uri)
        .header("x-request-id", "req-42")
        .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
        .body(body::empty())
        .unwrap()
}

fn manifest() -> StaticAssetManifest {
    StaticAssetManifest::new(AssetManifest::new().with_entry(
        "rootErrorBoundary",
        EntryAssets {
            js: vec!["/static/error-boundary.js".to_owned()],
            css: vec!["/static/error-boundary.css".to_owned()],
        },
    ))
}

fn error_page(props: &FallbackProps<'_>) -> Result<String, BoxError> {
    Ok(format!(
        "<!doctype html><html><head><title>{status}</title></head>\
<body><h1>{message}</h1><p>while loading {url}</p></body></html>",
        status = props.error.status,
        message = props.error.message,
        url = props.url,
    ))
}

async fn body_string(res: Response) -> String {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn redirect_skips_classification_and_fallback() {
    let diagnostics = MemoryDiagnostics::new();
    let renders = Arc::new(AtomicUsize::new(0));
    let after_calls = Arc::new(AtomicUsize::new(0));

    let handler = ErrorBoundaryHandler::new()
        .with_diagnostics(diagnostics.clone())
        .with_after_hook(hook_fn({
            let after_calls = after_calls.clone();
            move |_, _, _| {
                after_calls.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            }
        }))
        .with_fallback({
            let renders = renders.clone();
            move |props: &FallbackProps<'_>| {
                renders.fetch_add(1, Ordering::SeqCst);
                error_page(props)
            }
        })
        .with_asset_manifest(manifest());

    let svc = ErrorBoundaryLayer::new(handler)
        .into_layer(failing_service(|| RequestError::redirect("/login")));

    let res = svc.serve(request("/account")).await.unwrap();
    assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(res.headers()[header::LOCATION], "/login");
    assert_eq!(
        res.headers()[header::CACHE_CONTROL],
        "no-store, no-cache, must-revalidate"
    );
    assert!(body_string(res).await.is_empty());

    assert_eq!(renders.load(Ordering::SeqCst), 0);
    assert_eq!(after_calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        diagnostics.events(),
        vec![(LogLevel::Info, LogEvent::RedirectFound)]
    );
}

#[tokio::test]
async fn before_hook_takes_over_the_response() {
    let diagnostics = MemoryDiagnostics::new();
    let after_calls = Arc::new(AtomicUsize::new(0));

    let handler = ErrorBoundaryHandler::new()
        .with_diagnostics(diagnostics.clone())
        .with_before_hook(hook_fn(|err, req, reply| {
            if req.uri.path().starts_with("/api/") {
                let mut res = Response::new(body::full(format!(r#"{{"error":"{err}"}}"#)));
                *res.status_mut() = StatusCode::BAD_GATEWAY;
                return Ok(Some(res));
            }
            reply.header(header::VARY, HeaderValue::from_static("accept"));
            Ok(None)
        }))
        .with_after_hook(hook_fn({
            let after_calls = after_calls.clone();
            move |_, _, _| {
                after_calls.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            }
        }));

    let svc = ErrorBoundaryLayer::new(handler)
        .into_layer(failing_service(|| RequestError::server("upstream down")));

    let res = svc.serve(request("/api/cart")).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_string(res).await, r#"{"error":"upstream down"}"#);

    assert!(diagnostics.entries().is_empty());
    assert_eq!(after_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn after_hook_takes_over_after_logging_once() {
    let diagnostics = MemoryDiagnostics::new();
    let seen_header = Arc::new(Mutex::new(None));

    let handler = ErrorBoundaryHandler::new()
        .with_diagnostics(diagnostics.clone())
        .with_fallback(error_page)
        .with_asset_manifest(manifest())
        .with_before_hook(hook_fn(|_, _, reply| {
            reply.header(header::VARY, HeaderValue::from_static("cookie"));
            Ok(None)
        }))
        .with_after_hook(hook_fn({
            let seen_header = seen_header.clone();
            move |_, _, reply| {
                *seen_header.lock() = reply.headers().get(header::VARY).cloned();
                let mut res = Response::new(body::full("maintenance"));
                *res.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
                Ok(Some(res))
            }
        }));

    let svc = ErrorBoundaryLayer::new(handler).into_layer(failing_service(|| {
        RequestError::http(StatusCode::INTERNAL_SERVER_ERROR, "database unreachable")
    }));

    let res = svc.serve(request("/checkout")).await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_string(res).await, "maintenance");

    assert_eq!(seen_header.lock().as_ref().unwrap(), "cookie");
    assert_eq!(
        diagnostics.events(),
        vec![(LogLevel::Error, LogEvent::SendServerError)]
    );
}

#[tokio::test]
async fn domain_error_renders_fallback_with_classified_status() {
    let diagnostics = MemoryDiagnostics::new();
    let handler = ErrorBoundaryHandler::new()
        .with_diagnostics(diagnostics.clone())
        .with_fallback(error_page)
        .with_asset_manifest(manifest())
        .with_before_hook(hook_fn(|_, _, reply| {
            reply.header(header::VARY, HeaderValue::from_static("cookie"));
            Ok(None)
        }));

    let svc = ErrorBoundaryLayer::new(handler).into_layer(failing_service(|| {
        RequestError::http(StatusCode::SERVICE_UNAVAILABLE, "inventory service unavailable")
    }));

    let res = svc.serve(request("/products/7?ref=home")).await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        res.headers()[header::CONTENT_TYPE],
        "text/html; charset=utf-8"
    );
    assert_eq!(
        res.headers()[header::CACHE_CONTROL],
        "no-store, no-cache, must-revalidate"
    );
    assert_eq!(res.headers()[header::VARY], "cookie");
    let content_length: usize = res.headers()[header::CONTENT_LENGTH]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();

    let markup = body_string(res).await;
    assert_eq!(content_length, markup.len());
    assert!(markup.contains("<h1>inventory service unavailable</h1>"));
    assert!(markup.contains("<p>while loading /products/7?ref=home</p>"));
    assert!(markup.contains(r#"window.serverUrl = {"href":"/products/7?ref=home""#));
    assert!(markup.contains(
        r#"Object.assign(new Error("inventory service unavailable"), {"status":503,"message":"inventory service unavailable"})"#
    ));
    assert!(markup.contains(r#"<link rel="stylesheet" href="/static/error-boundary.css">"#));
    assert!(markup.contains(r#"<script src="/static/error-boundary.js" defer"#));

    let entries = diagnostics.entries();
    assert_eq!(
        diagnostics.events(),
        vec![
            (LogLevel::Error, LogEvent::SendServerError),
            (LogLevel::Debug, LogEvent::RenderFallback),
        ]
    );
    let info = entries[0].request_info.as_ref().unwrap();
    assert_eq!(info.request_id.as_deref(), Some("req-42"));
    assert_eq!(info.ip.as_deref(), Some("203.0.113.9"));
    assert_eq!(info.url, "/products/7?ref=home");
    assert!(entries[0].message.contains("fallback page will be rendered"));
}

#[tokio::test]
async fn failed_fallback_hands_back_the_original_error() {
    let diagnostics = MemoryDiagnostics::new();
    let handler = ErrorBoundaryHandler::new()
        .with_diagnostics(diagnostics.clone())
        .with_fallback(error_page)
        .with_asset_manifest(manifest())
        .with_entry_point("missingEntryPoint");

    let svc = ErrorBoundaryLayer::new(handler).into_layer(failing_service(|| {
        RequestError::http(StatusCode::SERVICE_UNAVAILABLE, "inventory service unavailable")
            .with_stack("at inventory (inventory.rs:12)")
    }));

    let err = svc.serve(request("/products/7")).await.unwrap_err();
    assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    let original = err.into_request_error().unwrap();
    assert_eq!(original.message(), "inventory service unavailable");
    assert_eq!(original.stack(), Some("at inventory (inventory.rs:12)"));
    assert_eq!(
        original.kind(),
        &ErrorKind::Http {
            status: Some(StatusCode::SERVICE_UNAVAILABLE)
        }
    );

    assert_eq!(
        diagnostics.events(),
        vec![
            (LogLevel::Error, LogEvent::SendServerError),
            (LogLevel::Debug, LogEvent::RenderFallback),
            (LogLevel::Warn, LogEvent::FailedFallbackRender),
        ]
    );
    let entries = diagnostics.entries();
    let failure = &entries[2];
    assert!(failure.message.contains("missingEntryPoint"));
    assert_eq!(
        failure.error.as_deref(),
        Some("inventory service unavailable")
    );
}

#[tokio::test]
async fn not_found_without_fallback_is_unhandled() {
    let diagnostics = MemoryDiagnostics::new();
    let handler = ErrorBoundaryHandler::new().with_diagnostics(diagnostics.clone());

    let svc = ErrorBoundaryLayer::new(handler).into_layer(failing_service(RequestError::not_found));

    let err = svc.serve(request("/nope")).await.unwrap_err();
    assert!(matches!(
        &err,
        BoundaryError::Unhandled { status, .. } if *status == StatusCode::NOT_FOUND
    ));

    let res = err.into_response();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(body_string(res).await.is_empty());

    let entries = diagnostics.entries();
    assert_eq!(
        diagnostics.events(),
        vec![(LogLevel::Info, LogEvent::NotFound)]
    );
    assert!(entries[0].message.contains("Register an error boundary"));
}

#[tokio::test]
async fn server_rejection_is_a_generic_client_error() {
    let diagnostics = MemoryDiagnostics::new();
    let handler = ErrorBoundaryHandler::new()
        .with_diagnostics(diagnostics.clone())
        .with_fallback(error_page)
        .with_asset_manifest(manifest());

    let svc = ErrorBoundaryLayer::new(handler).into_layer(failing_service(|| {
        RequestError::server("Unsupported Media Type: text/csv")
            .with_status(StatusCode::UNSUPPORTED_MEDIA_TYPE)
            .with_code("FST_ERR_CTP_INVALID_MEDIA_TYPE")
    }));

    let res = svc.serve(request("/upload")).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let entries = diagnostics.entries();
    assert_eq!(entries[0].level, LogLevel::Info);
    assert_eq!(entries[0].event, LogEvent::GenericClientError);
    assert!(entries[0].message.starts_with("FST_ERR_CTP_INVALID_MEDIA_TYPE"));
}

#[tokio::test]
async fn failing_hooks_propagate() {
    let before = ErrorBoundaryHandler::new()
        .with_diagnostics(MemoryDiagnostics::new())
        .with_before_hook(hook_fn(|_, _, _| Err("session store offline".into())));
    let err = before
        .handle(
            RequestError::not_found(),
            &RequestHead::from_request(&request("/")),
        )
        .await
        .unwrap_err();
    match err {
        BoundaryError::Hook { stage, source } => {
            assert_eq!(stage, HookStage::Before);
            assert_eq!(source.to_string(), "session store offline");
        }
        other => panic!("unexpected error: {other}"),
    }

    let diagnostics = MemoryDiagnostics::new();
    let after = ErrorBoundaryHandler::new()
        .with_diagnostics(diagnostics.clone())
        .with_after_hook(hook_fn(|_, _, _| Err("metrics push failed".into())));
    let err = after
        .handle(
            RequestError::not_found(),
            &RequestHead::from_request(&request("/")),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BoundaryError::Hook {
            stage: HookStage::After,
            ..
        }
    ));
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        diagnostics.events(),
        vec![(LogLevel::Info, LogEvent::NotFound)]
    );
}

#[tokio::test]
#[traced_test]
async fn default_diagnostics_log_through_tracing() {
    let svc = ErrorBoundaryLayer::new(ErrorBoundaryHandler::new()).into_layer(failing_service(
        || RequestError::http(StatusCode::BAD_GATEWAY, "payment provider timed out"),
    ));

    let err = svc.serve(request("/pay")).await.unwrap_err();
    assert_eq!(err.status(), StatusCode::BAD_GATEWAY);

    logs_assert(|lines: &[&str]| {
        let line = lines
            .iter()
            .find(|line| line.contains("send-server-error"))
            .ok_or("no send-server-error record")?;
        for expected in [
            "HttpError, the request failed with a server error (502 Bad Gateway). Most common causes:",
            "request.id=\"req-42\"",
            "client.ip=\"203.0.113.9\"",
            "url.full=\"/pay\"",
            "error=payment provider timed out",
            "Register an error boundary fallback component",
        ] {
            if !line.contains(expected) {
                return Err(format!("record lacks {expected:?}: {line}"));
            }
        }
        Ok(())
    });
}

#[tokio::test]
async fn fallback_without_asset_manifest_renders_state_only() {
    let diagnostics = MemoryDiagnostics::new();
    let handler = ErrorBoundaryHandler::new()
        .with_diagnostics(diagnostics.clone())
        .with_fallback(error_page);

    let svc = ErrorBoundaryLayer::new(handler).into_layer(failing_service(|| {
        RequestError::http(StatusCode::SERVICE_UNAVAILABLE, "down")
    }));

    let res = svc.serve(request("/status")).await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    let markup = body_string(res).await;
    assert!(markup.contains("<h1>down</h1>"));
    assert!(markup.contains("<script>window.serverUrl = "));
    assert!(!markup.contains("<link"));
    assert!(!markup.contains("<script src="));

    let entries = diagnostics.entries();
    assert!(entries[0].message.ends_with("will be rendered for the client."));
    assert_eq!(
        diagnostics.events(),
        vec![
            (LogLevel::Error, LogEvent::SendServerError),
            (LogLevel::Debug, LogEvent::RenderFallback),
        ]
    );
}

#[tokio::test]
async fn uppercase_markup_is_hydrated() {
    let handler = ErrorBoundaryHandler::new()
        .with_diagnostics(MemoryDiagnostics::new())
        .with_fallback(|_: &FallbackProps<'_>| -> Result<String, BoxError> {
            Ok("<HTML><HEAD><TITLE>error</TITLE></HEAD><BODY>oops</BODY></HTML>".to_owned())
        })
        .with_asset_manifest(manifest());

    let err = RequestError::http(StatusCode::BAD_GATEWAY, "upstream down");
    let res = handler
        .handle(err, &RequestHead::from_request(&request("/")))
        .await
        .unwrap();

    let markup = body_string(res).await;
    assert!(markup.contains("</TITLE><script>window.serverUrl"));
    assert!(markup.contains(r#"<script src="/static/error-boundary.js" defer"#));
    assert!(markup.ends_with("</script></HEAD><BODY>oops</BODY></HTML>"));
}

#[tokio::test]
async fn markup_without_head_is_sent_with_a_warning() {
    let diagnostics = MemoryDiagnostics::new();
    let handler = ErrorBoundaryHandler::new()
        .with_diagnostics(diagnostics.clone())
        .with_fallback(|_: &FallbackProps<'_>| -> Result<String, BoxError> {
            Ok("<p>something went wrong</p>".to_owned())
        })
        .with_asset_manifest(manifest());

    let err = RequestError::http(StatusCode::BAD_GATEWAY, "upstream down");
    let res = handler
        .handle(err, &RequestHead::from_request(&request("/")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_string(res).await, "<p>something went wrong</p>");

    assert_eq!(
        diagnostics.events(),
        vec![
            (LogLevel::Error, LogEvent::SendServerError),
            (LogLevel::Debug, LogEvent::RenderFallback),
            (LogLevel::Warn, LogEvent::RenderFallback),
        ]
    );
    assert!(diagnostics.entries()[2].message.contains("no closing head tag"));
}
