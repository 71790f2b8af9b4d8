//! HTTP API server
//!
//! Hyper-based HTTP front end. Requests are read fully, lowered into an
//! [`ApiRequest`], and handed to [`dispatch`], which is plain async code
//! over the service layer. Tests drive `dispatch` directly without
//! sockets.

use crate::auth::ApiKeyAuthenticator;
use crate::config::Config;
use crate::media::{MediaError, MediaService};
use crate::metrics;
use crate::router::{ApiRequestParser, ApiRoute, RouterError};
use crate::upload::{
    codes, CompleteMultipartRequest, PresignRequest, UploadError, UploadService,
};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// API server error
#[derive(Debug, thiserror::Error)]
pub enum ApiServerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Shared per-process state handed to every request.
pub struct AppState {
    pub config: Arc<Config>,
    pub uploads: UploadService,
    pub media: MediaService,
    pub auth: ApiKeyAuthenticator,
}

impl AppState {
    pub fn new(config: Arc<Config>, uploads: UploadService, media: MediaService) -> Self {
        let auth = ApiKeyAuthenticator::new(config.auth.api_key.clone());
        Self {
            config,
            uploads,
            media,
            auth,
        }
    }
}

/// A fully-read request, decoupled from the hyper types so the
/// dispatcher is testable without a socket.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    /// Header names lowercased.
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

/// Response ready to be written back.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<&'a str>,
}

impl ApiResponse {
    pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Self {
        let body = serde_json::to_vec(value).unwrap_or_default();
        Self {
            status,
            headers: vec![("content-type".into(), "application/json".into())],
            body: Bytes::from(body),
        }
    }

    pub fn error(status: StatusCode, code: &str, message: String, hint: Option<&str>) -> Self {
        metrics::record_error(code);
        Self::json(
            status,
            &ErrorBody {
                code,
                message,
                hint,
            },
        )
    }
}

/// Route a fully-read request through auth, routing and the services.
pub async fn dispatch(state: &AppState, req: ApiRequest) -> ApiResponse {
    let route = match ApiRequestParser::parse(&req.method, &req.path, req.query.as_deref()) {
        Ok(route) => route,
        Err(err) => return router_error_response(err),
    };

    // Mutating routes require the API key; GETs are public.
    if matches!(
        route,
        ApiRoute::PresignUpload
            | ApiRoute::CompleteMultipart { .. }
            | ApiRoute::AbortMultipart { .. }
    ) {
        if let Err(err) = state.auth.authorize(&req.headers) {
            return ApiResponse::error(
                StatusCode::UNAUTHORIZED,
                codes::UNAUTHORIZED,
                err.to_string(),
                Some("Provide the API key via Authorization: Bearer or X-API-Key"),
            );
        }
    }

    match route {
        ApiRoute::Health => ApiResponse::json(
            StatusCode::OK,
            &serde_json::json!({ "status": "ok" }),
        ),
        ApiRoute::Metrics => metrics_response(state),
        ApiRoute::PresignUpload => presign_handler(state, &req).await,
        ApiRoute::CompleteMultipart {
            object_key,
            upload_id,
        } => complete_handler(state, &req, &object_key, &upload_id).await,
        ApiRoute::AbortMultipart {
            object_key,
            upload_id,
        } => abort_handler(state, &object_key, &upload_id).await,
        ApiRoute::Thumbnail {
            category,
            file,
            width,
            quality,
        } => thumbnail_handler(state, &req, &category, &file, width, quality).await,
        ApiRoute::Original { category, file } => original_handler(state, &req, &category, &file).await,
    }
}

async fn presign_handler(state: &AppState, req: &ApiRequest) -> ApiResponse {
    let body: PresignRequest = match serde_json::from_slice(&req.body) {
        Ok(body) => body,
        Err(err) => {
            return ApiResponse::error(
                StatusCode::BAD_REQUEST,
                codes::BAD_REQUEST,
                format!("invalid JSON body: {}", err),
                None,
            )
        }
    };

    let profile = match state.config.profile(&body.profile) {
        Some(profile) => profile,
        None => {
            return ApiResponse::error(
                StatusCode::BAD_REQUEST,
                codes::BAD_REQUEST,
                format!("unknown profile: {}", body.profile),
                Some("Profiles are defined in the server configuration"),
            )
        }
    };

    let base_url = base_url(state, &req.headers);
    match state.uploads.presign(&body, profile, &base_url).await {
        Ok(plan) => ApiResponse::json(StatusCode::OK, &plan),
        Err(err) => upload_error_response(err),
    }
}

async fn complete_handler(
    state: &AppState,
    req: &ApiRequest,
    object_key: &str,
    upload_id: &str,
) -> ApiResponse {
    let body: CompleteMultipartRequest = match serde_json::from_slice(&req.body) {
        Ok(body) => body,
        Err(err) => {
            return ApiResponse::error(
                StatusCode::BAD_REQUEST,
                codes::BAD_REQUEST,
                format!("invalid JSON body: {}", err),
                None,
            )
        }
    };

    match state.uploads.complete(object_key, upload_id, &body).await {
        Ok(()) => ApiResponse::json(
            StatusCode::OK,
            &serde_json::json!({ "status": "completed", "object_key": object_key }),
        ),
        Err(err) => upload_error_response(err),
    }
}

async fn abort_handler(state: &AppState, object_key: &str, upload_id: &str) -> ApiResponse {
    match state.uploads.abort(object_key, upload_id).await {
        Ok(()) => ApiResponse::json(
            StatusCode::OK,
            &serde_json::json!({ "status": "aborted", "upload_id": upload_id }),
        ),
        Err(err) => upload_error_response(err),
    }
}

async fn thumbnail_handler(
    state: &AppState,
    req: &ApiRequest,
    category: &str,
    file: &str,
    width: Option<u32>,
    quality: Option<u8>,
) -> ApiResponse {
    match state.media.variant(category, file, width, quality).await {
        Ok(variant) => {
            metrics::record_variant("ok");
            if req.headers.get("if-none-match") == Some(&variant.etag) {
                return ApiResponse {
                    status: StatusCode::NOT_MODIFIED,
                    headers: vec![("etag".into(), variant.etag)],
                    body: Bytes::new(),
                };
            }
            ApiResponse {
                status: StatusCode::OK,
                headers: vec![
                    ("content-type".into(), variant.content_type.into()),
                    ("etag".into(), variant.etag),
                    (
                        "cache-control".into(),
                        format!("public, max-age={}", variant.cache_max_age),
                    ),
                ],
                body: variant.data,
            }
        }
        Err(err) => {
            metrics::record_variant("error");
            media_error_response(err)
        }
    }
}

async fn original_handler(
    state: &AppState,
    req: &ApiRequest,
    category: &str,
    file: &str,
) -> ApiResponse {
    match state.media.original(category, file).await {
        Ok(variant) => {
            metrics::record_variant("ok");
            if req.headers.get("if-none-match") == Some(&variant.etag) {
                return ApiResponse {
                    status: StatusCode::NOT_MODIFIED,
                    headers: vec![("etag".into(), variant.etag)],
                    body: Bytes::new(),
                };
            }
            ApiResponse {
                status: StatusCode::OK,
                headers: vec![
                    ("content-type".into(), variant.content_type.into()),
                    ("etag".into(), variant.etag),
                    (
                        "cache-control".into(),
                        format!("public, max-age={}", variant.cache_max_age),
                    ),
                ],
                body: variant.data,
            }
        }
        Err(err) => {
            metrics::record_variant("error");
            media_error_response(err)
        }
    }
}

fn metrics_response(state: &AppState) -> ApiResponse {
    if !state.config.metrics.enabled {
        return ApiResponse::error(
            StatusCode::NOT_FOUND,
            codes::NOT_FOUND,
            "metrics are disabled".into(),
            None,
        );
    }
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&prometheus::gather(), &mut buffer).is_err() {
        return ApiResponse::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::STORAGE_ERROR,
            "failed to encode metrics".into(),
            None,
        );
    }
    ApiResponse {
        status: StatusCode::OK,
        headers: vec![("content-type".into(), encoder.format_type().into())],
        body: Bytes::from(buffer),
    }
}

/// Public base URL the upload plan's complete/abort actions point at.
fn base_url(state: &AppState, headers: &HashMap<String, String>) -> String {
    if let Some(base) = &state.config.server.public_base_url {
        return base.trim_end_matches('/').to_string();
    }
    match headers.get("host") {
        Some(host) => format!("http://{}", host),
        None => format!("http://{}", state.config.server.address),
    }
}

fn router_error_response(err: RouterError) -> ApiResponse {
    match err {
        RouterError::InvalidPath(msg) => {
            ApiResponse::error(StatusCode::NOT_FOUND, codes::NOT_FOUND, msg, None)
        }
        RouterError::InvalidQuery(msg) => {
            ApiResponse::error(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, msg, None)
        }
        RouterError::MethodNotAllowed(msg) => ApiResponse::error(
            StatusCode::METHOD_NOT_ALLOWED,
            codes::BAD_REQUEST,
            msg,
            None,
        ),
    }
}

fn upload_error_response(err: UploadError) -> ApiResponse {
    let status = match &err {
        UploadError::BadRequest(_) => StatusCode::BAD_REQUEST,
        UploadError::MimeNotAllowed { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        UploadError::SizeTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        UploadError::UploadDetailsFailed(_) | UploadError::Storage(_) => StatusCode::BAD_GATEWAY,
    };
    let code = err.code();
    let hint = err.hint();
    ApiResponse::error(status, code, err.to_string(), hint)
}

fn media_error_response(err: MediaError) -> ApiResponse {
    match err {
        MediaError::NotFound { .. } => {
            ApiResponse::error(StatusCode::NOT_FOUND, codes::NOT_FOUND, err.to_string(), None)
        }
        MediaError::InvalidParams(_) => ApiResponse::error(
            StatusCode::BAD_REQUEST,
            codes::BAD_REQUEST,
            err.to_string(),
            None,
        ),
        MediaError::Decode(_) | MediaError::Encode(_) => ApiResponse::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::STORAGE_ERROR,
            err.to_string(),
            None,
        ),
        MediaError::Storage(_) => ApiResponse::error(
            StatusCode::BAD_GATEWAY,
            codes::STORAGE_ERROR,
            err.to_string(),
            None,
        ),
    }
}

/// HTTP server wrapping the dispatcher
pub struct ApiServer {
    address: String,
    state: Arc<AppState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server_handle: Option<tokio::task::JoinHandle<()>>,
}

impl ApiServer {
    pub fn new(address: String, state: Arc<AppState>) -> Self {
        Self {
            address,
            state,
            shutdown_tx: None,
            server_handle: None,
        }
    }

    /// Start the server.
    ///
    /// Returns the actual bound address (useful when using port 0).
    pub async fn start(&mut self) -> Result<SocketAddr, ApiServerError> {
        let listener = TcpListener::bind(&self.address).await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        self.shutdown_tx = Some(shutdown_tx);

        let state = Arc::clone(&self.state);
        let handle = tokio::spawn(async move {
            run_server(listener, state, shutdown_rx).await;
        });
        self.server_handle = Some(handle);

        tracing::info!(address = %addr, "API server listening");
        Ok(addr)
    }

    /// Signal the accept loop to stop and wait for it.
    pub async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.server_handle.take() {
            let _ = handle.await;
        }
    }
}

async fn run_server(
    listener: TcpListener,
    state: Arc<AppState>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                tracing::info!("API server shutting down");
                break;
            }
            result = listener.accept() => {
                match result {
                    Ok((stream, _)) => {
                        let io = TokioIo::new(stream);
                        let state = Arc::clone(&state);
                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let state = Arc::clone(&state);
                                async move { handle_request(state, req).await }
                            });
                            let _ = http1::Builder::new().serve_connection(io, service).await;
                        });
                    }
                    Err(_) => continue,
                }
            }
        }
    }
}

/// Read the request fully and hand it to the dispatcher.
async fn handle_request(
    state: Arc<AppState>,
    req: Request<hyper::body::Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(str::to_string);

    let mut headers = HashMap::new();
    for (name, value) in req.headers() {
        if let Ok(value) = value.to_str() {
            headers.insert(name.as_str().to_lowercase(), value.to_string());
        }
    }

    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            let response = ApiResponse::error(
                StatusCode::BAD_REQUEST,
                codes::BAD_REQUEST,
                format!("failed to read request body: {}", err),
                None,
            );
            return Ok(into_hyper(response));
        }
    };

    let api_req = ApiRequest {
        method,
        path,
        query,
        headers,
        body,
    };

    Ok(into_hyper(dispatch(&state, api_req).await))
}

fn into_hyper(response: ApiResponse) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(response.status);
    for (name, value) in &response.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
        .body(Full::new(response.body))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
}
