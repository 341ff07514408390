// Copyright (c) 2025 Steven Rosenthal smr@dt3.org
// See LICENSE file in root directory for license terms.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use canonical_error::{CanonicalError, CanonicalErrorCode};
use log::{error, info, warn};
use pico_args::Arguments;
use serde_json::{Map, Value, json};
use tower_http::{services::ServeDir, cors::CorsLayer, cors::Any};

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, registry, EnvFilter};
use tracing_appender::non_blocking::NonBlockingBuilder;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

use gs_elements::device_state::ChangeSet;
use gs_elements::sync_error::SyncError;

use crate::camera_sync::CameraSync;
use crate::config_store::{ConfigStore, config_map_from_form};
use crate::key_store::KeyStore;
use crate::media_library::MediaLibrary;
use crate::reachability::PingProbe;
use crate::shell_actions::ShellActionRunner;
use crate::telemetry_reader::TelemetryReader;

fn http_status(code: &CanonicalErrorCode) -> StatusCode {
    match code {
        CanonicalErrorCode::InvalidArgument => StatusCode::BAD_REQUEST,
        CanonicalErrorCode::PermissionDenied => StatusCode::FORBIDDEN,
        CanonicalErrorCode::Unauthenticated => StatusCode::UNAUTHORIZED,
        CanonicalErrorCode::NotFound => StatusCode::NOT_FOUND,
        CanonicalErrorCode::AlreadyExists => StatusCode::CONFLICT,
        CanonicalErrorCode::FailedPrecondition => StatusCode::PRECONDITION_FAILED,
        CanonicalErrorCode::OutOfRange => StatusCode::BAD_REQUEST,
        CanonicalErrorCode::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
        CanonicalErrorCode::Unimplemented => StatusCode::NOT_IMPLEMENTED,
        CanonicalErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        CanonicalErrorCode::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        CanonicalErrorCode::DataLoss => StatusCode::BAD_GATEWAY,
        // A failed camera update is reported as a server error.
        CanonicalErrorCode::Aborted => StatusCode::INTERNAL_SERVER_ERROR,
        CanonicalErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        CanonicalErrorCode::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// Error response body: {"success": false, "message": ...}.
struct HttpError(CanonicalError);

impl From<SyncError> for HttpError {
    fn from(e: SyncError) -> Self {
        HttpError(e.into())
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = http_status(&self.0.code);
        (status, Json(json!({"success": false, "message": self.0.message})))
            .into_response()
    }
}

type HttpResult = Result<Json<Value>, HttpError>;

pub struct GsState {
    pub camera_sync: CameraSync,
    pub config_store: ConfigStore,
    pub media: MediaLibrary,
    pub key_store: KeyStore,
    pub telemetry: TelemetryReader,
}

async fn list_files(State(state): State<Arc<GsState>>) -> Json<Value> {
    Json(json!({"files": state.media.list_videos()}))
}

async fn delete_file(State(state): State<Arc<GsState>>,
                     Path(name): Path<String>) -> HttpResult {
    state.media.delete(&name)?;
    Ok(Json(json!({"success": true})))
}

async fn list_configs(State(state): State<Arc<GsState>>) -> Json<Value> {
    let key_status = state.key_store.status();
    Json(json!({
        "configs": state.config_store.available(),
        "gs_key_exists": key_status.exists,
        "gs_key_size": key_status.size,
    }))
}

async fn read_config(State(state): State<Arc<GsState>>,
                     Path(path): Path<String>) -> HttpResult {
    let normalized = state.config_store.check_access(&path)?;
    let config = state.config_store.read(&path)?;
    Ok(Json(json!({
        "filepath": normalized.display().to_string(),
        "filename": normalized.file_name()
            .map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
        "config": config,
    })))
}

async fn write_config(State(state): State<Arc<GsState>>,
                      Path(path): Path<String>,
                      Form(fields): Form<HashMap<String, String>>) -> HttpResult {
    let updates = config_map_from_form(&fields);
    state.config_store.write(&path, &updates)?;
    Ok(Json(json!({"success": true, "message": "Configuration saved successfully!"})))
}

async fn upload_gs_key(State(state): State<Arc<GsState>>, body: Bytes) -> HttpResult {
    state.key_store.replace(&body)?;
    Ok(Json(json!({"success": true, "message": "gs.key file updated successfully"})))
}

async fn load_camera_config(State(state): State<Arc<GsState>>) -> HttpResult {
    let snapshot = state.camera_sync.load_config().await?;
    for e in &snapshot.degraded {
        warn!("Camera config partially defaulted: {}", e);
    }
    Ok(Json(json!(snapshot)))
}

async fn update_camera_settings(State(state): State<Arc<GsState>>,
                                Json(body): Json<Map<String, Value>>)
                                -> Result<Response, HttpError> {
    let changes = ChangeSet::from_json(&body)?;
    let report = state.camera_sync.update_config(&changes).await?;
    match &report.failure {
        None => Ok(Json(json!({
            "success": true,
            "results": report.results,
            "ignored": report.ignored,
        })).into_response()),
        Some(e) => {
            let status = http_status(&CanonicalError::from(e.clone()).code);
            Ok((status, Json(json!({
                "success": false,
                "message": e.to_string(),
                "results": report.results,
                "ignored": report.ignored,
            }))).into_response())
        }
    }
}

async fn read_telemetry(State(state): State<Arc<GsState>>) -> HttpResult {
    let report = state.telemetry.read_rssi().await?;
    Ok(Json(json!(report)))
}

pub fn make_router(state: Arc<GsState>, web_root: &str) -> Router {
    let media_dir = state.media.media_dir().to_path_buf();
    Router::new()
        .route("/api/files", get(list_files))
        .route("/api/files/:name/delete", post(delete_file))
        .route("/api/config", get(list_configs))
        .route("/api/config/edit/*path", get(read_config).post(write_config))
        .route("/api/config/gskey", post(upload_gs_key))
        .route("/camera/load-config", get(load_camera_config))
        .route("/camera/update", post(update_camera_settings))
        .route("/api/telemetry", get(read_telemetry))
        .nest_service("/download", ServeDir::new(&media_dir))
        .nest_service("/video", ServeDir::new(&media_dir))
        .fallback_service(ServeDir::new(web_root))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any))
        .with_state(state)
}

#[derive(Debug)]
struct AppArgs {
    commands_script: String,
    camera_host: String,
    media_dir: String,
    gs_key: String,
    config_whitelist: Vec<String>,
    telemetry_addr: String,
    web_root: String,
    port: u16,
    remote_timeout: Duration,
    probe_timeout: Duration,
    retry_probe_timeout: Duration,
    telemetry_window: Duration,
    log_dir: String,
    log_file: String,
}

const DEFAULT_WHITELIST: &str = "/etc/wifibroadcast.cfg,/config/scripts/screen-mode,\
                                 /config/scripts/osd,/config/scripts/rec-fps";

fn parse_duration(arg: &str)
                  -> Result<std::time::Duration, std::num::ParseFloatError> {
    let seconds = arg.parse()?;
    Ok(std::time::Duration::from_secs_f64(seconds))
}

fn parse_whitelist(arg: &str) -> Vec<String> {
    arg.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn duration_arg(pargs: &mut Arguments, name: &'static str, default: f64) -> Duration {
    pargs.value_from_fn(name, parse_duration)
        .unwrap_or(Duration::from_secs_f64(default))
}

pub fn server_main() {
    const HELP: &str = "\
    FLAGS:
      -h, --help                     Prints help information

    OPTIONS:
      --commands_script <path>       ./commands.sh
      --camera_host <host>           10.5.0.10
      --media_dir <path>             /media
      --gs_key <path>                /etc/gs.key
      --config_whitelist <paths>     comma separated list of INI files
      --telemetry_addr <host:port>   127.0.0.1:8003
      --web_root <path>              ./static
      --port NUMBER                  5000
      --remote_timeout NUMBER        15.0
      --probe_timeout NUMBER         2.0
      --retry_probe_timeout NUMBER   5.0
      --telemetry_window NUMBER      3.0
      --log_dir <path>               .
      --log_file <file>              gs_server_log.txt
    ";

    let mut pargs = Arguments::from_env();
    if pargs.contains(["-h", "--help"]) {
        println!("{}", HELP);
        std::process::exit(0);
    }
    let args = AppArgs {
        commands_script: pargs.value_from_str("--commands_script").
            unwrap_or("./commands.sh".to_string()),
        camera_host: pargs.value_from_str("--camera_host").
            unwrap_or("10.5.0.10".to_string()),
        media_dir: pargs.value_from_str("--media_dir").
            unwrap_or("/media".to_string()),
        gs_key: pargs.value_from_str("--gs_key").
            unwrap_or("/etc/gs.key".to_string()),
        config_whitelist: parse_whitelist(
            &pargs.value_from_str::<_, String>("--config_whitelist").
                unwrap_or(DEFAULT_WHITELIST.to_string())),
        telemetry_addr: pargs.value_from_str("--telemetry_addr").
            unwrap_or("127.0.0.1:8003".to_string()),
        web_root: pargs.value_from_str("--web_root").
            unwrap_or("./static".to_string()),
        port: pargs.value_from_str("--port").
            unwrap_or(5000),
        remote_timeout: duration_arg(&mut pargs, "--remote_timeout", 15.0),
        probe_timeout: duration_arg(&mut pargs, "--probe_timeout", 2.0),
        retry_probe_timeout: duration_arg(&mut pargs, "--retry_probe_timeout", 5.0),
        telemetry_window: duration_arg(&mut pargs, "--telemetry_window", 3.0),
        log_dir: pargs.value_from_str("--log_dir").
            unwrap_or(".".to_string()),
        log_file: pargs.value_from_str("--log_file").
            unwrap_or("gs_server_log.txt".to_string()),
    };

    // Set up logging.
    let file_appender = match RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(&args.log_file)
        .max_log_files(10)
        .build(&args.log_dir)
    {
        Ok(appender) => appender,
        Err(e) => {
            eprintln!("Could not create log file in {}: {:?}", args.log_dir, e);
            std::process::exit(1);
        }
    };

    // Create non-blocking writers for both the file and stdout
    let (non_blocking_file, _guard1) = NonBlockingBuilder::default()
        .lossy(false)
        .finish(file_appender);
    let (non_blocking_stdout, _guard2) = NonBlockingBuilder::default()
        .lossy(false)
        .finish(std::io::stdout());
    registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(non_blocking_stdout))
        .with(fmt::layer().with_ansi(false).with_writer(non_blocking_file))
        .init();
    let remaining = pargs.finish();
    if !remaining.is_empty() {
        warn!("Ignoring unrecognized arguments: {:?}", remaining);
    }

    if let Err(e) = ctrlc::set_handler(move || {
        info!("Got control-c");
        std::thread::sleep(Duration::from_millis(200));
        info!("Exiting");
        std::process::exit(-1);
    }) {
        warn!("Could not install control-c handler: {:?}", e);
    }

    async_main(args);
}

#[tokio::main]
async fn async_main(args: AppArgs) {
    info!("Using commands script {:?} for camera {}",
          args.commands_script, args.camera_host);
    if !PathBuf::from(&args.commands_script).exists() {
        warn!("Commands script {:?} not found; camera operations will fail",
              args.commands_script);
    }

    let runner = Arc::new(ShellActionRunner::new(&args.commands_script));
    let state = Arc::new(GsState{
        camera_sync: CameraSync::new(runner, Arc::new(PingProbe::default()),
                                     &args.camera_host,
                                     args.remote_timeout,
                                     args.probe_timeout,
                                     args.retry_probe_timeout),
        config_store: ConfigStore::new(&args.config_whitelist[..]),
        media: MediaLibrary::new(&args.media_dir),
        key_store: KeyStore::new(&args.gs_key),
        telemetry: TelemetryReader::new(&args.telemetry_addr, args.telemetry_window),
    });
    let app = make_router(state, &args.web_root);

    // Listen on any address for the given port.
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("Listening at {:?}", addr);
    if let Err(e) = hyper::Server::bind(&addr).serve(app.into_make_service()).await {
        error!("Server error: {:?}", e);
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use gs_elements::liveness_trait::LivenessProbeTrait;
    use tower::ServiceExt;

    use super::*;

    struct DeadProbe {}

    #[async_trait]
    impl LivenessProbeTrait for DeadProbe {
        async fn probe(&self, _host: &str, _timeout: Duration) -> bool {
            false
        }
    }

    fn test_state(dir: &Path, whitelist: &[PathBuf]) -> Arc<GsState> {
        let runner = Arc::new(ShellActionRunner::new(dir.join("commands.sh")));
        Arc::new(GsState{
            camera_sync: CameraSync::new(runner, Arc::new(DeadProbe{}), "10.5.0.10",
                                         Duration::from_secs(1),
                                         Duration::from_millis(10),
                                         Duration::from_millis(10)),
            config_store: ConfigStore::new(whitelist),
            media: MediaLibrary::new(dir),
            key_store: KeyStore::new(dir.join("gs.key")),
            telemetry: TelemetryReader::new("127.0.0.1:1", Duration::from_millis(100)),
        })
    }

    async fn send(state: Arc<GsState>, request: Request<Body>) -> (StatusCode, Value) {
        let app = make_router(state, "/nonexistent");
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_http_status() {
        assert_eq!(http_status(&CanonicalErrorCode::PermissionDenied),
                   StatusCode::FORBIDDEN);
        assert_eq!(http_status(&CanonicalErrorCode::Unavailable),
                   StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(http_status(&CanonicalErrorCode::Aborted),
                   StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_parse_whitelist() {
        assert_eq!(parse_whitelist(DEFAULT_WHITELIST).len(), 4);
        assert_eq!(parse_whitelist(" /a.cfg, ,/b.cfg,"),
                   vec!["/a.cfg".to_string(), "/b.cfg".to_string()]);
        assert!(parse_whitelist("").is_empty());
    }

    #[tokio::test]
    async fn test_config_outside_whitelist_is_forbidden() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), &[dir.path().join("wfb.cfg")]);
        let request = Request::builder()
            .uri("/api/config/edit/etc/shadow")
            .body(Body::empty()).unwrap();
        let (status, body) = send(state, request).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_config_edit_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = dir.path().join("wfb.cfg");
        fs::write(&cfg, "[rf]\nchannel = 161\n").unwrap();
        let state = test_state(dir.path(), &[cfg.clone()]);
        let uri = format!("/api/config/edit{}", cfg.display());

        let request = Request::builder()
            .method("POST")
            .uri(&uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("rf__channel=149")).unwrap();
        let (status, body) = send(state.clone(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let request = Request::builder().uri(&uri).body(Body::empty()).unwrap();
        let (status, body) = send(state, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["config"]["rf"]["channel"], "149");
        assert_eq!(body["filename"], "wfb.cfg");
    }

    #[tokio::test]
    async fn test_camera_update_without_changes() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), &[] as &[PathBuf]);
        let request = Request::builder()
            .method("POST")
            .uri("/camera/update")
            .header("content-type", "application/json")
            .body(Body::from("{}")).unwrap();
        let (status, body) = send(state, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_camera_update_with_extra_keys() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), &[] as &[PathBuf]);
        let request = Request::builder()
            .method("POST")
            .uri("/camera/update")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"channel": 149, "ui_extra": null}"#)).unwrap();
        // Accepted as a change set; the dead camera then fails the liveness
        // check.
        let (status, body) = send(state, request).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_load_config_unreachable_camera() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path(), &[] as &[PathBuf]);
        let request = Request::builder()
            .uri("/camera/load-config")
            .body(Body::empty()).unwrap();
        let (status, body) = send(state, request).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_list_and_delete_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("flight.mp4"), b"video").unwrap();
        let state = test_state(dir.path(), &[] as &[PathBuf]);

        let request = Request::builder().uri("/api/files").body(Body::empty()).unwrap();
        let (status, body) = send(state.clone(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["files"][0]["name"], "flight.mp4");

        let request = Request::builder()
            .method("POST")
            .uri("/api/files/flight.mp4/delete")
            .body(Body::empty()).unwrap();
        let (status, _) = send(state.clone(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!dir.path().join("flight.mp4").exists());

        let request = Request::builder()
            .method("POST")
            .uri("/api/files/flight.mp4/delete")
            .body(Body::empty()).unwrap();
        let (status, _) = send(state, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
