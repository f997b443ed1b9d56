//! Router and server loop

use std::future::Future;

use axum::extract::{DefaultBodyLimit, Request};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::handlers::{artifacts, health, projects, results, script};
use super::state::AppState;
use super::ws;

/// Build the full router
///
/// # Routes
///
/// ## Devices
/// - `GET /scriptexecute` - start a session, returns the provisioning script
/// - `POST /scriptexecute/eeprom-version` - bootloader version report
/// - `POST /scriptexecute/error` - failure report
/// - `GET /scriptexecute/alldone` - completion report
/// - `GET /uploads/*` - artifact downloads
///
/// ## Administration
/// - `GET /result/getresult`, `/result/getresultsbyserial`, `/result/getresults`
/// - `/project/*` - catalog CRUD and activation
/// - `POST /upload/:name`, `GET /upload/list`, `DELETE /upload/:name`
/// - `GET /ws/sessions` - live session feed
/// - `GET /health`
pub fn create_router(state: AppState) -> Router {
    let device = Router::new()
        .route("/eeprom-version", post(script::eeprom_version))
        .route("/error", post(script::error_report))
        .route("/alldone", get(script::alldone));

    let result = Router::new()
        .route("/getresult", get(results::get_result))
        .route("/getresultsbyserial", get(results::get_results_by_serial))
        .route("/getresults", get(results::get_results));

    let project = Router::new()
        .route("/getprojects", get(projects::get_projects))
        .route("/getproject", get(projects::get_project))
        .route("/getactiveproject", get(projects::get_active_project))
        .route("/createproject", post(projects::create_project))
        .route("/updateproject", put(projects::update_project))
        .route("/setactiveproject", post(projects::set_active_project))
        .route("/deleteproject", delete(projects::delete_project));

    let upload = Router::new()
        .route("/list", get(artifacts::list))
        .route(
            "/:name",
            post(artifacts::upload)
                .delete(artifacts::delete)
                .layer(DefaultBodyLimit::disable()),
        );

    let downloads: Router = Router::new()
        .fallback_service(ServeDir::new(state.artifacts.root()))
        .layer(middleware::from_fn(hide_hidden_files));

    Router::new()
        .route("/scriptexecute", get(script::scriptexecute))
        .nest("/scriptexecute", device)
        .nest("/result", result)
        .nest("/project", project)
        .nest("/upload", upload)
        .nest_service("/uploads", downloads)
        .route("/ws/sessions", get(ws::sessions_ws))
        .route("/health", get(health::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 404 for any path segment naming a hidden file, such as in-progress uploads
async fn hide_hidden_files(req: Request, next: Next) -> Response {
    let hidden = req.uri().path().split('/').any(|segment| {
        segment.starts_with('.') || segment.get(..3).is_some_and(|p| p.eq_ignore_ascii_case("%2e"))
    });
    if hidden {
        return StatusCode::NOT_FOUND.into_response();
    }
    next.run(req).await
}

/// Serve `router` on `listener` until `shutdown` resolves
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "HTTP server listening");
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}
