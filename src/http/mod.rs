// HTTP facade - authenticated JSON endpoints over the managers

pub mod auth;
mod handlers;

use crate::config::AppConfig;
use crate::docker::ComposeRunner;
use crate::mods::ModRegistry;
use crate::worlds::WorldManager;
use auth::Sessions;
use handlers::{ApiError, Lifecycle, OperationResult};
use serde::Serialize;
use std::io::Read;
use std::sync::Arc;
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};
use tokio::runtime::Handle;

const WORKER_THREADS: usize = 4;

/// Everything a request handler needs, built once at startup.
pub struct AppContext {
    pub config: AppConfig,
    pub registry: ModRegistry,
    pub worlds: WorldManager,
    pub compose: ComposeRunner,
    pub sessions: Sessions,
}

pub type JsonResponse = Response<std::io::Cursor<Vec<u8>>>;

pub fn json<T: Serialize>(status: u16, body: &T) -> JsonResponse {
    let payload = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());
    Response::from_data(payload)
        .with_status_code(StatusCode(status))
        .with_header(
            Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                .expect("static header"),
        )
}

/// Accept loop. Blocks the calling thread until the listener fails;
/// request handling fans out over a small pool of worker threads that
/// dispatch onto the async runtime.
pub fn serve(
    ctx: Arc<AppContext>,
    handle: Handle,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let server = Arc::new(Server::http(ctx.config.bind_addr)?);

    let mut workers = Vec::new();
    for _ in 0..WORKER_THREADS {
        let server = Arc::clone(&server);
        let ctx = Arc::clone(&ctx);
        let handle = handle.clone();
        workers.push(std::thread::spawn(move || worker_loop(server, ctx, handle)));
    }

    for worker in workers {
        let _ = worker.join();
    }
    Ok(())
}

fn worker_loop(server: Arc<Server>, ctx: Arc<AppContext>, handle: Handle) {
    loop {
        match server.recv() {
            Ok(request) => handle_connection(request, &ctx, &handle),
            Err(err) => {
                tracing::error!("accept error: {}", err);
            }
        }
    }
}

fn handle_connection(mut request: Request, ctx: &AppContext, handle: &Handle) {
    let method = request.method().clone();
    let url = request.url().to_string();
    let token = auth::extract_token(request.headers());

    let mut body = String::new();
    if method == Method::Post {
        if request.as_reader().read_to_string(&mut body).is_err() {
            let _ = request.respond(json(400, &OperationResult::failure("unreadable request body")));
            return;
        }
    }

    let response = handle.block_on(route(ctx, &method, &url, token.as_deref(), &body));
    if let Err(err) = request.respond(response) {
        tracing::debug!("client disconnected before response: {}", err);
    }
}

async fn route(
    ctx: &AppContext,
    method: &Method,
    url: &str,
    token: Option<&str>,
    body: &str,
) -> JsonResponse {
    let (path, query) = match url.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (url, None),
    };

    // Login is the only unauthenticated endpoint.
    if path == "/api/login" && *method == Method::Post {
        return handlers::login(ctx, body).unwrap_or_else(ApiError::into_response);
    }

    let token = match token.filter(|t| ctx.sessions.validate(t)) {
        Some(token) => token,
        None => return json(401, &OperationResult::failure("Authentication required")),
    };

    let segments: Vec<&str> = path
        .strip_prefix("/api/")
        .map(|rest| rest.split('/').filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    let result = match (method, segments.as_slice()) {
        (&Method::Post, ["logout"]) => Ok(handlers::logout(ctx, token)),

        (&Method::Get, ["status"]) => handlers::status(ctx).await,
        (&Method::Get, ["logs"]) => handlers::logs(ctx, query).await,
        (&Method::Post, ["start"]) => Ok(handlers::lifecycle(ctx, Lifecycle::Start).await),
        (&Method::Post, ["stop"]) => Ok(handlers::lifecycle(ctx, Lifecycle::Stop).await),
        (&Method::Post, ["restart"]) => Ok(handlers::lifecycle(ctx, Lifecycle::Restart).await),

        (&Method::Get, ["mods"]) => handlers::get_mods(ctx),
        (&Method::Post, ["mods"]) => handlers::save_mods(ctx, body).await,
        (&Method::Post, ["mods", "add"]) => handlers::add_mod(ctx, body).await,
        (&Method::Post, ["mods", "remove"]) => handlers::remove_mod(ctx, body).await,
        (&Method::Post, ["mods", "import-collection"]) => {
            handlers::import_collection(ctx, body).await
        }
        (&Method::Get, ["workshop", id]) => Ok(handlers::lookup_workshop(ctx, id).await),
        (&Method::Get, ["collection", id]) => Ok(handlers::lookup_collection(ctx, id).await),

        (&Method::Get, ["worlds"]) => handlers::list_worlds(ctx),
        (&Method::Post, ["worlds", "create"]) => handlers::create_world(ctx, body),
        (&Method::Post, ["worlds", "switch"]) => handlers::switch_world(ctx, body),
        (&Method::Post, ["worlds", "backup"]) => handlers::backup_world(ctx).await,
        (&Method::Post, ["worlds", "restore"]) => handlers::restore_backup(ctx, body).await,

        _ => Err(ApiError {
            status: 404,
            message: "No such endpoint".to_string(),
        }),
    };

    result.unwrap_or_else(ApiError::into_response)
}
