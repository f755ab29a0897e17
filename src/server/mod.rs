//! REST server exposing a local board.

mod handlers;
pub mod response;
pub mod router;

use std::{convert::Infallible, future::Future, net::SocketAddr, time::Duration};

use http_body_util::BodyExt;
use hyper::{
    Method, Request, StatusCode, body::Incoming, header, server::conn::http1, service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::{net::TcpListener, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::core::db::{BoardDb, SelectionKind};
use response::{Reply, error_response};
use router::{HandlerContext, Router, RouterBuilder};

/// Routes reachable without a bearer token.
const PUBLIC_ROUTES: [&str; 4] = ["/", "/login", "/token", "/refreshToken"];

#[derive(Debug, Clone)]
pub struct AppState {
    pub db: BoardDb,
    pub require_auth: bool,
}

impl AppState {
    pub fn new(db: BoardDb, require_auth: bool) -> Self {
        Self { db, require_auth }
    }
}

/// Wrap a `(ctx, state)` handler into a router handler owning a copy of `state`.
fn with_state<F, Fut>(
    state: &AppState,
    handler: F,
) -> impl Fn(HandlerContext) -> Fut + Send + Sync + 'static
where
    F: Fn(HandlerContext, AppState) -> Fut + Send + Sync + 'static,
{
    let state = state.clone();
    move |ctx| handler(ctx, state.clone())
}

pub fn build_router(state: &AppState) -> Router {
    let mut r = RouterBuilder::new();

    r.get("/", with_state(state, handlers::banner));
    r.post("/login", with_state(state, handlers::login));
    r.post("/token", with_state(state, handlers::token));
    r.post("/refreshToken", with_state(state, handlers::refresh_token));
    r.post("/saveTokens", with_state(state, handlers::save_tokens));
    r.get("/checkTokens", with_state(state, handlers::check_tokens));

    r.get("/users", with_state(state, handlers::list_users));
    r.post("/users", with_state(state, handlers::create_user));
    r.get("/users/{id}", with_state(state, handlers::get_user));
    r.put("/users/{id}", with_state(state, handlers::update_user));
    r.delete("/users/{id}", with_state(state, handlers::delete_user));

    r.get("/projects", with_state(state, handlers::list_projects));
    r.post("/projects", with_state(state, handlers::create_project));
    r.get("/projects/{id}", with_state(state, handlers::get_project));
    r.put("/projects/{id}", with_state(state, handlers::update_project));
    r.delete("/projects/{id}", with_state(state, handlers::delete_project));
    r.get(
        "/projects/{id}/scenarios",
        with_state(state, handlers::list_project_scenarios),
    );
    r.delete(
        "/projects/{id}/scenarios",
        with_state(state, handlers::delete_project_scenarios),
    );

    r.get("/scenarios", with_state(state, handlers::list_scenarios));
    r.post("/scenarios", with_state(state, handlers::create_scenario));
    r.get("/scenarios/{id}", with_state(state, handlers::get_scenario));
    r.put("/scenarios/{id}", with_state(state, handlers::update_scenario));
    r.delete("/scenarios/{id}", with_state(state, handlers::delete_scenario));
    r.get(
        "/scenarios/{id}/tasks",
        with_state(state, handlers::list_scenario_tasks),
    );
    r.delete(
        "/scenarios/{id}/tasks",
        with_state(state, handlers::delete_scenario_tasks),
    );

    r.get("/tasks", with_state(state, handlers::list_tasks));
    r.post("/tasks", with_state(state, handlers::create_task));
    r.get("/tasks/{id}", with_state(state, handlers::get_task));
    r.put("/tasks/{id}", with_state(state, handlers::update_task));
    r.delete("/tasks/{id}", with_state(state, handlers::delete_task));

    for kind in [
        SelectionKind::Project,
        SelectionKind::Scenario,
        SelectionKind::Task,
        SelectionKind::User,
    ] {
        r.get(
            kind.route(),
            with_state(state, move |_ctx, state| handlers::get_current(kind, state)),
        );
        r.post(
            kind.route(),
            with_state(state, move |ctx, state| handlers::set_current(kind, ctx, state)),
        );
    }

    r.build()
}

/// Check the bearer token when the server requires one.
fn authorize(state: &AppState, ctx: &HandlerContext) -> Result<(), Reply> {
    if !state.require_auth
        || ctx.method == Method::OPTIONS
        || PUBLIC_ROUTES.contains(&ctx.path.as_str())
    {
        return Ok(());
    }
    let token = ctx
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());
    let Some(token) = token else {
        return Err(error_response(StatusCode::FORBIDDEN, "Missing bearer token"));
    };
    match state.db.keys().verify_token(token) {
        Ok(user) => {
            debug!("{} {} as {}", ctx.method, ctx.path, user.username);
            Ok(())
        }
        Err(e) => {
            warn!("Rejected token for {} {}: {}", ctx.method, ctx.path, e);
            Err(error_response(StatusCode::UNAUTHORIZED, "Invalid token"))
        }
    }
}

/// Answer one request off the wire.
pub async fn dispatch(router: &Router, state: &AppState, req: Request<Incoming>) -> Reply {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("Failed to read request body: {}", e),
            );
        }
    };
    let ctx = HandlerContext::new(parts.method, parts.uri.path(), parts.headers, body);
    respond(router, state, ctx).await
}

/// Route an already read request through the auth gate.
pub async fn respond(router: &Router, state: &AppState, ctx: HandlerContext) -> Reply {
    debug!("{} {}", ctx.method, ctx.path);
    if let Err(reply) = authorize(state, &ctx) {
        return reply;
    }
    router.handle(ctx).await
}

pub async fn bind(port: u16) -> anyhow::Result<TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    Ok(TcpListener::bind(addr).await?)
}

/// Accept connections until `shutdown` resolves. Each connection is served
/// on its own task.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    let router = build_router(&state);
    info!(
        "Serving board {:?} on http://{}",
        state.db.board_file(),
        listener.local_addr()?
    );
    tokio::pin!(shutdown);

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                    continue;
                }
            },
            _ = &mut shutdown => break,
        };

        let io = TokioIo::new(stream);
        let router = router.clone();
        let state = state.clone();
        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let router = router.clone();
                let state = state.clone();
                async move { Ok::<_, Infallible>(dispatch(&router, &state, req).await) }
            });
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!("Connection from {} closed with error: {}", peer, e);
            }
        });
    }

    info!("Server stopped");
    Ok(())
}

/// Save the board every `period` until the returned task is aborted.
pub fn spawn_autosave(db: BoardDb, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await;
        loop {
            interval.tick().await;
            if let Err(e) = db.save().await {
                warn!("Autosave failed: {:#}", e);
            }
        }
    })
}
