use std::sync::Arc;

use axum::{Json, Router, http::StatusCode};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::{
    appstate::AppState,
    controller::{Controller, ControllerRouter, ControllerSet, HttpVerb, normalize_base_path},
    error::Error,
};

/// Record of one controller router mounted on the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub controller: String,
    pub base_path: String,
    /// Routes the controller itself registered; routes from the router factory are not listed.
    pub routes: Vec<(HttpVerb, String)>,
    /// False when an earlier mount already owns `base_path` and keeps serving it.
    pub active: bool,
}

/// Owns the shared application router and wires controllers into it.
pub struct Server {
    app: Router<AppState>,
    mounts: Vec<Mount>,
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Server {
    pub fn new() -> Self {
        Server {
            app: Router::new(),
            mounts: vec![],
        }
    }

    pub fn mounts(&self) -> &[Mount] {
        &self.mounts
    }

    /// Registers every controller's routes under its base path, in the order given.
    ///
    /// `router_factory` builds the per-controller router; `None` uses `ControllerRouter::new`.
    /// Routes the factory pre-registers win over controller routes that would match the
    /// same requests. Stops at the first controller without a base path; controllers
    /// before it stay mounted.
    pub fn add_controllers<C>(
        &mut self,
        controllers: C,
        router_factory: Option<&dyn Fn() -> ControllerRouter>,
    ) -> Result<usize, Error>
    where
        C: Into<ControllerSet>,
    {
        let default_factory = ControllerRouter::new;
        let router_lib: &dyn Fn() -> ControllerRouter = match router_factory {
            Some(factory) => factory,
            None => &default_factory,
        };

        let ControllerSet(controllers) = controllers.into();
        let mut count = 0;
        for controller in controllers {
            self.apply_router_obj(controller, router_lib)?;
            count += 1;
        }

        let s = if count == 1 { "" } else { "s" };
        info!(target: "server.routes", "{count} controller{s} configured.");
        Ok(count)
    }

    fn apply_router_obj(
        &mut self,
        controller: Arc<dyn Controller>,
        router_lib: &dyn Fn() -> ControllerRouter,
    ) -> Result<(), Error> {
        let name = controller.name().to_string();
        let Some(base_path) = normalize_base_path(controller.base_path()) else {
            error!(
                target: "server.routes",
                controller = %name,
                "controller does not have a base path"
            );
            return Err(Error::InvalidController(format!(
                "{name} does not have a base path"
            )));
        };

        let (router, routes) = Self::get_router(controller, router_lib);
        self.mount(name, base_path, router, routes);
        Ok(())
    }

    fn get_router(
        controller: Arc<dyn Controller>,
        router_lib: &dyn Fn() -> ControllerRouter,
    ) -> (Router<AppState>, Vec<(HttpVerb, String)>) {
        let name = controller.name().to_string();
        let mut router = router_lib();
        let mut routes: Vec<(HttpVerb, String)> = vec![];

        for descriptor in controller.routes() {
            let middleware = descriptor.middleware.len();
            match router.try_add(descriptor) {
                Ok((verb, path)) => {
                    debug!(
                        target: "server.routes",
                        controller = %name,
                        %verb,
                        %path,
                        middleware,
                        "route registered"
                    );
                    routes.push((verb, path));
                }
                Err(conflict) => {
                    warn!(
                        target: "server.routes",
                        controller = %name,
                        %conflict,
                        "route overlaps an earlier one, keeping the first"
                    );
                }
            }
        }

        (router.into_router(), routes)
    }

    fn mount(
        &mut self,
        controller: String,
        base_path: String,
        router: Router<AppState>,
        routes: Vec<(HttpVerb, String)>,
    ) {
        let active = !self
            .mounts
            .iter()
            .any(|m| m.active && m.base_path == base_path);

        if active {
            let app = std::mem::take(&mut self.app);
            self.app = if base_path == "/" {
                app.merge(router)
            } else {
                app.nest(&base_path, router)
            };
            debug!(
                target: "server.routes",
                %controller,
                %base_path,
                routes = routes.len(),
                "controller mounted"
            );
        } else {
            warn!(
                target: "server.routes",
                %controller,
                %base_path,
                "base path already mounted, earlier router keeps serving it"
            );
        }

        self.mounts.push(Mount {
            controller,
            base_path,
            routes,
            active,
        });
    }

    /// Finishes the application: JSON 404 fallback, request tracing and shared state.
    pub fn into_router(self, state: AppState) -> Router {
        self.app
            .fallback(handler_404)
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}

async fn handler_404() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "msg": "not_found" })))
}
