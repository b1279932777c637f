use std::{fmt, sync::Arc};

use axum::{
    Router,
    handler::Handler,
    routing::{MethodFilter, MethodRouter, any, on},
};
use tracing::warn;

use crate::appstate::AppState;

/// HTTP verb a route answers to. `All` matches every method.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Trace,
    All,
}

impl HttpVerb {
    fn filter(self) -> Option<MethodFilter> {
        match self {
            HttpVerb::Get => Some(MethodFilter::GET),
            HttpVerb::Post => Some(MethodFilter::POST),
            HttpVerb::Put => Some(MethodFilter::PUT),
            HttpVerb::Patch => Some(MethodFilter::PATCH),
            HttpVerb::Delete => Some(MethodFilter::DELETE),
            HttpVerb::Head => Some(MethodFilter::HEAD),
            HttpVerb::Options => Some(MethodFilter::OPTIONS),
            HttpVerb::Trace => Some(MethodFilter::TRACE),
            HttpVerb::All => None,
        }
    }

    /// Whether two registrations on the same path would claim the same requests.
    pub fn overlaps(self, other: HttpVerb) -> bool {
        self == other || self == HttpVerb::All || other == HttpVerb::All
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HttpVerb::Get => "GET",
            HttpVerb::Post => "POST",
            HttpVerb::Put => "PUT",
            HttpVerb::Patch => "PATCH",
            HttpVerb::Delete => "DELETE",
            HttpVerb::Head => "HEAD",
            HttpVerb::Options => "OPTIONS",
            HttpVerb::Trace => "TRACE",
            HttpVerb::All => "ALL",
        };
        f.write_str(name)
    }
}

/// Wraps a route's method router, typically with `route.layer(axum::middleware::from_fn(..))`.
#[allow(dead_code)]
#[derive(Clone)]
pub struct Middleware(Arc<WrapFn>);

type WrapFn = dyn Fn(MethodRouter<AppState>) -> MethodRouter<AppState> + Send + Sync;

impl Middleware {
    #[allow(dead_code)]
    pub fn new<F>(wrap: F) -> Self
    where
        F: Fn(MethodRouter<AppState>) -> MethodRouter<AppState> + Send + Sync + 'static,
    {
        Middleware(Arc::new(wrap))
    }

    fn apply(&self, route: MethodRouter<AppState>) -> MethodRouter<AppState> {
        (self.0)(route)
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Middleware")
    }
}

/// One entry of a controller's route table.
pub struct RouteDescriptor {
    pub verb: HttpVerb,
    pub path: String,
    pub middleware: Vec<Middleware>,
    handler: MethodRouter<AppState>,
}

impl RouteDescriptor {
    pub fn new<H, T>(verb: HttpVerb, path: &str, handler: H) -> Self
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        let handler = match verb.filter() {
            Some(filter) => on(filter, handler),
            None => any(handler),
        };
        RouteDescriptor {
            verb,
            path: path.to_string(),
            middleware: vec![],
            handler,
        }
    }

    #[allow(dead_code)]
    pub fn get<H, T>(path: &str, handler: H) -> Self
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        Self::new(HttpVerb::Get, path, handler)
    }

    pub fn post<H, T>(path: &str, handler: H) -> Self
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        Self::new(HttpVerb::Post, path, handler)
    }

    #[allow(dead_code)]
    pub fn with_middleware(mut self, middleware: Middleware) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// The handler with its middleware applied, first listed outermost so it runs first.
    fn into_method_router(self) -> MethodRouter<AppState> {
        self.middleware
            .iter()
            .rev()
            .fold(self.handler, |route, middleware| middleware.apply(route))
    }
}

impl fmt::Debug for RouteDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDescriptor")
            .field("verb", &self.verb)
            .field("path", &self.path)
            .field("middleware", &self.middleware.len())
            .finish()
    }
}

/// A group of routes sharing a base path. Handlers returned from `routes` capture the
/// `Arc<Self>` so every request runs against this same instance.
pub trait Controller: Send + Sync + 'static {
    fn base_path(&self) -> Option<&str>;

    fn routes(self: Arc<Self>) -> Vec<RouteDescriptor>;

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// One controller or an ordered list of them.
pub struct ControllerSet(pub Vec<Arc<dyn Controller>>);

impl<C: Controller> From<Arc<C>> for ControllerSet {
    fn from(controller: Arc<C>) -> Self {
        ControllerSet(vec![controller])
    }
}

impl From<Arc<dyn Controller>> for ControllerSet {
    fn from(controller: Arc<dyn Controller>) -> Self {
        ControllerSet(vec![controller])
    }
}

impl From<Vec<Arc<dyn Controller>>> for ControllerSet {
    fn from(controllers: Vec<Arc<dyn Controller>>) -> Self {
        ControllerSet(controllers)
    }
}

impl<C: Controller> From<Vec<Arc<C>>> for ControllerSet {
    fn from(controllers: Vec<Arc<C>>) -> Self {
        ControllerSet(
            controllers
                .into_iter()
                .map(|c| c as Arc<dyn Controller>)
                .collect(),
        )
    }
}

pub trait Routes {
    fn add_route(self, path: &str, descriptor: RouteDescriptor) -> Self;
}

impl Routes for Router<AppState> {
    fn add_route(self, path: &str, descriptor: RouteDescriptor) -> Self {
        self.route(path, descriptor.into_method_router())
    }
}

/// Two routes on one router that axum would refuse to hold side by side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteConflict {
    pub verb: HttpVerb,
    pub path: String,
    pub existing: (HttpVerb, String),
}

impl fmt::Display for RouteConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} conflicts with {} {}",
            self.verb, self.path, self.existing.0, self.existing.1
        )
    }
}

/// A controller's router plus the routes registered on it so far.
///
/// Router factories return one of these, so routes they pre-register are known and
/// take precedence over the controller's own routes.
#[derive(Default)]
pub struct ControllerRouter {
    router: Router<AppState>,
    routes: Vec<(HttpVerb, String)>,
}

impl ControllerRouter {
    pub fn new() -> Self {
        ControllerRouter::default()
    }

    /// Registers the route unless an earlier route could match the same requests.
    pub fn try_add(
        &mut self,
        descriptor: RouteDescriptor,
    ) -> Result<(HttpVerb, String), RouteConflict> {
        let path = normalize_path(&descriptor.path);
        let verb = descriptor.verb;
        if let Some(existing) = self
            .routes
            .iter()
            .find(|(v, p)| routes_conflict((*v, p.as_str()), (verb, path.as_str())))
        {
            return Err(RouteConflict {
                verb,
                path,
                existing: existing.clone(),
            });
        }

        let router = std::mem::take(&mut self.router);
        self.router = router.add_route(&path, descriptor);
        self.routes.push((verb, path.clone()));
        Ok((verb, path))
    }

    /// Builder form of `try_add` for router factories; a conflicting route is dropped.
    #[allow(dead_code)]
    pub fn with(mut self, descriptor: RouteDescriptor) -> Self {
        if let Err(conflict) = self.try_add(descriptor) {
            warn!(target: "server.routes", %conflict, "route dropped from router factory");
        }
        self
    }

    #[allow(dead_code)]
    pub fn routes(&self) -> &[(HttpVerb, String)] {
        &self.routes
    }

    pub fn into_router(self) -> Router<AppState> {
        self.router
    }
}

/// Path with every `{param}` written as `{}` and every `{*wildcard}` as `{*}`.
pub fn route_shape(path: &str) -> String {
    let mut shape = String::with_capacity(path.len());
    let mut chars = path.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '{' {
            shape.push(c);
            continue;
        }
        if chars.peek() == Some(&'{') {
            chars.next();
            shape.push_str("{{");
            continue;
        }
        let wildcard = chars.peek() == Some(&'*');
        for inner in chars.by_ref() {
            if inner == '}' {
                break;
            }
        }
        shape.push_str(if wildcard { "{*}" } else { "{}" });
    }
    shape
}

/// Same shape with different parameter names never fits in one router; same text only
/// clashes when the verbs overlap.
fn routes_conflict(existing: (HttpVerb, &str), candidate: (HttpVerb, &str)) -> bool {
    let (existing_verb, existing_path) = existing;
    let (verb, path) = candidate;
    if route_shape(existing_path) != route_shape(path) {
        return false;
    }
    existing_path != path || existing_verb.overlaps(verb)
}

/// Route path as axum wants it: leading slash, no trailing slash, empty means `/`.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// `None` for a missing or blank base path, which makes a controller unusable.
pub fn normalize_base_path(base_path: Option<&str>) -> Option<String> {
    match base_path {
        Some(path) if !path.trim().is_empty() => Some(normalize_path(path)),
        _ => None,
    }
}
