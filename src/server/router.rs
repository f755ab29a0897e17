use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc};

use bytes::Bytes;
use hyper::{HeaderMap, Method, StatusCode};
use tracing::warn;

use super::response::{ApiError, ApiResult, Reply, error_response, preflight_response};

/// A fully read request plus the parameters captured by the matched route.
#[derive(Debug)]
pub struct HandlerContext {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub path_params: HashMap<String, String>,
}

impl HandlerContext {
    pub fn new(method: Method, path: impl Into<String>, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            path: path.into(),
            headers,
            body,
            path_params: HashMap::new(),
        }
    }

    /// Numeric path parameter `name`.
    pub fn id_param(&self, name: &str) -> Result<i64, ApiError> {
        let raw = self
            .path_params
            .get(name)
            .ok_or_else(|| ApiError::BadRequest(format!("Missing path parameter {}", name)))?;
        raw.parse()
            .map_err(|_| ApiError::BadRequest(format!("Invalid id: {}", raw)))
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, ApiError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

type BoxFuture = Pin<Box<dyn Future<Output = ApiResult> + Send>>;
pub type Handler = Arc<dyn Fn(HandlerContext) -> BoxFuture + Send + Sync>;

struct Route {
    method: Method,
    path_pattern: String,
    handler: Handler,
}

impl Route {
    fn matches(&self, method: &Method, path: &str) -> Option<HashMap<String, String>> {
        if self.method != *method {
            return None;
        }
        if self.path_pattern == path {
            return Some(HashMap::new());
        }

        let pattern_parts: Vec<&str> = self.path_pattern.split('/').collect();
        let path_parts: Vec<&str> = path.split('/').collect();
        if pattern_parts.len() != path_parts.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (pattern_part, path_part) in pattern_parts.iter().zip(path_parts.iter()) {
            if let Some(name) = pattern_part
                .strip_prefix('{')
                .and_then(|p| p.strip_suffix('}'))
            {
                if path_part.is_empty() {
                    return None;
                }
                params.insert(name.to_string(), path_part.to_string());
            } else if pattern_part != path_part {
                return None;
            }
        }
        Some(params)
    }
}

#[derive(Clone)]
pub struct Router {
    routes: Arc<Vec<Route>>,
}

#[derive(Default)]
pub struct RouterBuilder {
    routes: Vec<Route>,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route<F, Fut>(&mut self, method: Method, path: impl Into<String>, handler: F)
    where
        F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |ctx| Box::pin(handler(ctx)) as BoxFuture);
        self.routes.push(Route {
            method,
            path_pattern: path.into(),
            handler,
        });
    }

    pub fn get<F, Fut>(&mut self, path: impl Into<String>, handler: F)
    where
        F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult> + Send + 'static,
    {
        self.route(Method::GET, path, handler);
    }

    pub fn post<F, Fut>(&mut self, path: impl Into<String>, handler: F)
    where
        F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult> + Send + 'static,
    {
        self.route(Method::POST, path, handler);
    }

    pub fn put<F, Fut>(&mut self, path: impl Into<String>, handler: F)
    where
        F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult> + Send + 'static,
    {
        self.route(Method::PUT, path, handler);
    }

    pub fn delete<F, Fut>(&mut self, path: impl Into<String>, handler: F)
    where
        F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult> + Send + 'static,
    {
        self.route(Method::DELETE, path, handler);
    }

    pub fn build(self) -> Router {
        Router {
            routes: Arc::new(self.routes),
        }
    }
}

impl Router {
    pub async fn handle(&self, mut ctx: HandlerContext) -> Reply {
        if ctx.method == Method::OPTIONS {
            return preflight_response();
        }

        for route in self.routes.iter() {
            if let Some(params) = route.matches(&ctx.method, &ctx.path) {
                ctx.path_params = params;
                return (route.handler)(ctx)
                    .await
                    .unwrap_or_else(ApiError::into_response);
            }
        }

        warn!("No route found for {} {}", ctx.method, ctx.path);
        error_response(
            StatusCode::NOT_FOUND,
            &format!("Route not found: {} {}", ctx.method, ctx.path),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(method: Method, pattern: &str) -> Route {
        let handler: Handler = Arc::new(|_| {
            Box::pin(async { Err(ApiError::NotFound(String::new())) }) as BoxFuture
        });
        Route {
            method,
            path_pattern: pattern.to_string(),
            handler,
        }
    }

    #[test]
    fn test_route_captures_params() {
        let r = route(Method::GET, "/projects/{id}/scenarios");
        let params = r.matches(&Method::GET, "/projects/42/scenarios").unwrap();
        assert_eq!(params.get("id").map(String::as_str), Some("42"));

        assert!(r.matches(&Method::DELETE, "/projects/42/scenarios").is_none());
        assert!(r.matches(&Method::GET, "/projects/42").is_none());
        assert!(r.matches(&Method::GET, "/projects//scenarios").is_none());
    }
}
