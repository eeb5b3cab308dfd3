//! In-memory `ApiCaller` for unit tests

use std::collections::VecDeque;

use async_trait::async_trait;
use maz_http::{ApiCaller, ApiRequest, ApiResponse, Method};
use parking_lot::Mutex;
use serde_json::{json, Value};

struct Route {
    method: Method,
    url: String,
    responses: VecDeque<ApiResponse>,
}

/// Answers by exact method and URL (query parameters ignored). Responses queued
/// on one route are served in order; the last one repeats. Unknown routes get
/// a Graph-style 404.
#[derive(Default)]
pub struct MockApi {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, method: Method, url: &str, status: u16, body: Value) -> &Self {
        let response = ApiResponse::new(status, (!body.is_null()).then_some(body));
        let mut routes = self.routes.lock();
        match routes.iter_mut().find(|r| r.method == method && r.url == url) {
            Some(route) => route.responses.push_back(response),
            None => routes.push(Route {
                method,
                url: url.to_string(),
                responses: VecDeque::from([response]),
            }),
        }
        self
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    pub fn count(&self, method: Method, url: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method == method && r.url == url)
            .count()
    }
}

#[async_trait]
impl ApiCaller for MockApi {
    async fn call(&self, request: ApiRequest) -> maz_http::Result<ApiResponse> {
        self.requests.lock().push(request.clone());

        let mut routes = self.routes.lock();
        let route = routes
            .iter_mut()
            .find(|r| r.method == request.method && r.url == request.url);
        let response = match route {
            Some(route) if route.responses.len() > 1 => route.responses.pop_front(),
            Some(route) => route.responses.front().cloned(),
            None => None,
        };
        Ok(response.unwrap_or_else(|| {
            ApiResponse::new(
                404,
                Some(json!({"error": {"code": "NotFound", "message": request.url}})),
            )
        }))
    }
}
