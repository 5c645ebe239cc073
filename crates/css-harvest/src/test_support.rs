//! In-memory transport for unit tests.

use crate::error::FetchError;
use crate::fetch::{Request, Response, Transport};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
struct Route {
    status: u16,
    body: String,
    delay: Duration,
}

/// Serves canned responses keyed by absolute URL. Unknown URLs get a 404.
#[derive(Debug, Default)]
pub(crate) struct ScriptedTransport {
    routes: HashMap<String, Route>,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn css(self, url: &str, body: &str) -> Self {
        self.css_after(url, body, Duration::ZERO)
    }

    pub(crate) fn css_after(self, url: &str, body: &str, delay: Duration) -> Self {
        self.route(url, 200, body, delay)
    }

    pub(crate) fn status(self, url: &str, status: u16, body: &str) -> Self {
        self.route(url, status, body, Duration::ZERO)
    }

    /// Every request sent so far, in dispatch order.
    pub(crate) fn requests(&self) -> Arc<Mutex<Vec<Request>>> {
        self.requests.clone()
    }

    fn route(mut self, url: &str, status: u16, body: &str, delay: Duration) -> Self {
        let key = Url::parse(url).map_or_else(|_| url.to_string(), |u| u.to_string());
        self.routes.insert(
            key,
            Route {
                status,
                body: body.to_string(),
                delay,
            },
        );
        self
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: Request) -> Result<Response, FetchError> {
        let route = self.routes.get(request.url().as_str()).cloned();
        self.requests.lock().unwrap().push(request);

        let Some(route) = route else {
            return Ok(Response {
                status: 404,
                body: "Not Found".to_string(),
            });
        };

        if !route.delay.is_zero() {
            tokio::time::sleep(route.delay).await;
        }

        Ok(Response {
            status: route.status,
            body: route.body,
        })
    }
}
