//! Scripted in-memory transport for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::transport::{HttpRequest, HttpResponse, Method, Transport, TransportError};

#[derive(Debug, Clone)]
pub enum Reply {
    Json(u16, Value),
    Fail(TransportError),
    /// Never answers; the caller's timeout has to fire.
    Hang,
}

/// Replies are looked up by method and URL: queued one-shot replies first,
/// then the standing reply. Unknown routes fail like a refused connection.
#[derive(Default)]
pub struct ScriptedTransport {
    standing: Mutex<HashMap<(Method, String), Reply>>,
    queued: Mutex<HashMap<(Method, String), VecDeque<Reply>>>,
    calls: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply to every matching request.
    pub fn on(&self, method: Method, url: &str, reply: Reply) -> &Self {
        self.standing.lock().unwrap().insert((method, url.to_string()), reply);
        self
    }

    /// Reply to the next matching request only.
    pub fn once(&self, method: Method, url: &str, reply: Reply) -> &Self {
        self.queued
            .lock()
            .unwrap()
            .entry((method, url.to_string()))
            .or_default()
            .push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<HttpRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// `"GET http://host/api/products"` per call, in order.
    pub fn call_log(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|c| format!("{} {}", c.method.as_str(), c.url))
            .collect()
    }

    fn reply_for(&self, request: &HttpRequest) -> Reply {
        let key = (request.method, request.url.clone());
        if let Some(reply) = self
            .queued
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(VecDeque::pop_front)
        {
            return reply;
        }
        self.standing
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or_else(|| Reply::Fail(TransportError::Connect(format!("no route to {}", request.url))))
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        request: &HttpRequest,
        _timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        self.calls.lock().unwrap().push(request.clone());
        match self.reply_for(request) {
            Reply::Json(status, body) => Ok(HttpResponse::new(status, body.to_string())),
            Reply::Fail(err) => Err(err),
            Reply::Hang => std::future::pending().await,
        }
    }
}
