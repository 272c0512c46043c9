//! Recording HTTP backend for unit tests

use crate::error::Result;
use crate::slack::{HttpBackend, Params, RawResponse};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub url: String,
    pub method: String,
    pub params: Params,
}

/// Canned responses keyed by API method.
///
/// Each method has a queue; the last queued response is sticky and answers
/// every further call. Unknown methods answer `unknown_method`.
#[derive(Clone, Default)]
pub struct MockBackend {
    responses: Arc<Mutex<HashMap<String, VecDeque<RawResponse>>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every queued response for `method` with `body`
    pub fn respond(&self, method: &str, body: Value) {
        self.respond_raw(method, RawResponse::ok(body.to_string()));
    }

    pub fn respond_raw(&self, method: &str, response: RawResponse) {
        let mut responses = self.responses.lock().unwrap();
        responses.insert(method.to_string(), VecDeque::from([response]));
    }

    /// Append a response after the ones already queued for `method`
    pub fn enqueue(&self, method: &str, body: Value) {
        let mut responses = self.responses.lock().unwrap();
        responses
            .entry(method.to_string())
            .or_default()
            .push_back(RawResponse::ok(body.to_string()));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_to(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    pub fn last_call(&self, method: &str) -> Option<RecordedCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|c| c.method == method)
            .cloned()
    }
}

impl HttpBackend for MockBackend {
    async fn post_form(&self, url: &str, form: &[(String, String)]) -> Result<RawResponse> {
        let method = url.rsplit('/').next().unwrap_or(url).to_string();
        self.calls.lock().unwrap().push(RecordedCall {
            url: url.to_string(),
            method: method.clone(),
            params: form.iter().map(|(k, v)| (k.as_str(), v)).collect(),
        });

        let mut responses = self.responses.lock().unwrap();
        let response = match responses.get_mut(&method) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };

        Ok(response.unwrap_or_else(|| {
            RawResponse::ok(r#"{"ok": false, "error": "unknown_method"}"#)
        }))
    }
}
