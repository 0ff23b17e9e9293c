//! One HTTP action and its typed result

use std::fmt;
use std::time::Duration;

use encore_core::error::{BenchError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Description of one request to play against the target.
#[derive(Debug, Clone)]
pub struct Action {
    pub method: Method,
    pub path: String,
    pub expected_status: u16,
    /// What the action asserts, quoted in error messages.
    pub description: &'static str,
    pub json: Option<serde_json::Value>,
    /// Overrides the method-based default timeout when set.
    pub timeout: Option<Duration>,
    /// Static-asset mode: cache the response and accept 200 or 304.
    pub cache: bool,
}

impl Action {
    pub fn get(path: impl Into<String>, description: &'static str) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            expected_status: 200,
            description,
            json: None,
            timeout: None,
            cache: false,
        }
    }

    pub fn post(path: impl Into<String>, description: &'static str) -> Self {
        Self { method: Method::Post, ..Self::get(path, description) }
    }

    pub fn delete(path: impl Into<String>, description: &'static str) -> Self {
        Self { method: Method::Delete, ..Self::get(path, description) }
    }

    pub fn expect(mut self, status: u16) -> Self {
        self.expected_status = status;
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.json = Some(body);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cached(mut self) -> Self {
        self.cache = true;
        self
    }
}

/// A played action's observable outcome.
#[derive(Debug, Clone)]
pub struct Played {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Played {
    /// Decode the JSON body; an undecodable body is a fatal payload defect.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            BenchError::fatal(format!(
                "failed to decode the json body: {e} ({})",
                String::from_utf8_lossy(&self.body[..self.body.len().min(256)])
            ))
        })
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let action = Action::post("/api/users", "sign up").expect(201).timeout(Duration::from_secs(1));
        assert_eq!(action.method, Method::Post);
        assert_eq!(action.expected_status, 201);
        assert_eq!(action.timeout, Some(Duration::from_secs(1)));
        assert!(!action.cache);
    }

    #[test]
    fn test_json_decode_failure_is_fatal() {
        let played = Played { status: 200, body: b"not json".to_vec() };
        let err = played.json::<serde_json::Value>().unwrap_err();
        assert!(err.is_fatal());
    }
}
