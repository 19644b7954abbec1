use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{error, info, warn};
use reqwest::{Method, StatusCode};

/// A unique identifier for a particular outbound request.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub struct RequestId(pub usize);

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl RequestId {
    /// Atomically get the next ID. This wraps around back to zero if you somehow exceed a usize.
    pub fn next() -> RequestId {
        static REQUEST_ID_COUNTER: AtomicUsize = AtomicUsize::new(0);
        RequestId(REQUEST_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Log a request as it leaves.
pub fn log_request(id: RequestId, method: &Method, path: &str) {
    info!("->req{id} {method} {path}");
}

/// Log the service's answer, louder for failures.
pub fn log_response(id: RequestId, status: StatusCode, path: &str) {
    let log_msg = format!("<-rsp{id} {status} {path}");
    if status.is_server_error() {
        error!("{log_msg}");
    } else if status.is_client_error() {
        warn!("{log_msg}");
    } else {
        info!("{log_msg}");
    }
}

/// Log a request that never got an answer.
pub fn log_failure(id: RequestId, path: &str, err: &reqwest::Error) {
    error!("<-rsp{id} FAILED {path}: {err}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_increase() {
        let a = RequestId::next();
        let b = RequestId::next();
        assert!(b > a);
        assert_eq!(RequestId(7).to_string(), "7");
    }
}
