//! Safe header insertion helpers.
//!
//! Static header names avoid runtime `.parse().unwrap()` calls; session
//! tokens come from the control plane and are validated on insertion.

use hyper::header::{HeaderName, HeaderValue};
use hyper::Request;

/// Carries the retry test id to the backend.
pub static X_RETRY_TEST_ID: HeaderName = HeaderName::from_static("x-retry-test-id");

/// Extension trait for setting proxy headers on outbound requests.
pub trait RetryHeadersExt {
    /// Insert a header with a static name and dynamic string value.
    /// Returns false if the value couldn't be converted to a valid header value.
    fn set_header_value(&mut self, name: &HeaderName, value: &str) -> bool;
}

impl<B> RetryHeadersExt for Request<B> {
    fn set_header_value(&mut self, name: &HeaderName, value: &str) -> bool {
        match HeaderValue::from_str(value) {
            Ok(header_value) => {
                self.headers_mut().insert(name.clone(), header_value);
                true
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_header_name() {
        assert_eq!(X_RETRY_TEST_ID.as_str(), "x-retry-test-id");
    }

    #[test]
    fn test_set_header_value_valid() {
        let mut request = Request::new(());
        assert!(request.set_header_value(&X_RETRY_TEST_ID, "4a1b2c"));
        assert_eq!(request.headers().get(&X_RETRY_TEST_ID).unwrap(), "4a1b2c");
    }

    #[test]
    fn test_set_header_value_replaces_client_value() {
        let mut request = Request::builder()
            .header("x-retry-test-id", "from-client")
            .body(())
            .unwrap();
        assert!(request.set_header_value(&X_RETRY_TEST_ID, "from-proxy"));
        let values: Vec<_> = request.headers().get_all(&X_RETRY_TEST_ID).iter().collect();
        assert_eq!(values, vec!["from-proxy"]);
    }

    #[test]
    fn test_set_header_value_invalid() {
        let mut request = Request::new(());
        // Header values can't contain certain characters like newlines
        assert!(!request.set_header_value(&X_RETRY_TEST_ID, "invalid\nvalue"));
        assert!(request.headers().get(&X_RETRY_TEST_ID).is_none());
    }
}
