use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, ALLOW, CONTENT_TYPE};
use hyper::{Request, Response, StatusCode};

/// Content type declared for every request and response body.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Type alias for Hyper incoming requests
pub type HyperRequest = Request<Incoming>;

/// Type alias for Hyper responses with full body
pub type HyperResponse = Response<Full<Bytes>>;

/// Conversions between HTTP bodies and wire text.
pub struct HttpTransport;

impl HttpTransport {
    /// Reads a body as UTF-8 wire text.
    pub fn body_text(body: Bytes) -> Result<String, String> {
        String::from_utf8(body.to_vec()).map_err(|e| format!("body is not UTF-8: {}", e))
    }

    /// A 200 response carrying an encoded message.
    pub fn to_http_response(body: String) -> HyperResponse {
        Self::to_http_response_with_status(body, StatusCode::OK)
    }

    /// A response with `status` carrying `body` as the wire content type.
    pub fn to_http_response_with_status(body: String, status: StatusCode) -> HyperResponse {
        let mut response = Response::new(Full::new(Bytes::from(body)));
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JSON));
        response
    }

    /// Plain-text 401 for a missing or wrong API key.
    pub fn unauthorized() -> HyperResponse {
        Self::plain(StatusCode::UNAUTHORIZED, "Unauthorized")
    }

    /// Plain-text 405 advertising `Allow: POST`.
    pub fn method_not_allowed() -> HyperResponse {
        let mut response = Self::plain(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed");
        response
            .headers_mut()
            .insert(ALLOW, HeaderValue::from_static("POST"));
        response
    }

    fn plain(status: StatusCode, text: &'static str) -> HyperResponse {
        let mut response = Response::new(Full::new(Bytes::from_static(text.as_bytes())));
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_http_response() {
        let response = HttpTransport::to_http_response("{}".into());
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), CONTENT_TYPE_JSON);
    }

    #[test]
    fn test_to_http_response_with_status() {
        let response =
            HttpTransport::to_http_response_with_status("{}".into(), StatusCode::ACCEPTED);
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[test]
    fn test_body_text_rejects_invalid_utf8() {
        assert_eq!(HttpTransport::body_text(Bytes::from("ok")).unwrap(), "ok");
        assert!(HttpTransport::body_text(Bytes::from_static(&[0xff, 0xfe])).is_err());
    }

    #[test]
    fn test_rejections() {
        assert_eq!(HttpTransport::unauthorized().status(), StatusCode::UNAUTHORIZED);
        let response = HttpTransport::method_not_allowed();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get(ALLOW).unwrap(), "POST");
    }
}
