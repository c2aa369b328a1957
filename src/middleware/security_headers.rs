use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request, Response},
    middleware::Next,
};

/// The API only returns JSON and event streams, so nothing may be loaded or
/// framed from its responses.
const CSP: &str = "default-src 'none'; frame-ancestors 'none'; base-uri 'none'";

/// Adds Content-Security-Policy, Referrer-Policy and X-Content-Type-Options
/// to every response that does not already carry them.
pub async fn security_headers_middleware(req: Request<Body>, next: Next) -> Response<Body> {
    let mut res = next.run(req).await;

    let headers = [
        ("content-security-policy", CSP),
        ("referrer-policy", "no-referrer"),
        ("x-content-type-options", "nosniff"),
    ];

    for (name, value) in headers {
        if res.headers().get(name).is_none() {
            res.headers_mut().insert(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            );
        }
    }

    res
}
