use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use std::time::Instant;

pub const PROCESS_TIME_HEADER: &str = "x-process-time";

/// Milliseconds with two decimals, e.g. "12.34".
pub fn format_elapsed_ms(elapsed: std::time::Duration) -> String {
    format!("{:.2}", elapsed.as_secs_f64() * 1000.0)
}

pub async fn process_time_middleware(req: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let mut res = next.run(req).await;
    let elapsed = format_elapsed_ms(started.elapsed());

    if let Ok(value) = HeaderValue::from_str(&elapsed) {
        res.headers_mut().insert(PROCESS_TIME_HEADER, value);
    }
    tracing::debug!("{} {} -> {} in {}ms", method, path, res.status(), elapsed);
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_elapsed_format() {
        assert_eq!(format_elapsed_ms(Duration::from_micros(12_340)), "12.34");
        assert_eq!(format_elapsed_ms(Duration::ZERO), "0.00");
    }
}
