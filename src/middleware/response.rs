use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};

/// Builds the `{"success": ..}` envelope for a response body.
pub fn envelope(status: StatusCode, is_json: bool, bytes: &[u8]) -> Value {
    let fallback_error = status
        .canonical_reason()
        .map(String::from)
        .unwrap_or_else(|| status.to_string());

    if is_json {
        let data: Value = serde_json::from_slice(bytes).unwrap_or(Value::Null);

        // Error bodies from AgriError are already enveloped.
        if data.as_object().map_or(false, |obj| obj.contains_key("success")) {
            return data;
        }
        if status.is_success() {
            return json!({ "success": true, "data": data });
        }
        let message = data
            .as_str()
            .or_else(|| data.get("error").and_then(Value::as_str))
            .map(String::from)
            .unwrap_or(fallback_error);
        return json!({ "success": false, "error": message });
    }

    let text = String::from_utf8_lossy(bytes).to_string();
    if status.is_success() {
        if text.is_empty() {
            json!({ "success": true, "data": null })
        } else {
            json!({ "success": true, "data": text })
        }
    } else if text.is_empty() {
        json!({ "success": false, "error": fallback_error })
    } else {
        // Extractor rejections (bad JSON, bad query) arrive as plain text.
        json!({ "success": false, "error": text })
    }
}

pub async fn wrap_response_middleware(req: Request, next: Next) -> Result<Response, StatusCode> {
    let wrap = req.uri().path().starts_with("/api");
    let res = next.run(req).await;
    if !wrap {
        return Ok(res);
    }

    let status = res.status();
    let is_json = res
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .map_or(false, |ct| ct.contains("application/json"));

    let (mut parts, body) = res.into_parts();
    let bytes = body
        .collect()
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .to_bytes();

    let new_bytes = serde_json::to_vec(&envelope(status, is_json, &bytes))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    parts
        .headers
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    parts.headers.insert(header::CONTENT_LENGTH, HeaderValue::from(new_bytes.len()));

    Ok(Response::from_parts(parts, Body::from(new_bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_json_is_wrapped() {
        let out = envelope(StatusCode::OK, true, br#"[1,2]"#);
        assert_eq!(out, json!({ "success": true, "data": [1, 2] }));
    }

    #[test]
    fn test_existing_envelope_passes_through() {
        let body = br#"{"success":false,"error":"Crop 9 not found"}"#;
        let out = envelope(StatusCode::NOT_FOUND, true, body);
        assert_eq!(out["error"], "Crop 9 not found");
    }

    #[test]
    fn test_plain_text_rejection_becomes_error() {
        let out = envelope(StatusCode::BAD_REQUEST, false, b"Failed to deserialize query string");
        assert_eq!(out, json!({ "success": false, "error": "Failed to deserialize query string" }));

        let empty = envelope(StatusCode::METHOD_NOT_ALLOWED, false, b"");
        assert_eq!(empty["error"], "Method Not Allowed");
    }

    #[test]
    fn test_empty_success_has_null_data() {
        assert_eq!(envelope(StatusCode::OK, false, b""), json!({ "success": true, "data": null }));
    }
}
