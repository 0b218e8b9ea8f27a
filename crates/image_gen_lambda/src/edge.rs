//! HTTP edge contract: API Gateway proxy events in, proxy responses out.
//!
//! The gateway forwards requests unmodified, so method dispatch, CORS headers
//! and body decoding all happen here before any handler logic runs.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiGatewayResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: Value,
    pub body: String,
}

impl ApiGatewayResponse {
    pub fn body_json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Accepts an HTTP API (v2) or REST API (v1) proxy event. Anything else is
/// treated as a direct invocation whose payload is the request body itself.
pub fn normalize_http_event(event: Value) -> Result<HttpRequest, String> {
    let Some(object) = event.as_object() else {
        return Err("Request payload must be a JSON object".to_string());
    };

    if !object.contains_key("body") && !object.contains_key("requestContext") {
        return Ok(HttpRequest {
            method: "POST".to_string(),
            headers: BTreeMap::new(),
            body: event.to_string(),
        });
    }

    let method = event
        .pointer("/requestContext/http/method")
        .or_else(|| object.get("httpMethod"))
        .and_then(Value::as_str)
        .unwrap_or("POST")
        .to_ascii_uppercase();

    let headers = object
        .get("headers")
        .and_then(Value::as_object)
        .map(|headers| {
            headers
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .as_str()
                        .map(|value| (name.to_ascii_lowercase(), value.to_string()))
                })
                .collect()
        })
        .unwrap_or_default();

    let is_base64_encoded = object
        .get("isBase64Encoded")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let body = match object.get("body") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) if is_base64_encoded => {
            let bytes = STANDARD
                .decode(text)
                .map_err(|error| format!("Malformed base64 body: {error}"))?;
            String::from_utf8(bytes).map_err(|error| format!("Body is not UTF-8: {error}"))?
        }
        Some(Value::String(text)) => text.clone(),
        Some(Value::Object(_)) => object["body"].to_string(),
        Some(_) => return Err("Request body must be a JSON object".to_string()),
    };

    Ok(HttpRequest {
        method,
        headers,
        body,
    })
}

pub fn cors_headers() -> Value {
    json!({
        "Content-Type": "application/json",
        "Access-Control-Allow-Origin": "*",
        "Access-Control-Allow-Headers": "*",
        "Access-Control-Allow-Methods": "*",
    })
}

pub fn success_response(status_code: u16, payload: impl Serialize) -> ApiGatewayResponse {
    match serde_json::to_string(&payload) {
        Ok(body) => ApiGatewayResponse {
            status_code,
            headers: cors_headers(),
            body,
        },
        Err(error) => error_response(500, "serialization_error", &error.to_string()),
    }
}

pub fn error_response(status_code: u16, error: &str, message: &str) -> ApiGatewayResponse {
    ApiGatewayResponse {
        status_code,
        headers: cors_headers(),
        body: json!({
            "error": error,
            "message": message,
        })
        .to_string(),
    }
}

pub fn validation_error_response(message: &str) -> ApiGatewayResponse {
    error_response(400, "validation_error", message)
}

pub fn preflight_response() -> ApiGatewayResponse {
    ApiGatewayResponse {
        status_code: 204,
        headers: cors_headers(),
        body: String::new(),
    }
}

pub fn method_not_allowed_response(method: &str) -> ApiGatewayResponse {
    error_response(
        405,
        "method_not_allowed",
        &format!("Method {method} is not allowed; use POST"),
    )
}

/// Outcome of routing a request at the edge.
pub enum EdgeRoute {
    /// Answer immediately without running the handler.
    Respond(ApiGatewayResponse),
    Dispatch(HttpRequest),
}

pub fn route_event(event: Value) -> EdgeRoute {
    let request = match normalize_http_event(event) {
        Ok(value) => value,
        Err(message) => return EdgeRoute::Respond(validation_error_response(&message)),
    };

    match request.method.as_str() {
        "POST" => EdgeRoute::Dispatch(request),
        "OPTIONS" => EdgeRoute::Respond(preflight_response()),
        other => EdgeRoute::Respond(method_not_allowed_response(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatched(event: Value) -> HttpRequest {
        match route_event(event) {
            EdgeRoute::Dispatch(request) => request,
            EdgeRoute::Respond(response) => panic!("unexpected response: {response:?}"),
        }
    }

    #[test]
    fn normalizes_http_api_event() {
        let request = dispatched(json!({
            "version": "2.0",
            "headers": {"Content-Type": "application/json", "X-Line-Signature": "abc"},
            "requestContext": {"http": {"method": "POST", "path": "/"}},
            "body": "{\"prompt\":\"a red fox\"}",
            "isBase64Encoded": false
        }));

        assert_eq!(request.method, "POST");
        assert_eq!(request.body, "{\"prompt\":\"a red fox\"}");
        assert_eq!(request.header("x-line-signature"), Some("abc"));
        assert_eq!(request.header("Content-Type"), Some("application/json"));
    }

    #[test]
    fn decodes_base64_bodies() {
        let request = dispatched(json!({
            "requestContext": {"http": {"method": "POST"}},
            "body": STANDARD.encode("{\"prompt\":\"fox\"}"),
            "isBase64Encoded": true
        }));
        assert_eq!(request.body, "{\"prompt\":\"fox\"}");
    }

    #[test]
    fn direct_invocation_uses_whole_payload_as_body() {
        let request = dispatched(json!({"prompt": "fox"}));
        assert_eq!(request.method, "POST");
        assert_eq!(request.body, "{\"prompt\":\"fox\"}");
    }

    #[test]
    fn answers_preflight_and_rejects_other_methods() {
        let EdgeRoute::Respond(preflight) =
            route_event(json!({"requestContext": {"http": {"method": "OPTIONS"}}}))
        else {
            panic!("preflight should be answered at the edge");
        };
        assert_eq!(preflight.status_code, 204);
        assert_eq!(preflight.headers["Access-Control-Allow-Origin"], "*");

        let EdgeRoute::Respond(rejected) =
            route_event(json!({"requestContext": {"http": {"method": "GET"}}}))
        else {
            panic!("GET should be rejected at the edge");
        };
        assert_eq!(rejected.status_code, 405);
        assert_eq!(rejected.body_json()["error"], "method_not_allowed");
    }

    #[test]
    fn rejects_non_object_payloads() {
        let EdgeRoute::Respond(response) = route_event(json!("prompt")) else {
            panic!("string payload should be rejected");
        };
        assert_eq!(response.status_code, 400);
    }

    #[test]
    fn error_responses_carry_cors_headers() {
        let response = error_response(502, "model_invocation_failed", "boom");
        assert_eq!(response.headers["Access-Control-Allow-Headers"], "*");
        assert_eq!(
            response.body_json(),
            json!({"error": "model_invocation_failed", "message": "boom"})
        );
    }
}
