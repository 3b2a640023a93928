//! Net: HTTP requests

use super::{arg, text_arg, unknown, BuiltinResult, EvalError};
use crate::runtime::evaluator::Evaluator;
use crate::runtime::host::{HttpMethod, HttpRequest, HttpResponse};
use crate::runtime::value::Value;

/// Probed by `Net.isOnline`
pub const ONLINE_PROBE_URL: &str = "https://www.google.com";

/// JSON bodies are parsed, anything else is returned as text
fn decode_body(response: &HttpResponse) -> Value {
    let text = String::from_utf8_lossy(&response.body);
    let is_json = response
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.to_ascii_lowercase().contains("json"));
    if is_json {
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(&text) {
            return Value::from_json(&json);
        }
    }
    Value::Text(text.into_owned())
}

fn ensure_success(url: &str, response: HttpResponse) -> Result<HttpResponse, EvalError> {
    if response.status >= 400 {
        return Err(EvalError::new(format!(
            "HTTP {} from {}",
            response.status, url
        )));
    }
    Ok(response)
}

impl Evaluator<'_> {
    fn request(&mut self, method: HttpMethod, url: &str, body: Option<&Value>) -> Result<HttpResponse, EvalError> {
        let (body, content_type) = match body {
            None | Some(Value::Null) => (None, None),
            Some(value @ (Value::Object(_) | Value::Array(_))) => (
                Some(value.to_json().to_string().into_bytes()),
                Some("application/json".to_string()),
            ),
            Some(value) => (
                Some(value.as_text().into_bytes()),
                Some("text/plain; charset=utf-8".to_string()),
            ),
        };
        let request = HttpRequest {
            method,
            url: url.to_string(),
            body,
            content_type,
        };
        Ok(self.host.http(&request)?)
    }

    pub(super) fn call_net(&mut self, name: &str, args: &[Value]) -> BuiltinResult {
        match name {
            "get" => {
                let url = text_arg(args, 0)?;
                let response = self.request(HttpMethod::Get, &url, None)?;
                Ok(decode_body(&ensure_success(&url, response)?))
            }
            "post" => {
                let url = text_arg(args, 0)?;
                let body = arg(args, 1);
                let response = self.request(HttpMethod::Post, &url, Some(&body))?;
                Ok(decode_body(&ensure_success(&url, response)?))
            }
            "download" => {
                let url = text_arg(args, 0)?;
                let path = text_arg(args, 1)?;
                let response = self.request(HttpMethod::Get, &url, None)?;
                let response = ensure_success(&url, response)?;
                // Stored as text; invalid UTF-8 sequences are replaced
                let content = String::from_utf8_lossy(&response.body);
                self.host.write_file(&path, &content, false)?;
                Ok(Value::Null)
            }
            "isOnline" => {
                let online = self
                    .request(HttpMethod::Head, ONLINE_PROBE_URL, None)
                    .is_ok_and(|r| r.status < 500);
                Ok(Value::Boolean(online))
            }
            "ping" => {
                let url = text_arg(args, 0)?;
                let start = self.host.now_ms();
                let elapsed = match self.request(HttpMethod::Head, &url, None) {
                    Ok(_) => (self.host.now_ms() - start).max(0) as f64,
                    Err(_) => -1.0,
                };
                Ok(Value::Number(elapsed))
            }
            _ => Err(unknown(name)),
        }
    }
}
