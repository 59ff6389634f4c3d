//! Gateway protocol adapter.
//!
//! Inbound: gateway integrations disagree on field names (`phoneNumber`
//! vs `msisdn`, `sessionId` vs `session_id`) and on body encoding (JSON or
//! form). [`Inbound`] accepts all of them and [`normalize`] produces the
//! canonical [`GatewayRequest`].
//!
//! Outbound: [`render`] writes a [`GatewayResponse`] in one of the
//! [`Dialect`]s. A new dialect is a new `Dialect` variant plus one arm
//! here; the engine never sees the difference.

use axum::extract::{FromRequest, Request};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use serde::{Deserialize, Deserializer, Serialize};

use ussd_core::config::GatewayConfig;
use ussd_core::error::UssdError;
use ussd_core::types::{Dialect, GatewayRequest, GatewayResponse};

use crate::error::ApiError;

/// Appended to a prompt that had to be shortened.
const ELLIPSIS: &str = "...";

/// Preferred cut points, best first.
const BREAKS: [&str; 5] = ["\n\n", "\n", ". ", ", ", " "];

// =============================================================================
// Inbound
// =============================================================================

/// Raw request fields under every spelling we accept.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct InboundFields {
    #[serde(
        default,
        rename = "sessionId",
        alias = "session_id",
        alias = "SessionId",
        deserialize_with = "scalar"
    )]
    pub session_id: Option<String>,
    #[serde(
        default,
        rename = "phoneNumber",
        alias = "phone_number",
        alias = "msisdn",
        alias = "MSISDN",
        alias = "phone",
        deserialize_with = "scalar"
    )]
    pub phone_number: Option<String>,
    #[serde(default, alias = "input", deserialize_with = "scalar")]
    pub text: Option<String>,
    #[serde(
        default,
        rename = "serviceCode",
        alias = "service_code",
        deserialize_with = "scalar"
    )]
    pub service_code: Option<String>,
}

/// Some gateways send identifiers as JSON numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Number(serde_json::Number),
}

fn scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|s| match s {
        Scalar::Text(t) => t,
        Scalar::Number(n) => n.to_string(),
    }))
}

/// Extractor for a gateway request body, JSON or form-encoded.
#[derive(Debug)]
pub struct Inbound(pub InboundFields);

impl<S> FromRequest<S> for Inbound
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| {
                ct.to_ascii_lowercase()
                    .starts_with("application/x-www-form-urlencoded")
            })
            .unwrap_or(false);

        if is_form {
            let Form(fields) = Form::<InboundFields>::from_request(req, state)
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            return Ok(Inbound(fields));
        }

        match Json::<InboundFields>::from_request(req, state).await {
            Ok(Json(fields)) => Ok(Inbound(fields)),
            Err(rejection) if rejection.status() == StatusCode::UNSUPPORTED_MEDIA_TYPE => {
                Err(ApiError::UnsupportedMediaType(rejection.body_text()))
            }
            Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
        }
    }
}

/// Build the canonical request from raw fields.
///
/// Fails when the session id or the caller phone is missing. The text is
/// trimmed and any service-code echo is removed.
pub fn normalize(fields: InboundFields, gateway: &GatewayConfig) -> Result<GatewayRequest, UssdError> {
    let session_id = non_empty(fields.session_id)
        .ok_or_else(|| UssdError::Gateway("missing sessionId".to_string()))?;
    let phone_number = non_empty(fields.phone_number)
        .ok_or_else(|| UssdError::Gateway("missing phoneNumber or msisdn".to_string()))?;
    let raw_text = fields.text.unwrap_or_default();
    let text = strip_service_code(raw_text.trim(), &gateway.service_code, &gateway.delimiter);

    Ok(GatewayRequest {
        session_id,
        phone_number,
        text: text.to_string(),
        service_code: non_empty(fields.service_code),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Remove a leading echo of the dialled code, e.g. `388*3*1` becomes `1`
/// for service code `*388*3#`.
pub fn strip_service_code<'a>(text: &'a str, service_code: &str, delimiter: &str) -> &'a str {
    let body = service_code.trim_start_matches('*').trim_end_matches('#');
    if body.is_empty() || delimiter.is_empty() {
        return text;
    }
    let body = body.replace('*', delimiter);

    let candidate = text.trim_end_matches('#');
    let candidate = candidate.strip_prefix(delimiter).unwrap_or(candidate);
    if candidate == body {
        return "";
    }
    candidate
        .strip_prefix(body.as_str())
        .and_then(|rest| rest.strip_prefix(delimiter))
        .unwrap_or(text)
}

// =============================================================================
// Outbound
// =============================================================================

/// `json` dialect body.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonReply {
    pub text: String,
    pub session_id: String,
    pub phone_number: String,
    pub end_session: bool,
}

/// `response-string` dialect body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResponseStringReply {
    pub response_string: String,
    pub continue_session: bool,
    pub session_id: String,
}

/// Render `response` in `dialect`, shortening the prompt to `max_chars`.
pub fn render(response: &GatewayResponse, dialect: Dialect, max_chars: usize) -> Response {
    let text = truncate(&response.text, max_chars);
    match dialect {
        Dialect::Json => Json(JsonReply {
            text,
            session_id: response.session_id.clone(),
            phone_number: response.phone_number.clone(),
            end_session: response.end_session(),
        })
        .into_response(),
        Dialect::PlainText => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            plain_text(response.continue_session, &text),
        )
            .into_response(),
        Dialect::ResponseString => Json(ResponseStringReply {
            response_string: text,
            continue_session: response.continue_session,
            session_id: response.session_id.clone(),
        })
        .into_response(),
    }
}

/// `CON <prompt>` while the session continues, `END <prompt>` otherwise.
pub fn plain_text(continue_session: bool, text: &str) -> String {
    let marker = if continue_session { "CON" } else { "END" };
    format!("{} {}", marker, text)
}

/// Shorten `text` to at most `max_chars` characters.
///
/// The cut lands on the last paragraph, line, sentence, comma or space
/// break that still keeps more than 70% of the limit, and `...` is
/// appended. Without such a break the text is cut hard.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    let end = text
        .char_indices()
        .nth(keep)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let head = &text[..end];

    for brk in BREAKS {
        if let Some(pos) = head.rfind(brk) {
            if head[..pos].chars().count() * 10 > max_chars * 7 {
                return format!("{}{}", &head[..pos], ELLIPSIS);
            }
        }
    }
    format!("{}{}", head, ELLIPSIS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> GatewayConfig {
        GatewayConfig::default()
    }

    fn fields(session: &str, phone: &str, text: &str) -> InboundFields {
        InboundFields {
            session_id: Some(session.to_string()),
            phone_number: Some(phone.to_string()),
            text: Some(text.to_string()),
            service_code: None,
        }
    }

    #[test]
    fn test_json_field_spellings() {
        let camel: InboundFields = serde_json::from_str(
            r#"{"sessionId":"s1","phoneNumber":"260971234567","text":"1","serviceCode":"*388*3#"}"#,
        )
        .unwrap();
        assert_eq!(camel.session_id.as_deref(), Some("s1"));
        assert_eq!(camel.phone_number.as_deref(), Some("260971234567"));
        assert_eq!(camel.service_code.as_deref(), Some("*388*3#"));

        let snake: InboundFields =
            serde_json::from_str(r#"{"session_id":"s2","msisdn":260971234567,"input":"1*2"}"#)
                .unwrap();
        assert_eq!(snake.session_id.as_deref(), Some("s2"));
        assert_eq!(snake.phone_number.as_deref(), Some("260971234567"));
        assert_eq!(snake.text.as_deref(), Some("1*2"));
    }

    #[test]
    fn test_normalize_requires_session_and_phone() {
        let mut f = fields("s1", "260971234567", "");
        f.session_id = None;
        assert!(matches!(normalize(f, &gateway()), Err(UssdError::Gateway(_))));

        let f = fields("s1", "   ", "");
        assert!(matches!(normalize(f, &gateway()), Err(UssdError::Gateway(_))));
    }

    #[test]
    fn test_normalize_missing_text_is_first_dial() {
        let mut f = fields("s1", "260971234567", "");
        f.text = None;
        let req = normalize(f, &gateway()).unwrap();
        assert_eq!(req.text, "");
        assert_eq!(req.service_code, None);
    }

    #[test]
    fn test_normalize_strips_echo() {
        let req = normalize(fields("s1", "260971234567", " 388*3*1*2 "), &gateway()).unwrap();
        assert_eq!(req.text, "1*2");
    }

    #[test]
    fn test_strip_service_code() {
        assert_eq!(strip_service_code("388*3", "*388*3#", "*"), "");
        assert_eq!(strip_service_code("*388*3#", "*388*3#", "*"), "");
        assert_eq!(strip_service_code("388*3*1", "*388*3#", "*"), "1");
        assert_eq!(strip_service_code("1*1*Dennis", "*388*3#", "*"), "1*1*Dennis");
        assert_eq!(strip_service_code("3881", "*388*3#", "*"), "3881");
        assert_eq!(strip_service_code("388#3#1", "*388*3#", "#"), "1");
        assert_eq!(strip_service_code("1", "", "*"), "1");
    }

    #[test]
    fn test_truncate_short_text_untouched() {
        assert_eq!(truncate("Welcome", 160), "Welcome");
        let exact = "x".repeat(160);
        assert_eq!(truncate(&exact, 160), exact);
    }

    #[test]
    fn test_truncate_prefers_line_break() {
        let text = format!("{}\n{}", "a".repeat(120), "b".repeat(60));
        let out = truncate(&text, 160);
        assert_eq!(out, format!("{}...", "a".repeat(120)));
    }

    #[test]
    fn test_truncate_ignores_early_breaks() {
        // Only break is at 50 chars, below 70% of 100.
        let text = format!("{} {}", "a".repeat(50), "b".repeat(80));
        let out = truncate(&text, 100);
        assert_eq!(out.chars().count(), 100);
        assert!(out.ends_with("..."));
        assert!(out.starts_with(&"a".repeat(50)));
    }

    #[test]
    fn test_truncate_counts_characters() {
        let text = "é".repeat(200);
        let out = truncate(&text, 160);
        assert_eq!(out.chars().count(), 160);
    }

    #[test]
    fn test_plain_text_markers() {
        assert_eq!(plain_text(true, "Welcome"), "CON Welcome");
        assert_eq!(plain_text(false, "Bye"), "END Bye");
    }

    #[tokio::test]
    async fn test_render_dialects() {
        let request = GatewayRequest {
            session_id: "s1".to_string(),
            phone_number: "260971234567".to_string(),
            text: String::new(),
            service_code: None,
        };
        let response = GatewayResponse::end(&request, "Thank you");

        let body = axum::body::to_bytes(render(&response, Dialect::Json, 160).into_body(), 4096)
            .await
            .unwrap();
        let json: JsonReply = serde_json::from_slice(&body).unwrap();
        assert_eq!(json.text, "Thank you");
        assert_eq!(json.session_id, "s1");
        assert!(json.end_session);

        let body =
            axum::body::to_bytes(render(&response, Dialect::PlainText, 160).into_body(), 4096)
                .await
                .unwrap();
        assert_eq!(&body[..], b"END Thank you");

        let body = axum::body::to_bytes(
            render(&response, Dialect::ResponseString, 160).into_body(),
            4096,
        )
        .await
        .unwrap();
        let rs: ResponseStringReply = serde_json::from_slice(&body).unwrap();
        assert!(!rs.continue_session);
        assert_eq!(rs.response_string, "Thank you");
    }
}
