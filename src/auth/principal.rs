//! Caller identity extracted from a verified token.
//!
//! # Responsibilities
//! - Pick subject and role out of the token claims
//! - Drop empty and `"undefined"` values
//! - Write (and strip) the identity headers sent upstream

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use serde_json::Value;

pub const USER_ID_HEADER: HeaderName = HeaderName::from_static("x-user-id");
pub const USER_ROLE_HEADER: HeaderName = HeaderName::from_static("x-user-role");

/// Claims the gateway reads. Anything else in the token is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<Value>,
    #[serde(default, rename = "userId")]
    pub user_id: Option<Value>,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub role: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Principal {
    pub subject_id: Option<String>,
    pub role: Option<String>,
}

impl Principal {
    /// Subject comes from `sub`, then `userId`, then `id`.
    pub fn from_claims(claims: &Claims) -> Self {
        let subject_id = [&claims.sub, &claims.user_id, &claims.id]
            .into_iter()
            .find_map(|claim| claim.as_ref().and_then(sanitize));
        let role = claims.role.as_ref().and_then(sanitize);

        Self { subject_id, role }
    }

    /// Set `X-User-ID` / `X-User-Role` for every present value.
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        insert_identity(headers, USER_ID_HEADER, self.subject_id.as_deref());
        insert_identity(headers, USER_ROLE_HEADER, self.role.as_deref());
    }
}

/// Remove client-supplied identity headers.
pub fn strip_identity_headers(headers: &mut HeaderMap) {
    headers.remove(USER_ID_HEADER);
    headers.remove(USER_ROLE_HEADER);
}

fn insert_identity(headers: &mut HeaderMap, name: HeaderName, value: Option<&str>) {
    let Some(value) = value else {
        return;
    };
    match HeaderValue::from_str(value) {
        Ok(v) => {
            headers.insert(name, v);
        }
        Err(_) => {
            tracing::warn!(header = %name, "Claim is not a valid header value, omitting");
        }
    }
}

fn sanitize(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if text.is_empty() || text == "undefined" {
        None
    } else {
        Some(text)
    }
}
