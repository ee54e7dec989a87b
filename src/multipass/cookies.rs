//! Token transport: where tokens are read from and the cookies that carry
//! them.

use axum::http::{
    header::{InvalidHeaderValue, AUTHORIZATION, COOKIE},
    HeaderMap, HeaderValue,
};
use url::form_urlencoded;

pub const SESSION_COOKIE_NAME: &str = "jwt_token";
pub const NEXT_URL_COOKIE_NAME: &str = "next_url";
pub const CSRF_COOKIE_NAME: &str = "multipass_csrf";

pub const TOKEN_QUERY_PARAM: &str = "token";
pub const NEXT_URL_QUERY_PARAM: &str = "url";
pub const CSRF_FORM_FIELD: &str = "csrf_token";

const EXPIRED: &str = "Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT";

/// Token from, in order of precedence, the `Authorization: Bearer` header, the
/// session cookie or the `token` query parameter.
#[must_use]
pub fn extract_token(headers: &HeaderMap, query: Option<&str>) -> Option<String> {
    extract_bearer_token(headers)
        .or_else(|| cookie_value(headers, SESSION_COOKIE_NAME))
        .or_else(|| query.and_then(|q| query_value(q, TOKEN_QUERY_PARAM)))
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let (scheme, token) = trimmed.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// First non-empty value of cookie `name` across all `Cookie` headers.
#[must_use]
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let Some((key, val)) = pair.trim().split_once('=') else {
                continue;
            };
            let val = val.trim();
            if key.trim() == name && !val.is_empty() {
                return Some(val.to_string());
            }
        }
    }
    None
}

/// First non-empty, percent-decoded value of `name` in a query string.
#[must_use]
pub fn query_value(query: &str, name: &str) -> Option<String> {
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, value)| key == name && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}

/// Next URL stored in its cookie, decoded.
#[must_use]
pub fn next_url(headers: &HeaderMap) -> Option<String> {
    let raw = cookie_value(headers, NEXT_URL_COOKIE_NAME)?;
    form_urlencoded::parse(raw.as_bytes())
        .next()
        .map(|(value, _)| value.into_owned())
        .filter(|value| !value.is_empty())
}

fn with_secure(mut cookie: String, secure: bool) -> String {
    // Only mark cookies secure when the site is served over HTTPS.
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Browser-session cookie carrying the token.
///
/// # Errors
/// Returns an error if the token contains characters not allowed in headers.
pub fn session_cookie(token: &str, secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let cookie = format!("{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax");
    HeaderValue::from_str(&with_secure(cookie, secure))
}

/// Expire the session cookie immediately.
///
/// # Errors
/// Never fails in practice; the value is static.
pub fn clear_session_cookie(secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; {EXPIRED}");
    HeaderValue::from_str(&with_secure(cookie, secure))
}

/// # Errors
/// Never fails in practice; the value is percent-encoded.
pub fn next_url_cookie(next: &str, secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let encoded: String = form_urlencoded::byte_serialize(next.as_bytes()).collect();
    let cookie = format!("{NEXT_URL_COOKIE_NAME}={encoded}; Path=/; HttpOnly; SameSite=Lax");
    HeaderValue::from_str(&with_secure(cookie, secure))
}

/// # Errors
/// Never fails in practice; the value is static.
pub fn clear_next_url_cookie(secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let cookie = format!("{NEXT_URL_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; {EXPIRED}");
    HeaderValue::from_str(&with_secure(cookie, secure))
}

/// Double-submit CSRF cookie scoped to the auth routes.
///
/// # Errors
/// Returns an error if `value` or `base_path` are not valid header text.
pub fn csrf_cookie(
    value: &str,
    base_path: &str,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let cookie =
        format!("{CSRF_COOKIE_NAME}={value}; Path={base_path}; HttpOnly; SameSite=Strict");
    HeaderValue::from_str(&with_secure(cookie, secure))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            if let Ok(value) = HeaderValue::from_str(value) {
                map.append(*name, value);
            }
        }
        map
    }

    #[test]
    fn header_beats_cookie_beats_query() {
        let all = headers(&[
            ("authorization", "Bearer from-header"),
            ("cookie", "jwt_token=from-cookie"),
        ]);
        assert_eq!(
            extract_token(&all, Some("token=from-query")).as_deref(),
            Some("from-header")
        );

        let cookie_only = headers(&[("cookie", "a=b; jwt_token=from-cookie")]);
        assert_eq!(
            extract_token(&cookie_only, Some("token=from-query")).as_deref(),
            Some("from-cookie")
        );

        assert_eq!(
            extract_token(&HeaderMap::new(), Some("x=1&token=from-query")).as_deref(),
            Some("from-query")
        );
        assert_eq!(extract_token(&HeaderMap::new(), None), None);
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        let map = headers(&[("authorization", "bEaReR  abc ")]);
        assert_eq!(extract_token(&map, None).as_deref(), Some("abc"));

        let basic = headers(&[("authorization", "Basic abc")]);
        assert_eq!(extract_token(&basic, None), None);

        let empty = headers(&[("authorization", "Bearer ")]);
        assert_eq!(extract_token(&empty, None), None);
    }

    #[test]
    fn cookie_value_scans_every_header() {
        let map = headers(&[("cookie", "a=1; broken"), ("cookie", "jwt_token=t; b=2")]);
        assert_eq!(cookie_value(&map, "jwt_token").as_deref(), Some("t"));
        assert_eq!(cookie_value(&map, "b").as_deref(), Some("2"));
        assert_eq!(cookie_value(&map, "missing"), None);

        let empty = headers(&[("cookie", "jwt_token=")]);
        assert_eq!(cookie_value(&empty, "jwt_token"), None);
    }

    #[test]
    fn next_url_cookie_round_trips() -> Result<(), InvalidHeaderValue> {
        let cookie = next_url_cookie("/private?a=1&b=2; x", false)?;
        let raw = cookie.to_str().unwrap_or_default();
        let (pair, _) = raw.split_once(';').unwrap_or((raw, ""));

        let map = headers(&[("cookie", pair)]);
        assert_eq!(next_url(&map).as_deref(), Some("/private?a=1&b=2; x"));
        Ok(())
    }

    #[test]
    fn session_cookie_attributes() -> Result<(), InvalidHeaderValue> {
        assert_eq!(
            session_cookie("abc.def.ghi", false)?,
            "jwt_token=abc.def.ghi; Path=/; HttpOnly; SameSite=Lax"
        );
        assert_eq!(
            session_cookie("t", true)?,
            "jwt_token=t; Path=/; HttpOnly; SameSite=Lax; Secure"
        );
        Ok(())
    }

    #[test]
    fn clear_cookie_expires_in_the_past() -> Result<(), InvalidHeaderValue> {
        let cleared = clear_session_cookie(false)?;
        let cleared = cleared.to_str().unwrap_or_default();
        assert!(cleared.starts_with("jwt_token=;"));
        assert!(cleared.contains("Max-Age=0"));
        assert!(cleared.contains("Expires=Thu, 01 Jan 1970 00:00:00 GMT"));
        Ok(())
    }

    #[test]
    fn csrf_cookie_is_scoped_to_base_path() -> Result<(), InvalidHeaderValue> {
        assert_eq!(
            csrf_cookie("xyz", "/multipass", false)?,
            "multipass_csrf=xyz; Path=/multipass; HttpOnly; SameSite=Strict"
        );
        Ok(())
    }
}
