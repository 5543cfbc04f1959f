// Session-token auth for the dashboard endpoints

use std::collections::HashSet;
use std::sync::Mutex;
use tiny_http::Header;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "session";

/// In-memory session tokens. Logging in issues a fresh token; restarting
/// the dashboard logs everyone out, which is fine for a single operator.
#[derive(Default)]
pub struct Sessions {
    tokens: Mutex<HashSet<String>>,
}

impl Sessions {
    pub fn issue(&self) -> String {
        let token = Uuid::new_v4().to_string();
        self.tokens.lock().unwrap().insert(token.clone());
        token
    }

    pub fn validate(&self, token: &str) -> bool {
        self.tokens.lock().unwrap().contains(token)
    }

    pub fn revoke(&self, token: &str) {
        self.tokens.lock().unwrap().remove(token);
    }
}

/// Pull the session token from a `Bearer` authorization header or the
/// session cookie, in that order.
pub fn extract_token(headers: &[Header]) -> Option<String> {
    for header in headers {
        if header.field.equiv("Authorization") {
            if let Some(token) = header.value.as_str().strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }

    for header in headers {
        if header.field.equiv("Cookie") {
            for pair in header.value.as_str().split(';') {
                if let Some((key, value)) = pair.trim().split_once('=') {
                    if key == SESSION_COOKIE {
                        return Some(value.to_string());
                    }
                }
            }
        }
    }

    None
}

pub fn session_cookie(token: &str) -> Header {
    Header::from_bytes(
        &b"Set-Cookie"[..],
        format!("{}={}; HttpOnly; Path=/; SameSite=Strict", SESSION_COOKIE, token).as_bytes(),
    )
    .expect("static header")
}

pub fn clear_session_cookie() -> Header {
    Header::from_bytes(
        &b"Set-Cookie"[..],
        format!("{}=; HttpOnly; Path=/; Max-Age=0", SESSION_COOKIE).as_bytes(),
    )
    .expect("static header")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(field: &str, value: &str) -> Header {
        Header::from_bytes(field.as_bytes(), value.as_bytes()).unwrap()
    }

    #[test]
    fn issue_validate_revoke_cycle() {
        let sessions = Sessions::default();
        let token = sessions.issue();
        assert!(sessions.validate(&token));
        sessions.revoke(&token);
        assert!(!sessions.validate(&token));
        assert!(!sessions.validate("made-up"));
    }

    #[test]
    fn bearer_token_wins_over_cookie() {
        let headers = vec![
            header("Cookie", "session=cookie-token"),
            header("Authorization", "Bearer bearer-token"),
        ];
        assert_eq!(extract_token(&headers).as_deref(), Some("bearer-token"));
    }

    #[test]
    fn cookie_token_is_found_among_other_cookies() {
        let headers = vec![header("Cookie", "theme=dark; session=abc123; lang=en")];
        assert_eq!(extract_token(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn missing_credentials_yield_none() {
        let headers = vec![header("Cookie", "theme=dark")];
        assert_eq!(extract_token(&headers), None);
    }
}
