//! Session-cookie authentication for the admin panel.
//!
//! A request authenticates either with explicit credentials or with the
//! `AUTH` cookie: base64 JSON carrying the username, the password hash, an
//! expiration time and a token binding the three to a per-installation
//! random secret. Passwords are stored hashed in the user table.

use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use ring::rand::SecureRandom;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::digest;
use crate::storage::{Database, DatabaseError};

const COOKIE_NAME: &str = "AUTH";
const SECRET_FILE: &str = "secret";
const SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to generate session secret")]
    SecretGeneration,
}

#[derive(Debug, Serialize, Deserialize)]
struct AuthCookie {
    username: String,
    /// Password hash, not the cleartext.
    password: String,
    /// Unix timestamp after which the cookie is dead.
    expiration: i64,
    token: String,
}

pub struct Authenticator {
    secret: Vec<u8>,
    ttl_secs: i64,
}

impl Authenticator {
    /// Load the per-installation secret, generating it on first start.
    pub fn open<P: AsRef<Path>>(data_dir: P, ttl_secs: i64) -> Result<Self, AuthError> {
        let dir = data_dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let secret_path = dir.join(SECRET_FILE);

        let secret = match std::fs::read(&secret_path) {
            Ok(bytes) if !bytes.is_empty() => bytes,
            _ => {
                let mut bytes = vec![0u8; SECRET_LEN];
                ring::rand::SystemRandom::new()
                    .fill(&mut bytes)
                    .map_err(|_| AuthError::SecretGeneration)?;
                std::fs::write(&secret_path, &bytes)?;
                bytes
            }
        };

        Ok(Self { secret, ttl_secs })
    }

    pub fn hash_password(password: &str) -> String {
        digest::sha256_hex(password.as_bytes())
    }

    fn token(&self, username: &str, password_hash: &str, expiration: i64) -> String {
        let mut input = Vec::new();
        input.extend_from_slice(username.as_bytes());
        input.extend_from_slice(password_hash.as_bytes());
        input.extend_from_slice(expiration.to_string().as_bytes());
        input.extend_from_slice(&self.secret);
        digest::sha256_hex(&input)
    }

    /// Build the Set-Cookie value for a fresh session.
    pub fn issue_cookie(&self, username: &str, password_hash: &str) -> String {
        let expiration = Utc::now().timestamp() + self.ttl_secs;
        let cookie = AuthCookie {
            username: username.to_string(),
            password: password_hash.to_string(),
            expiration,
            token: self.token(username, password_hash, expiration),
        };
        // Serializing a plain struct of strings and an integer cannot fail.
        let json = serde_json::to_string(&cookie).unwrap_or_default();
        format!("{COOKIE_NAME}={}; Path=/; HttpOnly", BASE64.encode(json))
    }

    /// Build the Set-Cookie value that ends a session.
    pub fn clear_cookie() -> String {
        format!("{COOKIE_NAME}=; Path=/; Max-Age=0; HttpOnly")
    }

    /// Verify an `AUTH` cookie value, returning (username, password hash)
    /// when the token checks out and the session has not expired.
    fn decode_cookie(&self, value: &str) -> Option<(String, String)> {
        let json = BASE64.decode(value.trim()).ok()?;
        let cookie: AuthCookie = serde_json::from_slice(&json).ok()?;

        if cookie.token != self.token(&cookie.username, &cookie.password, cookie.expiration) {
            return None;
        }
        if cookie.expiration < Utc::now().timestamp() {
            return None;
        }
        Some((cookie.username, cookie.password))
    }

    /// Resolve the requesting user. Explicit credentials take precedence
    /// over the session cookie; either way the password hash is checked
    /// against the user table.
    pub fn authenticate(
        &self,
        db: &Database,
        credentials: Option<(&str, &str)>,
        cookie_header: Option<&str>,
    ) -> Result<Option<String>, DatabaseError> {
        Ok(self
            .authenticate_full(db, credentials, cookie_header)?
            .map(|(username, _)| username))
    }

    /// Like `authenticate`, but also hands back the verified password hash
    /// so a fresh cookie can be issued.
    pub fn authenticate_full(
        &self,
        db: &Database,
        credentials: Option<(&str, &str)>,
        cookie_header: Option<&str>,
    ) -> Result<Option<(String, String)>, DatabaseError> {
        let (username, password_hash) = match credentials {
            Some((username, password)) => (username.to_string(), Self::hash_password(password)),
            None => match cookie_header.and_then(|h| extract_cookie(h, COOKIE_NAME)) {
                Some(value) => match self.decode_cookie(&value) {
                    Some(pair) => pair,
                    None => return Ok(None),
                },
                None => return Ok(None),
            },
        };

        match db.user_password_hash(&username)? {
            Some(stored) if stored == password_hash => Ok(Some((username, password_hash))),
            _ => Ok(None),
        }
    }
}

/// Pull one cookie's value out of a Cookie request header.
fn extract_cookie(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}
