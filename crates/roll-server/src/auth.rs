//! HTTP Basic-auth identity provider.
//!
//! Credentials are checked against the users listed in the configuration;
//! a successful check yields the caller's [`Identity`], which the
//! [`authenticate`] middleware stores as a request extension for the API
//! handlers.

use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::{Request, State},
  http::HeaderMap,
  middleware::Next,
  response::Response,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use serde::Deserialize;
use tracing::debug;

use roll_core::identity::{Identity, Owner};

use crate::error::Error;

/// One account allowed to use this server instance.
#[derive(Clone, Deserialize)]
pub struct UserConfig {
  /// Also the owner id every row of this user is stored under.
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
  pub display_name:  Option<String>,
  pub email:         Option<String>,
}

impl UserConfig {
  pub fn identity(&self) -> Identity {
    Identity {
      owner:        Owner::new(self.username.clone()),
      display_name: self.display_name.clone(),
      email:        self.email.clone(),
    }
  }
}

/// Credentials accepted as valid for this server instance.
#[derive(Clone, Default)]
pub struct AuthConfig {
  pub users: Vec<UserConfig>,
}

impl AuthConfig {
  fn find(&self, username: &str) -> Option<&UserConfig> {
    self.users.iter().find(|u| u.username == username)
  }
}

/// Verify Basic credentials from headers and resolve the caller.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<Identity, Error> {
  let header_val = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(Error::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(Error::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| Error::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| Error::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(Error::Unauthorized)?;

  let user = config.find(username).ok_or(Error::Unauthorized)?;

  let parsed_hash = PasswordHash::new(&user.password_hash)
    .map_err(|_| Error::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| Error::Unauthorized)?;

  Ok(user.identity())
}

/// Middleware: reject unauthenticated requests with 401, otherwise attach the
/// caller's [`Identity`] to the request.
pub async fn authenticate(
  State(config): State<Arc<AuthConfig>>,
  mut request: Request,
  next: Next,
) -> Result<Response, Error> {
  let identity = verify_auth(request.headers(), &config).inspect_err(|_| {
    debug!(path = %request.uri().path(), "rejected request without valid credentials");
  })?;
  request.extensions_mut().insert(identity);
  Ok(next.run(request).await)
}
