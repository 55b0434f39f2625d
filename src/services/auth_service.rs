use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};
use validator::Validate;

use crate::dto::auth_dto::{AuthResponse, LoginRequest, RegisterStudentPayload};
use crate::error::{Error, Result};
use crate::models::user::{Role, User};
use crate::services::api_client::ApiClient;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Option<String>,
    pub exp: Option<i64>,
    pub role: Option<String>,
}

/// The logged-in user and their bearer token, passed explicitly to every
/// service that needs credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub user: User,
    pub token: String,
}

impl From<AuthResponse> for AuthSession {
    fn from(response: AuthResponse) -> Self {
        Self {
            user: response.user,
            token: response.token,
        }
    }
}

impl AuthSession {
    pub fn role(&self) -> Role {
        self.user.role
    }

    pub fn require_role(&self, allowed: &[Role]) -> Result<()> {
        if allowed.is_empty() || allowed.contains(&self.user.role) {
            return Ok(());
        }
        Err(Error::Forbidden(format!(
            "'{}' accounts cannot perform this action",
            self.user.role.as_str()
        )))
    }

    /// Reads `exp` without verifying the signature; only the server can do
    /// that. Tokens that are not JWTs have no known expiry.
    pub fn token_expiry(&self) -> Option<DateTime<Utc>> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = decode::<Claims>(&self.token, &DecodingKey::from_secret(&[]), &validation).ok()?;
        DateTime::<Utc>::from_timestamp(data.claims.exp?, 0)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.token_expiry().map(|exp| exp <= now).unwrap_or(false)
    }

    pub fn ensure_valid(&self, now: DateTime<Utc>) -> Result<()> {
        if self.is_expired(now) {
            return Err(Error::Unauthorized(
                "Your session has expired, please log in again".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    pub async fn load(path: &Path) -> Result<Option<Self>> {
        match tokio::fs::read(path).await {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn clear(path: &Path) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Clone)]
pub struct AuthService {
    api: ApiClient,
}

impl AuthService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn login(&self, request: LoginRequest) -> Result<AuthSession> {
        request.validate()?;
        let response: AuthResponse = self.api.post("auth/login", &request).await.map_err(|e| {
            warn!(username = %request.username, error = %e, "Login failed");
            e
        })?;
        info!(user = %response.user.username, role = response.user.role.as_str(), "Logged in");
        Ok(response.into())
    }

    pub async fn register_student(&self, payload: RegisterStudentPayload) -> Result<AuthSession> {
        payload.validate()?;
        if payload.role != Role::Student {
            return Err(Error::BadRequest("Only student accounts can self-register".to_string()));
        }
        let response: AuthResponse = self.api.post("auth/register", &payload).await?;
        info!(user = %response.user.username, "Registered student account");
        Ok(response.into())
    }
}
