//! Session tokens and caller identity.
//!
//! Tokens are HS256 JWTs. The issuer is built once from [`AuthConfig`] and
//! shared by the services and middleware that need it.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Duration, Utc};
use doctrack_common::{AppError, AppResult, config::AuthConfig};
use doctrack_db::{
    entities::{department, user, user::UserRole},
    repositories::{DepartmentRepository, UserRepository},
};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::department::DepartmentRef;
use super::user::UserView;

/// Message returned for every failed login, whatever the cause.
pub const LOGIN_FAILED: &str = "Incorrect username or password.";

/// JWT claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// User ID.
    pub sub: String,
    pub username: String,
    pub role: UserRole,
    pub department_id: String,
    /// Department details for display; not used for authorization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<DepartmentRef>,
    pub iat: i64,
    pub exp: i64,
}

/// The authenticated caller attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
    pub role: UserRole,
    pub department_id: String,
}

impl From<&user::Model> for CurrentUser {
    fn from(user: &user::Model) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            role: user.role,
            department_id: user.department_id.clone(),
        }
    }
}

/// Signs and verifies session tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            ttl: Duration::hours(config.token_ttl_hours),
        }
    }

    /// Issue a token for `user`, valid from now.
    pub fn issue(
        &self,
        user: &user::Model,
        department: Option<&department::Model>,
    ) -> AppResult<String> {
        self.issue_at(user, department, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    pub fn issue_at(
        &self,
        user: &user::Model,
        department: Option<&department::Model>,
        now: DateTime<Utc>,
    ) -> AppResult<String> {
        let claims = Claims {
            sub: user.id.clone(),
            username: user.username.clone(),
            role: user.role,
            department_id: user.department_id.clone(),
            department: department.map(DepartmentRef::from),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {e}")))
    }

    /// Verify signature and expiry. Expired tokens get their own error so
    /// clients can tell them apart from forged ones.
    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AppError::TokenExpired,
                _ => AppError::Unauthorized("Invalid token".to_string()),
            })
    }
}

/// Input for logging in.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(length(min = 1, max = 128))]
    pub username: String,

    #[validate(length(min = 1, max = 256))]
    pub password: String,
}

/// Token plus the profile it was issued for.
#[derive(Debug, Clone, Serialize)]
pub struct AuthPayload {
    pub token: String,
    pub user: UserView,
}

/// Authentication service.
#[derive(Clone)]
pub struct AuthService {
    user_repo: UserRepository,
    department_repo: DepartmentRepository,
    tokens: TokenIssuer,
}

impl AuthService {
    #[must_use]
    pub const fn new(
        user_repo: UserRepository,
        department_repo: DepartmentRepository,
        tokens: TokenIssuer,
    ) -> Self {
        Self {
            user_repo,
            department_repo,
            tokens,
        }
    }

    /// Check credentials and issue a token.
    pub async fn login(&self, input: LoginInput) -> AppResult<AuthPayload> {
        input.validate()?;

        let username = input.username.trim().to_lowercase();
        let Some(user) = self.user_repo.find_by_username(&username).await? else {
            tracing::debug!(username = %username, "Login for unknown user");
            return Err(AppError::Unauthorized(LOGIN_FAILED.to_string()));
        };

        if !verify_password(&input.password, &user.password_hash)? {
            tracing::debug!(user_id = %user.id, "Login with wrong password");
            return Err(AppError::Unauthorized(LOGIN_FAILED.to_string()));
        }

        tracing::info!(user_id = %user.id, "User logged in");
        self.payload_for(user).await
    }

    /// Issue a token for an already-loaded user.
    pub async fn payload_for(&self, user: user::Model) -> AppResult<AuthPayload> {
        let department = self.department_repo.find_by_id(&user.department_id).await?;
        let token = self.tokens.issue(&user, department.as_ref())?;

        Ok(AuthPayload {
            token,
            user: UserView::new(user, department.as_ref()),
        })
    }

    /// Resolve a bearer token to the caller. Role and department come from
    /// the stored user, so changes apply without re-login.
    pub async fn authenticate(&self, token: &str) -> AppResult<CurrentUser> {
        let claims = self.tokens.verify(token)?;

        let user = self
            .user_repo
            .find_by_id(&claims.sub)
            .await?
            .ok_or_else(|| AppError::Unauthorized("User no longer exists".to_string()))?;

        Ok(CurrentUser::from(&user))
    }
}

/// Hash a password using Argon2.
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a hash.
pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use doctrack_common::Config;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn create_test_user(password: &str) -> user::Model {
        user::Model {
            id: "user1".to_string(),
            username: "clerk".to_string(),
            password_hash: hash_password(password).unwrap(),
            role: UserRole::TrackerReceiving,
            department_id: "dept1".to_string(),
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn create_test_department() -> department::Model {
        department::Model {
            id: "dept1".to_string(),
            code: 10,
            name: "Records".to_string(),
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(&Config::for_tests().auth)
    }

    fn service(db: MockDatabase) -> AuthService {
        let db = Arc::new(db.into_connection());
        AuthService::new(
            UserRepository::new(db.clone()),
            DepartmentRepository::new(db),
            issuer(),
        )
    }

    #[test]
    fn test_token_round_trip() {
        let user = create_test_user("Secret1!");
        let dept = create_test_department();
        let tokens = issuer();

        let token = tokens.issue(&user, Some(&dept)).unwrap();
        let claims = tokens.verify(&token).unwrap();

        assert_eq!(claims.sub, "user1");
        assert_eq!(claims.role, UserRole::TrackerReceiving);
        assert_eq!(claims.department_id, "dept1");
        assert_eq!(claims.department.unwrap().code, 10);
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
    }

    #[test]
    fn test_expired_token_is_distinct() {
        let user = create_test_user("Secret1!");
        let tokens = issuer();

        let token = tokens
            .issue_at(&user, None, Utc::now() - Duration::hours(25))
            .unwrap();

        assert!(matches!(tokens.verify(&token), Err(AppError::TokenExpired)));
    }

    #[test]
    fn test_foreign_signature_rejected() {
        let user = create_test_user("Secret1!");
        let mut other = Config::for_tests().auth;
        other.jwt_secret = "another-secret".to_string();

        let token = TokenIssuer::new(&other).issue(&user, None).unwrap();

        assert!(matches!(
            issuer().verify(&token),
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            issuer().verify("not.a.token"),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_password_hashing() {
        let hash = hash_password("Secret1!").unwrap();
        assert!(verify_password("Secret1!", &hash).unwrap());
        assert!(!verify_password("secret1!", &hash).unwrap());
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let user = create_test_user("Secret1!");
        let service =
            service(MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[user]]));

        let result = service
            .login(LoginInput {
                username: "clerk".to_string(),
                password: "Wrong1!!".to_string(),
            })
            .await;

        match result {
            Err(AppError::Unauthorized(msg)) => assert_eq!(msg, LOGIN_FAILED),
            other => panic!("expected Unauthorized, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_login_unknown_user_same_message() {
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<user::Model>::new()]),
        );

        let result = service
            .login(LoginInput {
                username: "ghost".to_string(),
                password: "Secret1!".to_string(),
            })
            .await;

        match result {
            Err(AppError::Unauthorized(msg)) => assert_eq!(msg, LOGIN_FAILED),
            other => panic!("expected Unauthorized, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_login_success_issues_token() {
        let user = create_test_user("Secret1!");
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[user]])
                .append_query_results([[create_test_department()]]),
        );

        let payload = service
            .login(LoginInput {
                username: "Clerk".to_string(),
                password: "Secret1!".to_string(),
            })
            .await
            .unwrap();

        let claims = issuer().verify(&payload.token).unwrap();
        assert_eq!(claims.username, "clerk");
        assert_eq!(payload.user.department.unwrap().name, "Records");
    }

    #[tokio::test]
    async fn test_authenticate_deleted_user() {
        let user = create_test_user("Secret1!");
        let token = issuer().issue(&user, None).unwrap();
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<user::Model>::new()]),
        );

        assert!(matches!(
            service.authenticate(&token).await,
            Err(AppError::Unauthorized(_))
        ));
    }
}
