use crate::domain::{is_valid_domain, User};
use crate::infrastructure::{
    generate_reset_token, generate_verification_code, hash_password, password_reset_mail,
    user_key, verification_mail, verify_password, AgentRepository, AppCaches, MailError, Mailer,
    PasswordError, RepositoryError, TokenError, TokenSigner, UserRepository,
};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const PASSWORD_MIN_LEN: u64 = 6;
pub const PASSWORD_MAX_LEN: u64 = 100;
const MAX_DOMAIN_LEN: usize = 253;
const DELETE_CONFIRMATION: &str = "DELETE";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("{0}")]
    Validation(String),
    #[error("User already exists")]
    UserExists,
    #[error("User not found")]
    UserNotFound,
    #[error("User already verified")]
    AlreadyVerified,
    #[error("Invalid or expired verification code")]
    InvalidCode,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Please verify your email first")]
    NotVerified,
    #[error("Invalid or expired token")]
    InvalidResetToken,
    #[error("Current password is incorrect")]
    WrongPassword,
    #[error("Type DELETE to confirm account deletion")]
    InvalidConfirmation,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Password error: {0}")]
    Password(#[from] PasswordError),
    #[error("Token error: {0}")]
    Token(#[from] TokenError),
    #[error("Mail error: {0}")]
    Mail(#[from] MailError),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn check_email(email: &str) -> Result<(), AuthError> {
    if validator::validate_email(email) {
        Ok(())
    } else {
        Err(AuthError::Validation("Invalid email address".to_string()))
    }
}

fn check_password(password: &str) -> Result<(), AuthError> {
    if validator::validate_length(
        password,
        Some(PASSWORD_MIN_LEN),
        Some(PASSWORD_MAX_LEN),
        None,
    ) {
        Ok(())
    } else {
        Err(AuthError::Validation(format!(
            "Password must be {} to {} characters",
            PASSWORD_MIN_LEN, PASSWORD_MAX_LEN
        )))
    }
}

/// Trim, lower-case, drop blanks and duplicates; reject anything that is not a domain.
pub fn normalize_domains(domains: Vec<String>) -> Result<Vec<String>, AuthError> {
    let mut out: Vec<String> = Vec::with_capacity(domains.len());
    for domain in domains {
        let domain = domain.trim().to_lowercase();
        if domain.is_empty() || out.contains(&domain) {
            continue;
        }
        if domain.len() > MAX_DOMAIN_LEN || !is_valid_domain(&domain) {
            return Err(AuthError::Validation(format!("Invalid domain: {}", domain)));
        }
        out.push(domain);
    }
    Ok(out)
}

// bcrypt is CPU bound; keep it off the async workers
async fn hash_blocking(password: &str, cost: u32) -> Result<String, AuthError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || hash_password(&password, cost))
        .await
        .map_err(|e| AuthError::Internal(e.to_string()))?
        .map_err(AuthError::from)
}

async fn verify_blocking(password: &str, password_hash: &str) -> Result<bool, AuthError> {
    let password = password.to_string();
    let password_hash = password_hash.to_string();
    tokio::task::spawn_blocking(move || verify_password(&password, &password_hash))
        .await
        .map_err(|e| AuthError::Internal(e.to_string()))
}

pub struct AuthService<U, A>
where
    U: UserRepository,
    A: AgentRepository,
{
    user_repo: Arc<U>,
    agent_repo: Arc<A>,
    signer: Arc<TokenSigner>,
    mailer: Arc<dyn Mailer>,
    caches: Arc<AppCaches>,
    bcrypt_cost: u32,
    frontend_url: String,
}

impl<U, A> AuthService<U, A>
where
    U: UserRepository,
    A: AgentRepository,
{
    pub fn new(
        user_repo: Arc<U>,
        agent_repo: Arc<A>,
        signer: Arc<TokenSigner>,
        mailer: Arc<dyn Mailer>,
        caches: Arc<AppCaches>,
        bcrypt_cost: u32,
        frontend_url: String,
    ) -> Self {
        Self {
            user_repo,
            agent_repo,
            signer,
            mailer,
            caches,
            bcrypt_cost,
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create an unverified user and mail the verification code. A mail
    /// failure is logged; the account still exists and can request a reset.
    pub async fn register(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = normalize_email(email);
        check_email(&email)?;
        check_password(password)?;

        if self.user_repo.find_by_email(&email).await?.is_some() {
            return Err(AuthError::UserExists);
        }

        let password_hash = hash_blocking(password, self.bcrypt_cost).await?;
        let code = generate_verification_code();
        let user = User::new(email, password_hash, code.clone());

        match self.user_repo.create(&user).await {
            Ok(()) => {}
            Err(RepositoryError::Conflict(_)) => return Err(AuthError::UserExists),
            Err(e) => return Err(e.into()),
        }

        if let Err(e) = self.mailer.send(verification_mail(&user.email, &code)).await {
            error!(user_id = %user.id, error = %e, "Failed to send verification email");
        }

        info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    pub async fn verify_email(&self, email: &str, code: &str) -> Result<(), AuthError> {
        let mut user = self
            .user_repo
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if user.is_verified {
            return Err(AuthError::AlreadyVerified);
        }
        if !user.verification_code_matches(code.trim(), Utc::now()) {
            return Err(AuthError::InvalidCode);
        }

        user.mark_verified();
        self.user_repo.update(&user).await?;
        self.caches.invalidate_user(user.id);

        info!(user_id = %user.id, "Email verified");
        Ok(())
    }

    /// Returns a signed bearer token.
    pub async fn login(&self, email: &str, password: &str) -> Result<String, AuthError> {
        let user = self
            .user_repo
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_blocking(password, &user.password_hash).await? {
            return Err(AuthError::InvalidCredentials);
        }
        if !user.is_verified {
            return Err(AuthError::NotVerified);
        }

        Ok(self.signer.issue(user.id, &user.email)?)
    }

    /// Resolve a bearer token to a live user.
    pub async fn authenticate(&self, token: &str) -> Result<User, AuthError> {
        let claims = self.signer.verify(token).map_err(|e| {
            warn!(error = %e, "Rejected bearer token");
            AuthError::Unauthorized
        })?;

        match self.profile(claims.sub).await {
            Ok(user) => Ok(user),
            Err(AuthError::UserNotFound) => Err(AuthError::Unauthorized),
            Err(e) => Err(e),
        }
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<User, AuthError> {
        let key = user_key(user_id);
        if let Some(user) = self.caches.users.get(&key) {
            return Ok(user);
        }

        let user = match self.user_repo.get_by_id(user_id).await {
            Ok(user) => user,
            Err(RepositoryError::NotFound(_)) => return Err(AuthError::UserNotFound),
            Err(e) => return Err(e.into()),
        };
        self.caches.users.insert(key, user.clone());
        Ok(user)
    }

    pub async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        let mut user = self
            .user_repo
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let token = generate_reset_token();
        user.start_password_reset(token.clone(), Utc::now());
        self.user_repo.update(&user).await?;
        self.caches.invalidate_user(user.id);

        let link = format!("{}/reset-password?token={}", self.frontend_url, token);
        self.mailer
            .send(password_reset_mail(&user.email, &link))
            .await?;

        info!(user_id = %user.id, "Password reset requested");
        Ok(())
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        check_password(new_password)?;

        let mut user = self
            .user_repo
            .find_by_reset_token(token)
            .await?
            .ok_or(AuthError::InvalidResetToken)?;

        if !user.reset_token_valid(token, Utc::now()) {
            return Err(AuthError::InvalidResetToken);
        }

        let password_hash = hash_blocking(new_password, self.bcrypt_cost).await?;
        user.set_password_hash(password_hash);
        self.user_repo.update(&user).await?;
        self.caches.invalidate_user(user.id);

        info!(user_id = %user.id, "Password reset");
        Ok(())
    }

    /// Only the domain list is user-editable.
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        domains: Vec<String>,
    ) -> Result<User, AuthError> {
        let domains = normalize_domains(domains)?;

        // existence check before writing
        self.user_repo.get_by_id(user_id).await.map_err(|e| match e {
            RepositoryError::NotFound(_) => AuthError::UserNotFound,
            other => other.into(),
        })?;

        self.user_repo.set_domains(user_id, &domains).await?;
        self.caches.invalidate_user(user_id);
        self.profile(user_id).await
    }

    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        check_password(new_password)?;

        let mut user = self.user_repo.get_by_id(user_id).await.map_err(|e| match e {
            RepositoryError::NotFound(_) => AuthError::UserNotFound,
            other => other.into(),
        })?;

        if !verify_blocking(current_password, &user.password_hash).await? {
            return Err(AuthError::WrongPassword);
        }

        let password_hash = hash_blocking(new_password, self.bcrypt_cost).await?;
        user.set_password_hash(password_hash);
        self.user_repo.update(&user).await?;
        self.caches.invalidate_user(user_id);

        info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    /// Remove the user, their agents and (through the foreign key) their billing records.
    pub async fn delete_account(&self, user_id: Uuid, confirmation: &str) -> Result<(), AuthError> {
        if !confirmation.trim().eq_ignore_ascii_case(DELETE_CONFIRMATION) {
            return Err(AuthError::InvalidConfirmation);
        }

        let removed = self.agent_repo.delete_all_for_user(user_id).await?;
        self.user_repo.delete(user_id).await?;
        self.caches.invalidate_user(user_id);
        self.caches.invalidate_agents(user_id);

        info!(user_id = %user_id, agents_removed = removed, "Account deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_normalized_before_checks() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
        assert!(check_email("alice@example.com").is_ok());
        assert!(check_email("not-an-email").is_err());
    }

    #[test]
    fn password_length_bounds() {
        assert!(check_password("12345").is_err());
        assert!(check_password("123456").is_ok());
        assert!(check_password(&"x".repeat(100)).is_ok());
        assert!(check_password(&"x".repeat(101)).is_err());
    }

    #[test]
    fn domains_are_cleaned_and_validated() {
        let cleaned = normalize_domains(vec![
            " Example.com ".to_string(),
            "example.com".to_string(),
            "".to_string(),
            "shop.example.org".to_string(),
        ])
        .unwrap();
        assert_eq!(cleaned, vec!["example.com", "shop.example.org"]);

        assert!(matches!(
            normalize_domains(vec!["not a domain".to_string()]),
            Err(AuthError::Validation(_))
        ));
    }
}
