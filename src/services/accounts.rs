use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::{
    db::CatalogStore,
    error::{AppError, AppResult, FieldErrors},
    models::{AuthToken, NewUser, User},
};

const USERNAME_MAX: usize = 150;
const SALT_BYTES: usize = 16;
const TOKEN_BYTES: usize = 20;
const HASH_SCHEME: &str = "hmac-sha256";
const HASH_ROUNDS: u32 = 4096;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password2: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct RegisterResponse {
    pub response: String,
    pub username: String,
    pub email: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct LoginResponse {
    pub token: String,
}

/// Keyed by the password, chains `rounds` HMACs starting from the salt and
/// returns the final round unfinalized
fn final_round(salt: &[u8], password: &str, rounds: u32) -> AppResult<HmacSha256> {
    let keyed = HmacSha256::new_from_slice(password.as_bytes())
        .map_err(|e| AppError::Internal(format!("HMAC key rejected: {}", e)))?;

    let mut block = salt.to_vec();
    for _ in 1..rounds {
        let mut mac = keyed.clone();
        mac.update(&block);
        block = mac.finalize().into_bytes().to_vec();
    }
    let mut mac = keyed;
    mac.update(&block);
    Ok(mac)
}

/// Hashes a password as `hmac-sha256$<rounds>$<salt-hex>$<digest-hex>` with a
/// fresh random salt
pub fn hash_password(password: &str) -> AppResult<String> {
    let mut salt = [0u8; SALT_BYTES];
    rand::thread_rng().fill_bytes(&mut salt);
    let digest = final_round(&salt, password, HASH_ROUNDS)?.finalize().into_bytes();
    Ok(format!(
        "{}${}${}${}",
        HASH_SCHEME,
        HASH_ROUNDS,
        hex::encode(salt),
        hex::encode(digest)
    ))
}

/// Checks a password against a stored hash; the digest comparison is constant-time
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(4, '$');
    let (Some(scheme), Some(rounds), Some(salt), Some(expected)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    if scheme != HASH_SCHEME {
        return false;
    }
    let (Ok(rounds), Ok(salt), Ok(expected)) =
        (rounds.parse::<u32>(), hex::decode(salt), hex::decode(expected))
    else {
        return false;
    };
    if rounds == 0 {
        return false;
    }
    match final_round(&salt, password, rounds) {
        Ok(mac) => mac.verify_slice(&expected).is_ok(),
        Err(_) => false,
    }
}

/// 40 lowercase hex characters
pub fn generate_token_key() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn valid_username(username: &str) -> bool {
    !username.is_empty()
        && username.chars().count() <= USERNAME_MAX
        && username
            .chars()
            .all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
}

async fn token_for(store: &dyn CatalogStore, user: &User) -> AppResult<AuthToken> {
    store
        .issue_token(AuthToken {
            key: generate_token_key(),
            user_id: user.id,
            created_at: Utc::now(),
        })
        .await
}

/// Creates an account and issues its first token
pub async fn register(store: &dyn CatalogStore, request: RegisterRequest) -> AppResult<RegisterResponse> {
    let mut errors = FieldErrors::new();
    if !valid_username(&request.username) {
        errors.add(
            "username",
            "Enter a valid username of at most 150 letters, digits and @/./+/-/_ characters.",
        );
    } else if store.find_user_by_username(&request.username).await?.is_some() {
        errors.add("username", "A user with that username already exists.");
    }

    if !request.email.contains('@') {
        errors.add("email", "Enter a valid email address.");
    } else if store.email_taken(&request.email).await? {
        errors.add("email", "Email already exists.");
    }

    if request.password.is_empty() {
        errors.add("password", "This field may not be blank.");
    } else if request.password != request.password2 {
        errors.add("password", "Passwords must match.");
    }
    errors.into_result()?;

    let user = store
        .create_user(NewUser {
            username: request.username,
            email: request.email,
            password_hash: hash_password(&request.password)?,
            is_staff: false,
        })
        .await?;
    let token = token_for(store, &user).await?;

    tracing::info!(user_id = user.id, username = %user.username, "User registered");
    Ok(RegisterResponse {
        response: "Successfully registered a new user.".to_string(),
        username: user.username,
        email: user.email,
        token: token.key,
    })
}

/// Exchanges credentials for the user's token, creating one if needed
pub async fn login(store: &dyn CatalogStore, request: LoginRequest) -> AppResult<LoginResponse> {
    let user = store.find_user_by_username(&request.username).await?;
    let user = match user {
        Some(user) if verify_password(&request.password, &user.password_hash) => user,
        _ => {
            tracing::warn!(username = %request.username, "Failed login");
            return Err(FieldErrors::single(
                "non_field_errors",
                "Unable to log in with provided credentials.",
            ));
        }
    };

    let token = token_for(store, &user).await?;
    Ok(LoginResponse { token: token.key })
}

/// Revokes the user's token
pub async fn logout(store: &dyn CatalogStore, user: &User) -> AppResult<()> {
    store.delete_token(user.id).await?;
    tracing::info!(user_id = user.id, "User logged out");
    Ok(())
}

/// Resolves a token key to its user
pub async fn authenticate(store: &dyn CatalogStore, key: &str) -> AppResult<User> {
    store
        .user_for_token(key)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid token.".to_string()))
}

/// Makes sure a staff account with the given credentials exists
pub async fn ensure_admin(store: &dyn CatalogStore, username: &str, password: &str) -> AppResult<User> {
    if let Some(existing) = store.find_user_by_username(username).await? {
        if !existing.is_staff {
            tracing::warn!(username, "Configured admin account exists but is not staff");
        }
        return Ok(existing);
    }

    let user = store
        .create_user(NewUser {
            username: username.to_string(),
            email: format!("{}@localhost", username),
            password_hash: hash_password(password)?,
            is_staff: true,
        })
        .await?;
    tracing::info!(user_id = user.id, username, "Admin account created");
    Ok(user)
}
