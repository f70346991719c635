use anyhow::anyhow;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand_core::OsRng;

use crate::AppResult;

/// Argon2id hash in PHC string form. Runs on the blocking pool.
pub async fn hash(password: String) -> AppResult<String> {
    let hashed = tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| anyhow!("failed to hash password: {err}"))
    })
    .await??;

    Ok(hashed)
}

pub async fn verify(password: String, hashed: String) -> AppResult<bool> {
    let matches = tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&hashed).map_err(|err| anyhow!("stored password hash is unreadable: {err}"))?;
        anyhow::Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
    })
    .await??;

    Ok(matches)
}
