mod extract;
pub mod kind;
mod login;
pub mod password;
mod register;
mod token;
pub mod validate;

use axum::{routing::post, Router};

use crate::AppState;

pub use extract::Bearer;
pub use kind::{DoctorKind, PatientKind, Registration, UserKind};
pub use login::{authenticate, LoggedIn, LoginRequest};
pub use register::register_user;
pub use token::{Claims, Identity, Role, TokenSigner, TOKEN_TTL};

/// `/register` and `/login` for one kind of account.
pub fn router<K: UserKind>() -> Router<AppState> {
    Router::new()
        .route("/register", post(register::register::<K>))
        .route("/login", post(login::login::<K>))
}
