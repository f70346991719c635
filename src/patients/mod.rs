//! Patient accounts and the patient's own profile.

mod profile;

use axum::{routing::get, Router};

use crate::{
    auth::{self, PatientKind},
    AppState,
};

pub use profile::{PatientProfile, PatientProfileUpdate};

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(auth::router::<PatientKind>())
        .route(
            "/profile",
            get(profile::get_profile)
                .put(profile::update_profile)
                .post(profile::create_profile),
        )
}
