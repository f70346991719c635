//! Doctor accounts, the doctor directory, availability windows and the
//! doctor's own profile.

mod availability;
mod directory;
mod profile;

use std::{future::Future, sync::Arc};

use axum::{routing::{get, post}, Router};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    auth::{self, DoctorKind},
    cache::{self, Cache},
    AppResult, AppState,
};

pub use availability::{Availability, SetAvailability};
pub use directory::{DoctorDetails, DoctorSummary};
pub use profile::{DoctorProfile, DoctorProfileUpdate};

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(auth::router::<DoctorKind>())
        .route("/", get(directory::list_doctors))
        .route("/availability", post(availability::set_availability))
        .route("/availability/{doctor_id}", get(availability::get_availability))
        .route(
            "/profile",
            get(profile::get_profile)
                .put(profile::update_profile)
                .post(profile::create_profile),
        )
        .route("/{doctor_id}", get(directory::get_doctor))
}

/// Serves `key` from `cache` when present, else runs `load` and stores a hit.
/// Entries that no longer decode are treated as misses.
async fn read_through<T, F>(cache: &dyn Cache, key: &str, load: F) -> AppResult<Option<T>>
where
    T: Serialize + DeserializeOwned,
    F: Future<Output = AppResult<Option<T>>>,
{
    if let Some(raw) = cache.get(key).await {
        match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!(key, "cache hit");
                return Ok(Some(value));
            }
            Err(err) => warn!(key, error = %err, "discarding undecodable cache entry"),
        }
    }

    debug!(key, "cache miss");
    let loaded = load.await?;
    if let Some(value) = &loaded {
        cache.set(key, serde_json::to_string(value)?).await;
    }
    Ok(loaded)
}

/// Drops every cached read about `doctor_id`.
async fn invalidate(cache: &Arc<dyn Cache>, doctor_id: Uuid) {
    cache.delete(&cache::doctor_details_key(doctor_id)).await;
    cache.delete(&cache::doctor_availability_key(doctor_id)).await;
    debug!(%doctor_id, "doctor cache invalidated");
}
