//! Facility registration.
//!
//! Nothing else can run until the world model has assigned the facility an
//! entity ID, so registration retries with backoff until it succeeds or the
//! process is asked to stop.

use chrono::Utc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::backoff::BackoffPolicy;
use crate::gateway::{FacilityAttributes, RegisterRequest, Registration, WorldModelGateway};
use crate::roster::DoctorRoster;

/// Entity type the world model knows hospitals by.
pub const ENTITY_TYPE: &str = "Hospital";

/// Build the registration body for this facility.
pub fn registration_request(
    name: &str,
    max_capacity: usize,
    roster: &DoctorRoster,
) -> RegisterRequest {
    RegisterRequest {
        entity_type: ENTITY_TYPE.to_string(),
        max_capacity,
        eav: FacilityAttributes {
            name: name.to_string(),
            doctors: roster.doctors().to_vec(),
            creation_date: Utc::now(),
        },
    }
}

/// Register until the world model accepts, or return `None` on shutdown.
pub async fn register_until_success(
    gateway: &dyn WorldModelGateway,
    request: &RegisterRequest,
    backoff: &BackoffPolicy,
    shutdown: &mut watch::Receiver<bool>,
) -> Option<Registration> {
    let mut attempt = 0u32;

    loop {
        match gateway.register(request).await {
            Ok(registration) => {
                info!(
                    entity_id = %registration.entity_id,
                    time_rate = registration.time_rate,
                    attempts = attempt + 1,
                    "Registered with world model"
                );
                return Some(registration);
            }
            Err(e) => {
                let delay = backoff.delay(attempt);
                let retry_in_ms = delay.as_millis() as u64;
                if attempt < 3 {
                    warn!(error = %e, attempt, retry_in_ms, "Registration failed");
                } else {
                    error!(error = %e, attempt, retry_in_ms, "Registration failed repeatedly");
                }
                attempt = attempt.saturating_add(1);

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("Registration abandoned on shutdown");
                            return None;
                        }
                    }
                }
            }
        }
    }
}
