//! `grpc.health.v1` serving status.
//!
//! The status map itself, `Check` and the streaming `Watch` come from
//! [`tonic_health`]. This module only decides what is registered: the overall
//! entry (`""`) and every service the listener exposes start out `SERVING`,
//! and are flipped to `NOT_SERVING` when the listener begins its graceful stop.
//! Unknown service names answer `NOT_FOUND`.

use tonic_health::pb::health_server::{Health, HealthServer};
use tonic_health::server::HealthReporter;

pub use tonic_health::ServingStatus;

/// Creates the health service with `""` and each of `services` set to
/// `SERVING`.
pub async fn serving_health_service(
    services: &[&str],
) -> (HealthReporter, HealthServer<impl Health>) {
    let (reporter, service) = tonic_health::server::health_reporter();

    reporter
        .set_service_status("", ServingStatus::Serving)
        .await;
    for name in services {
        reporter
            .set_service_status(*name, ServingStatus::Serving)
            .await;
    }

    (reporter, service)
}

/// Marks `""` and each of `services` as `NOT_SERVING`, so health checks start
/// failing before connections are drained.
pub async fn mark_not_serving(reporter: &HealthReporter, services: &[&str]) {
    for name in services {
        reporter
            .set_service_status(*name, ServingStatus::NotServing)
            .await;
    }
    reporter
        .set_service_status("", ServingStatus::NotServing)
        .await;
}
