use crate::error::DomainResult;
use crate::telematics::{TelematicsApi, WeatherProvider};
use crate::types::{EvidencePackage, GpsPoint, IncidentEvent, SessionHandle};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

const KMH_TO_MS: f64 = 1.0 / 3.6;

/// The time range to gather evidence over, plus the reference instant the
/// derived metrics are anchored to.
#[derive(Debug, Clone, Copy)]
pub struct EvidenceWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub reference: DateTime<Utc>,
}

impl EvidenceWindow {
    pub fn around_incident(incident: &IncidentEvent, before: Duration, after: Duration) -> Self {
        Self {
            from: incident.active_from - before,
            to: incident.active_to + after,
            reference: incident.active_from,
        }
    }

    /// A plain date range (manual request path); metrics anchor to the end
    /// of the window.
    pub fn for_range(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from,
            to,
            reference: to,
        }
    }
}

/// Gathers GPS trail, diagnostics and driver identity concurrently, joins
/// them, then derives the speed/deceleration metrics.
pub struct EvidenceCollector {
    api: Arc<dyn TelematicsApi>,
    weather: Arc<dyn WeatherProvider>,
}

impl EvidenceCollector {
    pub fn new(api: Arc<dyn TelematicsApi>, weather: Arc<dyn WeatherProvider>) -> Self {
        Self { api, weather }
    }

    /// Collect the full evidence package for one device over the window.
    ///
    /// The three vendor fetches run as a fork-join; all must succeed. The
    /// weather sub-fetch failing only leaves the weather fields unset.
    #[instrument(skip(self, session), fields(tenant_id = %session.tenant_id, device_id = %device_id))]
    pub async fn collect(
        &self,
        session: &SessionHandle,
        device_id: &str,
        driver_id: Option<&str>,
        window: &EvidenceWindow,
    ) -> DomainResult<EvidencePackage> {
        let gps_future = self
            .api
            .gps_trail(session, device_id, window.from, window.to);
        let diagnostics_future = self
            .api
            .diagnostics(session, device_id, window.from, window.to);
        let driver_future = async {
            match driver_id {
                Some(id) => self.api.driver(session, id).await,
                None => Ok(None),
            }
        };

        let (gps_trail, diagnostics, driver) =
            tokio::join!(gps_future, diagnostics_future, driver_future);
        let gps_trail = gps_trail?;
        let diagnostics = diagnostics?;
        let driver = driver?;

        debug!(
            trail_points = gps_trail.len(),
            diagnostics = diagnostics.len(),
            "evidence fetched"
        );

        let weather = match nearest_point(&gps_trail, window.reference) {
            Some(point) => {
                match self
                    .weather
                    .conditions_at(point.latitude, point.longitude, window.reference)
                    .await
                {
                    Ok(snapshot) => Some(snapshot),
                    Err(e) => {
                        warn!("weather lookup failed, leaving weather unset: {}", e);
                        None
                    }
                }
            }
            None => None,
        };

        Ok(EvidencePackage {
            speed_at_event_kmh: speed_at_event(&gps_trail, window.reference),
            max_speed_kmh: max_speed(&gps_trail),
            deceleration_ms2: deceleration_ms2(&gps_trail, window.reference),
            gps_trail,
            diagnostics,
            weather,
            driver,
            g_force: None,
            hours_of_service: None,
            photos: Vec::new(),
        })
    }
}

/// The trail point whose timestamp is closest to `at`
pub fn nearest_point(trail: &[GpsPoint], at: DateTime<Utc>) -> Option<&GpsPoint> {
    trail.iter().min_by_key(|p| {
        (p.timestamp - at)
            .num_milliseconds()
            .unsigned_abs()
    })
}

/// Speed of the trail point nearest the reference instant; 0 when the
/// trail is empty or the point has no speed.
pub fn speed_at_event(trail: &[GpsPoint], at: DateTime<Utc>) -> f64 {
    nearest_point(trail, at)
        .and_then(|p| p.speed_kmh)
        .unwrap_or(0.0)
}

/// Maximum speed over the trail, treating missing speed as 0
pub fn max_speed(trail: &[GpsPoint]) -> f64 {
    trail
        .iter()
        .map(|p| p.speed_kmh.unwrap_or(0.0))
        .fold(0.0, f64::max)
}

/// Deceleration in m/s² from the two trail points immediately preceding
/// the reference instant; `None` with fewer than two such points or a
/// near-zero time delta.
pub fn deceleration_ms2(trail: &[GpsPoint], at: DateTime<Utc>) -> Option<f64> {
    let mut preceding: Vec<&GpsPoint> = trail.iter().filter(|p| p.timestamp <= at).collect();
    preceding.sort_by_key(|p| p.timestamp);
    let n = preceding.len();
    if n < 2 {
        return None;
    }

    let earlier = preceding[n - 2];
    let later = preceding[n - 1];
    let dt_ms = (later.timestamp - earlier.timestamp).num_milliseconds();
    if dt_ms == 0 {
        return None;
    }

    let v0 = earlier.speed_kmh.unwrap_or(0.0) * KMH_TO_MS;
    let v1 = later.speed_kmh.unwrap_or(0.0) * KMH_TO_MS;
    Some((v1 - v0) / (dt_ms as f64 / 1000.0))
}
