use crate::share_token::ShareTokenCodec;
use crate::types::{
    DeviceInfo, EvidencePackage, IncidentEvent, IncidentReport, ReportRequest, Severity,
};
use chrono::Utc;

/// Assembles incident reports: severity classification, summary text and
/// the public share link.
pub struct ReportBuilder {
    token_codec: ShareTokenCodec,
    public_base_url: String,
}

impl ReportBuilder {
    pub fn new(token_codec: ShareTokenCodec, public_base_url: impl Into<String>) -> Self {
        Self {
            token_codec,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build the full report for one qualifying incident
    pub fn build(
        &self,
        tenant_id: &str,
        incident: &IncidentEvent,
        device: Option<&DeviceInfo>,
        evidence: EvidencePackage,
    ) -> IncidentReport {
        let id = uuid::Uuid::new_v4().to_string();
        let severity = classify_severity(&incident.rule_name, evidence.deceleration_ms2);
        let vehicle_name = device
            .map(|d| d.name.clone())
            .unwrap_or_else(|| incident.device_id.clone());
        let driver_name = evidence.driver.as_ref().map(|d| d.name.clone());

        let summary = format!(
            "{} on {} at {} km/h (max {} km/h{})",
            incident.rule_name,
            vehicle_name,
            round1(evidence.speed_at_event_kmh),
            round1(evidence.max_speed_kmh),
            evidence
                .deceleration_ms2
                .map(|d| format!(", deceleration {} m/s²", round1(d)))
                .unwrap_or_default(),
        );

        IncidentReport {
            share_url: Some(self.share_url(&id, tenant_id)),
            id,
            incident_id: Some(incident.id.clone()),
            tenant_id: tenant_id.to_string(),
            device_id: incident.device_id.clone(),
            vehicle_name,
            driver_name,
            occurred_at: incident.active_from,
            generated_at: Utc::now(),
            severity,
            summary,
            evidence,
            notes: None,
        }
    }

    /// Build a baseline report for a requested window with no qualifying
    /// incident, documenting vehicle state for reference.
    pub fn build_baseline(
        &self,
        tenant_id: &str,
        request: &ReportRequest,
        device: Option<&DeviceInfo>,
        evidence: EvidencePackage,
    ) -> IncidentReport {
        let id = uuid::Uuid::new_v4().to_string();
        let vehicle_name = device
            .map(|d| d.name.clone())
            .unwrap_or_else(|| request.device_id.clone());
        let driver_name = evidence.driver.as_ref().map(|d| d.name.clone());

        let summary = format!(
            "Baseline report for {}: no qualifying incidents between {} and {} (max speed {} km/h)",
            vehicle_name,
            request.from.format("%Y-%m-%d %H:%M"),
            request.to.format("%Y-%m-%d %H:%M"),
            round1(evidence.max_speed_kmh),
        );

        IncidentReport {
            share_url: Some(self.share_url(&id, tenant_id)),
            id,
            incident_id: None,
            tenant_id: tenant_id.to_string(),
            device_id: request.device_id.clone(),
            vehicle_name,
            driver_name,
            occurred_at: request.to,
            generated_at: Utc::now(),
            severity: Severity::Low,
            summary,
            evidence,
            notes: Some(format!("Requested by {}", request.requested_by)),
        }
    }

    fn share_url(&self, report_id: &str, tenant_id: &str) -> String {
        let token = self.token_codec.encode(report_id, tenant_id);
        format!("{}/r/{}", self.public_base_url, token)
    }
}

/// Severity from rule-name keywords, escalated by deceleration magnitude
pub fn classify_severity(rule_name: &str, deceleration_ms2: Option<f64>) -> Severity {
    let rule = rule_name.to_lowercase();

    let from_rule = if rule.contains("rollover") {
        Severity::Critical
    } else if rule.contains("collision") || rule.contains("crash") || rule.contains("accident") {
        Severity::High
    } else if rule.contains("harsh") || rule.contains("aggressive") {
        Severity::Medium
    } else {
        Severity::Low
    };

    let from_deceleration = match deceleration_ms2 {
        Some(d) if d <= -6.0 => Severity::Critical,
        Some(d) if d <= -4.0 => Severity::High,
        Some(d) if d <= -2.5 => Severity::Medium,
        _ => Severity::Low,
    };

    from_rule.max(from_deceleration)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
