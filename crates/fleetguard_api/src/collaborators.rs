use async_trait::async_trait;
use fleetguard_domain::error::DomainResult;
use fleetguard_domain::{DocumentRenderer, EmailSender, IncidentReport};
use tracing::info;

/// Renders the report as a plain-text document. Stands in for a real PDF
/// pipeline in the demo wiring.
pub struct PlainTextRenderer;

#[async_trait]
impl DocumentRenderer for PlainTextRenderer {
    async fn render(&self, report: &IncidentReport) -> DomainResult<Vec<u8>> {
        let mut doc = String::new();
        doc.push_str("INCIDENT REPORT\n===============\n\n");
        doc.push_str(&format!("{}\n\n", report.summary));
        doc.push_str(&format!("Vehicle:   {}\n", report.vehicle_name));
        if let Some(driver) = &report.driver_name {
            doc.push_str(&format!("Driver:    {}\n", driver));
        }
        doc.push_str(&format!("Occurred:  {}\n", report.occurred_at.to_rfc3339()));
        doc.push_str(&format!("Severity:  {}\n", report.severity));
        doc.push_str(&format!(
            "Speed:     {:.1} km/h (max {:.1} km/h)\n",
            report.evidence.speed_at_event_kmh, report.evidence.max_speed_kmh
        ));
        if let Some(decel) = report.evidence.deceleration_ms2 {
            doc.push_str(&format!("Decel:     {:.1} m/s2\n", decel));
        }
        doc.push_str(&format!(
            "Trail:     {} GPS points\n",
            report.evidence.gps_trail.len()
        ));
        Ok(doc.into_bytes())
    }
}

/// Logs instead of delivering. Stands in for an SMTP sender in the demo
/// wiring.
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send_report(
        &self,
        report: &IncidentReport,
        recipient: &str,
        message: &str,
    ) -> DomainResult<()> {
        info!(
            report_id = %report.id,
            recipient = %recipient,
            message = %message,
            "would send report email"
        );
        Ok(())
    }
}
