use fleetguard_domain::IncidentReport;

/// Render the shared report view as a standalone HTML page.
pub fn report_html(report: &IncidentReport) -> String {
    let mut rows = String::new();
    push_row(&mut rows, "Vehicle", &report.vehicle_name);
    if let Some(driver) = &report.driver_name {
        push_row(&mut rows, "Driver", driver);
    }
    push_row(
        &mut rows,
        "Occurred",
        &report.occurred_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    );
    push_row(&mut rows, "Severity", &report.severity.to_string());
    push_row(
        &mut rows,
        "Speed at event",
        &format!("{:.1} km/h", report.evidence.speed_at_event_kmh),
    );
    push_row(
        &mut rows,
        "Max speed",
        &format!("{:.1} km/h", report.evidence.max_speed_kmh),
    );
    if let Some(decel) = report.evidence.deceleration_ms2 {
        push_row(&mut rows, "Deceleration", &format!("{:.1} m/s²", decel));
    }
    if let Some(weather) = &report.evidence.weather {
        push_row(
            &mut rows,
            "Weather",
            &format!("{}, {:.0}°C", weather.condition, weather.temperature_c),
        );
    }
    push_row(
        &mut rows,
        "GPS points",
        &report.evidence.gps_trail.len().to_string(),
    );

    let notes = report
        .notes
        .as_ref()
        .map(|n| format!("<p class=\"notes\">{}</p>", escape(n)))
        .unwrap_or_default();

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Incident Report</title>\n\
         <style>body{{font-family:sans-serif;max-width:40em;margin:2em auto}}\
         table{{border-collapse:collapse}}td{{padding:0.3em 1em 0.3em 0}}\
         .notes{{color:#555}}</style>\n</head>\n<body>\n\
         <h1>Incident Report</h1>\n<p>{}</p>\n<table>\n{}</table>\n{}\
         </body>\n</html>\n",
        escape(&report.summary),
        rows,
        notes
    )
}

fn push_row(rows: &mut String, label: &str, value: &str) {
    rows.push_str(&format!(
        "<tr><td>{}</td><td>{}</td></tr>\n",
        escape(label),
        escape(value)
    ));
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use fleetguard_domain::{EvidencePackage, Severity};

    fn report(summary: &str) -> IncidentReport {
        IncidentReport {
            id: "r1".to_string(),
            incident_id: None,
            tenant_id: "acme".to_string(),
            device_id: "device-1".to_string(),
            vehicle_name: "Truck 12".to_string(),
            driver_name: None,
            occurred_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            generated_at: Utc.timestamp_opt(1_700_000_100, 0).unwrap(),
            severity: Severity::High,
            summary: summary.to_string(),
            evidence: EvidencePackage {
                gps_trail: vec![],
                diagnostics: vec![],
                weather: None,
                driver: None,
                speed_at_event_kmh: 52.0,
                max_speed_kmh: 61.0,
                deceleration_ms2: None,
                g_force: None,
                hours_of_service: None,
                photos: vec![],
            },
            share_url: None,
            notes: None,
        }
    }

    #[test]
    fn test_page_contains_summary_and_vehicle() {
        let html = report_html(&report("Collision on Truck 12"));
        assert!(html.contains("Collision on Truck 12"));
        assert!(html.contains("Truck 12"));
        assert!(html.contains("High"));
    }

    #[test]
    fn test_markup_in_fields_is_escaped() {
        let html = report_html(&report("<script>alert(1)</script>"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }
}
