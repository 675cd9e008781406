use crate::models::CrimeReportView;

pub const CSV_HEADER: &str = "ID,Category,Description,Location,Date/Time,Status,Created At";
pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";
pub const CSV_DISPOSITION: &str = "attachment; filename=crime_reports.csv";

fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

pub fn reports_to_csv(reports: &[CrimeReportView]) -> String {
    let mut lines = Vec::with_capacity(reports.len() + 1);
    lines.push(CSV_HEADER.to_string());

    for report in reports {
        lines.push(format!(
            "{},{},{},{},{},{},{}",
            report.id,
            quoted(&report.category),
            quoted(&report.description),
            quoted(report.location_address.as_deref().unwrap_or("N/A")),
            quoted(&report.date_time),
            report.status,
            report.created_at.format("%Y-%m-%d %H:%M:%S"),
        ));
    }

    lines.join("\n")
}
