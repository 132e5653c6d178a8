//! Downloadable HTML report for one simulation.
//!
//! The renderer only formats the figures it is handed. It never re-derives a
//! number and never sees the simulation constants.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use crate::core::{SimulationInput, SimulationResult};

pub const REPORT_CONTENT_TYPE: &str = "text/html; charset=utf-8";
const DEFAULT_FILENAME: &str = "roi-report.html";

#[derive(Debug, Clone)]
pub struct ReportContext<'a> {
    pub email: &'a str,
    pub scenario_name: Option<&'a str>,
    pub inputs: &'a SimulationInput,
    pub results: &'a SimulationResult,
    pub generated_at: DateTime<Utc>,
}

/// Loose `local@domain.tld` shape check. Surrounding whitespace is ignored.
pub fn validate_email(email: &str) -> bool {
    let email = email.trim();
    if email.is_empty() || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

pub fn report_filename(scenario_name: Option<&str>) -> String {
    let slug = scenario_name.map(slugify).unwrap_or_default();
    if slug.is_empty() {
        DEFAULT_FILENAME.to_string()
    } else {
        format!("roi-report-{slug}.html")
    }
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

pub fn format_currency(value: f64) -> String {
    let (sign, digits) = grouped_parts(value);
    format!("{sign}${digits}")
}

/// Sign and grouped two-decimal magnitude. A value that rounds to zero has no
/// sign.
fn grouped_parts(value: f64) -> (&'static str, String) {
    let fixed = format!("{:.2}", value.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    (sign, format!("{}.{cents}", group_thousands(whole)))
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

pub fn format_percent(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{}%", format_number(v)),
        None => "N/A".to_string(),
    }
}

pub fn format_months(value: Option<f64>) -> String {
    match value {
        Some(v) => with_month_unit(format_number(v)),
        None => "N/A".to_string(),
    }
}

pub fn format_horizon(months: u32) -> String {
    with_month_unit(months.to_string())
}

fn with_month_unit(count: String) -> String {
    let unit = if count == "1" || count == "1.00" {
        "month"
    } else {
        "months"
    };
    format!("{count} {unit}")
}

fn format_number(value: f64) -> String {
    let (sign, digits) = grouped_parts(value);
    format!("{sign}{digits}")
}

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

const REPORT_STYLE: &str = "body{font-family:Helvetica,Arial,sans-serif;color:#1f2933;max-width:760px;margin:40px auto;padding:0 24px}\
h1{font-size:26px;margin-bottom:4px}\
.meta{color:#616e7c;font-size:13px;margin-bottom:28px}\
.highlight{display:flex;gap:16px;margin-bottom:28px}\
.card{flex:1;border:1px solid #d9e2ec;border-radius:8px;padding:14px}\
.card .label{font-size:12px;text-transform:uppercase;color:#616e7c}\
.card .value{font-size:22px;font-weight:600;margin-top:6px}\
table{width:100%;border-collapse:collapse;margin-bottom:28px}\
th,td{text-align:left;padding:8px 10px;border-bottom:1px solid #e4e7eb}\
td.num{text-align:right;font-variant-numeric:tabular-nums}\
footer{font-size:12px;color:#9aa5b1}";

pub fn render_report(ctx: &ReportContext<'_>) -> String {
    let inputs = ctx.inputs;
    let results = ctx.results;
    let title = match ctx.scenario_name {
        Some(name) => format!("Invoice Automation ROI Report: {}", escape_html(name)),
        None => "Invoice Automation ROI Report".to_string(),
    };

    let input_rows = [
        ("Monthly invoice volume", format_number(inputs.monthly_invoice_volume)),
        ("AP staff", format_number(inputs.num_ap_staff)),
        ("Average hours per invoice", format_number(inputs.avg_hours_per_invoice)),
        ("Hourly wage", format_currency(inputs.hourly_wage)),
        ("Manual error rate", format_percent(Some(inputs.error_rate_manual))),
        ("Cost per error", format_currency(inputs.error_cost)),
        ("Time horizon", format_horizon(inputs.time_horizon_months)),
        (
            "One-time implementation cost",
            format_currency(inputs.one_time_implementation_cost),
        ),
    ];
    let result_rows = [
        ("Manual labor cost (monthly)", format_currency(results.labor_cost_manual)),
        ("Automation cost (monthly)", format_currency(results.auto_cost)),
        ("Error reduction savings (monthly)", format_currency(results.error_savings)),
        ("Monthly savings", format_currency(results.monthly_savings)),
        ("Cumulative savings", format_currency(results.cumulative_savings)),
        ("Net savings", format_currency(results.net_savings)),
        ("Payback period", format_months(results.payback_months)),
        ("ROI", format_percent(results.roi_percentage)),
    ];

    let mut html = String::with_capacity(4096);
    // Writing into a String cannot fail.
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n<style>{REPORT_STYLE}</style>\n</head>\n<body>\n\
         <h1>{title}</h1>\n\
         <div class=\"meta\">Prepared for {email} on {date}</div>\n",
        email = escape_html(ctx.email.trim()),
        date = ctx.generated_at.format("%Y-%m-%d %H:%M UTC"),
    );

    let _ = write!(
        html,
        "<div class=\"highlight\">\n{}{}{}</div>\n",
        highlight_card("Monthly savings", &format_currency(results.monthly_savings)),
        highlight_card("Payback", &format_months(results.payback_months)),
        highlight_card("ROI", &format_percent(results.roi_percentage)),
    );

    html.push_str(&table("Inputs", &input_rows));
    html.push_str(&table("Results", &result_rows));

    let _ = write!(
        html,
        "<footer>Projection over {}. Figures are estimates based on the inputs above.</footer>\n\
         </body>\n</html>\n",
        format_horizon(inputs.time_horizon_months)
    );
    html
}

fn highlight_card(label: &str, value: &str) -> String {
    format!(
        "<div class=\"card\"><div class=\"label\">{label}</div><div class=\"value\">{value}</div></div>\n"
    )
}

fn table(heading: &str, rows: &[(&str, String)]) -> String {
    let mut out = format!("<h2>{heading}</h2>\n<table>\n");
    for (label, value) in rows {
        let _ = writeln!(out, "<tr><th>{label}</th><td class=\"num\">{value}</td></tr>");
    }
    out.push_str("</table>\n");
    out
}
