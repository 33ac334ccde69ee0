/// Plain-text reports for measurements, ledger statistics, and trend results.
///
/// Rendering only: every figure comes in already computed. Values are
/// rounded to two decimals here and nowhere else.

use chrono::{DateTime, Utc};

use crate::analysis::statistics::{CityCount, LedgerStatistics};
use crate::analysis::trend::{Degeneracy, TrendResult};
use crate::model::{alert_token, Measurement, RiskLevel};

/// Guidance line shown under the risk level.
pub fn risk_guidance(risk: RiskLevel) -> &'static str {
    match risk {
        RiskLevel::High => "Critical flood risk. Notify local authorities.",
        RiskLevel::Moderate => "Continuous monitoring required. Watch for updates.",
        RiskLevel::Low => "Stable conditions. No imminent risk.",
    }
}

pub fn render_measurement(m: &Measurement, risk: RiskLevel) -> String {
    [
        "=== MONITORING REPORT ===".to_string(),
        format!("City:                {}", m.city),
        format!("Water level:         {:.2} m", m.water_level),
        format!("Rain intensity:      {}%", m.rain_intensity),
        format!("Civil defense alert: {}", alert_token(m.civil_defense_alert)),
        String::new(),
        format!("Risk level: {}", risk.as_str().to_uppercase()),
        risk_guidance(risk).to_string(),
    ]
    .join("\n")
}

fn format_mean(mean: Option<f64>) -> String {
    match mean {
        Some(v) => format!("{:.2}", v),
        None => "n/a".to_string(),
    }
}

fn ranking_lines(title: &str, ranking: &[CityCount]) -> Vec<String> {
    let mut lines = vec![String::new(), title.to_string()];
    if ranking.is_empty() {
        lines.push("  (none)".to_string());
    }
    lines.extend(ranking.iter().map(|c| format!("  {:<24} {}", c.city, c.count)));
    lines
}

pub fn render_statistics(stats: &LedgerStatistics, generated_at: DateTime<Utc>) -> String {
    let mut lines = vec![
        "=== LEDGER STATISTICS ===".to_string(),
        format!("Generated: {}", generated_at.format("%Y-%m-%d %H:%M UTC")),
        format!("Total sessions:     {}", stats.total_sessions),
        format!("Total measurements: {}", stats.total_measurements),
        String::new(),
        "Measurements by risk level:".to_string(),
    ];
    lines.extend(
        stats
            .risk_counts
            .iter()
            .map(|(risk, count)| format!("  {:<10} {}", risk.as_str(), count)),
    );

    lines.push(String::new());
    lines.push("Risk levels per session:".to_string());
    let levels: Vec<RiskLevel> = stats.risk_counts.keys().copied().collect();
    let header: String = levels.iter().map(|risk| format!(" {:>9}", risk.as_str())).collect();
    lines.push(format!("  {:<8}{}", "session", header));
    for (session, row) in &stats.risk_counts_per_session {
        let cells: String = levels
            .iter()
            .map(|risk| format!(" {:>9}", row.get(risk).copied().unwrap_or(0)))
            .collect();
        lines.push(format!("  {:<8}{}", session, cells));
    }

    lines.push(String::new());
    lines.push("Mean per session:".to_string());
    lines.push(format!("  {:<8} {:>14} {:>12}", "session", "water level m", "rain %"));
    for (session, level) in &stats.mean_water_level_per_session {
        let rain = stats.mean_rain_per_session.get(session).copied().flatten();
        lines.push(format!(
            "  {:<8} {:>14} {:>12}",
            session,
            format_mean(*level),
            format_mean(rain)
        ));
    }

    lines.extend(ranking_lines("Most monitored cities:", &stats.top_cities));
    lines.extend(ranking_lines(
        "Cities with most High risk readings:",
        &stats.top_high_risk_cities,
    ));
    lines.join("\n")
}

pub fn render_trend(city: &str, result: &TrendResult) -> String {
    let mut lines = vec![format!(
        "=== RIVER LEVEL TREND: {} ({}) ===",
        city,
        result.strategy.name()
    )];

    match result.degeneracy {
        Some(Degeneracy::EmptySeries) => {
            lines.push("No data to evaluate.".to_string());
            return lines.join("\n");
        }
        Some(Degeneracy::NonPositiveMaximum { max }) => lines.push(format!(
            "Note: maximum level {:.2} m is not positive; values shown unnormalized.",
            max
        )),
        Some(Degeneracy::ReducedDegree { requested, used }) => lines.push(format!(
            "Note: too few observations for degree {}; fitted degree {} instead.",
            requested, used
        )),
        None => {}
    }

    if let Some((lo, hi)) = result.y_range {
        lines.push(format!("Level range: {:.2} m to {:.2} m", lo, hi));
    }
    if let Some(peak) = result.peak {
        lines.push(format!("Peak: {:.2} m on day {:.2}", peak.y, peak.x));
    }

    if result.breaches.is_empty() {
        lines.push(format!("No days above {:.2} m.", result.breach_threshold));
    } else {
        let days: Vec<String> = result.breaches.iter().map(|p| format!("{:.2}", p.x)).collect();
        lines.push(format!(
            "Days above {:.2} m ({}): {}",
            result.breach_threshold,
            result.breaches.len(),
            days.join(", ")
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::trend::{TrendModel, TrendSeries, TrendStrategy, DayDomain};
    use crate::ledger::Ledger;
    use crate::model::LedgerEntry;
    use chrono::TimeZone;

    #[test]
    fn test_measurement_report_shows_risk_and_guidance() {
        let m = Measurement {
            city: "Blumenau".to_string(),
            water_level: 2.3,
            rain_intensity: 40,
            civil_defense_alert: true,
        };
        let text = render_measurement(&m, RiskLevel::High);
        assert!(text.contains("Blumenau"));
        assert!(text.contains("Water level:         2.30 m"));
        assert!(text.contains("Civil defense alert: Yes"));
        assert!(text.contains("Risk level: HIGH"));
        assert!(text.contains("Notify local authorities"));
    }

    #[test]
    fn test_statistics_report_lists_sessions_and_rankings() {
        let m = Measurement {
            city: "Itajaí".to_string(),
            water_level: 0.5,
            rain_intensity: 10,
            civil_defense_alert: false,
        };
        let ledger = Ledger::from_entries(vec![
            LedgerEntry::new(1, &m, RiskLevel::Low),
            LedgerEntry::new(2, &m, RiskLevel::Low),
        ]);
        let stats = LedgerStatistics::from_ledger(&ledger);
        let at = Utc.with_ymd_and_hms(2024, 5, 6, 12, 30, 0).unwrap();

        let text = render_statistics(&stats, at);
        assert!(text.contains("Generated: 2024-05-06 12:30 UTC"));
        assert!(text.contains("Total sessions:     2"));
        assert!(text.contains("Itajaí"));
        assert!(text.contains("(none)"), "no High readings should be reported as none");
    }

    #[test]
    fn test_trend_report_lists_breach_days() {
        let series = TrendSeries::days(&[1, 2, 3, 4], &DayDomain::default()).unwrap();
        let result = TrendModel::new(TrendStrategy::FixedFormulaDirect).evaluate(&series);
        let text = render_trend("Blumenau", &result);
        assert!(text.contains("fixed formula"));
        assert!(text.contains("Days above 2.00 m (1): 4.00"));
        assert!(text.contains("Peak: 2.20 m on day 4.00"));
    }

    #[test]
    fn test_trend_report_for_empty_series() {
        let series = TrendSeries::days(&[], &DayDomain::default()).unwrap();
        let result = TrendModel::default().evaluate(&series);
        assert!(render_trend("Gaspar", &result).contains("No data to evaluate."));
    }
}
