#![allow(clippy::format_push_string)]

use crate::aggregation::GroupAggregate;
use crate::cleaning::CleaningStage;
use crate::report::{AnalysisReport, Share};

const RULE_HEAVY: &str = "═══════════════════════════════════════════════════════════════\n";
const RULE_LIGHT: &str = "───────────────────────────────────────────────────────────────\n";

pub struct ReportFormatter;

impl ReportFormatter {
    /// Renders the report as a boxed plain-text summary.
    ///
    /// Values are rounded to `settings.display_precision` here and nowhere
    /// else.
    #[must_use]
    pub fn to_text(report: &AnalysisReport) -> String {
        let p = report.settings.display_precision as usize;
        let mut output = String::new();

        output.push('\n');
        output.push_str(RULE_HEAVY);
        output.push_str("                  A/B TEST ANALYSIS RESULTS                    \n");
        output.push_str(RULE_HEAVY);
        output.push_str(&format!(
            "Generated:             {}\n",
            report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        output.push_str(&format!(
            "Comparison:            {} vs {} (baseline)\n",
            report.treatment(),
            report.baseline()
        ));
        output.push('\n');

        // Cleaning
        output.push_str("Data Cleaning\n");
        output.push_str(RULE_LIGHT);
        output.push_str(&format!("Original Users:        {}\n", report.original_users));
        Self::push_stage(&mut output, "Known Cheaters", &report.known_cheaters);
        if let (Some(q), Some(threshold)) = (
            report.outlier_detection.quartiles,
            report.outlier_detection.threshold,
        ) {
            output.push_str(&format!(
                "Outlier Fence:         {threshold:.p$} (Q1 {:.p$}, Q3 {:.p$}, IQR {:.p$}, x{})\n",
                q.q1,
                q.q3,
                q.iqr(),
                report.outlier_detection.multiplier
            ));
        }
        Self::push_stage(&mut output, "Spending Outliers", &report.outliers);
        output.push_str(&format!(
            "Retained Users:        {} ({:.1}%)\n",
            report.retained_users,
            pct(report.retained_users, report.original_users)
        ));
        output.push('\n');

        // Distributions
        output.push_str("Group Distribution\n");
        output.push_str(RULE_LIGHT);
        Self::push_shares(&mut output, &report.group_distribution);
        if !report.platform_distribution.is_empty() {
            output.push('\n');
            output.push_str("Platform Distribution\n");
            output.push_str(RULE_LIGHT);
            Self::push_shares(&mut output, &report.platform_distribution);
        }
        output.push('\n');

        // Metrics
        for comparison in &report.comparisons {
            output.push_str(&format!("{}\n", comparison.metric));
            output.push_str(RULE_LIGHT);
            Self::push_aggregate(&mut output, &comparison.baseline, p);
            output.push_str(&format!(
                "  {:.0}% CI:             [{:.p$}, {:.p$}]\n",
                comparison.baseline_interval.confidence_level * 100.0,
                comparison.baseline_interval.lower,
                comparison.baseline_interval.upper
            ));
            Self::push_aggregate(&mut output, &comparison.treatment, p);
            output.push_str(&format!(
                "  {:.0}% CI:             [{:.p$}, {:.p$}]\n",
                comparison.treatment_interval.confidence_level * 100.0,
                comparison.treatment_interval.lower,
                comparison.treatment_interval.upper
            ));
            match comparison.lift_pct {
                Some(lift) => output.push_str(&format!("Lift:                  {lift:+.p$}%\n")),
                None => output.push_str("Lift:                  N/A (zero baseline)\n"),
            }
            let sig = &comparison.significance;
            output.push_str(&format!(
                "t-statistic:           {:.4} (df {:.1})\n",
                sig.statistic, sig.degrees_of_freedom
            ));
            output.push_str(&format!(
                "p-value:               {:.4} {}\n",
                sig.p_value,
                if sig.is_significant {
                    "(significant)"
                } else {
                    "(not significant)"
                }
            ));

            if let Some(segments) = report
                .breakdown(comparison.metric)
                .and_then(|b| b.by_group_platform.as_ref())
            {
                output.push_str("By platform:\n");
                for segment in segments {
                    Self::push_aggregate(&mut output, segment, p);
                }
            }
            output.push('\n');
        }

        output.push_str(RULE_HEAVY);
        output.push_str(&format!("Recommendation:        {}\n", report.recommendation));
        output.push_str(&format!(
            "                       {}\n",
            report.recommendation.description()
        ));
        output.push_str(RULE_HEAVY);

        if !report.warnings.is_empty() {
            output.push('\n');
            for warning in &report.warnings {
                output.push_str(&format!("⚠️  [{}] {}\n", warning.stage, warning.message));
            }
        }

        output
    }

    fn push_stage(output: &mut String, label: &str, stage: &CleaningStage) {
        let removed = stage.users_before() - stage.users_after();
        output.push_str(&format!(
            "{:<23}{} users removed ({:.2}%)\n",
            format!("{label}:"),
            removed,
            pct(removed, stage.users_before())
        ));
    }

    fn push_shares(output: &mut String, shares: &[Share]) {
        for share in shares {
            output.push_str(&format!(
                "{:<23}{} ({:.1}%)\n",
                format!("{}:", share.label),
                share.count,
                share.pct
            ));
        }
    }

    fn push_aggregate(output: &mut String, aggregate: &GroupAggregate, p: usize) {
        let label = match aggregate.platform {
            Some(platform) => format!("  {} / {}:", aggregate.group, platform),
            None => format!("{}:", aggregate.group),
        };
        let std_dev = aggregate
            .std_dev
            .map_or_else(|| "N/A".to_string(), |sd| format!("{sd:.p$}"));
        output.push_str(&format!(
            "{label:<23}mean {:.p$}, std {std_dev}, median {:.p$}, n={}\n",
            aggregate.mean, aggregate.median, aggregate.count
        ));
    }
}

fn pct(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
