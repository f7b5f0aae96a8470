use abtest_analysis::{
    AnalysisError, ExperimentAnalysis, Metric, Recommendation, ReportExporter, ReportFormat,
    ReportFormatter,
};
use abtest_core::{AnalysisConfig, Level, MemorySink, TracingSink};
use abtest_data::{
    CheaterFlag, ExperimentData, Group, GroupAssignment, Platform, PlatformRecord, RawTable,
    Transaction, UserId,
};

fn assign(id: u64, group: &str) -> GroupAssignment {
    GroupAssignment {
        user_id: UserId(id),
        group: Group::new(group),
    }
}

/// Control revenue [0, 0, 5, 10], test revenue [0, 5, 10, 15] once user 9
/// (flagged cheater) and user 10 (currency whale) are removed.
fn scenario() -> ExperimentData {
    let mut assignments: Vec<_> = (1..=4).map(|id| assign(id, "control")).collect();
    assignments.extend((5..=8).map(|id| assign(id, "test")));
    assignments.push(assign(9, "test"));
    assignments.push(assign(10, "control"));

    let money = vec![
        Transaction::real_money(3, 5.0),
        Transaction::real_money(4, 4.0),
        Transaction::real_money(4, 6.0),
        Transaction::real_money(6, 5.0),
        Transaction::real_money(7, 10.0),
        Transaction::real_money(8, 15.0),
        Transaction::real_money(9, 900.0),
        Transaction::real_money(10, 50.0),
    ];

    let mut cash: Vec<_> = (1..=8)
        .map(|id| Transaction::virtual_currency(id, 90.0 + 10.0 * id as f64))
        .collect();
    cash.push(Transaction::virtual_currency(9, 50.0));
    cash.push(Transaction::virtual_currency(10, 10_000.0));

    let platforms = vec![
        PlatformRecord {
            user_id: UserId(1),
            platform: Platform::Pc,
        },
        PlatformRecord {
            user_id: UserId(3),
            platform: Platform::Pc,
        },
        PlatformRecord {
            user_id: UserId(5),
            platform: Platform::PlayStation,
        },
        PlatformRecord {
            user_id: UserId(8),
            platform: Platform::PlayStation,
        },
        PlatformRecord {
            user_id: UserId(10),
            platform: Platform::Pc,
        },
    ];

    let cheaters = vec![
        CheaterFlag {
            user_id: UserId(9),
            is_cheater: true,
        },
        CheaterFlag {
            user_id: UserId(2),
            is_cheater: false,
        },
    ];

    ExperimentData {
        assignments,
        money,
        cash,
        platforms,
        cheaters,
        extra: Vec::new(),
    }
}

fn run(data: &ExperimentData) -> Result<abtest_analysis::AnalysisReport, AnalysisError> {
    ExperimentAnalysis::new(AnalysisConfig::default()).run(data, &TracingSink)
}

// ============================================
// End-to-end
// ============================================

#[test]
fn end_to_end_arpu_matches_exactly() {
    let report = run(&scenario()).unwrap();
    let arpu = report.comparison(Metric::Arpu).unwrap();

    assert_eq!(arpu.baseline.group, Group::control());
    assert_eq!(arpu.baseline.mean, 3.75);
    assert_eq!(arpu.treatment.mean, 7.5);
    assert_eq!(arpu.lift_pct, Some(100.0));
    assert!(!arpu.significance.is_significant);
}

#[test]
fn cleaning_removes_cheater_then_whale() {
    let report = run(&scenario()).unwrap();

    assert_eq!(report.original_users, 10);
    assert_eq!(report.known_cheaters.users_after(), 9);
    assert_eq!(report.outlier_detection.outlier_ids, vec![UserId(10)]);
    assert_eq!(report.outlier_detection.threshold, Some(280.0));
    assert_eq!(report.retained_users, 8);

    // monotone across stages
    assert!(report.retained_users <= report.known_cheaters.users_after());
    assert!(report.known_cheaters.users_after() <= report.original_users);

    assert!(report.cleaned.money.iter().all(|tx| tx.user_id != UserId(9)));
    assert!(report.cleaned.platforms.iter().all(|p| p.user_id != UserId(10)));
}

#[test]
fn arppu_covers_only_payers() {
    let report = run(&scenario()).unwrap();
    let arppu = report.comparison(Metric::Arppu).unwrap();
    let arpu = report.comparison(Metric::Arpu).unwrap();

    assert_eq!(arppu.baseline.count, 2);
    assert_eq!(arppu.treatment.count, 3);
    assert_eq!(arppu.baseline.mean, 7.5);
    assert!(arppu.baseline.count <= arpu.baseline.count);
    assert!(arppu.treatment.count <= arpu.treatment.count);
}

#[test]
fn spend_difference_is_significant_and_drives_recommendation() {
    let report = run(&scenario()).unwrap();
    let spend = report.comparison(Metric::CurrencySpend).unwrap();

    assert_eq!(spend.baseline.mean, 115.0);
    assert_eq!(spend.treatment.mean, 155.0);
    assert!(
        spend.significance.is_significant,
        "p = {}",
        spend.significance.p_value
    );

    // one significant metric, three positive lifts
    assert_eq!(
        report.recommendation,
        Recommendation::ImplementWithModifications
    );
    assert!(report.warnings.is_empty());
}

#[test]
fn intervals_contain_group_means() {
    let report = run(&scenario()).unwrap();
    for comparison in &report.comparisons {
        assert!(comparison
            .baseline_interval
            .contains(comparison.baseline.mean));
        assert!(comparison
            .treatment_interval
            .contains(comparison.treatment.mean));
    }
}

#[test]
fn input_is_left_untouched() {
    let data = scenario();
    let _ = run(&data).unwrap();
    assert_eq!(data.assignments.len(), 10);
    assert_eq!(data.cash.len(), 10);
}

// ============================================
// Platform segmentation
// ============================================

#[test]
fn platform_breakdown_follows_config() {
    let report = run(&scenario()).unwrap();
    let arpu = report.breakdown(Metric::Arpu).unwrap();

    let control_pc = arpu.segment(&Group::control(), Platform::Pc).unwrap();
    assert_eq!(control_pc.count, 2);
    assert_eq!(control_pc.mean, 2.5);
    assert!(arpu.segment(&Group::control(), Platform::Xbox).is_none());

    let config = AnalysisConfig {
        segment_by_platform: false,
        ..AnalysisConfig::default()
    };
    let report = ExperimentAnalysis::new(config)
        .run(&scenario(), &TracingSink)
        .unwrap();
    assert!(report
        .breakdowns
        .iter()
        .all(|b| b.by_group_platform.is_none()));
}

// ============================================
// Warnings and failures
// ============================================

#[test]
fn extra_group_is_reported_not_fatal() {
    let mut data = scenario();
    data.assignments.push(assign(11, "holdout"));
    data.assignments.push(assign(12, "holdout"));

    let sink = MemorySink::new();
    let report = ExperimentAnalysis::new(AnalysisConfig::default())
        .run(&data, &sink)
        .unwrap();

    assert_eq!(report.pair.ignored, vec![Group::new("holdout")]);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].message.contains("holdout"));
    assert!(sink
        .events()
        .iter()
        .any(|e| e.level == Level::Warn && e.stage == "statistics"));
}

#[test]
fn unkeyed_extra_table_passes_through_with_warning() {
    let mut data = scenario();
    data.extra.push(RawTable::new(
        "item_catalog",
        vec!["item".to_string(), "price".to_string()],
        vec![vec!["sword".to_string(), "10".to_string()]],
    ));

    let report = run(&data).unwrap();
    assert_eq!(report.cleaned.extra[0].rows.len(), 1);
    assert_eq!(report.known_cheaters.passthrough, vec!["item_catalog"]);
    assert_eq!(report.warnings.len(), 2);
}

#[test]
fn single_user_group_is_insufficient_sample() {
    let data = ExperimentData {
        assignments: vec![assign(1, "control"), assign(2, "test"), assign(3, "test")],
        money: vec![Transaction::real_money(2, 5.0)],
        ..Default::default()
    };

    let err = run(&data).unwrap_err();
    assert!(err.is_insufficient_sample(), "unexpected error: {err}");
}

#[test]
fn one_group_cannot_be_compared() {
    let data = ExperimentData {
        assignments: vec![assign(1, "control"), assign(2, "control")],
        ..Default::default()
    };
    assert!(matches!(run(&data), Err(AnalysisError::TooFewGroups(1))));
}

#[test]
fn duplicate_assignment_fails_fast() {
    let mut data = scenario();
    data.assignments.push(assign(3, "test"));
    assert!(matches!(run(&data), Err(AnalysisError::Dataset(_))));
}

#[test]
fn invalid_settings_are_rejected() {
    let config = AnalysisConfig {
        confidence_level: 1.5,
        ..AnalysisConfig::default()
    };
    let err = ExperimentAnalysis::new(config)
        .run(&scenario(), &TracingSink)
        .unwrap_err();
    assert!(matches!(err, AnalysisError::Config(_)));
}

// ============================================
// Output
// ============================================

#[test]
fn text_report_is_rounded_and_complete() {
    let report = run(&scenario()).unwrap();
    let text = ReportFormatter::to_text(&report);

    assert!(text.contains("A/B TEST ANALYSIS RESULTS"));
    assert!(text.contains("IMPLEMENT WITH MODIFICATIONS"));
    assert!(text.contains("mean 3.75"));
    assert!(text.contains("Currency Spend"));
}

#[test]
fn exports_all_formats() {
    let report = run(&scenario()).unwrap();
    let dir = tempfile::tempdir().unwrap();

    let written = ReportExporter::export(
        &report,
        dir.path(),
        &[ReportFormat::Text, ReportFormat::Json, ReportFormat::Csv],
    )
    .unwrap();
    assert_eq!(written.len(), 3);

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&written[1]).unwrap()).unwrap();
    assert_eq!(json["recommendation"], "implement_with_modifications");
    assert_eq!(json["retained_users"], 8);

    let csv = std::fs::read_to_string(&written[2]).unwrap();
    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("metric,group,platform,count,mean,std_dev,median")
    );
    assert!(csv.contains("ARPU,control,,4,3.75,"));
    assert!(csv.contains("ARPU,control,PC,2,2.5,"));
}
