//! End-to-end audits over generated data.

use fairaudit_core::config::{ConfigOverrides, ReportOverrides, WORKSPACE_CONFIG_FILE};
use fairaudit_core::loader::{DatasetSource, load_dataset};
use fairaudit_core::metrics::disparate_impact;
use fairaudit_core::report::read_json_report;
use fairaudit_core::synthetic::{self, SyntheticSpec};
use fairaudit_core::table::{
    DISPARATE_IMPACT_COLUMN, FPR_DIFFERENCE_COLUMN, MITIGATED_ROW, ORIGINAL_ROW,
};
use fairaudit_core::{
    AuditError, AuditStep, Classifier, Dataset, FairnessAudit, FairnessError, Group,
    LogisticRegression, LogisticRegressionConfig, ProtectedAttribute, ReportSink, Solver,
    TextSink, load_config, write_json_report,
};
use ndarray::{Array1, ArrayView2};
use pretty_assertions::assert_eq;

fn biased_dataset() -> fairaudit_core::Dataset {
    SyntheticSpec {
        privileged: 50,
        unprivileged: 50,
        privileged_favorable_rate: 0.8,
        unprivileged_favorable_rate: 0.4,
        noise: 0.25,
        seed: 2024,
    }
    .generate()
    .unwrap()
}

/// Group membership is the only informative feature, so outcomes are not
/// separable and an unweighted fit simply reproduces the label bias.
/// Privileged: 40 of 50 favorable. Unprivileged: 20 of 50.
fn group_driven_dataset() -> Dataset {
    let mut rows = Vec::new();
    let mut labels = Vec::new();
    let mut groups = Vec::new();
    for (group, favorable, unfavorable) in [(1.0, 40, 10), (0.0, 20, 30)] {
        for (label, count) in [(1.0, favorable), (0.0, unfavorable)] {
            for i in 0..count {
                // balanced within every cell, so it carries no signal
                let nuisance = if i % 2 == 0 { 1.0 } else { -1.0 };
                rows.push(vec![group, nuisance]);
                labels.push(label);
                groups.push(group);
            }
        }
    }
    Dataset::from_rows(
        vec![synthetic::GROUP_ATTRIBUTE.into(), "nuisance".into()],
        rows,
        labels,
        vec![ProtectedAttribute::new(synthetic::GROUP_ATTRIBUTE, groups)],
        1.0,
        0.0,
    )
    .unwrap()
}

/// Logistic regression that drops whatever instance weights it is offered.
struct IgnoresWeights(LogisticRegression);

impl Classifier for IgnoresWeights {
    fn fit(
        &mut self,
        features: ArrayView2<'_, f64>,
        labels: &[f64],
        _weights: Option<&[f64]>,
    ) -> Result<(), FairnessError> {
        self.0.fit(features, labels, None)
    }

    fn predict_proba(&self, features: ArrayView2<'_, f64>) -> Result<Array1<f64>, FairnessError> {
        self.0.predict_proba(features)
    }

    fn predict(&self, features: ArrayView2<'_, f64>) -> Result<Array1<f64>, FairnessError> {
        self.0.predict(features)
    }

    fn supports_sample_weight(&self) -> bool {
        false
    }
}

#[test]
fn reweighing_and_refit_bring_disparate_impact_into_band() {
    let dataset = group_driven_dataset();
    let partition = SyntheticSpec::partition().unwrap();
    assert!((disparate_impact(&dataset, &partition).unwrap() - 0.5).abs() < 1e-12);

    let classifier = LogisticRegression::new(LogisticRegressionConfig::default(), 42);
    let report = FairnessAudit::new(partition, classifier)
        .with_seed(42)
        .run(&dataset)
        .unwrap();

    let original = report.table.value(ORIGINAL_ROW, DISPARATE_IMPACT_COLUMN).unwrap();
    let mitigated = report.table.value(MITIGATED_ROW, DISPARATE_IMPACT_COLUMN).unwrap();
    let fpr = report.table.value(MITIGATED_ROW, FPR_DIFFERENCE_COLUMN).unwrap();

    assert!((original - 0.5).abs() < 1e-12);
    assert!((0.8..=1.2).contains(&mitigated), "mitigated DI {mitigated}");
    assert!(fpr.is_finite());
    assert!(fpr.abs() <= (1.0 - original).abs(), "FPR difference {fpr}");
    assert_eq!(report.seed, Some(42));
    assert_eq!(report.dataset.num_records, 100);
}

#[test]
fn ignoring_the_weights_leaves_the_bias_in_place() {
    let dataset = group_driven_dataset();
    let report = FairnessAudit::new(
        SyntheticSpec::partition().unwrap(),
        IgnoresWeights(LogisticRegression::new(LogisticRegressionConfig::default(), 42)),
    )
    .run(&dataset)
    .unwrap();

    // the unweighted model favors exactly the privileged group
    let mitigated = report.mitigated.disparate_impact;
    assert!(!(0.8..=1.2).contains(&mitigated), "mitigated DI {mitigated}");
    assert!(mitigated.abs() < 1e-12);
    assert!((report.mitigated.false_positive_rate_difference + 1.0).abs() < 1e-12);
}

#[test]
fn sgd_solver_also_mitigates() {
    let dataset = biased_dataset();
    let config = LogisticRegressionConfig {
        solver: Solver::Sgd,
        max_iter: 200,
        ..Default::default()
    };
    let report = FairnessAudit::new(
        SyntheticSpec::partition().unwrap(),
        LogisticRegression::new(config, 5),
    )
    .run(&dataset)
    .unwrap();
    let mitigated = report.mitigated.disparate_impact;
    assert!((0.8..=1.2).contains(&mitigated), "mitigated DI {mitigated}");
}

#[test]
fn same_seed_gives_same_table() {
    let dataset = biased_dataset();
    let run = |seed| {
        let config = LogisticRegressionConfig {
            solver: Solver::Sgd,
            ..Default::default()
        };
        FairnessAudit::new(
            SyntheticSpec::partition().unwrap(),
            LogisticRegression::new(config, seed),
        )
        .run(&dataset)
        .unwrap()
    };
    let a = run(9);
    let b = run(9);
    assert_eq!(a.table, b.table);
    assert_ne!(a.run_id, b.run_id);
}

#[test]
fn table_has_fixed_rows_and_columns() {
    let report = FairnessAudit::new(
        SyntheticSpec::partition().unwrap(),
        LogisticRegression::new(LogisticRegressionConfig::default(), 1),
    )
    .run(&biased_dataset())
    .unwrap();
    assert_eq!(report.table.row_labels(), vec!["Original", "After Mitigation"]);
    assert_eq!(report.table.columns(), vec!["Disparate Impact", "FPR Difference"]);
    assert_eq!(report.table.value(ORIGINAL_ROW, FPR_DIFFERENCE_COLUMN), Some(0.0));
}

#[test]
fn empty_unprivileged_group_fails_at_first_step() {
    let dataset = SyntheticSpec {
        unprivileged: 0,
        ..Default::default()
    }
    .generate()
    .unwrap();
    let partition = SyntheticSpec::partition().unwrap();

    assert!(matches!(
        disparate_impact(&dataset, &partition),
        Err(FairnessError::EmptyGroup {
            group: Group::Unprivileged,
            ..
        })
    ));

    let err = FairnessAudit::new(
        partition,
        LogisticRegression::new(LogisticRegressionConfig::default(), 1),
    )
    .run(&dataset)
    .unwrap_err();
    assert_eq!(err.step(), Some(AuditStep::MeasureOriginal));
    assert!(matches!(
        err,
        AuditError::Step {
            source: FairnessError::EmptyGroup { .. },
            ..
        }
    ));
}

#[test]
fn no_privileged_favorable_records_is_division_by_zero() {
    let dataset = SyntheticSpec {
        privileged_favorable_rate: 0.0,
        ..Default::default()
    }
    .generate()
    .unwrap();
    let err = FairnessAudit::new(
        SyntheticSpec::partition().unwrap(),
        LogisticRegression::new(LogisticRegressionConfig::default(), 1),
    )
    .run(&dataset)
    .unwrap_err();
    assert_eq!(err.step(), Some(AuditStep::MeasureOriginal));
    assert!(matches!(
        err,
        AuditError::Step {
            source: FairnessError::DivisionByZero { .. },
            ..
        }
    ));
}

#[test]
fn single_class_labels_pass_reweighing_and_fail_at_fit_step() {
    // every record favorable: reweighing is a no-op, the classifier sees one class
    let dataset = SyntheticSpec {
        privileged_favorable_rate: 1.0,
        unprivileged_favorable_rate: 1.0,
        ..Default::default()
    }
    .generate()
    .unwrap();
    let err = FairnessAudit::new(
        SyntheticSpec::partition().unwrap(),
        LogisticRegression::new(LogisticRegressionConfig::default(), 1),
    )
    .run(&dataset)
    .unwrap_err();
    assert_eq!(err.step(), Some(AuditStep::Fit));
    assert!(matches!(
        err,
        AuditError::Step {
            source: FairnessError::FitFailure(_),
            ..
        }
    ));
}

#[test]
fn configured_csv_pipeline_writes_reports() {
    let dir = tempfile::tempdir().unwrap();
    let data_path = dir.path().join("biased.csv");
    synthetic::write_csv(&biased_dataset(), &data_path).unwrap();

    std::fs::write(
        dir.path().join(WORKSPACE_CONFIG_FILE),
        format!(
            r#"
[dataset]
type = "csv"
path = "{}"
label_column = "label"
favorable_label = 1.0
unfavorable_label = 0.0
protected_attributes = ["group"]

[partition]
attribute = "group"
privileged = 1.0
unprivileged = 0.0
"#,
            data_path.display().to_string().replace('\\', "/")
        ),
    )
    .unwrap();

    let json_path = dir.path().join("out").join("report.json");
    let overrides = ConfigOverrides {
        seed: Some(3),
        report: ReportOverrides {
            chart: Some(false),
            json_path: Some(json_path.clone()),
            ..Default::default()
        },
        ..Default::default()
    };
    let config = load_config(Some(dir.path()), None, Some(&overrides)).unwrap();
    let partition = config.validate().unwrap();
    assert!(matches!(config.dataset, DatasetSource::Csv(_)));
    assert!(!config.report.chart);

    let dataset = load_dataset(&config.dataset).unwrap();
    let seed = config.require_seed().unwrap();
    let report = FairnessAudit::new(
        partition,
        LogisticRegression::new(config.classifier.clone(), seed),
    )
    .with_seed(seed)
    .run(&dataset)
    .unwrap();

    let mut sink = TextSink::new(Vec::new());
    sink.render(&report.table).unwrap();
    let text = String::from_utf8(sink.into_inner()).unwrap();
    assert!(text.contains("Original"));
    assert!(text.contains("After Mitigation"));

    write_json_report(&report, config.report.json_path.as_deref().unwrap()).unwrap();
    let restored = read_json_report(&json_path).unwrap();
    assert_eq!(restored.run_id, report.run_id);
    assert_eq!(restored.dataset.fingerprint, dataset.fingerprint());
}
