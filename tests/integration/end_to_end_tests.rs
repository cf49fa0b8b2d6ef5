use std::sync::atomic::Ordering;

use tempfile::TempDir;

use docvalidate::{
    Config, Document, FileDiscovery, Resolution, Severity, ValidationOutcome, ValidationStatus,
    Validator, ValidatorError,
};

use crate::common::mocks::EnvelopePlugin;
use crate::common::test_helpers::{AsicBuilder, envelope, envelope_container};

/// Validator over a rule directory holding the envelope container
async fn envelope_validator(config: Config) -> (Validator, EnvelopePlugin, TempDir) {
    let rules = TempDir::new().unwrap();
    envelope_container().write_to(rules.path(), "envelope.asice");

    let mut config = config;
    config.source.directory = Some(rules.path().to_path_buf());

    let plugin = EnvelopePlugin::new();
    let counter = plugin.counter();
    let validator = Validator::builder()
        .plugin(EnvelopePlugin { created: counter })
        .with_default_plugins()
        .config(config)
        .build()
        .await
        .unwrap();

    (validator, plugin, rules)
}

#[tokio::test]
async fn test_envelope_document_passes_every_check() {
    let (validator, plugin, _rules) = envelope_validator(Config::default()).await;
    let document = Document::from(envelope(Some("invoice"), "<Amount>10</Amount>"));

    let outcome = validator.validate(&document).await.unwrap();
    let ValidationOutcome::Report(report) = outcome else {
        panic!("envelope should be recognized");
    };

    assert_eq!(report.declaration.kind, "envelope");
    assert_eq!(report.declaration.identifier, "invoice");
    assert_eq!(report.count(Severity::Error), 0);
    assert_eq!(report.count(Severity::Fatal), 0);
    assert!(report.is_valid());

    let titles: Vec<_> = report
        .sections
        .iter()
        .map(|section| section.title.as_deref().unwrap_or_default())
        .collect();
    assert_eq!(titles, vec!["Well-formedness", "Schema"]);
    assert_eq!(plugin.created.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_missing_element_is_reported() {
    let (validator, _plugin, _rules) = envelope_validator(Config::default()).await;
    let document = Document::from(envelope(Some("invoice"), ""));

    let outcome = validator.validate(&document).await.unwrap();
    let report = outcome.report().unwrap();

    assert!(!report.is_valid());
    let failed: Vec<_> = report
        .sections
        .iter()
        .flat_map(|section| section.all_assertions())
        .filter(|assertion| assertion.severity == Severity::Error)
        .map(|assertion| assertion.identifier.as_str())
        .collect();
    assert_eq!(failed, vec!["REQUIRED-AMOUNT"]);
}

#[tokio::test]
async fn test_envelope_without_tag_is_not_an_envelope() {
    let (validator, _plugin, _rules) = envelope_validator(Config::default()).await;
    let document = Document::from(envelope(None, "<Amount>10</Amount>"));

    // Only the generic XML declaration matches, and no rules exist for it
    let declaration = validator.instance().resolve(&document);
    assert_eq!(declaration.declaration().unwrap().kind, "xml");
    assert!(matches!(
        validator.validate(&document).await,
        Err(ValidatorError::Configuration(_))
    ));

    let rules = TempDir::new().unwrap();
    envelope_container().write_to(rules.path(), "envelope.asice");
    let mut config = Config::default();
    config.source.directory = Some(rules.path().to_path_buf());
    let envelope_only = Validator::builder()
        .plugin(EnvelopePlugin::new())
        .config(config)
        .build()
        .await
        .unwrap();

    assert_eq!(envelope_only.instance().resolve(&document), Resolution::Unrecognized);
    assert!(!envelope_only.validate(&document).await.unwrap().is_recognized());
}

#[tokio::test]
async fn test_render_through_container_stylesheet() {
    let (validator, _plugin, _rules) = envelope_validator(Config::default()).await;
    let document = Document::from(envelope(Some("invoice"), "<Amount>1</Amount>"));

    let mut html = Vec::new();
    validator.render(&document, Some("html"), &mut html).await.unwrap();

    assert_eq!(
        String::from_utf8(html).unwrap(),
        format!("<html>{}</html>", document.as_text())
    );
    assert_eq!(
        validator
            .instance()
            .presenter_pool()
            .stats("envelope/views/invoice.tmpl")
            .idle,
        1
    );
}

#[tokio::test]
async fn test_exhausted_pool_fails_without_waiting() {
    let mut config = Config::default();
    config.pool.max_per_key = 1;
    let (validator, _plugin, _rules) = envelope_validator(config).await;
    let document = Document::from(envelope(Some("invoice"), "<Amount>1</Amount>"));

    // Warm up the configuration and hold the only schema checker
    validator.validate(&document).await.unwrap();
    let held = validator
        .instance()
        .checker_pool()
        .borrow("envelope/rules/invoice.schema")
        .unwrap();

    let error = validator.validate(&document).await.unwrap_err();
    assert!(error.is_transient());

    drop(held);
    assert!(validator.validate(&document).await.is_ok());
}

#[tokio::test]
async fn test_failing_checker_reports_and_releases() {
    let rules = TempDir::new().unwrap();
    AsicBuilder::new()
        .file(
            "rules.toml",
            r#"
[[configuration]]
identifier = "order"

[[configuration.file]]
path = "crashing/rules/order.fail"
"#,
        )
        .write_to(rules.path(), "crashing.asice");

    let mut config = Config::default();
    config.source.directory = Some(rules.path().to_path_buf());
    config.pool.max_per_key = 1;
    let validator = Validator::builder()
        .plugin(EnvelopePlugin::new())
        .config(config)
        .build()
        .await
        .unwrap();

    let document = Document::from(envelope(Some("order"), ""));
    for _ in 0..2 {
        let error = validator.validate(&document).await.unwrap_err();
        assert!(matches!(error, ValidatorError::Checker { key, .. } if key == "crashing/rules/order.fail"));
    }
    assert_eq!(
        validator
            .instance()
            .checker_pool()
            .stats("crashing/rules/order.fail")
            .active,
        0
    );
}

#[tokio::test]
async fn test_batch_validation_of_a_directory() {
    let (validator, _plugin, _rules) = envelope_validator(Config::default()).await;
    let documents = TempDir::new().unwrap();
    let write = |name: &str, content: String| {
        std::fs::write(documents.path().join(name), content).unwrap();
    };
    write("1.xml", envelope(Some("invoice"), "<Amount>5</Amount>"));
    write("2.xml", envelope(Some("invoice"), ""));
    write("3.xml", "just text".to_string());
    write("4.txt", envelope(Some("invoice"), "<Amount>5</Amount>"));

    let results = validator
        .validate_path(documents.path(), &FileDiscovery::new())
        .await
        .unwrap();

    assert_eq!(results.total_files, 3);
    assert_eq!(results.valid_files, 1);
    assert_eq!(results.invalid_files, 1);
    assert_eq!(results.skipped_files, 1);
    assert_eq!(
        results.file_results[1].status,
        ValidationStatus::Invalid { error_count: 1 }
    );
    assert_eq!(results.declarations_used, vec!["invoice"]);
    assert_eq!(results.performance_metrics.configuration_cache.entry_count, 1);
}

#[tokio::test]
async fn test_packages_include_container_rules() {
    let (validator, _plugin, _rules) = envelope_validator(Config::default()).await;
    assert_eq!(
        validator.packages(),
        vec!["envelope", "sbdh", "xml", "Envelope rules 1.0"]
    );
    assert_eq!(validator.source().certificates().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_batch_wider_than_pool_stays_within_capacity() {
    let rules = TempDir::new().unwrap();
    AsicBuilder::new()
        .file(
            "rules.toml",
            r#"
[[configuration]]
identifier = "batch"

[[configuration.file]]
path = "slow/rules/batch.slow"
"#,
        )
        .write_to(rules.path(), "slow.asice");

    let mut config = Config::default();
    config.source.directory = Some(rules.path().to_path_buf());
    config.pool.max_per_key = 1;
    config.validation.threads = Some(4);
    let validator = Validator::builder()
        .plugin(EnvelopePlugin::new())
        .config(config)
        .build()
        .await
        .unwrap();
    assert_eq!(validator.batch_concurrency(), 1);

    let documents = TempDir::new().unwrap();
    for index in 0..4 {
        std::fs::write(
            documents.path().join(format!("{}.xml", index)),
            envelope(Some("batch"), ""),
        )
        .unwrap();
    }

    let results = validator
        .validate_path(documents.path(), &FileDiscovery::new())
        .await
        .unwrap();

    assert_eq!(results.total_files, 4);
    for result in &results.file_results {
        assert_eq!(result.status, ValidationStatus::Valid, "{:?}", result.path);
    }
    assert_eq!(results.performance_metrics.concurrent_validations, 1);
    assert_eq!(
        validator
            .instance()
            .checker_pool()
            .stats("slow/rules/batch.slow")
            .idle,
        1
    );
}
