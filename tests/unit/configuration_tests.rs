use std::io::Cursor;
use std::sync::Arc;

use docvalidate::config::SourceSettings;
use docvalidate::configuration::normalize;
use docvalidate::{
    ConfigurationError, ConfigurationLoader, DocumentDeclaration, EngineContext,
    FilesystemConfigurationLoader, PluginRegistry, PoolConfig, SourceInstance, ValidatorInstance,
    ValidatorPlugin, XmlPlugin,
};

use crate::common::mocks::EnvelopePlugin;
use crate::common::test_helpers::{AsicBuilder, envelope_container};

const EXTENSION_RULES: &str = r#"
[package]
name = "Envelope extensions"

[[configuration]]
identifier = "invoice"
title = "Shadowed invoice"

[[configuration]]
identifier = "invoice-extended"
inherit = ["invoice"]

[[configuration.file]]
path = "envelope/rules/invoice.schema"

[[configuration.file]]
path = "extensions/rules/extra.schema"
"#;

fn source() -> SourceInstance {
    let containers = vec![
        ("envelope.asice".to_string(), Cursor::new(envelope_container().build())),
        (
            "extensions.asice".to_string(),
            Cursor::new(
                AsicBuilder::new()
                    .file("extensions.toml", EXTENSION_RULES)
                    .file("rules/extra.schema", "Currency\n")
                    .build(),
            ),
        ),
    ];
    SourceInstance::from_containers(&SourceSettings::default(), containers).unwrap()
}

fn registry() -> PluginRegistry {
    let plugins: Vec<Arc<dyn ValidatorPlugin>> =
        vec![Arc::new(EnvelopePlugin::new()), Arc::new(XmlPlugin)];
    PluginRegistry::register_all(&plugins)
}

#[tokio::test]
async fn test_artifacts_from_several_containers() {
    let source = source();
    let loader = FilesystemConfigurationLoader::from_filesystem(source.filesystem()).unwrap();

    assert_eq!(loader.len(), 3);
    assert_eq!(
        loader.packages(),
        vec!["Envelope rules 1.0", "Envelope extensions"]
    );

    // The first artifact in path order keeps the identifier
    let invoice = loader.load("invoice").await.unwrap();
    assert_eq!(invoice.title.as_deref(), Some("Envelope invoice"));
}

#[tokio::test]
async fn test_cross_container_inheritance_is_flattened() {
    let source = source();
    let loader = FilesystemConfigurationLoader::from_filesystem(source.filesystem()).unwrap();
    let raw = loader.load("invoice-extended").await.unwrap();

    let configuration = normalize(raw, &loader, &registry()).await.unwrap();

    let paths: Vec<_> = configuration
        .files()
        .iter()
        .map(|file| file.path.as_str())
        .collect();
    assert_eq!(
        paths,
        vec![
            "xml:well-formed",
            "envelope/rules/invoice.schema",
            "extensions/rules/extra.schema"
        ]
    );
    assert_eq!(configuration.stylesheets().len(), 1);
    assert_eq!(configuration.title(), None);
}

#[tokio::test]
async fn test_unresolvable_without_plugin() {
    let source = source();
    let loader = FilesystemConfigurationLoader::from_filesystem(source.filesystem()).unwrap();
    let raw = loader.load("invoice").await.unwrap();

    let plugins: Vec<Arc<dyn ValidatorPlugin>> = vec![Arc::new(XmlPlugin)];
    let error = normalize(raw, &loader, &PluginRegistry::register_all(&plugins))
        .await
        .unwrap_err();

    assert_eq!(
        error,
        ConfigurationError::Unresolvable {
            identifier: "invoice".to_string(),
            kind: "file",
            path: "envelope/rules/invoice.schema".to_string(),
        }
    );
}

#[tokio::test]
async fn test_racing_lookups_share_one_configuration() {
    let source = source();
    let loader = FilesystemConfigurationLoader::from_filesystem(source.filesystem()).unwrap();
    let registry = Arc::new(registry());
    let instance = Arc::new(ValidatorInstance::new(
        registry,
        Arc::new(loader),
        EngineContext::new(source.filesystem().clone(), Default::default()),
        PoolConfig::default(),
    ));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let instance = instance.clone();
            tokio::spawn(async move {
                instance
                    .configuration(&DocumentDeclaration::new("envelope", "invoice-extended"))
                    .await
            })
        })
        .collect();

    let configurations: Vec<_> = futures::future::try_join_all(tasks)
        .await
        .unwrap()
        .into_iter()
        .map(Result::unwrap)
        .collect();

    assert!(
        configurations
            .windows(2)
            .all(|pair| Arc::ptr_eq(&pair[0], &pair[1]))
    );
    assert_eq!(instance.cache_stats().await.entry_count, 1);
}
