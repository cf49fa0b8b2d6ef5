use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use docvalidate::{
    Assertion, BoxError, Checker, CheckerType, Configuration, Declaration, Document,
    EngineContext, PatternDeclaration, Presenter, RendererType, Section, Severity,
    ValidatorPlugin,
};

/// Envelope documents carry their configuration identifier in a `Tag` element
pub const ENVELOPE_PATTERN: &str = r"<Envelope>\s*<Tag>(?P<identifier>[^<]+)</Tag>";

/// Checks that the document contains every element listed in a `.schema` rule file
pub struct SchemaChecker {
    required: Vec<String>,
}

impl Checker for SchemaChecker {
    fn check(
        &mut self,
        document: &Document,
        _configuration: &Configuration,
    ) -> Result<Section, BoxError> {
        let text = document.as_text();
        let mut section = Section::titled("Schema");

        for element in &self.required {
            let (severity, message) = if text.contains(&format!("<{}>", element)) {
                (Severity::Ok, format!("{} is present", element))
            } else {
                (Severity::Error, format!("{} is missing", element))
            };
            section.add_assertion(Assertion::new(
                format!("REQUIRED-{}", element.to_uppercase()),
                severity,
                message,
            ));
        }

        Ok(section)
    }
}

/// `schema-check`: one checker per `.schema` rule file, counting creations
#[derive(Default)]
pub struct SchemaCheckerType {
    pub created: Arc<AtomicUsize>,
}

impl CheckerType for SchemaCheckerType {
    fn name(&self) -> &str {
        "schema-check"
    }

    fn extensions(&self) -> &[&str] {
        &["schema"]
    }

    fn create(&self, context: &EngineContext, path: &str) -> Result<Box<dyn Checker>, BoxError> {
        let rules = context.filesystem.read_to_string(path)?;
        self.created.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(SchemaChecker {
            required: rules
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
        }))
    }
}

/// Checker whose rule engine always fails
pub struct FailingChecker;

impl Checker for FailingChecker {
    fn check(&mut self, _: &Document, _: &Configuration) -> Result<Section, BoxError> {
        Err("rule engine crashed".into())
    }
}

pub struct FailingCheckerType;

impl CheckerType for FailingCheckerType {
    fn name(&self) -> &str {
        "failing"
    }

    fn extensions(&self) -> &[&str] {
        &["fail"]
    }

    fn create(&self, _: &EngineContext, _: &str) -> Result<Box<dyn Checker>, BoxError> {
        Ok(Box::new(FailingChecker))
    }
}

/// Checker that holds its pooled instance for a while before passing
pub struct SlowChecker;

impl Checker for SlowChecker {
    fn check(&mut self, _: &Document, _: &Configuration) -> Result<Section, BoxError> {
        std::thread::sleep(Duration::from_millis(100));
        let mut section = Section::titled("Slow");
        section.add_assertion(Assertion::new("SLOW", Severity::Ok, "checked"));
        Ok(section)
    }
}

pub struct SlowCheckerType;

impl CheckerType for SlowCheckerType {
    fn name(&self) -> &str {
        "slow"
    }

    fn extensions(&self) -> &[&str] {
        &["slow"]
    }

    fn create(&self, _: &EngineContext, _: &str) -> Result<Box<dyn Checker>, BoxError> {
        Ok(Box::new(SlowChecker))
    }
}

/// Substitutes the document into a `{{document}}` template
pub struct TemplatePresenter {
    template: String,
}

impl Presenter for TemplatePresenter {
    fn present(&mut self, document: &Document, output: &mut dyn Write) -> Result<(), BoxError> {
        let rendered = self.template.replace("{{document}}", &document.as_text());
        output.write_all(rendered.as_bytes())?;
        Ok(())
    }
}

pub struct TemplateRendererType;

impl RendererType for TemplateRendererType {
    fn name(&self) -> &str {
        "template"
    }

    fn extensions(&self) -> &[&str] {
        &["tmpl"]
    }

    fn create(&self, context: &EngineContext, path: &str) -> Result<Box<dyn Presenter>, BoxError> {
        Ok(Box::new(TemplatePresenter {
            template: context.filesystem.read_to_string(path)?,
        }))
    }
}

/// Plugin for envelope documents
#[derive(Default)]
pub struct EnvelopePlugin {
    pub created: Arc<AtomicUsize>,
}

impl EnvelopePlugin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of schema checkers created so far
    pub fn counter(&self) -> Arc<AtomicUsize> {
        self.created.clone()
    }
}

impl ValidatorPlugin for EnvelopePlugin {
    fn name(&self) -> &str {
        "envelope"
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["envelope".to_string()]
    }

    fn checkers(&self) -> Vec<Arc<dyn CheckerType>> {
        vec![
            Arc::new(SchemaCheckerType {
                created: self.created.clone(),
            }),
            Arc::new(FailingCheckerType),
            Arc::new(SlowCheckerType),
        ]
    }

    fn declarations(&self) -> Vec<Arc<dyn Declaration>> {
        match PatternDeclaration::new("envelope", ENVELOPE_PATTERN) {
            Ok(declaration) => vec![Arc::new(declaration)],
            Err(_) => Vec::new(),
        }
    }

    fn renderers(&self) -> Vec<Arc<dyn RendererType>> {
        vec![Arc::new(TemplateRendererType)]
    }
}
