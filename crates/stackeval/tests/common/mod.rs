//! Shared fixtures: an on-disk source bundle and fakes for every external
//! collaborator.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};

use stackeval::{
    ComponentAddr, ComponentConfig, ComponentDeclaration, EvalContext, EvalOptions, EvalPhase,
    EvalSession, ExpressionEvaluator, ExpressionScope, Expression, InputsType, LanguageRuntime,
    LanguageRuntimeFactory, ProviderClient, ProviderClients, ProviderError, ProviderSchema,
    ProviderType, ProviderTypeRegistry, Reference, Referenceable, RepetitionData, RuntimeError,
    RuntimeOptions, StackConfig, Value,
};
use stackeval_config::{Module, ModuleParser, ModuleTree, SourceBundle, YamlModuleParser};
use stackeval_foundation::{
    Diagnostic, Diagnostics, LocalProviderConfig, ModuleSource, ProviderAddr, SourceRange,
};

pub const APP_SOURCE: &str = "git::https://example.com/app.git";

const MANIFEST: &str = r#"{
  "packages": [
    { "source": "git::https://example.com/app.git", "local": "app" }
  ]
}"#;

/// Root module requiring one default `aws` configuration.
pub const AWS_MODULE: &str = r#"
variables:
  name:
    type: string
  size:
    type: number
    default: 2
required_providers:
  aws:
    source: hashicorp/aws
resources:
  - type: aws_instance
    name: web
"#;

/// A source bundle in a temporary directory holding one package.
pub struct TestBundle {
    dir: tempfile::TempDir,
}

impl TestBundle {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bundle-manifest.json"), MANIFEST).unwrap();
        Self { dir }
    }

    /// Writes `module.yaml` for the module at `rel` within the package.
    pub fn write_module(&self, rel: &str, content: &str) {
        let dir = self.dir.path().join("app").join(rel);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("module.yaml"), content).unwrap();
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn open(&self) -> Arc<SourceBundle> {
        Arc::new(SourceBundle::open(self.dir.path()).unwrap())
    }
}

/// Module parser that counts directory loads.
#[derive(Default)]
pub struct CountingParser {
    inner: YamlModuleParser,
    pub loads: AtomicUsize,
}

impl ModuleParser for CountingParser {
    fn is_module_dir(&self, dir: &Path) -> bool {
        self.inner.is_module_dir(dir)
    }

    fn load_module_dir(&self, dir: &Path) -> (Option<Module>, Diagnostics) {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load_module_dir(dir)
    }
}

#[derive(Default)]
pub struct FakeProvider {
    pub fail_schema: bool,
    pub fail_client: bool,
    pub schema_calls: AtomicUsize,
    pub opened: AtomicUsize,
    pub closed: Arc<AtomicUsize>,
}

impl FakeProvider {
    pub fn failing_schema() -> Self {
        Self {
            fail_schema: true,
            ..Self::default()
        }
    }

    pub fn failing_client() -> Self {
        Self {
            fail_client: true,
            ..Self::default()
        }
    }
}

struct FakeClient {
    closed: Arc<AtomicUsize>,
}

impl ProviderClient for FakeClient {
    fn close(&mut self) -> Result<(), ProviderError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl ProviderType for FakeProvider {
    fn schema(&self) -> Result<ProviderSchema, ProviderError> {
        self.schema_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_schema {
            return Err(ProviderError::Schema("plugin exited unexpectedly".to_string()));
        }
        Ok(ProviderSchema::default())
    }

    fn unconfigured_client(&self) -> Result<Box<dyn ProviderClient>, ProviderError> {
        if self.fail_client {
            return Err(ProviderError::Startup("plugin not executable".to_string()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeClient {
            closed: Arc::clone(&self.closed),
        }))
    }
}

#[derive(Default)]
pub struct FakeProviders {
    types: HashMap<ProviderAddr, Arc<FakeProvider>>,
}

impl FakeProviders {
    pub fn with(mut self, addr: &str, provider: FakeProvider) -> Self {
        self.types.insert(ProviderAddr::parse(addr).unwrap(), Arc::new(provider));
        self
    }

    pub fn get(&self, addr: &str) -> &FakeProvider {
        &self.types[&ProviderAddr::parse(addr).unwrap()]
    }
}

impl ProviderTypeRegistry for FakeProviders {
    fn provider_type(&self, addr: &ProviderAddr) -> Option<Arc<dyn ProviderType>> {
        self.types
            .get(addr)
            .map(|p| Arc::clone(p) as Arc<dyn ProviderType>)
    }
}

#[derive(Default)]
pub struct RuntimeState {
    pub fail: bool,
    pub diags: Diagnostics,
    pub instantiated: AtomicUsize,
    pub validations: AtomicUsize,
    pub clients_seen: Mutex<Vec<usize>>,
    /// Root slots the runtime found no started client for
    pub missing_clients: Mutex<Vec<String>>,
    pub provisioners_seen: Mutex<Vec<String>>,
}

pub struct FakeRuntimeFactory(pub Arc<RuntimeState>);

struct FakeRuntime(Arc<RuntimeState>);

impl LanguageRuntimeFactory for FakeRuntimeFactory {
    fn instantiate(&self, opts: RuntimeOptions) -> Result<Box<dyn LanguageRuntime>, RuntimeError> {
        self.0.instantiated.fetch_add(1, Ordering::SeqCst);
        if self.0.fail {
            return Err(RuntimeError::InvalidOptions("schemas are inconsistent".to_string()));
        }
        *self.0.provisioners_seen.lock().unwrap() = opts.provisioners;
        Ok(Box::new(FakeRuntime(Arc::clone(&self.0))))
    }
}

impl LanguageRuntime for FakeRuntime {
    fn validate(&self, tree: &ModuleTree, providers: &ProviderClients) -> Diagnostics {
        self.0.validations.fetch_add(1, Ordering::SeqCst);
        self.0.clients_seen.lock().unwrap().push(providers.len());
        let mut missing = self.0.missing_clients.lock().unwrap();
        for slot in tree.effective_required_provider_configs() {
            if providers.get(&slot).is_none() {
                missing.push(slot.to_string());
            }
        }
        self.0.diags.clone()
    }
}

/// Expression evaluator returning canned diagnostics.
#[derive(Default)]
pub struct FakeEvaluator {
    pub diags: Diagnostics,
    /// Re-enter the component's own input check while evaluating
    pub reentrant: bool,
    pub calls: AtomicUsize,
    pub phases: Mutex<Vec<EvalPhase>>,
    component: OnceLock<Weak<ComponentConfig>>,
}

impl FakeEvaluator {
    pub fn failing(summary: &str) -> Self {
        Self {
            diags: Diagnostic::error(summary, "The given value is not suitable.").into(),
            ..Self::default()
        }
    }

    pub fn reentrant() -> Self {
        Self {
            reentrant: true,
            ..Self::default()
        }
    }
}

impl ExpressionEvaluator for FakeEvaluator {
    fn evaluate_input_variables(
        &self,
        ctx: &EvalContext,
        _inputs: &InputsType,
        _decl: &ComponentDeclaration,
        phase: EvalPhase,
        _scope: &dyn ExpressionScope,
    ) -> (Value, Diagnostics) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.phases.lock().unwrap().push(phase);
        let mut diags = self.diags.clone();
        if self.reentrant {
            if let Some(component) = self.component.get().and_then(Weak::upgrade) {
                diags.append(component.check_input_variable_values(ctx, phase));
            }
        }
        (Value::Known(serde_json::json!({})), diags)
    }
}

#[derive(Default)]
pub struct FakeStack {
    providers: HashMap<ProviderAddr, String>,
    pub repetitions: Mutex<Vec<RepetitionData>>,
}

impl FakeStack {
    pub fn with_provider(mut self, addr: &str, local_name: &str) -> Self {
        self.providers
            .insert(ProviderAddr::parse(addr).unwrap(), local_name.to_string());
        self
    }
}

impl StackConfig for FakeStack {
    fn provider_local_name(&self, provider: &ProviderAddr) -> Option<String> {
        self.providers.get(provider).cloned()
    }

    fn resolve_expression_reference(
        &self,
        _ctx: &EvalContext,
        _reference: &Reference,
        repetition: &RepetitionData,
    ) -> (Option<Arc<dyn Referenceable>>, Diagnostics) {
        self.repetitions.lock().unwrap().push(repetition.clone());
        (None, Diagnostics::new())
    }
}

/// Everything needed to evaluate one component.
pub struct Fixture {
    pub bundle: TestBundle,
    pub parser: Arc<CountingParser>,
    pub stack: Arc<FakeStack>,
    pub providers: Arc<FakeProviders>,
    pub runtime: Arc<RuntimeState>,
    pub evaluator: Arc<FakeEvaluator>,
    pub options: EvalOptions,
}

impl Fixture {
    /// A fixture whose root module is `root_module`, with `aws` declared
    /// by the stack and installed in the registry.
    pub fn new(root_module: &str) -> Self {
        let bundle = TestBundle::new();
        bundle.write_module("", root_module);
        Self {
            bundle,
            parser: Arc::new(CountingParser::default()),
            stack: Arc::new(FakeStack::default().with_provider("hashicorp/aws", "aws")),
            providers: Arc::new(FakeProviders::default().with("hashicorp/aws", FakeProvider::default())),
            runtime: Arc::new(RuntimeState::default()),
            evaluator: Arc::new(FakeEvaluator::default()),
            options: EvalOptions::default(),
        }
    }

    pub fn build(&self, decl: ComponentDeclaration) -> Arc<ComponentConfig> {
        let session = EvalSession::new(
            self.bundle.open(),
            self.options.clone(),
            Arc::clone(&self.providers) as Arc<dyn ProviderTypeRegistry>,
            Arc::new(FakeRuntimeFactory(Arc::clone(&self.runtime))),
            Arc::clone(&self.evaluator) as Arc<dyn ExpressionEvaluator>,
        )
        .with_parser(Arc::clone(&self.parser) as Arc<dyn ModuleParser>);

        let component = Arc::new(ComponentConfig::new(
            Arc::new(session),
            Arc::clone(&self.stack) as Arc<dyn StackConfig>,
            decl,
        ));
        let _ = self.evaluator.component.set(Arc::downgrade(&component));
        component
    }
}

pub fn decl_range() -> SourceRange {
    SourceRange::line("main.stack.yaml", 3)
}

/// A `component.web` declaration sourced from the test package.
pub fn declaration() -> ComponentDeclaration {
    ComponentDeclaration::new(
        ComponentAddr::root("web"),
        ModuleSource::parse(APP_SOURCE).unwrap(),
        decl_range(),
    )
}

/// Declaration assigning the given provider configurations.
pub fn declaration_with_providers(names: &[&str]) -> ComponentDeclaration {
    names.iter().fold(declaration(), |decl, name| {
        decl.with_provider(
            LocalProviderConfig::parse(name).unwrap(),
            Expression::new(format!("provider.{name}"), decl_range()),
        )
    })
}

pub fn summaries(diags: &Diagnostics) -> Vec<&str> {
    diags.iter().map(|d| d.summary.as_str()).collect()
}
