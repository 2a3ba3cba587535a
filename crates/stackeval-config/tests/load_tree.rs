//! Module tree loading against an on-disk source bundle.

use std::fs;
use std::path::Path;

use stackeval_config::{load_tree, ModulePath, SourceBundle, YamlModuleParser};
use stackeval_foundation::{FinalSource, ModuleSource, SourceRange, Version};

const MANIFEST: &str = r#"{
  "format_version": 1,
  "packages": [
    { "source": "git::https://example.com/app.git", "local": "app" },
    { "source": "git::https://example.com/net.git?ref=v1.2.0", "local": "net-1.2.0" },
    { "source": "git::https://example.com/net.git?ref=v2.0.0", "local": "net-2.0.0" }
  ],
  "registry": [
    {
      "source": "example-corp/network/aws",
      "versions": {
        "1.2.0": { "source": "git::https://example.com/net.git?ref=v1.2.0" },
        "2.0.0": { "source": "git::https://example.com/net.git?ref=v2.0.0" }
      }
    }
  ]
}"#;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn bundle_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "bundle-manifest.json", MANIFEST);
    write(
        root,
        "app/module.yaml",
        r#"
variables:
  name:
    type: string
modules:
  network:
    source: example-corp/network/aws//vpc
    version: "~> 1.0"
  helper:
    source: ./helper
"#,
    );
    write(root, "app/helper/module.yaml", "resources:\n  - type: null_resource\n    name: x\n");
    write(root, "net-1.2.0/vpc/module.yaml", "modules:\n  subnets:\n    source: ../subnets\n");
    write(root, "net-1.2.0/subnets/module.yaml", "");
    write(root, "net-2.0.0/vpc/module.yaml", "");
    dir
}

fn app_source() -> FinalSource {
    ModuleSource::parse("git::https://example.com/app.git")
        .unwrap()
        .as_final()
        .unwrap()
}

fn subject() -> SourceRange {
    SourceRange::line("stack.yaml", 4)
}

#[test]
fn test_load_tree_resolves_registry_and_local_children() {
    let dir = bundle_dir();
    let bundle = SourceBundle::open(dir.path()).unwrap();
    let parser = YamlModuleParser::new();

    let (tree, diags) = load_tree(&bundle, &parser, &app_source(), subject());
    assert!(diags.is_empty(), "unexpected diagnostics: {diags}");
    let tree = tree.unwrap();

    let network = tree.child("network").unwrap();
    assert_eq!(network.version, Some(Version::new(1, 2, 0)));
    assert_eq!(network.source.to_string(), "example-corp/network/aws//vpc@1.2.0");

    let subnets = tree
        .descendant(&ModulePath::root().child("network").child("subnets"))
        .unwrap();
    assert_eq!(subnets.source.to_string(), "example-corp/network/aws//subnets@1.2.0");
    assert_eq!(subnets.module.source_dir, dir.path().join("net-1.2.0/subnets"));

    let helper = tree.child("helper").unwrap();
    assert_eq!(helper.source.to_string(), "git::https://example.com/app.git//helper");
    assert_eq!(helper.module.resources.len(), 1);

    assert_eq!(tree.walk().count(), 4);
}

#[test]
fn test_unsatisfiable_child_version_leaves_failed_slot() {
    let dir = bundle_dir();
    write(
        dir.path(),
        "app/module.yaml",
        r#"
modules:
  network:
    source: example-corp/network/aws//vpc
    version: ">= 3.0"
  helper:
    source: ./helper
"#,
    );
    let bundle = SourceBundle::open(dir.path()).unwrap();

    let (tree, diags) = load_tree(&bundle, &YamlModuleParser::new(), &app_source(), subject());
    let tree = tree.unwrap();

    assert!(tree.children["network"].is_failed());
    assert!(tree.child("helper").is_some());
    assert_eq!(diags.len(), 1);
    let diag = diags.iter().next().unwrap();
    assert_eq!(diag.summary, "Can't load module for component");
    assert!(diag.detail.starts_with("Invalid source address:"));
    assert_eq!(diag.subject.as_ref().unwrap().start.line, 4);
}

#[test]
fn test_root_without_module_file() {
    let dir = bundle_dir();
    fs::remove_file(dir.path().join("app/module.yaml")).unwrap();
    let bundle = SourceBundle::open(dir.path()).unwrap();

    let (tree, diags) = load_tree(&bundle, &YamlModuleParser::new(), &app_source(), subject());
    assert!(tree.is_none());
    assert_eq!(diags.len(), 1);
    let diag = diags.iter().next().unwrap();
    assert_eq!(
        diag.detail,
        "The source location git::https://example.com/app.git does not contain a module."
    );
    assert_eq!(diag.subject, Some(subject()));
}

#[test]
fn test_root_missing_from_bundle() {
    let dir = bundle_dir();
    let bundle = SourceBundle::open(dir.path()).unwrap();
    let other = ModuleSource::parse("git::https://example.com/other.git")
        .unwrap()
        .as_final()
        .unwrap();

    let (tree, diags) = load_tree(&bundle, &YamlModuleParser::new(), &other, subject());
    assert!(tree.is_none());
    assert!(diags
        .iter()
        .next()
        .unwrap()
        .detail
        .starts_with("Failed to load this component's root module:"));
}
