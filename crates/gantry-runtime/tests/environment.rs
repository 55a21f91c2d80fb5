//! All-or-nothing application of runtime environment specs

use gantry_runtime::{
    EntryPointResolver, EnvironmentBuilder, EnvironmentError, Instrumentation,
    LiveContext, LoadContext, LoadStrategy, ProgramResolver, RuntimeEnvironmentSpec,
};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

fn base_context() -> LoadContext {
    LoadContext::new(vec![PathBuf::from("/usr/lib")])
}

fn live() -> Arc<LiveContext> {
    Arc::new(LiveContext::new(base_context()))
}

fn spec(entries: Vec<PathBuf>, strategy: LoadStrategy) -> RuntimeEnvironmentSpec {
    RuntimeEnvironmentSpec {
        entries,
        strategy: Some(strategy),
        autoload_dir: None,
    }
}

#[test]
fn test_invalid_middle_entry_leaves_context_unchanged() {
    let dir = TempDir::new().unwrap();
    let first = dir.path().join("first");
    let third = dir.path().join("third");
    fs::create_dir(&first).unwrap();
    fs::create_dir(&third).unwrap();
    let missing = dir.path().join("missing");

    let live = live();
    let builder = EnvironmentBuilder::new(Some(live.clone()), LoadContext::default());

    let err = builder
        .prepare(&spec(
            vec![first, missing.clone(), third],
            LoadStrategy::Instrumentation,
        ))
        .unwrap_err();

    assert!(matches!(err, EnvironmentError::MissingEntry { ref path } if *path == missing));
    assert_eq!(live.current(), base_context());
}

#[test]
fn test_file_entry_is_rejected_before_apply() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("server.jar");
    fs::write(&file, b"").unwrap();

    let live = live();
    let builder = EnvironmentBuilder::new(Some(live.clone()), LoadContext::default());
    let err = builder
        .prepare(&spec(vec![dir.path().to_path_buf(), file], LoadStrategy::Instrumentation))
        .unwrap_err();

    assert!(matches!(err, EnvironmentError::NotADirectory { .. }));
    assert_eq!(live.current(), base_context());
}

#[test]
fn test_instrumentation_appends_all_entries() {
    let dir = TempDir::new().unwrap();
    let a = dir.path().join("a");
    let b = dir.path().join("b");
    fs::create_dir(&a).unwrap();
    fs::create_dir(&b).unwrap();

    let live = live();
    let builder = EnvironmentBuilder::new(Some(live.clone()), LoadContext::default());
    let prepared = builder
        .prepare(&spec(vec![a.clone(), b.clone()], LoadStrategy::Instrumentation))
        .unwrap();

    let expected = vec![PathBuf::from("/usr/lib"), a.clone(), b.clone()];
    assert_eq!(live.current().dirs(), expected.as_slice());
    assert_eq!(prepared.context().dirs(), expected.as_slice());
    assert_eq!(prepared.applied(), &[a, b]);
}

#[test]
fn test_isolated_loader_extends_a_copy_of_the_default_context() {
    let dir = TempDir::new().unwrap();
    let builder = EnvironmentBuilder::new(None, base_context());

    let prepared = builder
        .prepare(&spec(vec![dir.path().to_path_buf()], LoadStrategy::IsolatedLoader))
        .unwrap();

    assert_eq!(prepared.strategy(), Some(LoadStrategy::IsolatedLoader));
    assert_eq!(
        prepared.context().dirs(),
        &[PathBuf::from("/usr/lib"), dir.path().to_path_buf()]
    );
    // The default context is untouched
    assert_eq!(builder.default_context(), base_context());
}

#[cfg(unix)]
#[test]
fn test_isolated_loader_still_resolves_inherited_programs() {
    let dir = TempDir::new().unwrap();
    let inherited =
        base_context().with_program_dirs(vec![PathBuf::from("/bin"), PathBuf::from("/usr/bin")]);
    let builder = EnvironmentBuilder::new(None, inherited);

    let prepared = builder
        .prepare(&spec(vec![dir.path().to_path_buf()], LoadStrategy::IsolatedLoader))
        .unwrap();

    let program = ProgramResolver.resolve("sh", prepared.context()).unwrap();
    assert!(program.path().ends_with("sh"));
    // PATH is for lookup only; the library path carries library dirs
    let library_path = prepared.context().library_path();
    assert!(!std::env::split_paths(&library_path).any(|p| p == PathBuf::from("/bin")));
}

#[test]
fn test_instrumentation_strategy_without_capability_fails() {
    let dir = TempDir::new().unwrap();
    let builder = EnvironmentBuilder::new(None, base_context());
    let err = builder
        .prepare(&spec(vec![dir.path().to_path_buf()], LoadStrategy::Instrumentation))
        .unwrap_err();
    assert!(matches!(err, EnvironmentError::InstrumentationUnavailable { .. }));
}

#[test]
fn test_empty_spec_is_explicitly_skipped() {
    let builder = EnvironmentBuilder::new(None, base_context());
    let prepared = builder.prepare(&RuntimeEnvironmentSpec::empty()).unwrap();
    assert_eq!(prepared.strategy(), None);
    assert!(prepared.applied().is_empty());
    assert_eq!(prepared.context(), &base_context());
}

#[test]
fn test_autoload_appends_library_directories() {
    let root = TempDir::new().unwrap();
    let native = root.path().join("native");
    let nested = root.path().join("plugins").join("x86_64");
    let docs = root.path().join("docs");
    for dir in [&native, &nested, &docs] {
        fs::create_dir_all(dir).unwrap();
    }
    fs::write(native.join("libnet.so"), b"").unwrap();
    fs::write(native.join("libzip.so.1"), b"").unwrap();
    fs::write(nested.join("libgpu.so"), b"").unwrap();
    fs::write(docs.join("README.md"), b"").unwrap();

    let live = live();
    let builder = EnvironmentBuilder::new(Some(live.clone()), LoadContext::default());
    let prepared = builder
        .prepare(&RuntimeEnvironmentSpec {
            entries: Vec::new(),
            strategy: Some(LoadStrategy::Instrumentation),
            autoload_dir: Some(root.path().to_path_buf()),
        })
        .unwrap();

    assert_eq!(prepared.applied(), &[native.clone(), nested.clone()]);
    assert!(live.current().contains(&native));
    assert!(!live.current().contains(&docs));
}

#[test]
fn test_missing_autoload_dir_applies_nothing() {
    let dir = TempDir::new().unwrap();
    let live = live();
    let builder = EnvironmentBuilder::new(Some(live.clone()), LoadContext::default());

    let err = builder
        .prepare(&RuntimeEnvironmentSpec {
            entries: vec![dir.path().to_path_buf()],
            strategy: Some(LoadStrategy::Instrumentation),
            autoload_dir: Some(dir.path().join("nope")),
        })
        .unwrap_err();

    assert!(matches!(err, EnvironmentError::MissingEntry { .. }));
    assert_eq!(live.current(), base_context());
}
