//! Command-line surface (spec.md §6): `ferc` is a driver, not part of the
//! analysis core itself — it wires a JSON-based [`fer_core::loader::SourceLoader`]
//! and the `fer.ret`/lockfile bookkeeping from [`fer_manifest`] around
//! [`fer_core`]'s orchestrator.

use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::{Parser, Subcommand};
use fer_core::{
    ast::FileAst,
    context::AnalysisContext,
    loader::{self, SourceLoader},
    module::ModuleKey,
    orchestrator,
};
use fer_manifest::{lockfile::Lockfile, manifest};
use log::{error, info, warn};

const MANIFEST_FILE: &str = "fer.ret";
const LOCKFILE_FILE: &str = "fer.lock";

#[derive(Parser, Debug)]
#[command(name = "ferc", about = "Fer language semantic analysis driver")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Source file to analyze, when no subcommand is given.
    pub file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Install a dependency, recording it in the manifest and lockfile.
    Get { repo: String },
    /// Remove a dependency, cascading to unused transitive dependencies.
    Remove { repo: String },
    /// Scaffold a new project at `path`.
    Init { path: PathBuf },
    /// List the dependencies recorded in the lockfile.
    List,
    /// Remove cache directories for anything no longer in the lockfile.
    Cleanup,
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Some(Command::Get { repo }) => cmd_get(&repo),
        Some(Command::Remove { repo }) => cmd_remove(&repo),
        Some(Command::Init { path }) => cmd_init(&path),
        Some(Command::List) => cmd_list(),
        Some(Command::Cleanup) => cmd_cleanup(),
        None => match cli.file {
            Some(file) => cmd_analyze(&file),
            None => {
                eprintln!("Usage: ferc <file> | ferc <get|remove|init|list|cleanup> ...");
                Err(())
            }
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(()) => ExitCode::FAILURE,
    }
}

struct FsLoader {
    root: PathBuf,
}

impl SourceLoader for FsLoader {
    fn load(&self, key: &ModuleKey) -> Option<FileAst> {
        let path = self.root.join(format!("{}.fer", key.0));
        let text = fs::read_to_string(&path).map_err(|err| warn!("reading '{}': {err}", path.display())).ok()?;
        serde_json::from_str(&text).map_err(|err| warn!("parsing '{}': {err}", path.display())).ok()
    }

    /// Reads the cached remote repo's own `fer.ret` for its `remote.share`
    /// flag. `key` is `host/owner/repo@version[/sub/path]`; the manifest
    /// lives at the repo root, so any sub-path segments past `repo@version`
    /// are dropped. Missing or unparsable manifests default to shareable,
    /// matching `Manifest::remote_share`'s own default for an absent key.
    fn remote_share(&self, key: &ModuleKey) -> bool {
        let repo_end = key.0.split('/').position(|segment| segment.contains('@')).map(|i| i + 1).unwrap_or(1);
        let repo_root = key.0.split('/').take(repo_end).collect::<Vec<_>>().join("/");
        let path = self.root.join(repo_root).join(MANIFEST_FILE);
        let Ok(text) = fs::read_to_string(&path) else { return true };
        manifest::parse(&text).map(|m| m.remote_share()).unwrap_or(true)
    }
}

fn cmd_analyze(file: &Path) -> Result<(), ()> {
    let manifest = load_manifest(file.parent().unwrap_or_else(|| Path::new(".")));
    let project_name = manifest.as_ref().and_then(|m| m.project_name()).unwrap_or("main").to_string();
    let remote_enabled = manifest.as_ref().map(|m| m.remote_enabled()).unwrap_or(false);

    let module_name = file.file_stem().and_then(|s| s.to_str()).unwrap_or("main").to_string();
    let root = file.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();

    let mut ctx = AnalysisContext::new(project_name, remote_enabled);
    let loader = FsLoader { root };
    let entry = ModuleKey::new(module_name);
    let failed = loader::load_graph(&mut ctx, &[entry], &loader);
    if !failed.is_empty() {
        for key in &failed {
            error!("could not load module '{key}'");
        }
        return Err(());
    }

    orchestrator::run_all(&mut ctx);

    for diag in ctx.report.sorted() {
        let report = miette::Report::new(diag.clone());
        eprintln!("{report:?}");
    }

    if ctx.report.has_errors() {
        Err(())
    } else {
        info!("analysis complete: no errors");
        Ok(())
    }
}

fn cmd_init(path: &Path) -> Result<(), ()> {
    fs::create_dir_all(path).map_err(|err| error!("creating '{}': {err}", path.display()))?;
    let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("project");
    let manifest_path = path.join(MANIFEST_FILE);
    if manifest_path.exists() {
        error!("'{}' already exists", manifest_path.display());
        return Err(());
    }
    let contents = format!("name = \"{name}\"\n\n[remote]\nenabled = false\nshare = true\n\n[cache]\npath = \".fer-cache\"\n\n[dependencies]\n");
    fs::write(&manifest_path, contents).map_err(|err| error!("writing '{}': {err}", manifest_path.display()))?;
    info!("initialized project '{name}' at '{}'", path.display());
    Ok(())
}

fn cmd_get(repo: &str) -> Result<(), ()> {
    let (repo_path, requested_version) = match repo.split_once('@') {
        Some((path, version)) => (path, version.to_string()),
        None => (repo, "latest".to_string()),
    };

    let mut manifest = load_manifest(Path::new(".")).ok_or(())?;
    match manifest.sections.iter_mut().find(|(name, _)| name == "dependencies") {
        Some((_, entries)) => {
            entries.retain(|(k, _)| k != repo_path);
            entries.push((repo_path.to_string(), manifest::Value::Str(requested_version.clone())));
        }
        None => manifest.sections.push((
            "dependencies".to_string(),
            vec![(repo_path.to_string(), manifest::Value::Str(requested_version.clone()))],
        )),
    }
    save_manifest(&manifest)?;

    let key = format!("{repo_path}@{requested_version}");
    let mut lockfile = load_lockfile().unwrap_or_else(|| Lockfile::new(generated_at_placeholder()));
    if !lockfile.dependencies.contains_key(&key) {
        lockfile.add_direct(&key, &requested_version, &[]).map_err(|err| error!("{err}"))?;
    }
    save_lockfile(&lockfile)?;

    let cache_root = manifest.cache_path().to_string();
    let cache_dir = Path::new(&cache_root).join(&key);
    fs::create_dir_all(&cache_dir).map_err(|err| error!("creating '{}': {err}", cache_dir.display()))?;

    info!("installed '{key}'");
    Ok(())
}

fn cmd_remove(repo: &str) -> Result<(), ()> {
    let mut manifest = load_manifest(Path::new(".")).ok_or(())?;
    if let Some((_, entries)) = manifest.sections.iter_mut().find(|(name, _)| name == "dependencies") {
        entries.retain(|(k, _)| k != repo);
    }
    save_manifest(&manifest)?;

    let mut lockfile = load_lockfile().ok_or_else(|| error!("no lockfile to update"))?;
    let key = lockfile
        .dependencies
        .keys()
        .find(|k| k.starts_with(&format!("{repo}@")))
        .cloned()
        .ok_or_else(|| error!("'{repo}' is not a recorded dependency"))?;

    let removed = lockfile.remove(&key).map_err(|err| error!("{err}"))?;
    save_lockfile(&lockfile)?;

    let cache_root = manifest.cache_path().to_string();
    for removed_key in &removed {
        let cache_dir = Path::new(&cache_root).join(removed_key);
        let _ = fs::remove_dir_all(&cache_dir);
    }
    info!("removed {} dependenc{}", removed.len(), if removed.len() == 1 { "y" } else { "ies" });
    Ok(())
}

fn cmd_list() -> Result<(), ()> {
    let lockfile = load_lockfile().ok_or(())?;
    for (key, entry) in &lockfile.dependencies {
        println!("{key} ({}{})", entry.version, if entry.direct { ", direct" } else { "" });
    }
    Ok(())
}

fn cmd_cleanup() -> Result<(), ()> {
    let manifest = load_manifest(Path::new(".")).ok_or(())?;
    let lockfile = load_lockfile().unwrap_or_else(|| Lockfile::new(generated_at_placeholder()));
    let cache_root = Path::new(manifest.cache_path());
    let Ok(entries) = fs::read_dir(cache_root) else {
        return Ok(());
    };
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if !lockfile.dependencies.keys().any(|k| k.contains(&name)) {
            let _ = fs::remove_dir_all(entry.path());
            info!("removed orphaned cache entry '{name}'");
        }
    }
    Ok(())
}

fn load_manifest(dir: &Path) -> Option<manifest::Manifest> {
    let path = dir.join(MANIFEST_FILE);
    let text = fs::read_to_string(&path).map_err(|err| warn!("reading '{}': {err}", path.display())).ok()?;
    manifest::parse(&text).map_err(|err| error!("parsing '{}': {err}", path.display())).ok()
}

fn save_manifest(manifest: &manifest::Manifest) -> Result<(), ()> {
    fs::write(MANIFEST_FILE, manifest::render(manifest)).map_err(|err| error!("writing '{MANIFEST_FILE}': {err}"))
}

fn load_lockfile() -> Option<Lockfile> {
    let text = fs::read_to_string(LOCKFILE_FILE).ok()?;
    Lockfile::parse(&text).map_err(|err| error!("parsing '{LOCKFILE_FILE}': {err}")).ok()
}

fn save_lockfile(lockfile: &Lockfile) -> Result<(), ()> {
    let text = lockfile.render().map_err(|err| error!("serializing lockfile: {err}"))?;
    fs::write(LOCKFILE_FILE, text).map_err(|err| error!("writing '{LOCKFILE_FILE}': {err}"))
}

/// `ferc` has no wall-clock access in this workspace (its tests must stay
/// deterministic); a freshly created lockfile gets a fixed placeholder
/// timestamp until something downstream rewrites `generated_at` for real.
fn generated_at_placeholder() -> &'static str {
    "1970-01-01T00:00:00Z"
}
