//! Hot deployment of web applications from a monitored directory.
//!
//! # Responsibilities
//! - Discover apps (directories and archives) in the monitored directory
//! - Deploy new apps, redeploy changed ones, undeploy removed ones
//! - Rescan whenever the directory watcher reports a change
//!
//! # Design Decisions
//! - A directory shadows an archive with the same app name
//! - A failed redeploy leaves the previous context serving; its modification
//!   time is still recorded so the same broken app is not retried every poll
//! - Descriptors layer in a fixed order: defaults descriptor, then the app's
//!   own `context.toml`
//! - Each archive deploy extracts into its own `<app>-<uuid>` directory; the
//!   previous extraction is removed only once its replacement is registered
//! - A deployed app may shadow a context it did not create (a `ROOT` app over
//!   the main webapp at `/`). Undeploying removes only the app's own context
//!   and puts the shadowed one back

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use notify::PollWatcher;
use regex::Regex;
use tokio::task::JoinHandle;

use crate::config::loader::load_descriptor;
use crate::config::{ContextConfig, ContextDescriptor, RuntimeMode};
use crate::context::{assemble_context, ComponentRegistry, WebContext};
use crate::deploy::archive::{self, archive_stem};
use crate::deploy::watcher::DeployWatcher;
use crate::error::{Result, RunnerError};
use crate::handler::ContextCollection;
use crate::observability::metrics;

/// Fixed rescan interval of the directory watcher.
pub const SCAN_INTERVAL: Duration = Duration::from_secs(1);

/// Context attribute naming the jars the container shares with every app.
pub const CONTAINER_INCLUDE_JAR_PATTERN_ATTRIBUTE: &str = "container-include-jar-pattern";

pub const CONTAINER_INCLUDE_JAR_PATTERN: &str = r".*/servlet-api-[^/]*\.jar$";

/// Per-app descriptor file, looked up at the root of each app.
pub const APP_DESCRIPTOR: &str = "context.toml";

/// Outcome of one scan, by app name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub deployed: Vec<String>,
    pub redeployed: Vec<String>,
    pub undeployed: Vec<String>,
    pub failed: Vec<String>,
}

impl ScanReport {
    pub fn is_empty(&self) -> bool {
        self.deployed.is_empty()
            && self.redeployed.is_empty()
            && self.undeployed.is_empty()
            && self.failed.is_empty()
    }
}

#[derive(Debug, Clone)]
struct Deployment {
    source: PathBuf,
    modified: Option<SystemTime>,
    /// `None` while the app has never assembled successfully.
    live: Option<LiveContext>,
}

#[derive(Debug, Clone)]
struct LiveContext {
    context: Arc<WebContext>,
    /// Extraction directory of an archive app; the context serves from it.
    extracted: Option<PathBuf>,
    /// Context registered under the same path before this app took it over.
    shadowed: Option<Arc<WebContext>>,
}

struct Running {
    _watcher: Option<PollWatcher>,
    task: JoinHandle<()>,
}

/// Deploys every app found in a monitored directory into a context collection.
#[derive(Clone)]
pub struct DeploymentManager {
    contexts: ContextCollection,
    monitored_dir: PathBuf,
    defaults: Option<ContextDescriptor>,
    include_jar_pattern: Regex,
    registry: ComponentRegistry,
    work_dir: PathBuf,
    owns_work_dir: bool,
    runtime_mode: RuntimeMode,
    deployments: Arc<Mutex<HashMap<String, Deployment>>>,
    running: Arc<Mutex<Option<Running>>>,
}

impl fmt::Debug for DeploymentManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeploymentManager")
            .field("monitored_dir", &self.monitored_dir)
            .field("work_dir", &self.work_dir)
            .field("has_defaults", &self.defaults.is_some())
            .field("runtime_mode", &self.runtime_mode)
            .finish_non_exhaustive()
    }
}

/// Build a deployment manager over `monitored_dir`.
///
/// The monitored directory may be missing. A configured defaults descriptor
/// must exist and parse.
pub fn new_deployment_manager(
    contexts: ContextCollection,
    monitored_dir: impl Into<PathBuf>,
    defaults_descriptor: Option<PathBuf>,
) -> Result<DeploymentManager> {
    let monitored_dir = monitored_dir.into();

    let defaults = match defaults_descriptor {
        Some(path) => {
            let descriptor = load_descriptor(&path).map_err(|e| RunnerError::Deployment {
                app: path.clone(),
                reason: format!("defaults descriptor: {}", e),
            })?;
            Some(descriptor)
        }
        None => None,
    };

    let include_jar_pattern = Regex::new(CONTAINER_INCLUDE_JAR_PATTERN)
        .map_err(|e| RunnerError::invalid(format!("include jar pattern: {}", e)))?;

    let work_dir = std::env::temp_dir()
        .join("webapp-runner")
        .join(uuid::Uuid::new_v4().simple().to_string());

    if !monitored_dir.is_dir() {
        tracing::warn!(dir = %monitored_dir.display(), "Monitored deploy directory does not exist");
    }

    Ok(DeploymentManager {
        contexts,
        monitored_dir,
        defaults,
        include_jar_pattern,
        registry: ComponentRegistry::with_builtins(),
        work_dir,
        owns_work_dir: true,
        runtime_mode: RuntimeMode::default(),
        deployments: Arc::new(Mutex::new(HashMap::new())),
        running: Arc::new(Mutex::new(None)),
    })
}

impl DeploymentManager {
    /// Components available to app descriptors.
    pub fn with_registry(mut self, registry: ComponentRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Directory archives are extracted into. Left in place on stop.
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = dir.into();
        self.owns_work_dir = false;
        self
    }

    pub fn with_runtime_mode(mut self, mode: RuntimeMode) -> Self {
        self.runtime_mode = mode;
        self
    }

    pub fn monitored_dir(&self) -> &Path {
        &self.monitored_dir
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn scan_interval(&self) -> Duration {
        SCAN_INTERVAL
    }

    pub fn include_jar_pattern(&self) -> &str {
        self.include_jar_pattern.as_str()
    }

    pub fn contexts(&self) -> &ContextCollection {
        &self.contexts
    }

    /// Context path an app name deploys under.
    pub fn context_path_for(name: &str) -> String {
        if name.eq_ignore_ascii_case("root") {
            "/".to_string()
        } else {
            format!("/{}", name)
        }
    }

    /// Bring the context collection in line with the monitored directory.
    ///
    /// Blocking: reads the directory and extracts archives.
    pub fn scan(&self) -> Result<ScanReport> {
        let apps = self.discover()?;
        let mut deployments = self.deployments.lock().expect("deployment table mutex poisoned");
        let mut report = ScanReport::default();

        for (name, source) in &apps {
            let modified = modified_time(source);
            let previous = deployments.remove(name);
            if let Some(previous) = previous.as_ref() {
                if previous.source == *source && previous.modified == modified {
                    deployments.insert(name.clone(), previous.clone());
                    continue;
                }
            }
            let mut previous_live = previous.and_then(|p| p.live);

            let live = match self.deploy(name, source) {
                Ok((context, extracted)) => {
                    let context_path = context.context_path().to_string();
                    let replaced = self.contexts.add(context.clone());
                    let shadowed = match (previous_live.as_mut(), replaced) {
                        (Some(old), Some(replaced)) if Arc::ptr_eq(&old.context, &replaced) => {
                            old.shadowed.take()
                        }
                        (_, replaced) => replaced,
                    };
                    if let Some(shadowed) = &shadowed {
                        tracing::info!(
                            app = %name,
                            context_path = %shadowed.context_path(),
                            "App shadows an existing context"
                        );
                    }

                    let redeployed = match previous_live.take() {
                        Some(old) => {
                            self.retire(&old);
                            true
                        }
                        None => false,
                    };
                    if redeployed {
                        tracing::info!(app = %name, context_path = %context_path, "App redeployed");
                        metrics::record_deployment("redeploy");
                        report.redeployed.push(name.clone());
                    } else {
                        tracing::info!(app = %name, context_path = %context_path, "App deployed");
                        metrics::record_deployment("deploy");
                        report.deployed.push(name.clone());
                    }

                    Some(LiveContext {
                        context,
                        extracted,
                        shadowed,
                    })
                }
                Err(e) => {
                    tracing::warn!(
                        app = %name,
                        source = %source.display(),
                        error = %e,
                        "App deployment failed"
                    );
                    metrics::record_deployment("failed");
                    report.failed.push(name.clone());
                    previous_live
                }
            };

            deployments.insert(
                name.clone(),
                Deployment {
                    source: source.clone(),
                    modified,
                    live,
                },
            );
        }

        let removed: Vec<String> = deployments
            .keys()
            .filter(|name| !apps.contains_key(*name))
            .cloned()
            .collect();
        for name in removed {
            if let Some(deployment) = deployments.remove(&name) {
                if let Some(live) = &deployment.live {
                    self.retire(live);
                    tracing::info!(
                        app = %name,
                        context_path = %live.context.context_path(),
                        "App undeployed"
                    );
                    metrics::record_deployment("undeploy");
                }
                report.undeployed.push(name);
            }
        }

        Ok(report)
    }

    /// Initial scan, then watch for changes until `stop`.
    ///
    /// Must be called from within a tokio runtime. Every scan runs on the
    /// blocking pool.
    pub async fn start(&self) -> Result<ScanReport> {
        let report = self.scan_blocking().await?;
        tracing::info!(
            dir = %self.monitored_dir.display(),
            deployed = report.deployed.len(),
            failed = report.failed.len(),
            "Deployment manager started"
        );

        let (watcher, mut changes) = DeployWatcher::new(&self.monitored_dir, SCAN_INTERVAL);
        let watcher = watcher.run().map_err(|e| RunnerError::Deployment {
            app: self.monitored_dir.clone(),
            reason: format!("watch failed: {}", e),
        })?;

        let manager = self.clone();
        let task = tokio::spawn(async move {
            while changes.recv().await.is_some() {
                // One rescan covers every event already queued.
                while changes.try_recv().is_ok() {}

                match manager.scan_blocking().await {
                    Ok(report) if !report.is_empty() => {
                        tracing::debug!(?report, "Rescan complete");
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "Rescan failed"),
                }
            }
        });

        let previous = self
            .running
            .lock()
            .expect("deployer state mutex poisoned")
            .replace(Running {
                _watcher: watcher,
                task,
            });
        if let Some(previous) = previous {
            previous.task.abort();
        }
        Ok(report)
    }

    /// Stop watching. Deployed contexts stay registered.
    pub fn stop(&self) {
        let running = self.running.lock().expect("deployer state mutex poisoned").take();
        if let Some(running) = running {
            running.task.abort();
            tracing::info!(dir = %self.monitored_dir.display(), "Deployment manager stopped");
        }
        if self.owns_work_dir && self.work_dir.exists() {
            if let Err(e) = fs::remove_dir_all(&self.work_dir) {
                tracing::warn!(
                    dir = %self.work_dir.display(),
                    error = %e,
                    "Failed to remove work directory"
                );
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().expect("deployer state mutex poisoned").is_some()
    }

    /// App name to source path. Directories shadow archives of the same name.
    fn discover(&self) -> Result<BTreeMap<String, PathBuf>> {
        let mut apps = BTreeMap::new();
        if !self.monitored_dir.is_dir() {
            return Ok(apps);
        }

        let mut archives = Vec::new();
        for entry in fs::read_dir(&self.monitored_dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            if path.is_dir() {
                apps.insert(name.to_string(), path.clone());
            } else if let Some(stem) = archive_stem(&path) {
                archives.push((stem.to_string(), path.clone()));
            }
        }
        for (name, path) in archives {
            apps.entry(name).or_insert(path);
        }
        Ok(apps)
    }

    async fn scan_blocking(&self) -> Result<ScanReport> {
        let scanner = self.clone();
        tokio::task::spawn_blocking(move || scanner.scan())
            .await
            .map_err(|e| RunnerError::Deployment {
                app: self.monitored_dir.clone(),
                reason: format!("scan task failed: {}", e),
            })?
    }

    /// Assemble an app without registering it. Archives extract into a fresh
    /// directory so a failed redeploy never touches the files being served.
    fn deploy(&self, name: &str, source: &Path) -> Result<(Arc<WebContext>, Option<PathBuf>)> {
        if source.is_dir() {
            return Ok((self.assemble(name, source, source)?, None));
        }

        let dest = self
            .work_dir
            .join(format!("{}-{}", name, uuid::Uuid::new_v4().simple()));
        let assembled = archive::extract(source, &dest)
            .and_then(|()| self.assemble(name, source, &dest));
        match assembled {
            Ok(context) => Ok((context, Some(dest))),
            Err(e) => {
                remove_extracted(&dest);
                Err(e)
            }
        }
    }

    fn assemble(&self, name: &str, source: &Path, webapp: &Path) -> Result<Arc<WebContext>> {
        let mut config = ContextConfig::new(webapp)
            .context_path(Self::context_path_for(name))
            .runtime_mode(self.runtime_mode);
        if let Some(defaults) = &self.defaults {
            config = defaults.apply(config);
        }

        let descriptor = webapp.join(APP_DESCRIPTOR);
        if descriptor.is_file() {
            let app = load_descriptor(&descriptor).map_err(|e| RunnerError::Deployment {
                app: source.to_path_buf(),
                reason: format!("{}: {}", APP_DESCRIPTOR, e),
            })?;
            config = app.apply(config);
        }

        let config = config.attribute(
            CONTAINER_INCLUDE_JAR_PATTERN_ATTRIBUTE,
            self.include_jar_pattern.as_str(),
        );
        assemble_context(config, &self.registry)
    }

    /// Take a deployed context out of service: only that exact context is
    /// removed, and the context it shadowed returns if its path is free.
    fn retire(&self, live: &LiveContext) {
        if self.contexts.remove_context(&live.context) {
            if let Some(shadowed) = &live.shadowed {
                if self.contexts.get(shadowed.context_path()).is_none() {
                    self.contexts.add(shadowed.clone());
                }
            }
        }
        if let Some(dir) = &live.extracted {
            remove_extracted(dir);
        }
    }
}

fn remove_extracted(dir: &Path) {
    match fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "Failed to remove extracted app");
        }
    }
}

/// Latest modification time of an app: the archive itself, or a directory
/// together with its descriptor.
fn modified_time(source: &Path) -> Option<SystemTime> {
    let own = fs::metadata(source).and_then(|m| m.modified()).ok();
    if !source.is_dir() {
        return own;
    }
    let descriptor = fs::metadata(source.join(APP_DESCRIPTOR))
        .and_then(|m| m.modified())
        .ok();
    own.max(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use flate2::write::GzEncoder;
    use flate2::Compression;

    fn app_dir(root: &Path, name: &str, index: &str) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("index.html"), index).unwrap();
        dir
    }

    fn manager(monitored: &Path, work: &Path) -> (DeploymentManager, ContextCollection) {
        let contexts = ContextCollection::new();
        let manager = new_deployment_manager(contexts.clone(), monitored, None)
            .unwrap()
            .with_work_dir(work);
        (manager, contexts)
    }

    fn bump_mtime(path: &Path) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(30)).unwrap();
    }

    fn write_tar_gz(path: &Path, index: &str) {
        let file = fs::File::create(path).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        let mut header = tar::Header::new_gnu();
        header.set_size(index.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, "index.html", index.as_bytes()).unwrap();
        builder.into_inner().unwrap().finish().unwrap();
    }

    fn extraction_dirs(work: &Path, app: &str) -> Vec<PathBuf> {
        let prefix = format!("{}-", app);
        let mut dirs: Vec<PathBuf> = fs::read_dir(work)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(&prefix))
            })
            .collect();
        dirs.sort();
        dirs
    }

    async fn body_at(context: &Arc<WebContext>, uri: &str) -> (StatusCode, String) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = context.handle(req).await;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn fixed_settings() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, _) = manager(dir.path(), dir.path());
        assert_eq!(manager.scan_interval(), Duration::from_secs(1));
        assert_eq!(manager.include_jar_pattern(), r".*/servlet-api-[^/]*\.jar$");
        assert!(!manager.is_running());
    }

    #[test]
    fn root_maps_to_slash() {
        assert_eq!(DeploymentManager::context_path_for("ROOT"), "/");
        assert_eq!(DeploymentManager::context_path_for("root"), "/");
        assert_eq!(DeploymentManager::context_path_for("shop"), "/shop");
    }

    #[test]
    fn missing_monitored_dir_finds_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, contexts) = manager(&dir.path().join("absent"), dir.path());
        let report = manager.scan().unwrap();
        assert!(report.is_empty());
        assert!(contexts.is_empty());
    }

    #[test]
    fn missing_defaults_descriptor_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = new_deployment_manager(
            ContextCollection::new(),
            dir.path(),
            Some(dir.path().join("defaults.toml")),
        )
        .unwrap_err();
        assert!(matches!(err, RunnerError::Deployment { .. }));
    }

    #[tokio::test]
    async fn deploys_directories_with_jar_pattern() {
        let apps = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        app_dir(apps.path(), "ROOT", "root");
        app_dir(apps.path(), "shop", "shop");
        fs::create_dir(apps.path().join(".hidden")).unwrap();

        let (manager, contexts) = manager(apps.path(), work.path());
        let report = manager.scan().unwrap();
        assert_eq!(report.deployed, vec!["ROOT", "shop"]);
        assert_eq!(contexts.len(), 2);

        let shop = contexts.get("/shop").unwrap();
        assert_eq!(
            shop.attribute(CONTAINER_INCLUDE_JAR_PATTERN_ATTRIBUTE),
            Some(CONTAINER_INCLUDE_JAR_PATTERN)
        );
        assert_eq!(body_at(&shop, "/shop/index.html").await, (StatusCode::OK, "shop".to_string()));

        // Unchanged apps are left alone.
        assert!(manager.scan().unwrap().is_empty());
    }

    #[tokio::test]
    async fn descriptors_layer_over_defaults() {
        let apps = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let shop = app_dir(apps.path(), "shop", "shop");
        fs::write(
            shop.join(APP_DESCRIPTOR),
            r#"
            [[servlets]]
            servlet = "text"
            path_spec = "/hello"

            [servlets.init_parameters]
            content = "hi"
            "#,
        )
        .unwrap();
        let defaults = work.path().join("defaults.toml");
        fs::write(
            &defaults,
            r#"
            max_inactive_interval = 42

            [init_parameters]
            theme = "plain"
            "#,
        )
        .unwrap();

        let contexts = ContextCollection::new();
        let manager = new_deployment_manager(contexts.clone(), apps.path(), Some(defaults))
            .unwrap()
            .with_work_dir(work.path().join("work"));
        manager.scan().unwrap();

        let context = contexts.get("/shop").unwrap();
        assert_eq!(context.init_parameter("theme"), Some("plain"));
        assert_eq!(context.sessions().max_inactive(), Some(Duration::from_secs(42)));
        assert_eq!(body_at(&context, "/shop/hello").await.1, "hi");
    }

    #[test]
    fn redeploys_on_change_and_undeploys_on_removal() {
        let apps = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let shop = app_dir(apps.path(), "shop", "shop");
        let (manager, contexts) = manager(apps.path(), work.path());
        manager.scan().unwrap();
        let first = contexts.get("/shop").unwrap();

        fs::write(shop.join(APP_DESCRIPTOR), "[init_parameters]\nversion = \"2\"\n").unwrap();
        bump_mtime(&shop.join(APP_DESCRIPTOR));
        let report = manager.scan().unwrap();
        assert_eq!(report.redeployed, vec!["shop"]);
        let second = contexts.get("/shop").unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.init_parameter("version"), Some("2"));

        fs::remove_dir_all(&shop).unwrap();
        let report = manager.scan().unwrap();
        assert_eq!(report.undeployed, vec!["shop"]);
        assert!(contexts.is_empty());
    }

    #[test]
    fn broken_redeploy_keeps_previous_context() {
        let apps = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let shop = app_dir(apps.path(), "shop", "shop");
        let (manager, contexts) = manager(apps.path(), work.path());
        manager.scan().unwrap();

        fs::write(shop.join(APP_DESCRIPTOR), "[[servlets]]\nservlet = \"missing\"\n").unwrap();
        bump_mtime(&shop.join(APP_DESCRIPTOR));
        let report = manager.scan().unwrap();
        assert_eq!(report.failed, vec!["shop"]);
        assert!(contexts.get("/shop").is_some());

        // Not retried until it changes again.
        assert!(manager.scan().unwrap().is_empty());
    }

    #[tokio::test]
    async fn extracts_archives_into_work_dir() {
        let apps = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();

        let archive = apps.path().join("blog.tar.gz");
        write_tar_gz(&archive, "blog");

        let (manager, contexts) = manager(apps.path(), work.path());
        assert_eq!(manager.scan().unwrap().deployed, vec!["blog"]);
        let extracted = extraction_dirs(work.path(), "blog");
        assert_eq!(extracted.len(), 1);
        assert!(extracted[0].join("index.html").is_file());

        let blog = contexts.get("/blog").unwrap();
        assert_eq!(body_at(&blog, "/blog/index.html").await.1, "blog");

        fs::remove_file(&archive).unwrap();
        assert_eq!(manager.scan().unwrap().undeployed, vec!["blog"]);
        assert!(extraction_dirs(work.path(), "blog").is_empty());
    }

    #[tokio::test]
    async fn corrupt_archive_redeploy_keeps_serving_old_files() {
        let apps = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let archive = apps.path().join("shop.tgz");
        write_tar_gz(&archive, "shop v1");

        let (manager, contexts) = manager(apps.path(), work.path());
        assert_eq!(manager.scan().unwrap().deployed, vec!["shop"]);
        let first = extraction_dirs(work.path(), "shop");

        fs::write(&archive, "definitely not gzip").unwrap();
        bump_mtime(&archive);
        let report = manager.scan().unwrap();
        assert_eq!(report.failed, vec!["shop"]);

        let shop = contexts.get("/shop").unwrap();
        assert_eq!(
            body_at(&shop, "/shop/index.html").await,
            (StatusCode::OK, "shop v1".to_string())
        );
        assert_eq!(extraction_dirs(work.path(), "shop"), first);

        // A good archive replaces the old extraction.
        write_tar_gz(&archive, "shop v2");
        bump_mtime(&archive);
        assert_eq!(manager.scan().unwrap().redeployed, vec!["shop"]);
        let second = extraction_dirs(work.path(), "shop");
        assert_eq!(second.len(), 1);
        assert_ne!(second, first);
        let shop = contexts.get("/shop").unwrap();
        assert_eq!(body_at(&shop, "/shop/index.html").await.1, "shop v2");
    }

    #[tokio::test]
    async fn root_app_shadows_and_restores_main_context() {
        let apps = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let main_dir = tempfile::tempdir().unwrap();
        fs::write(main_dir.path().join("index.html"), "main").unwrap();

        let (manager, contexts) = manager(apps.path(), work.path());
        let main = assemble_context(
            ContextConfig::new(main_dir.path())
                .context_path("/")
                .parent(contexts.clone()),
            &ComponentRegistry::with_builtins(),
        )
        .unwrap();

        let root = app_dir(apps.path(), "ROOT", "hot root");
        assert_eq!(manager.scan().unwrap().deployed, vec!["ROOT"]);
        let deployed = contexts.get("/").unwrap();
        assert!(!Arc::ptr_eq(&deployed, &main));
        assert_eq!(body_at(&deployed, "/index.html").await.1, "hot root");

        fs::remove_dir_all(&root).unwrap();
        assert_eq!(manager.scan().unwrap().undeployed, vec!["ROOT"]);
        assert_eq!(contexts.len(), 1);
        let restored = contexts.get("/").unwrap();
        assert!(Arc::ptr_eq(&restored, &main));
        assert_eq!(body_at(&restored, "/index.html").await.1, "main");
    }

    #[test]
    fn undeploy_leaves_foreign_context_at_same_path() {
        let apps = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let shop = app_dir(apps.path(), "shop", "shop");

        let (manager, contexts) = manager(apps.path(), work.path());
        manager.scan().unwrap();

        // Something else takes over the path after the deploy.
        let foreign = assemble_context(
            ContextConfig::new(other.path())
                .context_path("/shop")
                .parent(contexts.clone()),
            &ComponentRegistry::with_builtins(),
        )
        .unwrap();

        fs::remove_dir_all(&shop).unwrap();
        assert_eq!(manager.scan().unwrap().undeployed, vec!["shop"]);
        assert!(Arc::ptr_eq(&contexts.get("/shop").unwrap(), &foreign));
    }

    #[test]
    fn directory_shadows_archive() {
        let apps = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        app_dir(apps.path(), "shop", "dir");
        fs::write(apps.path().join("shop.tgz"), "not read").unwrap();

        let (manager, _) = manager(apps.path(), work.path());
        let report = manager.scan().unwrap();
        assert_eq!(report.deployed, vec!["shop"]);
        assert!(report.failed.is_empty());
    }

    #[tokio::test]
    async fn start_and_stop_watching() {
        let apps = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let (manager, contexts) = manager(apps.path(), work.path());

        assert!(manager.start().await.unwrap().is_empty());
        assert!(manager.is_running());

        app_dir(apps.path(), "late", "late");
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        while contexts.get("/late").is_none() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(contexts.get("/late").is_some());

        manager.stop();
        assert!(!manager.is_running());
        assert!(work.path().exists());
    }
}
