//! Service-scoped configuration files
//!
//! `ConfigStore` resolves a (service, configuration) pair to a file, picks the
//! codec by extension and serializes access to each file. Each service keeps
//! its files either under an explicit location or under `<root>/<service>`.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::codecs::{CodecError, CodecResult};
use crate::logging::{NoOpLogger, SharedLogger};
use crate::registry::CodecRegistry;
use crate::types::{ConfigTree, DEFAULT_UID};
use crate::{log_debug, log_info};

/// Where a service's files live and the uid its trees carry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceScope {
    /// Directory holding the service's files, `<root>/<service>` when unset
    pub location: Option<PathBuf>,
    pub uid: String,
}

impl ServiceScope {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            location: None,
            uid: uid.into(),
        }
    }

    pub fn with_location(mut self, location: impl Into<PathBuf>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl Default for ServiceScope {
    fn default() -> Self {
        Self::new(DEFAULT_UID)
    }
}

/// Loads and saves configuration files on behalf of services
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use configtree_core::logging::NoOpLogger;
/// use configtree_core::registry::CodecRegistry;
/// use configtree_core::store::{ConfigStore, ServiceScope};
///
/// let registry = Arc::new(CodecRegistry::with_defaults(NoOpLogger::shared()));
/// let store = ConfigStore::new("/var/lib/configs", registry);
/// store.register_scope("billing", ServiceScope::new("5f0c7a9e2b1d4c3e8f6a0b9c7d2e1f30"));
///
/// let tree = store.load("billing", "limits.toml").unwrap();
/// store.save("billing", "limits.toml", &tree).unwrap();
/// ```
pub struct ConfigStore {
    root: PathBuf,
    registry: Arc<CodecRegistry>,
    scopes: RwLock<HashMap<String, ServiceScope>>,
    /// One mutex per resolved file, so the map is bounded by the number of
    /// distinct configurations this store has touched
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
    logger: SharedLogger,
}

impl ConfigStore {
    pub fn new(root: impl Into<PathBuf>, registry: Arc<CodecRegistry>) -> Self {
        Self {
            root: root.into(),
            registry,
            scopes: RwLock::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
            logger: NoOpLogger::shared(),
        }
    }

    pub fn with_logger(mut self, logger: SharedLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Register or replace a service's scope
    pub fn register_scope(&self, service: &str, scope: ServiceScope) {
        log_info!(self.logger, "Registered scope for service '{}' (uid {})", service, scope.uid);
        self.scopes.write().insert(service.to_string(), scope);
    }

    /// Scope of a service, the default scope when unregistered
    pub fn scope(&self, service: &str) -> ServiceScope {
        self.scopes.read().get(service).cloned().unwrap_or_default()
    }

    /// File backing a configuration of a service
    ///
    /// Both names must be single path components, and the configuration's
    /// extension must have a codec.
    pub fn resolve_path(&self, service: &str, configuration: &str) -> CodecResult<PathBuf> {
        check_component("service", service)?;
        check_component("configuration", configuration)?;

        let directory = match self.scope(service).location {
            Some(location) => location,
            None => self.root.join(service),
        };
        let path = directory.join(configuration);
        if !self.registry.supports(extension_of(&path).as_str()) {
            return Err(CodecError::UnknownFormat(extension_of(&path)));
        }
        Ok(path)
    }

    /// Load a configuration, stamping it with the service's uid
    pub fn load(&self, service: &str, configuration: &str) -> CodecResult<ConfigTree> {
        let path = self.resolve_path(service, configuration)?;
        let codec = self.registry.for_path(&path)?;

        let lock = self.lock_for(&path);
        let _guard = lock.lock();
        let mut tree = codec.load(&path)?;
        tree.uid = self.scope(service).uid;

        log_debug!(self.logger, "Loaded {}:{} from {}", service, configuration, path.display());
        Ok(tree)
    }

    /// Save a configuration that carries the service's uid
    ///
    /// The service directory is created when missing.
    pub fn save(&self, service: &str, configuration: &str, tree: &ConfigTree) -> CodecResult<()> {
        let expected = self.scope(service).uid;
        if tree.uid != expected {
            return Err(CodecError::UidMismatch {
                expected,
                found: tree.uid.clone(),
            });
        }

        let path = self.resolve_path(service, configuration)?;
        let codec = self.registry.for_path(&path)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| CodecError::io(parent, e))?;
        }

        let lock = self.lock_for(&path);
        let _guard = lock.lock();
        codec.save(&path, tree)?;

        log_debug!(self.logger, "Saved {}:{} to {}", service, configuration, path.display());
        Ok(())
    }

    /// Copy a configuration file to `<file>.backup`
    ///
    /// Returns `None` when there is nothing to back up.
    pub fn backup(&self, service: &str, configuration: &str) -> CodecResult<Option<PathBuf>> {
        let path = self.resolve_path(service, configuration)?;

        let lock = self.lock_for(&path);
        let _guard = lock.lock();
        if !path.exists() {
            return Ok(None);
        }

        let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
        name.push(".backup");
        let backup_path = path.with_file_name(name);
        fs::copy(&path, &backup_path).map_err(|e| CodecError::io(&backup_path, e))?;

        log_info!(self.logger, "Backed up {} to {}", path.display(), backup_path.display());
        Ok(Some(backup_path))
    }

    fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(path.to_path_buf()).or_default())
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("root", &self.root)
            .field("services", &self.scopes.read().len())
            .field("registry", &self.registry)
            .finish()
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

/// Reject names that would escape or nest inside the service directory
fn check_component(kind: &str, name: &str) -> CodecResult<()> {
    let mut components = Path::new(name).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if single_normal && !name.contains(['/', '\\']) {
        Ok(())
    } else {
        Err(CodecError::Shape {
            path: name.to_string(),
            message: format!("{} name must be a single file name", kind),
        })
    }
}
