//! Request options.
//!
//! [`ReplConfig`] is the data-only part and can come from JSON, YAML or a
//! string-keyed map; unknown keys are dropped without complaint.
//! [`ReplOptions`] adds the function-valued options (init actions, loader,
//! file reader). [`ReplOptions::normalize`] turns them into the
//! [`RequestOptions`] a single request runs with.

use std::{fmt, future::Future, sync::Arc};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::backend::{FileReader, Loader};
use crate::errors::ReplError;
use crate::loader::{FsReader, NullLoader, PathLoader};
use crate::session::ModuleIndex;
use crate::syntax::{Form, Symbol};

// ============================================================================
// DATA OPTIONS
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    #[default]
    Browser,
    Nodejs,
}

/// Options that are plain data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ReplConfig {
    pub verbose: bool,
    pub warning_as_error: bool,
    pub target: Target,
    pub src_paths: Vec<String>,
}

impl ReplConfig {
    pub fn from_json(text: &str) -> Result<Self, ReplError> {
        serde_json::from_str(text)
            .map_err(|e| ReplError::config(format!("Invalid JSON options: {}", e)))
    }

    pub fn from_yaml(text: &str) -> Result<Self, ReplError> {
        serde_yaml::from_str(text)
            .map_err(|e| ReplError::config(format!("Invalid YAML options: {}", e)))
    }

    pub fn from_map(map: serde_json::Map<String, serde_json::Value>) -> Result<Self, ReplError> {
        serde_json::from_value(serde_json::Value::Object(map))
            .map_err(|e| ReplError::config(format!("Invalid options: {}", e)))
    }
}

// ============================================================================
// INIT ACTIONS
// ============================================================================

/// What init actions are run against.
#[derive(Debug, Clone, PartialEq)]
pub struct InitData {
    pub form: Form,
    pub ns: Symbol,
    pub target: Target,
}

pub type InitFn = Arc<dyn Fn(InitData) -> BoxFuture<'static, ()> + Send + Sync>;

// ============================================================================
// FULL OPTIONS
// ============================================================================

#[derive(Clone, Default)]
pub struct ReplOptions {
    pub config: ReplConfig,
    pub init_fns: Vec<InitFn>,
    pub load_fn: Option<Arc<dyn Loader>>,
    pub read_file_fn: Option<Arc<dyn FileReader>>,
}

impl fmt::Debug for ReplOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplOptions")
            .field("config", &self.config)
            .field("init_fns", &self.init_fns.len())
            .field("load_fn", &self.load_fn.is_some())
            .field("read_file_fn", &self.read_file_fn.is_some())
            .finish()
    }
}

impl From<ReplConfig> for ReplOptions {
    fn from(config: ReplConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }
}

impl ReplOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }

    pub fn warning_as_error(mut self, strict: bool) -> Self {
        self.config.warning_as_error = strict;
        self
    }

    pub fn target(mut self, target: Target) -> Self {
        self.config.target = target;
        self
    }

    pub fn src_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.src_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Append an init action. Actions run in the order they were added.
    pub fn init_fn<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(InitData) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.init_fns
            .push(Arc::new(move |data| Box::pin(f(data)) as BoxFuture<'static, ()>));
        self
    }

    pub fn load_fn(mut self, loader: Arc<dyn Loader>) -> Self {
        self.load_fn = Some(loader);
        self
    }

    pub fn read_file_fn(mut self, reader: Arc<dyn FileReader>) -> Self {
        self.read_file_fn = Some(reader);
        self
    }

    /// Merge target defaults and decide where modules come from.
    pub fn normalize(&self) -> Result<RequestOptions, ReplError> {
        let config = self.config.clone();
        let reader = match (&self.read_file_fn, config.target) {
            (Some(reader), _) => Some(Arc::clone(reader)),
            (None, Target::Nodejs) => Some(Arc::new(FsReader) as Arc<dyn FileReader>),
            (None, Target::Browser) => None,
        };

        let loader = match (&self.load_fn, &reader) {
            (Some(loader), _) => LoaderSource::Custom(Arc::clone(loader)),
            (None, Some(reader)) if !config.src_paths.is_empty() => LoaderSource::Paths {
                reader: Arc::clone(reader),
                src_paths: config.src_paths.clone(),
            },
            (None, Some(_)) if self.read_file_fn.is_some() => {
                return Err(ReplError::config(
                    "Invalid options: :read-file-fn! requires :src-paths to build a load function",
                ))
            }
            _ => LoaderSource::Nothing,
        };

        Ok(RequestOptions {
            config,
            init_fns: self.init_fns.clone(),
            reader,
            loader,
        })
    }
}

// ============================================================================
// NORMALIZED OPTIONS
// ============================================================================

/// Where module sources come from.
#[derive(Clone)]
pub enum LoaderSource {
    Custom(Arc<dyn Loader>),
    Paths {
        reader: Arc<dyn FileReader>,
        src_paths: Vec<String>,
    },
    Nothing,
}

/// Options of one request, after normalization.
#[derive(Clone)]
pub struct RequestOptions {
    pub config: ReplConfig,
    pub init_fns: Vec<InitFn>,
    pub reader: Option<Arc<dyn FileReader>>,
    pub loader: LoaderSource,
}

impl RequestOptions {
    pub fn verbose(&self) -> bool {
        self.config.verbose
    }

    pub fn warning_as_error(&self) -> bool {
        self.config.warning_as_error
    }

    pub fn target(&self) -> Target {
        self.config.target
    }

    pub fn src_paths(&self) -> &[String] {
        &self.config.src_paths
    }

    /// The loader handed to the backend, seeing `index` for Closure modules.
    pub fn loader(&self, index: ModuleIndex) -> Arc<dyn Loader> {
        match &self.loader {
            LoaderSource::Custom(loader) => Arc::clone(loader),
            LoaderSource::Paths { reader, src_paths } => Arc::new(
                PathLoader::new(Arc::clone(reader), src_paths.clone(), index)
                    .verbose(self.verbose()),
            ),
            LoaderSource::Nothing => Arc::new(NullLoader),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_json_keys_are_dropped() {
        let config = ReplConfig::from_json(
            r#"{"verbose": true, "warning-as-error": true, "target": "nodejs",
                "src-paths": ["src"], "colour": "red", "foo-fn!": 3}"#,
        )
        .unwrap();
        assert_eq!(
            config,
            ReplConfig {
                verbose: true,
                warning_as_error: true,
                target: Target::Nodejs,
                src_paths: vec!["src".into()],
            }
        );
    }

    #[test]
    fn yaml_defaults_fill_missing_keys() {
        let config = ReplConfig::from_yaml("verbose: true\nmystery: 1\n").unwrap();
        assert!(config.verbose);
        assert!(!config.warning_as_error);
        assert_eq!(config.target, Target::Browser);
        assert!(config.src_paths.is_empty());
    }

    #[test]
    fn map_options_ignore_unrecognized_keys() {
        let mut map = serde_json::Map::new();
        map.insert("warning-as-error".into(), serde_json::Value::Bool(true));
        map.insert("unknown".into(), serde_json::Value::Null);
        let config = ReplConfig::from_map(map).unwrap();
        assert!(config.warning_as_error);
    }

    #[test]
    fn badly_typed_option_is_a_config_error() {
        let err = ReplConfig::from_json(r#"{"verbose": "yes"}"#).unwrap_err();
        assert!(matches!(err, ReplError::Config { .. }));
    }

    #[test]
    fn browser_without_reader_has_no_loader() {
        let opts = ReplOptions::new().normalize().unwrap();
        assert!(matches!(opts.loader, LoaderSource::Nothing));
        assert!(opts.reader.is_none());
    }

    #[test]
    fn nodejs_defaults_to_filesystem_reader() {
        let opts = ReplOptions::new()
            .target(Target::Nodejs)
            .src_paths(["src"])
            .normalize()
            .unwrap();
        assert!(opts.reader.is_some());
        assert!(matches!(opts.loader, LoaderSource::Paths { .. }));
    }

    #[test]
    fn reader_without_src_paths_is_rejected() {
        let opts = ReplOptions::new().read_file_fn(Arc::new(FsReader));
        assert!(matches!(opts.normalize(), Err(ReplError::Config { .. })));
    }

    #[test]
    fn init_fns_keep_their_order() {
        let opts = ReplOptions::new()
            .init_fn(|_| async {})
            .init_fn(|_| async {});
        assert_eq!(opts.normalize().unwrap().init_fns.len(), 2);
    }
}
