//! Module resolution and class scanning.
//!
//! A plugin binary compiles its modules in and registers each one by path
//! with a [`StaticModuleResolver`]. The [`ModuleClassScanner`] resolves a
//! path to a [`PluginModule`], lists the classes it exports and classifies
//! them by marker.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::class::ClassDef;
use crate::contract::Marker;
use crate::error::PluginError;

/// Name under which a module's default export is listed.
pub const DEFAULT_EXPORT: &str = "default";

/// A single exported binding.
#[derive(Debug, Clone)]
pub enum Export {
    Class(ClassDef),
    /// A non-class binding (constants, configuration). Never classified.
    Value(Value),
}

/// The export table of one plugin module.
#[derive(Debug, Clone, Default)]
pub struct PluginModule {
    exports: Vec<(String, Export)>,
}

impl PluginModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Export a class under `name`.
    pub fn export(mut self, name: impl Into<String>, class: ClassDef) -> Self {
        self.exports.push((name.into(), Export::Class(class)));
        self
    }

    /// Export a class as the module's default export.
    pub fn export_default(self, class: ClassDef) -> Self {
        self.export(DEFAULT_EXPORT, class)
    }

    /// Export a plain value.
    pub fn export_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.exports.push((name.into(), Export::Value(value)));
        self
    }

    /// All bindings in declaration order.
    pub fn exports(&self) -> impl Iterator<Item = (&str, &Export)> {
        self.exports.iter().map(|(n, e)| (n.as_str(), e))
    }
}

/// Builds a module; may fail like an import with a missing dependency.
pub type ModuleFactory =
    Arc<dyn Fn() -> Result<PluginModule, PluginError> + Send + Sync>;

/// Resolves a module path to its export table.
pub trait ModuleResolver: Send + Sync {
    fn resolve(&self, path: &str) -> Result<PluginModule, PluginError>;
}

/// A resolver over modules compiled into the plugin binary.
///
/// Paths are normalized so `tools/echo`, `./tools/echo` and
/// `tools/echo.rs` all name the same module.
#[derive(Clone, Default)]
pub struct StaticModuleResolver {
    modules: HashMap<String, ModuleFactory>,
}

impl StaticModuleResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module that always resolves.
    pub fn module(self, path: &str, module: PluginModule) -> Self {
        self.module_fn(path, move || Ok(module.clone()))
    }

    /// Register a module built by `factory` on each resolution.
    pub fn module_fn<F>(mut self, path: &str, factory: F) -> Self
    where
        F: Fn() -> Result<PluginModule, PluginError> + Send + Sync + 'static,
    {
        self.modules.insert(normalize_path(path), Arc::new(factory));
        self
    }

    /// Registered paths, normalized.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }
}

impl fmt::Debug for StaticModuleResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut paths: Vec<_> = self.paths().collect();
        paths.sort_unstable();
        f.debug_struct("StaticModuleResolver")
            .field("modules", &paths)
            .finish()
    }
}

impl ModuleResolver for StaticModuleResolver {
    fn resolve(&self, path: &str) -> Result<PluginModule, PluginError> {
        let key = normalize_path(path);
        let factory = self.modules.get(&key).ok_or_else(|| {
            PluginError::LoadFailed(format!("cannot find module '{path}'"))
        })?;
        factory()
    }
}

fn normalize_path(path: &str) -> String {
    let mut p = path.trim();
    while let Some(rest) = p.strip_prefix("./") {
        p = rest;
    }
    for ext in [".rs", ".ts", ".js"] {
        if let Some(stem) = p.strip_suffix(ext) {
            p = stem;
            break;
        }
    }
    p.to_string()
}

/// A class found in a module.
#[derive(Debug, Clone)]
pub struct ClassInfo {
    /// Class name. For the default export this is the class's own name.
    pub name: String,
    /// Binding name the class is exported under.
    pub export_name: String,
    pub is_default: bool,
    pub class: ClassDef,
}

/// Either a path to resolve or an already-resolved module.
#[derive(Debug, Clone, Copy)]
pub enum ModuleSource<'a> {
    Path(&'a str),
    Module(&'a PluginModule),
}

impl<'a> From<&'a str> for ModuleSource<'a> {
    fn from(path: &'a str) -> Self {
        Self::Path(path)
    }
}

impl<'a> From<&'a String> for ModuleSource<'a> {
    fn from(path: &'a String) -> Self {
        Self::Path(path)
    }
}

impl<'a> From<&'a PluginModule> for ModuleSource<'a> {
    fn from(module: &'a PluginModule) -> Self {
        Self::Module(module)
    }
}

/// Lists and classifies the classes of plugin modules.
pub struct ModuleClassScanner<'r> {
    resolver: &'r dyn ModuleResolver,
}

impl<'r> ModuleClassScanner<'r> {
    pub fn new(resolver: &'r dyn ModuleResolver) -> Self {
        Self { resolver }
    }

    /// Every class exported by `source`, in export order. Resolution
    /// failure is an error.
    pub fn scan_classes<'a>(
        &self,
        source: impl Into<ModuleSource<'a>>,
    ) -> Result<Vec<ClassInfo>, PluginError> {
        match source.into() {
            ModuleSource::Module(module) => Ok(classes_of(module)),
            ModuleSource::Path(path) => {
                let module = self.resolver.resolve(path).map_err(|e| {
                    PluginError::LoadFailed(format!("error importing module {path}: {e}"))
                })?;
                Ok(classes_of(&module))
            }
        }
    }

    /// Find a class by class name, or by export name when `by_export` is
    /// set. A missing class is `Ok(None)`.
    pub fn find_class<'a>(
        &self,
        source: impl Into<ModuleSource<'a>>,
        name: &str,
        by_export: bool,
    ) -> Result<Option<ClassInfo>, PluginError> {
        Ok(self.scan_classes(source)?.into_iter().find(|info| {
            if by_export {
                info.export_name == name
            } else {
                info.name == name
            }
        }))
    }

    /// Classes carrying `marker`. Abstract classes are skipped unless
    /// `include_abstract` is set.
    pub fn find_sub_classes<'a>(
        &self,
        source: impl Into<ModuleSource<'a>>,
        marker: Marker,
        include_abstract: bool,
    ) -> Result<Vec<ClassInfo>, PluginError> {
        Ok(self
            .scan_classes(source)?
            .into_iter()
            .filter(|info| {
                info.class.has_marker(marker) && (include_abstract || !info.class.is_abstract())
            })
            .collect())
    }
}

fn classes_of(module: &PluginModule) -> Vec<ClassInfo> {
    module
        .exports()
        .filter_map(|(export_name, export)| match export {
            Export::Class(class) => {
                let is_default = export_name == DEFAULT_EXPORT;
                Some(ClassInfo {
                    name: if is_default {
                        class.name().to_string()
                    } else {
                        export_name.to_string()
                    },
                    export_name: export_name.to_string(),
                    is_default,
                    class: class.clone(),
                })
            }
            Export::Value(_) => None,
        })
        .collect()
}
