//! Configuration template store.
//!
//! Templates are `.txt` files below one root directory, optionally grouped
//! in subdirectories. Every path handed to the store is relative to that
//! root and may not leave it.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info};

use crate::error::TemplateError;

/// Default template root, relative to the working directory.
pub const DEFAULT_TEMPLATE_DIR: &str = "conf_templates";

const EXTENSION: &str = "txt";

/// One node of the template tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateEntry {
    File {
        name: String,
        path: PathBuf,
    },
    Directory {
        name: String,
        path: PathBuf,
        children: Vec<TemplateEntry>,
    },
}

impl TemplateEntry {
    pub fn name(&self) -> &str {
        match self {
            Self::File { name, .. } | Self::Directory { name, .. } => name,
        }
    }

    /// Path relative to the store root.
    pub fn path(&self) -> &Path {
        match self {
            Self::File { path, .. } | Self::Directory { path, .. } => path,
        }
    }
}

/// Template files under a root directory.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    root: PathBuf,
}

impl TemplateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, relative: &str) -> Result<PathBuf, TemplateError> {
        let path = Path::new(relative.trim());
        if path.as_os_str().is_empty() {
            return Err(TemplateError::InvalidPath(relative.to_string()));
        }
        for component in path.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(TemplateError::InvalidPath(relative.to_string()))
                }
            }
        }
        Ok(self.root.join(path))
    }

    fn not_found(relative: &str) -> impl FnOnce(io::Error) -> TemplateError + '_ {
        move |e| {
            if e.kind() == io::ErrorKind::NotFound {
                TemplateError::NotFound(relative.to_string())
            } else {
                TemplateError::Io(e)
            }
        }
    }

    /// Write a template, creating parent directories.
    pub fn save(&self, relative: &str, content: &str) -> Result<(), TemplateError> {
        let path = self.resolve(relative)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        info!(template = relative, "template saved");
        Ok(())
    }

    pub fn load(&self, relative: &str) -> Result<String, TemplateError> {
        let path = self.resolve(relative)?;
        fs::read_to_string(path).map_err(Self::not_found(relative))
    }

    /// Create a (possibly nested) template directory.
    pub fn create_dir(&self, relative: &str) -> Result<(), TemplateError> {
        let path = self.resolve(relative)?;
        fs::create_dir_all(path)?;
        Ok(())
    }

    /// The template tree: directories and `.txt` files, sorted by name.
    /// A missing root is an empty tree.
    pub fn list(&self) -> Result<Vec<TemplateEntry>, TemplateError> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        self.list_dir(Path::new(""))
    }

    fn list_dir(&self, relative: &Path) -> Result<Vec<TemplateEntry>, TemplateError> {
        let mut names: Vec<String> = fs::read_dir(self.root.join(relative))?
            .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
            .collect::<io::Result<_>>()?;
        names.sort();

        let mut entries = Vec::new();
        for name in names {
            let path = relative.join(&name);
            let full = self.root.join(&path);
            if full.is_dir() {
                let children = self.list_dir(&path)?;
                entries.push(TemplateEntry::Directory {
                    name,
                    path,
                    children,
                });
            } else if full.extension().is_some_and(|ext| ext == EXTENSION) {
                entries.push(TemplateEntry::File { name, path });
            }
        }
        Ok(entries)
    }

    /// Delete a template file or an empty directory.
    pub fn delete(&self, relative: &str) -> Result<(), TemplateError> {
        let path = self.resolve(relative)?;
        if path.is_dir() {
            fs::remove_dir(&path)?;
        } else {
            fs::remove_file(&path).map_err(Self::not_found(relative))?;
        }
        info!(template = relative, "template deleted");
        Ok(())
    }

    /// Move a template or directory, creating the destination's parents.
    pub fn rename(&self, from: &str, to: &str) -> Result<(), TemplateError> {
        let source = self.resolve(from)?;
        let target = self.resolve(to)?;
        if !source.exists() {
            return Err(TemplateError::NotFound(from.to_string()));
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&source, &target)?;
        debug!(from, to, "template renamed");
        Ok(())
    }
}

impl Default for TemplateStore {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE_DIR)
    }
}
