//! Durable key-value media backing the persisted world documents.

use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    fmt, fs, io,
    path::{Path, PathBuf},
    rc::Rc,
};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use world_of_bits_core::Document;

/// File extension appended to document names by [`FileStorage`].
const DOCUMENT_EXTENSION: &str = "json";

/// Key-value medium storing whole documents under fixed names.
///
/// Implementations use interior mutability so a single medium can be shared
/// by every store of a world through an `Rc`.
pub trait Storage: fmt::Debug {
    /// Reads the document stored under `name`, if any.
    fn read(&self, name: &str) -> Result<Option<String>, StorageError>;

    /// Replaces the document stored under `name`.
    fn write(&self, name: &str, contents: &str) -> Result<(), StorageError>;

    /// Deletes the document stored under `name`. Missing documents are not an error.
    fn remove(&self, name: &str) -> Result<(), StorageError>;
}

/// Failures reported by a [`Storage`] medium.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The medium refused the operation.
    #[error("storage is unavailable for document `{name}`")]
    Unavailable {
        /// Document being accessed.
        name: String,
    },
    /// An I/O error occurred while touching the document.
    #[error("i/o failure on document `{name}`")]
    Io {
        /// Document being accessed.
        name: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

/// Whether a mutation reached the storage medium.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Durability {
    /// The new state was written, or nothing needed writing.
    Persisted,
    /// The write failed; only the in-memory state holds the change.
    Volatile,
}

impl Durability {
    /// Combines two write results; the pair is durable only if both are.
    #[must_use]
    pub const fn and(self, other: Durability) -> Durability {
        match (self, other) {
            (Self::Persisted, Self::Persisted) => Self::Persisted,
            _ => Self::Volatile,
        }
    }
}

/// In-memory medium, mirroring a browser's local storage.
#[derive(Debug)]
pub struct MemoryStorage {
    documents: RefCell<BTreeMap<String, String>>,
    writable: Cell<bool>,
}

impl MemoryStorage {
    /// Creates an empty, writable medium.
    #[must_use]
    pub fn new() -> Self {
        Self {
            documents: RefCell::new(BTreeMap::new()),
            writable: Cell::new(true),
        }
    }

    /// Toggles whether writes and removals succeed, emulating a full or
    /// revoked storage quota.
    pub fn set_writable(&self, writable: bool) {
        self.writable.set(writable);
    }

    /// Stores a raw document, bypassing the writable flag.
    pub fn insert_raw(&self, name: &str, contents: &str) {
        let _ = self
            .documents
            .borrow_mut()
            .insert(name.to_owned(), contents.to_owned());
    }

    /// Returns a copy of the raw document stored under `name`.
    #[must_use]
    pub fn raw(&self, name: &str) -> Option<String> {
        self.documents.borrow().get(name).cloned()
    }

    fn ensure_writable(&self, name: &str) -> Result<(), StorageError> {
        if self.writable.get() {
            Ok(())
        } else {
            Err(StorageError::Unavailable {
                name: name.to_owned(),
            })
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn read(&self, name: &str) -> Result<Option<String>, StorageError> {
        Ok(self.raw(name))
    }

    fn write(&self, name: &str, contents: &str) -> Result<(), StorageError> {
        self.ensure_writable(name)?;
        self.insert_raw(name, contents);
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), StorageError> {
        self.ensure_writable(name)?;
        let _ = self.documents.borrow_mut().remove(name);
        Ok(())
    }
}

/// Directory-backed medium storing each document as `<name>.json`.
#[derive(Clone, Debug)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Creates a medium rooted at the provided directory. The directory is
    /// created lazily on the first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the documents.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.{DOCUMENT_EXTENSION}"))
    }
}

impl Storage for FileStorage {
    fn read(&self, name: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(name)) {
            Ok(contents) => Ok(Some(contents)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io {
                name: name.to_owned(),
                source,
            }),
        }
    }

    fn write(&self, name: &str, contents: &str) -> Result<(), StorageError> {
        let io_error = |source| StorageError::Io {
            name: name.to_owned(),
            source,
        };
        fs::create_dir_all(&self.root).map_err(io_error)?;

        // Write-then-rename keeps the previous document intact if the write dies halfway.
        let target = self.path_for(name);
        let staging = target.with_extension("tmp");
        fs::write(&staging, contents).map_err(io_error)?;
        fs::rename(&staging, &target).map_err(io_error)
    }

    fn remove(&self, name: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(name)) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io {
                name: name.to_owned(),
                source,
            }),
        }
    }
}

/// Binding between one world document and an optional medium.
///
/// Every failure is swallowed here and reported as a warning.
#[derive(Clone, Debug)]
pub(crate) struct DocumentSlot {
    storage: Option<Rc<dyn Storage>>,
    document: Document,
}

impl DocumentSlot {
    /// Slot that never touches a medium.
    pub(crate) fn detached(document: Document) -> Self {
        Self {
            storage: None,
            document,
        }
    }

    /// Slot persisting through the provided medium.
    pub(crate) fn attached(storage: Rc<dyn Storage>, document: Document) -> Self {
        Self {
            storage: Some(storage),
            document,
        }
    }

    pub(crate) fn document(&self) -> Document {
        self.document
    }

    /// Reads the raw document; unreadable media count as an absent document.
    pub(crate) fn load(&self) -> Option<String> {
        let storage = self.storage.as_ref()?;
        match storage.read(self.document.name()) {
            Ok(Some(contents)) => Some(contents),
            Ok(None) => {
                debug!(document = self.document.name(), "no persisted document");
                None
            }
            Err(error) => {
                warn!(
                    document = self.document.name(),
                    %error,
                    "failed to read persisted document; starting empty"
                );
                None
            }
        }
    }

    pub(crate) fn save<T: Serialize>(&self, value: &T) -> Durability {
        let Some(storage) = self.storage.as_ref() else {
            return Durability::Persisted;
        };
        let contents = match serde_json::to_string(value) {
            Ok(contents) => contents,
            Err(error) => {
                warn!(document = self.document.name(), %error, "failed to encode document");
                return Durability::Volatile;
            }
        };
        match storage.write(self.document.name(), &contents) {
            Ok(()) => Durability::Persisted,
            Err(error) => {
                warn!(
                    document = self.document.name(),
                    %error,
                    "failed to persist document; keeping in-memory state"
                );
                Durability::Volatile
            }
        }
    }

    pub(crate) fn discard(&self) -> Durability {
        let Some(storage) = self.storage.as_ref() else {
            return Durability::Persisted;
        };
        match storage.remove(self.document.name()) {
            Ok(()) => Durability::Persisted,
            Err(error) => {
                warn!(
                    document = self.document.name(),
                    %error,
                    "failed to remove persisted document"
                );
                Durability::Volatile
            }
        }
    }
}
