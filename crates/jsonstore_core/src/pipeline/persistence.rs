//! The durable side of a store handle: text store plus shared snapshot.

use crate::error::CoreResult;
use crate::tree::{parse_tree, render_tree, Tree};
use jsonstore_storage::TextStore;
use parking_lot::RwLock;
use std::sync::Arc;

/// Owns the text store of one handle and the last tree it committed or
/// loaded.
///
/// Readers take the snapshot (a cheap `Arc` clone) and never wait on the
/// commit worker; the worker swaps in a new snapshot after each batch.
pub struct Persistence {
    backend: Box<dyn TextStore>,
    snapshot: RwLock<Arc<Tree>>,
    minify: bool,
}

impl Persistence {
    /// Wraps a text store and loads its current content.
    ///
    /// # Errors
    ///
    /// Returns an error if the content cannot be read or parsed.
    pub fn open(backend: Box<dyn TextStore>, minify: bool) -> CoreResult<Self> {
        let tree = parse_tree(&backend.read_text()?)?;
        Ok(Self {
            backend,
            snapshot: RwLock::new(Arc::new(tree)),
            minify,
        })
    }

    /// Reads and parses the stored text as it is right now.
    ///
    /// # Errors
    ///
    /// Returns an error if the content cannot be read or parsed.
    pub fn load(&self) -> CoreResult<Tree> {
        parse_tree(&self.backend.read_text()?)
    }

    /// Renders and writes a tree.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or the write fails.
    pub fn persist(&self, tree: &Tree) -> CoreResult<()> {
        let text = render_tree(tree, self.minify)?;
        self.backend.write_text(&text)?;
        Ok(())
    }

    /// The last committed or loaded tree.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Tree> {
        Arc::clone(&self.snapshot.read())
    }

    /// Publishes a new snapshot.
    pub fn replace_snapshot(&self, tree: Tree) {
        *self.snapshot.write() = Arc::new(tree);
    }

    /// Re-reads the stored text into the snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the content cannot be read or parsed; the
    /// previous snapshot stays in place.
    pub fn reload(&self) -> CoreResult<Arc<Tree>> {
        let tree = Arc::new(self.load()?);
        *self.snapshot.write() = Arc::clone(&tree);
        Ok(tree)
    }

    /// Where the text lives.
    #[must_use]
    pub fn location(&self) -> String {
        self.backend.location()
    }
}
