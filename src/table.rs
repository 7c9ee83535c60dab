use std::fs::File;
use std::path::Path;
use crate::association::{Association, FileFacts, Mask};
use crate::builder::{AssociationBuilder, BuildResult};
use crate::error::{AssocError, BuildError, Result};
use crate::reader;

/// In-memory table of associations, filled by the reader.
///
/// Associations keep their declaration order; the first one that accepts a
/// file decides its command.
#[derive(Debug, Default)]
pub struct AssociationTable {
    associations: Vec<Association>,
    pending: Option<Association>,
}

impl AssociationTable {
    /// Reads the associations file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let mut file = File::open(path).map_err(|e| AssocError::File {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut table = Self::default();
        reader::read(&mut file, &mut table)?;
        tracing::debug!("loaded {} association(s) from {}", table.len(), path.display());
        Ok(table)
    }

    pub fn associations(&self) -> &[Association] {
        &self.associations
    }

    pub fn len(&self) -> usize {
        self.associations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.associations.is_empty()
    }

    /// Returns the command of the first association accepting `file`.
    pub fn command_for(&self, file: &FileFacts) -> Option<&str> {
        self.associations
            .iter()
            .find(|a| a.accepts(file))
            .map(|a| a.command.as_str())
    }

    fn current(
        &mut self,
        element: &'static str,
    ) -> std::result::Result<&mut Association, BuildError> {
        self.pending.as_mut().ok_or(BuildError::OutsideAssociation(element))
    }
}

impl AssociationBuilder for AssociationTable {
    fn start_building(&mut self) -> BuildResult {
        self.pending = None;
        Ok(())
    }

    fn start_association(&mut self, command: &str) -> BuildResult {
        if command.trim().is_empty() {
            return Err(BuildError::EmptyCommand);
        }
        if let Some(current) = &self.pending {
            return Err(BuildError::NestedAssociation {
                current: current.command.clone(),
                next: command.to_string(),
            });
        }
        self.pending = Some(Association::new(command));
        Ok(())
    }

    fn set_mask(&mut self, mask: &str, case_sensitive: bool) -> BuildResult {
        let compiled = Mask::new(mask, case_sensitive)?;
        self.current(reader::ELEMENT_MASK)?.mask = Some(compiled);
        Ok(())
    }

    fn set_is_hidden(&mut self, value: bool) -> BuildResult {
        self.current(reader::ELEMENT_IS_HIDDEN)?.is_hidden = Some(value);
        Ok(())
    }

    fn set_is_symlink(&mut self, value: bool) -> BuildResult {
        self.current(reader::ELEMENT_IS_SYMLINK)?.is_symlink = Some(value);
        Ok(())
    }

    fn set_is_readable(&mut self, value: bool) -> BuildResult {
        self.current(reader::ELEMENT_IS_READABLE)?.is_readable = Some(value);
        Ok(())
    }

    fn set_is_writable(&mut self, value: bool) -> BuildResult {
        self.current(reader::ELEMENT_IS_WRITABLE)?.is_writable = Some(value);
        Ok(())
    }

    fn set_is_executable(&mut self, value: bool) -> BuildResult {
        self.current(reader::ELEMENT_IS_EXECUTABLE)?.is_executable = Some(value);
        Ok(())
    }

    fn end_association(&mut self) -> BuildResult {
        let association = self
            .pending
            .take()
            .ok_or(BuildError::OutsideAssociation(reader::ELEMENT_ASSOCIATION))?;
        if association.mask.is_none() {
            return Err(BuildError::MissingMask { command: association.command });
        }
        self.associations.push(association);
        Ok(())
    }

    fn end_building(&mut self) -> BuildResult {
        if let Some(unfinished) = self.pending.take() {
            tracing::warn!("discarding unterminated association for '{}'", unfinished.command);
        }
        Ok(())
    }
}
