use std::fmt;
use serde::Serialize;
use crate::error::BuildError;

pub type BuildResult = std::result::Result<(), BuildError>;

/// Receives association declarations as the reader encounters them.
///
/// The reader only reports what the file says; deciding what an association
/// means (and rejecting nonsensical ones) is up to the implementor. Any error
/// returned here stops the read, but `end_building` is still called.
pub trait AssociationBuilder {
    fn start_building(&mut self) -> BuildResult;
    fn start_association(&mut self, command: &str) -> BuildResult;
    fn set_mask(&mut self, mask: &str, case_sensitive: bool) -> BuildResult;
    fn set_is_hidden(&mut self, value: bool) -> BuildResult;
    fn set_is_symlink(&mut self, value: bool) -> BuildResult;
    fn set_is_readable(&mut self, value: bool) -> BuildResult;
    fn set_is_writable(&mut self, value: bool) -> BuildResult;
    fn set_is_executable(&mut self, value: bool) -> BuildResult;
    fn end_association(&mut self) -> BuildResult;
    fn end_building(&mut self) -> BuildResult;
}

/// A single builder call, as recorded by [`EventLog`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BuildEvent {
    StartBuilding,
    StartAssociation { command: String },
    SetMask { mask: String, case_sensitive: bool },
    SetIsHidden { value: bool },
    SetIsSymlink { value: bool },
    SetIsReadable { value: bool },
    SetIsWritable { value: bool },
    SetIsExecutable { value: bool },
    EndAssociation,
    EndBuilding,
}

impl fmt::Display for BuildEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartBuilding => write!(f, "start_building()"),
            Self::StartAssociation { command } => write!(f, "start_association({command:?})"),
            Self::SetMask { mask, case_sensitive } => {
                write!(f, "set_mask({mask:?}, {case_sensitive})")
            }
            Self::SetIsHidden { value } => write!(f, "set_is_hidden({value})"),
            Self::SetIsSymlink { value } => write!(f, "set_is_symlink({value})"),
            Self::SetIsReadable { value } => write!(f, "set_is_readable({value})"),
            Self::SetIsWritable { value } => write!(f, "set_is_writable({value})"),
            Self::SetIsExecutable { value } => write!(f, "set_is_executable({value})"),
            Self::EndAssociation => write!(f, "end_association()"),
            Self::EndBuilding => write!(f, "end_building()"),
        }
    }
}

/// Builder that accepts everything and remembers the order it was told things in.
#[derive(Debug, Default)]
pub struct EventLog {
    pub events: Vec<BuildEvent>,
}

impl EventLog {
    fn record(&mut self, event: BuildEvent) -> BuildResult {
        self.events.push(event);
        Ok(())
    }
}

impl AssociationBuilder for EventLog {
    fn start_building(&mut self) -> BuildResult {
        self.record(BuildEvent::StartBuilding)
    }

    fn start_association(&mut self, command: &str) -> BuildResult {
        self.record(BuildEvent::StartAssociation { command: command.to_string() })
    }

    fn set_mask(&mut self, mask: &str, case_sensitive: bool) -> BuildResult {
        self.record(BuildEvent::SetMask { mask: mask.to_string(), case_sensitive })
    }

    fn set_is_hidden(&mut self, value: bool) -> BuildResult {
        self.record(BuildEvent::SetIsHidden { value })
    }

    fn set_is_symlink(&mut self, value: bool) -> BuildResult {
        self.record(BuildEvent::SetIsSymlink { value })
    }

    fn set_is_readable(&mut self, value: bool) -> BuildResult {
        self.record(BuildEvent::SetIsReadable { value })
    }

    fn set_is_writable(&mut self, value: bool) -> BuildResult {
        self.record(BuildEvent::SetIsWritable { value })
    }

    fn set_is_executable(&mut self, value: bool) -> BuildResult {
        self.record(BuildEvent::SetIsExecutable { value })
    }

    fn end_association(&mut self) -> BuildResult {
        self.record(BuildEvent::EndAssociation)
    }

    fn end_building(&mut self) -> BuildResult {
        self.record(BuildEvent::EndBuilding)
    }
}
