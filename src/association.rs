use std::io;
use std::path::Path;
use glob::{MatchOptions, Pattern};
use serde::Serialize;
use crate::error::BuildError;

/// A file-name pattern with its case sensitivity.
///
/// Patterns are shell globs (`*.txt`, `[Mm]akefile`) matched against the
/// file name only, never the directory part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mask {
    pub pattern: String,
    pub case_sensitive: bool,
    #[serde(skip)]
    matcher: Pattern,
}

impl Mask {
    pub fn new(pattern: &str, case_sensitive: bool) -> Result<Self, BuildError> {
        let matcher = Pattern::new(pattern).map_err(|e| BuildError::InvalidMask {
            mask: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { pattern: pattern.to_string(), case_sensitive, matcher })
    }

    pub fn matches(&self, name: &str) -> bool {
        let options = MatchOptions {
            case_sensitive: self.case_sensitive,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };
        self.matcher.matches_with(name, options)
    }
}

/// A rule binding a mask and optional attribute constraints to a command.
///
/// Each flag is tri-state: `None` means the association does not care.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Association {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask: Option<Mask>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_hidden: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_symlink: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_readable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_writable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_executable: Option<bool>,
}

impl Association {
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            mask: None,
            is_hidden: None,
            is_symlink: None,
            is_readable: None,
            is_writable: None,
            is_executable: None,
        }
    }

    /// Returns true if the mask matches `file` and every declared flag agrees with it.
    pub fn accepts(&self, file: &FileFacts) -> bool {
        let mask_ok = self.mask.as_ref().is_some_and(|m| m.matches(&file.name));
        mask_ok
            && flag_ok(self.is_hidden, file.hidden)
            && flag_ok(self.is_symlink, file.symlink)
            && flag_ok(self.is_readable, file.readable)
            && flag_ok(self.is_writable, file.writable)
            && flag_ok(self.is_executable, file.executable)
    }

    /// One-line human summary, e.g. `edit  *.txt (case-insensitive) hidden=false`.
    pub fn summary(&self) -> String {
        let mut out = self.command.clone();
        if let Some(m) = &self.mask {
            out.push_str(&format!("  {}", m.pattern));
            if !m.case_sensitive {
                out.push_str(" (case-insensitive)");
            }
        }
        let flags = [
            ("hidden", self.is_hidden),
            ("symlink", self.is_symlink),
            ("readable", self.is_readable),
            ("writable", self.is_writable),
            ("executable", self.is_executable),
        ];
        for (name, value) in flags {
            if let Some(v) = value {
                out.push_str(&format!(" {name}={v}"));
            }
        }
        out
    }
}

fn flag_ok(wanted: Option<bool>, actual: bool) -> bool {
    wanted.is_none_or(|w| w == actual)
}

/// What an association can know about a file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileFacts {
    pub name: String,
    pub hidden: bool,
    pub symlink: bool,
    pub readable: bool,
    pub writable: bool,
    pub executable: bool,
}

impl FileFacts {
    /// Probes `path` on disk. Symlinks are reported as such; their permissions
    /// come from the target when it exists.
    pub fn probe(path: &Path) -> io::Result<Self> {
        let link_meta = std::fs::symlink_metadata(path)?;
        let meta = std::fs::metadata(path).unwrap_or_else(|_| link_meta.clone());
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (readable, writable, executable) = permissions(path, &meta);
        Ok(Self {
            hidden: name.starts_with('.'),
            symlink: link_meta.file_type().is_symlink(),
            readable,
            writable,
            executable,
            name,
        })
    }
}

#[cfg(unix)]
fn permissions(_path: &Path, meta: &std::fs::Metadata) -> (bool, bool, bool) {
    use std::os::unix::fs::PermissionsExt;
    let mode = meta.permissions().mode();
    (mode & 0o400 != 0, mode & 0o200 != 0, mode & 0o100 != 0)
}

#[cfg(not(unix))]
fn permissions(path: &Path, meta: &std::fs::Metadata) -> (bool, bool, bool) {
    let executable = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "exe" | "bat" | "cmd" | "com"))
        .unwrap_or(false);
    (true, !meta.permissions().readonly(), executable)
}
