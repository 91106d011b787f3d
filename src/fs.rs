//! Filesystem capability consumed by the dispatcher
//!
//! Every operation returns an [`Outcome`]: a success message for the
//! transcript, or an [`FsFailure`] naming the operation, the target and a
//! typed reason. The working directory is never cached by callers; `pwd`
//! and `list` read it live on every call.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

pub type Outcome = std::result::Result<String, FsFailure>;

/// The filesystem primitives the shell can run
pub trait Filesystem: Send {
    /// Entry names of the current directory, sorted
    fn list(&self) -> std::result::Result<Vec<String>, FsFailure>;
    fn pwd(&self) -> std::result::Result<String, FsFailure>;
    fn change_dir(&mut self, path: &str) -> Outcome;
    fn make_dir(&mut self, name: &str) -> Outcome;
    /// Create the file if absent; an existing file is left alone
    fn touch(&mut self, name: &str) -> Outcome;
    fn remove_file(&mut self, name: &str) -> Outcome;
    fn remove_tree(&mut self, name: &str) -> Outcome;
    /// Move to the home directory after the working directory vanished.
    /// Returns the new working directory.
    fn recover_cwd(&mut self) -> std::result::Result<String, FsFailure>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsOp {
    List,
    Pwd,
    ChangeDir,
    MakeDir,
    Touch,
    RemoveFile,
    RemoveTree,
    RecoverCwd,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    NotFound,
    NotADirectory,
    IsADirectory,
    PermissionDenied,
    AlreadyExists,
    ParentMissing,
    Other(String),
}

impl FailureReason {
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => FailureReason::NotFound,
            io::ErrorKind::PermissionDenied => FailureReason::PermissionDenied,
            io::ErrorKind::AlreadyExists => FailureReason::AlreadyExists,
            io::ErrorKind::NotADirectory => FailureReason::NotADirectory,
            io::ErrorKind::IsADirectory => FailureReason::IsADirectory,
            _ => FailureReason::Other(err.to_string()),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::NotFound => write!(f, "not found"),
            FailureReason::NotADirectory => write!(f, "not a directory"),
            FailureReason::IsADirectory => write!(f, "is a directory"),
            FailureReason::PermissionDenied => write!(f, "permission denied"),
            FailureReason::AlreadyExists => write!(f, "already exists"),
            FailureReason::ParentMissing => write!(f, "parent directory missing"),
            FailureReason::Other(msg) => write!(f, "{msg}"),
        }
    }
}

/// A typed filesystem failure, rendered as the line the user sees
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsFailure {
    pub op: FsOp,
    pub reason: FailureReason,
    pub target: String,
}

impl FsFailure {
    pub fn new(op: FsOp, reason: FailureReason, target: impl Into<String>) -> Self {
        Self {
            op,
            reason,
            target: target.into(),
        }
    }

    fn from_io(op: FsOp, target: &str, err: &io::Error) -> Self {
        Self::new(op, FailureReason::from_io(err), target)
    }
}

impl fmt::Display for FsFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use FailureReason as R;
        let t = &self.target;
        match (self.op, &self.reason) {
            (FsOp::List | FsOp::Pwd, R::NotFound) => {
                write!(f, "Error: Current working directory not found.")
            }
            (FsOp::List, R::PermissionDenied) => {
                write!(f, "Error: Permission denied to list current directory.")
            }
            (FsOp::List, reason) => write!(f, "Error listing directory: {reason}"),
            (FsOp::Pwd, reason) => write!(f, "Error reading current directory: {reason}"),

            (FsOp::ChangeDir, R::NotFound) => {
                write!(f, "The system cannot find the path specified: '{t}'")
            }
            (FsOp::ChangeDir, R::NotADirectory) => write!(f, "Not a directory: '{t}'"),
            (FsOp::ChangeDir, R::PermissionDenied) => {
                write!(f, "Permission denied for path: '{t}'")
            }
            (FsOp::ChangeDir, reason) => {
                write!(f, "Error changing directory to '{t}': {reason}")
            }

            (FsOp::MakeDir, R::AlreadyExists) => write!(f, "Directory '{t}' already exists."),
            (FsOp::MakeDir, R::PermissionDenied) => {
                write!(f, "Permission denied: Unable to create '{t}'.")
            }
            (FsOp::MakeDir, R::ParentMissing | R::NotFound) => write!(
                f,
                "Error creating directory '{t}': Path not found. Create parent directories first."
            ),
            (FsOp::MakeDir, reason) => {
                write!(f, "An error occurred creating directory '{t}': {reason}")
            }

            (FsOp::Touch, R::PermissionDenied) => {
                write!(f, "Permission denied: Unable to create/access '{t}'.")
            }
            (FsOp::Touch, reason) => write!(f, "An error occurred creating file '{t}': {reason}"),

            (FsOp::RemoveFile, R::NotFound) => write!(f, "File '{t}' not found."),
            (FsOp::RemoveFile, R::PermissionDenied) => write!(f, "Permission denied for '{t}'."),
            (FsOp::RemoveFile, R::IsADirectory) => write!(
                f,
                "Cannot remove '{t}'. It is a directory. Use 'rm -r' for directories."
            ),

            (FsOp::RemoveTree, R::NotFound) => write!(f, "Directory '{t}' not found."),
            (FsOp::RemoveTree, R::NotADirectory) => write!(f, "Error: '{t}' is not a directory."),
            (FsOp::RemoveTree, R::PermissionDenied) => {
                write!(f, "Permission denied to remove '{t}'.")
            }
            (FsOp::RemoveFile | FsOp::RemoveTree, reason) => {
                write!(f, "OS error removing '{t}': {reason}")
            }

            (FsOp::RecoverCwd, reason) => {
                write!(f, "Could not recover a working directory: {reason}")
            }
        }
    }
}

impl std::error::Error for FsFailure {}

/// Where the working directory lives
#[derive(Debug, Clone)]
enum Cwd {
    /// The process-wide working directory
    Process,
    /// A directory value carried by this instance and resolved per call
    Tracked(PathBuf),
}

/// [`Filesystem`] backed by `std::fs`
#[derive(Debug, Clone)]
pub struct OsFilesystem {
    cwd: Cwd,
}

impl OsFilesystem {
    /// Operate on the process-wide working directory (raw OS semantics)
    pub fn process() -> Self {
        Self { cwd: Cwd::Process }
    }

    /// Operate on a working directory of our own, starting at `start`.
    /// Nothing touches the process cwd, so instances are independent.
    pub fn tracked(start: impl Into<PathBuf>) -> Self {
        Self {
            cwd: Cwd::Tracked(start.into()),
        }
    }

    fn current(&self) -> io::Result<PathBuf> {
        match &self.cwd {
            Cwd::Process => std::env::current_dir(),
            Cwd::Tracked(dir) => {
                if dir.is_dir() {
                    Ok(dir.clone())
                } else {
                    Err(io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("{} no longer exists", dir.display()),
                    ))
                }
            }
        }
    }

    fn resolve(&self, name: &str, op: FsOp) -> std::result::Result<PathBuf, FsFailure> {
        let cwd = self
            .current()
            .map_err(|e| FsFailure::from_io(op, name, &e))?;
        Ok(cwd.join(name))
    }

    fn set_current(&mut self, dir: &Path) -> io::Result<()> {
        match &mut self.cwd {
            Cwd::Process => std::env::set_current_dir(dir),
            Cwd::Tracked(current) => {
                let meta = fs::metadata(dir)?;
                if !meta.is_dir() {
                    return Err(io::Error::new(
                        io::ErrorKind::NotADirectory,
                        format!("{} is not a directory", dir.display()),
                    ));
                }
                // Listing proves we may enter it
                fs::read_dir(dir)?;
                *current = dir.canonicalize()?;
                Ok(())
            }
        }
    }
}

impl Filesystem for OsFilesystem {
    fn list(&self) -> std::result::Result<Vec<String>, FsFailure> {
        let cwd = self
            .current()
            .map_err(|e| FsFailure::from_io(FsOp::List, ".", &e))?;
        let entries = fs::read_dir(&cwd).map_err(|e| FsFailure::from_io(FsOp::List, ".", &e))?;
        let mut names = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        names.sort();
        Ok(names)
    }

    fn pwd(&self) -> std::result::Result<String, FsFailure> {
        self.current()
            .map(|dir| dir.display().to_string())
            .map_err(|e| FsFailure::from_io(FsOp::Pwd, ".", &e))
    }

    fn change_dir(&mut self, path: &str) -> Outcome {
        let target = self.resolve(path, FsOp::ChangeDir)?;
        self.set_current(&target)
            .map_err(|e| FsFailure::from_io(FsOp::ChangeDir, path, &e))?;
        let now = self
            .current()
            .map_err(|e| FsFailure::from_io(FsOp::ChangeDir, path, &e))?;
        debug!("Changed directory to {}", now.display());
        Ok(format!("Changed to {}", now.display()))
    }

    fn make_dir(&mut self, name: &str) -> Outcome {
        let target = self.resolve(name, FsOp::MakeDir)?;
        fs::create_dir(&target).map_err(|e| {
            let reason = match FailureReason::from_io(&e) {
                FailureReason::NotFound => FailureReason::ParentMissing,
                other => other,
            };
            FsFailure::new(FsOp::MakeDir, reason, name)
        })?;
        Ok(format!("Directory '{name}' created."))
    }

    fn touch(&mut self, name: &str) -> Outcome {
        let target = self.resolve(name, FsOp::Touch)?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&target)
            .map_err(|e| FsFailure::from_io(FsOp::Touch, name, &e))?;
        Ok(format!("File '{name}' ensured/created."))
    }

    fn remove_file(&mut self, name: &str) -> Outcome {
        let target = self.resolve(name, FsOp::RemoveFile)?;
        let meta = fs::symlink_metadata(&target)
            .map_err(|e| FsFailure::from_io(FsOp::RemoveFile, name, &e))?;
        if meta.is_dir() {
            return Err(FsFailure::new(
                FsOp::RemoveFile,
                FailureReason::IsADirectory,
                name,
            ));
        }
        fs::remove_file(&target).map_err(|e| FsFailure::from_io(FsOp::RemoveFile, name, &e))?;
        Ok(format!("File '{name}' removed."))
    }

    fn remove_tree(&mut self, name: &str) -> Outcome {
        let target = self.resolve(name, FsOp::RemoveTree)?;
        let meta = fs::symlink_metadata(&target)
            .map_err(|e| FsFailure::from_io(FsOp::RemoveTree, name, &e))?;
        if !meta.is_dir() {
            return Err(FsFailure::new(
                FsOp::RemoveTree,
                FailureReason::NotADirectory,
                name,
            ));
        }
        fs::remove_dir_all(&target)
            .map_err(|e| FsFailure::from_io(FsOp::RemoveTree, name, &e))?;
        Ok(format!("Directory '{name}' and its contents removed."))
    }

    fn recover_cwd(&mut self) -> std::result::Result<String, FsFailure> {
        let home = dirs::home_dir().ok_or_else(|| {
            FsFailure::new(
                FsOp::RecoverCwd,
                FailureReason::Other("no home directory".to_string()),
                "~",
            )
        })?;
        self.set_current(&home)
            .map_err(|e| FsFailure::from_io(FsOp::RecoverCwd, "~", &e))?;
        Ok(home.display().to_string())
    }
}
