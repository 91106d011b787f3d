//! Command dispatch onto the filesystem capability

use tracing::debug;

use crate::command::{CommandName, ParsedCommand};
use crate::fs::{Filesystem, FsFailure};

/// What a successful dispatch produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Text for the transcript (may be empty, e.g. `ls` in an empty dir)
    Text(String),
    /// The session should clear the transcript
    ClearScreen,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("{command}: argument required")]
    MissingArgument { command: CommandName },

    #[error("Unknown command: '{0}'")]
    Unknown(String),

    #[error(transparent)]
    Fs(#[from] FsFailure),
}

/// Maps parsed commands to filesystem calls
pub struct Dispatcher {
    fs: Box<dyn Filesystem>,
}

impl Dispatcher {
    pub fn new(fs: Box<dyn Filesystem>) -> Self {
        Self { fs }
    }

    pub fn dispatch(&mut self, cmd: &ParsedCommand) -> Result<Reply, DispatchError> {
        debug!("Dispatching {} {:?}", cmd.name, cmd.argument);

        if cmd.name.requires_argument() && cmd.argument.is_empty() {
            return Err(DispatchError::MissingArgument { command: cmd.name });
        }

        let arg = cmd.argument.as_str();
        let text = match cmd.name {
            CommandName::List => self.fs.list()?.join("  "),
            CommandName::Pwd => self.fs.pwd()?,
            CommandName::ChangeDir => self.fs.change_dir(arg)?,
            CommandName::MakeDir => self.fs.make_dir(arg)?,
            CommandName::Touch => self.fs.touch(arg)?,
            CommandName::RemoveFile => self.fs.remove_file(arg)?,
            CommandName::RemoveTree => self.fs.remove_tree(arg)?,
            CommandName::Clear => return Ok(Reply::ClearScreen),
            CommandName::Unknown => return Err(DispatchError::Unknown(cmd.raw.clone())),
        };
        Ok(Reply::Text(text))
    }

    /// Live working directory, read through the capability each time
    pub fn cwd(&self) -> Result<String, FsFailure> {
        self.fs.pwd()
    }

    pub fn recover_cwd(&mut self) -> Result<String, FsFailure> {
        self.fs.recover_cwd()
    }
}
