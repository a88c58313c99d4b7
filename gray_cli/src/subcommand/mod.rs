//! Enum-dispatched subcommands: each builds the demo scene and exercises
//! one facet of the engine end to end.

mod overlap;
mod run;

pub use overlap::Overlap;
pub use run::Run;

use anyhow::Result;
use enum_dispatch::enum_dispatch;

use crate::{Command, GlobalArgs};

/// What a subcommand does once global configuration is resolved.
#[enum_dispatch]
pub trait Subcommand {
    /// Runs the subcommand, returning the process exit code.
    fn execute(&self, global: &GlobalArgs) -> Result<i32>;
}

#[enum_dispatch(Subcommand)]
enum CommandEnum {
    Run(Run),
    Overlap(Overlap),
}

impl From<Command> for CommandEnum {
    fn from(c: Command) -> Self {
        match c {
            Command::Run(r) => Self::Run(r),
            Command::Overlap(o) => Self::Overlap(o),
        }
    }
}

/// Converts the clap-parsed command into its dispatchable form and runs it.
pub fn dispatch(command: Command, global: &GlobalArgs) -> Result<i32> {
    let cmd: CommandEnum = command.into();
    cmd.execute(global)
}
