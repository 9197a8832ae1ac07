//! Completions command - emit a shell completion script
//!
//! The script covers every subcommand and global flag of the binary and
//! goes to stdout, so it can be redirected into the shell's completion
//! directory, e.g. `cardpress completions zsh > ~/.zfunc/_cardpress`.

use std::io::{self, Write};

use anyhow::Result;
use clap::CommandFactory;
use clap_complete::Shell;

#[derive(Debug, clap::Args)]
pub struct CompletionsCommand {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsCommand {
    pub fn execute(&self) -> Result<()> {
        write_completions(self.shell, &mut io::stdout())
    }
}

/// Renders the completion script for `shell` into `out`
fn write_completions(shell: Shell, out: &mut dyn Write) -> Result<()> {
    let mut cmd = crate::Cli::command();
    clap_complete::generate(shell, &mut cmd, "cardpress", out);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bash_script_covers_every_subcommand() {
        let mut buf = Vec::new();
        write_completions(Shell::Bash, &mut buf).unwrap();
        let script = String::from_utf8(buf).unwrap();

        for name in [
            "login",
            "logout",
            "status",
            "playlists",
            "publish",
            "completions",
        ] {
            assert!(script.contains(name), "missing subcommand {name}");
        }
    }

    #[test]
    fn test_zsh_script_names_the_binary() {
        let mut buf = Vec::new();
        write_completions(Shell::Zsh, &mut buf).unwrap();
        let script = String::from_utf8(buf).unwrap();
        assert!(script.contains("cardpress"));
    }
}
