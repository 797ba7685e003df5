//! Command type for building executable commands

use crate::error::{Error, Result};
use crate::quote;

/// A command to be executed
///
/// An argv-style vector whose first element is the program. The vector is
/// never empty. Unlike a spawned process, this type is `Clone` and can be
/// dispatched any number of times; each dispatch hands the executor its own
/// copy, so the caller cannot alter a command once it was submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    argv: Vec<String>,
}

impl Command {
    /// Create a new command for the given program
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            argv: vec![program.into()],
        }
    }

    /// Create a command from a full argument vector
    ///
    /// Fails with [`Error::EmptyCommand`] if `argv` is empty.
    pub fn from_argv<I, S>(argv: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let argv: Vec<String> = argv.into_iter().map(Into::into).collect();
        if argv.is_empty() {
            return Err(Error::EmptyCommand);
        }
        Ok(Self { argv })
    }

    /// Add an argument to the command
    pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.argv.push(arg.into());
        self
    }

    /// Add multiple arguments to the command
    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for arg in args {
            self.arg(arg);
        }
        self
    }

    /// Get the program name
    pub fn get_program(&self) -> &str {
        &self.argv[0]
    }

    /// Get the arguments, excluding the program
    pub fn get_args(&self) -> &[String] {
        &self.argv[1..]
    }

    /// Get the full argument vector
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Render the quoted, space-joined command line handed to transports
    pub fn to_command_line(&self) -> String {
        quote::command_line(&self.argv)
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_command_line())
    }
}

/// Builder pattern helper
impl Command {
    /// Create a builder for this command (for chaining)
    pub fn builder(program: impl Into<String>) -> CommandBuilder {
        CommandBuilder(Command::new(program))
    }
}

/// Builder wrapper for more ergonomic command construction
pub struct CommandBuilder(Command);

impl CommandBuilder {
    /// Add an argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.0.arg(arg);
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0.args(args);
        self
    }

    /// Build the command
    pub fn build(self) -> Command {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_creation() {
        let cmd = Command::new("echo");
        assert_eq!(cmd.get_program(), "echo");
        assert_eq!(cmd.get_args().len(), 0);
    }

    #[test]
    fn test_command_with_args() {
        let mut cmd = Command::new("ls");
        cmd.arg("-la").arg("/tmp");

        assert_eq!(cmd.get_args(), ["-la", "/tmp"]);
        assert_eq!(cmd.argv(), ["ls", "-la", "/tmp"]);
    }

    #[test]
    fn test_from_argv_rejects_empty() {
        let empty: Vec<String> = Vec::new();
        assert!(matches!(Command::from_argv(empty), Err(Error::EmptyCommand)));

        let cmd = Command::from_argv(["cut", "-d:", "-f1", "/etc/passwd"]).unwrap();
        assert_eq!(cmd.get_program(), "cut");
        assert_eq!(cmd.get_args().len(), 3);
    }

    #[test]
    fn test_command_builder() {
        let cmd = Command::builder("echo")
            .arg("hello world")
            .args(["-n"])
            .build();

        assert_eq!(cmd.argv(), ["echo", "hello world", "-n"]);
        assert_eq!(cmd.to_command_line(), "echo \"hello world\" -n");
    }

    #[test]
    fn test_command_line_leaves_argv_untouched() {
        let cmd = Command::builder("echo").arg("a b").build();
        let _ = cmd.to_command_line();
        assert_eq!(cmd.argv(), ["echo", "a b"]);
        assert_eq!(cmd.to_string(), "echo \"a b\"");
    }
}
