// Compose runner - lifecycle commands for the managed service

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;

/// Lifecycle commands that outlive this are killed and reported as a
/// timeout rather than left hanging.
const LIFECYCLE_TIMEOUT: Duration = Duration::from_secs(30);

const COMPOSE_FILE: &str = "docker-compose.yml";

#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("compose command is empty")]
    EmptyCommand,

    #[error("failed to parse compose command: {0}")]
    BadCommand(#[from] shell_words::ParseError),

    #[error("failed to run '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("command timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub output: String,
}

/// Invokes the compose CLI in the compose directory.
///
/// The command line is configurable so hosts running the legacy
/// `docker-compose` binary work the same as `docker compose`.
pub struct ComposeRunner {
    compose_dir: PathBuf,
    program: String,
    base_args: Vec<String>,
}

impl ComposeRunner {
    pub fn new(compose_dir: PathBuf, command_line: &str) -> Result<Self, ComposeError> {
        let mut words = shell_words::split(command_line)?;
        if words.is_empty() {
            return Err(ComposeError::EmptyCommand);
        }
        let program = words.remove(0);
        Ok(Self {
            compose_dir,
            program,
            base_args: words,
        })
    }

    pub async fn up(&self) -> Result<CommandOutput, ComposeError> {
        self.run(&["-f", COMPOSE_FILE, "up", "-d"]).await
    }

    pub async fn down(&self) -> Result<CommandOutput, ComposeError> {
        self.run(&["-f", COMPOSE_FILE, "down"]).await
    }

    pub async fn restart(&self) -> Result<CommandOutput, ComposeError> {
        self.run(&["-f", COMPOSE_FILE, "restart"]).await
    }

    async fn run(&self, args: &[&str]) -> Result<CommandOutput, ComposeError> {
        let command_line = self.describe(args);
        tracing::info!("running {}", command_line);

        let mut command = Command::new(&self.program);
        command
            .args(&self.base_args)
            .args(args)
            .current_dir(&self.compose_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = timeout(LIFECYCLE_TIMEOUT, command.output())
            .await
            .map_err(|_| ComposeError::Timeout(LIFECYCLE_TIMEOUT))?
            .map_err(|source| ComposeError::Spawn {
                command: command_line,
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let text = if stdout.trim().is_empty() {
            stderr.to_string()
        } else {
            stdout.to_string()
        };

        Ok(CommandOutput {
            success: output.status.success(),
            output: text,
        })
    }

    fn describe(&self, args: &[&str]) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.base_args.iter().cloned());
        parts.extend(args.iter().map(|a| a.to_string()));
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_multi_word_command() {
        let runner = ComposeRunner::new(PathBuf::from("/srv/game"), "docker compose").unwrap();
        assert_eq!(runner.program, "docker");
        assert_eq!(runner.base_args, vec!["compose"]);
        assert_eq!(
            runner.describe(&["-f", COMPOSE_FILE, "up", "-d"]),
            "docker compose -f docker-compose.yml up -d"
        );
    }

    #[test]
    fn accepts_legacy_binary() {
        let runner = ComposeRunner::new(PathBuf::from("/srv/game"), "docker-compose").unwrap();
        assert_eq!(runner.program, "docker-compose");
        assert!(runner.base_args.is_empty());
    }

    #[test]
    fn rejects_empty_command() {
        assert!(matches!(
            ComposeRunner::new(PathBuf::from("/srv/game"), "  "),
            Err(ComposeError::EmptyCommand)
        ));
    }

    #[tokio::test]
    async fn captures_output_of_real_process() {
        let runner = ComposeRunner {
            compose_dir: PathBuf::from("."),
            program: "echo".to_string(),
            base_args: vec!["compose-says".to_string()],
        };
        let result = runner.run(&["hello"]).await.unwrap();
        assert!(result.success);
        assert!(result.output.contains("compose-says hello"));
    }
}
