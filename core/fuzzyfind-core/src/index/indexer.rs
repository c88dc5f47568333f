//! External indexer invocation.
//!
//! Runs blocking; the daemon calls `run` from a dedicated job thread.

use std::path::Path;
use std::process::{Command, Stdio};

use super::scheduler::{JobOutcome, UpdateJob};
use crate::config::IndexConfig;
use crate::error::{FuzzyError, Result};

/// argv templates for the three job kinds. `{path}` in `update_file` is the
/// workspace-relative file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexCommands {
    pub create: Vec<String>,
    pub update_all: Vec<String>,
    pub update_file: Vec<String>,
}

impl IndexCommands {
    pub fn from_config(config: &IndexConfig) -> Result<Self> {
        let commands = Self {
            create: config.create.clone(),
            update_all: config.update_all.clone(),
            update_file: config.update_file.clone(),
        };
        for (name, argv) in [
            ("index.create", &commands.create),
            ("index.update_all", &commands.update_all),
            ("index.update_file", &commands.update_file),
        ] {
            if argv.first().map_or(true, |program| program.trim().is_empty()) {
                return Err(FuzzyError::EmptyCommand(name.to_string()));
            }
        }
        Ok(commands)
    }

    /// Expanded argv for `job`.
    pub fn argv(&self, job: &UpdateJob) -> Vec<String> {
        match job {
            UpdateJob::Create => self.create.clone(),
            UpdateJob::Full => self.update_all.clone(),
            UpdateJob::File(path) => self
                .update_file
                .iter()
                .map(|arg| arg.replace("{path}", path))
                .collect(),
        }
    }

    /// Runs `job` in `workspace` and captures its output. Spawn failures are
    /// reported as a failed outcome.
    pub fn run(&self, job: UpdateJob, workspace: &Path) -> JobOutcome {
        let argv = self.argv(&job);
        let Some((program, args)) = argv.split_first() else {
            return JobOutcome::failed(job, "empty command");
        };

        tracing::debug!(job = %job, command = %argv.join(" "), "Running indexer");
        let output = Command::new(program)
            .args(args)
            .current_dir(workspace)
            .stdin(Stdio::null())
            .output();

        match output {
            Ok(output) => JobOutcome {
                job,
                success: output.status.success(),
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            },
            Err(err) => JobOutcome::failed(job, format!("Failed to run {}: {}", program, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn commands() -> IndexCommands {
        IndexCommands::from_config(&IndexConfig::default()).unwrap()
    }

    #[test]
    fn file_job_substitutes_path() {
        assert_eq!(
            commands().argv(&UpdateJob::File("src/a b.c".into())),
            vec!["global", "--single-update", "src/a b.c"]
        );
        assert_eq!(commands().argv(&UpdateJob::Full), vec!["global", "-u"]);
        assert_eq!(commands().argv(&UpdateJob::Create), vec!["gtags"]);
    }

    #[test]
    fn empty_template_is_rejected() {
        let config = IndexConfig {
            update_all: Vec::new(),
            ..IndexConfig::default()
        };
        assert!(matches!(
            IndexCommands::from_config(&config),
            Err(FuzzyError::EmptyCommand(name)) if name == "index.update_all"
        ));
    }

    #[test]
    fn missing_program_is_a_failed_outcome() {
        let temp = tempdir().unwrap();
        let commands = IndexCommands {
            create: vec!["/definitely/not/gtags".to_string()],
            update_all: vec!["x".to_string()],
            update_file: vec!["x".to_string()],
        };
        let outcome = commands.run(UpdateJob::Create, temp.path());
        assert!(!outcome.success);
        assert!(outcome.stderr.contains("/definitely/not/gtags"));
    }

    #[cfg(unix)]
    #[test]
    fn captures_output_and_exit_status() {
        let temp = tempdir().unwrap();
        let commands = IndexCommands {
            create: vec!["sh".into(), "-c".into(), "echo out; echo err >&2; exit 3".into()],
            update_all: vec!["true".into()],
            update_file: vec!["sh".into(), "-c".into(), "test -n \"$0\"".into(), "{path}".into()],
        };

        let outcome = commands.run(UpdateJob::Create, temp.path());
        assert!(!outcome.success);
        assert_eq!(outcome.exit_code, Some(3));
        assert_eq!(outcome.stdout.trim(), "out");
        assert_eq!(outcome.stderr.trim(), "err");

        assert!(commands.run(UpdateJob::Full, temp.path()).success);
        assert!(commands.run(UpdateJob::File("a.c".into()), temp.path()).success);
    }
}
