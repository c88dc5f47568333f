//! Selection callback: turns the record chosen in the filter into a location
//! and asks the editor to show it.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Serialize;

use crate::error::{FuzzyError, Result};
use crate::patterns::{RE_ANSI_ESCAPE, RE_SELECTION};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub path: PathBuf,
    /// 1-based.
    pub line: u32,
    /// 1-based. Defaults to 1 when the record carries no column.
    pub column: u32,
}

/// Parses `["']path:line[:column]...` and resolves `path` against `workspace`.
pub fn parse_selection(record: &str, workspace: &Path) -> Option<Location> {
    let record = RE_ANSI_ESCAPE.replace_all(record.trim(), "");
    let caps = RE_SELECTION.captures(&record)?;

    let raw_path = caps.name("path")?.as_str().trim();
    if raw_path.is_empty() {
        return None;
    }
    let line = caps.name("line")?.as_str().parse().ok()?;
    let column = match caps.name("column") {
        Some(column) => column.as_str().parse().ok()?,
        None => 1,
    };

    let path = Path::new(raw_path);
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace.join(path)
    };
    Some(Location { path, line, column })
}

/// Shows a location in the editor.
pub trait LocationSink: Send + Sync {
    fn show(&self, location: &Location) -> Result<()>;
}

/// Runs a configured argv with `{file}`, `{line}` and `{column}` expanded.
#[derive(Debug, Clone)]
pub struct OpenCommandSink {
    argv: Vec<String>,
}

impl OpenCommandSink {
    pub fn new(argv: Vec<String>) -> Result<Self> {
        if argv.first().map_or(true, |program| program.trim().is_empty()) {
            return Err(FuzzyError::EmptyCommand("open_command".to_string()));
        }
        Ok(Self { argv })
    }

    pub fn expand(&self, location: &Location) -> Vec<String> {
        let file = location.path.to_string_lossy();
        self.argv
            .iter()
            .map(|arg| {
                arg.replace("{file}", &file)
                    .replace("{line}", &location.line.to_string())
                    .replace("{column}", &location.column.to_string())
            })
            .collect()
    }
}

impl LocationSink for OpenCommandSink {
    fn show(&self, location: &Location) -> Result<()> {
        let argv = self.expand(location);
        let Some((program, args)) = argv.split_first() else {
            return Err(FuzzyError::EmptyCommand("open_command".to_string()));
        };

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| FuzzyError::CommandFailed {
                command: argv.join(" "),
                details: e.to_string(),
            })?;

        // Reap in the background so the editor command never blocks the caller.
        std::thread::spawn(move || {
            let _ = child.wait();
        });
        tracing::info!(path = %location.path.display(), line = location.line, "Opened location");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ws() -> PathBuf {
        PathBuf::from("/work")
    }

    #[test]
    fn parses_path_line_and_column() {
        let loc = parse_selection("src/main.c:42:7:int main(void)", &ws()).unwrap();
        assert_eq!(loc.path, PathBuf::from("/work/src/main.c"));
        assert_eq!(loc.line, 42);
        assert_eq!(loc.column, 7);
    }

    #[test]
    fn column_defaults_to_one() {
        let loc = parse_selection("src/util.c:3:static int x;", &ws()).unwrap();
        assert_eq!((loc.line, loc.column), (3, 1));
    }

    #[test]
    fn leading_quote_is_skipped() {
        let loc = parse_selection("'lib/a.c:10:2:x'", &ws()).unwrap();
        assert_eq!(loc.path, PathBuf::from("/work/lib/a.c"));
        let loc = parse_selection("\"lib/b.c:11\"", &ws()).unwrap();
        assert_eq!(loc.path, PathBuf::from("/work/lib/b.c"));
        assert_eq!(loc.line, 11);
    }

    #[cfg(unix)]
    #[test]
    fn absolute_paths_are_kept() {
        let loc = parse_selection("/usr/include/stdio.h:27:1:", &ws()).unwrap();
        assert_eq!(loc.path, PathBuf::from("/usr/include/stdio.h"));
    }

    #[test]
    fn color_escapes_are_stripped() {
        let record = "\x1b[35msrc/a.c\x1b[0m:\x1b[32m9\x1b[0m:4:foo";
        let loc = parse_selection(record, &ws()).unwrap();
        assert_eq!(loc.path, PathBuf::from("/work/src/a.c"));
        assert_eq!((loc.line, loc.column), (9, 4));
    }

    #[test]
    fn non_matching_records_are_rejected() {
        assert_eq!(parse_selection("", &ws()), None);
        assert_eq!(parse_selection("no location here", &ws()), None);
        assert_eq!(parse_selection("src/a.c:abc", &ws()), None);
    }

    #[test]
    fn open_command_expands_placeholders() {
        let sink = OpenCommandSink::new(vec![
            "code".to_string(),
            "--goto".to_string(),
            "{file}:{line}:{column}".to_string(),
        ])
        .unwrap();
        let loc = Location {
            path: PathBuf::from("/work/a.c"),
            line: 5,
            column: 2,
        };
        assert_eq!(sink.expand(&loc), vec!["code", "--goto", "/work/a.c:5:2"]);
    }

    #[test]
    fn empty_open_command_is_rejected() {
        assert!(matches!(
            OpenCommandSink::new(Vec::new()),
            Err(FuzzyError::EmptyCommand(_))
        ));
    }

    #[test]
    fn missing_program_is_an_error() {
        let sink = OpenCommandSink::new(vec!["/definitely/not/an/editor".to_string()]).unwrap();
        let loc = Location {
            path: PathBuf::from("/work/a.c"),
            line: 1,
            column: 1,
        };
        assert!(matches!(
            sink.show(&loc),
            Err(FuzzyError::CommandFailed { .. })
        ));
    }
}
