// src/exec/command.rs

//! Builds the interpreter command line for a task script.
//!
//! Every path and parameter value is embedded as a single-quoted literal of
//! the target interpreter, so values containing quotes, `$`, `;`, `&` or
//! backticks cannot change the structure of the invocation.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;

use regex::Regex;
use tokio::process::Command;

use crate::errors::{Result, SetupError};
use crate::task::Task;
use crate::types::Interpreter;

/// A fully built interpreter invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    /// Tokio command with piped stdout/stderr and no stdin.
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// The script body passed to the interpreter (last argument).
    pub fn script_body(&self) -> &str {
        self.args.last().map(String::as_str).unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct InvocationBuilder {
    interpreter: Interpreter,
    preludes: Vec<PathBuf>,
    script: Option<PathBuf>,
    params: Vec<(String, String)>,
}

impl InvocationBuilder {
    pub fn new(interpreter: Interpreter) -> Self {
        Self {
            interpreter,
            preludes: Vec::new(),
            script: None,
            params: Vec::new(),
        }
    }

    /// Scripts sourced, in order, before the task script.
    pub fn with_preludes<I, P>(mut self, preludes: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.preludes.extend(
            preludes
                .into_iter()
                .map(|p| p.as_ref().to_path_buf())
                .filter(|p| !p.as_os_str().is_empty()),
        );
        self
    }

    pub fn with_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.script = Some(script.into());
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Script path plus the task's package parameters.
    pub fn with_task(mut self, task: &Task) -> Self {
        self.script = Some(task.script.clone());
        self.params.extend(task.script_params());
        self
    }

    pub fn build(self) -> Result<Invocation> {
        let script = self.script.as_ref().ok_or_else(|| {
            SetupError::ConfigError("script path must be set before building the command".to_string())
        })?;

        for (name, _) in &self.params {
            if !is_valid_param_name(name) {
                return Err(SetupError::InvalidParameter(name.clone()));
            }
        }

        let body = if self.interpreter.is_powershell() {
            self.powershell_body(script)
        } else {
            self.posix_body(script)
        };

        let args = if self.interpreter.is_powershell() {
            vec![
                "-NoProfile".to_string(),
                "-NonInteractive".to_string(),
                "-ExecutionPolicy".to_string(),
                "Bypass".to_string(),
                "-Command".to_string(),
                body,
            ]
        } else {
            vec!["-c".to_string(), body]
        };

        Ok(Invocation {
            program: self.interpreter.program().to_string(),
            args,
        })
    }

    /// `& { . 'pre'; . 'script' -Name 'value'; exit $LASTEXITCODE }`
    fn powershell_body(&self, script: &Path) -> String {
        let mut body = String::from("& { ");
        for prelude in &self.preludes {
            body.push_str(&format!(". {}; ", quote_powershell(&source_path(prelude))));
        }
        body.push_str(&format!(". {}", quote_powershell(&source_path(script))));
        for (name, value) in &self.params {
            body.push_str(&format!(" -{name} {}", quote_powershell(value)));
        }
        body.push_str("; exit $LASTEXITCODE }");
        body
    }

    /// `set -- --name 'value'; . 'pre'; . 'script'`
    fn posix_body(&self, script: &Path) -> String {
        let mut body = String::new();
        if !self.params.is_empty() {
            body.push_str("set --");
            for (name, value) in &self.params {
                body.push_str(&format!(" --{} {}", kebab_case(name), quote_posix(value)));
            }
            body.push_str("; ");
        }
        for prelude in &self.preludes {
            body.push_str(&format!(". {}; ", quote_posix(&source_path(prelude))));
        }
        body.push_str(&format!(". {}", quote_posix(&source_path(script))));
        body
    }
}

/// Path as handed to `.`. A bare file name is looked up on `PATH` by both
/// interpreters, so it is pinned to the working directory.
fn source_path(path: &Path) -> String {
    let text = path.to_string_lossy();
    if path.is_relative() && path.components().count() == 1 && !text.starts_with('.') {
        format!("./{text}")
    } else {
        text.into_owned()
    }
}

/// Parameter names are plain identifiers; they are spliced into the command
/// line unquoted.
pub fn is_valid_param_name(name: &str) -> bool {
    param_name_regex().is_match(name)
}

fn param_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("valid parameter name regex"))
}

/// PowerShell single-quoted literal. Besides `'`, PowerShell also treats the
/// typographic single quotes as quote characters, so those are doubled too.
pub fn quote_powershell(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        if matches!(c, '\'' | '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}') {
            out.push(c);
        }
        out.push(c);
    }
    out.push('\'');
    out
}

/// POSIX shell single-quoted literal (`'` becomes `'\''`).
pub fn quote_posix(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
        } else if c == '_' {
            out.push('-');
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn powershell_quotes_and_doubles() {
        assert_eq!(quote_powershell("O'Hara"), "'O''Hara'");
        assert_eq!(quote_powershell(""), "''");
        assert_eq!(quote_powershell("a\u{2019}b"), "'a\u{2019}\u{2019}b'");
        assert_eq!(quote_powershell("$(rm -rf /)"), "'$(rm -rf /)'");
    }

    #[test]
    fn posix_quotes_single_quote() {
        assert_eq!(quote_posix("it's"), r"'it'\''s'");
        assert_eq!(quote_posix("; rm -rf ~"), "'; rm -rf ~'");
    }

    #[test]
    fn kebab_case_names() {
        assert_eq!(kebab_case("PackageKey"), "package-key");
        assert_eq!(kebab_case("MinimumRequiredVersion"), "minimum-required-version");
        assert_eq!(kebab_case("already_snake"), "already-snake");
    }

    #[test]
    fn builds_powershell_invocation() {
        let inv = InvocationBuilder::new(Interpreter::PowerShell)
            .with_preludes(["C:\\kit\\_Helpers.ps1"])
            .with_script("C:\\kit\\Ensure-Git.ps1")
            .with_param("PackageKey", "git")
            .with_param("PreferredVersion", "2.4'6")
            .build()
            .unwrap();

        assert_eq!(inv.program, "powershell.exe");
        assert_eq!(&inv.args[..5], ["-NoProfile", "-NonInteractive", "-ExecutionPolicy", "Bypass", "-Command"]);
        assert_eq!(
            inv.script_body(),
            "& { . 'C:\\kit\\_Helpers.ps1'; . 'C:\\kit\\Ensure-Git.ps1' -PackageKey 'git' -PreferredVersion '2.4''6'; exit $LASTEXITCODE }"
        );
    }

    #[test]
    fn builds_posix_invocation() {
        let inv = InvocationBuilder::new(Interpreter::Sh)
            .with_preludes(["/kit/helpers.sh", ""])
            .with_script("/kit/ensure git.sh")
            .with_param("PackageKey", "g'it")
            .build()
            .unwrap();

        assert_eq!(inv.program, "sh");
        assert_eq!(inv.args[0], "-c");
        assert_eq!(
            inv.script_body(),
            r"set -- --package-key 'g'\''it'; . '/kit/helpers.sh'; . '/kit/ensure git.sh'"
        );
    }

    #[test]
    fn bare_script_names_are_pinned_to_the_working_directory() {
        let inv = InvocationBuilder::new(Interpreter::Sh)
            .with_preludes(["helpers.sh"])
            .with_script("x.sh")
            .build()
            .unwrap();
        assert_eq!(inv.script_body(), ". './helpers.sh'; . './x.sh'");

        let nested = InvocationBuilder::new(Interpreter::Sh)
            .with_script("scripts/x.sh")
            .build()
            .unwrap();
        assert!(nested.script_body().ends_with(". 'scripts/x.sh'"));
    }

    #[test]
    fn rejects_parameter_names_with_metacharacters() {
        let err = InvocationBuilder::new(Interpreter::Sh)
            .with_script("/kit/a.sh")
            .with_param("Key; rm", "x")
            .build()
            .unwrap_err();
        assert!(matches!(err, SetupError::InvalidParameter(name) if name == "Key; rm"));
    }

    #[test]
    fn requires_script() {
        assert!(InvocationBuilder::new(Interpreter::Sh).build().is_err());
    }
}
