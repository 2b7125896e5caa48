use std::str::FromStr;
use serde::Deserialize;

/// What the runner does when a task's script file does not exist.
///
/// - `Abort`: treat the missing script like any other failed step (default).
/// - `Skip`: log a warning, count the step as done and continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingScriptPolicy {
    Abort,
    Skip,
}

impl Default for MissingScriptPolicy {
    fn default() -> Self {
        MissingScriptPolicy::Abort
    }
}

impl FromStr for MissingScriptPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "abort" => Ok(MissingScriptPolicy::Abort),
            "skip" => Ok(MissingScriptPolicy::Skip),
            other => Err(format!(
                "invalid missing_script policy: {other} (expected \"abort\" or \"skip\")"
            )),
        }
    }
}

/// Script interpreter used to run task scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpreter {
    /// Windows PowerShell (`powershell.exe`).
    #[serde(alias = "powershell.exe")]
    PowerShell,
    /// PowerShell 7+ (`pwsh`).
    Pwsh,
    /// POSIX shell (`sh`).
    Sh,
}

impl Interpreter {
    /// Executable name handed to the OS.
    pub fn program(self) -> &'static str {
        match self {
            Interpreter::PowerShell => "powershell.exe",
            Interpreter::Pwsh => "pwsh",
            Interpreter::Sh => "sh",
        }
    }

    pub fn is_powershell(self) -> bool {
        matches!(self, Interpreter::PowerShell | Interpreter::Pwsh)
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        if cfg!(windows) {
            Interpreter::PowerShell
        } else {
            Interpreter::Sh
        }
    }
}

impl FromStr for Interpreter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "powershell" | "powershell.exe" => Ok(Interpreter::PowerShell),
            "pwsh" => Ok(Interpreter::Pwsh),
            "sh" => Ok(Interpreter::Sh),
            other => Err(format!(
                "invalid interpreter: {other} (expected \"sh\", \"powershell\" or \"pwsh\")"
            )),
        }
    }
}
