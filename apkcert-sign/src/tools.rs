// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Every external program apkcert starts goes through [ToolRunner], one
//! blocking call per step.

use apkcert_common::*;
use std::{
    ffi::{OsStr, OsString},
    fmt,
    path::{Path, PathBuf},
    process::Command
};
use tracing::debug;

/// A single command line for an external tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Short name used in logs and errors, eg. `zipalign` or `sign.jar`
    pub name: String,
    pub program: PathBuf,
    pub args: Vec<OsString>,
    // Indices into `args` that must not be logged
    secrets: Vec<usize>
}

impl Invocation {
    pub fn new(name: impl Into<String>, program: impl AsRef<Path>) -> Invocation {
        Invocation {
            name: name.into(),
            program: program.as_ref().to_path_buf(),
            args: vec![],
            secrets: vec![]
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Invocation {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>
    {
        for arg in args {
            self = self.arg(arg);
        }
        self
    }

    /// Adds an argument, such as a password, that is masked when logged.
    pub fn secret_arg(mut self, arg: impl AsRef<OsStr>) -> Invocation {
        self.secrets.push(self.args.len());
        self.arg(arg)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for (i, arg) in self.args.iter().enumerate() {
            if self.secrets.contains(&i) {
                write!(f, " ******")?;
            } else {
                write!(f, " {}", arg.to_string_lossy())?;
            }
        }
        Ok(())
    }
}

/// What a finished tool printed and whether it exited successfully.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String
}

impl ToolOutput {
    pub fn succeeded(stdout: impl Into<String>) -> ToolOutput {
        ToolOutput {
            success: true,
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new()
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> ToolOutput {
        ToolOutput {
            success: false,
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into()
        }
    }

    /// The tool's own description of what went wrong. Java tools tend to
    /// print errors to stdout, so that is used when stderr is empty.
    pub fn error_text(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        match self.code {
            Some(code) => format!("exited with code {code}"),
            None => "terminated by a signal".to_string()
        }
    }
}

/// Runs external tools. Returns `Err` only when the tool couldn't be
/// started; a non-zero exit is reported through [ToolOutput::success].
pub trait ToolRunner {
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput>;
}

/// [ToolRunner] backed by [std::process::Command]. Blocks until the tool
/// exits; there is no timeout.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemToolRunner;

impl ToolRunner for SystemToolRunner {
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput> {
        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .output()
            .map_err(|source| ApkCertError::ToolSpawnFailed {
                tool: invocation.name.clone(),
                source
            })?;
        Ok(ToolOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned()
        })
    }
}

/// Runs a tool and turns an unsuccessful exit into
/// [ApkCertError::ToolInvocationFailed].
pub fn run_checked(tools: &dyn ToolRunner, invocation: &Invocation) -> Result<ToolOutput> {
    debug!("Running {invocation}");
    let output = tools.run(invocation)?;
    if output.success {
        Ok(output)
    } else {
        Err(ApkCertError::ToolInvocationFailed {
            tool: invocation.name.clone(),
            output: output.error_text()
        })
    }
}
