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

use std::{io, path::PathBuf};

use thiserror::Error;
use zip::result::ZipError;

/// Common error type shared between the apkcert crates.
///
/// In general designed to avoid needing utilities like `map_err`.
#[derive(Debug, Error)]
pub enum ApkCertError {
    /// apkcert-cli encountered an error while processing something specific
    /// to the command line implementation.
    #[error("{0}")]
    Cli(String),
    /// The APK to sign does not exist. Raised before any tool is started.
    #[error("APK '{}' does not exist", .0.display())]
    ApkNotFound(PathBuf),
    /// The configured keystore file does not exist. Raised before any tool
    /// is started.
    #[error("Keystore '{}' does not exist", .0.display())]
    KeystoreNotFound(PathBuf),
    /// An operation needing keystore details was called with a
    /// configuration that signs with the default certificate.
    #[error("No keystore is configured")]
    KeystoreNotConfigured,
    /// A required environment variable, such as `JAVA_HOME`, is not set.
    #[error("The {0} environment variable is not set")]
    MissingEnvironment(String),
    /// A tool from the Android SDK build-tools (`zipalign`) couldn't be found.
    #[error("Could not find '{0}' in the Android SDK build-tools")]
    SdkToolNotFound(String),
    /// The operating system refused to start an external tool.
    #[error("Could not start {tool}: {source}")]
    ToolSpawnFailed {
        tool: String,
        #[source]
        source: io::Error
    },
    /// An external tool ran but exited unsuccessfully. `output` holds the
    /// tool's own error text.
    #[error("{tool} failed. Original error: {output}")]
    ToolInvocationFailed { tool: String, output: String },
    /// Signing an APK with `sign.jar`, `unsign.jar` or `jarsigner` failed.
    #[error("Could not sign '{}'. Original error: {reason}", .apk.display())]
    SigningFailed { apk: PathBuf, reason: String },
    /// `zipalign` failed. The APK on disk was left untouched.
    #[error("zipAlignApk failed for '{}'. Original error: {reason}", .apk.display())]
    AlignmentFailed { apk: PathBuf, reason: String },
    /// A fingerprint pattern couldn't be compiled, see [regex::Error].
    #[error("Invalid fingerprint pattern: {0}")]
    InvalidFingerprintPattern(#[from] regex::Error),
    /// An error occurred reading or writing the local filesystem.
    #[error("File I/O error: {0}")]
    FileIoError(#[from] io::Error),
    /// The APK couldn't be read as a zip archive.
    #[error("Could not read zip archive: {0}")]
    ZipReadingFailed(#[from] ZipError)
}

/// Result type where the error is always [ApkCertError].
pub type Result<T> = std::result::Result<T, ApkCertError>;

impl ApkCertError {
    /// The text that gets appended to a higher level failure, such as
    /// [ApkCertError::SigningFailed], when a tool step fails.
    pub fn tool_text(&self) -> String {
        match self {
            ApkCertError::ToolInvocationFailed { output, .. } => output.clone(),
            other => other.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_text_prefers_raw_tool_output() {
        let err = ApkCertError::ToolInvocationFailed {
            tool: "jarsigner".into(),
            output: "jarsigner: unable to open jar file".into()
        };
        assert_eq!(err.tool_text(), "jarsigner: unable to open jar file");
        assert_eq!(
            err.to_string(),
            "jarsigner failed. Original error: jarsigner: unable to open jar file"
        );
    }

    #[test]
    fn io_errors_convert_without_map_err() {
        fn read_missing() -> Result<Vec<u8>> {
            Ok(std::fs::read("/definitely/not/here.apk")?)
        }
        assert!(matches!(read_missing(), Err(ApkCertError::FileIoError(_))));
    }
}
