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

use apkcert_common::*;
use std::{
    env,
    path::{Path, PathBuf}
};

use crate::sdk::{executable_name, find_zipalign_from_env};

/// Credentials for signing with a custom keystore instead of the default
/// certificate bundled with the helper jars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeystoreConfig {
    /// Path to the keystore file
    pub path: PathBuf,
    /// Keystore password (`-storepass`)
    pub password: String,
    /// Alias of the signing key inside the keystore
    pub alias: String,
    /// Password of the key itself (`-keypass`)
    pub key_password: String
}

/// Where the external tools live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    /// Directory holding `sign.jar`, `unsign.jar` and `verify.jar`
    pub helper_jar_dir: PathBuf,
    /// Root of the JDK (`JAVA_HOME`). `keytool` and `jarsigner` are only
    /// looked up here.
    pub java_home: Option<PathBuf>,
    /// The `zipalign` binary from the Android SDK build-tools
    pub zipalign: PathBuf
}

impl Toolchain {
    pub fn new(helper_jar_dir: impl Into<PathBuf>, zipalign: impl Into<PathBuf>) -> Toolchain {
        Toolchain {
            helper_jar_dir: helper_jar_dir.into(),
            java_home: None,
            zipalign: zipalign.into()
        }
    }

    /// Reads `JAVA_HOME` and finds `zipalign` in the Android SDK named by
    /// `ANDROID_HOME` or `ANDROID_SDK_ROOT`.
    pub fn discover(helper_jar_dir: impl Into<PathBuf>) -> Result<Toolchain> {
        let zipalign = find_zipalign_from_env()?;
        Ok(Toolchain::new(helper_jar_dir, zipalign).with_java_home(java_home_from_env()))
    }

    pub fn with_java_home(mut self, java_home: Option<PathBuf>) -> Toolchain {
        self.java_home = java_home;
        self
    }

    /// `JAVA_HOME/bin/java` when a Java home is known, otherwise `java` from
    /// the `PATH`.
    pub fn java(&self) -> PathBuf {
        match &self.java_home {
            Some(home) => home.join("bin").join(executable_name("java")),
            None => PathBuf::from(executable_name("java"))
        }
    }

    pub fn helper_jar(&self, name: &str) -> PathBuf {
        self.helper_jar_dir.join(name)
    }

    pub fn java_home(&self) -> Result<&Path> {
        self.java_home
            .as_deref()
            .ok_or_else(|| ApkCertError::MissingEnvironment("JAVA_HOME".into()))
    }

    pub fn keytool(&self) -> Result<PathBuf> {
        self.jdk_tool("keytool")
    }

    pub fn jarsigner(&self) -> Result<PathBuf> {
        self.jdk_tool("jarsigner")
    }

    fn jdk_tool(&self, tool: &str) -> Result<PathBuf> {
        Ok(self.java_home()?.join("bin").join(executable_name(tool)))
    }
}

/// `JAVA_HOME`, ignoring an empty value.
pub fn java_home_from_env() -> Option<PathBuf> {
    env::var_os("JAVA_HOME")
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
}

/// Default [SigningConfig::temp_root] below the system temp directory.
pub const TEMP_DIR_NAME: &str = "apkcert";
/// Subdirectory of the temp root holding the per-package extraction
/// directories. Nothing outside it is ever cleared.
pub const CERTS_DIR_NAME: &str = "certs";

/// Everything a signing session needs. Built once by the caller and then
/// only ever passed by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningConfig {
    /// `Some` when APKs are signed with a custom keystore
    pub keystore: Option<KeystoreConfig>,
    pub toolchain: Toolchain,
    /// Parent of the alignment output files and per-package certificate
    /// extraction directories
    pub temp_root: PathBuf
}

impl SigningConfig {
    /// A configuration that signs with the helper jars' default certificate.
    pub fn new(toolchain: Toolchain) -> SigningConfig {
        SigningConfig {
            keystore: None,
            toolchain,
            temp_root: env::temp_dir().join(TEMP_DIR_NAME)
        }
    }

    pub fn with_keystore(mut self, keystore: KeystoreConfig) -> SigningConfig {
        self.keystore = Some(keystore);
        self
    }

    pub fn with_temp_root(mut self, temp_root: impl Into<PathBuf>) -> SigningConfig {
        self.temp_root = temp_root.into();
        self
    }

    pub fn uses_keystore(&self) -> bool {
        self.keystore.is_some()
    }

    pub fn keystore(&self) -> Result<&KeystoreConfig> {
        self.keystore
            .as_ref()
            .ok_or(ApkCertError::KeystoreNotConfigured)
    }

    /// The configured keystore, failing if its file is missing.
    pub fn existing_keystore(&self) -> Result<&KeystoreConfig> {
        let keystore = self.keystore()?;
        if !keystore.path.exists() {
            return Err(ApkCertError::KeystoreNotFound(keystore.path.clone()));
        }
        Ok(keystore)
    }

    /// Directory that signature blocks of `package_id` are extracted to,
    /// `<temp_root>/certs/<package_id>`. It is shared by every check of the
    /// same package and cleared before each extraction.
    pub fn package_temp_dir(&self, package_id: &str) -> PathBuf {
        let certs = self.temp_root.join(CERTS_DIR_NAME);
        let name: String = package_id
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        match name.as_str() {
            "" | "." | ".." => certs.join("_"),
            _ => certs.join(name)
        }
    }
}
