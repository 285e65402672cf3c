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
use std::path::Path;
use tracing::info;

use crate::{
    aligner::zip_align_apk,
    config::SigningConfig,
    tools::{run_checked, Invocation, ToolRunner}
};

/// Helper jar that signs with its bundled default certificate.
pub const SIGN_JAR: &str = "sign.jar";
/// Helper jar that strips an existing signature.
pub const UNSIGN_JAR: &str = "unsign.jar";

/// Jar signing algorithms passed to `jarsigner`.
pub const SIGNATURE_ALGORITHM: &str = "MD5withRSA";
pub const DIGEST_ALGORITHM: &str = "SHA1";

fn require_apk(apk: &Path) -> Result<()> {
    if !apk.exists() {
        return Err(ApkCertError::ApkNotFound(apk.to_path_buf()));
    }
    Ok(())
}

fn signing_failed(apk: &Path) -> impl FnOnce(ApkCertError) -> ApkCertError + '_ {
    move |e| ApkCertError::SigningFailed {
        apk: apk.to_path_buf(),
        reason: e.tool_text()
    }
}

/// Signs `apk` in place with `java -jar sign.jar <apk> --override`.
pub fn sign_with_default_cert(
    tools: &dyn ToolRunner,
    config: &SigningConfig,
    apk: &Path
) -> Result<()> {
    require_apk(apk)?;
    info!("Signing {:?} with the default certificate", apk);
    let toolchain = &config.toolchain;
    let invocation = Invocation::new(SIGN_JAR, toolchain.java())
        .arg("-jar")
        .arg(toolchain.helper_jar(SIGN_JAR))
        .arg(apk)
        .arg("--override");
    run_checked(tools, &invocation).map_err(signing_failed(apk))?;
    Ok(())
}

/// Strips any existing signature with `unsign.jar`, then signs `apk` with
/// the configured keystore using `jarsigner`.
pub fn sign_with_custom_cert(
    tools: &dyn ToolRunner,
    config: &SigningConfig,
    apk: &Path
) -> Result<()> {
    let keystore = config.existing_keystore()?;
    require_apk(apk)?;
    let toolchain = &config.toolchain;
    let jarsigner = toolchain.jarsigner()?;
    info!("Signing {:?} with keystore {:?}", apk, keystore.path);

    let unsign = Invocation::new(UNSIGN_JAR, toolchain.java())
        .arg("-jar")
        .arg(toolchain.helper_jar(UNSIGN_JAR))
        .arg(apk);
    run_checked(tools, &unsign).map_err(signing_failed(apk))?;

    let sign = Invocation::new("jarsigner", jarsigner)
        .args(["-sigalg", SIGNATURE_ALGORITHM, "-digestalg", DIGEST_ALGORITHM])
        .arg("-keystore")
        .arg(&keystore.path)
        .arg("-storepass")
        .secret_arg(&keystore.password)
        .arg("-keypass")
        .secret_arg(&keystore.key_password)
        .arg(apk)
        .arg(&keystore.alias);
    run_checked(tools, &sign).map_err(signing_failed(apk))?;
    Ok(())
}

/// Signs `apk` with the keystore if one is configured, otherwise with the
/// default certificate, and then zip-aligns it. Signing rewrites the
/// archive so it always comes first.
pub fn sign(tools: &dyn ToolRunner, config: &SigningConfig, apk: &Path) -> Result<()> {
    if config.uses_keystore() {
        sign_with_custom_cert(tools, config, apk)?;
    } else {
        sign_with_default_cert(tools, config, apk)?;
    }
    zip_align_apk(tools, config, apk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{KeystoreConfig, Toolchain},
        sdk::executable_name,
        tools::{testing::FakeRunner, ToolOutput}
    };
    use std::fs;

    fn default_config(temp_root: &Path) -> SigningConfig {
        SigningConfig::new(
            Toolchain::new("/helpers", "/sdk/zipalign").with_java_home(Some("/jdk".into()))
        )
        .with_temp_root(temp_root)
    }

    fn keystore_config(temp_root: &Path, keystore: &Path) -> SigningConfig {
        default_config(temp_root).with_keystore(KeystoreConfig {
            path: keystore.to_path_buf(),
            password: "storepass".into(),
            alias: "release".into(),
            key_password: "keypass".into()
        })
    }

    #[test]
    fn default_cert_invocation() {
        let dir = tempfile::tempdir().unwrap();
        let apk = dir.path().join("app.apk");
        fs::write(&apk, b"apk").unwrap();
        let tools = FakeRunner::default();

        sign_with_default_cert(&tools, &default_config(dir.path()), &apk).unwrap();

        let call = tools.calls.borrow()[0].clone();
        assert_eq!(call.program, Path::new("/jdk/bin").join(executable_name("java")));
        assert_eq!(
            tools.args(0),
            vec![
                "-jar".to_string(),
                "/helpers/sign.jar".to_string(),
                apk.to_string_lossy().into_owned(),
                "--override".to_string()
            ]
        );
    }

    #[test]
    fn missing_apk_fails_before_any_tool_runs() {
        let dir = tempfile::tempdir().unwrap();
        let apk = dir.path().join("missing.apk");
        let tools = FakeRunner::default();

        assert!(matches!(
            sign_with_default_cert(&tools, &default_config(dir.path()), &apk),
            Err(ApkCertError::ApkNotFound(_))
        ));
        assert!(tools.calls.borrow().is_empty());
    }

    #[test]
    fn default_cert_failure_carries_tool_text() {
        let dir = tempfile::tempdir().unwrap();
        let apk = dir.path().join("app.apk");
        fs::write(&apk, b"apk").unwrap();
        let tools = FakeRunner::default().respond(ToolOutput::failed(1, "Invalid APK"));

        let err = sign_with_default_cert(&tools, &default_config(dir.path()), &apk).unwrap_err();
        assert!(matches!(&err, ApkCertError::SigningFailed { reason, .. } if reason == "Invalid APK"));
        assert!(err.to_string().contains("Invalid APK"));
    }

    #[test]
    fn custom_cert_unsigns_then_runs_jarsigner() {
        let dir = tempfile::tempdir().unwrap();
        let apk = dir.path().join("app.apk");
        let keystore = dir.path().join("release.keystore");
        fs::write(&apk, b"apk").unwrap();
        fs::write(&keystore, b"keystore").unwrap();
        let tools = FakeRunner::default();

        sign_with_custom_cert(&tools, &keystore_config(dir.path(), &keystore), &apk).unwrap();

        assert_eq!(tools.names(), vec!["unsign.jar", "jarsigner"]);
        let apk_arg = apk.to_string_lossy().into_owned();
        assert_eq!(
            tools.args(0),
            vec!["-jar".to_string(), "/helpers/unsign.jar".to_string(), apk_arg.clone()]
        );
        assert_eq!(
            tools.args(1),
            vec![
                "-sigalg".to_string(),
                "MD5withRSA".to_string(),
                "-digestalg".to_string(),
                "SHA1".to_string(),
                "-keystore".to_string(),
                keystore.to_string_lossy().into_owned(),
                "-storepass".to_string(),
                "storepass".to_string(),
                "-keypass".to_string(),
                "keypass".to_string(),
                apk_arg,
                "release".to_string()
            ]
        );
        let shown = tools.calls.borrow()[1].to_string();
        assert!(shown.contains("-storepass ****** -keypass ******"));
    }

    #[test]
    fn custom_cert_requires_keystore_file() {
        let dir = tempfile::tempdir().unwrap();
        let apk = dir.path().join("app.apk");
        fs::write(&apk, b"apk").unwrap();
        let config = keystore_config(dir.path(), &dir.path().join("missing.keystore"));
        let tools = FakeRunner::default();

        assert!(matches!(
            sign_with_custom_cert(&tools, &config, &apk),
            Err(ApkCertError::KeystoreNotFound(_))
        ));
        assert!(tools.calls.borrow().is_empty());
    }

    #[test]
    fn unsign_failure_stops_signing() {
        let dir = tempfile::tempdir().unwrap();
        let apk = dir.path().join("app.apk");
        let keystore = dir.path().join("release.keystore");
        fs::write(&apk, b"apk").unwrap();
        fs::write(&keystore, b"keystore").unwrap();
        let tools = FakeRunner::default().respond(ToolOutput::failed(1, "zip END header not found"));

        assert!(matches!(
            sign_with_custom_cert(&tools, &keystore_config(dir.path(), &keystore), &apk),
            Err(ApkCertError::SigningFailed { .. })
        ));
        assert_eq!(tools.names(), vec!["unsign.jar"]);
    }

    #[test]
    fn sign_aligns_after_signing() {
        let dir = tempfile::tempdir().unwrap();
        let apk = dir.path().join("app.apk");
        fs::write(&apk, b"apk").unwrap();
        let tools = FakeRunner::default();

        sign(&tools, &default_config(dir.path()), &apk).unwrap();

        assert_eq!(tools.names(), vec!["sign.jar", "zipalign"]);
    }

    #[test]
    fn sign_does_not_align_when_signing_fails() {
        let dir = tempfile::tempdir().unwrap();
        let apk = dir.path().join("app.apk");
        fs::write(&apk, b"apk").unwrap();
        let tools = FakeRunner::default().respond(ToolOutput::failed(1, "boom"));

        assert!(sign(&tools, &default_config(dir.path()), &apk).is_err());
        assert_eq!(tools.names(), vec!["sign.jar"]);
        assert_eq!(fs::read(&apk).unwrap(), b"apk");
    }
}
