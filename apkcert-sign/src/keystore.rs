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

//! Comparing the certificate inside an APK with the one in a keystore.

use apkcert_common::*;
use apkcert_zip::ApkArchive;
use std::{fs, path::Path};
use tracing::{debug, info};

use crate::{
    config::SigningConfig,
    fingerprint::{Fingerprint, FingerprintPattern},
    tools::{run_checked, Invocation, ToolRunner}
};

/// Fingerprint of the configured key, read with
/// `keytool -v -list -alias <alias> -keystore <path> -storepass <password>`.
///
/// Returns `None` when the listing has no line matching `pattern`.
pub fn get_keystore_md5(
    tools: &dyn ToolRunner,
    config: &SigningConfig,
    keytool: &Path,
    pattern: &FingerprintPattern
) -> Result<Option<Fingerprint>> {
    let keystore = config.keystore()?;
    let invocation = Invocation::new("keytool", keytool)
        .args(["-v", "-list", "-alias"])
        .arg(&keystore.alias)
        .arg("-keystore")
        .arg(&keystore.path)
        .arg("-storepass")
        .secret_arg(&keystore.password);
    let output = run_checked(tools, &invocation).map_err(|e| ApkCertError::ToolInvocationFailed {
        tool: "keytool -list".into(),
        output: e.tool_text()
    })?;
    let fingerprint = pattern.parse(&output.stdout);
    match &fingerprint {
        Some(fingerprint) => debug!("Keystore fingerprint: {fingerprint}"),
        None => debug!("No fingerprint found in keytool output for {:?}", keystore.path)
    }
    Ok(fingerprint)
}

/// Fingerprint of a certificate file, read with
/// `keytool -v -printcert -file <cert_file>`.
pub fn get_certificate_fingerprint(
    tools: &dyn ToolRunner,
    keytool: &Path,
    pattern: &FingerprintPattern,
    cert_file: &Path
) -> Result<Option<Fingerprint>> {
    let invocation = Invocation::new("keytool", keytool)
        .args(["-v", "-printcert", "-file"])
        .arg(cert_file);
    let output = run_checked(tools, &invocation)?;
    Ok(pattern.parse(&output.stdout))
}

/// Whether any `META-INF/*.RSA` block in `apk` carries the keystore's
/// certificate.
///
/// Every block is extracted, in archive order, into the package's temp
/// directory (cleared first) and printed with `keytool`. The first block
/// whose fingerprint equals `keystore_fingerprint` wins.
pub fn check_apk_keystore_match(
    tools: &dyn ToolRunner,
    config: &SigningConfig,
    keytool: &Path,
    pattern: &FingerprintPattern,
    keystore_fingerprint: &Fingerprint,
    package_id: &str,
    apk: &Path
) -> Result<bool> {
    let mut archive = ApkArchive::open(apk)?;
    let entries = archive.signature_entries()?;
    let extract_dir = config.package_temp_dir(package_id);

    for entry in &entries {
        clear_dir(&extract_dir)?;
        let cert_file = archive.extract_entry(entry, &extract_dir)?;
        let Some(fingerprint) = get_certificate_fingerprint(tools, keytool, pattern, &cert_file)?
        else {
            debug!("No fingerprint found for {}", entry.name);
            continue;
        };
        if &fingerprint == keystore_fingerprint {
            info!("{} in {:?} matches the keystore certificate", entry.name, apk);
            return Ok(true);
        }
        debug!(
            "{} fingerprint {fingerprint} does not match {keystore_fingerprint}",
            entry.name
        );
    }

    debug!("No signature in {:?} matches the keystore", apk);
    Ok(false)
}

fn clear_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    Ok(())
}
