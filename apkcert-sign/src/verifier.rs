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
use tracing::{debug, info, warn};

use crate::{
    aligner::zip_align_apk,
    config::SigningConfig,
    fingerprint::FingerprintPattern,
    keystore::{check_apk_keystore_match, get_keystore_md5},
    signer::sign,
    tools::{run_checked, Invocation, ToolRunner}
};

/// Helper jar that verifies an APK is signed with the default certificate.
pub const VERIFY_JAR: &str = "verify.jar";

/// Whether `apk` is already signed with the expected certificate.
///
/// A missing APK is simply "not signed" and no tool is run. With a
/// keystore configured this defers to [check_custom_apk_cert]. Otherwise
/// `verify.jar` decides: on success the APK is zip-aligned and `true` is
/// returned. Any failure of that step, whether the signature is bad or
/// the tool itself broke, reads as "not signed".
pub fn check_apk_cert(
    tools: &dyn ToolRunner,
    config: &SigningConfig,
    apk: &Path,
    package_id: &str
) -> Result<bool> {
    if !apk.exists() {
        debug!("APK {:?} does not exist", apk);
        return Ok(false);
    }
    if config.uses_keystore() {
        return check_custom_apk_cert(tools, config, apk, package_id);
    }

    let toolchain = &config.toolchain;
    let verify = Invocation::new(VERIFY_JAR, toolchain.java())
        .arg("-jar")
        .arg(toolchain.helper_jar(VERIFY_JAR))
        .arg(apk);
    let verified = run_checked(tools, &verify).and_then(|_| {
        debug!("{:?} is already signed", apk);
        zip_align_apk(tools, config, apk)
    });
    match verified {
        Ok(()) => Ok(true),
        Err(e) => {
            debug!("{:?} is not signed with the default certificate: {e}", apk);
            Ok(false)
        }
    }
}

/// Whether one of the signatures in `apk` was made with the configured
/// keystore, compared by MD5 certificate fingerprint.
pub fn check_custom_apk_cert(
    tools: &dyn ToolRunner,
    config: &SigningConfig,
    apk: &Path,
    package_id: &str
) -> Result<bool> {
    let keytool = config.toolchain.keytool()?;
    config.existing_keystore()?;
    let pattern = FingerprintPattern::md5();
    let Some(keystore_fingerprint) = get_keystore_md5(tools, config, &keytool, &pattern)? else {
        warn!("Could not read an MD5 fingerprint from the keystore, treating {:?} as unsigned", apk);
        return Ok(false);
    };
    check_apk_keystore_match(
        tools,
        config,
        &keytool,
        &pattern,
        &keystore_fingerprint,
        package_id,
        apk
    )
}

/// Checks `apk` and signs it when the check fails. Returns `true` if the
/// APK had to be signed.
pub fn ensure_signed(
    tools: &dyn ToolRunner,
    config: &SigningConfig,
    apk: &Path,
    package_id: &str
) -> Result<bool> {
    if check_apk_cert(tools, config, apk, package_id)? {
        info!("{:?} is already signed", apk);
        return Ok(false);
    }
    sign(tools, config, apk)?;
    Ok(true)
}
