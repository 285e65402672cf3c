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
use std::{fs, io, path::Path};
use tracing::{debug, info};

use crate::{
    config::SigningConfig,
    tools::{run_checked, Invocation, ToolRunner}
};

/// Alignment boundary, in bytes, for uncompressed entries.
pub const ZIP_ALIGNMENT: &str = "4";

/// Runs `zipalign -f 4 <apk> <tmp>` and then moves the aligned copy over
/// `apk`, creating its parent directory if needed.
///
/// The move is the only step that touches `apk`, so a failing `zipalign`
/// leaves the original file as it was.
pub fn zip_align_apk(tools: &dyn ToolRunner, config: &SigningConfig, apk: &Path) -> Result<()> {
    info!("Zip-aligning {:?}", apk);
    fs::create_dir_all(&config.temp_root)?;
    let aligned = tempfile::Builder::new()
        .prefix("apkcert-")
        .suffix(".tmp")
        .tempfile_in(&config.temp_root)?
        .into_temp_path();

    let invocation = Invocation::new("zipalign", &config.toolchain.zipalign)
        .args(["-f", ZIP_ALIGNMENT])
        .arg(apk)
        .arg(aligned.as_os_str());
    run_checked(tools, &invocation).map_err(|e| ApkCertError::AlignmentFailed {
        apk: apk.to_path_buf(),
        reason: e.tool_text()
    })?;

    if let Some(parent) = apk.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    replace_file(&aligned, apk)?;
    debug!("{:?} is zip-aligned", apk);
    Ok(())
}

// Renames when possible. Across filesystems the rename fails and the
// aligned file is copied over `to` instead, which is not atomic; the temp
// file is removed when dropped.
fn replace_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => return Ok(()),
        Err(e) => debug!("Renaming {:?} to {:?} failed ({e}), copying instead", from, to)
    }
    fs::copy(from, to)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Toolchain,
        tools::{testing::FakeRunner, ToolOutput}
    };

    fn config(temp_root: &Path) -> SigningConfig {
        SigningConfig::new(Toolchain::new("/helpers", "/sdk/build-tools/34.0.0/zipalign"))
            .with_temp_root(temp_root)
    }

    #[test]
    fn aligned_output_replaces_apk() {
        let dir = tempfile::tempdir().unwrap();
        let apk = dir.path().join("app.apk");
        fs::write(&apk, b"unaligned").unwrap();
        let temp_root = dir.path().join("tmp");
        let tools = FakeRunner::default();

        zip_align_apk(&tools, &config(&temp_root), &apk).unwrap();

        let args = tools.args(0);
        assert_eq!(tools.names(), vec!["zipalign"]);
        assert_eq!(args[..3], ["-f", "4", apk.to_string_lossy().as_ref()]);
        assert!(args[3].starts_with(temp_root.to_string_lossy().as_ref()));
        // The fake tool writes nothing, so the empty temp file was moved in
        assert_eq!(fs::read(&apk).unwrap(), b"");
        assert_eq!(fs::read_dir(&temp_root).unwrap().count(), 0);
    }

    #[test]
    fn failed_alignment_leaves_apk_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let apk = dir.path().join("app.apk");
        fs::write(&apk, b"original bytes").unwrap();
        let tools = FakeRunner::default().respond(ToolOutput::failed(1, "Unable to open"));

        let err = zip_align_apk(&tools, &config(dir.path()), &apk).unwrap_err();

        match err {
            ApkCertError::AlignmentFailed { reason, .. } => assert_eq!(reason, "Unable to open"),
            other => panic!("unexpected error {other:?}")
        }
        assert_eq!(fs::read(&apk).unwrap(), b"original bytes");
    }

    #[test]
    fn missing_zipalign_is_an_alignment_failure() {
        let dir = tempfile::tempdir().unwrap();
        let apk = dir.path().join("app.apk");
        fs::write(&apk, b"original bytes").unwrap();
        let tools = FakeRunner::default().fail_to_spawn("zipalign");

        assert!(matches!(
            zip_align_apk(&tools, &config(dir.path()), &apk),
            Err(ApkCertError::AlignmentFailed { .. })
        ));
        assert_eq!(fs::read(&apk).unwrap(), b"original bytes");
    }

    #[test]
    fn replace_file_reports_failure_when_copy_also_fails() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("aligned.tmp");
        fs::write(&from, b"aligned").unwrap();
        // A directory can't be replaced by a file, so both steps fail
        let to = dir.path().join("app.apk");
        fs::create_dir(&to).unwrap();
        fs::write(to.join("inside"), b"x").unwrap();

        assert!(replace_file(&from, &to).is_err());
        assert!(to.join("inside").exists());
        assert_eq!(fs::read(&from).unwrap(), b"aligned");
    }

    #[test]
    fn replace_file_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("aligned.tmp");
        let to = dir.path().join("app.apk");
        fs::write(&from, b"aligned").unwrap();
        fs::write(&to, b"unaligned").unwrap();

        replace_file(&from, &to).unwrap();

        assert_eq!(fs::read(&to).unwrap(), b"aligned");
        assert!(!from.exists());
    }
}
