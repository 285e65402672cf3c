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

//! Reads APK files (zip archives) to find and extract their Signature
//! Scheme v1 signature blocks, eg. `META-INF/CERT.RSA`.

use apkcert_common::*;
use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf}
};
use tracing::{debug, warn};
use zip::ZipArchive;

const SIGNATURE_DIR: &str = "META-INF/";
const SIGNATURE_EXTENSION: &str = ".RSA";

/// A signature block entry found inside an APK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureEntry {
    /// Position of the entry in the zip central directory
    pub index: usize,
    /// Entry name exactly as stored in the archive
    pub name: String,
    /// Name as a relative path that is safe to join onto a directory
    pub relative_path: PathBuf
}

/// Whether a zip entry name is a signature block (`META-INF/*.RSA`).
/// Both the directory and the extension are matched case-insensitively.
pub fn is_signature_entry(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    upper.len() > SIGNATURE_DIR.len() + SIGNATURE_EXTENSION.len()
        && upper.starts_with(SIGNATURE_DIR)
        && upper.ends_with(SIGNATURE_EXTENSION)
}

/// An APK opened for inspection.
pub struct ApkArchive {
    path: PathBuf,
    zip: ZipArchive<File>
}

impl ApkArchive {
    pub fn open(path: impl AsRef<Path>) -> Result<ApkArchive> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let zip = ZipArchive::new(file)?;
        Ok(ApkArchive { path, zip })
    }

    /// Lists every signature block in the order the archive stores them.
    ///
    /// Only names are read here, so entries this build can't decompress
    /// don't get in the way. Entries whose names would escape an extraction
    /// directory (absolute paths, `..` components) are skipped.
    pub fn signature_entries(&mut self) -> Result<Vec<SignatureEntry>> {
        let mut entries = vec![];
        for index in 0..self.zip.len() {
            match self.zip.name_for_index(index) {
                Some(name) if is_signature_entry(name) => {}
                _ => continue
            }
            // Raw access skips setting up a decompressor
            let file = self.zip.by_index_raw(index)?;
            if file.is_dir() {
                continue;
            }
            match file.enclosed_name() {
                Some(relative_path) => entries.push(SignatureEntry {
                    index,
                    name: file.name().to_string(),
                    relative_path
                }),
                None => warn!("Ignoring signature entry with unsafe name {:?}", file.name())
            }
        }
        debug!(
            "Found {} signature entries in {:?}",
            entries.len(),
            self.path
        );
        Ok(entries)
    }

    /// Extracts one entry below `dest_dir`, keeping its relative path
    /// (`dest_dir/META-INF/CERT.RSA`). Returns the path written.
    pub fn extract_entry(&mut self, entry: &SignatureEntry, dest_dir: &Path) -> Result<PathBuf> {
        let out_path = dest_dir.join(&entry.relative_path);
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = self.zip.by_index(entry.index)?;
        let mut out = File::create(&out_path)?;
        io::copy(&mut file, &mut out)?;
        debug!("Extracted {} to {:?}", entry.name, out_path);
        Ok(out_path)
    }
}

/// Convenience wrapper around [ApkArchive::signature_entries].
pub fn list_signature_entries(apk: impl AsRef<Path>) -> Result<Vec<SignatureEntry>> {
    ApkArchive::open(apk)?.signature_entries()
}
