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
    env, fs,
    path::{Path, PathBuf}
};
use tracing::debug;

/// Environment variables that may point at the Android SDK, in lookup order.
pub const SDK_ROOT_VARIABLES: &[&str] = &["ANDROID_HOME", "ANDROID_SDK_ROOT"];

/// Appends `.exe` on Windows.
pub fn executable_name(tool: &str) -> String {
    if cfg!(windows) {
        format!("{tool}.exe")
    } else {
        tool.to_string()
    }
}

pub fn sdk_root_from_env() -> Option<PathBuf> {
    SDK_ROOT_VARIABLES
        .iter()
        .filter_map(env::var_os)
        .find(|value| !value.is_empty())
        .map(PathBuf::from)
}

// "34.0.0" sorts above "30.0.0", which sorts above "30.0.0-rc4"
fn version_key(name: &str) -> Option<(Vec<u32>, bool)> {
    if !name.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    let (release, pre_release) = match name.split_once('-') {
        Some((release, _)) => (release, true),
        None => (name, false)
    };
    let numbers = release
        .split('.')
        .map(|part| part.parse().ok())
        .collect::<Option<Vec<u32>>>()?;
    Some((numbers, !pre_release))
}

/// Finds `tool` in the highest numbered `build-tools/<version>` directory
/// of an SDK that contains it.
pub fn find_build_tool(sdk_root: &Path, tool: &str) -> Result<PathBuf> {
    let build_tools = sdk_root.join("build-tools");
    let file_name = executable_name(tool);
    let mut candidates: Vec<((Vec<u32>, bool), PathBuf)> = vec![];
    if let Ok(versions) = fs::read_dir(&build_tools) {
        for version in versions.flatten() {
            let name = version.file_name().to_string_lossy().into_owned();
            let Some(key) = version_key(&name) else {
                continue;
            };
            let candidate = version.path().join(&file_name);
            if candidate.is_file() {
                candidates.push((key, candidate));
            }
        }
    }
    candidates.sort();
    let (_, path) = candidates
        .pop()
        .ok_or_else(|| ApkCertError::SdkToolNotFound(tool.to_string()))?;
    debug!("Using {tool} at {path:?}");
    Ok(path)
}

/// Looks for `zipalign` using [sdk_root_from_env].
pub fn find_zipalign_from_env() -> Result<PathBuf> {
    let sdk_root = sdk_root_from_env()
        .ok_or_else(|| ApkCertError::MissingEnvironment(SDK_ROOT_VARIABLES.join(" or ")))?;
    find_build_tool(&sdk_root, "zipalign")
}
