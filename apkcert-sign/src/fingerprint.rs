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

//! Scraping certificate fingerprints out of `keytool` output.
//!
//! `keytool -v -list` and `keytool -v -printcert` both print a block like:
//!
//! ```text
//! Certificate fingerprints:
//!          MD5:  E8:9B:15:8E:4B:CF:98:8E:BD:09:EB:83:F5:37:8E:87
//!          SHA1: 61:ED:37:7E:85:D3:86:A8:DF:EE:6B:86:4B:D8:5B:0B:FA:A5:AF:81
//!          SHA256: A4:0D:A8:0A:59:D1:70:CA:A9:50:CF:15:C1:8C:45:4D:...
//! ```
//!
//! A [FingerprintPattern] finds the first line naming its digest and
//! captures the colon separated hex bytes that follow on the same line.
//! Keep any change to the tool's output format contained in this module.

use apkcert_common::*;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use std::fmt;

static MD5: Lazy<FingerprintPattern> = Lazy::new(|| {
    FingerprintPattern::for_digest("MD5", 16).expect("valid MD5 fingerprint regex")
});
static SHA1: Lazy<FingerprintPattern> = Lazy::new(|| {
    FingerprintPattern::for_digest("SHA1", 20).expect("valid SHA1 fingerprint regex")
});
static SHA256: Lazy<FingerprintPattern> = Lazy::new(|| {
    FingerprintPattern::for_digest("SHA256", 32).expect("valid SHA256 fingerprint regex")
});

/// A certificate fingerprint as upper-case, colon separated hex bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Trims and upper-cases `raw` so fingerprints printed by different
    /// tools compare equal with plain string equality.
    pub fn normalize(raw: &str) -> Fingerprint {
        Fingerprint(raw.trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Case-insensitive, multi-line regex whose first capture group is the
/// fingerprint.
#[derive(Debug, Clone)]
pub struct FingerprintPattern(Regex);

impl FingerprintPattern {
    /// Compiles a custom pattern. Capture group 1 must hold the fingerprint.
    pub fn new(pattern: &str) -> Result<FingerprintPattern> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .multi_line(true)
            .build()?;
        Ok(FingerprintPattern(regex))
    }

    /// `label` followed, later on the same line, by `bytes` hex pairs.
    pub fn for_digest(label: &str, bytes: usize) -> Result<FingerprintPattern> {
        let pattern = format!(
            r"{}.*?((?:[0-9a-f]{{2}}:){{{}}}[0-9a-f]{{2}})",
            regex::escape(label),
            bytes.saturating_sub(1)
        );
        FingerprintPattern::new(&pattern)
    }

    pub fn md5() -> FingerprintPattern {
        MD5.clone()
    }

    pub fn sha1() -> FingerprintPattern {
        SHA1.clone()
    }

    pub fn sha256() -> FingerprintPattern {
        SHA256.clone()
    }

    /// The first fingerprint in `output`, or `None` when nothing matches.
    pub fn parse(&self, output: &str) -> Option<Fingerprint> {
        self.0
            .captures(output)
            .and_then(|captures| captures.get(1))
            .map(|m| Fingerprint::normalize(m.as_str()))
    }
}
