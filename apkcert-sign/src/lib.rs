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

//! # apkcert signing
//!
//! Signs and verifies APKs before they are installed for a test session by
//! driving the usual external tools: the `sign.jar`/`unsign.jar`/`verify.jar`
//! helpers, `jarsigner`, `keytool` and `zipalign`.
//!
//! ```no_run
//! use apkcert_sign::{check_apk_cert, sign, SigningConfig, SystemToolRunner, Toolchain};
//! # use std::path::Path;
//! # fn main() -> apkcert_sign::Result<()> {
//! let config = SigningConfig::new(Toolchain::discover("/opt/apkcert/helpers")?);
//! let apk = Path::new("app.apk");
//! if !check_apk_cert(&SystemToolRunner, &config, apk, "com.example.app")? {
//!     sign(&SystemToolRunner, &config, apk)?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Operations are blocking and take no locks. Two operations on the same
//! APK, or on the same package id, must not run at the same time: alignment
//! replaces the APK file and certificate checks share one extraction
//! directory per package.

pub mod aligner;
pub mod config;
pub mod fingerprint;
pub mod keystore;
pub mod sdk;
pub mod signer;
pub mod tools;
pub mod verifier;

pub use aligner::zip_align_apk;
pub use apkcert_common::{ApkCertError, Result};
pub use apkcert_zip::{list_signature_entries, SignatureEntry};
pub use config::{KeystoreConfig, SigningConfig, Toolchain};
pub use fingerprint::{Fingerprint, FingerprintPattern};
pub use keystore::{check_apk_keystore_match, get_certificate_fingerprint, get_keystore_md5};
pub use signer::{sign, sign_with_custom_cert, sign_with_default_cert};
pub use tools::{Invocation, SystemToolRunner, ToolOutput, ToolRunner};
pub use verifier::{check_apk_cert, check_custom_apk_cert, ensure_signed};
