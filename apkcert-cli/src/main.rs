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

use apkcert_sign::{
    check_apk_cert, ensure_signed, get_keystore_md5, list_signature_entries, sign, zip_align_apk,
    ApkCertError, FingerprintPattern, KeystoreConfig, Result, SigningConfig, SystemToolRunner,
    Toolchain
};
use clap::{Args, Parser, Subcommand};
use std::{path::PathBuf, process::ExitCode};
use tracing::error;

mod logging;

/// Signs, checks and zip-aligns APKs before they are installed for testing.
#[derive(Parser)]
#[command(name = "apkcert", version)]
struct Cli {
    #[command(flatten)]
    tools: ToolArgs,

    #[command(flatten)]
    keystore: KeystoreArgs,

    /// Directory for alignment output and certificate extraction
    #[arg(long, global = true)]
    temp_dir: Option<PathBuf>,

    /// Log every tool invocation
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command
}

#[derive(Args)]
struct ToolArgs {
    /// Directory containing sign.jar, unsign.jar and verify.jar
    #[arg(long, env = "APKCERT_HELPERS", global = true)]
    helpers: Option<PathBuf>,

    /// zipalign binary. Defaults to the newest one in the Android SDK
    #[arg(long, global = true)]
    zipalign: Option<PathBuf>,

    /// JDK root holding keytool and jarsigner
    #[arg(long, env = "JAVA_HOME", global = true)]
    java_home: Option<PathBuf>
}

#[derive(Args)]
struct KeystoreArgs {
    /// Sign with this keystore instead of the default certificate
    #[arg(long, global = true, requires_all = ["storepass", "alias"])]
    keystore: Option<PathBuf>,

    /// Keystore password
    #[arg(long, global = true)]
    storepass: Option<String>,

    /// Alias of the signing key
    #[arg(long, global = true)]
    alias: Option<String>,

    /// Key password, if different from the keystore password
    #[arg(long, global = true)]
    keypass: Option<String>
}

#[derive(Subcommand)]
enum Command {
    /// Sign an APK and zip-align it
    Sign { apk: PathBuf },
    /// Report whether an APK is signed with the expected certificate
    Check { apk: PathBuf, package: String },
    /// Sign an APK only if it isn't signed with the expected certificate
    EnsureSigned { apk: PathBuf, package: String },
    /// Zip-align an APK in place
    Align { apk: PathBuf },
    /// Print the MD5 fingerprint of the configured key
    Fingerprint,
    /// List the signature blocks inside an APK
    Entries { apk: PathBuf }
}

fn signing_config(cli: &Cli) -> Result<SigningConfig> {
    let helpers = cli
        .tools
        .helpers
        .clone()
        .ok_or(ApkCertError::Cli("Helper jar directory not provided (--helpers)".into()))?;
    let toolchain = match &cli.tools.zipalign {
        Some(zipalign) => Toolchain::new(helpers, zipalign),
        None => Toolchain::discover(helpers)?
    }
    .with_java_home(cli.tools.java_home.clone());

    let mut config = SigningConfig::new(toolchain);
    if let Some(path) = &cli.keystore.keystore {
        let password = cli.keystore.storepass.clone().unwrap_or_default();
        config = config.with_keystore(KeystoreConfig {
            path: path.clone(),
            key_password: cli.keystore.keypass.clone().unwrap_or_else(|| password.clone()),
            password,
            alias: cli.keystore.alias.clone().unwrap_or_default()
        });
    }
    if let Some(temp_dir) = &cli.temp_dir {
        config = config.with_temp_root(temp_dir);
    }
    Ok(config)
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let tools = SystemToolRunner;
    match &cli.command {
        Command::Sign { apk } => {
            sign(&tools, &signing_config(cli)?, apk)?;
            println!("Signed and aligned {}", apk.display());
        }
        Command::Check { apk, package } => {
            if check_apk_cert(&tools, &signing_config(cli)?, apk, package)? {
                println!("{} is signed", apk.display());
            } else {
                println!("{} is not signed", apk.display());
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::EnsureSigned { apk, package } => {
            if ensure_signed(&tools, &signing_config(cli)?, apk, package)? {
                println!("Signed and aligned {}", apk.display());
            } else {
                println!("{} was already signed", apk.display());
            }
        }
        Command::Align { apk } => {
            zip_align_apk(&tools, &signing_config(cli)?, apk)?;
            println!("Aligned {}", apk.display());
        }
        Command::Fingerprint => {
            let config = signing_config(cli)?;
            config.existing_keystore()?;
            let keytool = config.toolchain.keytool()?;
            match get_keystore_md5(&tools, &config, &keytool, &FingerprintPattern::md5())? {
                Some(fingerprint) => println!("{fingerprint}"),
                None => {
                    println!("No MD5 fingerprint found");
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Command::Entries { apk } => {
            for entry in list_signature_entries(apk)? {
                println!("{}", entry.name);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Run with the helper jar directory and a subcommand:
///
/// ```
/// $ apkcert --helpers ./helpers check app.apk com.example.app
/// app.apk is not signed
/// $ apkcert --helpers ./helpers sign app.apk
/// Signed and aligned app.apk
/// ```
///
/// To sign with a keystore instead of the default certificate, use:
///
/// ```
/// $ apkcert --helpers ./helpers --keystore release.keystore --storepass pw \
///     --alias release ensure-signed app.apk com.example.app
/// ```
///
/// `check` exits with 1 when the APK is not signed. Errors exit with 2.
fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);
    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn key_password_defaults_to_store_password() {
        let cli = Cli::try_parse_from([
            "apkcert",
            "--helpers",
            "/helpers",
            "--zipalign",
            "/sdk/zipalign",
            "--keystore",
            "release.keystore",
            "--storepass",
            "secret",
            "--alias",
            "release",
            "fingerprint"
        ])
        .unwrap();
        let config = signing_config(&cli).unwrap();
        let keystore = config.keystore().unwrap();
        assert_eq!(keystore.key_password, "secret");
        assert_eq!(keystore.alias, "release");
        assert_eq!(config.toolchain.zipalign, PathBuf::from("/sdk/zipalign"));
    }

    #[test]
    fn keystore_needs_alias_and_password() {
        assert!(Cli::try_parse_from([
            "apkcert",
            "--keystore",
            "release.keystore",
            "sign",
            "app.apk"
        ])
        .is_err());
    }

    #[test]
    fn default_certificate_without_keystore() {
        let cli = Cli::try_parse_from([
            "apkcert",
            "--helpers",
            "/helpers",
            "--zipalign",
            "/sdk/zipalign",
            "check",
            "app.apk",
            "com.example.app"
        ])
        .unwrap();
        assert!(!signing_config(&cli).unwrap().uses_keystore());
    }
}
