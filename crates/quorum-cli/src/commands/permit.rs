//! `quorum permit` commands.
//!
//! - `quorum permit new` - Start an unsigned permit bound to an action
//! - `quorum permit sign` - Add one approver's signature to a permit
//! - `quorum permit verify` - Decide a threshold update carried by a permit
//!
//! `verify` exits with 2 when the permit is rejected.

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::{Args, Subcommand};
use quorum_core::{Action, AuthEntry, AuthorizationService, Permit};

use super::bundle::{load_config, signer_from_hex};
use super::{finish, print_json, read_json, write_json};

/// Permit command group.
#[derive(Debug, Args)]
pub struct PermitCommand {
    #[command(subcommand)]
    pub subcommand: PermitSubcommand,
}

/// Permit subcommands.
#[derive(Debug, Subcommand)]
pub enum PermitSubcommand {
    /// Create an unsigned permit bound to an action's canonical bytes.
    New(NewArgs),

    /// Sign a permit and append the entry.
    Sign(SignArgs),

    /// Verify a threshold update permit against a registry file.
    Verify(VerifyArgs),
}

/// Arguments for `quorum permit new`.
#[derive(Debug, Args)]
pub struct NewArgs {
    /// Action JSON file the permit authorizes
    #[arg(long)]
    pub action: PathBuf,

    /// Output permit file
    #[arg(long)]
    pub out: PathBuf,
}

/// Arguments for `quorum permit sign`.
#[derive(Debug, Args)]
pub struct SignArgs {
    /// Registry configuration file
    #[arg(short, long, default_value = "registry.toml")]
    pub config: PathBuf,

    /// Permit JSON file, updated in place
    #[arg(long)]
    pub permit: PathBuf,

    /// Approver Ed25519 secret seed (32 bytes hex)
    #[arg(long)]
    pub seed: String,
}

/// Arguments for `quorum permit verify`.
#[derive(Debug, Args)]
pub struct VerifyArgs {
    /// Registry configuration file
    #[arg(short, long, default_value = "registry.toml")]
    pub config: PathBuf,

    /// Permit JSON file
    #[arg(long)]
    pub permit: PathBuf,

    /// Threshold update action JSON file
    #[arg(long)]
    pub action: PathBuf,
}

/// Run a permit subcommand.
pub fn run(cmd: &PermitCommand) -> u8 {
    finish(match &cmd.subcommand {
        PermitSubcommand::New(args) => new(args),
        PermitSubcommand::Sign(args) => sign(args),
        PermitSubcommand::Verify(args) => verify(args),
    })
}

fn new(args: &NewArgs) -> Result<()> {
    let action: Action = read_json(&args.action)?;
    action.validate()?;
    write_json(&args.out, &Permit::for_payload(&action.canonical_bytes(), Vec::new()))
}

fn sign(args: &SignArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let signer = signer_from_hex(&args.seed)?;
    let mut permit: Permit = read_json(&args.permit)?;

    let tree = config.registry_tree()?;
    let identity = signer.identity();
    let (record, proof) = tree
        .prove_identity(&identity)
        .ok_or_else(|| anyhow!("{identity} is not a registered approver"))?;
    let message = permit.signing_message();
    permit.push_entry(AuthEntry::sign(&signer, record.weight, proof, &message));
    write_json(&args.permit, &permit)?;
    tracing::info!(%identity, weight = record.weight, entries = permit.entries().len(), "permit signed");
    Ok(())
}

fn verify(args: &VerifyArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let permit: Permit = read_json(&args.permit)?;
    let update: Action = read_json(&args.action)?;
    let state = config.registry_state()?;

    let authorization = AuthorizationService::ed25519(config.account).authorize_threshold_update(
        permit,
        &update,
        config.sequence,
        &state,
    )?;
    print_json(&authorization)
}

#[cfg(test)]
mod tests {
    use quorum_core::{ApproverEntry, AuthorizationError, Identity, RegistryConfig};

    use super::*;
    use crate::commands::exit_codes;

    fn workspace(weights: &[u32]) -> (tempfile::TempDir, Vec<String>) {
        let dir = tempfile::tempdir().unwrap();
        let seeds: Vec<String> = (1..=weights.len())
            .map(|i| hex::encode([u8::try_from(i).unwrap(); 32]))
            .collect();
        let config = RegistryConfig {
            account: Identity::from_bytes([0xAA; 32]),
            threshold: 25,
            sequence: 2,
            approvers: seeds
                .iter()
                .zip(weights)
                .map(|(seed, weight)| ApproverEntry {
                    identity: signer_from_hex(seed).unwrap().identity(),
                    weight: *weight,
                })
                .collect(),
        };
        std::fs::write(dir.path().join("registry.toml"), config.to_toml().unwrap()).unwrap();
        for (name, threshold) in [("update.json", 40), ("other.json", 41)] {
            let action = Action::threshold_update(config.account, 2, threshold).unwrap();
            write_json(&dir.path().join(name), &action).unwrap();
        }
        (dir, seeds)
    }

    fn sign_all(dir: &tempfile::TempDir, seeds: &[String], action: &str) {
        new(&NewArgs {
            action: dir.path().join(action),
            out: dir.path().join("permit.json"),
        })
        .unwrap();
        for seed in seeds {
            sign(&SignArgs {
                config: dir.path().join("registry.toml"),
                permit: dir.path().join("permit.json"),
                seed: seed.clone(),
            })
            .unwrap();
        }
    }

    fn verify_against(dir: &tempfile::TempDir, action: &str) -> Result<()> {
        verify(&VerifyArgs {
            config: dir.path().join("registry.toml"),
            permit: dir.path().join("permit.json"),
            action: dir.path().join(action),
        })
    }

    #[test]
    fn signed_permit_verifies() {
        let (dir, seeds) = workspace(&[10, 20, 30]);
        sign_all(&dir, &seeds[1..], "update.json");
        assert!(verify_against(&dir, "update.json").is_ok());
    }

    #[test]
    fn permit_for_other_action_is_rejected() {
        let (dir, seeds) = workspace(&[10, 20, 30]);
        sign_all(&dir, &seeds, "other.json");
        let err = verify_against(&dir, "update.json").unwrap_err();
        assert_eq!(
            err.downcast_ref::<AuthorizationError>(),
            Some(&AuthorizationError::AuthDataMismatch)
        );
        assert_eq!(finish(Err(err)), exit_codes::REJECTED);
    }
}
