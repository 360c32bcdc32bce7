//! `quorum bundle` commands.
//!
//! - `quorum bundle new` - Start an unsigned bundle for an action
//! - `quorum bundle sign` - Add one approver's signature to a bundle
//! - `quorum bundle verify` - Decide a bundle against a registry file
//!
//! `verify` exits with 2 when the bundle is rejected.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Args, Subcommand};
use quorum_core::encoding::decode_fixed;
use quorum_core::{Action, AuthorizationBundle, AuthorizationService, RegistryConfig, Signer};

use super::{finish, print_json, read_json, write_json};

/// Bundle command group.
#[derive(Debug, Args)]
pub struct BundleCommand {
    #[command(subcommand)]
    pub subcommand: BundleSubcommand,
}

/// Bundle subcommands.
#[derive(Debug, Subcommand)]
pub enum BundleSubcommand {
    /// Create an unsigned bundle from an action file.
    New(NewArgs),

    /// Sign a bundle's action and append the entry.
    Sign(SignArgs),

    /// Verify a transfer bundle against a registry file.
    Verify(VerifyArgs),
}

/// Arguments for `quorum bundle new`.
#[derive(Debug, Args)]
pub struct NewArgs {
    /// Action JSON file
    #[arg(long)]
    pub action: PathBuf,

    /// Output bundle file
    #[arg(long)]
    pub out: PathBuf,
}

/// Arguments for `quorum bundle sign`.
#[derive(Debug, Args)]
pub struct SignArgs {
    /// Registry configuration file
    #[arg(short, long, default_value = "registry.toml")]
    pub config: PathBuf,

    /// Bundle JSON file, updated in place
    #[arg(long)]
    pub bundle: PathBuf,

    /// Approver Ed25519 secret seed (32 bytes hex)
    #[arg(long)]
    pub seed: String,
}

/// Arguments for `quorum bundle verify`.
#[derive(Debug, Args)]
pub struct VerifyArgs {
    /// Registry configuration file
    #[arg(short, long, default_value = "registry.toml")]
    pub config: PathBuf,

    /// Bundle JSON file
    #[arg(long)]
    pub bundle: PathBuf,
}

/// Run a bundle subcommand.
pub fn run(cmd: &BundleCommand) -> u8 {
    finish(match &cmd.subcommand {
        BundleSubcommand::New(args) => new(args),
        BundleSubcommand::Sign(args) => sign(args),
        BundleSubcommand::Verify(args) => verify(args),
    })
}

fn new(args: &NewArgs) -> Result<()> {
    let action: Action = read_json(&args.action)?;
    action.validate()?;
    write_json(&args.out, &AuthorizationBundle::new(action))
}

fn sign(args: &SignArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let signer = signer_from_hex(&args.seed)?;
    let mut bundle: AuthorizationBundle = read_json(&args.bundle)?;

    let tree = config.registry_tree()?;
    let identity = signer.identity();
    let (record, proof) = tree
        .prove_identity(&identity)
        .ok_or_else(|| anyhow!("{identity} is not a registered approver"))?;
    // Capacity here is an input error (exit 1).
    bundle
        .sign_and_push(&signer, record.weight, proof)
        .map_err(|err| anyhow!("cannot add entry to {}: {err}", args.bundle.display()))?;
    write_json(&args.bundle, &bundle)?;
    tracing::info!(%identity, weight = record.weight, entries = bundle.entries.len(), "bundle signed");
    Ok(())
}

fn verify(args: &VerifyArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let bundle: AuthorizationBundle = read_json(&args.bundle)?;
    let state = config.registry_state()?;

    let authorization = AuthorizationService::ed25519(config.account).authorize_transfer(
        &bundle,
        config.sequence,
        &state,
    )?;
    print_json(&authorization)
}

pub(super) fn load_config(path: &Path) -> Result<RegistryConfig> {
    RegistryConfig::from_file(path).with_context(|| format!("failed to load {}", path.display()))
}

pub(super) fn signer_from_hex(seed: &str) -> Result<Signer> {
    let seed = decode_fixed::<32>(seed.trim()).context("invalid seed")?;
    Ok(Signer::from_seed(&seed))
}
