//! `quorum registry` commands.
//!
//! - `quorum registry init` - Write a registry file from approver arguments
//! - `quorum registry root` - Show the committed root and registry state
//! - `quorum registry prove` - Export an approver's membership proof

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Subcommand};
use quorum_core::{
    ApproverEntry, ApproverRecord, Hash, Identity, MembershipProof, RegistryConfig, RegistryState,
};
use serde::Serialize;

use super::{finish, print_json};

/// Registry command group.
#[derive(Debug, Args)]
pub struct RegistryCommand {
    #[command(subcommand)]
    pub subcommand: RegistrySubcommand,
}

/// Registry subcommands.
#[derive(Debug, Subcommand)]
pub enum RegistrySubcommand {
    /// Create or overwrite a registry file.
    ///
    /// Approvers keep the order given on the command line; approver `i`
    /// occupies registry leaf `i`.
    Init(InitArgs),

    /// Show the registry root, threshold and version hash.
    Root(ConfigArgs),

    /// Export the membership proof of one approver.
    Prove(ProveArgs),
}

/// Path to a registry file.
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Registry configuration file
    #[arg(short, long, default_value = "registry.toml")]
    pub config: PathBuf,
}

/// Arguments for `quorum registry init`.
#[derive(Debug, Args)]
pub struct InitArgs {
    /// Output path
    #[arg(short, long, default_value = "registry.toml")]
    pub config: PathBuf,

    /// Account identity (hex)
    #[arg(long)]
    pub account: String,

    /// Approval threshold
    #[arg(long)]
    pub threshold: u32,

    /// Current account sequence number
    #[arg(long, default_value = "0")]
    pub sequence: u32,

    /// Approver as `<identity-hex>:<weight>`; repeat for each approver
    #[arg(long = "approver", value_name = "IDENTITY:WEIGHT")]
    pub approvers: Vec<String>,
}

/// Arguments for `quorum registry prove`.
#[derive(Debug, Args)]
pub struct ProveArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Approver identity (hex)
    #[arg(long)]
    pub identity: String,
}

#[derive(Debug, Serialize)]
struct RootResponse {
    account: Identity,
    #[serde(flatten)]
    state: RegistryState,
    sequence: u32,
    approvers: usize,
    total_weight: u64,
}

#[derive(Debug, Serialize)]
struct ProveResponse {
    index: u32,
    approver: ApproverRecord,
    #[serde(with = "quorum_core::encoding::hex32")]
    root: Hash,
    proof: MembershipProof,
}

/// Run a registry subcommand.
pub fn run(cmd: &RegistryCommand) -> u8 {
    finish(match &cmd.subcommand {
        RegistrySubcommand::Init(args) => init(args),
        RegistrySubcommand::Root(args) => root(args),
        RegistrySubcommand::Prove(args) => prove(args),
    })
}

fn init(args: &InitArgs) -> Result<()> {
    let approvers = args
        .approvers
        .iter()
        .map(String::as_str)
        .map(parse_approver)
        .collect::<Result<Vec<_>>>()?;
    let config = RegistryConfig {
        account: Identity::from_hex(&args.account).map_err(|e| anyhow!("invalid account: {e}"))?,
        threshold: args.threshold,
        sequence: args.sequence,
        approvers,
    };
    config.validate().context("invalid registry")?;

    let content = config.to_toml()?;
    std::fs::write(&args.config, content)
        .with_context(|| format!("failed to write {}", args.config.display()))?;
    tracing::info!(path = %args.config.display(), approvers = config.approvers.len(), "registry written");

    let state = config.registry_state()?;
    print_json(&state)
}

fn root(args: &ConfigArgs) -> Result<()> {
    let config = RegistryConfig::from_file(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    let tree = config.registry_tree()?;
    print_json(&RootResponse {
        account: config.account,
        state: config.registry_state()?,
        sequence: config.sequence,
        approvers: tree.len(),
        total_weight: tree.total_weight(),
    })
}

fn prove(args: &ProveArgs) -> Result<()> {
    let config = RegistryConfig::from_file(&args.config.config)
        .with_context(|| format!("failed to load {}", args.config.config.display()))?;
    let identity =
        Identity::from_hex(&args.identity).map_err(|e| anyhow!("invalid identity: {e}"))?;
    let tree = config.registry_tree()?;
    let index = tree
        .position(&identity)
        .ok_or_else(|| anyhow!("{identity} is not a registered approver"))?;
    let (approver, proof) = tree
        .prove_identity(&identity)
        .ok_or_else(|| anyhow!("{identity} is not a registered approver"))?;
    print_json(&ProveResponse {
        index,
        approver,
        root: tree.root(),
        proof,
    })
}

/// Parse `<identity-hex>:<weight>`.
fn parse_approver(arg: &str) -> Result<ApproverEntry> {
    let Some((identity, weight)) = arg.split_once(':') else {
        bail!("approver `{arg}` must look like <identity-hex>:<weight>");
    };
    Ok(ApproverEntry {
        identity: Identity::from_hex(identity).map_err(|e| anyhow!("approver `{arg}`: {e}"))?,
        weight: weight
            .trim()
            .parse()
            .with_context(|| format!("approver `{arg}`: invalid weight"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_approver_argument() {
        let arg = format!("{}:42", "ab".repeat(32));
        let entry = parse_approver(&arg).unwrap();
        assert_eq!(entry.weight, 42);
        assert_eq!(entry.identity, Identity::from_bytes([0xAB; 32]));
    }

    #[test]
    fn rejects_malformed_approver_argument() {
        assert!(parse_approver("no-colon").is_err());
        assert!(parse_approver(&format!("{}:heavy", "ab".repeat(32))).is_err());
        assert!(parse_approver("zz:1").is_err());
    }

    #[test]
    fn init_writes_loadable_registry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.toml");
        let args = InitArgs {
            config: path.clone(),
            account: "aa".repeat(32),
            threshold: 25,
            sequence: 0,
            approvers: vec![format!("{}:10", "01".repeat(32)), format!("{}:20", "02".repeat(32))],
        };
        init(&args).unwrap();

        let config = RegistryConfig::from_file(&path).unwrap();
        assert_eq!(config.approvers.len(), 2);
        assert_eq!(config.threshold, 25);
    }

    #[test]
    fn init_rejects_duplicate_approvers() {
        let dir = tempfile::tempdir().unwrap();
        let args = InitArgs {
            config: dir.path().join("registry.toml"),
            account: "aa".repeat(32),
            threshold: 1,
            sequence: 0,
            approvers: vec![format!("{}:1", "01".repeat(32)); 2],
        };
        assert!(init(&args).is_err());
        assert!(!args.config.exists());
    }
}
