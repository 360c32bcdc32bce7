//! `quorum action` commands.
//!
//! - `quorum action hash` - Print the canonical hashes of an action file

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};
use quorum_core::{Action, Hash, hash_auth_data, permit};
use serde::Serialize;

use super::{finish, print_json, read_json};

/// Action command group.
#[derive(Debug, Args)]
pub struct ActionCommand {
    #[command(subcommand)]
    pub subcommand: ActionSubcommand,
}

/// Action subcommands.
#[derive(Debug, Subcommand)]
pub enum ActionSubcommand {
    /// Print the canonical bytes and hashes of an action.
    ///
    /// `action_hash` is what bundle entries sign; `permit_message` is what
    /// permit entries sign when the action is carried by a permit.
    Hash(HashArgs),
}

/// Arguments for `quorum action hash`.
#[derive(Debug, Args)]
pub struct HashArgs {
    /// Action JSON file
    pub action: PathBuf,
}

#[derive(Debug, Serialize)]
struct HashResponse {
    kind: &'static str,
    canonical_bytes: String,
    #[serde(with = "quorum_core::encoding::hex32")]
    action_hash: Hash,
    #[serde(with = "quorum_core::encoding::hex32")]
    auth_data_hash: Hash,
    #[serde(with = "quorum_core::encoding::hex32")]
    permit_message: Hash,
}

/// Run an action subcommand.
pub fn run(cmd: &ActionCommand) -> u8 {
    finish(match &cmd.subcommand {
        ActionSubcommand::Hash(args) => hash(args),
    })
}

fn hash(args: &HashArgs) -> Result<()> {
    let action: Action = read_json(&args.action)?;
    action.validate()?;
    print_json(&describe(&action))
}

fn describe(action: &Action) -> HashResponse {
    let bytes = action.canonical_bytes();
    let auth_data_hash = hash_auth_data(&bytes);
    HashResponse {
        kind: action.kind().name(),
        canonical_bytes: hex::encode(&bytes),
        action_hash: action.canonical_hash(),
        auth_data_hash,
        permit_message: permit::signing_message_for(&auth_data_hash),
    }
}

#[cfg(test)]
mod tests {
    use quorum_core::{Identity, Permit};

    use super::*;

    #[test]
    fn permit_message_matches_permit() {
        let action = Action::threshold_update(Identity::from_bytes([0xAA; 32]), 0, 40).unwrap();
        let response = describe(&action);
        let permit = Permit::for_payload(&action.canonical_bytes(), Vec::new());
        assert_eq!(response.permit_message, permit.signing_message());
        assert_eq!(response.action_hash, action.signing_message());
        assert_eq!(response.kind, "threshold_update");
    }

    #[test]
    fn hash_rejects_invalid_action_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("action.json");
        std::fs::write(
            &path,
            format!(
                r#"{{"subject_account":"{}","sequence_number":0,"kind":"threshold_update","new_threshold":0}}"#,
                "aa".repeat(32)
            ),
        )
        .unwrap();
        assert!(hash(&HashArgs { action: path }).is_err());
    }
}
