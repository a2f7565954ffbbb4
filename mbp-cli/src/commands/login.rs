//! `mbp login`

use std::io::Read;

use anyhow::{Context, Result, bail};
use clap::Args;
use mbp_core::{IdentityDecoder, SessionToken, StorageError};
use tracing::{debug, warn};

use crate::commands::token_store;
use crate::config::ConfigLoader;

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Session token (JWT). Read from stdin when omitted.
    #[arg(long)]
    pub token: Option<String>,
}

pub fn run(args: LoginArgs) -> Result<()> {
    let token = match args.token {
        Some(token) => token,
        None => read_token_from_stdin()?,
    };
    let token = token.trim();
    if token.is_empty() {
        bail!("No token given; pass --token or pipe it on stdin");
    }

    let config = ConfigLoader::load()?;
    let store = token_store(&config)?;

    // Only the token is recorded here; `mbp listen` opens the hub connection.
    let identity = IdentityDecoder::decode(token).context("Login failed")?;
    store
        .set(&SessionToken::new(token))
        .map_err(storage_failure)?;
    debug!(user_id = identity.id, store = %store.location(), "session token stored");

    println!("Logged in as user {}", identity.id);
    if let Some(email) = &identity.email {
        println!("  Email: {}", email);
    }
    println!("  Token stored in {}", store.location());
    Ok(())
}

fn storage_failure(error: StorageError) -> anyhow::Error {
    warn!(error = %error, "token was not persisted");
    anyhow::Error::new(error).context("Token is valid but could not be stored")
}

fn read_token_from_stdin() -> Result<String> {
    let mut token = String::new();
    std::io::stdin()
        .read_to_string(&mut token)
        .context("Failed to read token from stdin")?;
    Ok(token)
}
