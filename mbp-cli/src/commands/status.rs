//! `mbp status`

use anyhow::Result;
use chrono::Utc;
use mbp_core::IdentityDecoder;

use crate::commands::token_store;
use crate::config::ConfigLoader;

pub fn run() -> Result<()> {
    let config = ConfigLoader::load()?;
    let store = token_store(&config)?;

    let token = match store.get() {
        Ok(Some(token)) => token,
        Ok(None) => {
            println!("Not logged in");
            return Ok(());
        }
        Err(e) => {
            println!("Not logged in (token storage unavailable: {})", e);
            return Ok(());
        }
    };

    let identity = match IdentityDecoder::decode(token.expose_secret()) {
        Ok(identity) => identity,
        Err(e) => {
            println!("Not logged in (stored token is unusable: {})", e);
            println!("  Run `mbp login` to replace it");
            return Ok(());
        }
    };

    println!("Logged in");
    println!("  User id: {}", identity.id);
    if let Some(email) = &identity.email {
        println!("  Email:   {}", email);
    }
    if let Some(name) = &identity.name {
        println!("  Name:    {}", name);
    }
    if let Some(role) = &identity.role {
        println!("  Role:    {}", role);
    }
    if let Some(expires_at) = identity.expires_at {
        let note = if identity.is_expired(Utc::now()) {
            " (expired)"
        } else {
            ""
        };
        println!("  Expires: {}{}", expires_at.to_rfc3339(), note);
    }
    println!("  Storage: {}", store.location());
    Ok(())
}
