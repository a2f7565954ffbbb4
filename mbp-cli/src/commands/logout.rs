//! `mbp logout`

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::commands::session;
use crate::config::ConfigLoader;

pub async fn run() -> Result<()> {
    let config = ConfigLoader::load()?;
    let session = session(&config)?;

    let Some(identity) = session.initialize() else {
        session.logout().await.context("Failed to clear stored token")?;
        println!("Not logged in");
        return Ok(());
    };

    // Tell the server first, while the token is still attached to requests.
    match session.transport().post("auth/logout").await {
        Ok(_) => debug!(user_id = identity.id, "server session ended"),
        Err(e) => warn!(error = %e, "server logout failed; clearing local session anyway"),
    }

    session.logout().await.context("Failed to clear stored token")?;
    println!("Logged out user {}", identity.id);
    Ok(())
}
