//! `mbp listen`

use anyhow::{Context, Result, bail};
use mbp_core::{ChannelState, UnreadCounter};
use tracing::{info, warn};

use crate::commands::session;
use crate::config::ConfigLoader;

pub async fn run() -> Result<()> {
    let config = ConfigLoader::load()?;
    let session = session(&config)?;

    let unread = UnreadCounter::new();
    let _counter = unread.attach(session.channel());
    let printer_count = unread.clone();
    let _printer = session.channel().on_message(move |message| {
        if message.is_notification() {
            println!("[{} unread] {}", printer_count.count(), message.payload);
        } else {
            println!("[{}] {}", message.event, message.payload);
        }
    });

    let Some(identity) = session.initialize() else {
        bail!("Not logged in; run `mbp login` first");
    };
    println!(
        "Listening for notifications for user {} (Ctrl-C to stop)",
        identity.id
    );

    let mut changes = session.channel().state_changes();
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl-C")?;
            info!("interrupted; closing notification channel");
        }
        _ = changes.wait_for(|state| *state == ChannelState::Idle) => {
            warn!("notification channel closed");
        }
    }

    session.shutdown().await;
    println!("{} unread notification(s)", unread.count());
    Ok(())
}
