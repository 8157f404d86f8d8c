use anyhow::{Context, Result};
use std::io::{self, Write};

use crate::api::ApiClient;
use crate::config::Config;
use crate::storage::StorageManager;

/// Store an API token after verifying it against the server. Registration
/// and token issuance live on the server side; the client only keeps the
/// opaque token.
pub async fn login(config: &Config) -> Result<()> {
    print!("🔑 Paste your quickGPT API token: ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .context("Failed to read token")?;
    let token = input.trim();

    if token.is_empty() {
        println!("❌ No token entered.");
        return Ok(());
    }

    let api = ApiClient::new(config.server_url.clone(), token);
    let user = api
        .fetch_user()
        .await
        .context("Token verification failed")?;

    let storage = StorageManager::new()?;
    storage.save_token(token)?;

    println!("✅ Logged in as {} ({} credits).", user.name, user.credits);
    println!("Run 'quickgpt' to start chatting.");
    Ok(())
}

pub fn logout() -> Result<()> {
    let storage = StorageManager::new()?;
    storage.clear_token()?;
    println!("👋 Logged out successfully.");
    Ok(())
}

/// Print the community gallery feed without entering the TUI.
pub async fn gallery(config: &Config) -> Result<()> {
    let storage = StorageManager::new()?;
    let Some(token) = storage.load_token()? else {
        println!("❌ Not logged in. Run 'quickgpt login' first.");
        return Ok(());
    };

    let api = ApiClient::new(config.server_url.clone(), token);
    let images = api.fetch_published_images().await?;

    if images.is_empty() {
        println!("📭 No published images yet.");
        return Ok(());
    }

    println!("🖼  Community Images:");
    println!("{}", "=".repeat(50));
    for image in images {
        let author = image.user_name.as_deref().unwrap_or("Unknown");
        println!("  {}", image.image_url);
        println!("    created by {author}");
        println!();
    }

    Ok(())
}
