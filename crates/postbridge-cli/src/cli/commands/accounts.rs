//! Linked account command handlers.

use anyhow::Result;
use comfy_table::{ContentArrangement, Table};
use postbridge_core::guard::Route;
use postbridge_core::registry::AccountRegistry;
use postbridge_types::Platform;

use crate::cli::App;

pub async fn list(app: &App, json: bool) -> Result<()> {
    app.require(&Route::Dashboard)?;
    let mut registry = AccountRegistry::new(app.client.clone());
    let accounts = app.api(registry.refresh().await)?;

    if json {
        println!("{}", serde_json::to_string_pretty(accounts)?);
        return Ok(());
    }

    if accounts.is_empty() {
        println!("No linked accounts. Link one with: postbridge connect <facebook|instagram>");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(["Platform", "ID", "Status", "User", "Pages"]);
    for account in accounts {
        let pages: Vec<String> = account
            .pages
            .iter()
            .map(|page| match &page.name {
                Some(name) => format!("{} ({name})", page.id),
                None => page.id.clone(),
            })
            .collect();
        table.add_row([
            account.platform.clone(),
            account.id.clone(),
            account.connection_status.to_string(),
            account.platform_user_id.clone(),
            pages.join(", "),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub async fn unlink(app: &App, platform: Platform) -> Result<()> {
    app.require(&Route::Connect)?;
    let mut registry = AccountRegistry::new(app.client.clone());
    app.api(registry.unlink(platform).await)?;
    println!("✓ Unlinked {}", platform.label());

    let remaining = app.api(registry.refresh().await)?;
    println!("  {} linked account(s) remaining", remaining.len());
    Ok(())
}
