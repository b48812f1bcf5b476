//! OAuth linking command handlers.

use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::Arc;

use anyhow::{Result, bail};
use postbridge_core::guard::Route;
use postbridge_core::navigation::Navigator;
use postbridge_core::oauth::{self, CallbackQuery, LinkOrchestrator, LinkStatus, RedirectDelays};
use postbridge_core::registry::AccountRegistry;
use postbridge_types::Platform;

use crate::cli::App;
use crate::cli::navigator::TerminalNavigator;

pub async fn status(app: &App) -> Result<()> {
    app.require(&Route::Connect)?;
    let status = app.api(oauth::oauth_status(&app.client).await)?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

pub async fn connect(app: &App, platform: Platform, no_browser: bool) -> Result<()> {
    app.require(&Route::Connect)?;

    let navigator: Arc<dyn Navigator> =
        Arc::new(TerminalNavigator::new(app.config.oauth.open_browser && !no_browser));
    let mut orchestrator = orchestrator(app, &navigator);

    let attempt = orchestrator.initiate(platform).await;
    if attempt.status == LinkStatus::Failed {
        let message = attempt.error_message.unwrap_or_default();
        bail!("Failed to connect {}: {message}", platform.label());
    }
    let auth_url = attempt.auth_url.unwrap_or_default();

    println!("To link your {} account:", platform.label());
    println!();
    println!("  1. A browser window will open (or visit the URL below)");
    println!("  2. Log in and authorize access");
    println!("  3. Paste the URL you are redirected to");
    println!();
    println!("Authorization URL:");
    println!("  {auth_url}");
    println!();

    if !io::stdin().is_terminal() {
        println!(
            "Finish with: postbridge callback {} '<redirect URL>'",
            platform.id()
        );
        return Ok(());
    }

    print!("Paste the redirect URL (empty to finish later): ");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    if input.trim().is_empty() {
        println!(
            "Finish later with: postbridge callback {} '<redirect URL>'",
            platform.id()
        );
        return Ok(());
    }

    complete(app, &mut orchestrator, platform, &input, true).await
}

/// Handles a callback pasted from the browser. Public like its page: the
/// backend identifies the attempt from the OAuth state.
pub async fn callback(app: &App, platform: Platform, input: &str, wait: bool) -> Result<()> {
    let navigator: Arc<dyn Navigator> = Arc::new(TerminalNavigator::new(false));
    let mut orchestrator = orchestrator(app, &navigator);
    complete(app, &mut orchestrator, platform, input, wait).await
}

fn orchestrator(app: &App, navigator: &Arc<dyn Navigator>) -> LinkOrchestrator {
    LinkOrchestrator::new(
        app.client.clone(),
        Arc::downgrade(navigator),
        RedirectDelays::from(&app.config.oauth),
    )
}

async fn complete(
    app: &App,
    orchestrator: &mut LinkOrchestrator,
    platform: Platform,
    input: &str,
    wait: bool,
) -> Result<()> {
    let query = CallbackQuery::parse(input);
    let resolution = orchestrator.handle_callback(platform, &query).await;
    let attempt = resolution.attempt;

    match attempt.status {
        LinkStatus::Linked => println!("✓ {} account linked", platform.label()),
        _ => println!(
            "✗ Failed to link {}: {}",
            platform.label(),
            attempt.error_message.as_deref().unwrap_or_default()
        ),
    }
    println!(
        "  Redirecting to {} in {}s (go back now: {})",
        resolution.redirect.target,
        resolution.redirect.delay.as_secs_f32(),
        resolution.go_back
    );

    if wait {
        let _ = resolution.pending.await;
    } else {
        resolution.pending.abort();
    }
    orchestrator.acknowledge(platform);

    if attempt.status != LinkStatus::Linked {
        bail!(
            "{}",
            attempt
                .error_message
                .unwrap_or_else(|| format!("{} linking failed", platform.label()))
        );
    }

    if app.session.access_token().is_some() {
        let mut registry = AccountRegistry::new(app.client.clone());
        match registry.refresh().await {
            Ok(accounts) => println!("  {} linked account(s)", accounts.len()),
            Err(e) => tracing::warn!(error = %e, "could not refresh linked accounts"),
        }
    }
    Ok(())
}
