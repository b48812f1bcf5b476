//! Auth command handlers.

use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::Result;
use postbridge_core::auth::{self, SignupRequest};
use postbridge_core::guard::Route;
use postbridge_core::session::mask_token;

use crate::cli::App;

pub async fn login(app: &App, username: &str, password: Option<String>) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => read_password()?,
    };

    let session = auth::login(&app.client, username, &password).await?;

    println!("✓ Logged in as {}", username.trim());
    println!("  Token: {}", mask_token(&session.access_token));
    println!("  Session saved to: {}", app.session.path().display());
    Ok(())
}

fn read_password() -> Result<String> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        print!("Password: ");
        io::stdout().flush()?;
    }
    let mut input = String::new();
    stdin.lock().read_line(&mut input)?;
    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}

pub fn logout(app: &App) -> Result<()> {
    let had_file = app.session.path().exists();
    if auth::logout(&app.client)? {
        println!("✓ Logged out");
        println!("  Session removed from: {}", app.session.path().display());
    } else if had_file {
        println!("✓ Removed unreadable session file: {}", app.session.path().display());
    } else {
        println!("Not logged in (no session found).");
    }
    Ok(())
}

pub async fn signup(app: &App, request: &SignupRequest) -> Result<()> {
    app.api(auth::signup(&app.client, request).await)?;
    let normalized = request.normalized();
    println!("✓ Account created for {}", normalized.username);
    println!("  Log in with: postbridge login -u {}", normalized.username);
    Ok(())
}

pub async fn whoami(app: &App, json: bool) -> Result<()> {
    app.require(&Route::Dashboard)?;
    let user = app.api(auth::current_user(&app.client).await)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&user)?);
        return Ok(());
    }

    println!("Logged in as {}", user.username);
    if let Some(email) = user.field("email") {
        println!("  Email: {email}");
    }
    if let Some(niche) = user.field("niche") {
        println!("  Niche: {niche}");
    }
    Ok(())
}
