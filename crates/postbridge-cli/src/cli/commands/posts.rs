//! Post command handlers.

use anyhow::Result;
use comfy_table::{ContentArrangement, Table};
use postbridge_core::dispatcher::{DispatchReceipt, NewPost, PostDispatcher, Schedule};
use postbridge_core::guard::Route;
use postbridge_core::registry::AccountRegistry;
use postbridge_types::{Post, Stats};

use crate::cli::App;

const PREVIEW_CHARS: usize = 60;

pub async fn list(app: &App, json: bool) -> Result<()> {
    app.require(&Route::Dashboard)?;
    let mut dispatcher = PostDispatcher::new(app.client.clone());
    let posts = app.api(dispatcher.refresh().await)?;

    if json {
        println!("{}", serde_json::to_string_pretty(posts)?);
        return Ok(());
    }

    if posts.is_empty() {
        println!("No posts yet.");
        return Ok(());
    }
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(["ID", "Platform", "Status", "When", "Content"]);
    for post in posts {
        table.add_row(post_row(post));
    }
    println!("{table}");
    Ok(())
}

pub async fn stats(app: &App, json: bool) -> Result<()> {
    app.require(&Route::Dashboard)?;
    let mut dispatcher = PostDispatcher::new(app.client.clone());
    app.api(dispatcher.refresh().await)?;

    if json {
        println!("{}", serde_json::to_string_pretty(dispatcher.stats())?);
    } else {
        print_stats(dispatcher.stats());
    }
    Ok(())
}

pub async fn create(app: &App, platform: &str, content: &str, schedule: &str) -> Result<()> {
    app.require(&Route::Dashboard)?;

    let mut registry = AccountRegistry::new(app.client.clone());
    app.api(registry.refresh().await)?;

    let new_post = NewPost {
        content: content.to_string(),
        platform: platform.to_string(),
        schedule: Schedule::parse(schedule),
    };
    let mut dispatcher = PostDispatcher::new(app.client.clone());
    let receipt = app.api(dispatcher.create(&registry, &new_post).await)?;

    match &new_post.schedule {
        Schedule::Now => println!("✓ Post sent to {platform}"),
        Schedule::At(time) => println!("✓ Post scheduled on {platform} for {time}"),
    }
    report(&dispatcher, &receipt);
    Ok(())
}

pub async fn instant(app: &App, platform: &str, content: &str) -> Result<()> {
    app.require(&Route::Dashboard)?;

    let mut dispatcher = PostDispatcher::new(app.client.clone());
    let receipt = app.api(dispatcher.post_instant(platform, content).await)?;

    println!("✓ Published to {platform}");
    report(&dispatcher, &receipt);
    Ok(())
}

fn report(dispatcher: &PostDispatcher, receipt: &DispatchReceipt) {
    if receipt.refreshed {
        print_stats(dispatcher.stats());
    } else {
        println!("  (post history could not be refreshed; run `postbridge posts list`)");
    }
}

fn post_row(post: &Post) -> [String; 5] {
    let mut preview: String = post.content.chars().take(PREVIEW_CHARS).collect();
    if post.content.chars().count() > PREVIEW_CHARS {
        preview.push('…');
    }
    let when = match &post.scheduled_time {
        Some(at) => format!("scheduled {at}"),
        None => post.created_at.to_string(),
    };
    [
        post.id.clone(),
        post.platform.clone(),
        post.status.to_string(),
        when,
        preview.replace('\n', " "),
    ]
}

fn print_stats(stats: &Stats) {
    println!("Total posts: {}", stats.total_posts);
    for (platform, count) in &stats.per_platform_counts {
        println!("  {platform}: {count}");
    }
    println!("Scheduled: {}", stats.scheduled_count);
}
