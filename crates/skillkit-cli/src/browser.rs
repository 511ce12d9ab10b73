//! `skillkit browser` subcommand handlers.
//!
//! Each handler follows the same lifecycle: connect (or launch) Chrome,
//! open a page session, run the operation, then close the session and the
//! browser handle. The handle owns any Chrome process it launched, so the
//! browser never outlives the command even on the error path.

use std::time::Duration;

use anyhow::Result;
use serde_json::json;
use tracing::debug;

use skillkit_skills::browser::actions::{
    self, DEFAULT_NAV_TIMEOUT_MS, ScreenshotOptions, WaitUntil,
};
use skillkit_skills::browser::{Browser, BrowserOptions, CdpSession};

use crate::cli::{BrowserAction, BrowserConnection};

pub async fn run(action: BrowserAction) -> Result<()> {
    match action {
        BrowserAction::Navigate {
            url,
            wait_until,
            timeout,
            connection,
        } => {
            let wait_until: WaitUntil = parse(&wait_until)?;
            let (browser, mut session) = open(&connection).await?;
            let outcome = actions::navigate(&mut session, &url, wait_until, timeout).await;
            finish(browser, session).await?;
            print_json(&serde_json::to_value(&outcome?)?);
            Ok(())
        }

        BrowserAction::Click {
            selector,
            wait_for,
            timeout,
            connection,
        } => {
            let (browser, mut session) = open(&connection).await?;
            let outcome =
                actions::click(&mut session, &selector, wait_for.as_deref(), timeout).await;
            finish(browser, session).await?;
            print_json(&serde_json::to_value(&outcome?)?);
            Ok(())
        }

        BrowserAction::Fill {
            selector,
            value,
            clear,
            timeout,
            connection,
        } => {
            let (browser, mut session) = open(&connection).await?;
            let outcome =
                actions::fill(&mut session, &selector, &value, clear, timeout).await;
            finish(browser, session).await?;
            print_json(&serde_json::to_value(&outcome?)?);
            Ok(())
        }

        BrowserAction::Screenshot {
            output,
            url,
            format,
            quality,
            full_page,
            selector,
            max_size,
            no_compress,
            connection,
        } => {
            let opts = ScreenshotOptions {
                format,
                quality,
                full_page,
                selector,
                max_size_mb: max_size,
                no_compress,
            };
            let (browser, mut session) = open(&connection).await?;
            let outcome = async {
                if let Some(url) = &url {
                    actions::navigate(
                        &mut session,
                        url,
                        WaitUntil::NetworkIdle,
                        DEFAULT_NAV_TIMEOUT_MS,
                    )
                    .await?;
                }
                actions::screenshot(&mut session, &output, &opts).await
            }
            .await;
            finish(browser, session).await?;
            print_json(&serde_json::to_value(&outcome?)?);
            Ok(())
        }

        BrowserAction::Snapshot { url, connection } => {
            let (browser, mut session) = open(&connection).await?;
            let outcome = async {
                if let Some(url) = &url {
                    actions::navigate(
                        &mut session,
                        url,
                        WaitUntil::NetworkIdle,
                        DEFAULT_NAV_TIMEOUT_MS,
                    )
                    .await?;
                }
                actions::snapshot(&mut session).await
            }
            .await;
            finish(browser, session).await?;
            print_json(&outcome?);
            Ok(())
        }

        BrowserAction::Console {
            url,
            duration,
            wait_until,
            types,
            connection,
        } => {
            let wait_until: WaitUntil = parse(&wait_until)?;
            let filter = (!types.is_empty()).then_some(types);
            let (browser, mut session) = open(&connection).await?;
            let outcome = actions::monitor_console(
                &mut session,
                &url,
                wait_until,
                Duration::from_secs(duration),
                filter.as_deref(),
            )
            .await;
            finish(browser, session).await?;
            let messages = outcome?;
            print_json(&json!({
                "success": true,
                "url": url,
                "messageCount": messages.len(),
                "messages": messages,
            }));
            Ok(())
        }

        BrowserAction::Perf { url, connection } => {
            let (browser, mut session) = open(&connection).await?;
            let outcome = actions::performance(&mut session, &url).await;
            finish(browser, session).await?;
            print_json(&outcome?);
            Ok(())
        }
    }
}

/// Connect to (or launch) Chrome and open a page session.
async fn open(connection: &BrowserConnection) -> Result<(Browser, CdpSession)> {
    let opts = BrowserOptions {
        debug_port: connection.port,
        chrome_path: connection.chrome_path.clone(),
        headless: !connection.headed,
        ..BrowserOptions::default()
    };
    let browser = Browser::connect(&opts).await?;
    match browser.page_session().await {
        Ok(session) => {
            debug!(port = connection.port, "browser session open");
            Ok((browser, session))
        }
        Err(e) => {
            browser.close().await?;
            Err(e.into())
        }
    }
}

/// Tear down the session and the browser handle.
async fn finish(browser: Browser, session: CdpSession) -> Result<()> {
    session.close().await;
    browser.close().await?;
    Ok(())
}

fn parse<T: std::str::FromStr<Err = String>>(raw: &str) -> Result<T> {
    raw.parse().map_err(|e: String| anyhow::anyhow!(e))
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(rendered) => println!("{rendered}"),
        Err(_) => println!("{value}"),
    }
}
