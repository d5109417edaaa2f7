//! bsky-relay: watches a subreddit and republishes new posts to Bluesky.
//!
//! ## Architecture overview
//!
//! ```text
//! ┌───────────┐  Item   ┌───────────┐  Item   ┌─────────────┐
//! │  source/  │ ──────► │ stream.rs │ ──────► │ pipeline.rs │ ──► destination/
//! │ (Reddit)  │         │  (skips)  │         │ (one post)  │
//! └───────────┘         └───────────┘         └─────────────┘
//!        ▲                    ▲                      ▲
//!        └──── retry.rs ──────┴──────────────────────┘
//!             (every network call; waits via wait.rs)
//! ```
//!
//! * **`source/`**: the `Source` trait and the Reddit client.
//! * **`destination/`**: the `Destination` trait and the Bluesky client.
//! * **`retry`** / **`taxonomy`**: retry with backoff, driven by fault
//!   classification.
//! * **`stream`**: recent window, catch-up set and the skip policy.
//! * **`pipeline`**, **`compose`**, **`thumbnail`**: turn one item into one
//!   post.
//! * **`status`** / **`ui`**: the two-line live display and the event log.
//! * **`app`**: the run loop; **`main`** wires everything together.
//!
//! Everything runs on the main thread.  The only other thread waits for
//! Control+C and flips the shared shutdown flag.

mod app;
mod compose;
mod config;
mod destination;
mod error;
mod logging;
mod pipeline;
mod retry;
mod shutdown;
mod source;
mod status;
mod stream;
mod taxonomy;
mod thumbnail;
mod ui;
mod wait;

use std::io;

use anyhow::{Context, Result};
use crossterm::{cursor, execute};

use app::App;
use config::Config;
use destination::BlueskyClient;
use pipeline::Pipeline;
use retry::Retry;
use shutdown::Shutdown;
use source::RedditSource;
use status::Status;
use thumbnail::ImageThumbnailer;
use ui::LiveSurface;
use wait::{ThreadSleep, Waiter};

/// Bring the cursor back before printing the panic message; the live
/// display hides it.
fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = execute!(io::stdout(), cursor::Show);
        original_hook(info);
    }));
}

fn status_display() -> Status {
    match LiveSurface::stdout() {
        Ok(surface) => Status::new(Box::new(surface)),
        Err(e) => {
            tracing::info!(error = %e, "no live display, using plain output");
            Status::plain()
        }
    }
}

fn main() -> Result<()> {
    install_panic_hook();

    // -- configuration and logging -------------------------------------------
    let config_path = Config::path_from_env();
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load configuration from {}", config_path.display()))?;
    logging::init(&config.log)?;

    let shutdown = Shutdown::new();
    shutdown::install_ctrl_c(shutdown.clone())?;

    // -- collaborators -------------------------------------------------------
    let retry = Retry::new(
        config.backoff(),
        Waiter::new(Box::new(ThreadSleep), shutdown),
        config.reddit.subreddit.clone(),
    );
    let source = RedditSource::new(config.reddit.clone()).context("failed to build the Reddit client")?;
    let destination = BlueskyClient::new().context("failed to build the Bluesky client")?;
    let pipeline = Pipeline::new(
        Box::new(destination),
        Box::new(ImageThumbnailer),
        config.post.clone(),
    );
    let mut app = App::new(&config, retry, pipeline)?;

    // -- run -----------------------------------------------------------------
    println!("{}", ui::banner(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")));
    let mut status = status_display();
    let outcome = app.run(Box::new(source), &mut status);
    let code = app.report(outcome, &mut status);
    drop(status);

    std::process::exit(code);
}
