//! Linux demo of the location screen.
//!
//! Run with: cargo run -p locator-linux-demo [config.json]
//!
//! Press Enter to ask for the location again, type `q` to quit. Results show
//! up as desktop notifications.

use std::process::ExitCode;

#[cfg(target_os = "linux")]
use std::{io::BufRead, sync::Arc};

#[cfg(target_os = "linux")]
use locator::{
    LocationScreen, Platform, ScreenConfig, ScreenEvent, location::sys::GeoClueLocation,
    permission::sys::LinuxPermissions, prefs::FilePreferences, toast::sys::DesktopPresenter,
};

#[cfg(target_os = "linux")]
#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => match ScreenConfig::load(&path) {
            Ok(config) => config,
            Err(err) => {
                log::error!("failed to load {path}: {err}");
                return ExitCode::FAILURE;
            }
        },
        None => ScreenConfig::default(),
    };

    let preferences = match FilePreferences::for_app("locator") {
        Ok(preferences) => preferences,
        Err(err) => {
            log::error!("failed to open preferences: {err}");
            return ExitCode::FAILURE;
        }
    };
    log::info!("preferences at {}", preferences.path().display());

    let location = Arc::new(GeoClueLocation::new("locator"));
    let platform = Platform {
        permissions: Arc::new(LinuxPermissions),
        providers: location.clone(),
        location: location.clone(),
        settings: location,
        preferences: Arc::new(preferences),
        presenter: Arc::new(DesktopPresenter::new(config.title.clone())),
    };

    let (events, receiver) = async_channel::unbounded();
    let screen = LocationScreen::new(platform, config);
    println!("=== {} ===", screen.title());
    println!("Enter: locate again, q: quit\n");

    std::thread::spawn(move || {
        let _ = events.send_blocking(ScreenEvent::Created);
        for line in std::io::stdin().lock().lines() {
            let event = match line.as_deref().map(str::trim) {
                Ok("q" | "quit") | Err(_) => ScreenEvent::Destroyed,
                Ok(_) => ScreenEvent::ButtonPressed,
            };
            let done = event == ScreenEvent::Destroyed;
            if events.send_blocking(event).is_err() || done {
                break;
            }
        }
    });

    screen.run(receiver).await;
    ExitCode::SUCCESS
}

#[cfg(not(target_os = "linux"))]
fn main() -> ExitCode {
    eprintln!("This demo only runs on Linux.");
    ExitCode::FAILURE
}
