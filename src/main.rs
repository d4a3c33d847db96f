mod answer;
mod api;
mod app;
mod assembler;
mod config;
mod markdown;
mod models;
mod selection;
mod session;
mod storage;
mod store;
mod stream;
mod toast;
mod ui;
mod workspace;

use iced::{window, Font, Size};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    // LUMIN_DEBUG forces debug output for this crate; otherwise RUST_LOG decides.
    let filter = if std::env::var_os("LUMIN_DEBUG").is_some() {
        EnvFilter::new("lumin=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lumin=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> iced::Result {
    init_tracing();

    let config = config::Config::load();
    let size = Size::new(config.window.width as f32, config.window.height as f32);
    let min_size = Size::new(config.window.min_width as f32, config.window.min_height as f32);

    iced::application("LUMIN", app::App::update, app::App::view)
        .theme(app::App::theme)
        .subscription(app::App::subscription)
        .window(window::Settings {
            size,
            min_size: Some(min_size),
            position: window::Position::Centered,
            ..Default::default()
        })
        .default_font(Font::MONOSPACE)
        .run_with(move || app::App::new(config))
}
