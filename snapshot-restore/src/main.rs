mod ui;

use gtk::glib;
use gtk::prelude::*;
use libadwaita as adw;
use snapshot_restore_common::{APP_ID, RestoreConfig, check_root};

fn main() -> glib::ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Restoring rewrites the root filesystem and /boot, so refuse to start unprivileged
    if let Err(e) = check_root() {
        let program = std::env::args()
            .next()
            .unwrap_or_else(|| "snapshot-restore".to_string());
        eprintln!("{}", e);
        eprintln!("Please run with: pkexec {}", program);
        return glib::ExitCode::FAILURE;
    }

    let config = RestoreConfig::load();
    log::info!("Reading boot parameters from {}", config.cmdline_path.display());

    let app = adw::Application::builder()
        .application_id(APP_ID)
        .build();

    app.connect_activate(move |app| ui::activate(app, &config));
    app.run()
}
