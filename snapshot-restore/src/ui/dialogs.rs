use gtk::prelude::*;
use libadwaita as adw;
use adw::prelude::*;

/// Show an error dialog
pub fn show_error(window: &adw::ApplicationWindow, title: &str, message: &str) {
    let dialog = adw::MessageDialog::new(Some(window), Some(title), Some(message));
    dialog.add_response("ok", "OK");
    dialog.set_default_response(Some("ok"));
    dialog.set_close_response("ok");
    dialog.present();
}

/// Show an error dialog with no main window and quit once it is dismissed
pub fn show_fatal_error(app: &adw::Application, title: &str, message: &str) {
    log::error!("{}: {}", title, message);

    let dialog = adw::MessageDialog::new(None::<&gtk::Window>, Some(title), Some(message));
    dialog.set_application(Some(app));
    dialog.add_response("ok", "OK");
    dialog.set_response_appearance("ok", adw::ResponseAppearance::Default);
    dialog.set_default_response(Some("ok"));
    dialog.set_close_response("ok");

    let app = app.clone();
    dialog.connect_response(None, move |_, _| {
        app.quit();
    });

    dialog.present();
}
