mod dialogs;

use gtk::glib;
use gtk::prelude::*;
use gtk::{Align, Button, Justification, Label, Orientation, ProgressBar};
use libadwaita as adw;
use adw::prelude::*;
use snapshot_restore_common::{
    BootStateReader, ConfirmAction, RestoreConfig, RestoreController, RestoreEvent,
    RestoreSession, RestoreState, SnapshotInfo, SystemCommandRunner, spawn_restore,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

const DESCRIPTION: &str = "The system was booted from a restore point, also called a Snapshot.\n\n\
    If you want to make this restore point the default boot option, \
    click the Restore button or use Timeshift for more options.";

/// Detect the booted snapshot and show the restore prompt
///
/// Quits the application after an error dialog if the system was not booted
/// from a snapshot, since there is nothing to restore.
pub fn activate(app: &adw::Application, config: &RestoreConfig) {
    if let Some(window) = app.active_window() {
        window.present();
        return;
    }

    let reader = BootStateReader::new(config);

    if !reader.is_in_snapshot() {
        dialogs::show_fatal_error(
            app,
            "Snapshot not detected",
            "Did you really boot into the snapshot?",
        );
        return;
    }

    let Some(snapshot) = reader.snapshot_info() else {
        dialogs::show_fatal_error(app, "Error", "Could not parse snapshot information");
        return;
    };

    log::info!(
        "Booted from snapshot {} ({})",
        snapshot.name,
        snapshot.subvolume_path
    );

    let session = RestoreSession::new(Arc::new(SystemCommandRunner), config.clone());
    let window = RestoreWindow::new(app, snapshot, session);
    window.window.present();
}

/// The restore prompt; widgets are a view over the controller's state
struct RestoreWindow {
    window: adw::ApplicationWindow,
    restore_button: Button,
    status_label: Label,
    progress_bar: ProgressBar,
    controller: RefCell<RestoreController>,
    session: RestoreSession<SystemCommandRunner>,
}

impl RestoreWindow {
    fn new(
        app: &adw::Application,
        snapshot: SnapshotInfo,
        session: RestoreSession<SystemCommandRunner>,
    ) -> Rc<Self> {
        let header = adw::HeaderBar::new();
        let title = format!("Snapshot {}", snapshot.name);
        header.set_title_widget(Some(&Label::new(Some(title.as_str()))));

        let main_box = gtk::Box::new(Orientation::Vertical, 20);
        main_box.set_margin_top(30);
        main_box.set_margin_bottom(30);
        main_box.set_margin_start(30);
        main_box.set_margin_end(30);

        // Icon and title
        let icon_box = gtk::Box::new(Orientation::Horizontal, 15);
        icon_box.set_halign(Align::Center);

        let icon = gtk::Image::from_icon_name("timeshift");
        icon.set_pixel_size(64);
        icon_box.append(&icon);

        let title_label = Label::new(Some("Timeshift"));
        title_label.add_css_class("title-1");
        icon_box.append(&title_label);

        main_box.append(&icon_box);

        main_box.append(&Self::build_info_group(&snapshot));

        let description = Label::new(Some(DESCRIPTION));
        description.set_wrap(true);
        description.set_justify(Justification::Center);
        description.set_margin_top(10);
        description.set_margin_bottom(10);
        main_box.append(&description);

        let progress_bar = ProgressBar::new();
        progress_bar.set_visible(false);
        main_box.append(&progress_bar);

        let status_label = Label::new(None);
        status_label.set_wrap(true);
        status_label.set_visible(false);
        main_box.append(&status_label);

        let restore_button = Button::with_label("Restore System");
        restore_button.add_css_class("suggested-action");
        restore_button.add_css_class("pill");
        restore_button.set_halign(Align::Center);
        restore_button.set_size_request(200, 40);
        main_box.append(&restore_button);

        let toolbar_view = adw::ToolbarView::new();
        toolbar_view.add_top_bar(&header);
        toolbar_view.set_content(Some(&main_box));

        let window = adw::ApplicationWindow::builder()
            .application(app)
            .title("BigLinux Snapshot Restore")
            .default_width(500)
            .default_height(400)
            .resizable(false)
            .content(&toolbar_view)
            .build();

        let this = Rc::new(Self {
            window,
            restore_button,
            status_label,
            progress_bar,
            controller: RefCell::new(RestoreController::new(snapshot)),
            session,
        });

        // The button owns the window state for the lifetime of the app
        let owner = Rc::clone(&this);
        this.restore_button.connect_clicked(move |_| {
            Self::on_restore_clicked(&owner);
        });

        let weak = Rc::downgrade(&this);
        this.window.connect_close_request(move |_| match weak.upgrade() {
            Some(this) if !this.controller.borrow().can_close() => {
                log::warn!("Ignoring close request while a restore is running");
                glib::Propagation::Stop
            }
            _ => glib::Propagation::Proceed,
        });

        this
    }

    fn build_info_group(snapshot: &SnapshotInfo) -> adw::PreferencesGroup {
        let group = adw::PreferencesGroup::new();
        group.set_title("Snapshot Information");

        for (title, value) in [
            ("File", &snapshot.subvolume_path),
            ("Date", &snapshot.display_date),
            ("Time", &snapshot.display_time),
        ] {
            let row = adw::ActionRow::builder()
                .title(title)
                .subtitle(value.as_str())
                .build();
            group.add(&row);
        }

        group
    }

    fn on_restore_clicked(this: &Rc<Self>) {
        let action = this.controller.borrow_mut().confirm();

        match action {
            ConfirmAction::StartRestore => {
                this.render();
                Self::start_restore(this);
            }
            ConfirmAction::Reboot => this.reboot(),
            ConfirmAction::Ignored => {}
        }
    }

    /// Run the restore on a worker thread and apply its events on the main loop
    fn start_restore(this: &Rc<Self>) {
        let name = this.controller.borrow().snapshot().name.clone();
        let receiver = spawn_restore(this.session.clone(), name);

        // Keep the bar moving while a long restore produces no output
        let pulse = Rc::downgrade(this);
        glib::timeout_add_local(Duration::from_millis(200), move || match pulse.upgrade() {
            Some(this) if *this.controller.borrow().state() == RestoreState::Restoring => {
                this.progress_bar.pulse();
                glib::ControlFlow::Continue
            }
            _ => glib::ControlFlow::Break,
        });

        let this = Rc::clone(this);
        glib::spawn_future_local(async move {
            while let Ok(event) = receiver.recv().await {
                this.controller.borrow_mut().handle_event(&event);

                match event {
                    RestoreEvent::Progress(message) => {
                        this.status_label.set_text(&message);
                        this.progress_bar.pulse();
                    }
                    RestoreEvent::Completed | RestoreEvent::Failed(_) => this.render(),
                }
            }
        });
    }

    /// Update the widgets to match the controller state
    fn render(&self) {
        let state = self.controller.borrow().state().clone();

        match state {
            RestoreState::Idle => {
                self.progress_bar.set_visible(false);
                self.status_label.set_visible(false);
                self.restore_button.set_sensitive(true);
                self.restore_button.set_label("Restore System");
            }
            RestoreState::Restoring => {
                self.status_label.remove_css_class("error");
                self.status_label.remove_css_class("success");
                self.status_label.set_text("");
                self.status_label.set_visible(true);
                self.progress_bar.set_visible(true);
                self.progress_bar.pulse();
                self.restore_button.set_sensitive(false);
                self.restore_button.set_label("Restoring...");
            }
            RestoreState::Completed => {
                self.progress_bar.set_visible(false);
                self.status_label
                    .set_text("Restoration completed successfully! Please reboot the system.");
                self.status_label.add_css_class("success");
                self.restore_button.set_sensitive(true);
                self.restore_button.set_label("Restart");
                self.restore_button.remove_css_class("suggested-action");
                self.restore_button.add_css_class("destructive-action");
            }
            RestoreState::Failed(message) => {
                self.progress_bar.set_visible(false);
                self.status_label.set_text(&format!("Error: {}", message));
                self.status_label.add_css_class("error");
                self.restore_button.set_sensitive(true);
                self.restore_button.set_label("Restore System");
            }
        }
    }

    fn reboot(&self) {
        log::info!("Rebooting into restored system");

        if let Err(e) = self.session.reboot() {
            log::error!("Reboot failed: {:#}", e);
            dialogs::show_error(
                &self.window,
                "Reboot Error",
                &format!("Could not restart system: {}", e),
            );
        }
    }
}
