//! Navigation and notification intents.
//!
//! The core never performs navigation or paints toasts itself; it emits
//! intents through these traits and the UI shell executes them.

use std::sync::Mutex;

/// Routes the auth core can direct the shell toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Route {
    /// The sign-in/sign-up entry point
    AuthEntry,
    /// The authenticated landing area (the studio)
    Landing,
    /// Anywhere else in the app
    #[default]
    Other,
}

/// Executes navigation intents and reports the current location.
pub trait Navigator: Send + Sync {
    /// Where the shell currently is.
    fn current_route(&self) -> Route;

    /// Hard-redirect to a route. Implementations must not return control to
    /// stale protected UI.
    fn navigate(&self, route: Route);
}

/// Navigator that reports `Other` and drops navigations. Used when the core
/// runs headless.
#[derive(Debug, Default)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn current_route(&self) -> Route {
        Route::Other
    }

    fn navigate(&self, _route: Route) {}
}

/// Navigator that records intents for assertions.
#[derive(Default)]
pub struct RecordingNavigator {
    current: Mutex<Route>,
    navigations: Mutex<Vec<Route>>,
}

impl RecordingNavigator {
    pub fn new(current: Route) -> Self {
        Self {
            current: Mutex::new(current),
            navigations: Mutex::new(Vec::new()),
        }
    }

    pub fn set_current(&self, route: Route) {
        *self.current.lock().unwrap() = route;
    }

    pub fn navigations(&self) -> Vec<Route> {
        self.navigations.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn current_route(&self) -> Route {
        *self.current.lock().unwrap()
    }

    fn navigate(&self, route: Route) {
        self.navigations.lock().unwrap().push(route);
        *self.current.lock().unwrap() = route;
    }
}

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A toast-style notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: &str) -> Self {
        Self {
            level,
            message: message.to_string(),
        }
    }
}

/// Surfaces notices to the user.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Notifier that drops everything.
#[derive(Debug, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _notice: Notice) {}
}

/// Notifier that records notices for assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}
