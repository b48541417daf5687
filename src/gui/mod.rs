//! eframe front-end for SaveGas.
//!
//! - `app` - `SaveGasApp` state, job polling and `launch`
//! - `async_job` - futures on the app runtime, polled each frame
//! - `theme` - colors and styled widgets
//! - `notifications` - notification feed and error descriptions
//! - `views` - panel rendering
//!
//! ```no_run
//! use savegas::config::Config;
//! use savegas::gui;
//!
//! gui::launch(Config::default()).expect("Failed to launch GUI");
//! ```

mod app;
pub mod async_job;
pub mod notifications;
pub mod theme;
pub mod views;

pub use app::{launch, SaveGasApp};
pub use async_job::AsyncJob;
pub use notifications::{NotificationEntry, Notifications};
pub use theme::{configure_style, AppTheme};
