//! Terminal user interface.
//!
//! A ratatui front end over [`CommandSession`](crate::command::CommandSession):
//! port picker, connect toggle, the text to type, the Type / Stop / Status
//! actions, the activity log and a modal popup for notices.
//!
//! # Example
//!
//! ```rust,ignore
//! use serial_keyboard_controller::tui::App;
//!
//! let mut app = App::new(config, controller);
//! app.run(controller_events).await?;
//! ```

mod app;
mod event;
mod theme;
mod ui;

pub use app::{Action, App, AppState, Mode};
pub use event::{Event, EventHandler};
pub use theme::{Theme, THEMES};
pub use ui::render;
