//! Host-side status bar surface.

use std::sync::Arc;

/// One status bar item owned by a single engine.
pub trait StatusWidget: Send + Sync {
	fn set_text(&self, text: &str);
	fn set_tooltip(&self, tooltip: &str);
	fn set_warning_highlight(&self, on: bool);
	fn show(&self);
	fn hide(&self);
	/// Releases the item. No other call follows.
	fn dispose(&self) {}
}

/// Creates widgets on behalf of engines.
pub trait WidgetHost: Send + Sync {
	/// `refresh_command` is the command the host invokes when the item is clicked.
	fn create_widget(&self, entity_id: &str, refresh_command: &str, priority: i32) -> Arc<dyn StatusWidget>;
}
