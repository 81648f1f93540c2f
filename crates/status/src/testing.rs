//! In-memory widget doubles for exercising engines without a UI.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{StatusWidget, WidgetHost};

/// Everything a widget was told, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetEvent {
	Text(String),
	Tooltip(String),
	Warning(bool),
	Show,
	Hide,
	Dispose,
}

#[derive(Debug, Default)]
struct WidgetLog {
	events: Vec<WidgetEvent>,
	text: String,
	tooltip: String,
	warning: bool,
	visible: bool,
	disposed: bool,
}

/// Widget that records every call.
#[derive(Debug, Default)]
pub struct RecordingWidget {
	log: Mutex<WidgetLog>,
}

impl RecordingWidget {
	pub fn text(&self) -> String {
		self.log.lock().text.clone()
	}

	pub fn tooltip(&self) -> String {
		self.log.lock().tooltip.clone()
	}

	pub fn warning(&self) -> bool {
		self.log.lock().warning
	}

	pub fn is_visible(&self) -> bool {
		self.log.lock().visible
	}

	pub fn is_disposed(&self) -> bool {
		self.log.lock().disposed
	}

	pub fn events(&self) -> Vec<WidgetEvent> {
		self.log.lock().events.clone()
	}

	/// Number of text updates received so far.
	pub fn text_updates(&self) -> usize {
		self.log.lock().events.iter().filter(|e| matches!(e, WidgetEvent::Text(_))).count()
	}

	fn record(&self, event: WidgetEvent) {
		let mut log = self.log.lock();
		match &event {
			WidgetEvent::Text(text) => log.text.clone_from(text),
			WidgetEvent::Tooltip(tooltip) => log.tooltip.clone_from(tooltip),
			WidgetEvent::Warning(on) => log.warning = *on,
			WidgetEvent::Show => log.visible = true,
			WidgetEvent::Hide => log.visible = false,
			WidgetEvent::Dispose => {
				log.visible = false;
				log.disposed = true;
			}
		}
		log.events.push(event);
	}
}

impl StatusWidget for RecordingWidget {
	fn set_text(&self, text: &str) {
		self.record(WidgetEvent::Text(text.to_string()));
	}

	fn set_tooltip(&self, tooltip: &str) {
		self.record(WidgetEvent::Tooltip(tooltip.to_string()));
	}

	fn set_warning_highlight(&self, on: bool) {
		self.record(WidgetEvent::Warning(on));
	}

	fn show(&self) {
		self.record(WidgetEvent::Show);
	}

	fn hide(&self) {
		self.record(WidgetEvent::Hide);
	}

	fn dispose(&self) {
		self.record(WidgetEvent::Dispose);
	}
}

/// Host handing out [`RecordingWidget`]s, retrievable by entity id.
#[derive(Debug, Default)]
pub struct RecordingHost {
	widgets: Mutex<BTreeMap<String, Arc<RecordingWidget>>>,
	commands: Mutex<BTreeMap<String, String>>,
}

impl RecordingHost {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn widget(&self, entity_id: &str) -> Option<Arc<RecordingWidget>> {
		self.widgets.lock().get(entity_id).cloned()
	}

	/// Refresh command bound to the entity's widget.
	pub fn command(&self, entity_id: &str) -> Option<String> {
		self.commands.lock().get(entity_id).cloned()
	}
}

impl WidgetHost for RecordingHost {
	fn create_widget(&self, entity_id: &str, refresh_command: &str, _priority: i32) -> Arc<dyn StatusWidget> {
		let widget = Arc::new(RecordingWidget::default());
		self.widgets.lock().insert(entity_id.to_string(), Arc::clone(&widget));
		self.commands.lock().insert(entity_id.to_string(), refresh_command.to_string());
		widget
	}
}
