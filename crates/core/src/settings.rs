//! Observable display settings shared by every session.

use tokio::sync::watch;
use webshell_runtime::Theme;

/// Default terminal font size in points.
pub const DEFAULT_FONT_SIZE: u16 = 14;

/// Current theme and font size, with change notification.
///
/// Every live session follows these values; a change reaches all of them.
pub struct SettingsStore {
	theme: watch::Sender<Theme>,
	font_size: watch::Sender<u16>,
}

impl SettingsStore {
	pub fn new(theme: Theme, font_size: u16) -> Self {
		Self {
			theme: watch::Sender::new(theme),
			font_size: watch::Sender::new(font_size),
		}
	}

	pub fn theme(&self) -> Theme {
		self.theme.borrow().clone()
	}

	pub fn font_size(&self) -> u16 {
		*self.font_size.borrow()
	}

	pub fn set_theme(&self, theme: Theme) {
		self.theme.send_replace(theme);
	}

	pub fn set_font_size(&self, font_size: u16) {
		self.font_size.send_replace(font_size);
	}

	pub fn subscribe_theme(&self) -> watch::Receiver<Theme> {
		self.theme.subscribe()
	}

	pub fn subscribe_font_size(&self) -> watch::Receiver<u16> {
		self.font_size.subscribe()
	}
}

impl Default for SettingsStore {
	fn default() -> Self {
		Self::new(Theme::default(), DEFAULT_FONT_SIZE)
	}
}
