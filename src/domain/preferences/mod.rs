pub mod interface;
pub mod player;

pub use interface::{InterfacePreferences, SortBy, SortOrder, Theme};
pub use player::{AspectRatio, PlayerPreferences, Resume};
