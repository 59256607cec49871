//! Subtitle synchronization with the playback
//!
//! - `preference` - which subtitle a play request should use
//! - `manager` - fetches, cancels and activates subtitles per playback
//! - `picker` - user picking of custom subtitle files
//! - `render` - native player rendering or overlay fallback
//! - `listener` - subtitle state notifications

pub mod listener;
pub mod manager;
pub mod picker;
pub mod preference;
pub mod render;

pub use listener::{ListenerRegistry, SubtitleEvent, SubtitleListener};
pub use manager::{SessionSnapshot, SubtitleManager, SUBTITLE_DOWNLOAD_FAILED};
pub use picker::{PromptPicker, SubtitlePicker};
pub use preference::resolve;
pub use render::RenderDispatcher;
