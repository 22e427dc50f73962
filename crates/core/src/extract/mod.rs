//! Extract handlers: turning sources into concrete downloads.

mod files;
mod passthrough;
mod torrent;

pub use files::{is_video_file, select_files, TorrentFile, VIDEO_EXTENSIONS};
pub use passthrough::PassthroughExtractor;
pub use torrent::{MetadataResolver, TorrentExtractor};
