//! Video file selection inside a torrent.

use serde::{Deserialize, Serialize};

use crate::dispatcher::HandlerError;
use crate::media::MediaType;

/// File extensions treated as video.
pub const VIDEO_EXTENSIONS: &[&str] = &["mkv", "mp4", "avi", "m4v", "mov", "wmv", "mpg", "mpeg", "ts"];

/// One file listed in a torrent's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentFile {
    /// Path inside the torrent.
    pub path: String,
    pub size_bytes: u64,
    /// Where the file can be fetched from once resolved.
    pub location: String,
}

pub fn is_video_file(path: &str) -> bool {
    path.rsplit_once('.')
        .map(|(_, ext)| {
            let ext = ext.to_lowercase();
            VIDEO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Pick the files worth downloading.
///
/// Movies and episodes get the single largest video file (samples and extras
/// are smaller); seasons get every video file, smallest first.
pub fn select_files(
    media_type: MediaType,
    files: &[TorrentFile],
) -> Result<Vec<TorrentFile>, HandlerError> {
    let mut videos: Vec<&TorrentFile> = files.iter().filter(|f| is_video_file(&f.path)).collect();
    if videos.is_empty() {
        return Err(HandlerError::NothingFound("no video files found".to_string()));
    }

    videos.sort_by_key(|f| f.size_bytes);

    let selected = match media_type {
        MediaType::Movie | MediaType::Episode => videos.split_off(videos.len() - 1),
        MediaType::Season => videos,
    };
    Ok(selected.into_iter().cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, size_bytes: u64) -> TorrentFile {
        TorrentFile {
            path: path.to_string(),
            size_bytes,
            location: format!("http://host/{}", path),
        }
    }

    #[test]
    fn test_is_video_file() {
        assert!(is_video_file("Batman.2010.1080p.mkv"));
        assert!(is_video_file("dir/EPISODE.MP4"));
        assert!(is_video_file("show.ts"));
        assert!(!is_video_file("Batman.2010.nfo"));
        assert!(!is_video_file("README"));
        assert!(!is_video_file("subs/batman.srt"));
    }

    #[test]
    fn test_movie_gets_largest_video() {
        let files = vec![
            file("sample.mkv", 50),
            file("Batman.2010.mkv", 4000),
            file("poster.jpg", 9000),
            file("extras.mkv", 700),
        ];
        let selected = select_files(MediaType::Movie, &files).unwrap();
        assert_eq!(selected, vec![file("Batman.2010.mkv", 4000)]);
    }

    #[test]
    fn test_season_gets_all_videos_smallest_first() {
        let files = vec![
            file("e02.mkv", 300),
            file("e01.mkv", 200),
            file("info.txt", 1),
            file("e03.mkv", 300),
        ];
        let paths: Vec<_> = select_files(MediaType::Season, &files)
            .unwrap()
            .into_iter()
            .map(|f| f.path)
            .collect();
        // Stable sort keeps e02 before e03.
        assert_eq!(paths, vec!["e01.mkv", "e02.mkv", "e03.mkv"]);
    }

    #[test]
    fn test_no_video_files() {
        let files = vec![file("readme.txt", 10)];
        assert!(matches!(
            select_files(MediaType::Episode, &files),
            Err(HandlerError::NothingFound(_))
        ));
    }
}
