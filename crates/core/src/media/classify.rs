//! Quality and encoding classification from release titles.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::types::{Encoding, Quality};

static RESOLUTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"2160p|1080p|720p").unwrap());

static ENCODINGS: Lazy<Vec<(Encoding, Regex)>> = Lazy::new(|| {
    vec![
        (Encoding::X264, Regex::new(r"[xXhH]264").unwrap()),
        (Encoding::X265, Regex::new(r"[xXhH]265|hevc|HEVC").unwrap()),
        (Encoding::Xvid, Regex::new(r"[xX][vV][iI][dD]").unwrap()),
        (Encoding::Vc1, Regex::new(r"vc1|VC1|VC-1|vc-1").unwrap()),
    ]
});

impl Quality {
    /// Classify a release title by its resolution tag.
    ///
    /// Titles with no resolution tag, or with more than one, are treated as SD.
    pub fn from_title(title: &str) -> Quality {
        let mut matches = RESOLUTION.find_iter(title);
        let (Some(only), None) = (matches.next(), matches.next()) else {
            return Quality::Sd;
        };

        match only.as_str() {
            "2160p" => Quality::Uhd4k,
            "1080p" => Quality::Fhd,
            "720p" => Quality::Hd,
            _ => Quality::Sd,
        }
    }
}

impl Encoding {
    /// Classify a release title by its codec tag, defaulting to x264.
    pub fn from_title(title: &str) -> Encoding {
        ENCODINGS
            .iter()
            .find(|(_, re)| re.is_match(title))
            .map(|(encoding, _)| *encoding)
            .unwrap_or(Encoding::X264)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_from_title() {
        assert_eq!(Quality::from_title("Batman.2010.2160p.UHD"), Quality::Uhd4k);
        assert_eq!(Quality::from_title("Batman.2010.1080p.BluRay"), Quality::Fhd);
        assert_eq!(Quality::from_title("Batman.2010.720p.WEB"), Quality::Hd);
        assert_eq!(Quality::from_title("Batman.2010.DVDRip"), Quality::Sd);
    }

    #[test]
    fn test_ambiguous_resolution_is_sd() {
        assert_eq!(
            Quality::from_title("Batman.2010.1080p.and.720p.Pack"),
            Quality::Sd
        );
    }

    #[test]
    fn test_encoding_from_title() {
        assert_eq!(Encoding::from_title("Show.S01E01.HEVC"), Encoding::X265);
        assert_eq!(Encoding::from_title("Show.S01E01.h265"), Encoding::X265);
        assert_eq!(Encoding::from_title("Movie.XviD-GRP"), Encoding::Xvid);
        assert_eq!(Encoding::from_title("Movie.VC-1.Remux"), Encoding::Vc1);
        assert_eq!(Encoding::from_title("Movie.H264"), Encoding::X264);
    }

    #[test]
    fn test_encoding_defaults_to_x264() {
        assert_eq!(Encoding::from_title("Movie.2010.WEB"), Encoding::X264);
    }
}
