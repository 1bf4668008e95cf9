// Unified metadata field mapping system
//
// Each format names the same piece of metadata differently:
// - ID3v2: Frame IDs (TIT2, TPE1, TALB, etc.)
// - ASF: Content Description fields and `WM/*` descriptor names
// - MP4: iTunes atoms (©nam, ©ART, ©alb, etc.)
//
// This module standardizes field access across formats and resolves the
// human-readable aliases accepted by frame lookups.

use crate::id3::frames::FrameId;
use serde::Serialize;

/// Standard metadata fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StandardField {
    Title,
    Artist,
    AlbumArtist,
    Album,
    Year,
    Track,
    Disc,
    Genre,
    Composer,
    Comment,
    Lyrics,
    Cover,
}

impl StandardField {
    pub const ALL: [StandardField; 12] = [
        StandardField::Title,
        StandardField::Artist,
        StandardField::AlbumArtist,
        StandardField::Album,
        StandardField::Year,
        StandardField::Track,
        StandardField::Disc,
        StandardField::Genre,
        StandardField::Composer,
        StandardField::Comment,
        StandardField::Lyrics,
        StandardField::Cover,
    ];

    /// Get standard field name (lowercase)
    pub fn as_str(&self) -> &'static str {
        match self {
            StandardField::Title => "title",
            StandardField::Artist => "artist",
            StandardField::AlbumArtist => "albumartist",
            StandardField::Album => "album",
            StandardField::Year => "year",
            StandardField::Track => "track",
            StandardField::Disc => "disc",
            StandardField::Genre => "genre",
            StandardField::Composer => "composer",
            StandardField::Comment => "comment",
            StandardField::Lyrics => "lyrics",
            StandardField::Cover => "cover",
        }
    }

    /// Parse from string; case, `_`, `-` and spaces are ignored
    pub fn from_name(s: &str) -> Option<Self> {
        let key = crate::tree::alias_key(s);
        Self::ALL.into_iter().find(|field| field.as_str() == key)
    }
}

/// Where an ASF file keeps a standard field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsfField {
    Title,
    Author,
    Copyright,
    Description,
    Descriptor(&'static str),
}

/// Format-specific field mappings
pub struct FieldMappings;

impl FieldMappings {
    // MP4 iTunes atoms (with special characters)
    pub const MP4_TITLE: [u8; 4] = *b"\xA9nam"; // ©nam
    pub const MP4_ARTIST: [u8; 4] = *b"\xA9ART"; // ©ART
    pub const MP4_ALBUM_ARTIST: [u8; 4] = *b"aART";
    pub const MP4_ALBUM: [u8; 4] = *b"\xA9alb"; // ©alb
    pub const MP4_YEAR: [u8; 4] = *b"\xA9day"; // ©day
    pub const MP4_TRACK: [u8; 4] = *b"trkn";
    pub const MP4_DISC: [u8; 4] = *b"disk";
    pub const MP4_GENRE: [u8; 4] = *b"\xA9gen"; // ©gen
    pub const MP4_COMPOSER: [u8; 4] = *b"\xA9wrt";
    pub const MP4_COMMENT: [u8; 4] = *b"\xA9cmt"; // ©cmt
    pub const MP4_LYRICS: [u8; 4] = *b"\xA9lyr"; // ©lyr
    pub const MP4_COVER: [u8; 4] = *b"covr";

    /// Get ID3v2 frame ID for a standard field; the year frame moved in 2.4
    pub fn to_id3v2(field: StandardField, major: u8) -> FrameId {
        use crate::id3::frames::frame_ids::*;
        match field {
            StandardField::Title => TITLE,
            StandardField::Artist => ARTIST,
            StandardField::AlbumArtist => ALBUM_ARTIST,
            StandardField::Album => ALBUM,
            StandardField::Year if major >= 4 => RECORDING_TIME,
            StandardField::Year => YEAR,
            StandardField::Track => TRACK,
            StandardField::Disc => DISC,
            StandardField::Genre => GENRE,
            StandardField::Composer => COMPOSER,
            StandardField::Comment => COMMENT,
            StandardField::Lyrics => LYRICS,
            StandardField::Cover => PICTURE,
        }
    }

    /// Convert ID3v2 frame to standard field
    pub fn from_id3v2(frame_id: &FrameId) -> Option<StandardField> {
        let field = match &frame_id.0 {
            b"TIT2" => StandardField::Title,
            b"TPE1" => StandardField::Artist,
            b"TPE2" => StandardField::AlbumArtist,
            b"TALB" => StandardField::Album,
            b"TDRC" | b"TYER" => StandardField::Year,
            b"TRCK" => StandardField::Track,
            b"TPOS" => StandardField::Disc,
            b"TCON" => StandardField::Genre,
            b"TCOM" => StandardField::Composer,
            b"COMM" => StandardField::Comment,
            b"USLT" => StandardField::Lyrics,
            b"APIC" => StandardField::Cover,
            _ => return None,
        };
        Some(field)
    }

    /// Frame named by a standard field alias (`title`) or a literal identifier (`TIT2`)
    pub fn resolve_id3v2(name: &str, major: u8) -> Option<FrameId> {
        StandardField::from_name(name)
            .map(|field| Self::to_id3v2(field, major))
            .or_else(|| FrameId::new(name).ok())
    }

    pub fn to_asf(field: StandardField) -> AsfField {
        match field {
            StandardField::Title => AsfField::Title,
            StandardField::Artist => AsfField::Author,
            StandardField::AlbumArtist => AsfField::Descriptor("WM/AlbumArtist"),
            StandardField::Album => AsfField::Descriptor("WM/AlbumTitle"),
            StandardField::Year => AsfField::Descriptor("WM/Year"),
            StandardField::Track => AsfField::Descriptor("WM/TrackNumber"),
            StandardField::Disc => AsfField::Descriptor("WM/PartOfSet"),
            StandardField::Genre => AsfField::Descriptor("WM/Genre"),
            StandardField::Composer => AsfField::Descriptor("WM/Composer"),
            StandardField::Comment => AsfField::Description,
            StandardField::Lyrics => AsfField::Descriptor("WM/Lyrics"),
            StandardField::Cover => AsfField::Descriptor("WM/Picture"),
        }
    }

    pub fn to_mp4(field: StandardField) -> [u8; 4] {
        match field {
            StandardField::Title => Self::MP4_TITLE,
            StandardField::Artist => Self::MP4_ARTIST,
            StandardField::AlbumArtist => Self::MP4_ALBUM_ARTIST,
            StandardField::Album => Self::MP4_ALBUM,
            StandardField::Year => Self::MP4_YEAR,
            StandardField::Track => Self::MP4_TRACK,
            StandardField::Disc => Self::MP4_DISC,
            StandardField::Genre => Self::MP4_GENRE,
            StandardField::Composer => Self::MP4_COMPOSER,
            StandardField::Comment => Self::MP4_COMMENT,
            StandardField::Lyrics => Self::MP4_LYRICS,
            StandardField::Cover => Self::MP4_COVER,
        }
    }

    pub fn from_mp4(atom: &[u8; 4]) -> Option<StandardField> {
        StandardField::ALL.into_iter().find(|&field| Self::to_mp4(field) == *atom)
    }
}

/// ID3v1 genre names, indexed by genre byte
const ID3V1_GENRES: [&str; 126] = [
    "Blues", "Classic Rock", "Country", "Dance", "Disco", "Funk", "Grunge", "Hip-Hop", "Jazz",
    "Metal", "New Age", "Oldies", "Other", "Pop", "R&B", "Rap", "Reggae", "Rock", "Techno",
    "Industrial", "Alternative", "Ska", "Death Metal", "Pranks", "Soundtrack", "Euro-Techno",
    "Ambient", "Trip-Hop", "Vocal", "Jazz+Funk", "Fusion", "Trance", "Classical", "Instrumental",
    "Acid", "House", "Game", "Sound Clip", "Gospel", "Noise", "AlternRock", "Bass", "Soul", "Punk",
    "Space", "Meditative", "Instrumental Pop", "Instrumental Rock", "Ethnic", "Gothic", "Darkwave",
    "Techno-Industrial", "Electronic", "Pop-Folk", "Eurodance", "Dream", "Southern Rock", "Comedy",
    "Cult", "Gangsta", "Top 40", "Christian Rap", "Pop/Funk", "Jungle", "Native American",
    "Cabaret", "New Wave", "Psychadelic", "Rave", "Showtunes", "Trailer", "Lo-Fi", "Tribal",
    "Acid Punk", "Acid Jazz", "Polka", "Retro", "Musical", "Rock & Roll", "Hard Rock", "Folk",
    "Folk-Rock", "National Folk", "Swing", "Fast Fusion", "Bebob", "Latin", "Revival", "Celtic",
    "Bluegrass", "Avantgarde", "Gothic Rock", "Progressive Rock", "Psychedelic Rock",
    "Symphonic Rock", "Slow Rock", "Big Band", "Chorus", "Easy Listening", "Acoustic", "Humour",
    "Speech", "Chanson", "Opera", "Chamber Music", "Sonata", "Symphony", "Booty Bass", "Primus",
    "Porn Groove", "Satire", "Slow Jam", "Club", "Tango", "Samba", "Folklore", "Ballad",
    "Power Ballad", "Rhythmic Soul", "Freestyle", "Duet", "Punk Rock", "Drum Solo", "A capella",
    "Euro-House", "Dance Hall",
];

/// Metadata value converter for handling format-specific value formats
pub struct ValueConverter;

impl ValueConverter {
    /// Extract the 4-digit year from `2024-01-15` and similar
    pub fn normalize_year(year: &str) -> String {
        let year_str = year.trim();
        match year_str.get(..4) {
            Some(prefix) => prefix.to_string(),
            None => year_str.to_string(),
        }
    }

    /// Convert track number to standard format (e.g., "1/10" -> "1")
    pub fn normalize_track(track: &str) -> String {
        track.split('/').next().unwrap_or(track).trim().to_string()
    }

    /// Parse genre from numeric ID3v1 genre (if applicable)
    pub fn parse_genre_id3v1(genre_id: u8) -> Option<&'static str> {
        ID3V1_GENRES.get(genre_id as usize).copied()
    }

    /// Resolve `(17)`, `(17)Rock` and `17` genre references used by ID3v2 `TCON`
    pub fn normalize_genre(genre: &str) -> String {
        let trimmed = genre.trim();
        let reference = trimmed
            .strip_prefix('(')
            .and_then(|rest| rest.split_once(')'))
            .map(|(number, refinement)| (number, refinement.trim()));
        match reference {
            Some((_, refinement)) if !refinement.is_empty() => refinement.to_string(),
            Some((number, _)) => Self::genre_by_number(number).unwrap_or_else(|| trimmed.to_string()),
            None => Self::genre_by_number(trimmed).unwrap_or_else(|| trimmed.to_string()),
        }
    }

    fn genre_by_number(text: &str) -> Option<String> {
        let id: u8 = text.parse().ok()?;
        Self::parse_genre_id3v1(id).map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_standard_field_parsing() {
        assert_eq!(StandardField::from_name("title"), Some(StandardField::Title));
        assert_eq!(StandardField::from_name("TITLE"), Some(StandardField::Title));
        assert_eq!(StandardField::from_name("album_artist"), Some(StandardField::AlbumArtist));
        assert_eq!(StandardField::from_name("unknown"), None);
    }

    #[test]
    fn test_field_mapping() {
        assert_eq!(FieldMappings::to_id3v2(StandardField::Title, 4).to_string(), "TIT2");
        assert_eq!(FieldMappings::to_id3v2(StandardField::Year, 3).to_string(), "TYER");
        assert_eq!(FieldMappings::to_id3v2(StandardField::Year, 4).to_string(), "TDRC");
        assert_eq!(FieldMappings::from_id3v2(&FrameId(*b"TYER")), Some(StandardField::Year));
        assert_eq!(FieldMappings::to_asf(StandardField::Album), AsfField::Descriptor("WM/AlbumTitle"));
        assert_eq!(FieldMappings::from_mp4(b"\xA9nam"), Some(StandardField::Title));
        assert_eq!(FieldMappings::from_mp4(b"free"), None);
    }

    #[test]
    fn test_resolve_aliases() {
        assert_eq!(FieldMappings::resolve_id3v2("artist", 3), Some(FrameId(*b"TPE1")));
        assert_eq!(FieldMappings::resolve_id3v2("TXXX", 3), Some(FrameId(*b"TXXX")));
        assert_eq!(FieldMappings::resolve_id3v2("nope", 3), None);
    }

    #[test]
    fn test_value_normalization() {
        assert_eq!(ValueConverter::normalize_year("2024-01-15"), "2024");
        assert_eq!(ValueConverter::normalize_year("2024"), "2024");
        assert_eq!(ValueConverter::normalize_track("1/10"), "1");
        assert_eq!(ValueConverter::normalize_track("5"), "5");
    }

    #[test]
    fn test_genres() {
        assert_eq!(ValueConverter::parse_genre_id3v1(0), Some("Blues"));
        assert_eq!(ValueConverter::parse_genre_id3v1(125), Some("Dance Hall"));
        assert_eq!(ValueConverter::parse_genre_id3v1(200), None);
        assert_eq!(ValueConverter::normalize_genre("(17)"), "Rock");
        assert_eq!(ValueConverter::normalize_genre("(17)Heavy"), "Heavy");
        assert_eq!(ValueConverter::normalize_genre("13"), "Pop");
        assert_eq!(ValueConverter::normalize_genre("Jazz"), "Jazz");
    }
}
