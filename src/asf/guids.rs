// Well-known ASF object, stream and error-correction GUIDs

use crate::tree::alias_key;
use crate::utils::guid::Guid;

const fn guid(d1: u32, d2: u16, d3: u16, d4: u16, d5: u64) -> Guid {
    let b = d5.to_be_bytes();
    Guid::from_fields(d1, d2, d3, [(d4 >> 8) as u8, d4 as u8, b[2], b[3], b[4], b[5], b[6], b[7]])
}

// Top-level objects
pub const HEADER: Guid = guid(0x75b22630, 0x668e, 0x11cf, 0xa6d9, 0x00aa0062ce6c);
pub const DATA: Guid = guid(0x75b22636, 0x668e, 0x11cf, 0xa6d9, 0x00aa0062ce6c);
pub const SIMPLE_INDEX: Guid = guid(0x33000890, 0xe5b1, 0x11cf, 0x89f4, 0x00a0c90349cb);
pub const INDEX: Guid = guid(0xd6e229d3, 0x35da, 0x11d1, 0x9034, 0x00a0c90349be);

// Header objects
pub const FILE_PROPERTIES: Guid = guid(0x8cabdca1, 0xa947, 0x11cf, 0x8ee4, 0x00c00c205365);
pub const STREAM_PROPERTIES: Guid = guid(0xb7dc0791, 0xa9b7, 0x11cf, 0x8ee6, 0x00c00c205365);
pub const HEADER_EXTENSION: Guid = guid(0x5fbf03b5, 0xa92e, 0x11cf, 0x8ee3, 0x00c00c205365);
pub const CODEC_LIST: Guid = guid(0x86d15240, 0x311d, 0x11d0, 0xa3a4, 0x00a0c90348f6);
pub const SCRIPT_COMMAND: Guid = guid(0x1efb1a30, 0x0b62, 0x11d0, 0xa39b, 0x00a0c90348f6);
pub const MARKER: Guid = guid(0xf487cd01, 0xa951, 0x11cf, 0x8ee6, 0x00c00c205365);
pub const BITRATE_MUTUAL_EXCLUSION: Guid = guid(0xd6e229dc, 0x35da, 0x11d1, 0x9034, 0x00a0c90349be);
pub const ERROR_CORRECTION: Guid = guid(0x75b22635, 0x668e, 0x11cf, 0xa6d9, 0x00aa0062ce6c);
pub const CONTENT_DESCRIPTION: Guid = guid(0x75b22633, 0x668e, 0x11cf, 0xa6d9, 0x00aa0062ce6c);
pub const EXTENDED_CONTENT_DESCRIPTION: Guid = guid(0xd2d0a440, 0xe307, 0x11d2, 0x97f0, 0x00a0c95ea850);
pub const CONTENT_BRANDING: Guid = guid(0x2211b3fa, 0xbd23, 0x11d2, 0xb4b7, 0x00a0c955fc6e);
pub const STREAM_BITRATE_PROPERTIES: Guid = guid(0x7bf875ce, 0x468d, 0x11d1, 0x8d82, 0x006097c9a2b2);
pub const CONTENT_ENCRYPTION: Guid = guid(0x2211b3fb, 0xbd23, 0x11d2, 0xb4b7, 0x00a0c955fc6e);
pub const EXTENDED_CONTENT_ENCRYPTION: Guid = guid(0x298ae614, 0x2622, 0x4c17, 0xb935, 0xdae07ee9289c);
pub const DIGITAL_SIGNATURE: Guid = guid(0x2211b3fc, 0xbd23, 0x11d2, 0xb4b7, 0x00a0c955fc6e);
pub const PADDING: Guid = guid(0x1806d474, 0xcadf, 0x4509, 0xa4ba, 0x9aabcb96aae8);

// Header extension objects
pub const EXTENDED_STREAM_PROPERTIES: Guid = guid(0x14e6a5cb, 0xc672, 0x4332, 0x8399, 0xa96952065b5a);
pub const LANGUAGE_LIST: Guid = guid(0x7c4346a9, 0xefe0, 0x4bfc, 0xb229, 0x393ede415c85);
pub const METADATA: Guid = guid(0xc5f8cbea, 0x5baf, 0x4877, 0x8467, 0xaa8c44fa4cca);
pub const METADATA_LIBRARY: Guid = guid(0x44231c94, 0x9498, 0x49d1, 0xa141, 0x1d134e457054);

// Reserved values written into preambles
pub const RESERVED_1: Guid = guid(0xabd3d211, 0xa9ba, 0x11cf, 0x8ee6, 0x00c00c205365);
pub const RESERVED_2: Guid = guid(0x86d15241, 0x311d, 0x11d0, 0xa3a4, 0x00a0c90348f6);
pub const RESERVED_3: Guid = guid(0x4b1acbe3, 0x100b, 0x11d0, 0xa39b, 0x00a0c90348f6);
pub const RESERVED_4: Guid = guid(0x4cfedb20, 0x75f6, 0x11cf, 0x9c0f, 0x00a0c90349cb);

// Stream types
pub const AUDIO_MEDIA: Guid = guid(0xf8699e40, 0x5b4d, 0x11cf, 0xa8fd, 0x00805f5c442b);
pub const VIDEO_MEDIA: Guid = guid(0xbc19efc0, 0x5b4d, 0x11cf, 0xa8fd, 0x00805f5c442b);
pub const COMMAND_MEDIA: Guid = guid(0x59dacfc0, 0x59e6, 0x11d0, 0xa3ac, 0x00a0c90348f6);
pub const JFIF_MEDIA: Guid = guid(0xb61be100, 0x5b4e, 0x11cf, 0xa8fd, 0x00805f5c442b);
pub const DEGRADABLE_JPEG_MEDIA: Guid = guid(0x35907de0, 0xe415, 0x11cf, 0xa917, 0x00805f5c442b);
pub const FILE_TRANSFER_MEDIA: Guid = guid(0x91bd222c, 0xf21c, 0x497a, 0x8b6d, 0x5aa86bfc0185);
pub const BINARY_MEDIA: Guid = guid(0x3afb65e2, 0x47ef, 0x40f2, 0xac2c, 0x70a90d71d343);

// Error correction types
pub const NO_ERROR_CORRECTION: Guid = guid(0x20fb5700, 0x5b55, 0x11cf, 0xa8fd, 0x00805f5c442b);
pub const AUDIO_SPREAD: Guid = guid(0xbfc3cd50, 0x618f, 0x11cf, 0x8bb2, 0x00aa00b4e220);

/// Logical object names accepted by `get_first_by_name`
const ALIASES: &[(&str, Guid)] = &[
    ("header", HEADER),
    ("data", DATA),
    ("simpleIndex", SIMPLE_INDEX),
    ("index", INDEX),
    ("fileProperties", FILE_PROPERTIES),
    ("streamProperties", STREAM_PROPERTIES),
    ("headerExtension", HEADER_EXTENSION),
    ("codecList", CODEC_LIST),
    ("scriptCommand", SCRIPT_COMMAND),
    ("marker", MARKER),
    ("bitrateMutualExclusion", BITRATE_MUTUAL_EXCLUSION),
    ("errorCorrection", ERROR_CORRECTION),
    ("contentDescription", CONTENT_DESCRIPTION),
    ("extendedContentDescription", EXTENDED_CONTENT_DESCRIPTION),
    ("contentBranding", CONTENT_BRANDING),
    ("streamBitrateProperties", STREAM_BITRATE_PROPERTIES),
    ("contentEncryption", CONTENT_ENCRYPTION),
    ("extendedContentEncryption", EXTENDED_CONTENT_ENCRYPTION),
    ("digitalSignature", DIGITAL_SIGNATURE),
    ("padding", PADDING),
    ("extendedStreamProperties", EXTENDED_STREAM_PROPERTIES),
    ("languageList", LANGUAGE_LIST),
    ("metadata", METADATA),
    ("metadataLibrary", METADATA_LIBRARY),
];

/// Resolve `fileProperties`, `file_properties` or `FILE_PROPERTIES` to its GUID
pub fn by_name(name: &str) -> Option<Guid> {
    let key = alias_key(name);
    ALIASES
        .iter()
        .find(|(alias, _)| alias_key(alias) == key)
        .map(|(_, guid)| *guid)
}

/// Human-readable name of a known GUID
pub fn name_of(guid: &Guid) -> Option<&'static str> {
    ALIASES
        .iter()
        .find(|(_, known)| known == guid)
        .map(|(alias, _)| *alias)
}
