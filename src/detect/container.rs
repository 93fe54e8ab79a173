// Upload sniffing: recognise a video container from its leading bytes.

const EBML_MAGIC: [u8; 4] = [0x1A, 0x45, 0xDF, 0xA3];
const TS_SYNC: u8 = 0x47;
const TS_PACKET_LEN: usize = 188;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    /// ISO base media (MP4, MOV).
    Mp4,
    /// EBML based (MKV, WebM).
    Matroska,
    TransportStream,
    Unknown,
}

impl ContainerFormat {
    /// MIME type an upload of this container would be declared as.
    pub fn mime(&self) -> Option<&'static str> {
        match self {
            ContainerFormat::Mp4 => Some("video/mp4"),
            ContainerFormat::Matroska => Some("video/x-matroska"),
            ContainerFormat::TransportStream => Some("video/mp2t"),
            ContainerFormat::Unknown => None,
        }
    }
}

/// Classify `head`, the first bytes of an upload. Anything unrecognised is `Unknown`.
pub fn detect_container(head: &[u8]) -> ContainerFormat {
    let is_iso = head.get(4..8) == Some(b"ftyp".as_slice());
    let is_ebml = head.starts_with(&EBML_MAGIC);
    let is_ts = head.len() > TS_PACKET_LEN
        && head[0] == TS_SYNC
        && head[TS_PACKET_LEN] == TS_SYNC;

    match (is_iso, is_ebml, is_ts) {
        (true, _, _) => ContainerFormat::Mp4,
        (_, true, _) => ContainerFormat::Matroska,
        (_, _, true) => ContainerFormat::TransportStream,
        _ => ContainerFormat::Unknown,
    }
}

/// MIME essence: parameters dropped, whitespace trimmed, lowercased.
pub fn essence(mime: &str) -> String {
    mime.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
