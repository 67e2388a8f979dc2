use std::path::{Path, PathBuf};

use bytes::Bytes;

/// One chunk of the drone's compressed video stream, exactly as it arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoPacket(pub Bytes);

impl VideoPacket {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for VideoPacket {
    fn from(data: Vec<u8>) -> Self {
        VideoPacket(Bytes::from(data))
    }
}

impl From<&'static [u8]> for VideoPacket {
    fn from(data: &'static [u8]) -> Self {
        VideoPacket(Bytes::from_static(data))
    }
}

/// An image produced by the decoder, read into memory by the sampler.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    /// Where the decoder wrote the image. The file no longer exists once the
    /// sampler has handed the frame off.
    pub path: PathBuf,
    /// Ordering key parsed from the file name, if it carried one.
    pub sequence: Option<u64>,
    pub data: Bytes,
}

impl DecodedFrame {
    pub fn new(path: impl AsRef<Path>, data: impl Into<Bytes>) -> Self {
        let path = path.as_ref().to_owned();
        let sequence = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(sequence_number);

        Self {
            path,
            sequence,
            data: data.into(),
        }
    }
}

/// Parses the sequence number a decoder embeds in an output file name, i.e.
/// the trailing run of digits in the file stem (`output_0012.png` -> 12).
pub fn sequence_number(file_name: &str) -> Option<u64> {
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    };

    let digits_start = stem
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(idx, _)| idx)?;

    stem[digits_start..].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_trailing_digits_of_stem() {
        assert_eq!(sequence_number("output_0001.png"), Some(1));
        assert_eq!(sequence_number("output_0420.png"), Some(420));
        assert_eq!(sequence_number("frame12"), Some(12));
        assert_eq!(sequence_number("output.png"), None);
        assert_eq!(sequence_number("3d_output.png"), None);
    }

    #[test]
    fn frame_carries_sequence_from_path() {
        let frame = DecodedFrame::new("/tmp/x/output_0003.png", vec![1, 2, 3]);
        assert_eq!(frame.sequence, Some(3));
        assert_eq!(&frame.data[..], &[1, 2, 3]);
    }
}
