//! Inbound frame classification.
//!
//! A raw socket frame is either text or binary. Frames of a handful of
//! image-bearing kinds carry a textual header followed by a newline and a
//! binary payload in the same frame; [`decode`] splits those apart and
//! attaches an image handle whose settlement gates emission.

mod image;

use std::borrow::Cow;

use bytes::Bytes;

pub use image::{
    ImageCompleter,
    ImageError,
    ImageHandle,
    ImageState,
    PNG_LEAD_BYTE,
    PendingDecode,
    png_data_url,
};

/// Message kinds whose header is followed by a binary payload.
pub const IMAGE_PREFIXES: [&str; 8] = [
    "tile:",
    "tilecombine:",
    "delta:",
    "renderfont:",
    "rendersearchlist:",
    "slidelayer:",
    "zstdslidelayer:",
    "windowpaint:",
];

/// Header marker telling the client the payload is not a PNG.
const NO_PNG_MARKER: &str = " nopng";

/// A frame as delivered by the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawFrame {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame.
    Binary(Bytes),
}

impl From<&str> for RawFrame {
    fn from(value: &str) -> Self { RawFrame::Text(value.to_owned()) }
}

impl From<String> for RawFrame {
    fn from(value: String) -> Self { RawFrame::Text(value) }
}

impl From<Vec<u8>> for RawFrame {
    fn from(value: Vec<u8>) -> Self { RawFrame::Binary(Bytes::from(value)) }
}

/// Image-like payload attached to a frame.
#[derive(Clone, Debug)]
pub enum FrameImage {
    /// Raw delta or keyframe bytes handed straight to the view.
    Raw {
        /// Payload bytes.
        data: Bytes,
        /// Whether the buffer is a full keyframe rather than a delta.
        keyframe: bool,
    },
    /// PNG payload decoded into a data URL.
    Png(ImageHandle),
}

/// A classified inbound frame.
#[derive(Clone, Debug)]
pub struct InboundFrame {
    header: String,
    payload: Option<Bytes>,
    raw: Option<Bytes>,
    image: Option<FrameImage>,
}

/// Output of [`decode`]: the frame plus any decode work to schedule.
#[derive(Debug)]
pub struct Decoded {
    /// The classified frame.
    pub frame: InboundFrame,
    /// Image decode that must run before the frame completes.
    pub pending: Option<PendingDecode>,
}

impl InboundFrame {
    /// Build a text frame with no payload.
    #[must_use]
    pub fn text(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            payload: None,
            raw: None,
            image: None,
        }
    }

    /// Routed header text.
    #[must_use]
    pub fn header(&self) -> &str { &self.header }

    /// Bytes following the header newline, if any.
    #[must_use]
    pub fn payload(&self) -> Option<&Bytes> { self.payload.as_ref() }

    /// Attached image, if the frame carries one.
    #[must_use]
    pub fn image(&self) -> Option<&FrameImage> { self.image.as_ref() }

    /// Whether the frame arrived as a binary frame.
    #[must_use]
    pub fn is_binary(&self) -> bool { self.raw.is_some() }

    /// Whether the frame may be dispatched.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        match &self.image {
            Some(FrameImage::Png(handle)) => handle.is_settled(),
            _ => true,
        }
    }

    /// Text the dispatcher routes on.
    ///
    /// Binary frames that are not image-bearing are routed on their whole
    /// body, since the server sends some large text messages as binary.
    #[must_use]
    pub fn message_text(&self) -> Cow<'_, str> {
        match &self.raw {
            Some(raw) if !is_image_kind(&self.header) => String::from_utf8_lossy(raw),
            _ => Cow::Borrowed(&self.header),
        }
    }

    /// Attach an image to a manually built frame.
    #[must_use]
    pub fn with_image(mut self, image: FrameImage) -> Self {
        self.image = Some(image);
        self
    }
}

/// Whether `header` names one of the image-bearing kinds.
#[must_use]
pub fn is_image_kind(header: &str) -> bool {
    IMAGE_PREFIXES.iter().any(|prefix| header.starts_with(prefix))
}

/// Classify a raw frame.
///
/// ```
/// use docwire::frame::{RawFrame, decode};
///
/// let decoded = decode(RawFrame::from("status: {}"));
/// assert_eq!(decoded.frame.header(), "status: {}");
/// assert!(decoded.frame.is_complete());
/// ```
#[must_use]
pub fn decode(raw: RawFrame) -> Decoded {
    match raw {
        RawFrame::Text(text) => decode_text(text),
        RawFrame::Binary(bytes) => decode_binary(bytes),
    }
}

fn decode_text(text: String) -> Decoded {
    if !is_image_kind(&text) {
        return Decoded {
            frame: InboundFrame::text(text),
            pending: None,
        };
    }
    let (header, payload) = match text.find('\n') {
        Some(index) => (
            text[..index].to_owned(),
            Bytes::copy_from_slice(&text.as_bytes()[index + 1..]),
        ),
        None => (text, Bytes::new()),
    };
    attach_image(InboundFrame {
        header,
        payload: Some(payload),
        raw: None,
        image: None,
    })
}

fn decode_binary(bytes: Bytes) -> Decoded {
    let (header, payload) = match bytes.iter().position(|b| *b == b'\n') {
        Some(index) => (&bytes[..index], bytes.slice(index + 1..)),
        None => (&bytes[..], Bytes::new()),
    };
    let header = String::from_utf8_lossy(header).into_owned();
    attach_image(InboundFrame {
        header,
        payload: Some(payload),
        raw: Some(bytes),
        image: None,
    })
}

fn attach_image(mut frame: InboundFrame) -> Decoded {
    let header = frame.header.as_str();
    let is_tile = header.starts_with("tile:");
    let is_delta = header.starts_with("delta:");
    let wants_image = is_tile
        || is_delta
        || header.starts_with("renderfont:")
        || header.starts_with("slidelayer:")
        || header.starts_with("windowpaint:");
    let Some(payload) = frame.payload.clone() else {
        return Decoded {
            frame,
            pending: None,
        };
    };
    if !wants_image || header.contains(NO_PNG_MARKER) {
        return Decoded {
            frame,
            pending: None,
        };
    }

    let looks_png = matches!(payload.first().copied(), Some(b'P' | PNG_LEAD_BYTE));
    if (is_tile || is_delta) && !looks_png {
        frame.image = Some(FrameImage::Raw {
            data: payload,
            keyframe: is_tile,
        });
        return Decoded {
            frame,
            pending: None,
        };
    }
    if is_tile {
        frame.image = Some(FrameImage::Png(ImageHandle::settled(png_data_url(&payload))));
        return Decoded {
            frame,
            pending: None,
        };
    }
    let (handle, completer) = ImageHandle::pending();
    frame.image = Some(FrameImage::Png(handle));
    Decoded {
        frame,
        pending: Some(PendingDecode::new(payload, completer)),
    }
}

/// Truncate `text` to at most `limit` characters for logging.
#[must_use]
pub fn loggable(text: &str, limit: usize) -> Cow<'_, str> {
    match text.char_indices().nth(limit) {
        Some((index, _)) => Cow::Owned(format!("{}...", &text[..index])),
        None => Cow::Borrowed(text),
    }
}

#[cfg(test)]
mod tests;
