//! Image payloads carried by tile-like frames.
//!
//! A PNG payload is decoded off the actor task. Until then the frame's
//! [`ImageHandle`] reports it as pending and the emission queue stops in
//! front of it. The [`ImageCompleter`] always settles the handle, even when
//! dropped without an explicit outcome.

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::watch;

/// First byte of the PNG signature; servers strip it from tile payloads.
pub const PNG_LEAD_BYTE: u8 = 0x89;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Why a payload could not be turned into an image.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ImageError {
    /// The payload is too short to hold a PNG header.
    #[error("image payload truncated ({0} bytes)")]
    Truncated(usize),
    /// The payload does not start with the PNG signature.
    #[error("payload is not a PNG image")]
    NotPng,
}

/// Load progress of an embedded image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageState {
    /// Decode has not finished.
    Pending,
    /// Decoded into a `data:` URL.
    Ready(Arc<str>),
    /// Decode failed; the frame is still dispatched.
    Failed,
}

/// Shared view of an image's load state.
#[derive(Clone, Debug)]
pub struct ImageHandle {
    state: watch::Receiver<ImageState>,
}

impl ImageHandle {
    /// Create a handle whose outcome is already known.
    #[must_use]
    pub fn settled(outcome: Result<String, ImageError>) -> Self {
        let state = match outcome {
            Ok(url) => ImageState::Ready(url.into()),
            Err(_) => ImageState::Failed,
        };
        let (_tx, rx) = watch::channel(state);
        Self { state: rx }
    }

    /// Create a pending handle together with the completer that settles it.
    #[must_use]
    pub fn pending() -> (Self, ImageCompleter) {
        let (tx, rx) = watch::channel(ImageState::Pending);
        (Self { state: rx }, ImageCompleter { tx: Some(tx) })
    }

    /// Whether decoding has succeeded or failed.
    #[must_use]
    pub fn is_settled(&self) -> bool { !matches!(*self.state.borrow(), ImageState::Pending) }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> ImageState { self.state.borrow().clone() }

    /// The decoded `data:` URL, when ready.
    #[must_use]
    pub fn data_url(&self) -> Option<Arc<str>> {
        match &*self.state.borrow() {
            ImageState::Ready(url) => Some(Arc::clone(url)),
            _ => None,
        }
    }
}

/// Write side of a pending [`ImageHandle`].
#[derive(Debug)]
pub struct ImageCompleter {
    tx: Option<watch::Sender<ImageState>>,
}

impl ImageCompleter {
    /// Settle the handle with a decode outcome.
    pub fn complete(mut self, outcome: Result<String, ImageError>) {
        let state = match outcome {
            Ok(url) => ImageState::Ready(url.into()),
            Err(_) => ImageState::Failed,
        };
        if let Some(tx) = self.tx.take() {
            tx.send_replace(state);
        }
    }
}

impl Drop for ImageCompleter {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            tx.send_replace(ImageState::Failed);
        }
    }
}

/// Build a `data:` URL from a PNG payload, restoring the stripped lead
/// byte if needed.
///
/// ```
/// use docwire::frame::png_data_url;
///
/// let body = b"PNG\r\n\x1a\n\0\0\0\rIHDR";
/// let url = png_data_url(body).unwrap();
/// assert!(url.starts_with("data:image/png;base64,iVBORw0KGgo"));
/// ```
///
/// # Errors
///
/// Returns [`ImageError`] when the bytes do not form a PNG signature.
pub fn png_data_url(payload: &[u8]) -> Result<String, ImageError> {
    let mut bytes = Vec::with_capacity(payload.len() + 1);
    if payload.first() != Some(&PNG_LEAD_BYTE) {
        bytes.push(PNG_LEAD_BYTE);
    }
    bytes.extend_from_slice(payload);
    if bytes.len() < PNG_SIGNATURE.len() {
        return Err(ImageError::Truncated(bytes.len()));
    }
    if bytes[..PNG_SIGNATURE.len()] != PNG_SIGNATURE {
        return Err(ImageError::NotPng);
    }
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(&bytes)))
}

/// Image decode deferred to a blocking task.
#[derive(Debug)]
pub struct PendingDecode {
    payload: Bytes,
    completer: ImageCompleter,
}

impl PendingDecode {
    pub(crate) fn new(payload: Bytes, completer: ImageCompleter) -> Self {
        Self { payload, completer }
    }

    /// Decode the payload and settle the handle.
    pub fn run(self) {
        let outcome = png_data_url(&self.payload);
        if let Err(e) = &outcome {
            log::debug!("image decode failed: error={e}, bytes={}", self.payload.len());
        }
        self.completer.complete(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = b"PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[test]
    fn restores_lead_byte() {
        let url = png_data_url(BODY).expect("png");
        let with_lead = [&[PNG_LEAD_BYTE][..], BODY].concat();
        assert_eq!(url, png_data_url(&with_lead).expect("png"));
    }

    #[test]
    fn rejects_non_png_payloads() {
        assert_eq!(png_data_url(b"GIF89a-not-a-png"), Err(ImageError::NotPng));
        assert_eq!(png_data_url(b"PN"), Err(ImageError::Truncated(3)));
    }

    #[test]
    fn dropped_completer_settles_as_failed() {
        let (handle, completer) = ImageHandle::pending();
        assert!(!handle.is_settled());
        drop(completer);
        assert!(handle.is_settled());
        assert_eq!(handle.state(), ImageState::Failed);
    }

    #[test]
    fn pending_decode_publishes_url() {
        let (handle, completer) = ImageHandle::pending();
        PendingDecode::new(Bytes::from_static(BODY), completer).run();
        assert!(handle.data_url().is_some());
    }
}
