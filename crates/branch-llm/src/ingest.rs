//! Byte stream -> growing text snapshots.
//!
//! A chunk boundary may split a multi-byte character, so bytes are decoded
//! through [`Utf8StreamDecoder`], which holds back an incomplete tail until
//! the next chunk arrives. The stream ends only when the underlying body
//! ends; there is no idle timeout and no retry.

use std::pin::Pin;

use futures::{Stream, StreamExt};

use crate::backend::ByteStream;
use crate::error::{LLMError, Result};

pub type SnapshotStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `bytes` (plus any held-back tail) as forms complete
    /// characters.
    pub fn push(&mut self, bytes: &[u8]) -> Result<String> {
        self.pending.extend_from_slice(bytes);
        match std::str::from_utf8(&self.pending) {
            Ok(text) => {
                let text = text.to_string();
                self.pending.clear();
                Ok(text)
            }
            Err(err) if err.error_len().is_some() => Err(LLMError::Decode(format!(
                "invalid UTF-8 sequence at byte {}",
                err.valid_up_to()
            ))),
            Err(err) => {
                let tail = self.pending.split_off(err.valid_up_to());
                let head = std::mem::replace(&mut self.pending, tail);
                // `head` is exactly the valid prefix reported above.
                String::from_utf8(head).map_err(|e| LLMError::Decode(e.to_string()))
            }
        }
    }

    /// Fails when the stream stopped in the middle of a character.
    pub fn finish(self) -> Result<()> {
        if self.pending.is_empty() {
            Ok(())
        } else {
            Err(LLMError::Decode(format!(
                "stream ended inside a multi-byte character ({} dangling bytes)",
                self.pending.len()
            )))
        }
    }
}

/// Turn a response body into a stream of accumulated text.
///
/// Each item is the full text received so far; an item is produced only for
/// chunks that completed at least one character.
pub fn snapshots(mut bytes: ByteStream) -> SnapshotStream {
    let stream = async_stream::stream! {
        let mut decoder = Utf8StreamDecoder::new();
        let mut accumulated = String::new();

        while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    yield Err(err);
                    return;
                }
            };
            match decoder.push(&chunk) {
                Ok(text) if !text.is_empty() => {
                    accumulated.push_str(&text);
                    yield Ok(accumulated.clone());
                }
                Ok(_) => {}
                Err(err) => {
                    yield Err(err);
                    return;
                }
            }
        }

        if let Err(err) = decoder.finish() {
            yield Err(err);
        }
    };
    Box::pin(stream)
}

/// Drain `bytes`, calling `on_update` with the full accumulated text after
/// every chunk that added text. Returns the final text.
pub async fn ingest<F>(bytes: ByteStream, mut on_update: F) -> Result<String>
where
    F: FnMut(&str),
{
    let mut stream = snapshots(bytes);
    let mut latest = String::new();
    let mut updates = 0usize;

    while let Some(snapshot) = stream.next().await {
        latest = snapshot?;
        updates += 1;
        on_update(&latest);
    }

    log::debug!("stream complete: {} updates, {} bytes", updates, latest.len());
    Ok(latest)
}
