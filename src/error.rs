//! Error types for the transcode harness
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Everything that can go wrong while opening, streaming, or closing
/// telephony audio. All variants are surfaced to the caller; only the
/// binary decides whether a failure terminates the process.
#[derive(Error, Debug)]
pub enum HarnessError
{
    /// Named file cannot be opened for reading
    #[error("cannot open audio file '{}' for reading: {source}", path.display())]
    OpenRead
    {
        path: PathBuf,
        source: hound::Error,
    },

    /// Named file cannot be created for writing
    #[error("cannot create audio file '{}' for writing: {source}", path.display())]
    OpenWrite
    {
        path: PathBuf,
        source: hound::Error,
    },

    /// Discovered sample rate disagrees with the fixed telephony rate
    #[error("unexpected sample rate {found} Hz in audio file '{}' (expected {expected} Hz)", path.display())]
    SampleRateMismatch
    {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    /// Discovered channel count disagrees with the requested count
    #[error("unexpected number of channels ({found}) in audio file '{}' (expected {expected})", path.display())]
    ChannelMismatch
    {
        path: PathBuf,
        found: u16,
        expected: u16,
    },

    /// Input is not 16-bit linear PCM
    #[error("unsupported sample format in audio file '{}' (expected 16-bit linear PCM)", path.display())]
    UnsupportedFormat
    {
        path: PathBuf,
    },

    /// More concurrently open streams than the registry can track
    #[error("open stream registry is full ({capacity} handles)")]
    RegistryFull
    {
        capacity: usize,
    },

    /// Close reported a failure; the handle stays registered for the exit sweep
    #[error("cannot close audio stream: {0}")]
    Close(#[source] hound::Error),

    /// The handle is not registered (already closed, or never opened here)
    #[error("stream handle is not registered")]
    UnknownHandle,

    /// Read issued against a write stream, or write against a read stream
    #[error("stream was opened for {opened_for}, not for {requested}")]
    DirectionMismatch
    {
        opened_for: &'static str,
        requested: &'static str,
    },

    /// Sample read failed mid-stream
    #[error("error while reading samples: {0}")]
    Read(#[source] hound::Error),

    /// Sample write failed mid-stream
    #[error("error while writing samples: {0}")]
    Write(#[source] hound::Error),

    /// Capture file could not be written or read
    #[error("cannot access capture file '{}': {source}", path.display())]
    CaptureIo
    {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Capture file could not be encoded or decoded
    #[error("malformed capture data: {0}")]
    CaptureCodec(#[source] bincode::Error),
}
