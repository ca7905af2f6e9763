use tempfile::TempDir;

use g726_roundtrip::error::HarnessError;
use g726_roundtrip::registry::HandleRegistry;
use g726_roundtrip::telephony::{
    SAMPLE_RATE, close_telephony, open_telephony_read, open_telephony_write,
};

/// Write a WAV with an arbitrary spec, for poking at the protocol checks
fn write_wav(path: &std::path::Path, sample_rate: u32, channels: u16, bits: u16, samples: &[i16])
{
    let spec = hound::WavSpec
    {
        channels,
        sample_rate,
        bits_per_sample: bits,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("create test WAV");
    for &sample in samples
    {
        if bits == 16
        {
            writer.write_sample(sample).expect("write sample");
        }
        else
        {
            writer.write_sample(i32::from(sample)).expect("write sample");
        }
    }
    writer.finalize().expect("finalize test WAV");
}

#[test]
fn test_write_then_read_roundtrip()
{
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("roundtrip.wav");
    let payload: Vec<i16> = (0..500).map(|i| (i * 37 % 4001 - 2000) as i16).collect();

    let mut registry = HandleRegistry::new();

    let output = open_telephony_write(&mut registry, &path, 1).expect("open for writing");
    registry.stream_mut(output).expect("stream").write_frames(&payload).expect("write");
    close_telephony(&mut registry, output).expect("close writer");

    let input = open_telephony_read(&mut registry, &path, 1).expect("open for reading");
    let mut buf = vec![0i16; 1000];
    let read = registry.stream_mut(input).expect("stream").read_frames(&mut buf).expect("read");
    close_telephony(&mut registry, input).expect("close reader");

    assert_eq!(read, payload.len());
    assert_eq!(&buf[..read], &payload[..]);
    assert!(registry.is_empty(), "both handles must be deregistered after close");
}

#[test]
fn test_read_reports_stream_info()
{
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("info.wav");
    write_wav(&path, SAMPLE_RATE, 1, 16, &[0; 10]);

    let mut registry = HandleRegistry::new();
    let input = open_telephony_read(&mut registry, &path, 1).expect("open for reading");

    let info = *registry.stream_mut(input).expect("stream").info();
    assert_eq!(info.sample_rate, SAMPLE_RATE);
    assert_eq!(info.channels, 1);

    close_telephony(&mut registry, input).expect("close");
}

#[test]
fn test_sample_rate_mismatch_is_a_distinct_failure()
{
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("cd_rate.wav");
    write_wav(&path, 44100, 1, 16, &[0; 10]);

    let mut registry = HandleRegistry::new();
    let err = open_telephony_read(&mut registry, &path, 1)
        .expect_err("a 44.1 kHz file must be rejected");

    match err
    {
        HarnessError::SampleRateMismatch { found, expected, .. } =>
        {
            assert_eq!(found, 44100);
            assert_eq!(expected, SAMPLE_RATE);
        }
        other => panic!("expected SampleRateMismatch, got {:?}", other),
    }
    assert!(registry.is_empty(), "a rejected stream must not be registered");
}

#[test]
fn test_channel_mismatch_is_a_distinct_failure()
{
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("stereo.wav");
    write_wav(&path, SAMPLE_RATE, 2, 16, &[0; 20]);

    let mut registry = HandleRegistry::new();
    let err = open_telephony_read(&mut registry, &path, 1)
        .expect_err("a stereo file must be rejected when mono was requested");

    assert!(
        matches!(err, HarnessError::ChannelMismatch { found: 2, expected: 1, .. }),
        "expected ChannelMismatch, got {:?}",
        err
    );
}

#[test]
fn test_non_16_bit_input_is_rejected()
{
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("deep.wav");
    write_wav(&path, SAMPLE_RATE, 1, 24, &[0; 10]);

    let mut registry = HandleRegistry::new();
    let err = open_telephony_read(&mut registry, &path, 1)
        .expect_err("a 24-bit file must be rejected");

    assert!(matches!(err, HarnessError::UnsupportedFormat { .. }), "got {:?}", err);
}

#[test]
fn test_missing_file_is_an_open_failure()
{
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("does_not_exist.wav");

    let mut registry = HandleRegistry::new();
    let err = open_telephony_read(&mut registry, &path, 1).expect_err("missing file");

    assert!(matches!(err, HarnessError::OpenRead { .. }), "got {:?}", err);
}

#[test]
fn test_closing_twice_reports_unknown_handle()
{
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("twice.wav");

    let mut registry = HandleRegistry::new();
    let output = open_telephony_write(&mut registry, &path, 1).expect("open for writing");

    close_telephony(&mut registry, output).expect("first close");
    let err = close_telephony(&mut registry, output).expect_err("second close");

    assert!(matches!(err, HarnessError::UnknownHandle), "got {:?}", err);
}

#[test]
fn test_direction_mismatch_on_misused_streams()
{
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("direction.wav");
    write_wav(&path, SAMPLE_RATE, 1, 16, &[0; 10]);

    let mut registry = HandleRegistry::new();

    let input = open_telephony_read(&mut registry, &path, 1).expect("open for reading");
    let err = registry
        .stream_mut(input)
        .expect("stream")
        .write_frames(&[1, 2, 3])
        .expect_err("writing to a read stream");
    assert!(matches!(err, HarnessError::DirectionMismatch { .. }), "got {:?}", err);

    let output = open_telephony_write(&mut registry, &dir.path().join("out.wav"), 1).expect("open");
    let mut buf = [0i16; 4];
    let err = registry
        .stream_mut(output)
        .expect("stream")
        .read_frames(&mut buf)
        .expect_err("reading from a write stream");
    assert!(matches!(err, HarnessError::DirectionMismatch { .. }), "got {:?}", err);

    close_telephony(&mut registry, input).expect("close input");
    close_telephony(&mut registry, output).expect("close output");
}

#[test]
fn test_short_read_then_end_of_stream()
{
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("short.wav");
    write_wav(&path, SAMPLE_RATE, 1, 16, &[7; 100]);

    let mut registry = HandleRegistry::new();
    let input = open_telephony_read(&mut registry, &path, 1).expect("open for reading");

    let mut buf = vec![0i16; 160];
    let stream = registry.stream_mut(input).expect("stream");

    // 100 samples against a 160-sample buffer: one valid short read,
    // then a zero-length read marking the end
    assert_eq!(stream.read_frames(&mut buf).expect("first read"), 100);
    assert_eq!(stream.read_frames(&mut buf).expect("second read"), 0);

    close_telephony(&mut registry, input).expect("close");
}
