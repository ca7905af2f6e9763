use std::env;
use std::path::PathBuf;
use std::process;

use anyhow::{Result, anyhow};

use g726_roundtrip::capture::{CaptureHeader, EncodedCapture, save_capture};
use g726_roundtrip::codec::{Bitrate, Decoder, Encoder, Packing};
use g726_roundtrip::pipeline::{BLOCK_LEN, PipelineContext, run_transcode};
use g726_roundtrip::registry::HandleRegistry;
use g726_roundtrip::telephony::{SAMPLE_RATE, open_telephony_read, open_telephony_write};

const IN_FILE_NAME: &str = "short_nb_voice.wav";
const OUT_FILE_NAME: &str = "post_g726.wav";
const DEFAULT_BIT_RATE: u32 = 16000;

struct Options
{
    input: PathBuf,
    output: PathBuf,
    bit_rate: Bitrate,
    capture: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> Result<Options>
{
    if args.len() > 4
    {
        return Err(anyhow!(
            "usage: g726rt [input.wav] [output.wav] [bit_rate_bps] [capture_path]"
        ));
    }

    let input = PathBuf::from(args.first().map(String::as_str).unwrap_or(IN_FILE_NAME));
    let output = PathBuf::from(args.get(1).map(String::as_str).unwrap_or(OUT_FILE_NAME));

    let bps = match args.get(2)
    {
        Some(raw) => raw
            .parse::<u32>()
            .map_err(|_| anyhow!("bit rate must be a number, got '{}'", raw))?,
        None => DEFAULT_BIT_RATE,
    };
    let bit_rate = Bitrate::from_bps(bps)
        .ok_or_else(|| anyhow!("unsupported bit rate {}bps (16000/24000/32000/40000)", bps))?;

    let capture = args.get(3).map(PathBuf::from);

    Ok(Options { input, output, bit_rate, capture })
}

fn run(options: &Options) -> Result<()>
{
    let mut registry = HandleRegistry::new();

    let input = open_telephony_read(&mut registry, &options.input, 1)?;
    let output = open_telephony_write(&mut registry, &options.output, 1)?;

    let mut encoder = Encoder::new(options.bit_rate, Packing::None);
    let mut decoder = Decoder::new(options.bit_rate, Packing::None);

    let mut ctx = match options.capture
    {
        Some(_) => PipelineContext::with_capture(EncodedCapture::new(CaptureHeader
        {
            bit_rate_bps: options.bit_rate.bps(),
            sample_rate: SAMPLE_RATE,
            block_len: BLOCK_LEN,
        })),
        None => PipelineContext::new(),
    };

    let report = run_transcode(&mut registry, &mut encoder, &mut decoder, input, output, &mut ctx)?;

    if let (Some(path), Some(capture)) = (options.capture.as_deref(), ctx.capture.as_ref())
    {
        save_capture(capture, path)?;
        println!("Captured {} encoded bytes to '{}'", capture.encoded_bytes(), path.display());
    }

    println!(
        "'{}' transcoded to '{}' at {}bps.",
        options.input.display(),
        options.output.display(),
        options.bit_rate.bps()
    );
    println!("Output SNR: {:.2} dB over {} samples", report.snr_db, report.samples_measured);

    Ok(())
}

fn main()
{
    let _ = tracing_subscriber::fmt::try_init();

    let args: Vec<String> = env::args().skip(1).collect();
    let options = match parse_args(&args)
    {
        Ok(options) => options,
        Err(err) =>
        {
            eprintln!("{}", err);
            process::exit(2);
        }
    };

    if let Err(err) = run(&options)
    {
        eprintln!("{:#}", err);
        process::exit(2);
    }
}
