//! Offline rendering command.

use std::path::PathBuf;

use clap::Args;
use patchbay_backend::SoftwareBackend;
use patchbay_engine::PatchStore;

use super::common::build_demo_patch;

const BLOCK: usize = 1024;

#[derive(Args)]
pub struct RenderArgs {
    /// Output WAV file
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Duration in seconds
    #[arg(long, default_value = "2.0")]
    seconds: f32,

    /// Sample rate
    #[arg(long, default_value = "48000")]
    sample_rate: u32,
}

pub fn run(args: RenderArgs) -> anyhow::Result<()> {
    let mut store = PatchStore::new(SoftwareBackend::new(args.sample_rate as f32));
    build_demo_patch(&mut store)?;
    store.toggle_playback();

    println!(
        "Rendering demo patch: {:.2}s at {} Hz",
        args.seconds, args.sample_rate
    );

    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: args.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&args.output, spec)?;

    let frames = (args.seconds * args.sample_rate as f32) as usize;
    let mut left = [0.0f32; BLOCK];
    let mut right = [0.0f32; BLOCK];
    let mut remaining = frames;

    while remaining > 0 {
        let n = remaining.min(BLOCK);
        store.backend_mut().render(&mut left[..n], &mut right[..n]);
        for i in 0..n {
            writer.write_sample((left[i].clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16)?;
            writer.write_sample((right[i].clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16)?;
        }
        remaining -= n;
    }

    writer.finalize()?;
    println!("Wrote {} frames to {}", frames, args.output.display());

    Ok(())
}
