//! Live playback command.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use patchbay_backend::SoftwareBackend;
use patchbay_engine::PatchStore;

use super::common::build_demo_patch;

#[derive(Args)]
pub struct PlayArgs {
    /// Playback duration in seconds
    #[arg(long, default_value = "5.0")]
    seconds: f32,
}

pub fn run(args: PlayArgs) -> anyhow::Result<()> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .context("no default output device")?;
    let config = device.default_output_config()?;
    let sample_rate = config.sample_rate() as f32;
    let channels = config.channels() as usize;

    let mut store = PatchStore::new(SoftwareBackend::new(sample_rate));
    build_demo_patch(&mut store)?;
    store.toggle_playback();

    let store = Arc::new(Mutex::new(store));
    let callback_store = Arc::clone(&store);
    let mut left: Vec<f32> = Vec::new();
    let mut right: Vec<f32> = Vec::new();

    let stream = device.build_output_stream(
        &config.into(),
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            let frames = data.len() / channels;
            left.resize(frames, 0.0);
            right.resize(frames, 0.0);

            let Ok(mut store) = callback_store.lock() else {
                data.fill(0.0);
                return;
            };
            store.backend_mut().render(&mut left, &mut right);
            drop(store);

            for (i, frame) in data.chunks_mut(channels).enumerate() {
                frame[0] = left[i];
                if let Some(r) = frame.get_mut(1) {
                    *r = right[i];
                }
                for extra in frame.iter_mut().skip(2) {
                    *extra = 0.0;
                }
            }
        },
        |err| eprintln!("Output stream error: {err}"),
        None,
    )?;

    stream.play()?;
    println!(
        "Playing demo patch for {:.1}s at {} Hz...",
        args.seconds, sample_rate as u32
    );
    std::thread::sleep(Duration::from_secs_f32(args.seconds));
    drop(stream);

    let mut store = store
        .lock()
        .map_err(|_| anyhow::anyhow!("audio callback panicked"))?;
    if store.is_running() {
        store.toggle_playback();
    }

    Ok(())
}
