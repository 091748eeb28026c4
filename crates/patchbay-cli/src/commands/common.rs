//! Shared helpers for CLI commands.

use anyhow::Context;
use patchbay_backend::SoftwareBackend;
use patchbay_engine::{ParamMap, ParamValue, PatchStore};

/// Builds the demo patch: a 220 Hz square oscillator and a quiet pink-noise
/// bed, both through one amp into the output.
pub fn build_demo_patch(store: &mut PatchStore<SoftwareBackend>) -> anyhow::Result<()> {
    let osc = store.create_node("osc")?;
    let noise = store.create_node("noise")?;
    let amp = store.create_node("amp")?;
    let out = store.create_node("out")?;

    store.update_node_params(&osc, tweak(&[("frequency", 220.0.into()), ("type", "square".into())]));
    store.update_node_params(&noise, tweak(&[("type", "pink".into()), ("gain", 0.15.into())]));
    store.update_node_params(&amp, tweak(&[("gain", 0.4.into())]));

    store.add_edge(&osc, &amp).context("osc -> amp edge refused")?;
    store.add_edge(&noise, &amp).context("noise -> amp edge refused")?;
    store.add_edge(&amp, &out).context("amp -> out edge refused")?;

    Ok(())
}

fn tweak(entries: &[(&str, ParamValue)]) -> ParamMap {
    entries
        .iter()
        .map(|(key, value)| ((*key).to_owned(), value.clone()))
        .collect()
}
