//! End-to-end store/synchronizer scenarios over the software backend.

use patchbay_backend::SoftwareBackend;
use patchbay_engine::{ParamMap, ParamValue, PatchError, PatchStore};

fn store() -> PatchStore<SoftwareBackend> {
    PatchStore::new(SoftwareBackend::new(48000.0))
}

/// Store node-id set and synchronizer live-unit-id set must always agree.
fn assert_ids_in_sync(store: &PatchStore<SoftwareBackend>) {
    let mut graph: Vec<&str> = store.nodes().iter().map(|n| n.id.as_str()).collect();
    let mut live = store.synchronizer().unit_ids();
    graph.sort_unstable();
    live.sort_unstable();
    assert_eq!(graph, live, "graph and live unit ids diverged");
}

fn render_energy(store: &mut PatchStore<SoftwareBackend>, frames: usize) -> f32 {
    let mut left = vec![0.0; frames];
    let mut right = vec![0.0; frames];
    store.backend_mut().render(&mut left, &mut right);
    left.iter().chain(right.iter()).map(|s| s * s).sum()
}

fn params(entries: &[(&str, ParamValue)]) -> ParamMap {
    entries
        .iter()
        .map(|(k, v)| ((*k).to_owned(), v.clone()))
        .collect()
}

#[test]
fn unknown_kind_is_rejected() {
    let mut store = store();
    let err = store.create_node("reverb").unwrap_err();
    assert_eq!(err, PatchError::UnknownKind("reverb".into()));
    assert!(store.nodes().is_empty());
    assert_eq!(store.history_len(), 1);
}

#[test]
fn every_kind_stays_in_sync() {
    let mut store = store();
    for kind in [
        "osc", "amp", "noise", "flanger", "chorus", "phaser", "waveform", "out",
    ] {
        store.create_node(kind).unwrap();
        assert_ids_in_sync(&store);
    }
    assert_eq!(store.nodes().len(), 8);

    // Delete half, still in sync.
    store.delete_nodes(&["n2", "n4", "n6"]);
    assert_ids_in_sync(&store);
    assert_eq!(store.nodes().len(), 5);
}

#[test]
fn create_merges_kind_defaults() {
    let mut store = store();
    let id = store.create_node("osc").unwrap();
    let node = store.node(&id).unwrap();
    assert_eq!(node.params["frequency"].as_number(), Some(440.0));
    assert_eq!(node.params["type"].as_choice(), Some("sine"));
}

#[test]
fn undo_redo_restore_deep_snapshots() {
    let mut store = store();
    store.create_node("osc").unwrap();
    let before = (store.nodes().to_vec(), store.edges().to_vec());

    store.create_node("amp").unwrap();
    let after = (store.nodes().to_vec(), store.edges().to_vec());

    assert!(store.undo());
    assert_eq!((store.nodes().to_vec(), store.edges().to_vec()), before);
    assert_ids_in_sync(&store);

    assert!(store.redo());
    assert_eq!((store.nodes().to_vec(), store.edges().to_vec()), after);
    assert_ids_in_sync(&store);

    // Walk all the way back to the seeded empty state.
    assert!(store.undo());
    assert!(store.undo());
    assert!(store.nodes().is_empty());
    assert!(!store.undo());
}

#[test]
fn mutation_after_undo_discards_redo_branch() {
    let mut store = store();
    store.create_node("osc").unwrap();
    store.create_node("amp").unwrap();
    store.undo();

    store.create_node("noise").unwrap();
    assert!(!store.can_redo());
    assert!(!store.redo());
}

#[test]
fn node_ids_are_never_reused_across_undo() {
    let mut store = store();
    let first = store.create_node("osc").unwrap();
    store.undo();
    let second = store.create_node("osc").unwrap();
    assert_ne!(first, second);
}

#[test]
fn deleting_a_node_removes_its_edges() {
    let mut store = store();
    let osc = store.create_node("osc").unwrap();
    let amp = store.create_node("amp").unwrap();
    let out = store.create_node("out").unwrap();
    store.add_edge(&osc, &amp).unwrap();
    store.add_edge(&amp, &out).unwrap();
    store.add_edge(&osc, &out).unwrap();

    store.delete_nodes(&[&amp]);
    assert_eq!(store.edges().len(), 1);
    assert_eq!(store.edges()[0].source, osc);
    assert_eq!(store.edges()[0].target, out);
    assert_ids_in_sync(&store);
}

#[test]
fn param_update_touches_only_the_given_key() {
    let mut store = store();
    let a = store.create_node("amp").unwrap();
    let b = store.create_node("amp").unwrap();

    store.update_node_params(&a, params(&[("gain", 0.3.into())]));

    assert_eq!(store.node(&a).unwrap().params["gain"].as_number(), Some(0.3));
    assert_eq!(store.node(&b).unwrap().params["gain"].as_number(), Some(0.5));
}

#[test]
fn update_of_unknown_node_is_silent() {
    let mut store = store();
    store.create_node("amp").unwrap();
    let history = store.history_len();

    store.update_node_params("ghost", params(&[("gain", 0.1.into())]));
    assert_eq!(store.history_len(), history);
}

#[test]
fn osc_to_out_plays_audio() {
    let mut store = store();
    let osc = store.create_node("osc").unwrap();
    let out = store.create_node("out").unwrap();
    store.add_edge(&osc, &out).unwrap();

    assert!(!store.is_running());
    assert!(store.toggle_playback());
    assert!(store.is_running());
    assert_eq!(store.backend().connection_count(), 1);
    assert!(render_energy(&mut store, 4096) > 1.0);

    assert!(!store.toggle_playback());
    assert_eq!(render_energy(&mut store, 4096), 0.0);
}

#[test]
fn edge_to_missing_endpoint_is_refused() {
    let mut store = store();
    let osc = store.create_node("osc").unwrap();
    assert_eq!(store.add_edge(&osc, "ghost"), None);
    assert_eq!(store.add_edge("ghost", &osc), None);
    assert!(store.edges().is_empty());
}

#[test]
fn parallel_edges_are_independent() {
    let mut store = store();
    let osc = store.create_node("osc").unwrap();
    let out = store.create_node("out").unwrap();
    let e1 = store.add_edge(&osc, &out).unwrap();
    let e2 = store.add_edge(&osc, &out).unwrap();
    assert_ne!(e1, e2);
    assert_eq!(store.backend().connection_count(), 2);

    store.delete_edges(&[&e1]);
    assert_eq!(store.edges().len(), 1);
    assert_eq!(store.backend().connection_count(), 1);
}

#[test]
fn phaser_stage_change_rebuilds_exactly_the_chain() {
    let mut store = store();
    let phaser = store.create_node("phaser").unwrap();
    let sync = store.synchronizer();
    assert_eq!(sync.phaser_stage_count(&phaser), Some(6));
    // input->dry, input->f0, dry->out, 5 chain links, last->wet, wet->out,
    // lfo->lfoGain, plus one modulation tap per stage.
    assert_eq!(store.backend().connection_count(), 2 * 6 + 5);
    let primitives = store.backend().primitive_count();

    store.update_node_params(&phaser, params(&[("stages", 4.0.into())]));

    assert_eq!(store.synchronizer().phaser_stage_count(&phaser), Some(4));
    assert_eq!(store.backend().connection_count(), 2 * 4 + 5);
    assert_eq!(store.backend().primitive_count(), primitives - 2);

    // The rebuilt chain still carries audio.
    let out = store.create_node("out").unwrap();
    store.add_edge(&phaser, &out).unwrap();
    let osc = store.create_node("osc").unwrap();
    store.add_edge(&osc, &phaser).unwrap();
    store.toggle_playback();
    assert!(render_energy(&mut store, 8192) > 0.5);
}

#[test]
fn noise_source_follows_graph_out_degree() {
    let mut store = store();
    let noise = store.create_node("noise").unwrap();
    let amp = store.create_node("amp").unwrap();
    let out = store.create_node("out").unwrap();

    assert_eq!(store.synchronizer().noise_active(&noise), Some(false));

    let e1 = store.add_edge(&noise, &amp).unwrap();
    store.add_edge(&noise, &out).unwrap();
    assert_eq!(store.synchronizer().noise_active(&noise), Some(true));

    store.delete_edges(&[&e1]);
    assert_eq!(store.synchronizer().noise_active(&noise), Some(true));

    // Deleting the remaining downstream node drops the last edge too.
    store.delete_nodes(&[&out]);
    assert_eq!(store.synchronizer().noise_active(&noise), Some(false));
    assert_ids_in_sync(&store);
}

#[test]
fn waveform_node_taps_the_signal() {
    let mut store = store();
    let osc = store.create_node("osc").unwrap();
    let tap = store.create_node("waveform").unwrap();
    let out = store.create_node("out").unwrap();
    store.add_edge(&osc, &tap).unwrap();
    store.add_edge(&tap, &out).unwrap();

    store.toggle_playback();
    render_energy(&mut store, 4096);

    let mut window = vec![0.0f32; 512];
    assert!(store.waveform_samples(&tap, &mut window));
    assert!(window.iter().any(|&s| s.abs() > 0.1));

    // Non-waveform nodes have no tap.
    assert!(!store.waveform_samples(&osc, &mut window));
}

#[test]
fn undo_stops_playback() {
    let mut store = store();
    store.create_node("osc").unwrap();
    store.toggle_playback();
    assert!(store.is_running());

    store.undo();
    assert!(!store.is_running());
}

#[test]
fn clear_all_resets_everything() {
    let mut store = store();
    let osc = store.create_node("osc").unwrap();
    let out = store.create_node("out").unwrap();
    store.add_edge(&osc, &out).unwrap();
    store.toggle_playback();

    store.clear_all();
    assert!(store.nodes().is_empty());
    assert!(store.edges().is_empty());
    assert_eq!(store.history_len(), 1);
    assert!(store.synchronizer().unit_ids().is_empty());
    assert!(!store.is_running());
    assert!(!store.undo());
    // Only the permanent destination remains on the audio side.
    assert_eq!(store.backend().primitive_count(), 1);
    assert_eq!(store.backend().connection_count(), 0);
}

#[test]
fn undo_rebuilds_composite_units_and_wiring() {
    let mut store = store();
    let osc = store.create_node("osc").unwrap();
    let flanger = store.create_node("flanger").unwrap();
    let out = store.create_node("out").unwrap();
    store.add_edge(&osc, &flanger).unwrap();
    store.add_edge(&flanger, &out).unwrap();

    let connections = store.backend().connection_count();
    store.delete_nodes(&[&flanger]);
    assert!(store.backend().connection_count() < connections);

    assert!(store.undo());
    assert_ids_in_sync(&store);
    assert_eq!(store.edges().len(), 2);
    // Internal flanger wiring (7) plus the two graph edges.
    assert_eq!(store.backend().connection_count(), connections);

    store.toggle_playback();
    assert!(render_energy(&mut store, 8192) > 0.5);
}
