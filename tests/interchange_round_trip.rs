//! Export/import identity for the frame interchange representation.

use filament::analysis::Analyzer;
use filament::interchange::{export_frames, import_frames};
use filament::model::{Breakpoint, Partial};
use filament::synth::Synthesizer;
use std::f64::consts::TAU;

#[test]
fn analyzed_partials_survive_a_round_trip_exactly() {
    // Analyze a two-tone signal so the exported list carries real
    // reassigned times and phases.
    let rate = 44_100.0;
    let samples: Vec<f64> = (0..22_050)
        .map(|n| {
            let t = n as f64 / rate;
            0.3 * (TAU * 440.0 * t).cos() + 0.2 * (TAU * 1100.0 * t).cos()
        })
        .collect();
    let mut analyzer = Analyzer::with_window_width(300.0, 400.0).unwrap();
    analyzer.set_amp_floor(-60.0);
    analyzer.analyze(&samples, rate).unwrap();
    let partials = analyzer.take_partials();
    assert!(!partials.is_empty());

    let frames = export_frames(&partials, 0.01).unwrap();
    let back = import_frames(&frames).unwrap();

    assert_eq!(back.len(), partials.len());
    for (a, b) in partials.iter().zip(back.iter()) {
        assert_eq!(a, b, "round trip must be exact");
    }
}

#[test]
fn labels_and_sparse_partials_round_trip() {
    let mut p1 = Partial::with_label(42);
    p1.insert(-0.25, Breakpoint::new(100.0, 0.1, 0.25, -3.5)).unwrap();
    p1.insert(17.03, Breakpoint::new(101.0, 0.1, 0.0, 220.7)).unwrap();
    let mut p2 = Partial::with_label(-3);
    p2.insert(0.004999, Breakpoint::new(5.0, 0.0, 1.0, 0.0)).unwrap();

    let original = vec![p1, p2];
    let frames = export_frames(&original, 1.0).unwrap();
    let back = import_frames(&frames).unwrap();
    assert_eq!(back, original);
}

#[test]
fn round_tripped_partials_synthesize_identically() {
    let mut p = Partial::with_label(1);
    for k in 0..20 {
        let t = 0.01 * k as f64;
        p.insert(
            t,
            Breakpoint::new(440.0 + k as f64, 0.2, 0.1, TAU * 440.0 * t),
        )
        .unwrap();
    }
    let original = vec![p];

    let frames = export_frames(&original, 0.005).unwrap();
    let back = import_frames(&frames).unwrap();

    let synth = Synthesizer::new(44_100.0).unwrap();
    let mut a = Vec::new();
    let mut b = Vec::new();
    synth.synthesize(&original, &mut a).unwrap();
    synth.synthesize(&back, &mut b).unwrap();
    assert_eq!(a, b);
}
