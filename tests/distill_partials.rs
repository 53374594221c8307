//! Distillation semantics: label partitioning, gap nulls, and overlap
//! energy promotion.

use filament::model::{Breakpoint, Partial, PartialList};
use filament::ops::Distiller;

fn float_equal(x: f64, y: f64) -> bool {
    const EPSILON: f64 = 1e-7;
    if x.abs() > EPSILON * EPSILON {
        ((x - y) / x).abs() < EPSILON
    } else {
        (x - y).abs() < EPSILON
    }
}

fn assert_same(a: f64, b: f64, what: &str) {
    assert!(float_equal(a, b), "{what}: {a} != {b}");
}

fn wrap_cycles(x: f64) -> f64 {
    use std::f64::consts::TAU;
    x.rem_euclid(TAU)
}

fn assert_partials_match(got: &Partial, expected: &Partial) {
    assert_eq!(got.len(), expected.len(), "breakpoint counts differ");
    assert_eq!(got.label(), expected.label());
    for ((t_got, bp_got), (t_exp, bp_exp)) in got.iter().zip(expected.iter()) {
        assert_same(t_got, t_exp, "time");
        assert_same(bp_got.frequency, bp_exp.frequency, "frequency");
        assert_same(bp_got.amplitude, bp_exp.amplitude, "amplitude");
        assert_same(bp_got.bandwidth, bp_exp.bandwidth, "bandwidth");
        assert_same(
            wrap_cycles(bp_got.phase),
            wrap_cycles(bp_exp.phase),
            "phase",
        );
    }
}

fn partial(label: i32, points: &[(f64, f64, f64, f64, f64)]) -> Partial {
    let mut p = Partial::with_label(label);
    for &(t, f, a, bw, ph) in points {
        p.insert(t, Breakpoint::new(f, a, bw, ph)).unwrap();
    }
    p
}

fn null_from(source: &Partial, t: f64) -> (f64, Breakpoint) {
    let bp = source.parameters_at(t).unwrap();
    (t, Breakpoint::new(bp.frequency, 0.0, 0.0, bp.phase))
}

#[test]
fn different_labels_are_never_combined() {
    let p1 = partial(1, &[(0.1, 100.0, 0.1, 0.0, 0.0), (1.1, 110.0, 0.2, 0.2, 0.1)]);
    let p2 = partial(2, &[(0.2, 200.0, 0.1, 0.0, 0.0), (1.2, 210.0, 0.2, 0.2, 0.1)]);
    let p3 = partial(3, &[(0.3, 300.0, 0.1, 0.0, 0.0), (1.3, 310.0, 0.2, 0.2, 0.1)]);

    let mut list: PartialList = vec![p1.clone(), p3.clone(), p2.clone()];
    Distiller::new(0.001).unwrap().distill(&mut list);

    assert_eq!(list.len(), 3);
    assert_partials_match(&list[0], &p1);
    assert_partials_match(&list[1], &p2);
    assert_partials_match(&list[2], &p3);
}

#[test]
fn non_overlapping_same_label_partials_join_with_nulls() {
    let p1 = partial(123, &[(0.0, 100.0, 0.1, 0.0, 0.0), (0.1, 110.0, 0.2, 0.2, 0.1)]);
    let p2 = partial(123, &[(0.2, 200.0, 0.1, 0.0, 0.0), (0.3, 210.0, 0.2, 0.2, 0.1)]);
    let p3 = partial(123, &[(0.4, 300.0, 0.1, 0.0, 0.0), (0.5, 310.0, 0.2, 0.2, 0.1)]);
    let p4 = partial(4, &[(0.0, 400.0, 0.1, 0.0, 0.0), (0.5, 410.0, 0.2, 0.2, 0.1)]);

    let mut list: PartialList = vec![p1.clone(), p3.clone(), p4.clone(), p2.clone()];
    let fade = 0.01;
    Distiller::new(fade).unwrap().distill(&mut list);

    // The six original breakpoints survive, interleaved with four nulls
    // one fade time inside each gap.
    let mut compare = Partial::with_label(123);
    compare.insert(0.0, Breakpoint::new(100.0, 0.1, 0.0, 0.0)).unwrap();
    compare.insert(0.1, Breakpoint::new(110.0, 0.2, 0.2, 0.1)).unwrap();
    let (t, bp) = null_from(&p1, 0.1 + fade);
    compare.insert(t, bp).unwrap();
    let (t, bp) = null_from(&p2, 0.2 - fade);
    compare.insert(t, bp).unwrap();
    compare.insert(0.2, Breakpoint::new(200.0, 0.1, 0.0, 0.0)).unwrap();
    compare.insert(0.3, Breakpoint::new(210.0, 0.2, 0.2, 0.1)).unwrap();
    let (t, bp) = null_from(&p2, 0.3 + fade);
    compare.insert(t, bp).unwrap();
    let (t, bp) = null_from(&p3, 0.4 - fade);
    compare.insert(t, bp).unwrap();
    compare.insert(0.4, Breakpoint::new(300.0, 0.1, 0.0, 0.0)).unwrap();
    compare.insert(0.5, Breakpoint::new(310.0, 0.2, 0.2, 0.1)).unwrap();

    assert_eq!(list.len(), 2);
    assert_partials_match(&list[0], &p4);
    assert_partials_match(&list[1], &compare);
}

#[test]
fn two_overlapping_partials_promote_energy_to_noise() {
    let p1 = partial(12, &[(0.0, 100.0, 0.4, 0.0, 0.0), (0.3, 100.0, 0.4, 0.0, 0.1)]);
    let p2 = partial(12, &[(0.2, 200.0, 0.3, 0.0, 0.0), (0.35, 210.0, 0.3, 0.2, 0.1)]);

    let mut list: PartialList = vec![p1.clone(), p2.clone()];
    let fade = 0.01;
    Distiller::new(fade).unwrap().distill(&mut list);

    let mut compare = Partial::with_label(12);
    compare.insert(0.0, Breakpoint::new(100.0, 0.4, 0.0, 0.0)).unwrap();
    let (t, bp) = null_from(&p1, 0.0 + fade);
    compare.insert(t, bp).unwrap();
    let (t, bp) = null_from(&p2, 0.2 - fade);
    compare.insert(t, bp).unwrap();
    // At 0.2 the displaced 0.4-amplitude energy joins as noise:
    // amp = sqrt(0.3^2 + 0.4^2) = 0.5, bw = 0.16 / 0.25 = 0.64.
    compare.insert(0.2, Breakpoint::new(200.0, 0.5, 0.64, 0.0)).unwrap();
    compare.insert(0.35, Breakpoint::new(210.0, 0.3, 0.2, 0.1)).unwrap();

    assert_eq!(list.len(), 1);
    assert_partials_match(&list[0], &compare);
}

#[test]
fn three_overlapping_partials_chain_their_promotions() {
    let p1 = partial(123, &[(0.0, 100.0, 0.4, 0.0, 0.0), (0.28, 100.0, 0.4, 0.0, 0.1)]);
    let p2 = partial(
        123,
        &[
            (0.2, 200.0, 0.3, 0.2, 0.0),
            (0.29, 200.0, 0.3, 0.2, 0.1),
            (0.35, 200.0, 0.3, 0.2, 0.1),
        ],
    );
    let p3 = partial(
        123,
        &[
            (0.32, 300.0, 0.3, 0.0, 0.0),
            (0.4, 310.0, 0.3, 0.2, 0.1),
            (0.7, 310.0, 0.3, 0.2, 0.1),
        ],
    );

    let mut list: PartialList = vec![p3.clone(), p1.clone(), p2.clone()];
    let fade = 0.008;
    Distiller::new(fade).unwrap().distill(&mut list);

    let mut compare = Partial::with_label(123);
    compare.insert(0.0, Breakpoint::new(100.0, 0.4, 0.0, 0.0)).unwrap();
    let (t, bp) = null_from(&p1, 0.0 + fade);
    compare.insert(t, bp).unwrap();
    let (t, bp) = null_from(&p2, 0.2 - fade);
    compare.insert(t, bp).unwrap();
    // (0.4^2 + 0.2 * 0.3^2) / (0.3^2 + 0.4^2) = 0.712
    compare.insert(0.2, Breakpoint::new(200.0, 0.5, 0.712, 0.0)).unwrap();
    compare.insert(0.29, Breakpoint::new(200.0, 0.3, 0.2, 0.1)).unwrap();
    // Interpolating the fused partial between 0.29 and 0.35 reproduces
    // p2's own envelope there.
    let (t, bp) = null_from(&p2, 0.29 + fade);
    compare.insert(t, bp).unwrap();
    let (t, bp) = null_from(&p3, 0.32 - fade);
    compare.insert(t, bp).unwrap();
    // p2 still carries 0.3 amplitude at 0.32.
    compare
        .insert(0.32, Breakpoint::new(300.0, 0.18f64.sqrt(), 0.5, 0.0))
        .unwrap();
    compare.insert(0.4, Breakpoint::new(310.0, 0.3, 0.2, 0.1)).unwrap();
    compare.insert(0.7, Breakpoint::new(310.0, 0.3, 0.2, 0.1)).unwrap();

    assert_eq!(list.len(), 1);
    assert_partials_match(&list[0], &compare);
}
