//! Reference I/O check for the direct-form II transposed filter: three
//! coefficient sets, one pseudo-random 20-sample input, exact expected
//! outputs.

use filament::core::filter::Filter;

const INPUT: [f64; 20] = [
    0.936935655012751,
    0.038788797332850289,
    -3.3905846945159652,
    0.63512194733877647,
    -0.95466701587583913,
    -1.4158189130418939,
    1.172563134238223,
    -0.33188671804999648,
    -2.3810993167665941,
    2.3449771750569814,
    -0.15130209563149374,
    0.21705681062905663,
    1.52058260494527,
    0.51183339499885039,
    -1.0326941787595467,
    0.11269207950479941,
    -1.3981235484992118,
    -0.65981814247037818,
    -1.3639575892248843,
    1.4780184095953759,
];

const Y1: [f64; 20] = [
    0.84324208951147595,
    -1.8108533227755543,
    1.5951524811091939,
    4.7975977507386967,
    -10.694351857545564,
    5.3030467438975357,
    -17.778505791335014,
    8.9754345596335092,
    -32.25708182680183,
    37.726304442600771,
    -75.461502298578026,
    95.090535385478447,
    -151.5894902205132,
    216.54318261258194,
    -327.03502610452892,
    490.04592954826938,
    -727.81116395927131,
    1084.2931847451682,
    -1617.237743011206,
    2401.5428267364841,
];

const Y2: [f64; 20] = [
    0.49077581929239339,
    0.14566760959102207,
    -1.8100850952755096,
    -0.36366526867073734,
    -0.4706851836695024,
    -0.075011441052535655,
    1.0880509268008796,
    0.47353306131082279,
    -1.1213704247988554,
    0.46044085473080498,
    -0.15428157176981891,
    0.36456819005594143,
    0.84216423350531611,
    0.47178017069782047,
    -0.68577114358346958,
    -0.60194523802503608,
    -1.1428952901667246,
    -0.38224994316913324,
    -0.32397484846462088,
    1.3598462795041937,
];

const Y3: [f64; 20] = [
    0.23423391375318775,
    0.57185859234086311,
    -1.3865342882369318,
    -2.1330775220277829,
    2.1670600318106721,
    -0.46018193256025153,
    -0.14233084157477127,
    1.7087243028245309,
    -1.1439900123041067,
    -0.93642404902526888,
    2.880792050698771,
    -0.84822853056417236,
    0.014916701228402385,
    0.947899349247314,
    -0.91768727331500255,
    -1.2786891756151559,
    0.20974251908409214,
    -0.81327036773011452,
    0.073820826434879305,
    0.29655182147094317,
];

const EPS: f64 = 1e-12;

fn check(filter: &mut Filter, expected: &[f64; 20]) {
    for (k, (&x, &y)) in INPUT.iter().zip(expected.iter()).enumerate() {
        let got = filter.apply(x);
        assert!(
            (got - y).abs() < EPS,
            "sample {k}: got {got}, expected {y}"
        );
    }
}

#[test]
fn iir_with_full_numerator_and_denominator() {
    let mut f = Filter::new(&[0.9, -1.7, 3.1, 2.0], &[1.0, 0.3, -1.5, 0.4]).unwrap();
    check(&mut f, &Y1);
}

#[test]
fn iir_with_unnormalized_denominator() {
    // Leading denominator coefficient 2.1 exercises normalization.
    let mut f = Filter::new(&[1.1, -0.4, 0.0, 0.0], &[2.1, -1.3, 0.5, 0.8]).unwrap();
    check(&mut f, &Y2);
}

#[test]
fn pure_fir() {
    let mut f = Filter::new(&[0.25, 0.6, -0.6, -0.25], &[1.0, 0.0, 0.0, 0.0]).unwrap();
    check(&mut f, &Y3);
}

#[test]
fn reset_reproduces_the_sequence() {
    let mut f = Filter::new(&[0.9, -1.7, 3.1, 2.0], &[1.0, 0.3, -1.5, 0.4]).unwrap();
    check(&mut f, &Y1);
    f.reset();
    check(&mut f, &Y1);
}
