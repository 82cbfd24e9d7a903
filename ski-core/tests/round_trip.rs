//! Printing a parsed program and parsing it again gives back the same tree.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use ski_core::{is_program_char, parse_string, Expression, Primitive};

const LETTERS: [Primitive; 10] = [
    Primitive::S,
    Primitive::K,
    Primitive::I,
    Primitive::V,
    Primitive::C,
    Primitive::D,
    Primitive::E,
    Primitive::R,
    Primitive::Read,
    Primitive::Pipe,
];

fn random_char<R: Rng>(rng: &mut R) -> char {
    let c = if rng.gen_bool(0.1) { '\n' } else { rng.gen_range(' '..='~') };

    assert!(is_program_char(c));
    c
}

fn random_primitive<R: Rng>(rng: &mut R) -> Primitive {
    match rng.gen_range(0..6) {
        0 => Primitive::Print(random_char(rng)),
        1 => Primitive::Compare(random_char(rng)),
        _ => LETTERS[rng.gen_range(0..LETTERS.len())],
    }
}

fn random_expression<R: Rng>(rng: &mut R, depth: u32) -> Expression {
    if depth == 0 || rng.gen_bool(0.3) {
        Expression::Primitive(random_primitive(rng))
    } else {
        let lhs = random_expression(rng, depth - 1);
        let rhs = random_expression(rng, depth - 1);

        Expression::application(lhs, rhs)
    }
}

/// Writes the expression out the long way: random letter case, whitespace and comments
/// between tokens
fn noisy_source<R: Rng>(expression: &Expression, rng: &mut R, out: &mut String) {
    match rng.gen_range(0..4) {
        0 => out.push(' '),
        1 => out.push_str("\n\t"),
        2 => out.push_str("# a comment with ` and .x in it\n"),
        _ => {},
    }

    match expression {
        Expression::Primitive(primitive) => {
            let text = primitive.to_string();

            if rng.gen_bool(0.5) && text.len() == 1 {
                out.push_str(&text.to_ascii_uppercase());
            } else {
                out.push_str(&text);
            }
        },
        Expression::Application(lhs, rhs) => {
            out.push('`');
            noisy_source(lhs, rng, out);
            noisy_source(rhs, rng, out);
        },
    }
}

#[test]
fn test_print_then_parse_is_identity() {
    let mut rng = StdRng::seed_from_u64(0);

    for _ in 0..500 {
        let expression = random_expression(&mut rng, 8);
        let printed = expression.to_string();
        let reparsed = parse_string(&printed).unwrap();

        assert_eq!(expression, reparsed, "source was {printed:?}");
        assert_eq!(printed, reparsed.to_string());
    }
}

#[test]
fn test_noise_does_not_change_the_tree() {
    let mut rng = StdRng::seed_from_u64(1);

    for _ in 0..500 {
        let expression = random_expression(&mut rng, 6);
        let mut source = String::new();

        noisy_source(&expression, &mut rng, &mut source);

        let parsed = parse_string(&source).unwrap();

        assert_eq!(expression, parsed, "source was {source:?}");
    }
}

#[test]
fn test_truncated_programs_fail() {
    let mut rng = StdRng::seed_from_u64(2);

    for _ in 0..200 {
        let expression = random_expression(&mut rng, 6);
        let printed = expression.to_string();

        if let Expression::Application(..) = expression {
            let cut = rng.gen_range(1..printed.len());

            // cutting inside a `.x` payload leaves a valid prefix that is still incomplete
            if let Some(prefix) = printed.get(..cut) {
                assert!(parse_string(prefix).is_err(), "prefix {prefix:?} parsed");
            }
        }
    }
}
