//! The quadratic-solver pipeline demonstration.
//!
//! A stream of random quadratic equations is partitioned across the
//! worker pool by square coefficient: `3x^2 + 5x + 7` goes to the "3"
//! worker. Coefficients are drawn from 1..=9, so the default pool of
//! ten workers covers every possible key; a smaller pool fails fast
//! before anything is published.

use anyhow::Result;
use fibra_pipelines::FanOutPipeline;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;

/// A quadratic equation `ax^2 + bx + c = 0`, immutable in flight.
#[derive(Clone, Copy, Debug)]
struct Quadratic {
    a: i64,
    b: i64,
    c: i64,
}

/// The two roots of a quadratic, possibly complex conjugates.
#[derive(Clone, Copy, Debug)]
struct Roots {
    one: f64,
    two: f64,
    imaginary: bool,
}

/// An equation together with its computed roots, as published by the
/// workers onto the shared output channel.
#[derive(Clone, Copy, Debug)]
struct SolvedQuadratic {
    equation: Quadratic,
    roots: Roots,
}

impl fmt::Display for SolvedQuadratic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = if self.roots.imaginary { "i" } else { "" };
        write!(
            f,
            "The quadratic {} * x^2 + {} * x + {} has zeroes at {}{} and {}{}.",
            self.equation.a,
            self.equation.b,
            self.equation.c,
            self.roots.one,
            suffix,
            self.roots.two,
            suffix
        )
    }
}

/// The quadratic formula; a pure function, free of shared state.
fn solve(equation: Quadratic) -> SolvedQuadratic {
    let a = equation.a as f64;
    let b = equation.b as f64;
    let c = equation.c as f64;

    let mut discriminant = b * b - 4.0 * a * c;
    let imaginary = discriminant < 0.0;
    if imaginary {
        discriminant = -discriminant;
    }
    let root = discriminant.sqrt();

    SolvedQuadratic {
        equation,
        roots: Roots {
            one: (-b + root) / (2.0 * a),
            two: (-b - root) / (2.0 * a),
            imaginary,
        },
    }
}

/// Generate the finite supply of pseudo-random equations up front.
fn generate(count: usize, seed: u64) -> Vec<Quadratic> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| Quadratic {
            // No zero square coefficient, or it is not a quadratic.
            a: rng.gen_range(1..=9),
            b: -rng.gen_range(0..100),
            c: rng.gen_range(0..10),
        })
        .collect()
}

pub fn run(count: usize, workers: usize, seed: Option<u64>) -> Result<()> {
    let seed = seed.unwrap_or_else(rand::random);
    debug!("generating {} quadratics with seed {}", count, seed);

    let equations = generate(count, seed);
    let pipeline = FanOutPipeline::new(workers, solve)?;
    pipeline.run(
        equations,
        |equation| equation.a as usize,
        |index, solved| println!("{}) {}", index, solved),
    )?;

    println!("Demonstration complete.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_real_roots() {
        // x^2 - 3x + 2 = (x - 1)(x - 2)
        let solved = solve(Quadratic { a: 1, b: -3, c: 2 });
        assert!(!solved.roots.imaginary);
        assert_eq!(solved.roots.one, 2.0);
        assert_eq!(solved.roots.two, 1.0);
    }

    #[test]
    fn test_complex_roots_are_flagged() {
        // x^2 + 4 = 0 has roots +-2i
        let solved = solve(Quadratic { a: 1, b: 0, c: 4 });
        assert!(solved.roots.imaginary);
        let rendered = format!("{}", solved);
        assert!(rendered.contains("2i"), "unexpected rendering: {}", rendered);
    }

    #[test]
    fn test_generation_is_deterministic_per_seed() {
        let first = generate(10, 42);
        let second = generate(10, 42);
        for (lhs, rhs) in first.iter().zip(&second) {
            assert_eq!((lhs.a, lhs.b, lhs.c), (rhs.a, rhs.b, rhs.c));
        }
        assert!(first.iter().all(|q| (1..=9).contains(&q.a)));
        assert!(first.iter().all(|q| q.b <= 0));
    }
}
