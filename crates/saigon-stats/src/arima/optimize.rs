//! Derivative-free minimization (Nelder-Mead simplex).

/// Stopping rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NelderMeadConfig {
    /// Iteration cap
    pub max_iter: usize,
    /// Tolerance on the spread of simplex values, relative to `1 + |f_best|`
    pub f_tol: f64,
    /// Tolerance on the distance of every vertex from the best one
    pub x_tol: f64,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            max_iter: 2_000,
            f_tol: 1e-10,
            x_tol: 1e-8,
        }
    }
}

/// Best point found.
#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    /// Argument of the minimum
    pub x: Vec<f64>,
    /// Objective value at `x`
    pub value: f64,
    /// Iterations performed
    pub iterations: usize,
    /// Whether the tolerances were met before the iteration cap
    pub converged: bool,
}

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;

fn along(from: &[f64], to: &[f64], t: f64) -> Vec<f64> {
    from.iter().zip(to).map(|(a, b)| a + t * (b - a)).collect()
}

/// Minimize `f` starting from `x0`, with initial simplex edges `steps`.
///
/// Non-finite objective values are treated as `+inf`.
pub fn nelder_mead<F>(f: F, x0: &[f64], steps: &[f64], config: &NelderMeadConfig) -> Minimum
where
    F: Fn(&[f64]) -> f64,
{
    let eval = |x: &[f64]| {
        let v = f(x);
        if v.is_finite() { v } else { f64::INFINITY }
    };

    let n = x0.len();
    if n == 0 {
        return Minimum {
            x: Vec::new(),
            value: eval(x0),
            iterations: 0,
            converged: true,
        };
    }

    let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(n + 1);
    simplex.push((x0.to_vec(), eval(x0)));
    for i in 0..n {
        let mut vertex = x0.to_vec();
        vertex[i] += steps.get(i).copied().unwrap_or(0.1);
        let value = eval(&vertex);
        simplex.push((vertex, value));
    }

    let mut iterations = 0;
    let mut converged = false;

    while iterations < config.max_iter {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));

        let best = simplex[0].1;
        let f_spread = simplex.iter().map(|v| (v.1 - best).abs()).fold(0.0, f64::max);
        let x_spread = simplex
            .iter()
            .skip(1)
            .flat_map(|v| v.0.iter().zip(&simplex[0].0).map(|(a, b)| (a - b).abs()))
            .fold(0.0, f64::max);
        if f_spread <= config.f_tol * (1.0 + best.abs()) && x_spread <= config.x_tol {
            converged = true;
            break;
        }
        iterations += 1;

        let mut centroid = vec![0.0; n];
        for (vertex, _) in &simplex[..n] {
            for (c, v) in centroid.iter_mut().zip(vertex) {
                *c += v / n as f64;
            }
        }

        let worst = simplex[n].clone();
        let second_worst = simplex[n - 1].1;

        let reflected = along(&centroid, &worst.0, -REFLECT);
        let f_reflected = eval(&reflected);

        if f_reflected < best {
            let expanded = along(&centroid, &reflected, EXPAND);
            let f_expanded = eval(&expanded);
            simplex[n] = if f_expanded < f_reflected {
                (expanded, f_expanded)
            } else {
                (reflected, f_reflected)
            };
            continue;
        }

        if f_reflected < second_worst {
            simplex[n] = (reflected, f_reflected);
            continue;
        }

        let (contracted, accept) = if f_reflected < worst.1 {
            let outside = along(&centroid, &reflected, CONTRACT);
            let f_outside = eval(&outside);
            ((outside, f_outside), f_outside <= f_reflected)
        } else {
            let inside = along(&centroid, &worst.0, CONTRACT);
            let f_inside = eval(&inside);
            ((inside, f_inside), f_inside < worst.1)
        };

        if accept {
            simplex[n] = contracted;
            continue;
        }

        let anchor = simplex[0].0.clone();
        for vertex in simplex.iter_mut().skip(1) {
            let shrunk = along(&anchor, &vertex.0, SHRINK);
            let value = eval(&shrunk);
            *vertex = (shrunk, value);
        }
    }

    simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
    let (x, value) = simplex.swap_remove(0);
    Minimum {
        x,
        value,
        iterations,
        converged,
    }
}
