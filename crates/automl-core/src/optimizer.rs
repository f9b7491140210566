//! Nelder-Mead simplex optimizer (C6), used to search a
//! [`crate::pipeline_model::PipelineModel`]'s continuous hyperparameter
//! vector.
//!
//! Checks the supplied [`CancellationToken`] once per iteration boundary;
//! on cancellation it returns immediately with whatever vertex is
//! currently best, not the initial point — matching how an interrupted
//! search still reports its best-so-far candidate rather than nothing.

use automl_data::CancellationToken;

const REFLECTION: f64 = 1.0;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;
const SHRINK: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Converged,
    IterationBudgetExhausted,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct OptimizeResult {
    pub x: Vec<f64>,
    pub fitness: f64,
    pub termination: Termination,
    pub iterations: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct NelderMeadConfig {
    pub initial_scale: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
    /// If `true`, any vertex with a negative coordinate scores `+inf`
    /// rather than being evaluated — used for hyperparameter vectors that
    /// must stay in `[0, 1]`.
    pub negative_not_allowed: bool,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            initial_scale: 1.0,
            max_iterations: 200,
            tolerance: 1e-6,
            negative_not_allowed: true,
        }
    }
}

/// Minimize `objective` starting from `x0`. `n = x0.len()` vertices are
/// added at `x0 + scale * e_i` to form the initial `n + 1`-vertex simplex.
pub fn minimize(
    x0: &[f64],
    config: &NelderMeadConfig,
    cancellation: &CancellationToken,
    mut objective: impl FnMut(&[f64]) -> f64,
) -> OptimizeResult {
    let n = x0.len();
    if n == 0 {
        let fitness = score(x0, config, &mut objective);
        return OptimizeResult {
            x: x0.to_vec(),
            fitness,
            termination: Termination::Converged,
            iterations: 0,
        };
    }

    let mut vertices: Vec<Vec<f64>> = std::iter::once(x0.to_vec())
        .chain((0..n).map(|i| {
            let mut v = x0.to_vec();
            v[i] += config.initial_scale;
            v
        }))
        .collect();
    let mut values: Vec<f64> = vertices.iter().map(|v| score(v, config, &mut objective)).collect();

    let mut iterations = 0;
    let termination = loop {
        if cancellation.is_cancelled() {
            break Termination::Cancelled;
        }
        if iterations >= config.max_iterations {
            break Termination::IterationBudgetExhausted;
        }

        let mut order: Vec<usize> = (0..vertices.len()).collect();
        order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(std::cmp::Ordering::Equal));
        let best = order[0];
        let second_worst = order[order.len() - 2];
        let worst = order[order.len() - 1];

        let f_best = values[best];
        let f_second_worst = values[second_worst];
        let f_worst = values[worst];

        if 3.0 * (f_worst - f_best).abs() / (f_worst.abs() + f_best.abs() + 1e-12) < config.tolerance {
            break Termination::Converged;
        }

        let centroid = mean_excluding(&vertices, worst);

        let reflected = step(&centroid, &vertices[worst], REFLECTION);
        let f_reflected = score(&reflected, config, &mut objective);

        if f_reflected < f_best {
            let expanded = step(&centroid, &vertices[worst], EXPANSION);
            let f_expanded = score(&expanded, config, &mut objective);
            if f_expanded < f_reflected {
                vertices[worst] = expanded;
                values[worst] = f_expanded;
            } else {
                vertices[worst] = reflected;
                values[worst] = f_reflected;
            }
        } else if f_reflected < f_second_worst {
            vertices[worst] = reflected;
            values[worst] = f_reflected;
        } else {
            let contracted = step(&centroid, &vertices[worst], -CONTRACTION);
            let f_contracted = score(&contracted, config, &mut objective);
            if f_contracted < f_worst {
                vertices[worst] = contracted;
                values[worst] = f_contracted;
            } else {
                let best_vertex = vertices[best].clone();
                for (i, vertex) in vertices.iter_mut().enumerate() {
                    if i == best {
                        continue;
                    }
                    for (coord, best_coord) in vertex.iter_mut().zip(best_vertex.iter()) {
                        *coord = *best_coord + SHRINK * (*coord - best_coord);
                    }
                }
                for (i, vertex) in vertices.iter().enumerate() {
                    if i != best {
                        values[i] = score(vertex, config, &mut objective);
                    }
                }
            }
        }

        iterations += 1;
    };

    let best_idx = (0..vertices.len())
        .min_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(std::cmp::Ordering::Equal))
        .unwrap();

    OptimizeResult {
        x: vertices[best_idx].clone(),
        fitness: values[best_idx],
        termination,
        iterations,
    }
}

fn score(x: &[f64], config: &NelderMeadConfig, objective: &mut impl FnMut(&[f64]) -> f64) -> f64 {
    if config.negative_not_allowed && x.iter().any(|&v| v < 0.0) {
        return f64::INFINITY;
    }
    objective(x)
}

fn mean_excluding(vertices: &[Vec<f64>], exclude: usize) -> Vec<f64> {
    let n = vertices[0].len();
    let count = vertices.len() - 1;
    let mut mean = vec![0.0; n];
    for (i, vertex) in vertices.iter().enumerate() {
        if i == exclude {
            continue;
        }
        for (m, v) in mean.iter_mut().zip(vertex.iter()) {
            *m += v / count as f64;
        }
    }
    mean
}

/// `centroid + coefficient * (centroid - worst)`.
fn step(centroid: &[f64], worst: &[f64], coefficient: f64) -> Vec<f64> {
    centroid
        .iter()
        .zip(worst.iter())
        .map(|(c, w)| c + coefficient * (c - w))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimizes_a_simple_quadratic_bowl() {
        let config = NelderMeadConfig {
            negative_not_allowed: false,
            ..Default::default()
        };
        let token = CancellationToken::new();
        let result = minimize(&[5.0, -3.0], &config, &token, |x| {
            (x[0] - 1.0).powi(2) + (x[1] - 2.0).powi(2)
        });
        assert!(result.fitness < 1e-3);
        assert!((result.x[0] - 1.0).abs() < 0.1);
        assert!((result.x[1] - 2.0).abs() < 0.1);
    }

    #[test]
    fn cancellation_stops_immediately_and_returns_current_best() {
        let config = NelderMeadConfig::default();
        let token = CancellationToken::new();
        token.cancel();
        let result = minimize(&[0.5, 0.5], &config, &token, |x| x[0] + x[1]);
        assert_eq!(result.termination, Termination::Cancelled);
        assert_eq!(result.iterations, 0);
    }

    #[test]
    fn negative_coordinates_score_as_infinite_when_disallowed() {
        let config = NelderMeadConfig {
            negative_not_allowed: true,
            max_iterations: 5,
            ..Default::default()
        };
        let token = CancellationToken::new();
        let result = minimize(&[0.1], &config, &token, |x| x[0]);
        assert!(result.x[0] >= 0.0);
    }
}
