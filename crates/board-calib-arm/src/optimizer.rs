//! Fixed-schedule momentum gradient descent.

use log::{debug, log_enabled, Level};
use nalgebra::SVector;
use serde::{Deserialize, Serialize};

/// Differentiable scalar function of `N` parameters.
pub trait Objective<const N: usize> {
    fn value(&self, x: &SVector<f64, N>) -> f64;
    fn gradient(&self, x: &SVector<f64, N>) -> SVector<f64, N>;
}

/// Wraps a plain closure, differentiating it with central differences.
#[derive(Clone, Copy, Debug)]
pub struct FiniteDifference<F> {
    f: F,
    step: f64,
}

impl<F> FiniteDifference<F> {
    pub const DEFAULT_STEP: f64 = 1e-6;

    pub fn new(f: F) -> Self {
        Self {
            f,
            step: Self::DEFAULT_STEP,
        }
    }

    pub fn with_step(f: F, step: f64) -> Self {
        Self { f, step }
    }
}

impl<const N: usize, F> Objective<N> for FiniteDifference<F>
where
    F: Fn(&SVector<f64, N>) -> f64,
{
    fn value(&self, x: &SVector<f64, N>) -> f64 {
        (self.f)(x)
    }

    fn gradient(&self, x: &SVector<f64, N>) -> SVector<f64, N> {
        let mut g = SVector::<f64, N>::zeros();
        let mut probe = *x;
        for i in 0..N {
            let xi = x[i];
            probe[i] = xi + self.step;
            let up = (self.f)(&probe);
            probe[i] = xi - self.step;
            let down = (self.f)(&probe);
            probe[i] = xi;
            g[i] = (up - down) / (2.0 * self.step);
        }
        g
    }
}

/// Momentum gradient descent with a fixed iteration count.
///
/// Each step computes `velocity = ∇f(x) + momentum * velocity` and then
/// `x -= step_size * velocity`. There is no line search and no convergence
/// test, so the same input always yields the same output bit for bit.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientDescent {
    pub iterations: usize,
    pub step_size: f64,
    pub momentum: f64,
}

impl Default for GradientDescent {
    fn default() -> Self {
        Self {
            iterations: 1000,
            step_size: 0.01,
            momentum: 0.95,
        }
    }
}

impl GradientDescent {
    pub fn new(iterations: usize, step_size: f64, momentum: f64) -> Self {
        Self {
            iterations,
            step_size,
            momentum,
        }
    }

    pub fn minimize<const N: usize, O>(
        &self,
        objective: &O,
        initial: SVector<f64, N>,
    ) -> SVector<f64, N>
    where
        O: Objective<N> + ?Sized,
    {
        let mut x = initial;
        let mut velocity = SVector::<f64, N>::zeros();
        for _ in 0..self.iterations {
            let g = objective.gradient(&x);
            velocity = g + velocity * self.momentum;
            x -= velocity * self.step_size;
        }
        if log_enabled!(Level::Debug) {
            debug!(
                "gradient descent: {} iterations, loss {:.6e} -> {:.6e}",
                self.iterations,
                objective.value(&initial),
                objective.value(&x)
            );
        }
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector2;

    struct Bowl;

    impl Objective<2> for Bowl {
        fn value(&self, x: &Vector2<f64>) -> f64 {
            (x[0] - 1.0).powi(2) + 4.0 * (x[1] + 2.0).powi(2)
        }

        fn gradient(&self, x: &Vector2<f64>) -> Vector2<f64> {
            Vector2::new(2.0 * (x[0] - 1.0), 8.0 * (x[1] + 2.0))
        }
    }

    #[test]
    fn converges_on_a_quadratic_bowl() {
        let gd = GradientDescent::new(500, 0.05, 0.5);
        let x = gd.minimize(&Bowl, Vector2::zeros());
        assert_relative_eq!(x, Vector2::new(1.0, -2.0), epsilon = 1e-8);
    }

    #[test]
    fn single_step_matches_the_update_rule() {
        let gd = GradientDescent::new(2, 0.1, 0.9);
        let x0 = Vector2::new(3.0, 0.0);
        // step 1: v = g(x0), x1 = x0 - 0.1 v
        let v1 = Bowl.gradient(&x0);
        let x1 = x0 - v1 * 0.1;
        // step 2: v = g(x1) + 0.9 v1
        let v2 = Bowl.gradient(&x1) + v1 * 0.9;
        let x2 = x1 - v2 * 0.1;
        assert_eq!(gd.minimize(&Bowl, x0), x2);
    }

    #[test]
    fn zero_iterations_return_the_start() {
        let gd = GradientDescent::new(0, 0.1, 0.9);
        let x0 = Vector2::new(0.25, -0.5);
        assert_eq!(gd.minimize(&Bowl, x0), x0);
    }

    #[test]
    fn finite_difference_matches_analytic_gradient() {
        let fd = FiniteDifference::new(|x: &Vector2<f64>| Bowl.value(x));
        let x = Vector2::new(0.3, -1.1);
        assert_relative_eq!(fd.gradient(&x), Bowl.gradient(&x), epsilon = 1e-6);
        assert_eq!(fd.value(&x), Bowl.value(&x));
    }

    #[test]
    fn closure_objectives_can_be_minimized() {
        let fd = FiniteDifference::new(|x: &Vector2<f64>| (x[0] - 0.5).powi(2) + x[1].powi(2));
        let x = GradientDescent::new(400, 0.1, 0.5).minimize(&fd, Vector2::new(2.0, 2.0));
        assert_relative_eq!(x, Vector2::new(0.5, 0.0), epsilon = 1e-5);
    }
}
