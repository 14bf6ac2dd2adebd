//! Bounded univariate minimization (Brent's method)
//!
//! Combines golden-section steps with parabolic interpolation through the
//! three best points seen so far. The caller's guess must bracket a
//! minimum: its value has to be strictly below the values at both bounds.

use tracing::trace;

use crate::error::{NavError, Result};

/// Golden section ratio `(3 - sqrt(5)) / 2`
const GOLDEN: f64 = 0.381_966;

/// Distinguishes a finished search from one stopped by its budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convergence {
    Converged,
    CutOff,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Minimum {
    pub x: f64,
    pub value: f64,
    pub iterations: u32,
    pub status: Convergence,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Brent {
    pub lower: f64,
    pub upper: f64,
    /// Stop once the bracket is narrower than this
    pub tolerance: f64,
    pub max_iterations: u32,
}

/// Current bracket and the three best points
struct State {
    lower: f64,
    upper: f64,
    z: f64,
    fz: f64,
    v: f64,
    fv: f64,
    w: f64,
    fw: f64,
    d: f64,
    e: f64,
}

impl Brent {
    pub fn new(lower: f64, upper: f64, tolerance: f64, max_iterations: u32) -> Self {
        Self {
            lower,
            upper,
            tolerance,
            max_iterations,
        }
    }

    pub fn minimize<F>(&self, mut objective: F, guess: f64) -> Result<Minimum>
    where
        F: FnMut(f64) -> Result<f64>,
    {
        if !(self.lower < guess && guess < self.upper) {
            return Err(NavError::InvalidParameter(format!(
                "guess {} must lie strictly inside [{}, {}]",
                guess, self.lower, self.upper
            )));
        }

        let f_lower = objective(self.lower)?;
        let f_upper = objective(self.upper)?;
        let f_guess = objective(guess)?;

        if !(f_guess < f_lower && f_guess < f_upper) {
            return Err(NavError::NotBracketed {
                lower: self.lower,
                guess,
                upper: self.upper,
                f_lower,
                f_guess,
                f_upper,
            });
        }

        let v = self.lower + GOLDEN * (self.upper - self.lower);
        let fv = objective(v)?;

        let mut state = State {
            lower: self.lower,
            upper: self.upper,
            z: guess,
            fz: f_guess,
            v,
            fv,
            w: v,
            fw: fv,
            d: 0.0,
            e: 0.0,
        };

        let mut iterations = 0;
        let mut status = Convergence::CutOff;
        while iterations < self.max_iterations {
            iterations += 1;
            state.iterate(&mut objective)?;
            trace!(
                "Brent iteration {}: x = {}, f = {}, bracket [{}, {}]",
                iterations,
                state.z,
                state.fz,
                state.lower,
                state.upper
            );

            if (state.upper - state.lower).abs() < self.tolerance {
                status = Convergence::Converged;
                break;
            }
        }

        Ok(Minimum {
            x: state.z,
            value: state.fz,
            iterations,
            status,
        })
    }
}

impl State {
    fn iterate<F>(&mut self, objective: &mut F) -> Result<()>
    where
        F: FnMut(f64) -> Result<f64>,
    {
        let z = self.z;
        let mut d = self.e;
        let mut e = self.d;

        let w_lower = z - self.lower;
        let w_upper = self.upper - z;
        let tolerance = f64::EPSILON.sqrt() * z.abs();
        let midpoint = 0.5 * (self.lower + self.upper);

        let (mut p, mut q, mut r) = (0.0, 0.0, 0.0);
        if e.abs() > tolerance {
            // Parabola through z, w, v
            r = (z - self.w) * (self.fz - self.fv);
            q = (z - self.v) * (self.fz - self.fw);
            p = (z - self.v) * q - (z - self.w) * r;
            q = 2.0 * (q - r);

            if q > 0.0 {
                p = -p;
            } else {
                q = -q;
            }

            r = e;
            e = d;
        }

        if p.abs() < (0.5 * q * r).abs() && p < q * w_lower && p < q * w_upper {
            let t2 = 2.0 * tolerance;
            d = p / q;
            let u = z + d;

            if (u - self.lower) < t2 || (self.upper - u) < t2 {
                d = if z < midpoint { tolerance } else { -tolerance };
            }
        } else {
            e = if z < midpoint {
                self.upper - z
            } else {
                -(z - self.lower)
            };
            d = GOLDEN * e;
        }

        let u = if d.abs() >= tolerance {
            z + d
        } else if d > 0.0 {
            z + tolerance
        } else {
            z - tolerance
        };

        self.e = e;
        self.d = d;

        let fu = objective(u)?;

        if fu <= self.fz {
            if u < z {
                self.upper = z;
            } else {
                self.lower = z;
            }
            self.v = self.w;
            self.fv = self.fw;
            self.w = z;
            self.fw = self.fz;
            self.z = u;
            self.fz = fu;
        } else {
            if u < z {
                self.lower = u;
            } else {
                self.upper = u;
            }

            if fu <= self.fw || self.w == z {
                self.v = self.w;
                self.fv = self.fw;
                self.w = u;
                self.fw = fu;
            } else if fu <= self.fv || self.v == z || self.v == self.w {
                self.v = u;
                self.fv = fu;
            }
        }

        Ok(())
    }
}
