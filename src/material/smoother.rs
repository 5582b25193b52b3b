use super::YieldAndFlow;
use crate::StrError;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Defines the kernel used to smooth the corners between yield surfaces
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SmootherFunction {
    /// Cosine kernel
    Cos,

    /// Polynomial kernel of degree 4 (C2 at the band edges)
    Poly1,

    /// Polynomial kernel of degree 6
    Poly2,

    /// Polynomial kernel of degree 8
    Poly3,
}

/// Combines several yield functions into a single C2-continuous convex yield function
///
/// Two yield values `fb` (current best) and `fa` closer than the smoothing tolerance `δ`
/// are combined as
///
/// ```text
/// f = ½ (fb + fa + δ) + I(fb - fa)
/// ```
///
/// where `I` is the integral of the step-like kernel `S`. Outside the band `|fb - fa| < δ`
/// the largest value is taken without modification.
#[derive(Clone, Copy, Debug)]
pub struct YieldSurfaceSmoother {
    /// Smoothing tolerance δ
    tol: f64,

    /// Squared smoothing tolerance δ²
    tol2: f64,

    /// Kernel
    kind: SmootherFunction,
}

impl YieldSurfaceSmoother {
    /// Allocates a new instance
    pub fn new(smoothing_tol: f64, kind: SmootherFunction) -> Result<Self, StrError> {
        if !(smoothing_tol > 0.0) || !smoothing_tol.is_finite() {
            return Err("smoothing tolerance must be positive");
        }
        Ok(YieldSurfaceSmoother {
            tol: smoothing_tol,
            tol2: smoothing_tol * smoothing_tol,
            kind,
        })
    }

    /// Returns the smoothing tolerance
    pub fn tolerance(&self) -> f64 {
        self.tol
    }

    /// Returns the kernel
    pub fn kind(&self) -> SmootherFunction {
        self.kind
    }

    /// Evaluates the integrated kernel I(Δ)
    pub fn ismoother(&self, f_diff: f64) -> f64 {
        if f64::abs(f_diff) >= self.tol {
            return 0.0;
        }
        let (d, d2) = (self.tol, self.tol2);
        let x = f_diff / d;
        match self.kind {
            SmootherFunction::Cos => -d / PI * f64::cos(0.5 * PI * x),
            SmootherFunction::Poly1 => 0.75 / d * (0.5 * (f_diff * f_diff - d2) - (d2 / 12.0) * (x.powi(4) - 1.0)),
            SmootherFunction::Poly2 => 0.625 / d * (0.5 * (f_diff * f_diff - d2) - (d2 / 30.0) * (x.powi(6) - 1.0)),
            SmootherFunction::Poly3 => {
                (7.0 / 12.0 / d) * (0.5 * (f_diff * f_diff - d2) - (d2 / 56.0) * (x.powi(8) - 1.0))
            }
        }
    }

    /// Evaluates the kernel S(Δ) = dI/dΔ
    pub fn smoother(&self, f_diff: f64) -> f64 {
        if f64::abs(f_diff) >= self.tol {
            return 0.0;
        }
        let d = self.tol;
        let x = f_diff / d;
        match self.kind {
            SmootherFunction::Cos => 0.5 * f64::sin(0.5 * PI * x),
            SmootherFunction::Poly1 => 0.75 / d * (f_diff - (d / 3.0) * x.powi(3)),
            SmootherFunction::Poly2 => 0.625 / d * (f_diff - (d / 5.0) * x.powi(5)),
            SmootherFunction::Poly3 => (7.0 / 12.0 / d) * (f_diff - (d / 7.0) * x.powi(7)),
        }
    }

    /// Evaluates the kernel derivative dS/dΔ
    pub fn dsmoother(&self, f_diff: f64) -> f64 {
        if f64::abs(f_diff) >= self.tol {
            return 0.0;
        }
        let d = self.tol;
        let x = f_diff / d;
        match self.kind {
            SmootherFunction::Cos => 0.25 * PI / d * f64::cos(0.5 * PI * x),
            SmootherFunction::Poly1 => 0.75 / d * (1.0 - x.powi(2)),
            SmootherFunction::Poly2 => 0.625 / d * (1.0 - x.powi(4)),
            SmootherFunction::Poly3 => (7.0 / 12.0 / d) * (1.0 - x.powi(6)),
        }
    }

    /// Returns the smoothed yield value from the individual yield function values
    ///
    /// This is the scalar-only counterpart of [YieldSurfaceSmoother::smooth].
    /// Returns `f64::MIN` if the list is empty.
    pub fn aggregate_yield_value(&self, values: &[f64]) -> f64 {
        let mut iter = values.iter();
        let mut best = match iter.next() {
            Some(v) => *v,
            None => return f64::MIN,
        };
        for &fa in iter {
            if best >= fa + self.tol {
                continue;
            }
            if fa >= best + self.tol {
                best = fa;
                continue;
            }
            best = 0.5 * (best + fa + self.tol) + self.ismoother(best - fa);
        }
        best
    }

    /// Combines all yield functions and derivatives into a single smoothed one
    ///
    /// The flow direction `dg` is smoothed with the kernel of the yield functions.
    pub fn smooth(&self, all: Vec<YieldAndFlow>) -> Result<YieldAndFlow, StrError> {
        let mut iter = all.into_iter();
        let mut best = iter.next().ok_or("at least one yield function is required")?;
        for a in iter {
            if best.f >= a.f + self.tol {
                continue;
            }
            if a.f >= best.f + self.tol {
                best = a;
                continue;
            }
            self.blend(&mut best, &a);
        }
        Ok(best)
    }

    /// Blends `a` into `best` (both within the smoothing band)
    fn blend(&self, best: &mut YieldAndFlow, a: &YieldAndFlow) {
        let f_diff = best.f - a.f;
        let ism = self.ismoother(f_diff);
        let sm = self.smoother(f_diff);
        let dsm = self.dsmoother(f_diff);

        // differences (before best is modified)
        let ddf = &best.df - &a.df;
        let ddf_di = &best.df_di - &a.df_di;
        let ddg = &best.dg - &a.dg;

        // second derivatives
        best.d2g = (&best.d2g + &a.d2g) * 0.5 + (&ddg * ddf.transpose()) * dsm + (&best.d2g - &a.d2g) * sm;
        best.d2g_di =
            (&best.d2g_di + &a.d2g_di) * 0.5 + (&ddg * ddf_di.transpose()) * dsm + (&best.d2g_di - &a.d2g_di) * sm;

        // first derivatives
        best.df = (&best.df + &a.df) * 0.5 + ddf * sm;
        best.dg = (&best.dg + &a.dg) * 0.5 + ddg * sm;
        best.df_di = (&best.df_di + &a.df_di) * 0.5 + ddf_di * sm;

        // value
        best.f = 0.5 * (best.f + a.f + self.tol) + ism;
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
