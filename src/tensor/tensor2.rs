use super::{IDENTITY2, SQRT_3_BY_2};
use nalgebra::Vector6;

/// Implements a symmetric second-order tensor in the Mandel basis
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor2 {
    /// Holds the Mandel components
    vec: Vector6<f64>,
}

impl Tensor2 {
    /// Allocates a new instance with all components equal to zero
    pub fn new() -> Self {
        Tensor2 { vec: Vector6::zeros() }
    }

    /// Allocates the identity tensor
    pub fn identity() -> Self {
        Tensor2 {
            vec: Vector6::from_column_slice(&IDENTITY2),
        }
    }

    /// Allocates a new instance from the Mandel components
    pub fn from_mandel(components: &[f64; 6]) -> Self {
        Tensor2 {
            vec: Vector6::from_column_slice(components),
        }
    }

    /// Returns an access to the Mandel components
    pub fn vector(&self) -> &Vector6<f64> {
        &self.vec
    }

    /// Returns a mutable access to the Mandel components
    pub fn vector_mut(&mut self) -> &mut Vector6<f64> {
        &mut self.vec
    }

    /// Sets this tensor equal to another one multiplied by a scalar
    ///
    /// ```text
    /// self := α other
    /// ```
    pub fn set_tensor(&mut self, alpha: f64, other: &Tensor2) {
        self.vec.copy_from(&other.vec);
        self.vec *= alpha;
    }

    /// Adds another tensor multiplied by a scalar
    ///
    /// ```text
    /// self += α other
    /// ```
    pub fn update(&mut self, alpha: f64, other: &Tensor2) {
        self.vec.axpy(alpha, &other.vec, 1.0);
    }

    /// Returns the trace
    pub fn trace(&self) -> f64 {
        self.vec[0] + self.vec[1] + self.vec[2]
    }

    /// Calculates the deviator tensor
    ///
    /// ```text
    /// dev = self - (tr(self)/3) I
    /// ```
    pub fn deviator(&self, dev: &mut Tensor2) {
        let m = self.trace() / 3.0;
        dev.vec.copy_from(&self.vec);
        for i in 0..3 {
            dev.vec[i] -= m;
        }
    }

    /// Returns the Euclidean norm (equal in the Mandel and standard bases)
    pub fn norm(&self) -> f64 {
        self.vec.norm()
    }

    /// Returns the mean invariant `σm = tr(σ)/3`
    pub fn invariant_sigma_m(&self) -> f64 {
        self.trace() / 3.0
    }

    /// Returns the second invariant of the deviator `J2 = ½ s:s`
    pub fn invariant_jj2(&self) -> f64 {
        let mut s = Tensor2::new();
        self.deviator(&mut s);
        0.5 * s.vec.norm_squared()
    }

    /// Returns the deviatoric (von Mises) invariant `σd = √(3 J2) = √(3/2) |s|`
    pub fn invariant_sigma_d(&self) -> f64 {
        let mut s = Tensor2::new();
        self.deviator(&mut s);
        SQRT_3_BY_2 * s.norm()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
