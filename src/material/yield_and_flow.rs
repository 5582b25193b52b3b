use nalgebra::{DMatrix, DVector};

/// Holds the value of one yield function and the derivatives needed by the return-map
///
/// All derivatives are taken with respect to the stress parameters `sp` and the
/// internal variables `intnl` (see [super::MultiSurfaceModel]).
#[derive(Clone, Debug, PartialEq)]
pub struct YieldAndFlow {
    /// Holds the yield function value f
    pub f: f64,

    /// Holds df/dsp (num_sp)
    pub df: DVector<f64>,

    /// Holds df/dintnl (num_intnl)
    pub df_di: DVector<f64>,

    /// Holds the flow direction dg/dsp (num_sp)
    pub dg: DVector<f64>,

    /// Holds d²g/dsp² (num_sp × num_sp)
    pub d2g: DMatrix<f64>,

    /// Holds d²g/dsp/dintnl (num_sp × num_intnl)
    pub d2g_di: DMatrix<f64>,
}

impl YieldAndFlow {
    /// Allocates a new instance with all values equal to zero
    pub fn new(num_sp: usize, num_intnl: usize) -> Self {
        YieldAndFlow {
            f: 0.0,
            df: DVector::zeros(num_sp),
            df_di: DVector::zeros(num_intnl),
            dg: DVector::zeros(num_sp),
            d2g: DMatrix::zeros(num_sp, num_sp),
            d2g_di: DMatrix::zeros(num_sp, num_intnl),
        }
    }

    /// Sets all values to zero, keeping the sizes
    pub fn reset(&mut self) {
        self.f = 0.0;
        self.df.fill(0.0);
        self.df_di.fill(0.0);
        self.dg.fill(0.0);
        self.d2g.fill(0.0);
        self.d2g_di.fill(0.0);
    }

    /// Returns the number of stress parameters
    pub fn num_sp(&self) -> usize {
        self.df.len()
    }

    /// Returns the number of internal variables
    pub fn num_intnl(&self) -> usize {
        self.df_di.len()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::YieldAndFlow;

    #[test]
    fn new_and_reset_work() {
        let mut yf = YieldAndFlow::new(2, 1);
        assert_eq!(yf.num_sp(), 2);
        assert_eq!(yf.num_intnl(), 1);
        assert_eq!(yf.d2g.shape(), (2, 2));
        assert_eq!(yf.d2g_di.shape(), (2, 1));
        yf.f = 1.0;
        yf.dg[1] = 2.0;
        yf.d2g_di[(1, 0)] = 3.0;
        yf.reset();
        assert_eq!(yf, YieldAndFlow::new(2, 1));
    }
}
