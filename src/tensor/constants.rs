/// Holds the square root of 3/2
pub const SQRT_3_BY_2: f64 = 1.224744871391589;

/// Holds the second-order identity tensor in the Mandel basis
pub const IDENTITY2: [f64; 6] = [1.0, 1.0, 1.0, 0.0, 0.0, 0.0];
