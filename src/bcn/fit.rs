//! Endpoint fitting for color blocks.
//!
//! [range_fit] projects the pixels onto the principal axis of their
//! covariance and keeps the two extreme source colors. [cluster_fit] sorts
//! the pixels along the axis and solves a least squares problem for every
//! contiguous partition onto the palette steps, keeping the endpoints with
//! the smallest weighted error.
use std::ops::{Add, Mul, Sub};

const POWER_ITERATIONS: usize = 8;

/// The iteration cap for [Quality::Slow](crate::Quality::Slow) refinement.
pub const MAX_CLUSTER_ITERATIONS: usize = 8;

// Weight of the start endpoint at each palette step.
const STEPS_FOUR: [f32; 4] = [1.0, 2.0 / 3.0, 1.0 / 3.0, 0.0];
const STEPS_THREE: [f32; 3] = [1.0, 0.5, 0.0];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, other: Vec3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    fn clamp01(self) -> Self {
        Self::new(
            self.x.clamp(0.0, 1.0),
            self.y.clamp(0.0, 1.0),
            self.z.clamp(0.0, 1.0),
        )
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

// Componentwise product.
impl Mul for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x * rhs.x, self.y * rhs.y, self.z * rhs.z)
    }
}

/// Two colors defining the interpolation line for a block's palette.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Endpoints {
    pub start: Vec3,
    pub end: Vec3,
}

// Symmetric covariance matrix entries xx, xy, xz, yy, yz, zz.
fn covariance(points: &[Vec3]) -> [f32; 6] {
    let centroid = points.iter().fold(Vec3::ZERO, |acc, &p| acc + p) * (1.0 / points.len() as f32);

    let mut cov = [0.0f32; 6];
    for &point in points {
        let d = point - centroid;
        cov[0] += d.x * d.x;
        cov[1] += d.x * d.y;
        cov[2] += d.x * d.z;
        cov[3] += d.y * d.y;
        cov[4] += d.y * d.z;
        cov[5] += d.z * d.z;
    }
    cov
}

// Dominant eigenvector by power iteration.
// Degenerate distributions fall back to a diagonal axis.
fn principal_axis(cov: [f32; 6]) -> Vec3 {
    let mut axis = Vec3::new(1.0, 1.0, 1.0);
    for _ in 0..POWER_ITERATIONS {
        let next = Vec3::new(
            cov[0] * axis.x + cov[1] * axis.y + cov[2] * axis.z,
            cov[1] * axis.x + cov[3] * axis.y + cov[4] * axis.z,
            cov[2] * axis.x + cov[4] * axis.y + cov[5] * axis.z,
        );
        let norm = next.x.abs().max(next.y.abs()).max(next.z.abs());
        if norm < 1e-12 {
            return Vec3::new(1.0, 1.0, 1.0);
        }
        axis = next * (1.0 / norm);
    }
    axis
}

/// Fit endpoints to the extreme source colors along the principal axis.
pub fn range_fit(points: &[Vec3]) -> Endpoints {
    let axis = principal_axis(covariance(points));

    let mut start = points[0];
    let mut end = points[0];
    let mut min_projection = points[0].dot(axis);
    let mut max_projection = min_projection;
    for &point in &points[1..] {
        let projection = point.dot(axis);
        if projection < min_projection {
            min_projection = projection;
            start = point;
        }
        if projection > max_projection {
            max_projection = projection;
            end = point;
        }
    }

    Endpoints { start, end }
}

/// Least squares cluster fit over the principal axis ordering.
///
/// `three_color` fits the three step BC1 palette used for blocks with
/// punch through alpha. Additional `iterations` re-sort the pixels along
/// the fitted line and solve again until the ordering converges.
pub fn cluster_fit(points: &[Vec3], metric: Vec3, three_color: bool, iterations: usize) -> Endpoints {
    let n = points.len();
    let fallback = Endpoints {
        start: points[0],
        end: points[0],
    };
    if n == 1 {
        return fallback;
    }

    let mut solver = PartitionSolver {
        metric,
        x2: points.iter().fold(Vec3::ZERO, |acc, &p| acc + p * p),
        best_error: f32::INFINITY,
        best: None,
    };

    let mut axis = principal_axis(covariance(points));
    let mut order: Vec<usize> = (0..n).collect();
    let mut previous_order = Vec::new();
    let mut xsum = vec![Vec3::ZERO; n + 1];

    for _ in 0..iterations.max(1) {
        // A stable sort keeps ties in index order for deterministic output.
        let projections: Vec<f32> = points.iter().map(|p| p.dot(axis)).collect();
        order.sort_by(|&a, &b| projections[a].total_cmp(&projections[b]));
        if order == previous_order {
            break;
        }
        previous_order.clone_from(&order);

        // Prefix sums make each partition's sums O(1).
        for (i, &p) in order.iter().enumerate() {
            xsum[i + 1] = xsum[i] + points[p];
        }

        if three_color {
            solver.solve_three(&xsum);
        } else {
            solver.solve_four(&xsum);
        }

        match solver.best {
            Some(endpoints) if endpoints.start != endpoints.end => {
                axis = endpoints.end - endpoints.start;
            }
            _ => break,
        }
    }

    solver.best.unwrap_or(fallback)
}

struct PartitionSolver {
    metric: Vec3,
    // Total per channel squared sum, constant across partitions.
    x2: Vec3,
    best_error: f32,
    best: Option<Endpoints>,
}

impl PartitionSolver {
    fn solve_four(&mut self, xsum: &[Vec3]) {
        let n = xsum.len() - 1;
        for i in 0..=n {
            for j in i..=n {
                for k in j..=n {
                    self.consider(&[
                        (STEPS_FOUR[0], i, xsum[i]),
                        (STEPS_FOUR[1], j - i, xsum[j] - xsum[i]),
                        (STEPS_FOUR[2], k - j, xsum[k] - xsum[j]),
                        (STEPS_FOUR[3], n - k, xsum[n] - xsum[k]),
                    ]);
                }
            }
        }
    }

    fn solve_three(&mut self, xsum: &[Vec3]) {
        let n = xsum.len() - 1;
        for i in 0..=n {
            for j in i..=n {
                self.consider(&[
                    (STEPS_THREE[0], i, xsum[i]),
                    (STEPS_THREE[1], j - i, xsum[j] - xsum[i]),
                    (STEPS_THREE[2], n - j, xsum[n] - xsum[j]),
                ]);
            }
        }
    }

    // Solve min over (a, b) of sum_i (w_i a + (1 - w_i) b - x_i)^2
    // where w is each pixel's palette step weight, then score the
    // clamped solution with the channel metric.
    fn consider(&mut self, clusters: &[(f32, usize, Vec3)]) {
        let mut alpha2 = 0.0f32;
        let mut beta2 = 0.0f32;
        let mut alphabeta = 0.0f32;
        let mut alphax = Vec3::ZERO;
        let mut betax = Vec3::ZERO;
        for &(weight, count, sum) in clusters {
            let inverse = 1.0 - weight;
            let count = count as f32;
            alpha2 += count * weight * weight;
            beta2 += count * inverse * inverse;
            alphabeta += count * weight * inverse;
            alphax = alphax + sum * weight;
            betax = betax + sum * inverse;
        }

        // Partitions with all pixels on one endpoint are underdetermined.
        let denominator = alpha2 * beta2 - alphabeta * alphabeta;
        if denominator.abs() < 1e-10 {
            return;
        }
        let factor = 1.0 / denominator;
        let a = ((alphax * beta2 - betax * alphabeta) * factor).clamp01();
        let b = ((betax * alpha2 - alphax * alphabeta) * factor).clamp01();

        // Residual of the objective at the clamped solution.
        let residual = self.x2 - (a * alphax + b * betax) * 2.0
            + a * a * alpha2
            + b * b * beta2
            + a * b * (2.0 * alphabeta);
        let error = residual.dot(self.metric);

        // Strictly smaller keeps the first minimal partition.
        if error < self.best_error {
            self.best_error = error;
            self.best = Some(Endpoints { start: a, end: b });
        }
    }
}
