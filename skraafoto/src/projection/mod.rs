//! Photogrammetric projection of ground points into aerial images.
//!
//! Uses the collinearity equations with an omega-phi-kappa rotation to map
//! a ground point (easting, northing, elevation) to a pixel of the sensor.
//! Rows are counted from the bottom edge of the image; the raster reader
//! flips them into top-left-origin space.

/// Smallest denominator magnitude treated as a valid projection.
const MIN_DENOMINATOR: f64 = 1e-9;

/// Exterior and interior orientation of one aerial image.
///
/// Angles are in degrees, lengths in the units the catalogue reports them in
/// (millimetres for the interior orientation, metres for the perspective centre).
#[derive(Debug, Clone, PartialEq)]
pub struct CameraModel {
    /// Perspective centre `[X0, Y0, Z0]` in ground coordinates
    pub perspective_center: [f64; 3],
    pub omega: f64,
    pub phi: f64,
    pub kappa: f64,
    /// Principal point offset `[x0, y0]`
    pub principal_point_offset: [f64; 2],
    pub focal_length: f64,
    /// Physical size of one sensor pixel
    pub pixel_spacing: f64,
    /// Sensor width in pixels
    pub columns: u32,
    /// Sensor height in pixels
    pub rows: u32,
}

/// Result of projecting a ground point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelCoordinate {
    /// Pixel position; `row` counts from the bottom edge
    Pixel { col: i64, row: i64 },
    /// The geometry is degenerate for this point
    ProjectionFailed,
}

impl PixelCoordinate {
    pub fn pixel(&self) -> Option<(i64, i64)> {
        match *self {
            PixelCoordinate::Pixel { col, row } => Some((col, row)),
            PixelCoordinate::ProjectionFailed => None,
        }
    }
}

/// Rotation matrix `D` for omega, phi, kappa given in radians.
fn rotation(omega: f64, phi: f64, kappa: f64) -> [[f64; 3]; 3] {
    let (so, co) = omega.sin_cos();
    let (sp, cp) = phi.sin_cos();
    let (sk, ck) = kappa.sin_cos();

    [
        [cp * ck, -cp * sk, sp],
        [co * sk + so * sp * ck, co * ck - so * sp * sk, -so * cp],
        [so * sk - co * sp * ck, so * ck + co * sp * sk, co * cp],
    ]
}

/// Projects the ground point `(x, y, z)` into the image described by `camera`.
///
/// Pure and deterministic. Halfway cases round to even.
pub fn project(x: f64, y: f64, z: f64, camera: &CameraModel) -> PixelCoordinate {
    let pix = camera.pixel_spacing;
    if !(pix > 0.0) || !pix.is_finite() {
        return PixelCoordinate::ProjectionFailed;
    }

    let d = rotation(
        camera.omega.to_radians(),
        camera.phi.to_radians(),
        camera.kappa.to_radians(),
    );
    let [x0_c, y0_c, z0_c] = camera.perspective_center;
    let (dx, dy, dz) = (x - x0_c, y - y0_c, z - z0_c);

    // Principal distance
    let c = -camera.focal_length;

    let den = d[0][2] * dx + d[1][2] * dy + d[2][2] * dz;
    if !den.is_finite() || den.abs() < MIN_DENOMINATOR {
        return PixelCoordinate::ProjectionFailed;
    }

    let x_dot = -c * (d[0][0] * dx + d[1][0] * dy + d[2][0] * dz) / den;
    let y_dot = -c * (d[0][1] * dx + d[1][1] * dy + d[2][1] * dz) / den;

    let dim_x = -(f64::from(camera.columns) * pix / 2.0);
    let dim_y = -(f64::from(camera.rows) * pix / 2.0);
    let [xx0, yy0] = camera.principal_point_offset;

    let col = (-((x_dot - xx0) + dim_x) / pix).round_ties_even();
    let row = (-((y_dot - yy0) + dim_y) / pix).round_ties_even();

    if !col.is_finite() || !row.is_finite() || col.abs() > i64::MAX as f64 || row.abs() > i64::MAX as f64
    {
        return PixelCoordinate::ProjectionFailed;
    }

    PixelCoordinate::Pixel {
        col: col as i64,
        row: row as i64,
    }
}
