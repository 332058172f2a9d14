use ndarray::ArrayView3;

pub(crate) struct Interpolator;

impl Interpolator {
    /// Wraps a texel index into `0..len` (repeat addressing).
    #[inline]
    fn wrap(index: i64, len: usize) -> usize {
        index.rem_euclid(len as i64) as usize
    }

    #[inline]
    fn fetch(volume: &ArrayView3<u8>, z: i64, y: i64, x: i64) -> f32 {
        let (depth, height, width) = volume.dim();
        let value = volume[[
            Self::wrap(z, depth),
            Self::wrap(y, height),
            Self::wrap(x, width),
        ]];
        value as f32 / 255.0
    }

    /// Samples at normalized coordinates `(u, v, w)` picking the texel that contains the point.
    #[inline]
    pub(crate) fn nearest(volume: &ArrayView3<u8>, u: f32, v: f32, w: f32) -> f32 {
        let (depth, height, width) = volume.dim();
        let x = (u * width as f32).floor() as i64;
        let y = (v * height as f32).floor() as i64;
        let z = (w * depth as f32).floor() as i64;
        Self::fetch(volume, z, y, x)
    }

    /// Samples at normalized coordinates `(u, v, w)` blending the eight surrounding texel centers.
    #[inline]
    pub(crate) fn trilinear(volume: &ArrayView3<u8>, u: f32, v: f32, w: f32) -> f32 {
        let (depth, height, width) = volume.dim();

        // texel centers sit at (i + 0.5) / n
        let x = u * width as f32 - 0.5;
        let y = v * height as f32 - 0.5;
        let z = w * depth as f32 - 0.5;

        let (x0, y0, z0) = (x.floor(), y.floor(), z.floor());
        let (dx, dy, dz) = (x - x0, y - y0, z - z0);
        let (x0, y0, z0) = (x0 as i64, y0 as i64, z0 as i64);

        let lerp = |a: f32, b: f32, t: f32| a.mul_add(1.0 - t, b * t);

        let c00 = lerp(
            Self::fetch(volume, z0, y0, x0),
            Self::fetch(volume, z0, y0, x0 + 1),
            dx,
        );
        let c01 = lerp(
            Self::fetch(volume, z0, y0 + 1, x0),
            Self::fetch(volume, z0, y0 + 1, x0 + 1),
            dx,
        );
        let c10 = lerp(
            Self::fetch(volume, z0 + 1, y0, x0),
            Self::fetch(volume, z0 + 1, y0, x0 + 1),
            dx,
        );
        let c11 = lerp(
            Self::fetch(volume, z0 + 1, y0 + 1, x0),
            Self::fetch(volume, z0 + 1, y0 + 1, x0 + 1),
            dx,
        );

        let c0 = lerp(c00, c01, dy);
        let c1 = lerp(c10, c11, dy);

        lerp(c0, c1, dz)
    }
}
