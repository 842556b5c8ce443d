use std::fmt;

/// One palette entry. Distances are squared Euclidean over the integer
/// channel deltas.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq)]
pub struct ColorPoint {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl ColorPoint {
    pub fn new(r: u8, g: u8, b: u8) -> ColorPoint {
        ColorPoint { r, g, b }
    }

    /// The distance to another color, squared.
    #[inline]
    pub fn distance_to(&self, other: ColorPoint) -> i32 {
        let dr = i32::from(self.r) - i32::from(other.r);
        let dg = i32::from(self.g) - i32::from(other.g);
        let db = i32::from(self.b) - i32::from(other.b);
        dr * dr + dg * dg + db * db
    }

    #[inline]
    pub fn channels(&self) -> [i32; 3] {
        [i32::from(self.r), i32::from(self.g), i32::from(self.b)]
    }
}

impl fmt::Display for ColorPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.r, self.g, self.b)
    }
}

/// A grid position. The hash is `y * size + x` and identifies the
/// position everywhere the index needs a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpacePoint {
    pub x: u32,
    pub y: u32,
    pub hash: u32,
}

impl SpacePoint {
    pub fn new(x: u32, y: u32, size: u32) -> SpacePoint {
        SpacePoint { x, y, hash: y * size + x }
    }
}

/// An unwritten position paired with the candidate color it inherited
/// from a written neighbor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrontierPoint {
    pub space: SpacePoint,
    pub color: ColorPoint,
}

/// Collects the 4-connected neighbors of `space` into `out`, clamped to
/// the grid. Enumeration order is left, right, up, down.
pub fn push_neighbors(space: SpacePoint, size: u32, out: &mut Vec<SpacePoint>) {
    let SpacePoint { x, y, .. } = space;
    out.clear();

    if x > 0 {
        out.push(SpacePoint::new(x - 1, y, size));
    }
    if x + 1 < size {
        out.push(SpacePoint::new(x + 1, y, size));
    }
    if y > 0 {
        out.push(SpacePoint::new(x, y - 1, size));
    }
    if y + 1 < size {
        out.push(SpacePoint::new(x, y + 1, size));
    }
}
