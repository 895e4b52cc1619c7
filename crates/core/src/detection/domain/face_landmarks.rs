//! Dense face-mesh landmarks in normalized image coordinates.
//!
//! Indices follow the 468/478-point face-mesh convention. Only five anchors
//! matter for head orientation: the outer eye corners, the nose tip, and the
//! two cheek extremes.

pub const LEFT_EYE_OUTER: usize = 33;
pub const RIGHT_EYE_OUTER: usize = 263;
pub const NOSE_TIP: usize = 1;
pub const LEFT_CHEEK: usize = 234;
pub const RIGHT_CHEEK: usize = 454;

/// Smallest mesh that contains every anchor.
pub const MIN_MESH_POINTS: usize = RIGHT_CHEEK + 1;

/// The five points the orientation classifier reads.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeadAnchors {
    pub left_eye_outer: (f64, f64),
    pub right_eye_outer: (f64, f64),
    pub nose_tip: (f64, f64),
    pub left_cheek: (f64, f64),
    pub right_cheek: (f64, f64),
}

#[derive(Clone, Debug, PartialEq)]
pub struct FaceLandmarks {
    /// `(x, y)` in `[0, 1]` relative to frame width and height.
    points: Vec<(f64, f64)>,
}

impl FaceLandmarks {
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Extracts the orientation anchors.
    ///
    /// Returns `None` for a mesh too short to contain them or for non-finite
    /// anchor coordinates.
    pub fn anchors(&self) -> Option<HeadAnchors> {
        let point = |i: usize| -> Option<(f64, f64)> {
            let (x, y) = *self.points.get(i)?;
            (x.is_finite() && y.is_finite()).then_some((x, y))
        };

        Some(HeadAnchors {
            left_eye_outer: point(LEFT_EYE_OUTER)?,
            right_eye_outer: point(RIGHT_EYE_OUTER)?,
            nose_tip: point(NOSE_TIP)?,
            left_cheek: point(LEFT_CHEEK)?,
            right_cheek: point(RIGHT_CHEEK)?,
        })
    }

    /// The same mesh as seen in a horizontally flipped image.
    pub fn mirrored(&self) -> Self {
        Self {
            points: self.points.iter().map(|&(x, y)| (1.0 - x, y)).collect(),
        }
    }
}
