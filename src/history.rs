//! Edit history: the operations a user applied in the editor, and their
//! canonical form.
//!
//! The editor front end records every click, so a history routinely contains
//! runs that cancel out (rotate left then right, flip twice). Before anything
//! touches pixels the history is canonicalized:
//!
//! - adjacent rotations merge by summing angles,
//! - adjacent flips merge by XOR-ing their axis bits,
//! - crops never merge with anything.
//!
//! A merge that nets out to nothing (`Rotate(360)`, `Flip(0)`) stays in the
//! log. It is skipped when the log is applied, but it still counts as an edit,
//! so saving such a history produces a new version of the asset.
//!
//! ## Wire format
//!
//! Histories travel as the editor submits them, one single-key object per
//! operation:
//!
//! ```text
//! [{"r":90}, {"f":1}, {"c":{"x":10,"y":10,"w":50,"h":50}}]
//! ```

use serde::{Deserialize, Serialize};

/// Flip across the horizontal axis (top and bottom swap).
pub const FLIP_HORIZONTAL: u8 = 1;
/// Flip across the vertical axis (left and right swap).
pub const FLIP_VERTICAL: u8 = 2;

/// A single user-issued transform.
///
/// Crop coordinates are in preview pixels; see
/// [`correct_crop`](crate::imaging::calculations::correct_crop).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireOp", into = "WireOp")]
pub enum EditOperation {
    /// Degrees, positive = counter-clockwise.
    Rotate { angle: i32 },
    /// Bitmask of [`FLIP_HORIZONTAL`] and [`FLIP_VERTICAL`].
    Flip { axis: u8 },
    Crop { x: f64, y: f64, w: f64, h: f64 },
}

impl EditOperation {
    /// Whether applying this operation leaves the pixels untouched.
    pub fn is_noop(&self) -> bool {
        match *self {
            Self::Rotate { angle } => angle.rem_euclid(360) == 0,
            Self::Flip { axis } => axis & (FLIP_HORIZONTAL | FLIP_VERTICAL) == 0,
            Self::Crop { .. } => false,
        }
    }

    /// Fold `next` into `self` if both are mergeable operations of the same kind.
    fn merge(&mut self, next: &EditOperation) -> bool {
        match (self, next) {
            (Self::Rotate { angle }, Self::Rotate { angle: more }) => {
                *angle = angle.wrapping_add(*more);
                true
            }
            (Self::Flip { axis }, Self::Flip { axis: more }) => {
                *axis ^= more;
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct WireRect {
    x: f64,
    y: f64,
    w: f64,
    h: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
enum WireOp {
    Rotate { r: i32 },
    Flip { f: u8 },
    Crop { c: WireRect },
}

impl From<WireOp> for EditOperation {
    fn from(op: WireOp) -> Self {
        match op {
            WireOp::Rotate { r } => Self::Rotate { angle: r },
            WireOp::Flip { f } => Self::Flip { axis: f },
            WireOp::Crop { c } => Self::Crop {
                x: c.x,
                y: c.y,
                w: c.w,
                h: c.h,
            },
        }
    }
}

impl From<EditOperation> for WireOp {
    fn from(op: EditOperation) -> Self {
        match op {
            EditOperation::Rotate { angle } => Self::Rotate { r: angle },
            EditOperation::Flip { axis } => Self::Flip { f: axis },
            EditOperation::Crop { x, y, w, h } => Self::Crop {
                c: WireRect { x, y, w, h },
            },
        }
    }
}

/// An ordered edit history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationLog(Vec<EditOperation>);

impl OperationLog {
    pub fn new(operations: Vec<EditOperation>) -> Self {
        Self(operations)
    }

    /// Parse the editor's JSON history.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "[]".to_string())
    }

    /// Merge adjacent rotations and adjacent flips; keep crops as-is.
    ///
    /// The result never holds two adjacent rotations or two adjacent flips,
    /// and canonicalizing it again returns it unchanged.
    pub fn canonicalize(&self) -> OperationLog {
        let mut out: Vec<EditOperation> = Vec::with_capacity(self.0.len());
        for op in &self.0 {
            let merged = out.last_mut().is_some_and(|last| last.merge(op));
            if !merged {
                out.push(*op);
            }
        }
        OperationLog(out)
    }

    /// Operations that actually change pixels, in order.
    pub fn effective(&self) -> impl Iterator<Item = &EditOperation> {
        self.0.iter().filter(|op| !op.is_noop())
    }

    pub fn operations(&self) -> &[EditOperation] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl From<Vec<EditOperation>> for OperationLog {
    fn from(ops: Vec<EditOperation>) -> Self {
        Self(ops)
    }
}
