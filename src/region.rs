//! Time-range selections over the waveform

use serde::Serialize;

/// Id of the region the editor creates on every load
pub const SYSTEM_REGION_ID: &str = "region-1";

/// Who created a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    /// The default selection the editor materialises when a waveform is ready
    System,
    /// Drawn by the user on the waveform
    UserDrawn,
}

/// Start and end offsets in seconds, `0 <= start < end`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub start: f64,
    pub end: f64,
}

impl Bounds {
    pub fn new(start: f64, end: f64) -> Option<Self> {
        if start.is_finite() && end.is_finite() && start >= 0.0 && end > start {
            Some(Self { start, end })
        } else {
            None
        }
    }

    pub fn length(&self) -> f64 {
        self.end - self.start
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Region {
    pub id: String,
    pub kind: RegionKind,
    #[serde(flatten)]
    pub bounds: Bounds,
}

impl Region {
    /// The system region spanning `0..span` seconds
    ///
    /// The span is not clamped to the file's duration.
    pub fn system_default(span: f64) -> Self {
        Self {
            id: SYSTEM_REGION_ID.to_string(),
            kind: RegionKind::System,
            bounds: Bounds {
                start: 0.0,
                end: span,
            },
        }
    }

    pub fn start(&self) -> f64 {
        self.bounds.start
    }

    pub fn end(&self) -> f64 {
        self.bounds.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_validation() {
        assert!(Bounds::new(0.0, 15.0).is_some());
        assert!(Bounds::new(5.0, 5.0).is_none());
        assert!(Bounds::new(-0.1, 5.0).is_none());
        assert!(Bounds::new(0.0, f64::INFINITY).is_none());
    }

    #[test]
    fn test_system_default() {
        let region = Region::system_default(15.0);
        assert_eq!(region.id, "region-1");
        assert_eq!(region.kind, RegionKind::System);
        assert_eq!((region.start(), region.end()), (0.0, 15.0));
    }
}
