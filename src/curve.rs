//! Designer-authored response curves.
//!
//! A [`Curve`] maps a normalized input (usually a race-spread fraction in
//! `[0, 1]`) to a scalar through cubic Hermite segments between keyframes.
//! Inputs outside the key range clamp to the end keys.

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use thiserror::Error;

/// Number of keys used when a preset easing style is baked into a curve.
const PRESET_SAMPLES: usize = 16;

#[derive(Debug, Error, PartialEq)]
pub enum CurveError {
    #[error("keyframe {index} has a non-finite component")]
    NonFinite { index: usize },
    #[error("keyframes {first} and {second} share time {time}")]
    DuplicateTime { first: usize, second: usize, time: f32 },
}

/// A single control point of a [`Curve`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub time: f32,
    pub value: f32,
    #[serde(default)]
    pub in_tangent: f32,
    #[serde(default)]
    pub out_tangent: f32,
}

impl Keyframe {
    pub fn new(time: f32, value: f32, in_tangent: f32, out_tangent: f32) -> Self {
        Self {
            time,
            value,
            in_tangent,
            out_tangent,
        }
    }

    fn is_finite(&self) -> bool {
        self.time.is_finite()
            && self.value.is_finite()
            && self.in_tangent.is_finite()
            && self.out_tangent.is_finite()
    }
}

/// Built-in easing shapes over `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EaseStyle {
    /// Fast start, slow finish (quarter sine).
    EaseIn,
    /// Slow start, fast finish.
    EaseOut,
    /// Smoothstep.
    Smooth,
    /// Smootherstep.
    SuperSmooth,
    Linear,
}

impl EaseStyle {
    pub fn apply(self, t: f32) -> f32 {
        match self {
            EaseStyle::EaseIn => (t * PI * 0.5).sin(),
            EaseStyle::EaseOut => 1.0 - (t * PI * 0.5).cos(),
            EaseStyle::Smooth => t * t * (3.0 - 2.0 * t),
            EaseStyle::SuperSmooth => t * t * t * (t * (6.0 * t - 15.0) + 10.0),
            EaseStyle::Linear => t,
        }
    }

    fn slope(self, t: f32) -> f32 {
        match self {
            EaseStyle::EaseIn => (t * PI * 0.5).cos() * PI * 0.5,
            EaseStyle::EaseOut => (t * PI * 0.5).sin() * PI * 0.5,
            EaseStyle::Smooth => 6.0 * t * (1.0 - t),
            EaseStyle::SuperSmooth => 30.0 * t * t * (t - 1.0) * (t - 1.0),
            EaseStyle::Linear => 1.0,
        }
    }
}

/// On-disk form of a curve: either a preset name or explicit keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum CurveDef {
    Preset { preset: EaseStyle },
    Keys { keys: Vec<Keyframe> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CurveDef", into = "CurveDef")]
pub struct Curve {
    keys: Vec<Keyframe>,
}

impl TryFrom<CurveDef> for Curve {
    type Error = CurveError;

    fn try_from(def: CurveDef) -> Result<Self, Self::Error> {
        match def {
            CurveDef::Preset { preset } => Ok(Curve::from_ease(preset)),
            CurveDef::Keys { keys } => Curve::new(keys),
        }
    }
}

impl From<Curve> for CurveDef {
    fn from(curve: Curve) -> Self {
        CurveDef::Keys { keys: curve.keys }
    }
}

impl Default for Curve {
    fn default() -> Self {
        Curve::identity()
    }
}

impl Curve {
    /// Build a curve from keys in any order.
    pub fn new(mut keys: Vec<Keyframe>) -> Result<Self, CurveError> {
        if let Some(index) = keys.iter().position(|k| !k.is_finite()) {
            return Err(CurveError::NonFinite { index });
        }
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        for (i, pair) in keys.windows(2).enumerate() {
            if pair[0].time == pair[1].time {
                return Err(CurveError::DuplicateTime {
                    first: i,
                    second: i + 1,
                    time: pair[0].time,
                });
            }
        }
        Ok(Self { keys })
    }

    /// Straight line from `(0, start)` to `(1, end)`.
    pub fn linear(start: f32, end: f32) -> Self {
        let slope = end - start;
        Self {
            keys: vec![
                Keyframe::new(0.0, start, slope, slope),
                Keyframe::new(1.0, end, slope, slope),
            ],
        }
    }

    pub fn identity() -> Self {
        Self::linear(0.0, 1.0)
    }

    pub fn constant(value: f32) -> Self {
        Self {
            keys: vec![Keyframe::new(0.0, value, 0.0, 0.0)],
        }
    }

    /// Bake an easing preset into Hermite keys.
    pub fn from_ease(style: EaseStyle) -> Self {
        if style == EaseStyle::Linear {
            return Self::identity();
        }
        let keys = (0..=PRESET_SAMPLES)
            .map(|i| {
                let t = i as f32 / PRESET_SAMPLES as f32;
                let slope = style.slope(t);
                Keyframe::new(t, style.apply(t), slope, slope)
            })
            .collect();
        Self { keys }
    }

    pub fn keys(&self) -> &[Keyframe] {
        &self.keys
    }

    /// Evaluate the curve at `t`. Out-of-range input clamps to the end keys;
    /// NaN evaluates at the first key.
    pub fn evaluate(&self, t: f32) -> f32 {
        let (first, last) = match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return 0.0,
        };
        if t.is_nan() || t <= first.time {
            return first.value;
        }
        if t >= last.time {
            return last.value;
        }

        // first key with time > t; guaranteed in 1..len by the checks above
        let hi = self.keys.partition_point(|k| k.time <= t);
        let a = &self.keys[hi - 1];
        let b = &self.keys[hi];
        hermite(a, b, t)
    }
}

fn hermite(a: &Keyframe, b: &Keyframe, t: f32) -> f32 {
    let span = b.time - a.time;
    let s = (t - a.time) / span;
    let s2 = s * s;
    let s3 = s2 * s;

    let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
    let h10 = s3 - 2.0 * s2 + s;
    let h01 = -2.0 * s3 + 3.0 * s2;
    let h11 = s3 - s2;

    h00 * a.value + h10 * span * a.out_tangent + h01 * b.value + h11 * span * b.in_tangent
}
