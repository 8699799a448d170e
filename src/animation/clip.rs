//! Keyframe clips and track sampling.

use cgmath::{InnerSpace, Quaternion, Vector3, VectorSpace};

/// Node property driven by a track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackProperty {
    Translation,
    Rotation,
    Scale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    #[default]
    Linear,
    Step,
    /// Values are stored as (in-tangent, value, out-tangent) triples
    CubicSpline,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackValues {
    Vec3(Vec<Vector3<f32>>),
    Quat(Vec<Quaternion<f32>>),
}

/// A sampled track value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    Vec3(Vector3<f32>),
    Quat(Quaternion<f32>),
}

/// Keyframes for one property of one named node
#[derive(Debug, Clone, PartialEq)]
pub struct KeyframeTrack {
    pub node_name: String,
    pub property: TrackProperty,
    pub times: Vec<f32>,
    pub values: TrackValues,
    pub interpolation: Interpolation,
}

impl KeyframeTrack {
    pub fn translation(node_name: &str, times: Vec<f32>, values: Vec<Vector3<f32>>) -> Self {
        Self {
            node_name: node_name.to_string(),
            property: TrackProperty::Translation,
            times,
            values: TrackValues::Vec3(values),
            interpolation: Interpolation::Linear,
        }
    }

    pub fn rotation(node_name: &str, times: Vec<f32>, values: Vec<Quaternion<f32>>) -> Self {
        Self {
            node_name: node_name.to_string(),
            property: TrackProperty::Rotation,
            times,
            values: TrackValues::Quat(values),
            interpolation: Interpolation::Linear,
        }
    }

    pub fn scale(node_name: &str, times: Vec<f32>, values: Vec<Vector3<f32>>) -> Self {
        Self {
            node_name: node_name.to_string(),
            property: TrackProperty::Scale,
            times,
            values: TrackValues::Vec3(values),
            interpolation: Interpolation::Linear,
        }
    }

    pub fn end_time(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }

    /// Keyframe value at index `i`, skipping spline tangents
    fn key<T: Copy>(&self, values: &[T], i: usize) -> Option<T> {
        match self.interpolation {
            Interpolation::CubicSpline => values.get(i * 3 + 1).copied(),
            _ => values.get(i).copied(),
        }
    }

    /// Samples the track at `t`, clamping outside the keyframe range
    ///
    /// Cubic splines are sampled linearly between their key values.
    pub fn sample(&self, t: f32) -> Option<Sample> {
        if self.times.is_empty() {
            return None;
        }

        let next = self.times.partition_point(|&k| k <= t);
        let (i0, i1, alpha) = if next == 0 {
            (0, 0, 0.0)
        } else if next >= self.times.len() {
            let last = self.times.len() - 1;
            (last, last, 0.0)
        } else {
            let (t0, t1) = (self.times[next - 1], self.times[next]);
            let span = t1 - t0;
            let alpha = if span > f32::EPSILON { (t - t0) / span } else { 0.0 };
            match self.interpolation {
                Interpolation::Step => (next - 1, next - 1, 0.0),
                _ => (next - 1, next, alpha),
            }
        };

        match &self.values {
            TrackValues::Vec3(values) => {
                let a = self.key(values, i0)?;
                let b = self.key(values, i1)?;
                Some(Sample::Vec3(a.lerp(b, alpha)))
            }
            TrackValues::Quat(values) => {
                let a = self.key(values, i0)?;
                let b = self.key(values, i1)?;
                let q = if i0 == i1 { a } else { slerp_shortest(a, b, alpha) };
                Some(Sample::Quat(q.normalize()))
            }
        }
    }
}

fn slerp_shortest(a: Quaternion<f32>, b: Quaternion<f32>, t: f32) -> Quaternion<f32> {
    let b = if a.dot(b) < 0.0 { -b } else { b };
    a.slerp(b, t)
}

/// A named, time-parameterized set of keyframe tracks
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    /// Seconds; the latest keyframe across all tracks
    pub duration: f32,
    pub tracks: Vec<KeyframeTrack>,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>, tracks: Vec<KeyframeTrack>) -> Self {
        let duration = tracks
            .iter()
            .map(KeyframeTrack::end_time)
            .fold(0.0f32, f32::max);
        Self {
            name: name.into(),
            duration,
            tracks,
        }
    }
}
