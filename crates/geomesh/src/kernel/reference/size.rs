//! Mesh size evaluation: point sizes, size fields, callback and bounds

use std::collections::{BTreeMap, HashMap};

use glam::DVec3;

use super::geom::curve_point;
use super::model::Model;
use crate::entity::{Dim, Tag};
use crate::kernel::{KernelError, KernelResult, SizeCallback};

/// Size field kinds the reference kernel evaluates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum FieldKind {
    Distance,
    Threshold,
    Min,
    Max,
}

impl FieldKind {
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "Distance" => Some(FieldKind::Distance),
            "Threshold" => Some(FieldKind::Threshold),
            "Min" => Some(FieldKind::Min),
            "Max" => Some(FieldKind::Max),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub(super) struct Field {
    pub kind: FieldKind,
    pub numbers: HashMap<String, f64>,
    pub lists: HashMap<String, Vec<f64>>,
}

impl Field {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            numbers: HashMap::new(),
            lists: HashMap::new(),
        }
    }

    fn number(&self, names: &[&str], default: f64) -> f64 {
        names
            .iter()
            .find_map(|n| self.numbers.get(*n).copied())
            .unwrap_or(default)
    }

    fn list(&self, names: &[&str]) -> Vec<f64> {
        names
            .iter()
            .filter_map(|n| self.lists.get(*n))
            .flatten()
            .copied()
            .collect()
    }
}

const MAX_FIELD_DEPTH: usize = 32;

/// Everything needed to answer "how large should elements be here"
pub(super) struct SizeContext<'a> {
    pub default_size: f64,
    pub min: f64,
    pub max: f64,
    pub from_points: bool,
    pub background: Option<Tag>,
    pub fields: &'a BTreeMap<Tag, Field>,
    pub callback: Option<&'a SizeCallback>,
    /// Sample positions of every distance field
    samples: HashMap<Tag, Vec<DVec3>>,
}

impl<'a> SizeContext<'a> {
    pub fn new(
        model: &Model,
        options: &HashMap<String, f64>,
        fields: &'a BTreeMap<Tag, Field>,
        background: Option<Tag>,
        callback: Option<&'a SizeCallback>,
    ) -> KernelResult<Self> {
        let option = |name: &str, default: f64| options.get(name).copied().unwrap_or(default);

        let mut samples = HashMap::new();
        for (tag, field) in fields {
            if field.kind == FieldKind::Distance {
                samples.insert(*tag, distance_samples(model, field)?);
            }
        }

        Ok(Self {
            default_size: model.characteristic_length(),
            min: option("Mesh.CharacteristicLengthMin", 0.0),
            max: option("Mesh.CharacteristicLengthMax", 1e22),
            from_points: option("Mesh.CharacteristicLengthFromPoints", 1.0) != 0.0,
            background,
            fields,
            callback,
            samples,
        })
    }

    /// Size at `x` on entity `(dim, tag)`; `point_size` is the size
    /// interpolated from the entity's points, if any were set
    pub fn size_at(&self, dim: Dim, tag: Tag, x: DVec3, point_size: Option<f64>) -> KernelResult<f64> {
        let mut size = match point_size {
            Some(s) if self.from_points && s > 0.0 => s,
            _ => self.default_size,
        };
        if let Some(field) = self.background {
            size = size.min(self.evaluate(field, x, 0)?);
        }
        if let Some(callback) = self.callback {
            size = callback(dim, tag, x, size);
        }
        size = size.min(self.max).max(self.min);
        if size > 0.0 && size.is_finite() {
            Ok(size)
        } else {
            Err(KernelError::OperationFailed(format!(
                "mesh size {size} at {x} is not positive"
            )))
        }
    }

    fn evaluate(&self, tag: Tag, x: DVec3, depth: usize) -> KernelResult<f64> {
        if depth > MAX_FIELD_DEPTH {
            return Err(KernelError::InvalidInput(format!(
                "size field {tag} refers to itself"
            )));
        }
        let field = self
            .fields
            .get(&tag)
            .ok_or_else(|| KernelError::InvalidInput(format!("unknown size field {tag}")))?;

        match field.kind {
            FieldKind::Distance => {
                let samples = self.samples.get(&tag).map(Vec::as_slice).unwrap_or_default();
                Ok(samples
                    .iter()
                    .map(|s| s.distance(x))
                    .fold(f64::INFINITY, f64::min))
            }
            FieldKind::Threshold => {
                let input = field.number(&["InField", "IField"], 0.0) as Tag;
                let r = self.evaluate(input, x, depth + 1)?;
                let size_min = field.number(&["SizeMin", "LcMin"], 0.0);
                let size_max = field.number(&["SizeMax", "LcMax"], 0.0);
                let dist_min = field.number(&["DistMin"], 1.0);
                let dist_max = field.number(&["DistMax"], 10.0);
                let stop_at_max = field.number(&["StopAtDistMax"], 0.0) != 0.0;
                if r <= dist_min {
                    Ok(size_min)
                } else if r >= dist_max {
                    Ok(if stop_at_max { f64::INFINITY } else { size_max })
                } else {
                    let w = (r - dist_min) / (dist_max - dist_min);
                    Ok(size_min + w * (size_max - size_min))
                }
            }
            FieldKind::Min | FieldKind::Max => {
                let inputs = field.list(&["FieldsList"]);
                let mut values = Vec::with_capacity(inputs.len());
                for input in inputs {
                    values.push(self.evaluate(input as Tag, x, depth + 1)?);
                }
                let combined = if values.is_empty() {
                    f64::INFINITY
                } else if field.kind == FieldKind::Min {
                    values.into_iter().fold(f64::INFINITY, f64::min)
                } else {
                    values.into_iter().fold(f64::NEG_INFINITY, f64::max)
                };
                Ok(combined)
            }
        }
    }
}

fn distance_samples(model: &Model, field: &Field) -> KernelResult<Vec<DVec3>> {
    let per_curve = field
        .number(&["Sampling", "NumPointsPerCurve"], 20.0)
        .max(2.0) as usize;
    let mut out = Vec::new();

    for tag in field.list(&["PointsList", "NodesList"]) {
        out.push(model.position(tag as Tag)?);
    }

    let mut curves: Vec<Tag> = field
        .list(&["CurvesList", "EdgesList"])
        .into_iter()
        .map(|t| t as Tag)
        .collect();
    for tag in field.list(&["SurfacesList", "FacesList"]) {
        let surface = crate::entity::Entity::new(Dim::Surface, tag as Tag);
        curves.extend(model.boundary(surface)?.into_iter().map(|(c, _)| c.id));
    }

    for tag in curves {
        let shape = &model.curve(tag)?.shape;
        for k in 0..per_curve {
            let t = k as f64 / (per_curve - 1) as f64;
            out.push(curve_point(model, shape, t)?);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::reference::model::PointData;

    fn model() -> Model {
        let mut model = Model::default();
        model.points.insert(
            1,
            PointData {
                x: DVec3::ZERO,
                size: 0.0,
            },
        );
        model.points.insert(
            2,
            PointData {
                x: DVec3::new(4.0, 3.0, 0.0),
                size: 0.0,
            },
        );
        model
    }

    #[test]
    fn test_default_size_is_diagonal() {
        let model = model();
        let fields = BTreeMap::new();
        let ctx = SizeContext::new(&model, &HashMap::new(), &fields, None, None).unwrap();
        let size = ctx.size_at(Dim::Curve, 1, DVec3::ZERO, None).unwrap();
        assert_eq!(size, 5.0);
        assert_eq!(ctx.size_at(Dim::Curve, 1, DVec3::ZERO, Some(0.5)).unwrap(), 0.5);
    }

    #[test]
    fn test_threshold_over_distance() {
        let model = model();
        let mut distance = Field::new(FieldKind::Distance);
        distance.lists.insert("PointsList".into(), vec![1.0]);
        let mut threshold = Field::new(FieldKind::Threshold);
        threshold.numbers.insert("InField".into(), 1.0);
        threshold.numbers.insert("SizeMin".into(), 0.1);
        threshold.numbers.insert("SizeMax".into(), 1.0);
        threshold.numbers.insert("DistMin".into(), 1.0);
        threshold.numbers.insert("DistMax".into(), 2.0);
        let fields = BTreeMap::from([(1, distance), (2, threshold)]);

        let ctx = SizeContext::new(&model, &HashMap::new(), &fields, Some(2), None).unwrap();
        let near = ctx.size_at(Dim::Curve, 1, DVec3::new(0.5, 0.0, 0.0), None).unwrap();
        let mid = ctx.size_at(Dim::Curve, 1, DVec3::new(1.5, 0.0, 0.0), None).unwrap();
        let far = ctx.size_at(Dim::Curve, 1, DVec3::new(3.0, 0.0, 0.0), None).unwrap();
        assert!((near - 0.1).abs() < 1e-12);
        assert!((mid - 0.55).abs() < 1e-12);
        assert!((far - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_bounds_and_callback() {
        let model = model();
        let fields = BTreeMap::new();
        let callback: SizeCallback = Box::new(|_, _, x, _| 0.01 + x.x);
        let options = HashMap::from([("Mesh.CharacteristicLengthMin".to_string(), 0.05)]);
        let ctx = SizeContext::new(&model, &options, &fields, None, Some(&callback)).unwrap();
        assert_eq!(ctx.size_at(Dim::Curve, 1, DVec3::ZERO, None).unwrap(), 0.05);
        assert_eq!(
            ctx.size_at(Dim::Curve, 1, DVec3::new(1.0, 0.0, 0.0), None).unwrap(),
            1.01
        );
    }

    #[test]
    fn test_self_referencing_field_fails() {
        let model = model();
        let mut min = Field::new(FieldKind::Min);
        min.lists.insert("FieldsList".into(), vec![1.0]);
        let fields = BTreeMap::from([(1, min)]);
        let ctx = SizeContext::new(&model, &HashMap::new(), &fields, Some(1), None).unwrap();
        assert!(ctx.size_at(Dim::Curve, 1, DVec3::ZERO, None).is_err());
    }
}
