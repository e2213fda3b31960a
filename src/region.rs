//! Regions and the ordered store they are loaded into.
//!
//! A region is a named multipolygon with a stable id. The store keeps the
//! source order, which every downstream stage (graph indices, list output,
//! schedule universe) relies on.

use std::collections::HashMap;

use geo::{Area, BoundingRect, Centroid, CoordsIter, EuclideanDistance, MultiPolygon, Point, Rect};

use crate::error::{DataLoadError, GeometryError};

/// A named geographic area.
#[derive(Clone, Debug)]
pub struct Region {
    pub id: String,
    pub name: String,
    pub geometry: MultiPolygon<f64>,
}

impl Region {
    pub fn new(id: impl Into<String>, name: impl Into<String>, geometry: MultiPolygon<f64>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            geometry,
        }
    }

    /// Centroid of the whole multipolygon, if one is defined.
    pub fn centroid(&self) -> Option<Point<f64>> {
        self.geometry.centroid()
    }

    /// Axis-aligned bounding box of the geometry.
    pub fn envelope(&self) -> Option<Rect<f64>> {
        self.geometry.bounding_rect()
    }

    /// Minimum separation between the two geometries, 0 when they touch or overlap.
    pub fn distance_to(&self, other: &Region) -> f64 {
        self.geometry
            .0
            .iter()
            .flat_map(|a| other.geometry.0.iter().map(move |b| a.euclidean_distance(b)))
            .fold(f64::INFINITY, f64::min)
    }

    /// Check the geometry can take part in relation queries and return its centroid.
    pub fn validated_centroid(&self) -> Result<Point<f64>, GeometryError> {
        if self.geometry.0.is_empty() {
            return Err(GeometryError::Missing(self.id.clone()));
        }
        if self
            .geometry
            .coords_iter()
            .any(|c| !c.x.is_finite() || !c.y.is_finite())
        {
            return Err(GeometryError::NonFinite(self.id.clone()));
        }
        let short_ring = self.geometry.0.iter().any(|polygon| {
            std::iter::once(polygon.exterior())
                .chain(polygon.interiors())
                .any(|ring| ring.0.len() < 4)
        });
        if short_ring || self.geometry.unsigned_area() <= 0.0 {
            return Err(GeometryError::Degenerate(self.id.clone()));
        }
        self.centroid()
            .ok_or_else(|| GeometryError::UndefinedCentroid(self.id.clone()))
    }
}

/// Ordered, id-unique collection of regions for one run.
#[derive(Clone, Debug, Default)]
pub struct RegionStore {
    regions: Vec<Region>,
    index: HashMap<String, usize>,
}

impl RegionStore {
    /// Build a store, rejecting duplicate ids.
    pub fn new(regions: Vec<Region>) -> Result<Self, DataLoadError> {
        let mut index = HashMap::with_capacity(regions.len());
        for (i, region) in regions.iter().enumerate() {
            if index.insert(region.id.clone(), i).is_some() {
                return Err(DataLoadError::DuplicateId(region.id.clone()));
            }
        }
        Ok(Self { regions, index })
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Region> {
        self.index.get(id).map(|&i| &self.regions[i])
    }

    /// Region ids in source order.
    pub fn ids(&self) -> Vec<String> {
        self.regions.iter().map(|r| r.id.clone()).collect()
    }

    /// Bounding box covering every region.
    pub fn envelope(&self) -> Option<Rect<f64>> {
        self.regions
            .iter()
            .filter_map(Region::envelope)
            .reduce(|a, b| {
                Rect::new(
                    (a.min().x.min(b.min().x), a.min().y.min(b.min().y)),
                    (a.max().x.max(b.max().x), a.max().y.max(b.max().y)),
                )
            })
    }
}

/// Axis-aligned rectangle as a single-polygon multipolygon.
#[cfg(test)]
pub(crate) fn rect_geometry(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![Rect::new((min_x, min_y), (max_x, max_y)).to_polygon()])
}
