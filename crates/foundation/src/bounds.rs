use serde::{Deserialize, Serialize};

/// WGS84 position, longitude first (GeoJSON order).
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub const fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }
}

impl From<[f64; 2]> for LngLat {
    fn from(p: [f64; 2]) -> Self {
        Self::new(p[0], p[1])
    }
}

/// Longitude/latitude bounding box.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GeoBounds {
    pub min: LngLat,
    pub max: LngLat,
}

impl GeoBounds {
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = LngLat>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut b = GeoBounds {
            min: first,
            max: first,
        };
        for p in iter {
            b.min.lng = b.min.lng.min(p.lng);
            b.min.lat = b.min.lat.min(p.lat);
            b.max.lng = b.max.lng.max(p.lng);
            b.max.lat = b.max.lat.max(p.lat);
        }
        Some(b)
    }

    pub fn center(&self) -> LngLat {
        LngLat::new(
            (self.min.lng + self.max.lng) * 0.5,
            (self.min.lat + self.max.lat) * 0.5,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{GeoBounds, LngLat};

    #[test]
    fn bounds_center() {
        let b = GeoBounds::from_points([
            LngLat::new(-10.0, 0.0),
            LngLat::new(10.0, 20.0),
            LngLat::new(0.0, 5.0),
        ])
        .unwrap();
        assert_eq!(b.center(), LngLat::new(0.0, 10.0));
        assert!(GeoBounds::from_points([]).is_none());
    }
}
