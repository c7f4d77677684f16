use crate::models::location::GeoPoint;
use crate::models::route::MapRegion;

const EARTH_RADIUS_KM: f64 = 6_371.0;
const REGION_PADDING: f64 = 1.5;

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

/// Sum of consecutive great-circle distances along `points`, in kilometres.
pub fn path_length_km<'a, I>(points: I) -> f64
where
    I: IntoIterator<Item = &'a GeoPoint>,
{
    let mut iter = points.into_iter();
    let Some(mut previous) = iter.next() else {
        return 0.0;
    };

    let mut total = 0.0;
    for point in iter {
        total += haversine_km(previous, point);
        previous = point;
    }
    total
}

/// Region covering every point, with both spans scaled by 1.5.
pub fn bounding_region<'a, I>(points: I) -> Option<MapRegion>
where
    I: IntoIterator<Item = &'a GeoPoint>,
{
    let mut iter = points.into_iter();
    let first = iter.next()?;

    let (mut min_lat, mut max_lat) = (first.lat, first.lat);
    let (mut min_lng, mut max_lng) = (first.lng, first.lng);
    for point in iter {
        min_lat = min_lat.min(point.lat);
        max_lat = max_lat.max(point.lat);
        min_lng = min_lng.min(point.lng);
        max_lng = max_lng.max(point.lng);
    }

    Some(MapRegion {
        center: GeoPoint::new((min_lat + max_lat) / 2.0, (min_lng + max_lng) / 2.0),
        lat_span: (max_lat - min_lat) * REGION_PADDING,
        lng_span: (max_lng - min_lng) * REGION_PADDING,
    })
}
