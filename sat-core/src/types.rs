/// Identifier for an overlay in a [`crate::overlay::OverlayCollection`].
///
/// This is an index into the collection and is only meaningful within
/// the lifetime of a given session.
pub type OverlayId = usize;

/// Mean equatorial radius of the Earth (WGS84), in metres.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;
