mod link;

pub use link::{CreateLinkRequest, CreateLinkResponse, GeoResult, TrackingLink, Visit};
