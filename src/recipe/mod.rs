pub(crate) mod anchors;
pub mod document;
pub mod model;
pub(crate) mod normalize;
