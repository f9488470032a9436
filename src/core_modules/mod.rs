pub mod active_zone;
pub mod background;
pub mod difference;
pub mod frame;
pub mod geometry;
pub mod pixel;
pub mod threshold;
pub mod utils;
pub mod zone_evaluator;
pub mod zone_registry;
