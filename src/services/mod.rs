pub mod analysis;
pub mod band_math;
pub mod collectors;
pub mod geometry;
pub mod metrics;
pub mod monitoring;
pub mod notifier;
pub mod prescription;
pub mod raster;
pub mod registry;
pub mod report;

#[cfg(test)]
pub(crate) mod test_support;
