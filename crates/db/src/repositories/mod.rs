pub mod fitting_repo;
pub mod measurement_repo;

pub use fitting_repo::FittingRepo;
pub use measurement_repo::MeasurementRepo;
