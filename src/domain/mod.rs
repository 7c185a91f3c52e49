pub mod budget;
pub mod business;
pub mod deal;
pub mod error;
pub mod operation;
pub mod photo;
pub mod raw;
pub mod source;
pub mod standardized;

pub use budget::{Budget, TokenBucketState};
pub use business::{Business, SourceBinding};
pub use deal::Deal;
pub use error::{IngestError, Result};
pub use operation::{Operation, OperationStage, OperationStatus};
pub use photo::{Photo, PhotoStatus, PhotoVariant};
pub use raw::RawBusiness;
pub use source::{CollectionJobKind, Source};
pub use standardized::{Address, GeoPoint, OpenHours, StandardizedBusiness};
