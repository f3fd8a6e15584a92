//! Geographic subsetting of chunked array files.
//!
//! Given a file registered in the catalog and a latitude/longitude bounding
//! box, this crate:
//! - infers which datasets hold latitude and longitude ([`inference`])
//! - computes the minimal index window inside the box ([`mask`])
//! - copies only that window of every associated dataset, with attributes,
//!   into a new output hierarchy ([`crop`])

pub mod bbox;
pub mod config;
pub mod crop;
pub mod error;
pub mod guard;
pub mod inference;
pub mod job;
pub mod mask;
pub mod naming;

pub use bbox::BoundingBox;
pub use config::CropConfig;
pub use crop::{CopyPlan, Cropper, PlannedCopy};
pub use error::{CropError, Result};
pub use guard::OutputGuard;
pub use inference::{
    infer_binding, resolve_binding, CoordinateBinding, CoordinateRole, DataGroupPolicy, RoleRule,
    LATITUDE_RULE, LONGITUDE_RULE,
};
pub use job::{CropJob, CropOptions, CropPhase, CropReport};
pub use mask::{AxisRange, CoordinateLayout, SelectionWindow};
pub use naming::cropped_file_name;
