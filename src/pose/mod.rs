#[cfg(feature = "desktop")]
pub mod estimator;
pub mod keypoint;
#[cfg(feature = "desktop")]
pub mod movenet;
#[cfg(feature = "desktop")]
pub mod preprocess;

#[cfg(feature = "desktop")]
pub use estimator::{InferenceParams, MultiPoseParams, PoseEstimator};
pub use keypoint::{BBox, Keypoint, KeypointIndex, Pose};
#[cfg(feature = "desktop")]
pub use movenet::MoveNet;
