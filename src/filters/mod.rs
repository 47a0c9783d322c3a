//! Unscented filtering for a CTRV target
//!
//! Sigma point generation, CTRV propagation, measurement models and the
//! generic unscented update, wired together by the `UkfCtrv` controller.

pub mod ctrv;
pub mod measurement;
pub mod predictor;
pub mod sigma_points;
pub mod ukf_ctrv;
pub mod updater;

pub use ukf_ctrv::{FilterOutput, Step, UkfCtrv, UkfCtrvState};
