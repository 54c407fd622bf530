//! TwinFlow Cloud Abstraction
//!
//! Provider-independent provisioning surface for the digital-twin pipeline.
//! Each cloud (AWS, Azure, GCP) implements the [`Provisioner`] trait; the
//! orchestrator never branches on provider strings, it dispatches through
//! the trait once the [`twinflow_core::ProviderId`] has been resolved.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │            twinflow-orchestrator             │
//! │         (DeploymentPlan executor)            │
//! └──────────────────┬───────────────────────────┘
//!                    │
//! ┌──────────────────▼───────────────────────────┐
//! │               twinflow-cloud                 │
//! │  trait Provisioner { create / destroy /      │
//! │    resource_name / redeploy / invoke }       │
//! └──────┬───────────────┬───────────────┬───────┘
//!        │               │               │
//! ┌──────▼─────┐  ┌──────▼─────┐  ┌──────▼─────┐
//! │    aws     │  │   azure    │  │    gcp     │
//! └────────────┘  └────────────┘  └────────────┘
//! ```

pub mod error;
pub mod provisioner;
pub mod retry;
pub mod validator;

pub use error::{CloudError, Result};
pub use provisioner::{
    AuthStatus, InvocationMode, NameContext, Provisioner, ResourceHandle, ResourceSpec,
    default_resource_name,
};
pub use retry::RetryConfig;
pub use validator::{Violation, validate_code, validate_config};
