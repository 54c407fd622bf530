use thiserror::Error;
use twinflow_cloud::CloudError;
use twinflow_registry::RegistryError;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error(transparent)]
    Cloud(#[from] CloudError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl BridgeError {
    pub fn is_client_error(&self) -> bool {
        match self {
            BridgeError::Cloud(e) => e.is_client_error(),
            BridgeError::Registry(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
