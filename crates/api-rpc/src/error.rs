//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error codes.

use jsonrpsee::types::ErrorObjectOwned;
use vidra_core::error::AppError;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const NOT_FOUND: i32 = 4001;
    pub const CONFLICT: i32 = 4002;
    pub const THROTTLED: i32 = 4003;
    pub const RESOURCE_EXHAUSTED: i32 = 4004;
    pub const NO_ELIGIBLE_BACKEND: i32 = 4005;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const BACKEND_ERROR: i32 = 5002;
}

/// Convert AppError to JSON-RPC ErrorObject
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    let (code, message) = match &err {
        AppError::Validation(_) | AppError::Domain(_) | AppError::Serialization(_) => {
            (code::VALIDATION_ERROR, err.to_string())
        }
        AppError::NotFound(_) => (code::NOT_FOUND, err.to_string()),
        AppError::Conflict(_) => (code::CONFLICT, err.to_string()),
        AppError::RateLimited { .. } | AppError::CircuitOpen { .. } => {
            (code::THROTTLED, err.to_string())
        }
        AppError::ResourceExhausted { .. } => (code::RESOURCE_EXHAUSTED, err.to_string()),
        AppError::NoEligibleBackend => (code::NO_ELIGIBLE_BACKEND, err.to_string()),
        AppError::Backend(_) | AppError::AllBackendsFailed { .. } | AppError::Timeout(_) => {
            (code::BACKEND_ERROR, err.to_string())
        }
        AppError::Cancelled | AppError::Internal(_) => (code::INTERNAL_ERROR, err.to_string()),
    };
    ErrorObjectOwned::owned(code, message, None::<()>)
}
