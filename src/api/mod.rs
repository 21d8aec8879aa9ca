pub mod cli;
pub mod http;

pub use cli::{CliHandler, Cli, Commands, CliError, TierArg};
pub use http::{
    ApiServer, ApiError, AppState, ErrorResponse, HealthResponse, StatusResponse,
    get_health, get_status, router
};
