pub mod error;
pub mod filter;
pub mod messages;
pub mod methods;
pub mod parameters;
pub mod results;
pub mod tags;

pub use error::{GraphRpcError, Result};
pub use filter::{order_by, CompareOp, Filter, SortCriterion};
pub use messages::{ErrorCode, ErrorResponse, Message, Request, Response};
pub use methods::{Method, ACTION_DEPTH, USER_DIRECTORY_PREFIX};
pub use parameters::{Paging, Parameters};
pub use results::RpcResult;
pub use tags::is_record_tag;
