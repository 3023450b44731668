pub mod block_map;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod executor;
pub mod handler;
pub mod interpolate;
pub mod model;
pub mod observability;
pub mod retry;
pub mod setting_injector;
pub mod transport;

pub use block_map::{BlockBounds, BlockMap};
pub use config::{GlobalConfig, ProviderCredentials};
pub use context::{ChatMessage, ChatRole, ContextSnapshot, ExecutionContext, NodeState, NodeStatus};
pub use error::EngineError;
pub use event::{Event, EventKind, EventSink};
pub use executor::{Executor, ExecutionResult, ExecutionStatus, ExecutorBuilder};
pub use handler::{CancelFlag, DispatchFn, HandlerContext, HandlerOutcome, HandlerRegistry, NodeHandler};
pub use model::{Node, NodeConfig, Workflow};
pub use retry::RetryPolicy;
pub use setting_injector::{Setting, SettingPromptTemplate};
pub use transport::{AbortSignal, ChatChunk, ChatParams, ChatTransport};
