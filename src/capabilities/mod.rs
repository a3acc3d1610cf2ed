//! External collaborator contracts: LLM transport, web search, and
//! result export are consumed through these traits and never hand-rolled
//! inline in the pipeline components.

pub mod completion;
pub mod search;
pub mod sink;

pub use completion::{CompletionClient, CompletionRequest, CompletionResponse, HttpCompletionClient};
pub use search::{HttpWebSearch, WebSearch};
pub use sink::{FanOutSink, JsonFileSink, ResultSink, WorkbookSink};
