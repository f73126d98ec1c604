//! Model-facing side of scene generation: prompt assembly, the provider
//! boundary, retries and rate limiting, reply parsing and chat history.

mod client;
mod history;
mod providers;
mod rate_limit;
mod reply;
mod system_prompt;

pub use client::{ClientSettings, ModelClient};
pub use history::{ChatHistory, ChatTurn, TurnRole};
pub use providers::{ChatRequest, Message, ModelError, ModelProvider, OpenAIProvider, Role};
pub use rate_limit::RateLimiter;
pub use reply::{ModelReply, ReplyFormat, parse_reply, strip_code_fences};
pub use system_prompt::{
    PromptComposer, PromptPayload, build_iteration_prompt, build_system_prompt, count_tokens,
};

#[cfg(test)]
pub use providers::MockModelProvider;
