//! 对话状态模型：消息、归属栈、Profile

pub mod message;
pub mod profile;
pub mod stack;
pub mod state;

pub use message::{ActionRequest, Message, Role};
pub use profile::{Profile, ProfileProvider, StaticProfileProvider};
pub use stack::OwnershipStack;
pub use state::DialogState;
