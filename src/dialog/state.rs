//! 每个会话一份的 DialogState：消息历史、归属栈、Profile

use serde::{Deserialize, Serialize};

use super::message::{Message, Role};
use super::profile::Profile;
use super::stack::OwnershipStack;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DialogState {
    messages: Vec<Message>,
    #[serde(default)]
    ownership_stack: OwnershipStack,
    #[serde(default)]
    profile: Profile,
}

impl DialogState {
    pub fn new(profile: Profile) -> Self {
        Self {
            messages: Vec::new(),
            ownership_stack: OwnershipStack::new(),
            profile,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// 合并新输入：拼接，不覆盖
    pub fn merge(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
    }

    pub fn ownership_stack(&self) -> &OwnershipStack {
        &self.ownership_stack
    }

    pub fn push_owner(&mut self, agent_id: impl Into<String>) {
        self.ownership_stack.push(agent_id);
    }

    pub fn pop_owner(&mut self) -> Option<String> {
        self.ownership_stack.pop()
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// 最近一条 assistant 消息，即最近一个 Agent 节点的输出
    pub fn last_agent_output(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::Assistant)
    }

    /// 该动作请求是否已有回复
    pub fn is_answered(&self, action_id: &str) -> bool {
        self.messages
            .iter()
            .any(|m| m.reply_to.as_deref() == Some(action_id))
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}
