//! 归属栈：记录当前哪个委托 Agent 持有对话，空栈表示由 supervisor 持有

use serde::{Deserialize, Serialize};

/// 只能通过 push / pop 修改；pop 空栈是 no-op
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnershipStack(Vec<String>);

impl OwnershipStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, agent_id: impl Into<String>) {
        self.0.push(agent_id.into());
    }

    pub fn pop(&mut self) -> Option<String> {
        self.0.pop()
    }

    pub fn top(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl<S: Into<String>> FromIterator<S> for OwnershipStack {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
