//! 用户管理工具族（domain = user_management）
//!
//! get_user_info 读取用户目录；get_recent_emails 读取邮箱协作者。邮件服务与 OAuth 不在本 crate 范围内，
//! 默认使用内存邮箱。

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dialog::Profile;
use crate::registry::{parse_args, Tool};

pub const DOMAIN: &str = "user_management";

/// 最多返回的邮件数
const RECENT_EMAILS: usize = 5;

#[derive(Debug, Deserialize)]
struct UserArgs {
    user_id: String,
}

fn user_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "user_id": {"type": "string", "description": "The user's id as shown in the profile"}
        },
        "required": ["user_id"]
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Email {
    pub id: String,
    pub sender: String,
    pub subject: String,
    pub snippet: String,
}

/// 邮箱协作者：按用户返回最近邮件（新在前）
pub trait Mailbox: Send + Sync {
    fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<Email>, String>;
}

#[derive(Debug, Default)]
pub struct InMemoryMailbox {
    inboxes: RwLock<HashMap<String, Vec<Email>>>,
}

impl InMemoryMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliver(&self, user_id: &str, email: Email) {
        if let Ok(mut inboxes) = self.inboxes.write() {
            inboxes.entry(user_id.to_string()).or_default().push(email);
        }
    }
}

impl Mailbox for InMemoryMailbox {
    fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<Email>, String> {
        let inboxes = self
            .inboxes
            .read()
            .map_err(|_| "mailbox lock poisoned".to_string())?;
        Ok(inboxes
            .get(user_id)
            .map(|mails| mails.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

/// 用户目录：user_id -> Profile
#[derive(Debug, Default, Clone)]
pub struct UserDirectory {
    users: HashMap<String, Profile>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user_id: impl Into<String>, profile: Profile) -> Self {
        self.users.insert(user_id.into(), profile);
        self
    }
}

pub struct GetUserInfoTool {
    directory: Arc<UserDirectory>,
}

impl GetUserInfoTool {
    pub fn new(directory: Arc<UserDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl Tool for GetUserInfoTool {
    fn name(&self) -> &str {
        "get_user_info"
    }

    fn description(&self) -> &str {
        "Fetch user information (id, name, email)."
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn parameters_schema(&self) -> Value {
        user_schema()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: UserArgs = parse_args(self.name(), args)?;
        let profile = self
            .directory
            .users
            .get(&args.user_id)
            .cloned()
            .unwrap_or_else(Profile::unknown);
        Ok(profile.render())
    }
}

pub struct GetRecentEmailsTool {
    mailbox: Arc<dyn Mailbox>,
}

impl GetRecentEmailsTool {
    pub fn new(mailbox: Arc<dyn Mailbox>) -> Self {
        Self { mailbox }
    }
}

#[async_trait]
impl Tool for GetRecentEmailsTool {
    fn name(&self) -> &str {
        "get_recent_emails"
    }

    fn description(&self) -> &str {
        "Look up the user's most recent emails."
    }

    fn domain(&self) -> &str {
        DOMAIN
    }

    fn parameters_schema(&self) -> Value {
        user_schema()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let args: UserArgs = parse_args(self.name(), args)?;
        let emails = self.mailbox.recent(&args.user_id, RECENT_EMAILS)?;
        serde_json::to_string(&emails).map_err(|e| e.to_string())
    }
}
