//! Chat operations

use rusqlite::{params, OptionalExtension, Row};

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{Chat, ChatMessage, ChatRole, ChatWithMessages};

/// Title used when a chat is created without one
pub const DEFAULT_CHAT_TITLE: &str = "New chat";

fn chat_from_row(row: &Row<'_>) -> rusqlite::Result<Chat> {
    let created_at_str: String = row.get(4)?;
    Ok(Chat {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        share_financial_data: row.get(3)?,
        created_at: parse_datetime(&created_at_str),
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<ChatMessage> {
    let role_str: String = row.get(2)?;
    let created_at_str: String = row.get(4)?;
    Ok(ChatMessage {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        role: role_str.parse().unwrap_or(ChatRole::User),
        content: row.get(3)?,
        created_at: parse_datetime(&created_at_str),
    })
}

impl Database {
    pub fn create_chat(
        &self,
        user_id: i64,
        title: Option<&str>,
        share_financial_data: bool,
    ) -> Result<Chat> {
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_CHAT_TITLE);

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO chats (user_id, title, share_financial_data) VALUES (?, ?, ?)",
            params![user_id, title, share_financial_data],
        )?;
        let id = conn.last_insert_rowid();
        drop(conn);

        self.require_chat(user_id, id)
    }

    /// A user's chats, newest first
    pub fn list_chats(&self, user_id: i64) -> Result<Vec<Chat>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, title, share_financial_data, created_at FROM chats
             WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        )?;

        let chats = stmt
            .query_map(params![user_id], chat_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(chats)
    }

    pub fn get_chat(&self, user_id: i64, id: i64) -> Result<Option<Chat>> {
        let conn = self.conn()?;
        let chat = conn
            .query_row(
                "SELECT id, user_id, title, share_financial_data, created_at FROM chats
                 WHERE user_id = ? AND id = ?",
                params![user_id, id],
                chat_from_row,
            )
            .optional()?;

        Ok(chat)
    }

    pub(crate) fn require_chat(&self, user_id: i64, id: i64) -> Result<Chat> {
        self.get_chat(user_id, id)?
            .ok_or_else(|| Error::NotFound(format!("Chat {}", id)))
    }

    /// Chat plus its messages in the order they were written
    pub fn get_chat_with_messages(&self, user_id: i64, id: i64) -> Result<Option<ChatWithMessages>> {
        let Some(chat) = self.get_chat(user_id, id)? else {
            return Ok(None);
        };
        let messages = self.list_chat_messages(chat.id)?;
        Ok(Some(ChatWithMessages { chat, messages }))
    }

    pub fn list_chat_messages(&self, chat_id: i64) -> Result<Vec<ChatMessage>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, chat_id, role, content, created_at FROM chat_messages
             WHERE chat_id = ? ORDER BY id ASC",
        )?;

        let messages = stmt
            .query_map(params![chat_id], message_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(messages)
    }

    /// Append a message to a chat the user owns
    pub fn add_chat_message(
        &self,
        user_id: i64,
        chat_id: i64,
        role: ChatRole,
        content: &str,
    ) -> Result<ChatMessage> {
        self.require_chat(user_id, chat_id)?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO chat_messages (chat_id, role, content) VALUES (?, ?, ?)",
            params![chat_id, role.as_str(), content],
        )?;
        let id = conn.last_insert_rowid();

        let message = conn.query_row(
            "SELECT id, chat_id, role, content, created_at FROM chat_messages WHERE id = ?",
            params![id],
            message_from_row,
        )?;
        Ok(message)
    }

    /// Toggle whether replies may read the user's financial data
    pub fn set_chat_sharing(&self, user_id: i64, chat_id: i64, enabled: bool) -> Result<Chat> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE chats SET share_financial_data = ? WHERE user_id = ? AND id = ?",
            params![enabled, user_id, chat_id],
        )?;
        drop(conn);

        if updated == 0 {
            return Err(Error::NotFound(format!("Chat {}", chat_id)));
        }
        self.require_chat(user_id, chat_id)
    }

    /// Delete a chat and its messages
    pub fn delete_chat(&self, user_id: i64, chat_id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM chats WHERE user_id = ? AND id = ?",
            params![user_id, chat_id],
        )?;
        Ok(deleted > 0)
    }
}
