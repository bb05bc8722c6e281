//! Message boards and mail.
//!
//! Every connection reads and writes the same boards, so the cache sits
//! behind one `tokio::sync::Mutex`. Each operation takes the lock once,
//! does its read-then-write, and releases it.
//!
//! Persisting goes through [`BoardRegistry::persist`]: a second lock
//! lets one writer at a time snapshot and save, so saves land in the
//! order their snapshots were taken and an older one never overwrites
//! a newer one. Readers and mutators don't wait on a slow save.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use hearthwire_protocol::formats::{BoardSummary, PostSummary};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::catalog::BoardTemplate;
use crate::storage::{Storage, StorageError};

/// Board id of the per-player mailbox.
pub const MAIL_BOARD: u16 = 0;

/// One message on a board or in a mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: u16,
    pub author: String,
    /// Set for mail; `None` on public boards.
    #[serde(default)]
    pub recipient: Option<String>,
    pub subject: String,
    pub body: String,
}

impl Post {
    fn summary(&self) -> PostSummary {
        PostSummary {
            id: self.id,
            author: self.author.clone(),
            subject: self.subject.clone(),
        }
    }

    fn is_addressed_to(&self, username: &str) -> bool {
        self.recipient
            .as_deref()
            .is_some_and(|r| r.eq_ignore_ascii_case(username))
    }
}

/// A board and its posts, as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub id: u16,
    pub name: String,
    #[serde(default)]
    pub posts: Vec<Post>,
    /// Next id to hand out. Ids are never reused, so a delete always
    /// names exactly one post.
    #[serde(default = "first_post_id")]
    pub next_post_id: u16,
}

fn first_post_id() -> u16 {
    1
}

impl Board {
    pub fn new(id: u16, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            posts: Vec::new(),
            next_post_id: first_post_id(),
        }
    }

    fn allocate_id(&mut self) -> Result<u16, BoardError> {
        let id = self.next_post_id;
        self.next_post_id = id.checked_add(1).ok_or(BoardError::Full(self.id))?;
        Ok(id)
    }
}

/// Why a board operation was refused. Each maps to a failure message
/// the client shows.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    #[error("board {0} does not exist")]
    UnknownBoard(u16),

    #[error("post {post_id} not found on board {board}")]
    PostNotFound { board: u16, post_id: u16 },

    #[error("you may not delete that message")]
    NotPermitted,

    #[error("a message needs a subject")]
    EmptySubject,

    #[error("board {0} is full")]
    Full(u16),

    #[error("mail goes through the mailbox")]
    WrongBoard,
}

/// The shared board cache.
#[derive(Debug, Default)]
pub struct BoardRegistry {
    boards: Mutex<BTreeMap<u16, Board>>,
    /// Bumped under the `boards` lock by every change.
    revision: AtomicU64,
    /// Revision last written to storage. Held for the whole save.
    persisted: Mutex<u64>,
}

impl BoardRegistry {
    /// Builds the cache from catalog definitions plus whatever storage
    /// had persisted. Persisted posts survive; names come from the
    /// catalog. The mailbox always exists.
    pub fn new(templates: &[BoardTemplate], persisted: Vec<Board>) -> Self {
        let mut boards: BTreeMap<u16, Board> =
            persisted.into_iter().map(|b| (b.id, b)).collect();

        for template in templates {
            boards
                .entry(template.id)
                .and_modify(|b| b.name.clone_from(&template.name))
                .or_insert_with(|| Board::new(template.id, &template.name));
        }
        boards
            .entry(MAIL_BOARD)
            .or_insert_with(|| Board::new(MAIL_BOARD, "Mail"));

        Self {
            boards: Mutex::new(boards),
            revision: AtomicU64::new(0),
            persisted: Mutex::new(0),
        }
    }

    /// Public boards, mailbox excluded.
    pub async fn list(&self) -> Vec<BoardSummary> {
        self.boards
            .lock()
            .await
            .values()
            .filter(|b| b.id != MAIL_BOARD)
            .map(|b| BoardSummary {
                id: b.id,
                name: b.name.clone(),
            })
            .collect()
    }

    /// Post headers on `board`. On the mailbox, only mail addressed to
    /// `reader`.
    pub async fn read_board(
        &self,
        board: u16,
        reader: &str,
    ) -> Result<Vec<PostSummary>, BoardError> {
        let boards = self.boards.lock().await;
        let found = boards.get(&board).ok_or(BoardError::UnknownBoard(board))?;

        Ok(found
            .posts
            .iter()
            .filter(|p| board != MAIL_BOARD || p.is_addressed_to(reader))
            .map(Post::summary)
            .collect())
    }

    /// A single post. Mail is only readable by its recipient.
    pub async fn read_post(
        &self,
        board: u16,
        post_id: u16,
        reader: &str,
    ) -> Result<Post, BoardError> {
        let boards = self.boards.lock().await;
        let found = boards.get(&board).ok_or(BoardError::UnknownBoard(board))?;

        found
            .posts
            .iter()
            .find(|p| p.id == post_id)
            .filter(|p| board != MAIL_BOARD || p.is_addressed_to(reader))
            .cloned()
            .ok_or(BoardError::PostNotFound { board, post_id })
    }

    /// Adds a public post. Returns its id.
    pub async fn post(
        &self,
        board: u16,
        author: &str,
        subject: &str,
        body: &str,
    ) -> Result<u16, BoardError> {
        if board == MAIL_BOARD {
            return Err(BoardError::WrongBoard);
        }
        self.append(board, author, None, subject, body).await
    }

    /// Drops a letter into the mailbox for `to`. Whether `to` exists is
    /// the caller's check.
    pub async fn send_mail(
        &self,
        author: &str,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<u16, BoardError> {
        self.append(MAIL_BOARD, author, Some(to), subject, body).await
    }

    async fn append(
        &self,
        board: u16,
        author: &str,
        recipient: Option<&str>,
        subject: &str,
        body: &str,
    ) -> Result<u16, BoardError> {
        if subject.trim().is_empty() {
            return Err(BoardError::EmptySubject);
        }

        let mut boards = self.boards.lock().await;
        let target = boards
            .get_mut(&board)
            .ok_or(BoardError::UnknownBoard(board))?;
        let id = target.allocate_id()?;
        target.posts.push(Post {
            id,
            author: author.to_string(),
            recipient: recipient.map(str::to_string),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        self.revision.fetch_add(1, Ordering::AcqRel);
        Ok(id)
    }

    /// Removes a post. The author may delete a public post; the
    /// recipient may delete their mail.
    ///
    /// Lookup, permission check and removal happen under one lock, so
    /// two racing deletes of the same post cannot both succeed.
    pub async fn delete(
        &self,
        board: u16,
        post_id: u16,
        actor: &str,
    ) -> Result<Post, BoardError> {
        let mut boards = self.boards.lock().await;
        let target = boards
            .get_mut(&board)
            .ok_or(BoardError::UnknownBoard(board))?;
        let index = target
            .posts
            .iter()
            .position(|p| p.id == post_id)
            .ok_or(BoardError::PostNotFound { board, post_id })?;

        let post = &target.posts[index];
        let allowed = if board == MAIL_BOARD {
            post.is_addressed_to(actor)
        } else {
            post.author.eq_ignore_ascii_case(actor)
        };
        if !allowed {
            return Err(BoardError::NotPermitted);
        }

        let post = target.posts.remove(index);
        self.revision.fetch_add(1, Ordering::AcqRel);
        Ok(post)
    }

    /// A copy of every board and the revision it reflects.
    pub async fn snapshot(&self) -> (u64, Vec<Board>) {
        let boards = self.boards.lock().await;
        let revision = self.revision.load(Ordering::Acquire);
        (revision, boards.values().cloned().collect())
    }

    /// Writes the current boards to `storage`.
    ///
    /// One writer at a time: the snapshot is taken after the previous
    /// save finished, so the last save always carries the newest state.
    /// If storage already holds this revision nothing is written. A
    /// failed save leaves the revision unpersisted for the next call.
    pub async fn persist<S: Storage>(&self, storage: &S) -> Result<(), StorageError> {
        let mut persisted = self.persisted.lock().await;
        let (revision, boards) = self.snapshot().await;
        if revision == *persisted {
            return Ok(());
        }
        storage.save_boards(&boards).await?;
        *persisted = revision;
        Ok(())
    }
}
