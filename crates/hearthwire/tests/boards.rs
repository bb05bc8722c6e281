//! Board registry under concurrent use from many tasks.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use hearthwire::catalog::BoardTemplate;
use hearthwire::prelude::*;
use hearthwire::registry::{Board, BoardError, BoardRegistry, MAIL_BOARD};
use tokio::sync::Mutex;

/// Storage whose first board write stalls. Records the post count of
/// every write in the order they finish.
#[derive(Default)]
struct StallingBoards {
    inner: MemoryStorage,
    calls: AtomicUsize,
    written: Mutex<Vec<usize>>,
}

impl Storage for StallingBoards {
    async fn load(&self, username: &str) -> Result<Option<ActorRecord>, StorageError> {
        self.inner.load(username).await
    }

    async fn save(&self, record: &ActorRecord) -> Result<(), StorageError> {
        self.inner.save(record).await
    }

    async fn load_boards(&self) -> Result<Vec<Board>, StorageError> {
        Ok(Vec::new())
    }

    async fn save_boards(&self, boards: &[Board]) -> Result<(), StorageError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        let posts = boards.iter().map(|b| b.posts.len()).sum();
        self.written.lock().await.push(posts);
        Ok(())
    }
}

fn registry() -> Arc<BoardRegistry> {
    let templates = [BoardTemplate {
        id: 1,
        name: "Town Square".into(),
    }];
    Arc::new(BoardRegistry::new(&templates, Vec::new()))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_delete_same_post_concurrently_exactly_one_succeeds() {
    let boards = registry();
    let post_id = boards.post(1, "ayla", "Rats", "Everywhere.").await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let boards = Arc::clone(&boards);
        tasks.push(tokio::spawn(async move {
            boards.delete(1, post_id, "ayla").await
        }));
    }

    let mut deleted = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(post) => {
                assert_eq!(post.id, post_id);
                deleted += 1;
            }
            Err(e) => assert_eq!(e, BoardError::PostNotFound { board: 1, post_id }),
        }
    }

    assert_eq!(deleted, 1);
    assert!(boards.read_board(1, "ayla").await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_post_concurrently_ids_are_unique() {
    let boards = registry();

    let mut tasks = Vec::new();
    for n in 0..32 {
        let boards = Arc::clone(&boards);
        tasks.push(tokio::spawn(async move {
            boards
                .post(1, &format!("writer{n}"), "Hello", "First!")
                .await
        }));
    }

    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await.unwrap().unwrap());
    }
    ids.sort_unstable();
    ids.dedup();

    assert_eq!(ids.len(), 32);
    assert_eq!(boards.read_board(1, "anyone").await.unwrap().len(), 32);
}

#[tokio::test]
async fn test_mail_visible_only_to_recipient() {
    let boards = registry();
    let id = boards
        .send_mail("ayla", "bren", "Lunch", "Noon at the well?")
        .await
        .unwrap();

    assert_eq!(boards.read_board(MAIL_BOARD, "bren").await.unwrap().len(), 1);
    assert!(boards.read_board(MAIL_BOARD, "cole").await.unwrap().is_empty());
    assert_eq!(
        boards.read_post(MAIL_BOARD, id, "cole").await.unwrap_err(),
        BoardError::PostNotFound {
            board: MAIL_BOARD,
            post_id: id,
        }
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_persist_slow_older_save_never_lands_last() {
    let boards = registry();
    let storage = Arc::new(StallingBoards::default());
    boards.post(1, "ayla", "First", "").await.unwrap();

    let slow = {
        let boards = Arc::clone(&boards);
        let storage = Arc::clone(&storage);
        tokio::spawn(async move { boards.persist(&*storage).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    boards.post(1, "bren", "Second", "").await.unwrap();
    boards.persist(&*storage).await.unwrap();
    slow.await.unwrap().unwrap();

    let written = storage.written.lock().await.clone();
    assert_eq!(written.last(), Some(&2));
}
