//! Message boards and mail.

use bytes::Bytes;
use hearthwire_protocol::formats::{BoardRequest, BoardResponse};
use hearthwire_protocol::ClientFormat;
use hearthwire_session::Authenticator;

use crate::client::Client;
use crate::dispatcher::{Flow, HandlerOutcome};
use crate::registry::BoardError;
use crate::server::ServerState;
use crate::storage::Storage;

pub(crate) async fn board<A, S>(
    client: &mut Client,
    state: &ServerState<A, S>,
    payload: Bytes,
) -> HandlerOutcome
where
    A: Authenticator,
    S: Storage,
{
    let request = BoardRequest::parse(payload)?;

    if !client.in_world() {
        return Ok(Flow::Continue);
    }
    let Some(username) = client.username().map(str::to_string) else {
        return Ok(Flow::Continue);
    };

    let response = match request {
        BoardRequest::ListBoards => BoardResponse::Boards(state.boards.list().await),

        BoardRequest::ReadBoard { board } => {
            match state.boards.read_board(board, &username).await {
                Ok(posts) => BoardResponse::Posts { board, posts },
                Err(e) => BoardResponse::failure(e.to_string()),
            }
        }

        BoardRequest::ReadPost { board, post_id } => {
            match state.boards.read_post(board, post_id, &username).await {
                Ok(post) => BoardResponse::Post {
                    board,
                    post_id: post.id,
                    author: post.author,
                    subject: post.subject,
                    body: post.body,
                },
                Err(e) => BoardResponse::failure(e.to_string()),
            }
        }

        BoardRequest::Post {
            board,
            subject,
            body,
        } => {
            let result = state.boards.post(board, &username, &subject, &body).await;
            mutated(client, state, result.map(|_| "Posted.")).await
        }

        BoardRequest::Delete { board, post_id } => {
            let result = state.boards.delete(board, post_id, &username).await;
            mutated(client, state, result.map(|_| "Deleted.")).await
        }

        BoardRequest::SendMail {
            board: _,
            to,
            subject,
            body,
        } => {
            if !recipient_exists(state, &to).await {
                BoardResponse::failure(format!("{to} doesn't live here."))
            } else {
                let result = state
                    .boards
                    .send_mail(&username, &to, &subject, &body)
                    .await;
                mutated(client, state, result.map(|_| "Sent.")).await
            }
        }
    };

    client.send(response);
    Ok(Flow::Continue)
}

/// Turns a mutation's result into a response, persisting the boards if
/// it succeeded.
///
/// If the write fails the change stays in memory and the client is
/// told.
async fn mutated<A, S>(
    client: &Client,
    state: &ServerState<A, S>,
    result: Result<&'static str, BoardError>,
) -> BoardResponse
where
    A: Authenticator,
    S: Storage,
{
    let message = match result {
        Ok(message) => message,
        Err(e) => return BoardResponse::failure(e.to_string()),
    };

    match state.boards.persist(&state.storage).await {
        Ok(()) => BoardResponse::success(message),
        Err(e) => {
            tracing::warn!(conn_id = %client.id(), error = %e, "board persistence failed");
            BoardResponse::failure("The board could not be saved.")
        }
    }
}

async fn recipient_exists<A, S>(state: &ServerState<A, S>, username: &str) -> bool
where
    A: Authenticator,
    S: Storage,
{
    if state.directory.is_online(username) {
        return true;
    }
    matches!(state.storage.load(username).await, Ok(Some(_)))
}

