//! Echo engine with an embedded game: submitting the line `tictactoe`
//! starts an interactive round against the engine, played over the same
//! session streams mid-command. The prompt is blanked for the duration of
//! the game and restored afterwards.

use shoal_core::{CancellationToken, Engine, Error, ExecFuture, SessionIo};

pub struct Tictactoe;

impl Engine for Tictactoe {
    fn exec<'a>(
        &'a self,
        token: CancellationToken,
        line: &'a str,
        io: SessionIo,
    ) -> ExecFuture<'a> {
        Box::pin(async move {
            match line {
                "quit" => 1,
                "tictactoe" => {
                    let saved = io.prefix();
                    io.set_prefix("");
                    let status = play(&token, &io).await;
                    io.set_prefix(saved);
                    status
                }
                _ => {
                    if io.write(format!("{line}\n").as_bytes()).await.is_err() {
                        return 1;
                    }
                    0
                }
            }
        })
    }
}

const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// Interactive round: the player is X, the engine is O. Returns a session
/// status, always 0; the game never terminates the outer session.
async fn play(token: &CancellationToken, io: &SessionIo) -> i32 {
    let mut board = [b' '; 9];
    loop {
        if say(io, &render(&board)).await.is_err() {
            return 0;
        }
        if say(io, "your move (1-9, q to stop): ").await.is_err() {
            return 0;
        }

        let raw = match io.read_line().await {
            Ok(raw) if !raw.is_empty() => raw,
            Ok(_) => return 0,
            Err(Error::Cancelled) => return 0,
            Err(e) => {
                tracing::warn!("game input failed: {e}");
                return 0;
            }
        };
        if token.is_cancelled() {
            return 0;
        }

        let cell = match raw.iter().copied().find(|b| !b.is_ascii_whitespace()) {
            Some(b'q') | None => return 0,
            Some(b @ b'1'..=b'9') => (b - b'1') as usize,
            Some(_) => {
                let _ = say(io, "enter a cell number from 1 to 9\n").await;
                continue;
            }
        };
        if board[cell] != b' ' {
            let _ = say(io, "that cell is taken\n").await;
            continue;
        }
        board[cell] = b'X';
        if let Some(outcome) = finished(&board) {
            let _ = say(io, &render(&board)).await;
            let _ = say(io, outcome).await;
            return 0;
        }

        if let Some(cell) = reply(&board) {
            board[cell] = b'O';
        }
        if let Some(outcome) = finished(&board) {
            let _ = say(io, &render(&board)).await;
            let _ = say(io, outcome).await;
            return 0;
        }
    }
}

async fn say(io: &SessionIo, text: &str) -> shoal_core::Result<usize> {
    io.write(text.as_bytes()).await
}

fn render(board: &[u8; 9]) -> String {
    let c = |i: usize| board[i] as char;
    format!(
        " {} | {} | {}\n---+---+---\n {} | {} | {}\n---+---+---\n {} | {} | {}\n",
        c(0),
        c(1),
        c(2),
        c(3),
        c(4),
        c(5),
        c(6),
        c(7),
        c(8)
    )
}

fn winner(board: &[u8; 9]) -> Option<u8> {
    for [a, b, c] in LINES {
        if board[a] != b' ' && board[a] == board[b] && board[b] == board[c] {
            return Some(board[a]);
        }
    }
    None
}

fn finished(board: &[u8; 9]) -> Option<&'static str> {
    match winner(board) {
        Some(b'X') => Some("you win\n"),
        Some(_) => Some("the engine wins\n"),
        None if board.iter().all(|&c| c != b' ') => Some("draw\n"),
        None => None,
    }
}

/// Engine move: complete a winning line, else block the player's, else take
/// the center, else the first open cell.
fn reply(board: &[u8; 9]) -> Option<usize> {
    for mark in [b'O', b'X'] {
        for line in LINES {
            let marked = line.iter().filter(|&&i| board[i] == mark).count();
            let open = line.iter().find(|&&i| board[i] == b' ');
            if marked == 2 {
                if let Some(&i) = open {
                    return Some(i);
                }
            }
        }
    }
    if board[4] == b' ' {
        return Some(4);
    }
    board.iter().position(|&c| c == b' ')
}
