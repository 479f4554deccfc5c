//! The smallest useful engine: write each line back, stop on `quit`.

use shoal_core::{CancellationToken, Engine, ExecFuture, SessionIo};

pub struct Echo;

impl Engine for Echo {
    fn exec<'a>(
        &'a self,
        _token: CancellationToken,
        line: &'a str,
        io: SessionIo,
    ) -> ExecFuture<'a> {
        Box::pin(async move {
            if line == "quit" {
                return 1;
            }
            if io.write(format!("{line}\n").as_bytes()).await.is_err() {
                return 1;
            }
            0
        })
    }
}
