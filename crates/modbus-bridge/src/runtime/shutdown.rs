use std::io::BufRead;
use std::thread;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Cancel `token` on the first line of console input, on stdin EOF, or on
/// Ctrl-C.
///
/// Stdin is read on a plain thread so a pending read never holds up runtime
/// shutdown. Must be called from within a tokio runtime.
pub fn spawn_stop_listener(token: CancellationToken) {
    let stdin_token = token.clone();
    let spawned = thread::Builder::new()
        .name("stdin-stop".to_string())
        .spawn(move || {
            let mut line = String::new();
            match std::io::stdin().lock().read_line(&mut line) {
                Ok(0) => info!("Console input closed, stopping"),
                Ok(_) => info!("Stop requested from console"),
                Err(e) => warn!(error = %e, "Console read failed, stopping"),
            }
            stdin_token.cancel();
        });
    if let Err(e) = spawned {
        warn!(error = %e, "Failed to start console listener");
    }

    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => {
                    info!("Ctrl-C received, stopping");
                    token.cancel();
                }
                Err(e) => warn!(error = %e, "Failed to install Ctrl-C handler"),
            },
        }
    });
}
