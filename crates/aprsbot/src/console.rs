//! Line-oriented chat transport.
//!
//! Each input line is one command from a single local user. Replies and
//! later notifications go to the same [`NotificationSink`].

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::notify::{NotificationSink, ReplyTarget};
use crate::registry::CommandRegistry;

/// Reads commands from `R` until end of input or cancellation.
pub struct ConsoleTransport<R> {
    input: R,
    target: ReplyTarget,
}

impl<R> ConsoleTransport<R>
where
    R: AsyncBufRead + Unpin,
{
    /// Commands read from `input` are attributed to `target`.
    pub fn new(input: R, target: ReplyTarget) -> Self {
        Self { input, target }
    }

    /// Dispatch every input line and deliver the replies. Returns the
    /// number of commands handled.
    ///
    /// # Errors
    ///
    /// Read errors on the input.
    pub async fn run(
        mut self,
        registry: &CommandRegistry,
        sink: &dyn NotificationSink,
        shutdown: &CancellationToken,
    ) -> std::io::Result<usize> {
        info!(target = %self.target, "console transport ready");
        let mut handled = 0;
        let mut line = String::new();

        loop {
            line.clear();
            let read = tokio::select! {
                () = shutdown.cancelled() => {
                    debug!("console transport cancelled");
                    break;
                }
                read = self.input.read_line(&mut line) => read?,
            };
            if read == 0 {
                info!("console input closed");
                break;
            }

            let command = line.trim();
            if command.is_empty() {
                continue;
            }
            let reply = registry.dispatch(command, &self.target).await;
            reply.deliver(sink, &self.target).await;
            handled += 1;
        }

        Ok(handled)
    }
}
