//! Line-oriented host for an editor session.
//!
//! Reads one command per line, drives the session, and prints results and
//! notices. Link prompts read their answer from the same input stream.

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use tokio::io::{
    stdin, stdout, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines,
};
use tokio::sync::Mutex;

use crate::autosave::AutosaveState;
use crate::commands::{Intent, KeyEvent, LinkPrompt, PromptResponse};
use crate::config::Config;
use crate::engine::RichTextEngine;
use crate::export::html_to_markdown;
use crate::host::RecordingNotifier;
use crate::session::{EditorSession, Services, PLACEHOLDER_HINT};

/// Prompt answer that dismisses the prompt
pub const CANCEL_ANSWER: &str = "/cancel";

const HELP: &str = "\
commands:
  type <text>            insert text at the selection
  para                   split the current block
  select-all | end       select everything / move to the end
  select <block> <from> <to>
  key <chord>            press a key chord, e.g. ctrl+b
  html | json | markdown print the document
  status                 theme, autosave and active formatting
  <intent>               bold italic underline strike h1 h2 list quote code
                         undo redo link clear save export-html export-md
                         copy-html copy-json theme
  help | quit";

/// Start the shell on stdin/stdout
pub async fn serve() -> Result<()> {
    let config = Config::from_args_and_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    let notices = Arc::new(RecordingNotifier::new());
    let mut services = Services::from_config(&config);
    services.notifier = notices.clone();

    let session = EditorSession::boot(&config, services)?;
    run_shell(&session, &notices, BufReader::new(stdin()), stdout()).await?;
    session.shutdown();

    Ok(())
}

/// Answers link prompts from the shell's input
struct LinePrompt<R, W> {
    input: Arc<Mutex<Lines<R>>>,
    output: Arc<Mutex<W>>,
}

impl<R, W> LinkPrompt for LinePrompt<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn request(&self, message: &str, default: &str) -> PromptResponse {
        let question = if default.is_empty() {
            format!("{}\n", message)
        } else {
            format!("{} [{}]\n", message, default)
        };
        {
            let mut output = self.output.lock().await;
            if let Err(e) = output.write_all(question.as_bytes()).await {
                log::warn!("Failed to write prompt: {}", e);
            }
            if let Err(e) = output.flush().await {
                log::warn!("Failed to flush prompt: {}", e);
            }
        }

        match self.input.lock().await.next_line().await {
            Ok(Some(answer)) if answer.trim() == CANCEL_ANSWER => PromptResponse::Cancelled,
            Ok(Some(answer)) => PromptResponse::Submitted(answer),
            Ok(None) => PromptResponse::Cancelled,
            Err(e) => {
                log::warn!("Failed to read prompt answer: {}", e);
                PromptResponse::Cancelled
            }
        }
    }
}

/// Run commands from `reader` until `quit` or end of input.
/// Returns the writer once the input is exhausted.
pub async fn run_shell<R, W>(
    session: &EditorSession,
    notices: &RecordingNotifier,
    reader: R,
    writer: W,
) -> Result<W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    let prompt = LinePrompt {
        input: Arc::new(Mutex::new(reader.lines())),
        output: Arc::new(Mutex::new(writer)),
    };

    if !session.restored() {
        write_line(&prompt.output, &format!("({})", PLACEHOLDER_HINT)).await?;
    }

    loop {
        let line = prompt.input.lock().await.next_line().await?;
        let Some(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "quit" | "exit") {
            break;
        }

        let reply = match execute(session, &prompt, line).await {
            Ok(reply) => reply,
            Err(e) => Some(format!("error: {}", e)),
        };
        if let Some(reply) = reply {
            write_line(&prompt.output, &reply).await?;
        }
        for notice in notices.take() {
            write_line(&prompt.output, &notice.to_string()).await?;
        }
    }

    let LinePrompt { input, output } = prompt;
    drop(input);
    let output = Arc::try_unwrap(output).map_err(|_| anyhow!("shell output still in use"))?;
    Ok(output.into_inner())
}

async fn execute<R, W>(
    session: &EditorSession,
    prompt: &LinePrompt<R, W>,
    line: &str,
) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    let dispatcher = session.dispatcher();

    match command {
        "help" => Ok(Some(HELP.to_string())),
        "type" => {
            session.engine().lock().insert_text(rest);
            Ok(None)
        }
        "para" => {
            session.engine().lock().split_block();
            Ok(None)
        }
        "select-all" => {
            session.engine().lock().select_all();
            Ok(None)
        }
        "end" => {
            session.engine().lock().select_end();
            Ok(None)
        }
        "select" => {
            let numbers = rest
                .split_whitespace()
                .map(|part| part.parse::<usize>())
                .collect::<Result<Vec<_>, _>>()
                .context("select expects <block> <from> <to>")?;
            let &[block, from, to] = numbers.as_slice() else {
                bail!("select expects <block> <from> <to>");
            };
            session.engine().lock().select_range(block, from, to);
            Ok(None)
        }
        "key" => {
            let mut event = KeyEvent::parse(rest)?;
            Ok(Some(match dispatcher.handle_key(&mut event) {
                Some(intent) => format!("{} (default prevented)", intent),
                None => "unbound".to_string(),
            }))
        }
        "html" => Ok(Some(session.engine().lock().get_html())),
        "json" => {
            let json = session.engine().lock().get_json();
            Ok(Some(serde_json::to_string_pretty(&json)?))
        }
        "markdown" => {
            let html = session.engine().lock().get_html();
            Ok(Some(html_to_markdown(&html)))
        }
        "status" => Ok(Some(status(session))),
        name => {
            let intent: Intent = name.parse()?;
            if dispatcher.dispatch(intent, prompt).await {
                Ok(None)
            } else {
                Ok(Some(format!("{}: nothing to do", intent)))
            }
        }
    }
}

fn status(session: &EditorSession) -> String {
    let dispatcher = session.dispatcher();
    let autosave = match dispatcher.autosave().state() {
        AutosaveState::Idle => "idle",
        AutosaveState::Pending => "pending",
        AutosaveState::TornDown => "stopped",
    };
    let active: Vec<&str> = dispatcher
        .toolbar_state()
        .into_iter()
        .filter(|item| item.active && item.intent != Intent::ToggleTheme)
        .map(|item| item.intent.name())
        .collect();
    format!(
        "theme: {}\nautosave: {}\nactive: {}",
        dispatcher.theme(),
        autosave,
        if active.is_empty() {
            "-".to_string()
        } else {
            active.join(", ")
        }
    )
}

async fn write_line<W: AsyncWrite + Unpin>(output: &Mutex<W>, text: &str) -> Result<()> {
    let mut output = output.lock().await;
    output.write_all(text.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryDownloads;
    use std::pin::Pin;
    use std::task::Poll;

    /// Accepts writes but refuses to flush
    struct UnflushableWriter(Vec<u8>);

    impl AsyncWrite for UnflushableWriter {
        fn poll_write(
            mut self: Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            self.0.extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(
            self: Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "terminal closed",
            )))
        }

        fn poll_shutdown(
            self: Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    async fn run(services: Services, script: &str) -> (EditorSession, String) {
        let notices = Arc::new(RecordingNotifier::new());
        let mut services = services;
        services.notifier = notices.clone();
        let session = EditorSession::boot(&Config::default(), services).unwrap();
        let output = run_shell(&session, &notices, script.as_bytes(), Vec::new())
            .await
            .unwrap();
        (session, String::from_utf8(output).unwrap())
    }

    #[tokio::test]
    async fn test_typing_and_printing() {
        let (_session, output) = run(
            Services::in_memory(),
            "type hello\nselect 0 0 5\nbold\nhtml\nmarkdown\nquit\n",
        )
        .await;
        assert!(output.starts_with("(Start writing...)\n"));
        assert!(output.contains("<p><strong>hello</strong></p>\n"));
        assert!(output.contains("**hello**\n"));
    }

    #[tokio::test]
    async fn test_link_prompt_reads_next_line() {
        let (session, output) = run(
            Services::in_memory(),
            "type site\nselect-all\nlink\nexample.com\n",
        )
        .await;
        assert!(output.contains("Enter URL (leave empty to remove):\n"));
        assert!(session.engine().lock().get_html().contains("href=\"example.com\""));
    }

    #[tokio::test]
    async fn test_cancelled_prompt_changes_nothing() {
        let (session, output) = run(
            Services::in_memory(),
            "type site\nselect-all\nlink\n/cancel\n",
        )
        .await;
        assert!(output.contains("link: nothing to do"));
        assert_eq!(session.engine().lock().get_html(), "<p>site</p>");
    }

    #[tokio::test]
    async fn test_key_chord_and_notice() {
        let downloads = Arc::new(MemoryDownloads::new());
        let mut services = Services::in_memory();
        services.downloads = downloads.clone();

        let (_session, output) = run(services, "type x\nkey ctrl+e\nkey ctrl+k\n").await;
        assert!(output.contains("export-html (default prevented)"));
        assert!(output.contains("unbound"));
        assert!(output.contains("document.html"));
        assert_eq!(downloads.delivered().len(), 1);
    }

    #[tokio::test]
    async fn test_errors_do_not_stop_the_shell() {
        let (_session, output) = run(Services::in_memory(), "shout\nselect 1 x\nstatus\n").await;
        assert!(output.contains("error: unknown command 'shout'"));
        assert!(output.contains("error: select expects"));
        assert!(output.contains("theme: light"));
    }

    #[tokio::test]
    async fn test_prompt_still_answers_when_flush_fails() {
        let prompt = LinePrompt {
            input: Arc::new(Mutex::new((&b"example.com\n"[..]).lines())),
            output: Arc::new(Mutex::new(UnflushableWriter(Vec::new()))),
        };

        let answer = prompt.request("Enter URL", "old").await;
        assert_eq!(answer, PromptResponse::Submitted("example.com".to_string()));
        assert_eq!(prompt.output.lock().await.0, b"Enter URL [old]\n");
    }
}
