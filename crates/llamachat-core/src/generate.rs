//! Streaming a reply to the terminal while listening for a stop key.

use async_trait::async_trait;
use std::future::Future;
use std::io::Write;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::ChatError;
use crate::keys::{KeyListener, KeySource};
use crate::wrap::WordWrapper;
use llamachat_local::CompletionStream;

/// A stream of generated text fragments.
#[async_trait]
pub trait TokenSource: Send {
    /// Next fragment, or `None` when generation is complete.
    async fn next_token(&mut self) -> Option<Result<String, ChatError>>;
}

#[async_trait]
impl TokenSource for CompletionStream {
    async fn next_token(&mut self) -> Option<Result<String, ChatError>> {
        CompletionStream::next_token(self)
            .await
            .map(|token| token.map_err(ChatError::from))
    }
}

#[async_trait]
impl<'a, T: TokenSource + ?Sized> TokenSource for &'a mut T {
    async fn next_token(&mut self) -> Option<Result<String, ChatError>> {
        (**self).next_token().await
    }
}

/// Outcome of one streamed generation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reply {
    /// Everything the model produced, unwrapped.
    pub text: String,
    /// Number of fragments received.
    pub tokens: usize,
    /// The user stopped the generation.
    pub cancelled: bool,
}

/// Print `source` to `out` until it ends or a stop key is pressed.
///
/// The key listener runs on its own thread for the duration of the call
/// and is always joined before this returns, whether generation finished,
/// was cancelled or failed.
pub async fn stream_reply<S, W, K>(
    source: &mut S,
    out: &mut W,
    wrapper: WordWrapper,
    keys: K,
) -> Result<Reply, ChatError>
where
    S: TokenSource + ?Sized,
    W: Write,
    K: KeySource,
{
    generate_reply(async { Ok(source) }, out, wrapper, keys).await
}

/// Like [`stream_reply`], but the listener is already running while
/// `start` opens the stream, so a stop key also aborts a request that is
/// still waiting for its first token.
pub async fn generate_reply<F, S, W, K>(
    start: F,
    out: &mut W,
    mut wrapper: WordWrapper,
    keys: K,
) -> Result<Reply, ChatError>
where
    F: Future<Output = Result<S, ChatError>>,
    S: TokenSource,
    W: Write,
    K: KeySource,
{
    let cancel = CancellationToken::new();
    let listener = KeyListener::spawn(keys, cancel.clone());

    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => Ok(Reply {
            cancelled: true,
            ..Reply::default()
        }),
        started = start => match started {
            Ok(mut source) => consume(&mut source, out, &mut wrapper, &cancel).await,
            Err(e) => Err(e),
        },
    };
    listener.finish();

    out.write_all(wrapper.finish().as_bytes())?;
    out.flush()?;

    let reply = result?;
    if reply.cancelled {
        info!("Generation stopped after {} tokens", reply.tokens);
    } else {
        debug!("Generation finished: {} tokens", reply.tokens);
    }
    Ok(reply)
}

async fn consume<S, W>(
    source: &mut S,
    out: &mut W,
    wrapper: &mut WordWrapper,
    cancel: &CancellationToken,
) -> Result<Reply, ChatError>
where
    S: TokenSource + ?Sized,
    W: Write,
{
    let mut reply = Reply::default();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                reply.cancelled = true;
                break;
            }
            next = source.next_token() => match next {
                Some(Ok(token)) => {
                    reply.text.push_str(&token);
                    reply.tokens += 1;
                    out.write_all(wrapper.push(&token).as_bytes())?;
                    out.flush()?;
                }
                Some(Err(e)) => return Err(e),
                None => break,
            },
        }
    }

    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::tests::ScriptedKeys;
    use crate::keys::NoKeys;
    use llamachat_local::LocalAIError;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Yields scripted fragments with a small delay between them.
    struct FakeTokens {
        script: VecDeque<Result<String, ChatError>>,
        delay: Duration,
    }

    impl FakeTokens {
        fn new(tokens: &[&str]) -> Self {
            Self {
                script: tokens.iter().map(|t| Ok(t.to_string())).collect(),
                delay: Duration::from_millis(1),
            }
        }
    }

    #[async_trait]
    impl TokenSource for FakeTokens {
        async fn next_token(&mut self) -> Option<Result<String, ChatError>> {
            tokio::time::sleep(self.delay).await;
            self.script.pop_front()
        }
    }

    /// Never finishes on its own.
    struct Endless {
        emitted: usize,
    }

    #[async_trait]
    impl TokenSource for Endless {
        async fn next_token(&mut self) -> Option<Result<String, ChatError>> {
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.emitted += 1;
            Some(Ok("la ".to_string()))
        }
    }

    #[tokio::test]
    async fn test_streams_to_completion() {
        let mut source = FakeTokens::new(&["Hello", ",", " wor", "ld", "!"]);
        let mut out = Vec::new();

        let reply = stream_reply(&mut source, &mut out, WordWrapper::new(0), NoKeys)
            .await
            .unwrap();

        assert_eq!(reply.text, "Hello, world!");
        assert_eq!(reply.tokens, 5);
        assert!(!reply.cancelled);
        assert_eq!(String::from_utf8(out).unwrap(), "Hello, world!");
    }

    #[tokio::test]
    async fn test_output_is_wrapped_but_text_is_not() {
        let mut source = FakeTokens::new(&["one two three\n", "four"]);
        let mut out = Vec::new();
        let wrapper = WordWrapper::new(8).with_line_ending("\r\n");

        let reply = stream_reply(&mut source, &mut out, wrapper, NoKeys)
            .await
            .unwrap();

        assert_eq!(reply.text, "one two three\nfour");
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "one two \r\nthree\r\nfour"
        );
    }

    #[tokio::test]
    async fn test_stop_key_interrupts_stream() {
        let mut source = Endless { emitted: 0 };
        let mut out = Vec::new();

        let reply = tokio::time::timeout(
            Duration::from_secs(5),
            stream_reply(
                &mut source,
                &mut out,
                WordWrapper::new(0),
                ScriptedKeys::ctrl_q_after(3),
            ),
        )
        .await
        .expect("stop key did not end the stream")
        .unwrap();

        assert!(reply.cancelled);
        assert!(reply.tokens <= source.emitted);
        assert_eq!(reply.text, "la ".repeat(reply.tokens));
        assert_eq!(String::from_utf8(out).unwrap(), reply.text);
    }

    #[tokio::test]
    async fn test_error_keeps_shown_text() {
        let mut source = FakeTokens::new(&["partial answer"]);
        source
            .script
            .push_back(Err(LocalAIError::Api("context overflow".to_string()).into()));
        let mut out = Vec::new();

        let result = stream_reply(&mut source, &mut out, WordWrapper::new(0), NoKeys).await;

        assert!(matches!(
            result,
            Err(ChatError::Backend(LocalAIError::Api(_)))
        ));
        assert_eq!(String::from_utf8(out).unwrap(), "partial answer");
    }

    #[tokio::test]
    async fn test_stop_key_aborts_pending_request() {
        let mut out = Vec::new();
        let never_answers = std::future::pending::<Result<FakeTokens, ChatError>>();

        let reply = tokio::time::timeout(
            Duration::from_secs(5),
            generate_reply(
                never_answers,
                &mut out,
                WordWrapper::new(0),
                ScriptedKeys::ctrl_q_after(2),
            ),
        )
        .await
        .expect("stop key did not abort the request")
        .unwrap();

        assert!(reply.cancelled);
        assert_eq!(reply.tokens, 0);
        assert!(reply.text.is_empty());
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_request_error_is_returned() {
        let mut out = Vec::new();
        let failing = async {
            Err::<FakeTokens, _>(ChatError::from(LocalAIError::ServerNotRunning(
                "http://127.0.0.1:1".to_string(),
            )))
        };

        let result = generate_reply(failing, &mut out, WordWrapper::new(0), NoKeys).await;
        assert!(matches!(
            result,
            Err(ChatError::Backend(LocalAIError::ServerNotRunning(_)))
        ));
    }
}
