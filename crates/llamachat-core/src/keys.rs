//! Key-press listener that cancels an in-flight generation.

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How long the listener blocks waiting for a key before re-checking
/// whether the generation has finished.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Something that produces key presses.
pub trait KeySource: Send + 'static {
    /// Wait up to `timeout` for a key event.
    fn poll_key(&mut self, timeout: Duration) -> io::Result<Option<KeyEvent>>;
}

/// Keys from the controlling terminal.
///
/// The terminal is in raw mode for as long as this value lives.
pub struct TerminalKeys {
    _raw: (),
}

impl TerminalKeys {
    pub fn new() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self { _raw: () })
    }
}

impl KeySource for TerminalKeys {
    fn poll_key(&mut self, timeout: Duration) -> io::Result<Option<KeyEvent>> {
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                return Ok(Some(key));
            }
        }
        Ok(None)
    }
}

impl Drop for TerminalKeys {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            warn!("Failed to leave raw mode: {}", e);
        }
    }
}

/// A source that never produces a key. Used when stdin is not a terminal.
#[derive(Debug, Default)]
pub struct NoKeys;

impl KeySource for NoKeys {
    fn poll_key(&mut self, timeout: Duration) -> io::Result<Option<KeyEvent>> {
        thread::sleep(timeout);
        Ok(None)
    }
}

/// Ctrl+Q, Ctrl+Z, Ctrl+C or Esc, on press only.
pub fn is_stop_key(key: &KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    match key.code {
        KeyCode::Esc => true,
        KeyCode::Char(c) => {
            key.modifiers.contains(KeyModifiers::CONTROL)
                && matches!(c.to_ascii_lowercase(), 'q' | 'z' | 'c')
        }
        _ => false,
    }
}

/// Background thread watching for a stop key.
pub struct KeyListener {
    finished: Arc<AtomicBool>,
    handle: Option<JoinHandle<bool>>,
}

impl KeyListener {
    /// Start listening. A stop key cancels `cancel`.
    pub fn spawn<K: KeySource>(mut source: K, cancel: CancellationToken) -> Self {
        let finished = Arc::new(AtomicBool::new(false));
        let done = Arc::clone(&finished);

        let handle = thread::spawn(move || {
            while !done.load(Ordering::Acquire) && !cancel.is_cancelled() {
                match source.poll_key(POLL_INTERVAL) {
                    Ok(Some(key)) if is_stop_key(&key) => {
                        debug!("Stop key pressed: {:?}", key.code);
                        cancel.cancel();
                        return true;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Key listener stopped: {}", e);
                        return false;
                    }
                }
            }
            false
        });

        Self {
            finished,
            handle: Some(handle),
        }
    }

    /// Stop the thread and wait for it. Returns whether a stop key was pressed.
    pub fn finish(mut self) -> bool {
        self.join()
    }

    fn join(&mut self) -> bool {
        self.finished.store(true, Ordering::Release);
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                warn!("Key listener thread panicked");
                false
            }),
            None => false,
        }
    }
}

impl Drop for KeyListener {
    fn drop(&mut self) {
        self.join();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Replays a fixed sequence of polls, then goes quiet.
    pub(crate) struct ScriptedKeys {
        script: VecDeque<io::Result<Option<KeyEvent>>>,
    }

    impl ScriptedKeys {
        pub(crate) fn new(script: Vec<io::Result<Option<KeyEvent>>>) -> Self {
            Self {
                script: script.into(),
            }
        }

        /// `idle` empty polls, then Ctrl+Q.
        pub(crate) fn ctrl_q_after(idle: usize) -> Self {
            let mut script: Vec<_> = (0..idle).map(|_| Ok(None)).collect();
            script.push(Ok(Some(ctrl('q'))));
            Self::new(script)
        }
    }

    impl KeySource for ScriptedKeys {
        fn poll_key(&mut self, _timeout: Duration) -> io::Result<Option<KeyEvent>> {
            thread::sleep(Duration::from_millis(5));
            self.script.pop_front().unwrap_or(Ok(None))
        }
    }

    pub(crate) fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    #[test]
    fn test_stop_keys() {
        assert!(is_stop_key(&ctrl('q')));
        assert!(is_stop_key(&ctrl('z')));
        assert!(is_stop_key(&ctrl('c')));
        assert!(is_stop_key(&ctrl('Q')));
        assert!(is_stop_key(&KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)));

        assert!(!is_stop_key(&KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE)));
        assert!(!is_stop_key(&ctrl('x')));
        assert!(!is_stop_key(&KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)));
        assert!(!is_stop_key(&KeyEvent::new_with_kind(
            KeyCode::Char('q'),
            KeyModifiers::CONTROL,
            KeyEventKind::Release,
        )));
    }

    #[test]
    fn test_stop_key_cancels() {
        let cancel = CancellationToken::new();
        let listener = KeyListener::spawn(
            ScriptedKeys::new(vec![
                Ok(Some(KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE))),
                Ok(None),
                Ok(Some(ctrl('z'))),
            ]),
            cancel.clone(),
        );

        while !cancel.is_cancelled() {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(listener.finish());
    }

    #[test]
    fn test_finish_without_key() {
        let cancel = CancellationToken::new();
        let listener = KeyListener::spawn(NoKeys, cancel.clone());
        assert!(!listener.finish());
        assert!(!cancel.is_cancelled());
    }

    #[test]
    fn test_source_error_does_not_cancel() {
        let cancel = CancellationToken::new();
        let listener = KeyListener::spawn(
            ScriptedKeys::new(vec![Err(io::Error::new(io::ErrorKind::Other, "no tty"))]),
            cancel.clone(),
        );
        thread::sleep(Duration::from_millis(30));
        assert!(!listener.finish());
        assert!(!cancel.is_cancelled());
    }

    #[test]
    fn test_drop_joins() {
        let cancel = CancellationToken::new();
        drop(KeyListener::spawn(NoKeys, cancel.clone()));
        assert!(!cancel.is_cancelled());
    }
}
